//! Integration test: a linear chain under sequential vs dependency-aware
//! policies, and the comparison report over both results.

mod common;

use std::sync::Arc;

use reweave::{
    InferenceClient, MetricsCollector, MockInferenceClient, SchedulerConfig, SchedulingPolicy,
    WorkflowScheduler,
};

async fn run_chain(policy: SchedulingPolicy) -> (reweave::WorkflowExecutionResult, usize) {
    let dag = common::chain(5);
    let mock = Arc::new(MockInferenceClient::ok());
    let mut scheduler = WorkflowScheduler::new(
        dag,
        Arc::clone(&mock) as Arc<dyn InferenceClient>,
        SchedulerConfig {
            policy,
            ..SchedulerConfig::default()
        },
    )
    .unwrap();
    let result = scheduler.execute().await;
    (result, mock.request_count())
}

#[tokio::test]
async fn chain_policies_agree_on_batches_tokens_and_order() {
    let (sequential, sequential_requests) = run_chain(SchedulingPolicy::Sequential).await;
    let (batched, batched_requests) = run_chain(SchedulingPolicy::DependencyAware).await;

    // A chain of 5 is 5 singleton batches under every policy.
    assert_eq!(sequential.total_batches, 5);
    assert_eq!(batched.total_batches, 5);
    assert_eq!(sequential.total_tokens, batched.total_tokens);
    assert_eq!(sequential_requests, 5);
    assert_eq!(batched_requests, 5);

    // Node results follow the chain in both runs.
    let order = |result: &reweave::WorkflowExecutionResult| {
        result
            .node_results
            .iter()
            .map(|r| r.node_id.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(order(&sequential), order(&batched));
    assert_eq!(order(&sequential), ["n0", "n1", "n2", "n3", "n4"]);

    let mut collector = MetricsCollector::new();
    collector.add_result("sequential", sequential);
    collector.add_result("dependency_aware", batched);
    assert_eq!(
        collector.metrics_for("sequential").unwrap().parallelism_factor,
        1.0
    );
    assert_eq!(
        collector
            .metrics_for("dependency_aware")
            .unwrap()
            .parallelism_factor,
        1.0
    );
}

#[tokio::test]
async fn comparison_report_covers_both_policies() {
    let (sequential, _) = run_chain(SchedulingPolicy::Sequential).await;
    let (batched, _) = run_chain(SchedulingPolicy::DependencyAware).await;

    let mut collector = MetricsCollector::new();
    collector.add_result("sequential", sequential);
    collector.add_result("dependency_aware", batched);

    let report = collector.generate_report();
    assert!(report.contains("sequential"));
    assert!(report.contains("dependency_aware vs sequential:"));
    assert!(report.contains("Speedup:"));
    assert!(report.contains("## Node-Level Analysis"));
    assert!(report.contains("agent_response:"));

    let export = collector.export_json();
    assert_eq!(
        export["policy_metrics"]["sequential"]["total_tokens"],
        export["policy_metrics"]["dependency_aware"]["total_tokens"]
    );
}

#[tokio::test]
async fn identical_inputs_and_mocks_reproduce_identical_results() {
    let (first, _) = run_chain(SchedulingPolicy::DependencyAware).await;
    let (second, _) = run_chain(SchedulingPolicy::DependencyAware).await;

    assert_eq!(first.total_tokens, second.total_tokens);
    assert_eq!(first.total_batches, second.total_batches);
    assert_eq!(first.nodes_executed, second.nodes_executed);
    let contents = |result: &reweave::WorkflowExecutionResult| {
        result
            .node_results
            .iter()
            .map(|r| (r.node_id.clone(), r.generated_content.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(contents(&first), contents(&second));
}

#[tokio::test]
async fn empty_workflow_succeeds_with_zero_nodes() {
    let dag = common::build_dag(&[], &[]);
    let mock = Arc::new(MockInferenceClient::ok());
    let mut scheduler = WorkflowScheduler::new(
        dag,
        mock as Arc<dyn InferenceClient>,
        SchedulerConfig::default(),
    )
    .unwrap();
    let result = scheduler.execute().await;
    assert!(result.success);
    assert_eq!(result.nodes_executed, 0);
    assert_eq!(result.total_batches, 0);
    assert_eq!(result.total_tokens, 0);
    assert!(result.node_results.is_empty());
}

#[tokio::test]
async fn single_node_workflow_is_one_batch_of_one() {
    let dag = common::build_dag(&[("only", "agent_response", "Supervisor")], &[]);
    let mock = Arc::new(MockInferenceClient::ok());
    let mut scheduler = WorkflowScheduler::new(
        dag,
        mock as Arc<dyn InferenceClient>,
        SchedulerConfig::default(),
    )
    .unwrap();
    let result = scheduler.execute().await;
    assert!(result.success);
    assert_eq!(result.nodes_executed, 1);
    assert_eq!(result.total_batches, 1);

    let mut collector = MetricsCollector::new();
    collector.add_result("dependency_aware", result);
    assert_eq!(
        collector
            .metrics_for("dependency_aware")
            .unwrap()
            .parallelism_factor,
        1.0
    );
}
