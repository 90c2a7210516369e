//! Load configuration from XDG `config.toml` and a project `.env`, then apply
//! it to the process environment with priority: **existing env > .env > XDG**.
//!
//! The CLI calls [`load_and_apply`] once at startup; everything downstream
//! reads plain environment variables (`REWEAVE_BASE_URL`, `REWEAVE_API_KEY`,
//! `REWEAVE_MODEL`, `RUST_LOG`, `LOG_FILE`, ...).

mod env_file;
mod xdg;

use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("read xdg config: {0}")]
    XdgRead(std::io::Error),
    #[error("parse xdg toml: {0}")]
    XdgParse(#[from] toml::de::Error),
    #[error("read .env: {0}")]
    EnvFileRead(std::io::Error),
}

/// Loads the `[env]` table of `$XDG_CONFIG_HOME/<app_name>/config.toml` and a
/// project `.env`, then sets each key that is **not** already present in the
/// process environment. `.env` values shadow XDG values; the existing
/// environment always wins.
///
/// * `app_name`: XDG directory name, e.g. `"reweave"`.
/// * `override_dir`: when `Some`, `.env` is looked up there instead of the
///   current directory.
pub fn load_and_apply(app_name: &str, override_dir: Option<&Path>) -> Result<(), LoadError> {
    let mut pending = xdg::env_table(app_name)?;
    // .env shadows XDG for keys both define.
    pending.extend(env_file::entries(override_dir).map_err(LoadError::EnvFileRead)?);

    for (key, value) in pending {
        if std::env::var_os(&key).is_none() {
            std::env::set_var(&key, value);
        }
    }
    Ok(())
}

/// Serializes tests that mutate process-wide environment variables
/// (`XDG_CONFIG_HOME` is shared across the test binary).
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn with_xdg_home<T>(dir: &Path, body: impl FnOnce() -> T) -> T {
        let _guard = crate::ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let previous = env::var("XDG_CONFIG_HOME").ok();
        env::set_var("XDG_CONFIG_HOME", dir);
        let out = body();
        match previous {
            Some(value) => env::set_var("XDG_CONFIG_HOME", value),
            None => env::remove_var("XDG_CONFIG_HOME"),
        }
        out
    }

    #[test]
    fn existing_env_always_wins() {
        let dotenv_dir = tempfile::tempdir().unwrap();
        std::fs::write(dotenv_dir.path().join(".env"), "REWEAVE_TEST_WINNER=dotenv\n").unwrap();

        env::set_var("REWEAVE_TEST_WINNER", "process");
        load_and_apply("reweave-test-none", Some(dotenv_dir.path())).unwrap();
        assert_eq!(env::var("REWEAVE_TEST_WINNER").as_deref(), Ok("process"));
        env::remove_var("REWEAVE_TEST_WINNER");
    }

    #[test]
    fn env_file_shadows_xdg() {
        let xdg_dir = tempfile::tempdir().unwrap();
        let app_dir = xdg_dir.path().join("reweave-test-shadow");
        std::fs::create_dir_all(&app_dir).unwrap();
        std::fs::write(
            app_dir.join("config.toml"),
            "[env]\nREWEAVE_TEST_SHADOW = \"xdg\"\n",
        )
        .unwrap();

        let dotenv_dir = tempfile::tempdir().unwrap();
        std::fs::write(dotenv_dir.path().join(".env"), "REWEAVE_TEST_SHADOW=dotenv\n").unwrap();

        env::remove_var("REWEAVE_TEST_SHADOW");
        with_xdg_home(xdg_dir.path(), || {
            load_and_apply("reweave-test-shadow", Some(dotenv_dir.path())).unwrap();
        });
        assert_eq!(env::var("REWEAVE_TEST_SHADOW").as_deref(), Ok("dotenv"));
        env::remove_var("REWEAVE_TEST_SHADOW");
    }

    #[test]
    fn xdg_applies_when_env_file_is_absent() {
        let xdg_dir = tempfile::tempdir().unwrap();
        let app_dir = xdg_dir.path().join("reweave-test-xdg");
        std::fs::create_dir_all(&app_dir).unwrap();
        std::fs::write(
            app_dir.join("config.toml"),
            "[env]\nREWEAVE_TEST_XDG = \"from_xdg\"\n",
        )
        .unwrap();
        let empty_dir = tempfile::tempdir().unwrap();

        env::remove_var("REWEAVE_TEST_XDG");
        with_xdg_home(xdg_dir.path(), || {
            load_and_apply("reweave-test-xdg", Some(empty_dir.path())).unwrap();
        });
        assert_eq!(env::var("REWEAVE_TEST_XDG").as_deref(), Ok("from_xdg"));
        env::remove_var("REWEAVE_TEST_XDG");
    }

    #[test]
    fn missing_everything_is_ok() {
        let empty_dir = tempfile::tempdir().unwrap();
        assert!(load_and_apply("reweave-test-missing-app", Some(empty_dir.path())).is_ok());
    }

    #[test]
    fn invalid_xdg_toml_is_a_parse_error() {
        let xdg_dir = tempfile::tempdir().unwrap();
        let app_dir = xdg_dir.path().join("reweave-test-bad");
        std::fs::create_dir_all(&app_dir).unwrap();
        std::fs::write(app_dir.join("config.toml"), "broken [[[\n").unwrap();

        let result = with_xdg_home(xdg_dir.path(), || load_and_apply("reweave-test-bad", None));
        assert!(matches!(result, Err(LoadError::XdgParse(_))));
    }
}
