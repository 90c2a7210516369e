//! `.env` reader: KEY=VALUE lines into an ordered list of entries.

use std::path::Path;

/// Reads `.env` from `override_dir` (or the current directory) into
/// `(key, value)` pairs, in file order. A missing file yields no entries.
pub fn entries(override_dir: Option<&Path>) -> std::io::Result<Vec<(String, String)>> {
    let dir = match override_dir {
        Some(dir) => dir.to_path_buf(),
        None => match std::env::current_dir() {
            Ok(dir) => dir,
            Err(_) => return Ok(Vec::new()),
        },
    };
    let path = dir.join(".env");
    if !path.is_file() {
        return Ok(Vec::new());
    }
    Ok(parse(&std::fs::read_to_string(path)?))
}

/// Line format: `KEY=VALUE`, trimmed. Blank lines and `#` comment lines are
/// skipped; a matching pair of surrounding quotes (single or double) is
/// stripped. No escapes, no multiline values.
fn parse(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .filter_map(|(key, value)| {
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), unquote(value.trim()).to_string()))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
