//! XDG config reader: the `[env]` table of `~/.config/<app>/config.toml`.

use std::collections::HashMap;

use crate::LoadError;

#[derive(serde::Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    env: HashMap<String, String>,
}

fn config_path(app_name: &str) -> Option<std::path::PathBuf> {
    // dirs honors XDG_CONFIG_HOME on unix, falling back to ~/.config.
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(std::path::PathBuf::from)
        .or_else(dirs::config_dir)?;
    let path = base.join(app_name).join("config.toml");
    path.is_file().then_some(path)
}

/// The `[env]` table of the app's config file. A missing file or missing
/// table yields an empty map.
pub fn env_table(app_name: &str) -> Result<HashMap<String, String>, LoadError> {
    let Some(path) = config_path(app_name) else {
        return Ok(HashMap::new());
    };
    let content = std::fs::read_to_string(&path).map_err(LoadError::XdgRead)?;
    let config: ConfigFile = toml::from_str(&content)?;
    Ok(config.env)
}
