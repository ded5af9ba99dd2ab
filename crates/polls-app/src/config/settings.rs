//! Settings parser for .livepolls/config.toml

use std::path::Path;

use super::types::Settings;
use polls_core::prelude::*;

const CONFIG_FILENAME: &str = "config.toml";
const LIVEPOLLS_DIR: &str = ".livepolls";

/// Load settings from .livepolls/config.toml
///
/// Returns default settings if file doesn't exist or can't be parsed.
pub fn load_settings(project_path: &Path) -> Settings {
    let config_path = project_path.join(LIVEPOLLS_DIR).join(CONFIG_FILENAME);

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Settings::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", config_path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", config_path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", config_path, e);
            Settings::default()
        }
    }
}

/// Create default config files in .livepolls/ directory
pub fn init_config_dir(project_path: &Path) -> Result<()> {
    let livepolls_dir = project_path.join(LIVEPOLLS_DIR);

    if !livepolls_dir.exists() {
        std::fs::create_dir_all(&livepolls_dir)
            .map_err(|e| Error::config(format!("Failed to create .livepolls dir: {}", e)))?;
    }

    let config_path = livepolls_dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        let default_content = r#"# LivePolls Configuration

[realtime]
schema = "public"
polls_table = "polls"
options_table = "options"

[engine]
message_buffer = 256    # Pending channel events before forwarders wait
event_buffer = 256      # Engine events kept for slow subscribers

[behavior]
refresh_on_reconnect = false   # Bulk refresh after every reconnect
transport_logging = false      # Log transport open/close at info level
"#;
        std::fs::write(&config_path, default_content)
            .map_err(|e| Error::config(format!("Failed to write config.toml: {}", e)))?;
    }

    Ok(())
}
