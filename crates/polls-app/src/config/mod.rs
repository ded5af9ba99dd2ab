//! Configuration file parsing for LivePolls
//!
//! Supports:
//! - `.livepolls/config.toml` - Engine settings

pub mod settings;
pub mod types;

pub use settings::{init_config_dir, load_settings};
pub use types::*;
