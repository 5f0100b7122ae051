//! Fixed file and directory names below the updkit data directory

pub const APP_DIR: &str = "updkit";
pub const CONFIG_FILE: &str = "config.toml";

pub const STAGING_DIR: &str = "staging";
pub const WORK_DIR: &str = "work";
pub const LOGS_DIR: &str = "logs";

pub const REGISTRY_FILE: &str = "registry.json";
pub const PUBLISH_HISTORY_FILE: &str = "publish-history.json";
