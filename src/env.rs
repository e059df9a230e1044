use std::env;
use std::path::PathBuf;

pub const CONFIG_FILE: &str = "splashup.json";

/// Returns the application directory: the folder the launcher executable
/// lives in. Packages are looked up and downloaded next to the launcher
/// unless the configuration points elsewhere.
pub fn launcher_dir() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn default_config_path() -> PathBuf {
    launcher_dir().join(CONFIG_FILE)
}
