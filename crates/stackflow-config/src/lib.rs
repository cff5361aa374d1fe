pub mod error;
mod settings;

pub use error::*;
pub use settings::{GcpSettings, Settings};

use std::path::PathBuf;

/// Get the StackFlow config directory, creating it when missing
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(SettingsError::ConfigDirNotFound)?
        .join("stackflow");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Find the descriptor file of the current project
///
/// Search order:
/// 1. `STACK_FILE` environment variable (direct path)
/// 2. current directory: stack.local.kdl, .stack.local.kdl, stack.kdl, .stack.kdl
/// 3. `./.stackflow/` with the same order
/// 4. `~/.config/stackflow/stack.kdl`
pub fn find_stack_file() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("STACK_FILE") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(path = %path.display(), "STACK_FILE does not exist, searching instead");
    }

    let current_dir = std::env::current_dir()?;
    let candidates = [
        "stack.local.kdl",
        ".stack.local.kdl",
        "stack.kdl",
        ".stack.kdl",
    ];

    for filename in &candidates {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let stack_dir = current_dir.join(".stackflow");
    if stack_dir.is_dir() {
        for filename in &candidates {
            let path = stack_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("stackflow").join("stack.kdl");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(SettingsError::StackFileNotFound)
}
