//! Where catalog entries come from.

use anyhow::Result;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

pub mod bin;
pub mod desktop;
pub mod files;
pub mod scripts;

/// A command as it will be stored in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Unique in the catalog; items sharing a name share the command.
    pub name: String,
    /// `%f` is replaced by the item path.
    pub template: String,
}

/// Something a source found, ready to become a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub path: String,
    pub display_name: String,
    /// None means the configured default command.
    pub command: Option<CommandSpec>,
}

pub trait Source {
    fn name(&self) -> &'static str;
    fn scan(&self) -> Result<Vec<Item>>;
}

/// Command shared by everything that runs by itself.
pub fn execute_command() -> CommandSpec {
    CommandSpec {
        name: "Execute".to_string(),
        template: "%f".to_string(),
    }
}

/// Executable regular files directly inside `dir`, as items run with
/// [`execute_command`].
fn executables_in(dir: &Path) -> Vec<Item> {
    let Ok(read_dir) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut items = Vec::new();
    for entry in read_dir.flatten() {
        let path = entry.path();
        let Ok(metadata) = fs::metadata(&path) else {
            continue;
        };
        if !metadata.is_file() || metadata.permissions().mode() & 0o111 == 0 {
            continue;
        }
        if let Some(file_name) = path.file_name().and_then(|s| s.to_str()) {
            items.push(Item {
                path: path.to_string_lossy().to_string(),
                display_name: file_name.to_string(),
                command: Some(execute_command()),
            });
        }
    }
    items
}

#[cfg(test)]
pub(crate) fn write_executable(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}
