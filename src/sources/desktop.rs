use crate::sources::{CommandSpec, Item, Source};
use anyhow::Result;
use directories::BaseDirs;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

/// Applications described by `.desktop` files.
pub struct DesktopSource {
    dirs: Vec<PathBuf>,
}

impl DesktopSource {
    /// The user's applications directory, then the system ones.
    pub fn system() -> Self {
        let mut dirs = Vec::new();
        if let Some(base_dirs) = BaseDirs::new() {
            dirs.push(base_dirs.data_dir().join("applications"));
        }
        dirs.push(PathBuf::from("/usr/share/applications"));
        dirs.push(PathBuf::from("/usr/local/share/applications"));
        Self { dirs }
    }

    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }
}

impl Source for DesktopSource {
    fn name(&self) -> &'static str {
        "desktop"
    }

    fn scan(&self) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        for dir in self.dirs.iter().filter(|dir| dir.is_dir()) {
            debug!("Scanning desktop files in {:?}", dir);
            let Ok(read_dir) = fs::read_dir(dir) else {
                continue;
            };
            for entry in read_dir.flatten() {
                let path = entry.path();
                if path.extension().and_then(|s| s.to_str()) != Some("desktop") {
                    continue;
                }
                if let Some(item) = read_desktop_file(&path) {
                    items.push(item);
                }
            }
        }
        info!("DesktopSource: found {} entries", items.len());
        Ok(items)
    }
}

fn read_desktop_file(path: &Path) -> Option<Item> {
    let content = fs::read_to_string(path).ok()?;
    let app = DesktopEntry::parse(&content)?;
    Some(Item {
        path: path.to_string_lossy().to_string(),
        display_name: app.name,
        // Commands are unique by name, so the command line names itself.
        command: Some(CommandSpec {
            name: app.exec.clone(),
            template: app.exec,
        }),
    })
}

#[derive(Debug, PartialEq, Eq)]
struct DesktopEntry {
    name: String,
    exec: String,
}

impl DesktopEntry {
    /// Reads the `[Desktop Entry]` group. Hidden entries and entries
    /// without a name or command line are skipped.
    fn parse(content: &str) -> Option<Self> {
        let mut name = None;
        let mut exec = None;
        let mut hidden = false;
        let mut in_group = false;

        for line in content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with('[') {
                in_group = line == "[Desktop Entry]";
                continue;
            }
            if !in_group {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key.trim() {
                "Name" => name = Some(value.trim().to_string()),
                "Exec" => exec = Some(strip_field_codes(value)),
                "NoDisplay" | "Hidden" => hidden |= value.trim() == "true",
                "Type" if value.trim() != "Application" => return None,
                _ => {}
            }
        }

        if hidden {
            return None;
        }
        match (name, exec) {
            (Some(name), Some(exec)) if !name.is_empty() && !exec.is_empty() => Some(Self { name, exec }),
            _ => None,
        }
    }
}

/// Drops `%u`, `%F` and the like; a leftover `%f` would otherwise receive
/// the path of the desktop file.
fn strip_field_codes(exec: &str) -> String {
    exec.split_whitespace()
        .filter(|word| !(word.len() == 2 && word.starts_with('%')))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIREFOX: &str = "\
[Desktop Entry]
Type=Application
Name=Firefox
Exec=firefox %u
Icon=firefox

[Desktop Action new-window]
Name=New Window
Exec=firefox --new-window %u
";

    #[test]
    fn parses_main_group_only() {
        assert_eq!(
            DesktopEntry::parse(FIREFOX),
            Some(DesktopEntry {
                name: "Firefox".into(),
                exec: "firefox".into()
            })
        );
    }

    #[test]
    fn skips_hidden_and_incomplete_entries() {
        assert_eq!(DesktopEntry::parse("[Desktop Entry]\nName=x\nExec=x\nNoDisplay=true\n"), None);
        assert_eq!(DesktopEntry::parse("[Desktop Entry]\nName=x\n"), None);
        assert_eq!(DesktopEntry::parse("[Desktop Entry]\nType=Link\nName=x\nExec=x\n"), None);
    }

    #[test]
    fn field_codes_are_removed() {
        assert_eq!(strip_field_codes("gimp-2.10 %U"), "gimp-2.10");
        assert_eq!(strip_field_codes("vlc --started-from-file %F --x"), "vlc --started-from-file --x");
    }

    #[test]
    fn scans_desktop_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("firefox.desktop"), FIREFOX).unwrap();
        fs::write(dir.path().join("notes.txt"), "[Desktop Entry]\nName=x\nExec=x\n").unwrap();

        let items = DesktopSource::new(vec![dir.path().to_path_buf()]).scan().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].display_name, "Firefox");
        assert!(items[0].path.ends_with("firefox.desktop"));
        assert_eq!(
            items[0].command,
            Some(CommandSpec {
                name: "firefox".into(),
                template: "firefox".into()
            })
        );
    }
}
