use crate::sources::{Item, Source};
use anyhow::Result;
use log::{debug, info, warn};
use std::path::PathBuf;
use walkdir::WalkDir;

/// Every regular file below the configured directories. Hidden files and
/// directories are skipped.
pub struct FilesSource {
    roots: Vec<PathBuf>,
}

impl FilesSource {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }
}

impl Source for FilesSource {
    fn name(&self) -> &'static str {
        "files"
    }

    fn scan(&self) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        for root in &self.roots {
            debug!("Scanning files in {:?}", root);
            let walker = WalkDir::new(root)
                .follow_links(false)
                .into_iter()
                .filter_entry(|entry| entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.'));
            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("FilesSource: {}", e);
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                items.push(Item {
                    path: entry.path().to_string_lossy().to_string(),
                    display_name: entry.file_name().to_string_lossy().to_string(),
                    command: None,
                });
            }
        }
        info!("FilesSource: found {} entries", items.len());
        Ok(items)
    }
}
