use crate::sources::{Item, Source, executables_in};
use anyhow::Result;
use log::{debug, info};
use std::env;
use std::path::PathBuf;

/// Programs found in the directories of `$PATH`.
pub struct BinSource {
    dirs: Vec<PathBuf>,
}

impl BinSource {
    pub fn from_env() -> Self {
        let dirs = env::var_os("PATH")
            .map(|path| env::split_paths(&path).collect())
            .unwrap_or_default();
        Self { dirs }
    }

    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }
}

impl Source for BinSource {
    fn name(&self) -> &'static str {
        "bin"
    }

    fn scan(&self) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        for dir in self.dirs.iter().filter(|dir| dir.is_dir()) {
            debug!("Scanning binaries in {:?}", dir);
            items.extend(executables_in(dir));
        }
        info!("BinSource: found {} entries", items.len());
        Ok(items)
    }
}
