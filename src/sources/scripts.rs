use crate::config::project_dirs;
use crate::sources::{Item, Source, executables_in};
use anyhow::Result;
use log::{debug, info};
use std::path::PathBuf;

/// Executables the user keeps in the `scripts` directory next to the
/// configuration file.
pub struct ScriptsSource {
    dir: Option<PathBuf>,
}

impl ScriptsSource {
    pub fn user() -> Self {
        Self {
            dir: project_dirs().map(|dirs| dirs.config_dir().join("scripts")),
        }
    }

    pub fn new(dir: PathBuf) -> Self {
        Self { dir: Some(dir) }
    }
}

impl Source for ScriptsSource {
    fn name(&self) -> &'static str {
        "scripts"
    }

    fn scan(&self) -> Result<Vec<Item>> {
        let Some(dir) = self.dir.as_ref().filter(|dir| dir.is_dir()) else {
            debug!("Scripts directory {:?} does not exist, skipping", self.dir);
            return Ok(vec![]);
        };
        debug!("Scanning scripts in {:?}", dir);
        let items = executables_in(dir);
        info!("ScriptsSource: found {} entries", items.len());
        Ok(items)
    }
}
