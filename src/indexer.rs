//! Fills the catalog from the configured sources.

use crate::catalog::Catalog;
use crate::config::Config;
use crate::sources::bin::BinSource;
use crate::sources::desktop::DesktopSource;
use crate::sources::files::FilesSource;
use crate::sources::scripts::ScriptsSource;
use crate::sources::{CommandSpec, Item, Source};
use anyhow::{Context, Result};
use log::{info, warn};
use regex::Regex;
use std::collections::HashMap;

/// Name of the command given to items that come without one.
pub const OPEN_COMMAND: &str = "Open";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub indexed: usize,
    pub excluded: usize,
    pub removed: usize,
}

/// The sources enabled in `config`.
pub fn configured_sources(config: &Config) -> Vec<Box<dyn Source>> {
    let mut sources: Vec<Box<dyn Source>> = Vec::new();
    if config.sources.desktop {
        sources.push(Box::new(DesktopSource::system()));
    }
    if config.sources.bin {
        sources.push(Box::new(BinSource::from_env()));
    }
    if config.sources.scripts {
        sources.push(Box::new(ScriptsSource::user()));
    }
    if !config.sources.directories.is_empty() {
        sources.push(Box::new(FilesSource::new(config.sources.directories.clone())));
    }
    sources
}

pub fn index(catalog: &mut Catalog, config: &Config) -> Result<IndexStats> {
    index_sources(catalog, config, &configured_sources(config))
}

/// Scans every source, stores what it found and then drops entries whose
/// files are gone. A failing source is logged and skipped.
pub fn index_sources(
    catalog: &mut Catalog,
    config: &Config,
    sources: &[Box<dyn Source>],
) -> Result<IndexStats> {
    let exclude = config
        .sources
        .exclude
        .iter()
        .map(|pattern| Regex::new(pattern).with_context(|| format!("bad exclude pattern '{}'", pattern)))
        .collect::<Result<Vec<_>>>()?;

    let open = CommandSpec {
        name: OPEN_COMMAND.to_string(),
        template: config.general.default_command.clone(),
    };
    let mut commands: HashMap<String, i64> = HashMap::new();
    let mut stats = IndexStats::default();

    for source in sources {
        let items = match source.scan() {
            Ok(items) => items,
            Err(e) => {
                warn!("Indexer: source {} failed: {:#}", source.name(), e);
                continue;
            }
        };
        for item in items {
            if exclude.iter().any(|re| re.is_match(&item.path)) {
                stats.excluded += 1;
                continue;
            }
            let command = item.command.as_ref().unwrap_or(&open);
            let command_id = match commands.get(&command.name) {
                Some(&id) => id,
                None => {
                    let id = catalog.upsert_command(&command.name, &command.template)?;
                    commands.insert(command.name.clone(), id);
                    id
                }
            };
            store(catalog, &item, command_id)?;
            stats.indexed += 1;
        }
    }

    stats.removed = catalog.remove_stale_entries()?;
    info!(
        "Indexer: {} entries indexed, {} excluded, {} stale removed",
        stats.indexed, stats.excluded, stats.removed
    );
    Ok(stats)
}

fn store(catalog: &mut Catalog, item: &Item, command_id: i64) -> Result<()> {
    catalog.upsert_entry(&item.path, &item.display_name, Some(command_id))?;
    Ok(())
}
