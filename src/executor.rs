use crate::catalog::Catalog;
use crate::model::SearchResult;
use log::{debug, info, warn};
use std::io;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The entry is no longer in its catalog.
    #[error("'{0}' is no longer in the catalog")]
    InvalidResult(String),
    /// The file or program the result points at cannot be reached.
    #[error("cannot reach '{path}': {source}")]
    MissingResource { path: String, source: io::Error },
    #[error("{0}")]
    Failed(String),
}

/// Checks that the result still describes something that can be run.
pub fn validate(result: &SearchResult) -> Result<(), ExecuteError> {
    let mut catalog =
        Catalog::connect(&result.catalog_path).map_err(|e| ExecuteError::Failed(e.to_string()))?;
    let entry = catalog
        .find_entry_by_id(result.entry_id)
        .map_err(|e| ExecuteError::Failed(e.to_string()));
    catalog.disconnect();

    match entry? {
        Some(entry) if entry.path == result.path => {}
        _ => return Err(ExecuteError::InvalidResult(result.path.clone())),
    }

    if result.path.starts_with('/') && !Path::new(&result.path).exists() {
        return Err(ExecuteError::MissingResource {
            path: result.path.clone(),
            source: io::Error::from(io::ErrorKind::NotFound),
        });
    }
    Ok(())
}

/// Runs the result's command in its own process group, then records the use in
/// the catalog. Failing to record the use does not fail the execution.
pub fn execute(result: &SearchResult) -> Result<(), ExecuteError> {
    validate(result)?;

    let line = result.command_line();
    info!("execute: {}", line);
    spawn_detached(&line).map_err(|source| ExecuteError::MissingResource {
        path: result.path.clone(),
        source,
    })?;

    if let Err(e) = record_use(result) {
        warn!("updating last use of {:?} failed: {}", result.path, e);
    }
    Ok(())
}

/// Starts `line` in a process group of its own, so that signals aimed at
/// our group (Ctrl-C in the terminal) leave it running.
fn spawn_detached(line: &str) -> io::Result<u32> {
    let mut child = Command::new("/bin/sh")
        .arg("-c")
        .arg(line)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn()?;
    let pid = child.id();
    thread::spawn(move || match child.wait() {
        Ok(status) => debug!("process {} exited: {}", pid, status),
        Err(e) => debug!("waiting for process {} failed: {}", pid, e),
    });
    Ok(pid)
}

fn record_use(result: &SearchResult) -> Result<(), crate::catalog::CatalogError> {
    let mut catalog = Catalog::connect(&result.catalog_path)?;
    let updated = catalog.update_entry_timestamp(result.entry_id);
    catalog.disconnect();
    if !updated? {
        debug!("entry {} vanished before its use was recorded", result.entry_id);
    }
    Ok(())
}
