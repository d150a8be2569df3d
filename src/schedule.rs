//! Periodic re-indexing.

use crate::catalog::Catalog;
use crate::config::Config;
use crate::indexer;
use anyhow::{Result, bail};
use calloop::timer::{TimeoutAction, Timer};
use calloop::{EventLoop, LoopHandle, RegistrationToken};
use log::{info, warn};
use std::path::PathBuf;
use std::time::Duration;

/// Runs `job` on the loop right away and then every `interval`.
pub fn every<'l, Data, F>(
    handle: &LoopHandle<'l, Data>,
    interval: Duration,
    mut job: F,
) -> Result<RegistrationToken, calloop::Error>
where
    F: FnMut(&mut Data) + 'l,
{
    handle
        .insert_source(Timer::immediate(), move |_, _, data| {
            job(data);
            TimeoutAction::ToDuration(interval)
        })
        .map_err(|e| e.error)
}

struct Watch {
    config: Config,
    catalog_path: PathBuf,
}

impl Watch {
    fn reindex(&mut self) {
        let mut catalog = match Catalog::connect(&self.catalog_path) {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!("watch: {}", e);
                return;
            }
        };
        if let Err(e) = indexer::index(&mut catalog, &self.config) {
            warn!("watch: indexing failed: {:#}", e);
        }
        catalog.disconnect();
    }
}

/// Re-indexes on the configured schedule until the process is killed.
pub fn watch(config: Config) -> Result<()> {
    let Some(interval) = config.general.update_schedule.interval() else {
        bail!("update schedule is manual, run `ocha index` instead");
    };
    let catalog_path = config.catalog_path()?;
    info!("watch: indexing into {:?} every {:?}", catalog_path, interval);

    let mut event_loop: EventLoop<Watch> = EventLoop::try_new()?;
    every(&event_loop.handle(), interval, Watch::reindex)?;

    let mut state = Watch {
        config,
        catalog_path,
    };
    loop {
        event_loop.dispatch(None, &mut state)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpdateSchedule;
    use std::time::Instant;

    #[test]
    fn job_runs_immediately_then_repeats() {
        let mut event_loop: EventLoop<Vec<Instant>> = EventLoop::try_new().unwrap();
        every(&event_loop.handle(), Duration::from_millis(30), |runs: &mut Vec<Instant>| {
            runs.push(Instant::now())
        })
        .unwrap();

        let start = Instant::now();
        let mut runs = Vec::new();
        while runs.len() < 3 && start.elapsed() < Duration::from_secs(5) {
            event_loop.dispatch(Some(Duration::from_millis(10)), &mut runs).unwrap();
        }
        assert_eq!(runs.len(), 3);
        assert!(runs[0] - start < Duration::from_millis(30));
        assert!(runs[2] - runs[1] >= Duration::from_millis(20));
    }

    #[test]
    fn manual_schedule_does_not_watch() {
        let mut config = Config::default();
        config.general.update_schedule = UpdateSchedule::Manual;
        assert!(watch(config).is_err());
    }
}
