use super::{Pacing, QueryRunner, RunnerId};
use crate::catalog::{Catalog, InterruptHandle, QueryOutcome};
use crate::model::SearchResult;
use crate::result_queue::ResultSender;
use anyhow::{Context, Result};
use log::{debug, warn};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Runs queries against one catalog file on a dedicated thread.
///
/// The thread owns its own catalog connection. Everything else talks to it
/// through `QueryState`, guarded by one mutex, and a condition variable
/// signalled on every change of that state.
pub struct CatalogRunner {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

struct Shared {
    id: RunnerId,
    catalog_path: PathBuf,
    pacing: Pacing,
    state: Mutex<QueryState>,
    changed: Condvar,
}

struct QueryState {
    /// Latest text asked for; may be ahead of `running_query`.
    pending_query: String,
    /// Text whose results are being delivered right now.
    running_query: String,
    result_count: usize,
    started: bool,
    stopping: bool,
    /// Skip the remaining pauses of the pending query.
    consolidating: bool,
    /// Stop flag of the worker's connection, while it has one.
    interrupt: Option<InterruptHandle>,
    sender: ResultSender,
}

impl CatalogRunner {
    /// Checks that the catalog can be opened, then spawns the worker. The
    /// worker connects on `start()`.
    pub fn new(catalog_path: impl AsRef<Path>, pacing: Pacing, sender: ResultSender) -> Result<Self> {
        let catalog_path = catalog_path.as_ref().to_path_buf();
        Catalog::connect(&catalog_path)
            .with_context(|| format!("connection to catalog in {:?} failed", catalog_path))?
            .disconnect();

        let id = RunnerId::next();
        let shared = Arc::new(Shared {
            id,
            catalog_path,
            pacing,
            state: Mutex::new(QueryState {
                pending_query: String::new(),
                running_query: String::new(),
                result_count: 0,
                started: false,
                stopping: false,
                consolidating: false,
                interrupt: None,
                sender,
            }),
            changed: Condvar::new(),
        });

        let worker = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name(format!("ocha-{}", id))
            .spawn(move || run_worker(worker))
            .context("spawning query runner thread")?;

        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    pub fn id(&self) -> RunnerId {
        self.shared.id
    }
}

impl QueryRunner for CatalogRunner {
    fn start(&mut self) {
        debug!("{}: start", self.shared.id);
        let mut state = self.shared.state.lock();
        state.started = true;
        self.shared.changed.notify_all();
    }

    fn set_query(&mut self, query: &str) {
        let query = query.trim();
        let mut state = self.shared.state.lock();
        if state.pending_query == query {
            return;
        }
        if let Some(interrupt) = &state.interrupt {
            debug!("{}: run_query({}) interrupt previous query", self.shared.id, query);
            interrupt.interrupt();
        }
        state.pending_query = query.to_string();
        state.consolidating = false;
        self.shared.changed.notify_all();
    }

    fn consolidate(&mut self) {
        let mut state = self.shared.state.lock();
        if !state.pending_query.is_empty() {
            state.consolidating = true;
            self.shared.changed.notify_all();
        }
    }

    fn stop(&mut self) {
        debug!("{}: stop", self.shared.id);
        let mut state = self.shared.state.lock();
        state.started = false;
        state.pending_query.clear();
        state.running_query.clear();
        state.consolidating = false;
        if let Some(interrupt) = &state.interrupt {
            interrupt.interrupt();
        }
        self.shared.changed.notify_all();
    }

    fn release(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.stop();
        {
            let mut state = self.shared.state.lock();
            state.stopping = true;
            self.shared.changed.notify_all();
        }
        if thread.join().is_err() {
            warn!("{}: worker thread panicked", self.shared.id);
        }
        debug!("{}: released", self.shared.id);
    }
}

impl Drop for CatalogRunner {
    fn drop(&mut self) {
        self.release();
    }
}

fn run_worker(shared: Arc<Shared>) {
    debug!("{}: thread started", shared.id);
    let mut catalog: Option<Catalog> = None;
    let mut state = shared.state.lock();

    while !state.stopping {
        if state.started {
            if catalog.is_none() {
                match MutexGuard::unlocked(&mut state, || Catalog::connect(&shared.catalog_path)) {
                    Ok(conn) => {
                        state.interrupt = Some(conn.interrupt_handle());
                        catalog = Some(conn);
                        continue;
                    }
                    Err(e) => {
                        // Retried on the next state change.
                        warn!("{}: {}", shared.id, e);
                        shared.changed.wait(&mut state);
                        continue;
                    }
                }
            }

            if state.pending_query.is_empty() {
                state.running_query.clear();
            } else if state.pending_query != state.running_query {
                let query = state.pending_query.clone();
                state.running_query = query.clone();
                state.result_count = 0;
                if let Some(conn) = catalog.as_mut() {
                    conn.restart();
                    MutexGuard::unlocked(&mut state, || run_query(&shared, conn, &query));
                }
                continue;
            }
        } else if let Some(conn) = catalog.take() {
            state.interrupt = None;
            MutexGuard::unlocked(&mut state, || conn.disconnect());
            continue;
        }

        shared.changed.wait(&mut state);
    }
    drop(state);

    if let Some(conn) = catalog.take() {
        conn.disconnect();
    }
    debug!("{}: thread done", shared.id);
}

fn run_query(shared: &Shared, catalog: &mut Catalog, query: &str) {
    debug!("{}: execute query: {}", shared.id, query);
    match catalog.search(query, |confidence, result| shared.deliver(query, confidence, result)) {
        Ok(QueryOutcome::Completed) => debug!("{}: finished executing query: {}", shared.id, query),
        Ok(QueryOutcome::Stopped) => debug!("{}: query stopped: {}", shared.id, query),
        Err(e) => warn!(
            "{}: query '{}' on {:?} failed: {}",
            shared.id, query, shared.catalog_path, e
        ),
    }
}

impl Shared {
    /// Called on the worker for every catalog row.
    ///
    /// Pushing happens under the lock and only while `query` is still the
    /// pending one, so nothing reaches the queue for a query that has been
    /// replaced or stopped.
    fn deliver(&self, query: &str, confidence: f32, result: SearchResult) -> ControlFlow<()> {
        let mut state = self.state.lock();
        if state.stopping || state.pending_query != query {
            return ControlFlow::Break(());
        }

        if self.pacing.is_exhausted(state.result_count) {
            return ControlFlow::Break(());
        }
        if !state.sender.push(self.id, query, confidence, result) {
            debug!("{}: nobody is listening, abandoning query({})", self.id, query);
            return ControlFlow::Break(());
        }
        state.result_count += 1;
        let count = state.result_count;

        if self.pacing.is_exhausted(count) {
            debug!("{}: query({}) reached {} results", self.id, query, count);
            return ControlFlow::Break(());
        }

        if let Some(pause) = self.pacing.pause_after(count) {
            debug!("{}: query({}) wait after {} results", self.id, query, count);
            let deadline = Instant::now() + pause;
            while !state.consolidating && !state.stopping && state.pending_query == query {
                if self.changed.wait_until(&mut state, deadline).timed_out() {
                    break;
                }
            }
            if state.stopping || state.pending_query != query {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result_queue;

    fn shared(pacing: Pacing, sender: ResultSender) -> Shared {
        Shared {
            id: RunnerId::next(),
            catalog_path: PathBuf::from("/tmp/catalog"),
            pacing,
            state: Mutex::new(QueryState {
                pending_query: "soggy".to_string(),
                running_query: "soggy".to_string(),
                result_count: 0,
                started: true,
                stopping: false,
                consolidating: false,
                interrupt: None,
                sender,
            }),
            changed: Condvar::new(),
        }
    }

    fn result() -> SearchResult {
        SearchResult {
            entry_id: 1,
            path: "/x/soggy".to_string(),
            display_name: "soggy".to_string(),
            execute_template: "true %f".to_string(),
            catalog_path: PathBuf::from("/tmp/catalog"),
        }
    }

    #[test]
    fn zero_maximum_delivers_nothing() {
        let (sender, _queue) = result_queue::channel();
        let pacing = Pacing {
            maximum: 0,
            ..Pacing::default()
        };
        let shared = shared(pacing, sender);
        assert_eq!(shared.deliver("soggy", 0.5, result()), ControlFlow::Break(()));
        assert_eq!(shared.state.lock().result_count, 0);
    }

    #[test]
    fn gone_consumer_ends_the_query() {
        let (sender, queue) = result_queue::channel();
        drop(queue);
        let shared = shared(Pacing::default(), sender);
        assert_eq!(shared.deliver("soggy", 0.5, result()), ControlFlow::Break(()));
        assert_eq!(shared.state.lock().result_count, 0);
    }

    #[test]
    fn live_consumer_keeps_the_query_going() {
        let (sender, _queue) = result_queue::channel();
        let shared = shared(Pacing::default(), sender);
        assert_eq!(shared.deliver("soggy", 0.5, result()), ControlFlow::Continue(()));
        assert_eq!(shared.deliver("bottom", 0.5, result()), ControlFlow::Break(()));
        assert_eq!(shared.state.lock().result_count, 1);
    }
}
