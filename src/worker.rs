//! The single writer.
//!
//! One named thread per open store owns the [`Database`] and runs jobs in the
//! order they were queued. Every mutation runs in its own transaction: resolve
//! the request, execute the command, record it, commit, then publish a fresh
//! [`Snapshot`] and the matching event. Callers hold a [`Pending`] handle that
//! completes when their job has finished; dropping it does not stop the job.

use rusqlite::{Connection, Transaction};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread;
use tokio::sync::{mpsc, oneshot, watch};

use crate::commands::{history, resolve, Command, Resolved};
use crate::config::Config;
use crate::db::{self, Database};
use crate::error::{Result, StoreError};
use crate::events::EventBus;
use crate::import::{self, ImportSummary};
use crate::model::ImageId;
use crate::projection::Snapshot;

pub(crate) type Job = Box<dyn FnOnce(&mut Engine) + Send>;

pub(crate) enum Message {
    Run(Job),
    /// Processed after every job queued before it; answered once the connection is released.
    Shutdown(oneshot::Sender<()>),
}

/// Worker-side state. Only ever touched from the worker thread.
pub struct Engine {
    db: Database,
    config: Config,
    events: EventBus,
    projection: watch::Sender<Arc<Snapshot>>,
    selected: Option<ImageId>,
    version: u64,
}

impl Engine {
    fn open(
        config: Config,
        read_only: bool,
        events: EventBus,
        projection: watch::Sender<Arc<Snapshot>>,
    ) -> Result<Self> {
        let db = if read_only {
            Database::open_read_only(&config.db_path)?
        } else {
            Database::open(&config.db_path)?
        };
        let mut engine = Self {
            db,
            config,
            events,
            projection,
            selected: None,
            version: 0,
        };
        engine.publish()?;
        Ok(engine)
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.projection.borrow().clone()
    }

    /// Rebuilds the projection from the tables and hands it to readers.
    fn publish(&mut self) -> Result<()> {
        let version = self.version + 1;
        let snapshot = Snapshot::build(self.db.conn(), version, self.selected)?;
        self.selected = snapshot.selected;
        self.version = version;
        self.projection.send_replace(Arc::new(snapshot));
        Ok(())
    }

    /// Publishes after a commit. The commit already happened, so a failed
    /// rebuild is reported but does not fail the caller.
    fn publish_committed(&mut self) {
        if let Err(e) = self.publish() {
            tracing::error!(error = %e, "Failed to rebuild projection");
            self.events.error(&e);
        }
    }

    fn report<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.events.error(e);
        }
        result
    }

    /// Resolves and applies one logged command.
    pub fn run_command<T>(
        &mut self,
        request: impl FnOnce(&Connection, &Config) -> Result<Resolved<T>>,
    ) -> Result<T> {
        let result = self.apply_command(request);
        match result {
            Ok((output, Some(description))) => {
                self.publish_committed();
                tracing::info!(command = %description, version = self.version, "Command applied");
                self.events.info(description);
                Ok(output)
            }
            Ok((output, None)) => Ok(output),
            Err(e) => self.report(Err(e)),
        }
    }

    fn apply_command<T>(
        &mut self,
        request: impl FnOnce(&Connection, &Config) -> Result<Resolved<T>>,
    ) -> Result<(T, Option<String>)> {
        let tx = self.db.transaction()?;
        let Resolved {
            command,
            output,
            created_files,
        } = request(&*tx, &self.config)?;
        let Some(command) = command else {
            return Ok((output, None));
        };

        match commit_command(tx, &command) {
            Ok(()) => Ok((output, Some(command.description()))),
            Err(e) => {
                resolve::remove_files(&created_files);
                Err(e)
            }
        }
    }

    fn run_history(
        &mut self,
        label: &str,
        step: impl FnOnce(&Transaction) -> Result<String>,
    ) -> Result<()> {
        match self.history_step(step) {
            Ok(description) => {
                self.publish_committed();
                tracing::info!(command = %description, "{}", label);
                self.events.info(format!("{}: {}", label, description));
                Ok(())
            }
            Err(e) => self.report(Err(e)),
        }
    }

    fn history_step(&mut self, step: impl FnOnce(&Transaction) -> Result<String>) -> Result<String> {
        let tx = self.db.transaction()?;
        let description = step(&tx)?;
        tx.commit()?;
        Ok(description)
    }

    pub fn undo(&mut self) -> Result<()> {
        self.run_history("Undo", history::undo)
    }

    pub fn redo(&mut self) -> Result<()> {
        self.run_history("Redo", history::redo)
    }

    /// Changes the transient selection. Not logged, allowed on read-only stores.
    pub fn select(&mut self, image: Option<ImageId>) -> Result<()> {
        if let Some(id) = image {
            if db::images::get(self.db.conn(), id)?.is_none() {
                return self.report(Err(StoreError::not_found("image", id)));
            }
        }
        self.selected = image;
        self.publish_committed();
        Ok(())
    }

    /// Discards all history and reclaims space. Returns the number of dropped entries.
    pub fn compact(&mut self) -> Result<usize> {
        match self.compact_inner() {
            Ok(dropped) => {
                self.publish_committed();
                tracing::info!(dropped, "History compacted");
                self.events
                    .info(format!("Compacted store, discarded {} history entries", dropped));
                Ok(dropped)
            }
            Err(e) => self.report(Err(e)),
        }
    }

    /// Once the log is gone no redo can bring back an image, so library copies
    /// without a row are removed too.
    fn compact_inner(&mut self) -> Result<usize> {
        let tx = self.db.transaction()?;
        let dropped = history::compact(&tx)?;
        tx.commit()?;
        self.db.vacuum()?;
        let removed = resolve::prune_library(self.db.conn(), &self.config.library_dir())?;
        if removed > 0 {
            tracing::info!(removed, "Removed unreferenced library copies");
        }
        Ok(dropped)
    }

    /// Imports directories into an empty store in one transaction, without history.
    pub fn import_directories(&mut self, directories: &[PathBuf]) -> Result<ImportSummary> {
        let result = self.import_inner(directories);
        match result {
            Ok(summary) => {
                self.publish_committed();
                tracing::info!(
                    images = summary.images,
                    tags = summary.tags,
                    assignments = summary.assignments,
                    "Import complete"
                );
                self.events.info(format!(
                    "Imported {} images with {} tags",
                    summary.images, summary.tags
                ));
                Ok(summary)
            }
            Err(e) => self.report(Err(e)),
        }
    }

    fn import_inner(&mut self, directories: &[PathBuf]) -> Result<ImportSummary> {
        if self.db.is_read_only() {
            return Err(StoreError::ReadOnly);
        }
        if !db::is_fresh(self.db.conn())? {
            return Err(StoreError::NotFresh);
        }
        self.events
            .info(format!("Importing {} directories", directories.len()));
        let dataset = import::load_directories(directories, &self.config.import, &self.events)?;

        let tx = self.db.transaction()?;
        dataset.write(&tx)?;
        tx.commit()?;
        Ok(ImportSummary::of(&dataset))
    }
}

/// Validates, executes and records `command`, then commits. Dropping `tx` on
/// any error rolls everything back.
fn commit_command(tx: Transaction, command: &Command) -> Result<()> {
    command.execute_validated(&tx)?;
    history::record(&tx, command)?;
    tx.commit()?;
    Ok(())
}

fn run(mut engine: Engine, mut jobs: mpsc::UnboundedReceiver<Message>) {
    while let Some(message) = jobs.blocking_recv() {
        match message {
            Message::Run(job) => job(&mut engine),
            Message::Shutdown(done) => {
                drop(engine);
                tracing::info!("Store closed");
                let _ = done.send(());
                return;
            }
        }
    }
    tracing::debug!("All store handles dropped, worker exiting");
}

/// Channels connecting a [`crate::Store`] to its worker.
pub(crate) struct Spawned {
    pub jobs: mpsc::UnboundedSender<Message>,
    pub snapshots: watch::Receiver<Arc<Snapshot>>,
    pub ready: oneshot::Receiver<Result<()>>,
}

/// Starts the worker thread. It opens the database itself, so the connection
/// never leaves that thread; `ready` reports how opening went.
pub(crate) fn spawn(config: Config, read_only: bool, events: EventBus) -> Result<Spawned> {
    let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
    let (projection_tx, snapshots) = watch::channel(Arc::new(Snapshot::loading()));
    let (ready_tx, ready) = oneshot::channel();

    thread::Builder::new()
        .name("captionset-worker".to_string())
        .spawn(move || {
            events.info(format!("Opening store {}", config.db_path.display()));
            let path = config.db_path.clone();
            match Engine::open(config, read_only, events.clone(), projection_tx) {
                Ok(engine) => {
                    tracing::info!(path = %path.display(), read_only, "Store opened");
                    events.info("Store ready");
                    let _ = ready_tx.send(Ok(()));
                    run(engine, jobs_rx);
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Failed to open store");
                    events.error(&e);
                    let _ = ready_tx.send(Err(e));
                }
            }
        })
        .map_err(|e| StoreError::io("captionset-worker", e))?;

    Ok(Spawned {
        jobs: jobs_tx,
        snapshots,
        ready,
    })
}

enum State<T> {
    Waiting(oneshot::Receiver<Result<T>>),
    Ready(Option<Result<T>>),
}

/// Completion handle for a queued job.
///
/// Resolves to [`StoreError::Cancelled`] if the worker went away before
/// answering.
#[must_use = "the job runs regardless, but its result is only observable by awaiting"]
pub struct Pending<T> {
    state: State<T>,
}

impl<T> Pending<T> {
    pub(crate) fn waiting(rx: oneshot::Receiver<Result<T>>) -> Self {
        Self {
            state: State::Waiting(rx),
        }
    }

    pub(crate) fn ready(result: Result<T>) -> Self {
        Self {
            state: State::Ready(Some(result)),
        }
    }
}

impl<T> Unpin for Pending<T> {}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            State::Waiting(rx) => Pin::new(rx)
                .poll(cx)
                .map(|received| received.unwrap_or_else(|_| Err(StoreError::Cancelled))),
            State::Ready(result) => {
                Poll::Ready(result.take().unwrap_or(Err(StoreError::Cancelled)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ready_handle_resolves_immediately() {
        let pending = Pending::ready(Ok(7));
        assert_eq!(pending.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_dropped_sender_is_cancelled() {
        let (tx, rx) = oneshot::channel::<Result<()>>();
        drop(tx);
        assert!(matches!(
            Pending::waiting(rx).await,
            Err(StoreError::Cancelled)
        ));
    }
}
