//! Public handle to an open dataset store.
//!
//! Every mutation is queued to the store's worker and returns a [`Pending`]
//! handle; reads come from the latest published [`Snapshot`] and never wait.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::commands::resolve;
use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::events::{Event, EventBus};
use crate::export::{self, ExportOptions, ExportSummary};
use crate::import::{Dataset, ImportSummary};
use crate::model::{CategoryId, ImageId, NewImage, TagId};
use crate::projection::Snapshot;
use crate::worker::{self, Engine, Job, Message, Pending};

pub struct Store {
    jobs: mpsc::UnboundedSender<Message>,
    events: EventBus,
    snapshots: watch::Receiver<Arc<Snapshot>>,
    config: Config,
    read_only: bool,
    closed: AtomicBool,
}

impl Store {
    /// Opens (creating if needed) the store at `config.db_path` for writing.
    /// Fails with [`StoreError::Locked`] if another writer holds it.
    pub async fn open(config: Config) -> Result<Self> {
        Self::start(config, false).await
    }

    /// Opens an existing store for reading. Mutations fail with [`StoreError::ReadOnly`].
    pub async fn open_read_only(config: Config) -> Result<Self> {
        Self::start(config, true).await
    }

    async fn start(config: Config, read_only: bool) -> Result<Self> {
        let events = EventBus::new(config.events.capacity);
        let spawned = worker::spawn(config.clone(), read_only, events.clone())?;
        spawned.ready.await.map_err(|_| StoreError::Cancelled)??;

        Ok(Self {
            jobs: spawned.jobs,
            events,
            snapshots: spawned.snapshots,
            config,
            read_only,
            closed: AtomicBool::new(false),
        })
    }

    fn submit<T, F>(&self, f: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Engine) -> Result<T> + Send + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Pending::ready(Err(StoreError::Closed));
        }
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move |engine: &mut Engine| {
            let _ = tx.send(f(engine));
        });
        if self.jobs.send(Message::Run(job)).is_err() {
            return Pending::ready(Err(StoreError::Closed));
        }
        Pending::waiting(rx)
    }

    fn submit_write<T, F>(&self, f: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Engine) -> Result<T> + Send + 'static,
    {
        if self.read_only {
            let err = StoreError::ReadOnly;
            self.events.error(&err);
            return Pending::ready(Err(err));
        }
        self.submit(f)
    }

    pub fn add_tags<I, S>(&self, texts: I) -> Pending<Vec<TagId>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let texts: Vec<String> = texts.into_iter().map(Into::into).collect();
        self.submit_write(move |engine| {
            engine.run_command(|conn, _| resolve::add_tags(conn, &texts))
        })
    }

    /// Adds one tag, or returns the ID of the tag that already has this text.
    pub fn add_tag(&self, text: impl Into<String>) -> Pending<TagId> {
        let text = text.into();
        self.submit_write(move |engine| {
            engine.run_command(|conn, _| {
                resolve::add_tags(conn, std::slice::from_ref(&text))?.try_map(|ids| {
                    ids.into_iter()
                        .next()
                        .ok_or_else(|| StoreError::not_found("tag", &text))
                })
            })
        })
    }

    pub fn rename_tag(&self, id: TagId, text: impl Into<String>) -> Pending<()> {
        let text = text.into();
        self.submit_write(move |engine| {
            engine.run_command(|conn, _| resolve::rename_tag(conn, id, &text))
        })
    }

    pub fn delete_tags(&self, ids: Vec<TagId>) -> Pending<()> {
        self.submit_write(move |engine| {
            engine.run_command(|conn, _| resolve::delete_tags(conn, &ids))
        })
    }

    pub fn add_images(&self, images: Vec<NewImage>) -> Pending<Vec<ImageId>> {
        self.submit_write(move |engine| {
            engine.run_command(|conn, config| resolve::add_images(conn, config, &images))
        })
    }

    pub fn add_image(&self, image: NewImage) -> Pending<ImageId> {
        self.submit_write(move |engine| {
            engine.run_command(|conn, config| {
                resolve::add_images(conn, config, std::slice::from_ref(&image))?.try_map(|ids| {
                    ids.into_iter()
                        .next()
                        .ok_or_else(|| StoreError::not_found("image", image.path.display()))
                })
            })
        })
    }

    pub fn delete_images(&self, ids: Vec<ImageId>) -> Pending<()> {
        self.submit_write(move |engine| {
            engine.run_command(|conn, _| resolve::delete_images(conn, &ids))
        })
    }

    /// Assigns every tag in `tags` to every image in `images`. Pairs already
    /// assigned are skipped.
    pub fn assign_tags(&self, images: Vec<ImageId>, tags: Vec<TagId>) -> Pending<()> {
        self.submit_write(move |engine| {
            engine.run_command(|conn, _| resolve::assign(conn, &images, &tags))
        })
    }

    pub fn unassign_tags(&self, images: Vec<ImageId>, tags: Vec<TagId>) -> Pending<()> {
        self.submit_write(move |engine| {
            engine.run_command(|conn, _| resolve::unassign(conn, &images, &tags))
        })
    }

    pub fn add_category(&self, name: impl Into<String>, required: bool) -> Pending<CategoryId> {
        let name = name.into();
        self.submit_write(move |engine| {
            engine.run_command(|conn, _| resolve::add_category(conn, &name, required))
        })
    }

    pub fn remove_category(&self, id: CategoryId) -> Pending<()> {
        self.submit_write(move |engine| {
            engine.run_command(|conn, _| resolve::remove_category(conn, id))
        })
    }

    pub fn set_category_required(&self, id: CategoryId, required: bool) -> Pending<()> {
        self.submit_write(move |engine| {
            engine.run_command(|conn, _| resolve::set_category_required(conn, id, required))
        })
    }

    pub fn set_tag_category(&self, tag: TagId, category: Option<CategoryId>) -> Pending<()> {
        self.submit_write(move |engine| {
            engine.run_command(|conn, _| resolve::set_tag_category(conn, tag, category))
        })
    }

    /// Changes the selected image. Transient: not logged, not undoable.
    pub fn select_image(&self, image: Option<ImageId>) -> Pending<()> {
        self.submit(move |engine| engine.select(image))
    }

    pub fn undo(&self) -> Pending<()> {
        self.submit_write(|engine| engine.undo())
    }

    pub fn redo(&self) -> Pending<()> {
        self.submit_write(|engine| engine.redo())
    }

    /// Discards the undo/redo history and reclaims space. Irreversible.
    pub fn compact(&self) -> Pending<usize> {
        self.submit_write(|engine| engine.compact())
    }

    /// Imports caption directories into this store, which must be empty.
    pub fn import_directories(&self, directories: Vec<PathBuf>) -> Pending<ImportSummary> {
        self.submit_write(move |engine| engine.import_directories(&directories))
    }

    /// Writes the dataset as of every mutation queued before this call.
    pub async fn export_directory(&self, dir: impl Into<PathBuf>) -> Result<ExportSummary> {
        let dir = dir.into();
        let snapshot = self.submit(|engine| Ok(engine.snapshot())).await?;
        let options = ExportOptions {
            copy_images: self.config.export.copy_images,
            caption_extension: self.config.import.caption_extension.clone(),
        };
        let events = self.events.clone();
        tokio::task::spawn_blocking(move || {
            export::export_directory(&snapshot, &dir, &options, &events)
        })
        .await
        .map_err(|_| StoreError::Cancelled)?
    }

    /// Latest published projection.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshots.borrow().clone()
    }

    /// A receiver notified whenever a new snapshot is published.
    pub fn watch(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshots.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// The current contents as an in-memory dataset.
    pub fn dataset(&self) -> Dataset {
        Dataset::from_snapshot(&self.snapshot())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Waits for queued work to finish and releases the database. Later calls
    /// resolve with [`StoreError::Closed`].
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let (tx, rx) = oneshot::channel();
        if self.jobs.send(Message::Shutdown(tx)).is_err() {
            return Ok(());
        }
        let _ = rx.await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::model::{Category, Image, Tag};
    use std::collections::{BTreeMap, BTreeSet};
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    async fn open_store() -> (TempDir, Store) {
        let dir = tempdir().unwrap();
        let store = Store::open(Config::for_store(dir.path().join("set.db")))
            .await
            .unwrap();
        (dir, store)
    }

    fn write_image(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        image::RgbImage::new(2, 2).save(path).unwrap();
    }

    /// Dataset rows visible to readers, ignoring history and selection.
    #[derive(Debug, PartialEq)]
    struct State {
        images: Vec<Image>,
        tags: Vec<Tag>,
        categories: Vec<Category>,
        assignments: BTreeMap<ImageId, BTreeSet<TagId>>,
    }

    fn state(store: &Store) -> State {
        let snap = store.snapshot();
        State {
            images: snap.images.clone(),
            tags: snap.tags.iter().map(|t| t.tag.clone()).collect(),
            categories: snap.categories.clone(),
            assignments: snap.image_tags.clone(),
        }
    }

    /// A mix of every logged command kind, applied one at a time.
    async fn run_commands(store: &Store, dir: &Path) -> usize {
        let path = dir.join("x.png");
        write_image(&path);

        let x = store.add_image(NewImage::new(&path)).await.unwrap();
        let tags = store.add_tags(["red", "blue", "green"]).await.unwrap();
        store.assign_tags(vec![x], tags.clone()).await.unwrap();
        store.rename_tag(tags[0], "crimson").await.unwrap();
        let colour = store.add_category("colour", false).await.unwrap();
        store.set_tag_category(tags[1], Some(colour)).await.unwrap();
        store.set_category_required(colour, true).await.unwrap();
        store.unassign_tags(vec![x], vec![tags[2]]).await.unwrap();
        store.delete_tags(vec![tags[2]]).await.unwrap();
        store.remove_category(colour).await.unwrap();
        store.delete_images(vec![x]).await.unwrap();
        11
    }

    #[tokio::test]
    async fn test_undo_all_restores_initial_state() {
        let (dir, store) = open_store().await;
        store.add_tag("seed").await.unwrap();
        let before = state(&store);

        let n = run_commands(&store, dir.path()).await;
        assert_eq!(store.snapshot().undo_depth, n + 1);
        for _ in 0..n {
            store.undo().await.unwrap();
        }
        assert_eq!(state(&store), before);
        assert_eq!(store.snapshot().undo_description.as_deref(), Some("Add tag 'seed'"));
    }

    #[tokio::test]
    async fn test_undo_then_redo_restores_final_state() {
        let (dir, store) = open_store().await;
        let n = run_commands(&store, dir.path()).await;
        let after = state(&store);

        for k in [1, 4, n] {
            for _ in 0..k {
                store.undo().await.unwrap();
            }
            assert_eq!(store.snapshot().redo_depth, k);
            for _ in 0..k {
                store.redo().await.unwrap();
            }
            assert_eq!(state(&store), after);
        }
        assert!(matches!(store.redo().await, Err(StoreError::NothingToRedo)));
    }

    #[tokio::test]
    async fn test_new_command_discards_redo() {
        let (_dir, store) = open_store().await;
        store.add_tag("red").await.unwrap();
        store.undo().await.unwrap();
        assert!(store.snapshot().can_redo());

        store.add_tag("blue").await.unwrap();
        let snap = store.snapshot();
        assert!(!snap.can_redo());
        assert!(snap.redo_description.is_none());
        assert!(matches!(store.undo().await, Ok(())));
        assert!(matches!(store.undo().await, Err(StoreError::NothingToUndo)));
    }

    #[tokio::test]
    async fn test_add_existing_tag_is_idempotent() {
        let (_dir, store) = open_store().await;
        let first = store.add_tag("red").await.unwrap();
        let depth = store.snapshot().undo_depth;

        let second = store.add_tag("red").await.unwrap();
        let snap = store.snapshot();
        assert_eq!(first, second);
        assert_eq!(snap.tags.len(), 1);
        assert_eq!(snap.undo_depth, depth);
    }

    #[tokio::test]
    async fn test_rename_to_existing_text_fails() {
        let (_dir, store) = open_store().await;
        let red = store.add_tag("red").await.unwrap();
        store.add_tag("blue").await.unwrap();

        let err = store.rename_tag(red, "blue").await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { kind: "tag", .. }));
        assert_eq!(store.snapshot().tag(red).unwrap().tag.text, "red");
    }

    #[tokio::test]
    async fn test_compaction_is_idempotent() {
        let (dir, store) = open_store().await;
        run_commands(&store, dir.path()).await;
        store.undo().await.unwrap();
        let before = state(&store);

        assert!(store.compact().await.unwrap() > 0);
        let snap = store.snapshot();
        assert!(snap.undo_description.is_none());
        assert!(snap.redo_description.is_none());
        assert_eq!(state(&store), before);

        assert_eq!(store.compact().await.unwrap(), 0);
        assert_eq!(state(&store), before);
        assert!(matches!(store.undo().await, Err(StoreError::NothingToUndo)));
    }

    #[tokio::test]
    async fn test_add_assign_then_undo_twice() {
        let (dir, store) = open_store().await;
        let path = dir.path().join("x.png");
        write_image(&path);

        let x = store.add_image(NewImage::new(&path)).await.unwrap();
        let red = store.add_tag("red").await.unwrap();
        store.assign_tags(vec![x], vec![red]).await.unwrap();
        assert_eq!(store.snapshot().undo_description.as_deref(), Some("Assign 1 tag to 1 image"));

        store.undo().await.unwrap();
        store.undo().await.unwrap();

        let snap = store.snapshot();
        assert!(snap.tag_by_text("red").is_none());
        assert_eq!(snap.image_by_name("x").map(|i| i.id), Some(x));
        assert!(snap.tags_of(x).is_empty());
    }

    #[tokio::test]
    async fn test_import_scenario() {
        let (dir, store) = open_store().await;
        let source = dir.path().join("source");
        write_image(&source.join("a.png"));
        std::fs::write(source.join("a.caption"), "cat\ncat\ndog\n").unwrap();
        write_image(&source.join("b.png"));
        std::fs::write(source.join("b.caption"), "dog\n").unwrap();

        let summary = store.import_directories(vec![source]).await.unwrap();
        assert_eq!(summary.images, 2);
        assert_eq!(summary.tags, 2);

        let snap = store.snapshot();
        let texts: Vec<_> = snap.tags.iter().map(|t| t.tag.text.as_str()).collect();
        assert_eq!(texts, vec!["cat", "dog"]);
        let a = snap.image_by_name("a").unwrap().id;
        let b = snap.image_by_name("b").unwrap().id;
        assert_eq!(snap.tag_texts_of(a), vec!["cat", "dog"]);
        assert_eq!(snap.tag_texts_of(b), vec!["dog"]);
        assert_eq!(snap.tag_by_text("dog").unwrap().assignment_count, 2);
        assert!(!snap.can_undo());

        let again = store
            .import_directories(vec![dir.path().join("source")])
            .await
            .unwrap_err();
        assert!(matches!(again, StoreError::NotFresh));
    }

    #[tokio::test]
    async fn test_failed_import_leaves_store_empty() {
        let (dir, store) = open_store().await;
        let source = dir.path().join("source");
        write_image(&source.join("a.png"));
        std::fs::write(source.join("a.caption"), "cat\n\"quoted\n").unwrap();
        let mut events = store.subscribe();

        let err = store.import_directories(vec![source]).await.unwrap_err();
        assert_eq!(err.code().as_str(), "error-import");
        assert!(store.snapshot().images.is_empty());

        let mut codes = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let Some(err) = event.as_error() {
                codes.push(err.code.clone());
            }
        }
        assert_eq!(codes, vec!["error-caption", "error-import"]);
    }

    #[tokio::test]
    async fn test_required_category_blocks_removal() {
        let (dir, store) = open_store().await;
        let path = dir.path().join("x.png");
        write_image(&path);
        let x = store.add_image(NewImage::new(&path)).await.unwrap();
        let cat = store.add_tag("cat").await.unwrap();
        let subject = store.add_category("subject", true).await.unwrap();
        store.set_tag_category(cat, Some(subject)).await.unwrap();
        store.assign_tags(vec![x], vec![cat]).await.unwrap();

        let err = store.unassign_tags(vec![x], vec![cat]).await.unwrap_err();
        assert!(matches!(err, StoreError::RequiredCategory { .. }));
        assert_eq!(store.snapshot().tags_of(x).len(), 1);

        let err = store.delete_tags(vec![cat]).await.unwrap_err();
        assert!(matches!(err, StoreError::RequiredCategory { .. }));

        let err = store.set_tag_category(cat, None).await.unwrap_err();
        assert!(matches!(err, StoreError::RequiredCategory { .. }));
        assert_eq!(
            store.snapshot().tag(cat).and_then(|t| t.tag.category),
            Some(subject)
        );

        store.set_category_required(subject, false).await.unwrap();
        store.unassign_tags(vec![x], vec![cat]).await.unwrap();
        assert!(store.snapshot().tags_of(x).is_empty());
    }

    #[tokio::test]
    async fn test_compaction_removes_unreferenced_library_copies() {
        let dir = tempdir().unwrap();
        let mut config = Config::for_store(dir.path().join("set.db"));
        config.images.copy_on_add = true;
        let library = config.library_dir();
        let store = Store::open(config).await.unwrap();

        for name in ["a", "b"] {
            write_image(&dir.path().join(format!("{name}.png")));
        }
        let a = store
            .add_image(NewImage::new(dir.path().join("a.png")))
            .await
            .unwrap();
        store
            .add_image(NewImage::new(dir.path().join("b.png")))
            .await
            .unwrap();
        store.undo().await.unwrap();
        assert_eq!(std::fs::read_dir(&library).unwrap().count(), 2);

        store.compact().await.unwrap();
        let remaining: Vec<PathBuf> = std::fs::read_dir(&library)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(remaining.len(), 1);
        assert_eq!(Some(&remaining[0]), store.snapshot().image(a).map(|i| &i.path));
    }

    #[tokio::test]
    async fn test_image_names_cannot_leave_export_directory() {
        let (dir, store) = open_store().await;
        let path = dir.path().join("x.png");
        write_image(&path);
        let outside = dir.path().join("outside").join("evil");

        for name in [outside.to_string_lossy().to_string(), "../../sibling".to_string()] {
            let err = store
                .add_image(NewImage::new(&path).with_name(name))
                .await
                .unwrap_err();
            assert!(matches!(err, StoreError::InvalidName { .. }));
        }
        assert!(store.snapshot().images.is_empty());

        store
            .add_image(NewImage::new(&path).with_name("nested/x"))
            .await
            .unwrap();
        let out = dir.path().join("out").join("inner");
        store.export_directory(&out).await.unwrap();
        assert!(out.join("nested/x.caption").exists());
        assert!(!dir.path().join("outside/evil.caption").exists());
        assert!(!dir.path().join("sibling.caption").exists());
    }

    #[tokio::test]
    async fn test_missing_image_fails_without_change() {
        let (dir, store) = open_store().await;
        let mut events = store.subscribe();

        let err = store
            .add_image(NewImage::new(dir.path().join("missing.png")))
            .await
            .unwrap_err();
        assert_eq!(err.code().as_str(), "error-io");
        assert!(store.snapshot().images.is_empty());
        assert!(!store.snapshot().can_undo());

        let event = events.recv().await.unwrap();
        assert!(matches!(event.kind, EventKind::Error(ref e) if e.code == "error-io"));
    }

    #[tokio::test]
    async fn test_selection_is_not_logged() {
        let (dir, store) = open_store().await;
        let path = dir.path().join("x.png");
        write_image(&path);
        let x = store
            .add_image(NewImage::new(&path).with_source("https://example.com/x.png"))
            .await
            .unwrap();
        let red = store.add_tag("red").await.unwrap();
        store.add_tag("blue").await.unwrap();
        store.assign_tags(vec![x], vec![red]).await.unwrap();
        let depth = store.snapshot().undo_depth;
        assert_eq!(
            store.snapshot().image(x).and_then(|i| i.source_uri.as_deref()),
            Some("https://example.com/x.png")
        );

        store.select_image(Some(x)).await.unwrap();
        let snap = store.snapshot();
        assert_eq!(snap.undo_depth, depth);
        let assigned: Vec<_> = snap.assigned_tags().iter().map(|t| t.text.clone()).collect();
        let unassigned: Vec<_> = snap.unassigned_tags().iter().map(|t| t.text.clone()).collect();
        assert_eq!(assigned, vec!["red"]);
        assert_eq!(unassigned, vec!["blue"]);

        let err = store.select_image(Some(ImageId::new())).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: "image", .. }));

        store.delete_images(vec![x]).await.unwrap();
        assert!(store.snapshot().selected.is_none());
    }

    #[tokio::test]
    async fn test_history_survives_reopen() {
        let dir = tempdir().unwrap();
        let config = Config::for_store(dir.path().join("set.db"));

        let store = Store::open(config.clone()).await.unwrap();
        store.add_tag("red").await.unwrap();
        store.close().await.unwrap();
        assert!(matches!(store.add_tag("late").await, Err(StoreError::Closed)));

        let reopened = Store::open(config).await.unwrap();
        let snap = reopened.snapshot();
        assert_eq!(snap.undo_description.as_deref(), Some("Add tag 'red'"));
        reopened.undo().await.unwrap();
        assert!(reopened.snapshot().tags.is_empty());
    }

    #[tokio::test]
    async fn test_second_writer_is_locked_out() {
        let dir = tempdir().unwrap();
        let config = Config::for_store(dir.path().join("set.db"));
        let store = Store::open(config.clone()).await.unwrap();

        let err = Store::open(config.clone()).await.err().unwrap();
        assert!(matches!(err, StoreError::Locked { .. }));

        store.close().await.unwrap();
        assert!(Store::open(config).await.is_ok());
    }

    #[tokio::test]
    async fn test_read_only_store_rejects_mutations() {
        let dir = tempdir().unwrap();
        let config = Config::for_store(dir.path().join("set.db"));
        let store = Store::open(config.clone()).await.unwrap();
        store.add_tag("red").await.unwrap();
        store.close().await.unwrap();

        let reader = Store::open_read_only(config).await.unwrap();
        assert!(reader.is_read_only());
        assert_eq!(reader.snapshot().tags.len(), 1);
        assert!(matches!(reader.add_tag("blue").await, Err(StoreError::ReadOnly)));
        assert!(matches!(reader.undo().await, Err(StoreError::ReadOnly)));
        assert!(matches!(reader.compact().await, Err(StoreError::ReadOnly)));
    }

    #[tokio::test]
    async fn test_export_reflects_queued_writes() {
        let (dir, store) = open_store().await;
        let path = dir.path().join("x.png");
        write_image(&path);
        let x = store.add_image(NewImage::new(&path)).await.unwrap();
        let tags = store.add_tags(["red", "blue"]).await.unwrap();
        let assign = store.assign_tags(vec![x], tags);

        let out = dir.path().join("out");
        let summary = store.export_directory(&out).await.unwrap();
        assign.await.unwrap();
        assert_eq!(summary.captions, 1);
        assert_eq!(
            std::fs::read_to_string(out.join("x.caption")).unwrap(),
            "blue,\nred\n"
        );
    }

    #[tokio::test]
    async fn test_exported_directory_imports_to_same_content() {
        let (dir, store) = open_store().await;
        let path = dir.path().join("x.png");
        write_image(&path);
        let x = store.add_image(NewImage::new(&path)).await.unwrap();
        let tags = store.add_tags(["red", "blue"]).await.unwrap();
        store.assign_tags(vec![x], tags).await.unwrap();
        store.export_directory(dir.path().join("out")).await.unwrap();

        let copy = Store::open(Config::for_store(dir.path().join("copy.db")))
            .await
            .unwrap();
        copy.import_directories(vec![dir.path().join("out")])
            .await
            .unwrap();
        assert_eq!(copy.dataset().content(), store.dataset().content());
    }
}
