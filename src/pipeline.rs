use std::{
    ops::Range,
    path::{Path, PathBuf},
    time::Duration,
};

use tracing::{debug, error, info, warn};

use crate::{
    outside::{ListingOrder, VideoSource},
    progress::{ProgressRecord, ProgressStore},
    publish::Publisher,
    result::{Error, Result},
    types::{ItemDescriptor, PublishMetadata, PublishSettings},
};

/// How many videos a pass goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Only the video at the cursor
    Single,
    /// Every video from the cursor to the end of the listing
    Bulk,
}

impl Mode {
    pub fn from_process_all(process_all: bool) -> Self {
        if process_all {
            Mode::Bulk
        } else {
            Mode::Single
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub account: String,
    pub mode: Mode,
    /// Pause after every upload in bulk mode, except the last one
    pub delay: Duration,
    pub publish: PublishSettings,
    /// Delete the downloaded file once the video is recorded as uploaded
    pub prune_after_publish: bool,
}

/// What happened to one video during a pass
#[derive(Debug)]
pub enum ItemOutcome {
    /// Already uploaded by a previous pass
    Skipped,
    MaterializeFailed(Error),
    PublishFailed(Error),
    Published { remote_id: String, file: PathBuf },
    /// Online at the destination, but the progress could not be saved
    PublishedUnrecorded { remote_id: String },
}

#[derive(Debug)]
pub struct ItemReport {
    /// Position in the oldest-first listing
    pub index: usize,
    pub id: String,
    pub outcome: ItemOutcome,
}

/// Summary of a pass
#[derive(Debug)]
pub struct PassReport {
    pub mode: Mode,
    /// Number of videos in the listing
    pub total: usize,
    /// Cursor of the last progress record successfully saved (or loaded)
    pub cursor: usize,
    pub items: Vec<ItemReport>,
}

impl PassReport {
    fn new(mode: Mode) -> Self {
        Self {
            mode,
            total: 0,
            cursor: 0,
            items: Vec::new(),
        }
    }

    fn count(&self, f: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.items.iter().filter(|item| f(&item.outcome)).count()
    }

    pub fn published(&self) -> usize {
        self.count(|outcome| matches!(outcome, ItemOutcome::Published { .. }))
    }

    pub fn unrecorded(&self) -> usize {
        self.count(|outcome| matches!(outcome, ItemOutcome::PublishedUnrecorded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, ItemOutcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| {
            matches!(
                outcome,
                ItemOutcome::MaterializeFailed(_) | ItemOutcome::PublishFailed(_)
            )
        })
    }

    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.cursor)
    }

    fn log_summary(&self) {
        info!("Upload summary");
        info!("Successful: {}", self.published());
        if self.skipped() > 0 {
            info!("Already uploaded: {}", self.skipped());
        }
        info!("Failed: {}", self.failed());
        if self.unrecorded() > 0 {
            error!("Uploaded but not recorded: {}", self.unrecorded());
        }
        for item in &self.items {
            match &item.outcome {
                ItemOutcome::Published { remote_id, .. } => {
                    debug!("  #{} {} -> {remote_id}", item.index + 1, item.id)
                }
                ItemOutcome::PublishedUnrecorded { remote_id } => error!(
                    "  #{} {} -> {remote_id} (not recorded, the next run uploads it again)",
                    item.index + 1,
                    item.id
                ),
                ItemOutcome::MaterializeFailed(_) | ItemOutcome::PublishFailed(_) => {
                    info!("  #{} {} failed", item.index + 1, item.id)
                }
                ItemOutcome::Skipped => {}
            }
        }
        info!("Total progress: {}/{}", self.cursor.min(self.total), self.total);

        if self.total > 0 && self.remaining() == 0 {
            info!("All videos uploaded! ({} total)", self.total);
        } else if self.total > 0 {
            info!("Remaining: {} videos", self.remaining());
            if self.mode == Mode::Single {
                info!("Run again to upload the next video");
            }
        }
    }
}

/// Progress of the transfers, computed without changing anything
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub cursor: usize,
    pub completed: usize,
    pub remaining: usize,
}

/// One pass of the transfer: list, pick the videos, download, upload, record
pub struct Pipeline<'a, P: Publisher> {
    source: &'a dyn VideoSource,
    publisher: &'a P,
    store: &'a dyn ProgressStore,
    settings: PipelineSettings,
    pause: Box<dyn FnMut(Duration) + 'a>,
}

impl<'a, P: Publisher> Pipeline<'a, P> {
    pub fn new(
        source: &'a dyn VideoSource,
        publisher: &'a P,
        store: &'a dyn ProgressStore,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            source,
            publisher,
            store,
            settings,
            pause: Box::new(std::thread::sleep),
        }
    }

    /// Replace the function used to wait between two uploads
    pub fn with_pause<F: FnMut(Duration) + 'a>(mut self, pause: F) -> Self {
        self.pause = Box::new(pause);
        self
    }

    /// Run one pass.
    ///
    /// Failures of a single video are counted in the report. Failing to list
    /// the videos, to authenticate or to save the progress stops the pass
    /// with an error. The summary is logged in every case.
    pub fn run(&mut self) -> Result<PassReport> {
        let mut report = PassReport::new(self.settings.mode);
        let res = self.run_pass(&mut report);
        report.log_summary();
        res.map(|()| report)
    }

    /// Compare the saved progress with the current listing
    pub fn status(&self) -> Result<ProgressSnapshot> {
        let items = self.list_items()?;
        let record = self.load()?;

        let completed = items
            .iter()
            .filter(|item| record.is_completed(&item.id))
            .count();

        Ok(ProgressSnapshot {
            total: items.len(),
            cursor: record.cursor,
            completed,
            remaining: items.len().saturating_sub(record.cursor),
        })
    }

    /// List the videos, oldest first
    fn list_items(&self) -> Result<Vec<ItemDescriptor>> {
        let mut items = self
            .source
            .list_items(&self.settings.account)
            .map_err(Error::Enumeration)?;

        if self.source.listing_order() == ListingOrder::NewestFirst {
            items.reverse();
        }
        Ok(items)
    }

    fn run_pass(&mut self, report: &mut PassReport) -> Result<()> {
        let items = self.list_items()?;
        report.total = items.len();

        if items.is_empty() {
            info!("No videos found for {}", self.settings.account);
            return Ok(());
        }

        let mut record = self.load()?;
        report.cursor = record.cursor;
        debug!(
            "Loaded progress: cursor={}, {} videos uploaded",
            record.cursor,
            record.completed_ids.len()
        );

        if record.cursor >= items.len() {
            info!("All {} videos have been uploaded!", items.len());
            return Ok(());
        }

        let window = self.window(record.cursor, items.len());
        match self.settings.mode {
            Mode::Single => info!("Single upload mode: uploading 1 video"),
            Mode::Bulk => info!("Bulk upload mode: uploading {} videos", window.len()),
        }

        let last = window.end - 1;
        let mut session = None;

        for index in window {
            let item = &items[index];
            info!("Progress: {}/{}", index + 1, items.len());
            info!("Video: {}", item.title);

            let outcome = self.process_item(&mut session, &record, item)?;

            let changed = match &outcome {
                ItemOutcome::Skipped => record.advance_past(index),
                ItemOutcome::Published { .. } => record.mark_completed(&item.id, index),
                _ => false,
            };
            let saved = if changed { self.persist(&record) } else { Ok(()) };
            if saved.is_ok() {
                report.cursor = record.cursor;
            }

            let outcome = match (outcome, &saved) {
                (ItemOutcome::Published { remote_id, .. }, Err(_)) => {
                    error!(
                        "Video {} was uploaded as {remote_id} but could not be recorded",
                        item.id
                    );
                    ItemOutcome::PublishedUnrecorded { remote_id }
                }
                (ItemOutcome::Published { remote_id, file }, Ok(())) => {
                    info!("Successfully uploaded {} as {remote_id}", item.id);
                    if self.settings.prune_after_publish {
                        prune(&file);
                    }
                    ItemOutcome::Published { remote_id, file }
                }
                (outcome, _) => outcome,
            };

            let published = matches!(outcome, ItemOutcome::Published { .. });
            report.items.push(ItemReport {
                index,
                id: item.id.clone(),
                outcome,
            });
            saved?;

            if published && self.settings.mode == Mode::Bulk && index < last {
                info!(
                    "Waiting {} seconds before next upload",
                    self.settings.delay.as_secs()
                );
                (self.pause)(self.settings.delay);
            }
        }

        Ok(())
    }

    /// Positions of the videos handled by this pass
    fn window(&self, cursor: usize, len: usize) -> Range<usize> {
        match self.settings.mode {
            Mode::Single => cursor..cursor + 1,
            Mode::Bulk => cursor..len,
        }
    }

    /// Bring one video to a terminal state, without recording it.
    ///
    /// The only error returned is a failure to authenticate, every other
    /// failure is part of the outcome.
    fn process_item(
        &self,
        session: &mut Option<P::Session>,
        record: &ProgressRecord,
        item: &ItemDescriptor,
    ) -> Result<ItemOutcome> {
        if record.is_completed(&item.id) {
            warn!("Already uploaded. Skipping");
            return Ok(ItemOutcome::Skipped);
        }

        let file = match self.source.materialize(item) {
            Ok(file) => file,
            Err(err) => {
                let err = Error::Materialize(err).wrap_err_with(|| format!("Video {}", item.id));
                error!("Failed to download. Skipping: {err}");
                return Ok(ItemOutcome::MaterializeFailed(err));
            }
        };

        let session = match session {
            Some(session) => session,
            empty @ None => {
                debug!("Opening the publisher session");
                let opened = self.publisher.authenticate().map_err(Error::Authentication)?;
                empty.insert(opened)
            }
        };

        let metadata =
            PublishMetadata::for_item(item, &self.settings.account, &self.settings.publish);
        let remote_id = match self.publisher.publish(session, &file, &metadata) {
            Ok(remote_id) => remote_id,
            Err(err) => {
                let err = Error::Publish(err).wrap_err_with(|| format!("Video {}", item.id));
                error!("Error uploading: {err}");
                return Ok(ItemOutcome::PublishFailed(err));
            }
        };

        Ok(ItemOutcome::Published { remote_id, file })
    }

    fn load(&self) -> Result<ProgressRecord> {
        self.store.load().map_err(Error::Persistence)
    }

    fn persist(&self, record: &ProgressRecord) -> Result<()> {
        self.store.save(record).map_err(Error::Persistence)
    }
}

fn prune(file: &Path) {
    match std::fs::remove_file(file) {
        Ok(()) => debug!("Deleted {}", file.display()),
        Err(err) => warn!("Could not delete {}: {err}", file.display()),
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        collections::HashSet,
        path::PathBuf,
    };

    use miette::miette;

    use super::*;
    use crate::progress::JsonFileStore;

    struct FakeSource {
        items: RefCell<Vec<ItemDescriptor>>,
        order: ListingOrder,
        dir: tempfile::TempDir,
        broken: HashSet<String>,
        offline: bool,
        materialized: RefCell<Vec<String>>,
    }

    impl FakeSource {
        fn new(ids: &[&str]) -> Self {
            Self {
                items: RefCell::new(ids.iter().map(|id| item(id)).collect()),
                order: ListingOrder::OldestFirst,
                dir: tempfile::tempdir().unwrap(),
                broken: HashSet::new(),
                offline: false,
                materialized: RefCell::new(Vec::new()),
            }
        }

        fn broken(mut self, id: &str) -> Self {
            self.broken.insert(id.to_owned());
            self
        }

        fn path(&self, id: &str) -> PathBuf {
            self.dir.path().join(format!("{id}.mp4"))
        }
    }

    impl VideoSource for FakeSource {
        fn list_items(&self, account: &str) -> miette::Result<Vec<ItemDescriptor>> {
            assert_eq!(account, "someone");
            if self.offline {
                return Err(miette!("network unreachable"));
            }
            Ok(self.items.borrow().clone())
        }

        fn listing_order(&self) -> ListingOrder {
            self.order
        }

        fn materialize(&self, item: &ItemDescriptor) -> miette::Result<PathBuf> {
            self.materialized.borrow_mut().push(item.id.clone());
            if self.broken.contains(&item.id) {
                return Err(miette!("video removed"));
            }
            let path = self.path(&item.id);
            std::fs::write(&path, b"video").unwrap();
            Ok(path)
        }
    }

    #[derive(Default)]
    struct FakePublisher {
        rejected: RefCell<HashSet<String>>,
        locked_out: bool,
        logins: Cell<usize>,
        published: RefCell<Vec<String>>,
        titles: RefCell<Vec<String>>,
    }

    impl FakePublisher {
        fn rejecting(id: &str) -> Self {
            let publisher = Self::default();
            publisher.rejected.borrow_mut().insert(id.to_owned());
            publisher
        }
    }

    impl Publisher for FakePublisher {
        type Session = usize;

        fn authenticate(&self) -> miette::Result<usize> {
            if self.locked_out {
                return Err(miette!("invalid_grant"));
            }
            self.logins.set(self.logins.get() + 1);
            Ok(self.logins.get())
        }

        fn publish(
            &self,
            session: &usize,
            file: &Path,
            metadata: &PublishMetadata,
        ) -> miette::Result<String> {
            assert_eq!(*session, self.logins.get());
            let id = file.file_stem().unwrap().to_str().unwrap().to_owned();
            if self.rejected.borrow().contains(&id) {
                return Err(miette!("quota exceeded"));
            }
            self.titles.borrow_mut().push(metadata.title.clone());
            self.published.borrow_mut().push(id.clone());
            Ok(format!("yt-{id}"))
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        record: RefCell<ProgressRecord>,
        saves: Cell<usize>,
        read_only: bool,
    }

    impl MemoryStore {
        fn with(cursor: usize, ids: &[&str]) -> Self {
            let store = Self::default();
            *store.record.borrow_mut() = record(cursor, ids);
            store
        }

        fn record(&self) -> ProgressRecord {
            self.record.borrow().clone()
        }
    }

    impl ProgressStore for MemoryStore {
        fn load(&self) -> miette::Result<ProgressRecord> {
            Ok(self.record())
        }

        fn save(&self, record: &ProgressRecord) -> miette::Result<()> {
            if self.read_only {
                return Err(miette!("disk full"));
            }
            self.saves.set(self.saves.get() + 1);
            *self.record.borrow_mut() = record.clone();
            Ok(())
        }
    }

    /// Works until `full` is set
    struct FillingStore<'a> {
        inner: &'a MemoryStore,
        full: Cell<bool>,
    }

    impl ProgressStore for FillingStore<'_> {
        fn load(&self) -> miette::Result<ProgressRecord> {
            self.inner.load()
        }

        fn save(&self, record: &ProgressRecord) -> miette::Result<()> {
            if self.full.get() {
                return Err(miette!("disk full"));
            }
            self.inner.save(record)
        }
    }

    fn item(id: &str) -> ItemDescriptor {
        ItemDescriptor::new(id, format!("Title of {id}"), format!("https://example.com/{id}"))
    }

    fn record(cursor: usize, ids: &[&str]) -> ProgressRecord {
        ProgressRecord {
            cursor,
            completed_ids: ids.iter().map(|id| id.to_string()).collect(),
        }
    }

    fn settings(mode: Mode) -> PipelineSettings {
        PipelineSettings {
            account: "someone".to_owned(),
            mode,
            delay: Duration::from_secs(10),
            publish: PublishSettings::default(),
            prune_after_publish: false,
        }
    }

    fn run(
        source: &FakeSource,
        publisher: &FakePublisher,
        store: &MemoryStore,
        mode: Mode,
    ) -> Result<PassReport> {
        Pipeline::new(source, publisher, store, settings(mode))
            .with_pause(|_| {})
            .run()
    }

    #[test]
    fn single_pass_publishes_the_video_at_the_cursor() {
        let source = FakeSource::new(&["A", "B", "C"]);
        let publisher = FakePublisher::default();
        let store = MemoryStore::with(1, &["A"]);

        let report = run(&source, &publisher, &store, Mode::Single).unwrap();

        assert_eq!(*source.materialized.borrow(), ["B"]);
        assert_eq!(*publisher.published.borrow(), ["B"]);
        assert_eq!(store.record(), record(2, &["A", "B"]));
        assert_eq!(report.published(), 1);
        assert_eq!(report.remaining(), 1);
        assert!(matches!(
            &report.items[0].outcome,
            ItemOutcome::Published { remote_id, .. } if remote_id == "yt-B"
        ));
    }

    #[test]
    fn failed_publish_keeps_the_cursor_and_is_retried_first() {
        let source = FakeSource::new(&["A", "B", "C"]);
        let publisher = FakePublisher::rejecting("B");
        let store = MemoryStore::with(1, &["A"]);

        let report = run(&source, &publisher, &store, Mode::Single).unwrap();
        assert_eq!(store.record(), record(1, &["A"]));
        assert_eq!(store.saves.get(), 0);
        assert_eq!(report.failed(), 1);
        assert!(matches!(
            report.items[0].outcome,
            ItemOutcome::PublishFailed(Error::Publish(_))
        ));

        // The next pass starts again with B
        publisher.rejected.borrow_mut().clear();
        run(&source, &publisher, &store, Mode::Single).unwrap();
        assert_eq!(*source.materialized.borrow(), ["B", "B"]);
        assert_eq!(*publisher.published.borrow(), ["B"]);
        assert_eq!(store.record(), record(2, &["A", "B"]));
    }

    #[test]
    fn failed_download_keeps_the_cursor() {
        let source = FakeSource::new(&["A", "B"]).broken("A");
        let publisher = FakePublisher::default();
        let store = MemoryStore::default();

        let report = run(&source, &publisher, &store, Mode::Single).unwrap();

        assert!(matches!(
            report.items[0].outcome,
            ItemOutcome::MaterializeFailed(Error::Materialize(_))
        ));
        assert!(publisher.published.borrow().is_empty());
        assert_eq!(publisher.logins.get(), 0);
        assert_eq!(store.record(), ProgressRecord::default());
    }

    #[test]
    fn second_pass_without_new_videos_does_nothing() {
        let source = FakeSource::new(&["A", "B", "C"]);
        let publisher = FakePublisher::default();
        let store = MemoryStore::default();

        run(&source, &publisher, &store, Mode::Bulk).unwrap();
        let after_first = store.record();
        let saves = store.saves.get();
        assert_eq!(after_first, record(3, &["A", "B", "C"]));

        source.materialized.borrow_mut().clear();
        let report = run(&source, &publisher, &store, Mode::Bulk).unwrap();

        assert!(source.materialized.borrow().is_empty());
        assert_eq!(publisher.published.borrow().len(), 3);
        assert_eq!(publisher.logins.get(), 1);
        assert_eq!(store.saves.get(), saves);
        assert_eq!(store.record(), after_first);
        assert!(report.items.is_empty());
        assert_eq!(report.remaining(), 0);
    }

    #[test]
    fn single_and_bulk_modes() {
        let ids: Vec<String> = (0..10).map(|n| format!("v{n}")).collect();
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();

        let source = FakeSource::new(&ids);
        let publisher = FakePublisher::default();
        let store = MemoryStore::default();
        let report = run(&source, &publisher, &store, Mode::Single).unwrap();
        assert_eq!(report.items.len(), 1);
        assert_eq!(store.record().cursor, 1);

        let source = FakeSource::new(&ids);
        let publisher = FakePublisher::default();
        let store = MemoryStore::default();
        let report = run(&source, &publisher, &store, Mode::Bulk).unwrap();
        assert_eq!(report.published(), 10);
        assert_eq!(store.record().cursor, 10);
        assert_eq!(*publisher.published.borrow(), ids);
        // Saved after every video
        assert_eq!(store.saves.get(), 10);
    }

    #[test]
    fn bulk_pass_goes_on_after_failures_without_moving_the_cursor_past_them() {
        let source = FakeSource::new(&["A", "B", "C", "D"]).broken("B");
        let publisher = FakePublisher::rejecting("C");
        let store = MemoryStore::default();

        let report = run(&source, &publisher, &store, Mode::Bulk).unwrap();

        assert_eq!(*publisher.published.borrow(), ["A", "D"]);
        assert_eq!(report.published(), 2);
        assert_eq!(report.failed(), 2);
        assert_eq!(store.record(), record(1, &["A", "D"]));

        // B keeps failing: every pass tries it again first and stays behind it
        publisher.rejected.borrow_mut().clear();
        source.materialized.borrow_mut().clear();
        let report = run(&source, &publisher, &store, Mode::Bulk).unwrap();
        assert_eq!(*source.materialized.borrow(), ["B", "C"]);
        assert_eq!(*publisher.published.borrow(), ["A", "D", "C"]);
        assert_eq!(report.skipped(), 1);
        assert_eq!(store.record(), record(1, &["A", "C", "D"]));
    }

    #[test]
    fn pause_only_between_successful_uploads() {
        let source = FakeSource::new(&["A", "B", "C", "D", "E"]).broken("B");
        let publisher = FakePublisher::default();
        let store = MemoryStore::with(0, &["C"]);
        let pauses = Cell::new(0);

        Pipeline::new(&source, &publisher, &store, settings(Mode::Bulk))
            .with_pause(|delay| {
                assert_eq!(delay, Duration::from_secs(10));
                pauses.set(pauses.get() + 1);
            })
            .run()
            .unwrap();

        // After A and D, not after B (failed), C (skipped) nor E (last)
        assert_eq!(pauses.get(), 2);
    }

    #[test]
    fn no_pause_in_single_mode() {
        let source = FakeSource::new(&["A", "B"]);
        let publisher = FakePublisher::default();
        let store = MemoryStore::default();
        let pauses = Cell::new(0);

        Pipeline::new(&source, &publisher, &store, settings(Mode::Single))
            .with_pause(|_| pauses.set(pauses.get() + 1))
            .run()
            .unwrap();

        assert_eq!(pauses.get(), 0);
    }

    #[test]
    fn progress_is_saved_before_the_pause() {
        let source = FakeSource::new(&["A", "B", "C"]);
        let publisher = FakePublisher::default();
        let store = MemoryStore::default();
        let at_first_pause = RefCell::new(None);

        Pipeline::new(&source, &publisher, &store, settings(Mode::Bulk))
            .with_pause(|_| {
                at_first_pause.borrow_mut().get_or_insert_with(|| store.record());
            })
            .run()
            .unwrap();

        // Restart from what was on disk when the process could have been killed
        let crashed = at_first_pause.into_inner().unwrap();
        assert_eq!(crashed, record(1, &["A"]));

        let store = MemoryStore::default();
        *store.record.borrow_mut() = crashed;
        let publisher = FakePublisher::default();
        run(&source, &publisher, &store, Mode::Single).unwrap();

        assert_eq!(*publisher.published.borrow(), ["B"]);
        assert_eq!(store.record(), record(2, &["A", "B"]));
    }

    #[test]
    fn cursor_lagging_behind_completed_ids_is_skipped() {
        let source = FakeSource::new(&["A", "B"]);
        let publisher = FakePublisher::default();
        let store = MemoryStore::with(0, &["A"]);

        let report = run(&source, &publisher, &store, Mode::Single).unwrap();

        assert!(matches!(report.items[0].outcome, ItemOutcome::Skipped));
        assert!(source.materialized.borrow().is_empty());
        assert_eq!(publisher.logins.get(), 0);
        assert_eq!(store.saves.get(), 1);
        assert_eq!(store.record(), record(1, &["A"]));
    }

    #[test]
    fn newest_first_listing_is_reversed() {
        let mut source = FakeSource::new(&["C", "B", "A"]);
        source.order = ListingOrder::NewestFirst;
        let publisher = FakePublisher::default();
        let store = MemoryStore::default();

        run(&source, &publisher, &store, Mode::Single).unwrap();

        assert_eq!(*publisher.published.borrow(), ["A"]);
        assert_eq!(store.record(), record(1, &["A"]));
    }

    #[test]
    fn new_videos_upstream_are_the_only_ones_published() {
        let source = FakeSource::new(&["A", "B"]);
        let publisher = FakePublisher::default();
        let store = MemoryStore::default();
        run(&source, &publisher, &store, Mode::Bulk).unwrap();

        source.items.borrow_mut().push(item("C"));
        run(&source, &publisher, &store, Mode::Bulk).unwrap();

        assert_eq!(*publisher.published.borrow(), ["A", "B", "C"]);
        assert_eq!(store.record(), record(3, &["A", "B", "C"]));
    }

    #[test]
    fn empty_account_is_not_an_error() {
        let source = FakeSource::new(&[]);
        let publisher = FakePublisher::default();
        let store = MemoryStore::with(2, &["A"]);

        let report = run(&source, &publisher, &store, Mode::Bulk).unwrap();

        assert_eq!(report.total, 0);
        assert!(report.items.is_empty());
        assert_eq!(store.saves.get(), 0);
    }

    #[test]
    fn cursor_past_the_listing_means_done() {
        let source = FakeSource::new(&["A", "B"]);
        let publisher = FakePublisher::default();
        let store = MemoryStore::with(5, &["A", "B"]);

        let report = run(&source, &publisher, &store, Mode::Bulk).unwrap();

        assert!(report.items.is_empty());
        assert_eq!(report.remaining(), 0);
        assert_eq!(store.saves.get(), 0);
        assert_eq!(store.record().cursor, 5);
    }

    #[test]
    fn listing_failure_aborts_without_touching_the_progress() {
        let mut source = FakeSource::new(&["A"]);
        source.offline = true;
        let publisher = FakePublisher::default();
        let store = MemoryStore::default();

        let err = run(&source, &publisher, &store, Mode::Bulk).unwrap_err();

        assert!(matches!(err, Error::Enumeration(_)));
        assert_eq!(store.saves.get(), 0);
    }

    #[test]
    fn authentication_happens_once_and_its_failure_aborts() {
        let source = FakeSource::new(&["A", "B", "C"]);
        let publisher = FakePublisher::default();
        let store = MemoryStore::default();
        run(&source, &publisher, &store, Mode::Bulk).unwrap();
        assert_eq!(publisher.logins.get(), 1);

        let source = FakeSource::new(&["A", "B"]);
        let publisher = FakePublisher {
            locked_out: true,
            ..Default::default()
        };
        let store = MemoryStore::default();
        let err = run(&source, &publisher, &store, Mode::Bulk).unwrap_err();

        assert!(matches!(err, Error::Authentication(_)));
        assert!(publisher.published.borrow().is_empty());
        assert_eq!(store.record(), ProgressRecord::default());
    }

    #[test]
    fn save_failure_aborts_the_pass() {
        let source = FakeSource::new(&["A", "B", "C"]);
        let publisher = FakePublisher::default();
        let store = MemoryStore {
            read_only: true,
            ..Default::default()
        };

        let mut report = PassReport::new(Mode::Bulk);
        let err = Pipeline::new(&source, &publisher, &store, settings(Mode::Bulk))
            .with_pause(|_| {})
            .run_pass(&mut report)
            .unwrap_err();

        assert!(matches!(err, Error::Persistence(_)));
        assert_eq!(*publisher.published.borrow(), ["A"]);

        // A is online: the report says so, but not as recorded progress
        assert_eq!(report.items.len(), 1);
        assert!(matches!(
            &report.items[0].outcome,
            ItemOutcome::PublishedUnrecorded { remote_id } if remote_id == "yt-A"
        ));
        assert_eq!(report.published(), 0);
        assert_eq!(report.unrecorded(), 1);
        assert_eq!(report.cursor, 0);
        assert_eq!(report.remaining(), 3);
        assert_eq!(store.record(), ProgressRecord::default());
    }

    #[test]
    fn save_failure_after_a_recorded_video_keeps_the_saved_cursor() {
        let source = FakeSource::new(&["A", "B", "C"]);
        let publisher = FakePublisher::default();
        let store = MemoryStore::default();
        let mut report = PassReport::new(Mode::Bulk);

        // The disk fills up while waiting after A
        let filling = FillingStore {
            inner: &store,
            full: Cell::new(false),
        };
        let err = Pipeline::new(&source, &publisher, &filling, settings(Mode::Bulk))
            .with_pause(|_| filling.full.set(true))
            .run_pass(&mut report)
            .unwrap_err();

        assert!(matches!(err, Error::Persistence(_)));
        assert_eq!(*publisher.published.borrow(), ["A", "B"]);
        assert_eq!(report.published(), 1);
        assert_eq!(report.unrecorded(), 1);
        assert_eq!(report.cursor, 1);
        assert_eq!(store.record(), record(1, &["A"]));
    }

    #[test]
    fn unreadable_progress_aborts_before_any_video() {
        let source = FakeSource::new(&["A", "B"]);
        let publisher = FakePublisher::default();
        let dir = tempfile::tempdir().unwrap();
        // A directory where the progress file should be
        let store = JsonFileStore::new(dir.path());

        let err = Pipeline::new(&source, &publisher, &store, settings(Mode::Bulk))
            .with_pause(|_| {})
            .run()
            .unwrap_err();

        assert!(matches!(err, Error::Persistence(_)));
        assert!(source.materialized.borrow().is_empty());
        assert!(publisher.published.borrow().is_empty());
        assert_eq!(publisher.logins.get(), 0);
        assert!(dir.path().is_dir());

        let err = Pipeline::new(&source, &publisher, &store, settings(Mode::Bulk))
            .status()
            .unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
    }

    #[test]
    fn titles_are_truncated_before_publishing() {
        let source = FakeSource::new(&[]);
        let long = ItemDescriptor::new("L", "x".repeat(120), "https://example.com/L");
        source.items.borrow_mut().push(long);
        let publisher = FakePublisher::default();
        let store = MemoryStore::default();

        run(&source, &publisher, &store, Mode::Single).unwrap();

        let titles = publisher.titles.borrow();
        assert_eq!(titles[0].chars().count(), 100);
        assert!(titles[0].ends_with("..."));
    }

    #[test]
    fn downloads_are_kept_unless_pruning() {
        let source = FakeSource::new(&["A", "B"]);
        let publisher = FakePublisher::default();
        let store = MemoryStore::default();

        run(&source, &publisher, &store, Mode::Single).unwrap();
        assert!(source.path("A").exists());

        let mut pruning = settings(Mode::Single);
        pruning.prune_after_publish = true;
        Pipeline::new(&source, &publisher, &store, pruning)
            .run()
            .unwrap();
        assert!(!source.path("B").exists());
    }

    #[test]
    fn status_does_not_write() {
        let source = FakeSource::new(&["A", "B", "C"]);
        let publisher = FakePublisher::default();
        let store = MemoryStore::with(1, &["A", "C"]);

        let snapshot = Pipeline::new(&source, &publisher, &store, settings(Mode::Bulk))
            .status()
            .unwrap();

        assert_eq!(
            snapshot,
            ProgressSnapshot {
                total: 3,
                cursor: 1,
                completed: 2,
                remaining: 2,
            }
        );
        assert_eq!(store.saves.get(), 0);
        assert!(source.materialized.borrow().is_empty());
    }
}
