//! Download dispatcher: plans one task per listed object, skips files that
//! are already complete and fetches the rest on a bounded worker pool.
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::types::ObjectRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipDecision {
    Skip,
    Fetch,
}

/// One planned transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadTask {
    pub key: String,
    pub destination: PathBuf,
    pub expected_size: u64,
    pub decision: SkipDecision,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Skipped,
    Fetched(u64),
    Failed(String),
}

impl TaskOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, TaskOutcome::Failed(_))
    }
}

/// Terminal outcome of one task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskReport {
    pub key: String,
    pub destination: PathBuf,
    pub outcome: TaskOutcome,
}

/// Running totals over task reports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadSummary {
    pub total: u64,
    pub fetched: u64,
    pub skipped: u64,
    pub failed: u64,
    pub bytes_fetched: u64,
}

impl DownloadSummary {
    pub fn record(&mut self, report: &TaskReport) {
        self.total += 1;
        match report.outcome {
            TaskOutcome::Skipped => self.skipped += 1,
            TaskOutcome::Fetched(n) => {
                self.fetched += 1;
                self.bytes_fetched += n;
            }
            TaskOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Local path of `key` relative to the download root: the scope is stripped
/// and `/` becomes the platform separator.
///
/// Keys with `.` or `..` segments are refused so nothing lands outside the
/// root.
pub fn local_relative_path(key: &str, scope: &str) -> Result<PathBuf> {
    let rel = key.strip_prefix(scope).unwrap_or(key);
    let mut path = PathBuf::new();
    for part in rel.split('/').filter(|p| !p.is_empty()) {
        let mut components = Path::new(part).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => path.push(part),
            _ => {
                return Err(Error::LocalIoError(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("refusing unsafe key `{}`", key),
                )))
            }
        }
    }
    if path.as_os_str().is_empty() {
        return Err(Error::LocalIoError(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("key `{}` has no file name below `{}`", key, scope),
        )));
    }
    Ok(path)
}

/// Marker suffix of in-flight temp files.
pub const PART_SUFFIX: &str = ".rgwdl-tmp";

/// Hidden sibling used while a transfer is in flight:
/// `.{name}.{random}.rgwdl-tmp`. Every call picks a fresh name, so attempts
/// never touch another key's file or another attempt's temp file.
pub fn part_path(destination: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(destination.file_name().unwrap_or_default());
    name.push(format!(".{:016x}{}", rand::random::<u64>(), PART_SUFFIX));
    destination.with_file_name(name)
}

/// Whether `path` names a temp file made by [`part_path`].
pub fn is_part_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.starts_with('.') && n.ends_with(PART_SUFFIX))
}

/// A running batch: a stream of [`TaskReport`]s in completion order.
///
/// The stream ends once every task has finished; [`DownloadRun::finish`] then
/// yields the listing error, if the record stream failed.
pub struct DownloadRun {
    reports: mpsc::Receiver<TaskReport>,
    handle: JoinHandle<Result<()>>,
}

impl DownloadRun {
    pub async fn finish(self) -> Result<()> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(Error::LocalIoError(std::io::Error::new(std::io::ErrorKind::Other, e))),
        }
    }
}

impl Stream for DownloadRun {
    type Item = TaskReport;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.reports.poll_recv(cx)
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    client: Client,
    dest_root: PathBuf,
    scope: String,
    concurrency: usize,
    cancel: CancellationToken,
}

impl Dispatcher {
    /// Dispatcher writing under the configured destination, stripping the
    /// configured prefix.
    pub fn new(client: Client) -> Self {
        let config = client.config();
        Self {
            dest_root: config.dest().to_path_buf(),
            scope: config.scope().to_string(),
            concurrency: config.concurrency(),
            cancel: CancellationToken::new(),
            client,
        }
    }

    pub fn scope<T: Into<String>>(mut self, scope: T) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn dest_root<P: Into<PathBuf>>(mut self, dest_root: P) -> Self {
        self.dest_root = dest_root.into();
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Resolve destination and skip decision for one record.
    pub async fn plan_task(&self, record: &ObjectRecord) -> Result<DownloadTask> {
        let destination = self.dest_root.join(local_relative_path(&record.key, &self.scope)?);
        let decision = match fs::metadata(&destination).await {
            Ok(meta) if meta.is_file() && meta.len() == record.size => SkipDecision::Skip,
            _ => SkipDecision::Fetch,
        };
        Ok(DownloadTask {
            key: record.key.clone(),
            destination,
            expected_size: record.size,
            decision,
        })
    }

    /// Plan a batch of records in order.
    pub async fn plan<'a, I>(&self, records: I) -> Vec<Result<DownloadTask>>
    where
        I: IntoIterator<Item = &'a ObjectRecord>,
    {
        let mut tasks = Vec::new();
        for record in records {
            tasks.push(self.plan_task(record).await);
        }
        tasks
    }

    /// Carry out one task. Never panics on I/O or network failure: those
    /// become [`TaskOutcome::Failed`].
    pub async fn execute(&self, task: &DownloadTask) -> TaskOutcome {
        if task.decision == SkipDecision::Skip {
            return TaskOutcome::Skipped;
        }
        let policy = self.client.config().retry();
        match with_retry(policy, "get_object", || self.fetch(task)).await {
            Ok(n) => TaskOutcome::Fetched(n),
            Err(e) => TaskOutcome::Failed(e.to_string()),
        }
    }

    /// One fetch attempt: stream into a fresh temp file, verify, rename.
    async fn fetch(&self, task: &DownloadTask) -> Result<u64> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Some(parent) = task.destination.parent() {
            fs::create_dir_all(parent).await?;
        }
        let part = part_path(&task.destination);
        let written = match self.fetch_to(task, &part).await {
            Ok(n) => n,
            Err(e) => {
                let _ = fs::remove_file(&part).await;
                return Err(e);
            }
        };
        if let Err(e) = fs::rename(&part, &task.destination).await {
            let _ = fs::remove_file(&part).await;
            return Err(e.into());
        }
        Ok(written)
    }

    async fn fetch_to(&self, task: &DownloadTask, part: &Path) -> Result<u64> {
        let object = self.client.get_object(&task.key).await?;
        let announced = object.content_length();
        if let Some(len) = announced {
            if len != task.expected_size {
                return Err(Error::ProtocolError(format!(
                    "`{}` is {} bytes but was listed with {}; object changed since listing",
                    task.key, len, task.expected_size
                )));
            }
        }
        let mut file = fs::File::create(part).await?;
        let mut body = object.into_stream();
        let mut written: u64 = 0;
        loop {
            let chunk = tokio::select! {
                _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                chunk = body.next() => chunk,
            };
            match chunk {
                Some(chunk) => {
                    let chunk = chunk?;
                    file.write_all(&chunk).await?;
                    written += chunk.len() as u64;
                }
                None => break,
            }
        }
        file.flush().await?;
        drop(file);
        if written != task.expected_size {
            return Err(Error::TransientError(format!(
                "short transfer for `{}`: got {} of {} bytes",
                task.key, written, task.expected_size
            )));
        }
        Ok(written)
    }

    /// Plan and execute one record; planning failures are reported as failed
    /// tasks.
    pub async fn process(&self, record: ObjectRecord) -> TaskReport {
        let task = match self.plan_task(&record).await {
            Ok(task) => task,
            Err(e) => {
                warn!(key = %record.key, error = %e, "cannot plan download");
                return TaskReport {
                    destination: self.dest_root.join(&record.key),
                    key: record.key,
                    outcome: TaskOutcome::Failed(e.to_string()),
                };
            }
        };
        let outcome = self.execute(&task).await;
        match &outcome {
            TaskOutcome::Skipped => debug!(key = %task.key, "skip, size matches"),
            TaskOutcome::Fetched(n) => info!(key = %task.key, bytes = n, "fetched"),
            TaskOutcome::Failed(reason) => warn!(key = %task.key, reason = %reason, "download failed"),
        }
        TaskReport {
            key: task.key,
            destination: task.destination,
            outcome,
        }
    }

    /// Download every record of `records` on a pool of `concurrency` workers.
    ///
    /// A failing task never stops the batch. A listing error stops issuing new
    /// tasks, lets in-flight ones finish and is returned by
    /// [`DownloadRun::finish`]. Cancelling the token stops new tasks and
    /// aborts in-flight transfers.
    pub fn run<S>(&self, records: S) -> DownloadRun
    where
        S: Stream<Item = Result<ObjectRecord>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(self.concurrency * 2);
        let dispatcher = self.clone();
        let handle = tokio::spawn(async move { dispatcher.drive(records, tx).await });
        DownloadRun { reports: rx, handle }
    }

    async fn drive<S>(self, records: S, tx: mpsc::Sender<TaskReport>) -> Result<()>
    where
        S: Stream<Item = Result<ObjectRecord>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut workers = JoinSet::new();
        let mut records = std::pin::pin!(records);
        let mut listing: Result<()> = Ok(());
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => break,
                next = records.next() => next,
            };
            let record = match next {
                Some(Ok(record)) => record,
                Some(Err(e)) => {
                    warn!(error = %e, "listing failed, no new downloads will start");
                    listing = Err(e);
                    break;
                }
                None => break,
            };
            if record.is_directory_marker() {
                continue;
            }
            let permit = tokio::select! {
                _ = self.cancel.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            let worker = self.clone();
            let tx = tx.clone();
            workers.spawn(async move {
                let report = worker.process(record).await;
                drop(permit);
                let _ = tx.send(report).await;
            });
            while let Some(done) = workers.try_join_next() {
                if let Err(e) = done {
                    warn!(error = %e, "download worker panicked");
                }
            }
        }
        while let Some(done) = workers.join_next().await {
            if let Err(e) = done {
                warn!(error = %e, "download worker panicked");
            }
        }
        if listing.is_ok() && self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        listing
    }
}
