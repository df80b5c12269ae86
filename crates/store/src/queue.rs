use crate::error::{Result, StoreError};
use crate::store::StoreWriter;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone)]
pub struct WriteQueueConfig {
    /// Maximum number of queued units of work; `submit` waits beyond it.
    pub capacity: usize,
    /// How long `shutdown` keeps draining the backlog.
    pub shutdown_timeout: Duration,
}

impl Default for WriteQueueConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    Stopped,
    Running,
    Draining,
}

impl QueueState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => QueueState::Running,
            2 => QueueState::Draining,
            _ => QueueState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            QueueState::Stopped => 0,
            QueueState::Running => 1,
            QueueState::Draining => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub state: QueueState,
    pub pending: usize,
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub rejected: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every queued unit of work ran before the worker stopped.
    Drained,
    /// The timeout elapsed first; leftovers resolve with `ShuttingDown`.
    TimedOut,
    AlreadyStopping,
}

/// Pending result of a submitted unit of work.
///
/// Resolves once the writer has executed the unit; awaiting it is optional.
#[must_use = "dropping a WriteHandle discards the write result"]
pub struct WriteHandle<T> {
    sequence: u64,
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> WriteHandle<T> {
    /// Position of this unit in the global write order.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl<T> Future for WriteHandle<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.get_mut().rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(StoreError::WorkerGone)),
            Poll::Pending => Poll::Pending,
        }
    }
}

trait Task: Send {
    /// Execute against the store. Counters are updated before the reply
    /// is sent so callers observe them once their handle resolves.
    fn run(self: Box<Self>, writer: &mut StoreWriter, counters: &Counters) -> bool;
    fn reject(self: Box<Self>, err: StoreError, counters: &Counters);
}

struct WorkItem<F, T> {
    work: F,
    reply: oneshot::Sender<Result<T>>,
}

impl<F, T> Task for WorkItem<F, T>
where
    F: FnOnce(&mut StoreWriter) -> Result<T> + Send,
    T: Send,
{
    fn run(self: Box<Self>, writer: &mut StoreWriter, counters: &Counters) -> bool {
        let WorkItem { work, reply } = *self;
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| work(writer))) {
            Ok(result) => result,
            Err(payload) => Err(StoreError::WorkPanicked(panic_message(payload.as_ref()))),
        };
        let ok = outcome.is_ok();
        let counter = if ok {
            &counters.completed
        } else {
            &counters.failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
        let _ = reply.send(outcome);
        ok
    }

    fn reject(self: Box<Self>, err: StoreError, counters: &Counters) {
        counters.rejected.fetch_add(1, Ordering::Relaxed);
        let _ = self.reply.send(Err(err));
    }
}

enum Message {
    Work { sequence: u64, task: Box<dyn Task> },
    Drain { done: oneshot::Sender<()> },
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
}

struct QueueShared {
    state: AtomicU8,
    drain_deadline: Mutex<Option<Instant>>,
    counters: Counters,
}

impl QueueShared {
    fn state(&self) -> QueueState {
        QueueState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: QueueState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    fn drain_expired(&self) -> bool {
        self.state() == QueueState::Draining
            && self
                .drain_deadline
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Serializes every mutation of the index store onto one writer thread.
///
/// Units of work run strictly in submission order. The backlog is bounded:
/// [`WriteQueue::submit`] waits for a free slot instead of growing memory.
/// An error or panic inside one unit is reported to that unit's handle only.
#[derive(Clone)]
pub struct WriteQueue {
    inner: Arc<WriteQueueInner>,
}

struct WriteQueueInner {
    tx: mpsc::Sender<Message>,
    shared: Arc<QueueShared>,
    config: WriteQueueConfig,
    next_sequence: AtomicU64,
    order: Mutex<()>,
}

impl WriteQueue {
    /// Spawn the writer thread that owns `writer` and start accepting work.
    pub fn start(writer: StoreWriter, config: WriteQueueConfig) -> Result<Self> {
        let config = WriteQueueConfig {
            capacity: config.capacity.max(1),
            ..config
        };
        let (tx, rx) = mpsc::channel(config.capacity);
        let shared = Arc::new(QueueShared {
            state: AtomicU8::new(QueueState::Stopped.as_u8()),
            drain_deadline: Mutex::new(None),
            counters: Counters::default(),
        });

        shared.set_state(QueueState::Running);
        let worker_shared = shared.clone();
        thread::Builder::new()
            .name("index-writer".to_string())
            .spawn(move || run_worker(writer, rx, worker_shared))?;

        Ok(Self {
            inner: Arc::new(WriteQueueInner {
                tx,
                shared,
                config,
                next_sequence: AtomicU64::new(0),
                order: Mutex::new(()),
            }),
        })
    }

    /// Enqueue a unit of work, waiting while the backlog is full.
    ///
    /// Returns as soon as the unit is queued; await the handle for its result.
    pub async fn submit<F, T>(&self, work: F) -> Result<WriteHandle<T>>
    where
        F: FnOnce(&mut StoreWriter) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.ensure_running()?;
        let permit = self
            .inner
            .tx
            .reserve()
            .await
            .map_err(|_| StoreError::ShuttingDown)?;
        self.ensure_running()?;
        Ok(self.enqueue(permit, work))
    }

    /// Like [`WriteQueue::submit`] but fails with `QueueFull` instead of
    /// waiting.
    pub fn try_submit<F, T>(&self, work: F) -> Result<WriteHandle<T>>
    where
        F: FnOnce(&mut StoreWriter) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.ensure_running()?;
        let permit = self.inner.tx.try_reserve().map_err(|err| match err {
            TrySendError::Full(()) => StoreError::QueueFull,
            TrySendError::Closed(()) => StoreError::ShuttingDown,
        })?;
        Ok(self.enqueue(permit, work))
    }

    /// Submit and wait for the result.
    pub async fn execute<F, T>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&mut StoreWriter) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.submit(work).await?.await
    }

    fn enqueue<F, T>(&self, permit: mpsc::Permit<'_, Message>, work: F) -> WriteHandle<T>
    where
        F: FnOnce(&mut StoreWriter) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let task = Box::new(WorkItem { work, reply });

        // Sequence numbers must follow channel order.
        let _guard = self
            .inner
            .order
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let sequence = self.inner.next_sequence.fetch_add(1, Ordering::Relaxed);
        permit.send(Message::Work { sequence, task });
        self.inner
            .shared
            .counters
            .submitted
            .fetch_add(1, Ordering::Relaxed);

        WriteHandle { sequence, rx }
    }

    fn ensure_running(&self) -> Result<()> {
        match self.inner.shared.state() {
            QueueState::Running => Ok(()),
            QueueState::Draining | QueueState::Stopped => Err(StoreError::ShuttingDown),
        }
    }

    #[must_use]
    pub fn state(&self) -> QueueState {
        self.inner.shared.state()
    }

    /// Units queued but not yet picked up by the writer.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner
            .config
            .capacity
            .saturating_sub(self.inner.tx.capacity())
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.config.capacity
    }

    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let counters = &self.inner.shared.counters;
        QueueStats {
            state: self.state(),
            pending: self.pending(),
            submitted: counters.submitted.load(Ordering::Relaxed),
            completed: counters.completed.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            rejected: counters.rejected.load(Ordering::Relaxed),
        }
    }

    /// Drain with the configured timeout.
    pub async fn shutdown(&self) -> ShutdownOutcome {
        self.shutdown_with_timeout(self.inner.config.shutdown_timeout)
            .await
    }

    /// Stop accepting work, run the backlog for at most `timeout`, then stop.
    pub async fn shutdown_with_timeout(&self, timeout: Duration) -> ShutdownOutcome {
        let shared = &self.inner.shared;
        if shared
            .state
            .compare_exchange(
                QueueState::Running.as_u8(),
                QueueState::Draining.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return ShutdownOutcome::AlreadyStopping;
        }

        let deadline = Instant::now() + timeout;
        *shared
            .drain_deadline
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(deadline);
        info!(
            "Draining write queue ({} pending, timeout {}ms)",
            self.pending(),
            timeout.as_millis()
        );

        let (done_tx, done_rx) = oneshot::channel();
        let remaining = || deadline.saturating_duration_since(Instant::now());
        let marker = self.inner.tx.clone();
        let mut send_marker =
            Box::pin(async move { marker.send(Message::Drain { done: done_tx }).await });
        match tokio::time::timeout(remaining(), &mut send_marker).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => return ShutdownOutcome::Drained,
            Err(_) => {
                warn!("Write queue drain timed out before the stop marker was queued");
                // The worker only exits once it reads the marker.
                tokio::spawn(send_marker);
                return ShutdownOutcome::TimedOut;
            }
        }

        match tokio::time::timeout(remaining(), done_rx).await {
            Ok(_) => ShutdownOutcome::Drained,
            Err(_) => {
                warn!("Write queue drain timed out; remaining work will be rejected");
                ShutdownOutcome::TimedOut
            }
        }
    }
}

fn run_worker(
    mut writer: StoreWriter,
    mut rx: mpsc::Receiver<Message>,
    shared: Arc<QueueShared>,
) {
    debug!("Index writer thread started");
    let counters = &shared.counters;
    let mut drained: Option<oneshot::Sender<()>> = None;

    while let Some(message) = rx.blocking_recv() {
        match message {
            Message::Work { sequence, task } => {
                // Anything behind the stop marker raced with shutdown.
                if drained.is_some() || shared.drain_expired() {
                    rx.close();
                    task.reject(StoreError::ShuttingDown, counters);
                    continue;
                }
                if !task.run(&mut writer, counters) {
                    debug!("Unit of work #{sequence} failed");
                }
            }
            Message::Drain { done } => {
                rx.close();
                drained = Some(done);
            }
        }
    }

    if writer.journal_len() > 0 {
        if let Err(err) = writer.compact() {
            error!("Final journal compaction failed: {err}");
        }
    }
    shared.set_state(QueueState::Stopped);
    if let Some(done) = drained {
        let _ = done.send(());
    }
    debug!("Index writer thread stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
