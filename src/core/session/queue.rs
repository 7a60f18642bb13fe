use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use tokio::sync::watch;

/// Whether a drain task currently owns the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainState {
    Idle,
    Draining,
}

impl fmt::Display for DrainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrainState::Idle => write!(f, "idle"),
            DrainState::Draining => write!(f, "draining"),
        }
    }
}

#[derive(Debug)]
struct QueueInner {
    pending: VecDeque<String>,
    state: DrainState,
}

/// FIFO of command strings waiting to be sent.
///
/// The pending entries and the drain state live under one lock, so a producer can never
/// append between the drainer seeing an empty queue and going idle. State changes are
/// mirrored to a watch channel while the lock is held.
#[derive(Debug)]
pub struct CommandQueue {
    inner: Mutex<QueueInner>,
    state_tx: watch::Sender<DrainState>,
}

impl CommandQueue {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(DrainState::Idle);
        Self {
            inner: Mutex::new(QueueInner {
                pending: VecDeque::new(),
                state: DrainState::Idle,
            }),
            state_tx,
        }
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut QueueInner) -> R) -> R {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    /// Append `commands` in order. Returns `true` when the queue was idle and the caller
    /// now owns the drain.
    pub fn enqueue<I, S>(&self, commands: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_inner(|inner| {
            inner.pending.extend(commands.into_iter().map(Into::into));
            if inner.state == DrainState::Idle && !inner.pending.is_empty() {
                inner.state = DrainState::Draining;
                self.state_tx.send_replace(DrainState::Draining);
                true
            } else {
                false
            }
        })
    }

    /// Entry currently being processed
    pub fn front(&self) -> Option<String> {
        self.with_inner(|inner| inner.pending.front().cloned())
    }

    /// Drop the entry whose pacing window has elapsed
    pub fn pop_front(&self) -> Option<String> {
        self.with_inner(|inner| inner.pending.pop_front())
    }

    /// Go idle if nothing is pending. Returns `false` when new entries arrived and the
    /// drain has to continue.
    pub fn finish(&self) -> bool {
        self.with_inner(|inner| {
            if inner.pending.is_empty() {
                inner.state = DrainState::Idle;
                self.state_tx.send_replace(DrainState::Idle);
                true
            } else {
                false
            }
        })
    }

    pub fn len(&self) -> usize {
        self.with_inner(|inner| inner.pending.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state(&self) -> DrainState {
        self.with_inner(|inner| inner.state)
    }

    pub fn subscribe(&self) -> watch::Receiver<DrainState> {
        self.state_tx.subscribe()
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}
