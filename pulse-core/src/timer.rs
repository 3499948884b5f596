//! Cancellable, owned timers for a session
//!
//! Each [`TimerKind`] has at most one armed instance. Arming a kind aborts the
//! previous instance, and every firing carries a token so that a firing which
//! was already queued when its timer got replaced can be recognised and dropped.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::trace;

/// The timers a session owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Keep-alive probe interval
    Ping,
    /// Delay before the next reconnect attempt
    Reconnect,
    /// Delay before the first connection attempt
    ConnectDelay,
}

/// A timer firing delivered to the owner of the [`TimerSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub kind: TimerKind,
    pub token: u64,
}

/// Aborts its task when dropped
#[derive(Debug)]
struct ScopedTimer {
    token: u64,
    repeating: bool,
    task: JoinHandle<()>,
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Owned set of cancellable timers, one slot per [`TimerKind`]
#[derive(Debug)]
pub struct TimerSet {
    slots: HashMap<TimerKind, ScopedTimer>,
    next_token: u64,
    tx: mpsc::UnboundedSender<TimerFired>,
}

impl TimerSet {
    /// Create an empty timer set and the receiver its firings are delivered to
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let set = Self {
            slots: HashMap::new(),
            next_token: 0,
            tx,
        };
        (set, rx)
    }

    /// Arm a one-shot timer, replacing any armed instance of the same kind
    pub fn schedule(&mut self, kind: TimerKind, delay: Duration) -> u64 {
        let token = self.issue_token();
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(TimerFired { kind, token });
        });
        self.install(kind, token, false, task);
        token
    }

    /// Arm a repeating timer whose first firing is one full period from now
    pub fn schedule_repeating(&mut self, kind: TimerKind, period: Duration) -> u64 {
        let token = self.issue_token();
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if tx.send(TimerFired { kind, token }).is_err() {
                    break;
                }
            }
        });
        self.install(kind, token, true, task);
        token
    }

    /// Cancel the armed instance of `kind`, returning whether one existed
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        let cancelled = self.slots.remove(&kind).is_some();
        if cancelled {
            trace!("Timer {:?} cancelled", kind);
        }
        cancelled
    }

    /// Cancel every armed timer
    pub fn cancel_all(&mut self) {
        self.slots.clear();
    }

    /// Whether an instance of `kind` is armed
    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.slots.contains_key(&kind)
    }

    /// Number of armed timers
    pub fn armed_count(&self) -> usize {
        self.slots.len()
    }

    /// Check a firing against the armed instance of its kind.
    ///
    /// Returns false for firings of cancelled or replaced timers. A current
    /// one-shot firing disarms its slot.
    pub fn acknowledge(&mut self, fired: &TimerFired) -> bool {
        let Some(slot) = self.slots.get(&fired.kind) else {
            return false;
        };
        if slot.token != fired.token {
            return false;
        }
        if !slot.repeating {
            self.slots.remove(&fired.kind);
        }
        true
    }

    fn issue_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    fn install(&mut self, kind: TimerKind, token: u64, repeating: bool, task: JoinHandle<()>) {
        let previous = self.slots.insert(
            kind,
            ScopedTimer {
                token,
                repeating,
                task,
            },
        );
        if previous.is_some() {
            trace!("Timer {:?} replaced", kind);
        }
    }
}
