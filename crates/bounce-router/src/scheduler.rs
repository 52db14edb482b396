//! Timer-driven broadcasts for senders that declare a period.
//!
//! Each periodic sender gets one [`BroadcastTask`]: a spawned loop that calls
//! `send()`, then sleeps for the period, until its cancellation token fires.
//! The token is checked before every send and raced against every sleep, so
//! a cancel takes effect at the next suspension point; a send already in
//! flight is allowed to finish.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{ConflictReason, Result, RouterError};
use crate::registry::EventRegistry;
use crate::sender::Sender;

/// Lifecycle of one periodic task. Linear, no backwards transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Running,
    Cancelling,
    Stopped,
}

impl TaskState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TaskState::Idle,
            1 => TaskState::Running,
            2 => TaskState::Cancelling,
            _ => TaskState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            TaskState::Idle => 0,
            TaskState::Running => 1,
            TaskState::Cancelling => 2,
            TaskState::Stopped => 3,
        }
    }

    /// Whether a task in this state still blocks a new one for the same sender.
    pub fn is_live(self) -> bool {
        !matches!(self, TaskState::Stopped)
    }
}

#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    fn new(state: TaskState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    fn get(&self) -> TaskState {
        TaskState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: TaskState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }

    /// Move `from` → `to` only if the cell is still in `from`.
    fn transition(&self, from: TaskState, to: TaskState) -> bool {
        self.0
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// One sender's periodic loop. Created idle, started once, cancelled once.
pub struct BroadcastTask {
    event: String,
    period: Duration,
    sender: Option<Arc<dyn Sender>>,
    token: CancellationToken,
    state: Arc<StateCell>,
    join: Option<JoinHandle<()>>,
}

impl BroadcastTask {
    pub fn new(sender: Arc<dyn Sender>, period: Duration) -> Self {
        Self {
            event: sender.event_name().to_string(),
            period,
            sender: Some(sender),
            token: CancellationToken::new(),
            state: Arc::new(StateCell::new(TaskState::Idle)),
            join: None,
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn state(&self) -> TaskState {
        self.state.get()
    }

    /// Spawn the loop. Only an idle task can start; a stopped task is never restarted.
    pub fn start(&mut self) -> Result<()> {
        let Some(sender) = self.sender.take() else {
            return Err(RouterError::Conflict {
                event: self.event.clone(),
                reason: ConflictReason::AlreadyRunning,
            });
        };
        if !self.state.transition(TaskState::Idle, TaskState::Running) {
            return Err(RouterError::Conflict {
                event: self.event.clone(),
                reason: ConflictReason::AlreadyRunning,
            });
        }
        let token = self.token.clone();
        let state = Arc::clone(&self.state);
        self.join = Some(tokio::spawn(run_loop(sender, self.period, token, state)));
        Ok(())
    }

    /// Request cancellation without waiting. Safe to call in any state and more than once.
    pub fn cancel(&self) {
        if self.state.transition(TaskState::Idle, TaskState::Stopped) {
            return;
        }
        let _ = self.state.transition(TaskState::Running, TaskState::Cancelling);
        self.token.cancel();
    }

    /// Cancel and wait up to `grace` for the loop to unwind; abort it after that.
    pub async fn stop(mut self, grace: Duration) -> TaskState {
        self.cancel();
        if let Some(mut join) = self.join.take() {
            match tokio::time::timeout(grace, &mut join).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(event = %self.event, error = %e, "periodic broadcast task panicked");
                }
                Err(_) => {
                    warn!(
                        event = %self.event,
                        grace_ms = grace.as_millis() as u64,
                        "periodic broadcast did not stop in time, aborting"
                    );
                    join.abort();
                }
            }
        }
        self.state.set(TaskState::Stopped);
        TaskState::Stopped
    }
}

impl Drop for BroadcastTask {
    fn drop(&mut self) {
        // A dropped handle must not leave an orphaned loop behind.
        self.token.cancel();
    }
}

/// Marks the task `Stopped` however the loop exits, unwinding included.
struct StopOnExit(Arc<StateCell>);

impl Drop for StopOnExit {
    fn drop(&mut self) {
        self.0.set(TaskState::Stopped);
    }
}

async fn run_loop(
    sender: Arc<dyn Sender>,
    period: Duration,
    token: CancellationToken,
    state: Arc<StateCell>,
) {
    let _stopped = StopOnExit(state);
    let event = sender.event_name().to_string();
    info!(event = %event, period_ms = period.as_millis() as u64, "periodic broadcast started");

    loop {
        if token.is_cancelled() {
            break;
        }

        match sender.send().await {
            Ok(report) if report.is_partial() => {
                warn!(
                    event = %event,
                    delivered = report.delivered,
                    failed = report.failed.len(),
                    "periodic broadcast partially failed"
                );
            }
            Ok(_) => {}
            // Transient failures must not end the loop.
            Err(e) => error!(event = %event, error = %e, "periodic broadcast failed"),
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(period) => {}
        }
    }

    info!(event = %event, "periodic broadcast stopped");
}

/// Owns the periodic tasks of a process, at most one live task per sender event.
pub struct BroadcastScheduler {
    tasks: DashMap<String, BroadcastTask>,
}

impl BroadcastScheduler {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
        }
    }

    /// Start the sender's loop at its declared period.
    pub fn start(&self, sender: Arc<dyn Sender>) -> Result<()> {
        let Some(period) = sender.period() else {
            return Err(RouterError::NotPeriodic {
                event: sender.event_name().to_string(),
            });
        };
        self.start_with_period(sender, period)
    }

    /// Start the sender's loop at an explicit period.
    pub fn start_with_period(&self, sender: Arc<dyn Sender>, period: Duration) -> Result<()> {
        if period.is_zero() {
            return Err(RouterError::NotPeriodic {
                event: sender.event_name().to_string(),
            });
        }
        let event = sender.event_name().to_string();
        match self.tasks.entry(event.clone()) {
            Entry::Occupied(mut slot) => {
                if slot.get().state().is_live() {
                    warn!(event = %event, "periodic broadcast already running");
                    return Err(RouterError::Conflict {
                        event,
                        reason: ConflictReason::AlreadyRunning,
                    });
                }
                // Stopped tasks are replaced by a fresh one, never restarted.
                let mut task = BroadcastTask::new(sender, period);
                task.start()?;
                slot.insert(task);
            }
            Entry::Vacant(slot) => {
                let mut task = BroadcastTask::new(sender, period);
                task.start()?;
                slot.insert(task);
            }
        }
        Ok(())
    }

    /// Start every registered sender that declares a period. Returns how many started.
    pub fn start_all(&self, senders: &EventRegistry<dyn Sender>) -> usize {
        let mut started = 0;
        for sender in senders.participants() {
            if sender.period().is_none() {
                continue;
            }
            match self.start(sender) {
                Ok(()) => started += 1,
                Err(e) => warn!(error = %e, "periodic sender not started"),
            }
        }
        info!(started, "periodic broadcasts scheduled");
        started
    }

    /// Request cancellation of one task without waiting. False if there is no such task.
    pub fn cancel(&self, event: &str) -> bool {
        match self.tasks.get(event) {
            Some(task) => {
                task.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel one task and wait up to `grace` for it to finish.
    pub async fn stop(&self, event: &str, grace: Duration) -> Option<TaskState> {
        let (_, task) = self.tasks.remove(event)?;
        Some(task.stop(grace).await)
    }

    pub fn state(&self, event: &str) -> Option<TaskState> {
        self.tasks.get(event).map(|task| task.state())
    }

    /// Events whose task has not reached `Stopped`.
    pub fn live_events(&self) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|task| task.state().is_live())
            .map(|task| task.key().clone())
            .collect()
    }

    /// Cancel everything, then wait for all loops within one shared deadline.
    pub async fn shutdown(&self, grace: Duration) {
        let events: Vec<String> = self.tasks.iter().map(|t| t.key().clone()).collect();
        let tasks: Vec<BroadcastTask> = events
            .iter()
            .filter_map(|event| self.tasks.remove(event).map(|(_, task)| task))
            .collect();
        if tasks.is_empty() {
            return;
        }

        for task in &tasks {
            task.cancel();
        }

        let deadline = tokio::time::Instant::now() + grace;
        let count = tasks.len();
        for task in tasks {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            task.stop(remaining).await;
        }
        info!(count, "periodic broadcasts shut down");
    }
}

impl Default for BroadcastScheduler {
    fn default() -> Self {
        Self::new()
    }
}
