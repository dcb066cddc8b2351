// State management module
//
// This module provides the RunStateManager which wraps RunState with thread-safe access
// using Arc<RwLock<T>> and emits change events for progress reporting.

use crate::models::{DownloadResult, DownloadStatus, DownloadSummary, ProviderId};
use camino::Utf8PathBuf;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

/// Where a run currently is
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RunPhase {
    #[default]
    Idle,
    /// Querying providers for candidates
    Acquiring,
    /// Downloading `total` unique candidates
    Downloading { total: usize },
    Finished,
    /// Stopped by an external signal; results hold whatever was collected
    Cancelled,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Finished | RunPhase::Cancelled)
    }
}

/// Everything one run accumulates
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunState {
    pub phase: RunPhase,
    pub results: Vec<DownloadResult>,
    pub warnings: Vec<String>,
}

impl RunState {
    pub fn count(&self, status: DownloadStatus) -> usize {
        self.results.iter().filter(|r| r.status() == status).count()
    }
}

/// Change events emitted when run state is modified
#[derive(Clone, Debug, PartialEq)]
pub enum RunEvent {
    PhaseChanged {
        phase: RunPhase,
    },

    /// A candidate reached its final status
    ResultRecorded {
        url: String,
        provider: ProviderId,
        status: DownloadStatus,
    },

    WarningRaised {
        message: String,
    },

    StateReset,
}

/// Thread-safe run state with event emission
///
/// This is the single collector of a run:
/// - Provides thread-safe access to [`RunState`] via `Arc<RwLock<T>>`
/// - Detects state changes and emits [`RunEvent`]s
/// - Keeps every recorded result, so a partial summary is available at any time
///
/// A poisoned lock is recovered rather than propagated: the state only ever
/// grows by whole results, so it stays consistent after a panicking writer.
pub struct RunStateManager {
    state: Arc<RwLock<RunState>>,

    /// Broadcast channel for emitting run events
    event_tx: broadcast::Sender<RunEvent>,
}

impl RunStateManager {
    /// Create a manager with an idle state and an event buffer of 256
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            state: Arc::new(RwLock::new(RunState::default())),
            event_tx,
        }
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, RunState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, RunState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clone of the current state
    pub fn snapshot(&self) -> RunState {
        self.read_guard().clone()
    }

    /// Execute a function with read access to the state
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&RunState) -> R,
    {
        f(&self.read_guard())
    }

    /// Update the state, emit events for what changed and return them
    pub fn update<F>(&self, update_fn: F) -> Vec<RunEvent>
    where
        F: FnOnce(&mut RunState),
    {
        let mut state = self.write_guard();
        let old_phase = state.phase.clone();
        let old_results = state.results.len();
        let old_warnings = state.warnings.len();

        update_fn(&mut state);

        let changes = Self::detect_changes(&old_phase, old_results, old_warnings, &state);
        drop(state);

        for change in &changes {
            // Nobody listening is fine
            let _ = self.event_tx.send(change.clone());
        }
        changes
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.event_tx.subscribe()
    }

    /// State is append-only between resets, so new entries are the tail past the old lengths.
    fn detect_changes(
        old_phase: &RunPhase,
        old_results: usize,
        old_warnings: usize,
        new: &RunState,
    ) -> Vec<RunEvent> {
        let mut changes = Vec::new();

        if *old_phase != new.phase {
            changes.push(RunEvent::PhaseChanged {
                phase: new.phase.clone(),
            });
        }

        for message in new.warnings.iter().skip(old_warnings) {
            changes.push(RunEvent::WarningRaised {
                message: message.clone(),
            });
        }

        for result in new.results.iter().skip(old_results) {
            changes.push(RunEvent::ResultRecorded {
                url: result.url().to_string(),
                provider: result.provider(),
                status: result.status(),
            });
        }

        changes
    }

    pub fn set_phase(&self, phase: RunPhase) -> Vec<RunEvent> {
        self.update(|state| state.phase = phase)
    }

    pub fn add_warning(&self, message: impl Into<String>) -> Vec<RunEvent> {
        let message = message.into();
        tracing::warn!("{}", message);
        self.update(|state| state.warnings.push(message))
    }

    pub fn record_result(&self, result: DownloadResult) -> Vec<RunEvent> {
        self.update(|state| state.results.push(result))
    }

    pub fn record_results<I>(&self, results: I) -> Vec<RunEvent>
    where
        I: IntoIterator<Item = DownloadResult>,
    {
        self.update(|state| state.results.extend(results))
    }

    /// Clear results and warnings and return to Idle
    pub fn reset(&self) -> Vec<RunEvent> {
        let mut changes = self.update(|state| *state = RunState::default());

        let reset_event = RunEvent::StateReset;
        let _ = self.event_tx.send(reset_event.clone());
        changes.push(reset_event);

        changes
    }

    pub fn phase(&self) -> RunPhase {
        self.read(|state| state.phase.clone())
    }

    pub fn results(&self) -> Vec<DownloadResult> {
        self.read(|state| state.results.clone())
    }

    pub fn warnings(&self) -> Vec<String> {
        self.read(|state| state.warnings.clone())
    }

    /// Summary over the results recorded so far
    pub fn summary(&self, requested: usize, output_dir: Utf8PathBuf) -> DownloadSummary {
        self.read(|state| DownloadSummary::from_results(requested, &state.results, output_dir))
    }
}

impl Default for RunStateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for RunStateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            event_tx: self.event_tx.clone(),
        }
    }
}
