//! Render job status and its state machine.
//!
//! ```text
//!   queued ──► running ──► done
//!                 │
//!                 └──────► failed
//! ```
//!
//! `done` and `failed` are terminal. A re-invoked worker may re-enter
//! `running` from `running` (crash recovery) but nothing ever goes back to
//! `queued`. Step flags only ever flip from `false` to `true`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a render job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderState {
    Queued,
    Running,
    Done,
    Failed,
}

impl RenderState {
    const fn rank(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Running => 1,
            Self::Done | Self::Failed => 2,
        }
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Queued | Self::Running, Self::Running)
                | (Self::Running, Self::Done | Self::Failed)
        )
    }

    /// Lowercase label, matching the persisted form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named pipeline stage in the status checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepName {
    Ssml,
    Chunk,
    Synthesize,
    Stitch,
    Master,
    Analyze,
    Complete,
}

impl StepName {
    /// Every step in checklist order.
    pub const ALL: [Self; 7] = [
        Self::Ssml,
        Self::Chunk,
        Self::Synthesize,
        Self::Stitch,
        Self::Master,
        Self::Analyze,
        Self::Complete,
    ];
}

/// One checklist entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepStatus {
    pub name: StepName,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,
}

impl StepStatus {
    const fn pending(name: StepName) -> Self {
        Self {
            name,
            ok: false,
            done: None,
            total: None,
        }
    }
}

/// Overall chunk progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub total: u32,
    pub done: u32,
}

/// Status transition error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusError {
    #[error("Illegal status transition: {from} -> {to}")]
    IllegalTransition { from: RenderState, to: RenderState },

    #[error("Progress {done} exceeds total {total}")]
    InvalidProgress { done: u32, total: u32 },
}

/// Persisted status snapshot (`status.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderStatus {
    pub state: RenderState,
    pub progress: Progress,
    pub steps: Vec<StepStatus>,
    /// Set only when `state` is `failed`.
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RenderStatus {
    /// Initial status written at submission.
    #[must_use]
    pub fn queued(now: DateTime<Utc>) -> Self {
        Self {
            state: RenderState::Queued,
            progress: Progress::default(),
            steps: StepName::ALL.iter().copied().map(StepStatus::pending).collect(),
            error: None,
            started_at: now,
            updated_at: now,
        }
    }

    /// Whether the job reached `done` or `failed`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Look up a checklist entry.
    #[must_use]
    pub fn step(&self, name: StepName) -> Option<&StepStatus> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Whether a step has completed.
    #[must_use]
    pub fn step_ok(&self, name: StepName) -> bool {
        self.step(name).is_some_and(|s| s.ok)
    }

    fn step_mut(&mut self, name: StepName) -> &mut StepStatus {
        if let Some(pos) = self.steps.iter().position(|s| s.name == name) {
            return &mut self.steps[pos];
        }
        // Keep checklist order when a step is missing from an older snapshot.
        let pos = self
            .steps
            .iter()
            .position(|s| s.name > name)
            .unwrap_or(self.steps.len());
        self.steps.insert(pos, StepStatus::pending(name));
        &mut self.steps[pos]
    }

    /// Move to `next`, enforcing the state machine.
    pub fn transition(&mut self, next: RenderState) -> Result<(), StatusError> {
        if !self.state.can_transition_to(next) {
            return Err(StatusError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Mark a step as completed. Never reverts.
    pub fn complete_step(&mut self, name: StepName) {
        self.step_mut(name).ok = true;
    }

    /// Record sub-progress for a step. Counts never decrease.
    pub fn step_progress(&mut self, name: StepName, done: u32, total: u32) -> Result<(), StatusError> {
        if done > total {
            return Err(StatusError::InvalidProgress { done, total });
        }
        let step = self.step_mut(name);
        step.done = Some(step.done.map_or(done, |d| d.max(done)));
        step.total = Some(total);
        Ok(())
    }

    /// Set the overall chunk progress. `done` never decreases.
    pub fn set_progress(&mut self, done: u32, total: u32) -> Result<(), StatusError> {
        if done > total {
            return Err(StatusError::InvalidProgress { done, total });
        }
        self.progress.total = total;
        self.progress.done = self.progress.done.max(done);
        Ok(())
    }

    /// Transition to `failed` and record the cause.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), StatusError> {
        self.transition(RenderState::Failed)?;
        self.error = Some(message.into());
        Ok(())
    }

    /// Transition to `done`, marking the final step.
    pub fn finish(&mut self) -> Result<(), StatusError> {
        self.transition(RenderState::Done)?;
        self.complete_step(StepName::Complete);
        self.error = None;
        Ok(())
    }

    /// Merge another snapshot of the same job into this one.
    ///
    /// Only forward information is taken from `other`: a later state, step
    /// flags that are set, larger progress counts. When both snapshots are
    /// terminal the one already in `self` wins.
    pub fn absorb(&mut self, other: &Self) {
        if other.state.rank() > self.state.rank() {
            self.state = other.state;
            self.error.clone_from(&other.error);
        }
        if self.error.is_none() && self.state == RenderState::Failed {
            self.error.clone_from(&other.error);
        }

        for theirs in &other.steps {
            let ours = self.step_mut(theirs.name);
            ours.ok |= theirs.ok;
            ours.done = match (ours.done, theirs.done) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            };
            ours.total = ours.total.or(theirs.total);
        }

        self.progress.total = self.progress.total.max(other.progress.total);
        self.progress.done = self.progress.done.max(other.progress.done);
        self.started_at = self.started_at.min(other.started_at);
        self.updated_at = self.updated_at.max(other.updated_at);
    }
}
