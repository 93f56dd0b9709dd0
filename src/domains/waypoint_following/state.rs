use serde::{Deserialize, Serialize};

/// Sequencing state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SequenceState {
    /// No queue activity.
    #[default]
    Idle,

    /// A waypoint is about to be submitted (or is waiting out the dwell).
    Dispatching,

    /// A goal is active at the navigation service.
    Awaiting,

    /// No new dispatch. An in-flight goal is allowed to finish.
    Paused,

    /// Operator stop in progress; waiting for the active goal to terminate.
    Cancelling,

    /// Queue exhausted with no active goal.
    Finished,
}

/// Coarse controller phase exposed to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerPhase {
    Idle,
    Running,
    Paused,
    Cancelling,
}

impl SequenceState {
    pub fn phase(&self) -> ControllerPhase {
        match self {
            SequenceState::Idle | SequenceState::Finished => ControllerPhase::Idle,
            SequenceState::Dispatching | SequenceState::Awaiting => ControllerPhase::Running,
            SequenceState::Paused => ControllerPhase::Paused,
            SequenceState::Cancelling => ControllerPhase::Cancelling,
        }
    }

    /// Resting states where an insert should trigger a dispatch.
    pub fn is_at_rest(&self) -> bool {
        matches!(self, SequenceState::Idle | SequenceState::Finished)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SequenceState::Idle => "IDLE",
            SequenceState::Dispatching => "DISPATCHING",
            SequenceState::Awaiting => "AWAITING",
            SequenceState::Paused => "PAUSED",
            SequenceState::Cancelling => "CANCELLING",
            SequenceState::Finished => "FINISHED",
        }
    }
}
