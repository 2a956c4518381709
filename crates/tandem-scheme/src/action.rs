//! Checkpoint/initialization handshake between scheme and adapter.
//!
//! The scheme requires an action, the adapter fulfills it, and at every
//! phase boundary the scheme checks that nothing is left open and clears
//! the slate:
//!
//! ```text
//! NotRequired ──require──▶ Required ──mark_fulfilled──▶ Fulfilled
//!      ▲                                                   │
//!      └──────────────── check_completeness ───────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Something the adapter must do before the next coupling call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    /// Save the solver state; the window may have to be repeated.
    WriteCheckpoint,
    /// Restore the saved solver state; the window is repeated.
    ReadCheckpoint,
    /// Write initial values before `initialize()`.
    InitializeData,
}

impl Action {
    /// All actions, in a fixed order.
    pub const ALL: [Action; 3] = [
        Action::WriteCheckpoint,
        Action::ReadCheckpoint,
        Action::InitializeData,
    ];

    const fn slot(self) -> usize {
        match self {
            Action::WriteCheckpoint => 0,
            Action::ReadCheckpoint => 1,
            Action::InitializeData => 2,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::WriteCheckpoint => write!(f, "write-checkpoint"),
            Action::ReadCheckpoint => write!(f, "read-checkpoint"),
            Action::InitializeData => write!(f, "initialize-data"),
        }
    }
}

/// Handshake state of one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionState {
    #[default]
    NotRequired,
    Required,
    Fulfilled,
}

/// State of every action of one scheme.
#[derive(Debug, Clone, Default)]
pub struct Actions {
    states: [ActionState; 3],
}

impl Actions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, action: Action) -> ActionState {
        self.states[action.slot()]
    }

    /// Check if the action was required in the current phase.
    ///
    /// Stays `true` after the adapter fulfilled it, until the next phase.
    pub fn is_required(&self, action: Action) -> bool {
        self.state(action) != ActionState::NotRequired
    }

    pub fn is_fulfilled(&self, action: Action) -> bool {
        self.state(action) == ActionState::Fulfilled
    }

    /// Require an action. Requiring a fulfilled action keeps it fulfilled.
    pub fn require(&mut self, action: Action) {
        let state = &mut self.states[action.slot()];
        if *state == ActionState::NotRequired {
            *state = ActionState::Required;
        }
    }

    /// Record that the adapter performed a required action.
    pub fn mark_fulfilled(&mut self, action: Action) -> Result<()> {
        let state = &mut self.states[action.slot()];
        match *state {
            ActionState::NotRequired => Err(Error::InvalidState {
                expected: "action to be required before it is fulfilled",
                actual: format!("{action} is not required"),
            }),
            ActionState::Required | ActionState::Fulfilled => {
                *state = ActionState::Fulfilled;
                Ok(())
            }
        }
    }

    /// Actions still waiting for the adapter.
    pub fn missing(&self) -> Vec<Action> {
        Action::ALL
            .into_iter()
            .filter(|action| self.state(*action) == ActionState::Required)
            .collect()
    }

    /// Fail if any action is still open, otherwise clear all actions.
    pub fn check_completeness(&mut self) -> Result<()> {
        let missing = self.missing();
        if !missing.is_empty() {
            return Err(Error::UnfulfilledActions(missing));
        }
        self.states = [ActionState::NotRequired; 3];
        Ok(())
    }
}

impl std::fmt::Display for Actions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let required: Vec<String> = Action::ALL
            .into_iter()
            .filter(|action| self.is_required(*action))
            .map(|action| action.to_string())
            .collect();
        write!(f, "{}", required.join(" "))
    }
}
