//! Session lifecycle state machine.
//!
//! ```text
//! Idle -> Initializing -> Loading -> Running -> Exited --+
//!                            |          |                 +-> Closed
//!                            +----------+---> Crashed ----+
//! ```
//!
//! Closing is accepted from every state so a window can be torn down at any
//! point. Keyboard input reaches the engine only while `Running`.

use crate::error::LifecycleError;

/// Key that closes a session window once the engine is no longer running.
pub const CLOSE_SENTINEL: &str = "x";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Idle,
    /// Probing for a credential agent.
    Initializing,
    /// Engine inserted; binary being fetched and instantiated.
    Loading,
    Running,
    Exited,
    Crashed,
    Closed,
}

impl LifecycleState {
    /// Engine has stopped; only closing remains.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Exited | Self::Crashed)
    }

    pub fn is_closed(self) -> bool {
        self == Self::Closed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    ArgsAttached,
    AgentResolved,
    EngineLoaded,
    EngineExited,
    EngineCrashed,
    CloseRequested,
}

/// Work the owner performs as part of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionAction {
    None,
    StartAgentProbe,
    InsertEngine,
    ScrubCredentials,
    ShowExitPrompt,
    ShowCrashPrompt,
    Teardown,
}

/// What to do with a keypress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDisposition {
    Forward,
    Close,
    Drop,
}

#[derive(Debug, Default)]
pub struct Lifecycle {
    state: LifecycleState,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LifecycleState::Running
    }

    /// Apply `event`. Invalid transitions leave the state untouched.
    pub fn apply(&mut self, event: LifecycleEvent) -> Result<TransitionAction, LifecycleError> {
        use LifecycleEvent as E;
        use LifecycleState as S;

        let (next, action) = match (self.state, event) {
            (S::Idle, E::ArgsAttached) => (S::Initializing, TransitionAction::StartAgentProbe),
            (S::Initializing, E::AgentResolved) => (S::Loading, TransitionAction::InsertEngine),
            (S::Loading, E::EngineLoaded) => (S::Running, TransitionAction::ScrubCredentials),
            (S::Running, E::EngineExited) => (S::Exited, TransitionAction::ShowExitPrompt),
            (S::Loading | S::Running, E::EngineCrashed) => {
                (S::Crashed, TransitionAction::ShowCrashPrompt)
            }
            (S::Closed, E::CloseRequested) => (S::Closed, TransitionAction::None),
            (_, E::CloseRequested) => (S::Closed, TransitionAction::Teardown),
            (from, event) => {
                return Err(LifecycleError::InvalidState {
                    from,
                    to: Self::target_of(event),
                })
            }
        };
        self.state = next;
        Ok(action)
    }

    fn target_of(event: LifecycleEvent) -> LifecycleState {
        match event {
            LifecycleEvent::ArgsAttached => LifecycleState::Initializing,
            LifecycleEvent::AgentResolved => LifecycleState::Loading,
            LifecycleEvent::EngineLoaded => LifecycleState::Running,
            LifecycleEvent::EngineExited => LifecycleState::Exited,
            LifecycleEvent::EngineCrashed => LifecycleState::Crashed,
            LifecycleEvent::CloseRequested => LifecycleState::Closed,
        }
    }

    /// Gate a keypress on the current state.
    pub fn gate_key(&self, text: &str) -> KeyDisposition {
        match self.state {
            LifecycleState::Running => KeyDisposition::Forward,
            LifecycleState::Closed => KeyDisposition::Drop,
            _ if text == CLOSE_SENTINEL => KeyDisposition::Close,
            _ => KeyDisposition::Drop,
        }
    }
}
