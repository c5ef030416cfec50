use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProbeState {
    IDLE,
    LAUNCHING,
    NAVIGATING,
    MEASURING,
    CAPTURING_FRAMES,
    CLOSED,
}

pub fn valid_transition(from: ProbeState, to: ProbeState) -> bool {
    use ProbeState::*;
    match (from, to) {
        (IDLE, LAUNCHING) => true,
        (LAUNCHING, NAVIGATING) => true,
        (NAVIGATING, MEASURING) => true,
        (MEASURING, CAPTURING_FRAMES) => true,
        (CLOSED, _) => false,
        (_, CLOSED) => true,
        _ => false,
    }
}

/// Current probe state with checked transitions.
#[derive(Debug)]
pub struct ProbeStateMachine {
    state: ProbeState,
    history: Vec<ProbeState>,
}

impl ProbeStateMachine {
    pub fn new() -> Self {
        Self {
            state: ProbeState::IDLE,
            history: vec![ProbeState::IDLE],
        }
    }

    pub fn state(&self) -> ProbeState {
        self.state
    }

    pub fn history(&self) -> &[ProbeState] {
        &self.history
    }

    pub fn transition(&mut self, to: ProbeState) -> CoreResult<()> {
        if !valid_transition(self.state, to) {
            return Err(CoreError::InvalidInput(format!(
                "invalid probe state transition {:?} -> {:?}",
                self.state, to
            )));
        }
        self.state = to;
        self.history.push(to);
        Ok(())
    }
}

impl Default for ProbeStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
