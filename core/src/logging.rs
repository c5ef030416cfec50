use std::fmt;

/// Correlates log lines belonging to one analysis run.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
    pub phase: Option<String>,
}

impl LogContext {
    pub fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            phase: None,
        }
    }

    pub fn with_phase(&self, phase: &str) -> Self {
        Self {
            run_id: self.run_id.clone(),
            phase: Some(phase.to_string()),
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.phase {
            Some(phase) => write!(f, "[run={}] [phase={}]", self.run_id, phase),
            None => write!(f, "[run={}]", self.run_id),
        }
    }
}
