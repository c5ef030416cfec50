use serde::{Deserialize, Serialize};

use crate::error::CoreResult;

/// An entry that was left out of an aggregate, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skip {
    pub name: String,
    pub reason: String,
}

/// Result of a per-entry operation: either a value or an explicit skip.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome<T> {
    Done(T),
    Skipped(Skip),
}

impl<T> EntryOutcome<T> {
    pub fn skipped(name: &str, reason: impl Into<String>) -> Self {
        EntryOutcome::Skipped(Skip {
            name: name.to_string(),
            reason: reason.into(),
        })
    }

    pub fn from_result(name: &str, r: CoreResult<T>) -> Self {
        match r {
            Ok(v) => EntryOutcome::Done(v),
            Err(e) => Self::skipped(name, e.to_string()),
        }
    }
}

/// Splits outcomes into completed values and skips, preserving order.
pub fn partition<T>(outcomes: impl IntoIterator<Item = EntryOutcome<T>>) -> (Vec<T>, Vec<Skip>) {
    let mut done = Vec::new();
    let mut skipped = Vec::new();
    for o in outcomes {
        match o {
            EntryOutcome::Done(v) => done.push(v),
            EntryOutcome::Skipped(s) => skipped.push(s),
        }
    }
    (done, skipped)
}
