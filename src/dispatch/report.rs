use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Success(String),
    Failure { email: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDispatch {
    pub email: String,
    pub error: String,
}

/// What happened to every eligible recipient of a run, in completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub successes: Vec<String>,
    pub failures: Vec<FailedDispatch>,
}

impl Report {
    pub fn record(&mut self, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Success(email) => self.successes.push(email),
            DispatchOutcome::Failure { email, reason } => self.failures.push(FailedDispatch {
                email,
                error: reason,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The one place concurrent dispatches write to.
#[derive(Debug, Clone, Default)]
pub struct ReportCollector {
    inner: Arc<Mutex<Report>>,
}

impl ReportCollector {
    pub fn record(&self, outcome: DispatchOutcome) {
        // An outcome is never dropped because another writer panicked.
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(outcome);
    }

    /// Take the collected report. Call once every dispatch has settled.
    pub fn finish(self) -> Report {
        std::mem::take(&mut *self.inner.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
