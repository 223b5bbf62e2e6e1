//! Step log for multi-step mutations
//!
//! Sending a comanda and settling a table apply several effects with
//! no transaction across them. Each effect records a [`StepOutcome`]
//! so a partially applied operation is inspectable instead of silent.

/// Outcome status of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Ok,
    Failed,
    Skipped,
}

/// Outcome of one step of a multi-step operation
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Stable step name ("stock_deduct", "kitchen_ticket", ...)
    pub step: &'static str,
    pub status: StepStatus,
    pub detail: Option<String>,
}

impl StepOutcome {
    pub fn ok(step: &'static str) -> Self {
        Self {
            step,
            status: StepStatus::Ok,
            detail: None,
        }
    }

    pub fn failed(step: &'static str, detail: impl Into<String>) -> Self {
        Self {
            step,
            status: StepStatus::Failed,
            detail: Some(detail.into()),
        }
    }

    pub fn skipped(step: &'static str, detail: impl Into<String>) -> Self {
        Self {
            step,
            status: StepStatus::Skipped,
            detail: Some(detail.into()),
        }
    }
}

pub type StepLog = Vec<StepOutcome>;

/// Whether a named step failed
pub fn step_failed(log: &StepLog, step: &str) -> bool {
    log.iter()
        .any(|s| s.step == step && s.status == StepStatus::Failed)
}
