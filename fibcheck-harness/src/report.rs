//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use chrono::{DateTime, Utc};
use derive_new::new;
use itertools::Itertools;
use serde::Serialize;

use crate::error::{Error, ErrorKind, with_source};
use crate::orchestrator::RunState;

// Outcome of a verification run.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub run: u32,
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
    // Last state reached before teardown.
    pub reached: RunState,
    pub final_state: RunState,
    pub failure: Option<Failure>,
    pub teardown_errors: Vec<String>,
    pub observations: Vec<Observation>,
}

#[derive(Clone, Debug, Serialize)]
#[derive(new)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

// State value read while verifying the run.
#[derive(Clone, Debug, Serialize)]
#[derive(new)]
pub struct Observation {
    pub step: RunState,
    pub subject: String,
    pub value: Option<String>,
}

// ===== impl RunReport =====

impl RunReport {
    // Teardown errors don't fail the run.
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verdict = if self.passed() { "PASSED" } else { "FAILED" };
        writeln!(
            f,
            "run {}: {} (reached {}, {} ms)",
            self.run,
            verdict,
            self.reached,
            (self.finished - self.started).num_milliseconds()
        )?;
        for observation in &self.observations {
            writeln!(
                f,
                "  [{}] {} = {}",
                observation.step,
                observation.subject,
                observation.value.as_deref().unwrap_or("<absent>")
            )?;
        }
        if let Some(failure) = &self.failure {
            writeln!(f, "  {:?} failure: {}", failure.kind, failure.message)?;
        }
        if !self.teardown_errors.is_empty() {
            writeln!(
                f,
                "  teardown errors: {}",
                self.teardown_errors.iter().join("; ")
            )?;
        }
        Ok(())
    }
}

// ===== impl Failure =====

impl From<&Error> for Failure {
    fn from(error: &Error) -> Failure {
        Failure::new(error.kind(), with_source(error))
    }
}
