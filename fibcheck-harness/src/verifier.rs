//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use fibcheck_utils::client::Telemetry;
use fibcheck_utils::telemetry::StatePath;
use ipnetwork::Ipv4Network;
use serde::Serialize;
use tokio::time::{self, Instant};
use tracing::{debug, trace};

use crate::error::Error;

// Polls device telemetry until the state converges to an expected value.
#[derive(Debug)]
pub struct ConvergenceVerifier<'a, T: Telemetry + ?Sized> {
    telemetry: &'a T,
    poll_interval: Duration,
}

// Outcome of a single state read.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PrefixState {
    // Observed value, if the state is present.
    pub observed: Option<String>,
    pub matched: bool,
}

// ===== impl ConvergenceVerifier =====

impl<'a, T> ConvergenceVerifier<'a, T>
where
    T: Telemetry + ?Sized,
{
    pub fn new(
        telemetry: &'a T,
        poll_interval: Duration,
    ) -> ConvergenceVerifier<'a, T> {
        ConvergenceVerifier {
            telemetry,
            poll_interval,
        }
    }

    // Reads the state leaf once. Absent state never matches.
    pub async fn poll_state(
        &self,
        path: &StatePath,
        expected: &str,
    ) -> Result<PrefixState, Error> {
        let observed =
            self.telemetry
                .get(path)
                .await
                .map_err(|error| Error::TelemetryRead {
                    path: path.to_string(),
                    error,
                })?;
        let matched = observed.as_deref() == Some(expected);
        Ok(PrefixState { observed, matched })
    }

    // Polls the state leaf until it matches the expected value.
    //
    // The last read happens at or after the deadline. A timeout is reported
    // along with the last observed value.
    pub async fn await_state(
        &self,
        path: &StatePath,
        expected: &str,
        timeout: Duration,
    ) -> Result<PrefixState, Error> {
        let deadline = Instant::now() + timeout;

        loop {
            let state = self.poll_state(path, expected).await?;
            if state.matched {
                debug!(%path, %expected, "state converged");
                return Ok(state);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::ConvergenceTimeout {
                    path: path.to_string(),
                    expected: expected.to_owned(),
                    observed: state.observed,
                    timeout,
                });
            }
            trace!(%path, observed = ?state.observed, "state not converged");
            time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    // Polls the AFT prefix leaf of the given IPv4 entry.
    pub async fn await_prefix_state(
        &self,
        instance: &str,
        prefix: Ipv4Network,
        expected: &str,
        timeout: Duration,
    ) -> Result<PrefixState, Error> {
        let path = StatePath::aft_prefix(instance, prefix);
        self.await_state(&path, expected, timeout).await
    }
}
