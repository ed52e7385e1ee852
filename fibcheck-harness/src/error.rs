//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use fibcheck_utils::client::ClientError;
use fibcheck_utils::gribi::{FailureReason, ProgrammingStatus};
use fibcheck_utils::traffic::FlowCounters;
use ipnetwork::Ipv4Network;
use serde::Serialize;
use tracing::{error, warn};

// Verification run errors.
#[derive(Debug)]
pub enum Error {
    // Setup
    Provisioning {
        step: String,
        error: ClientError,
    },
    SessionOpen(ClientError),
    // Route programming
    StaticRoute {
        prefix: Ipv4Network,
        error: ClientError,
    },
    ProgrammingRequest {
        entry: String,
        error: ClientError,
    },
    ProgrammingFailed {
        entry: String,
        reason: FailureReason,
    },
    ProgrammingTimeout {
        entry: String,
        timeout: Duration,
    },
    NotInstalledInFib {
        entry: String,
        status: ProgrammingStatus,
    },
    UnacknowledgedReference {
        entry: String,
        reference: String,
    },
    MissingResult {
        entry: String,
    },
    // Convergence
    ConvergenceTimeout {
        path: String,
        expected: String,
        observed: Option<String>,
        timeout: Duration,
    },
    TelemetryRead {
        path: String,
        error: ClientError,
    },
    // Traffic
    TrafficLoss {
        flow: String,
        loss_pct: f32,
        counters: FlowCounters,
    },
    NoTrafficTransmitted {
        flow: String,
    },
    TrafficControl {
        flow: String,
        error: ClientError,
    },
    // Teardown
    Teardown {
        step: &'static str,
        error: ClientError,
    },
    Interrupted,
}

// Failure categories of a verification run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Setup,
    Programming,
    Convergence,
    Traffic,
    Teardown,
    Interrupted,
}

// ===== impl Error =====

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Provisioning { .. } | Error::SessionOpen(..) => {
                ErrorKind::Setup
            }
            Error::StaticRoute { .. }
            | Error::ProgrammingRequest { .. }
            | Error::ProgrammingFailed { .. }
            | Error::ProgrammingTimeout { .. }
            | Error::NotInstalledInFib { .. }
            | Error::UnacknowledgedReference { .. }
            | Error::MissingResult { .. } => ErrorKind::Programming,
            Error::ConvergenceTimeout { .. } | Error::TelemetryRead { .. } => {
                ErrorKind::Convergence
            }
            Error::TrafficLoss { .. }
            | Error::NoTrafficTransmitted { .. }
            | Error::TrafficControl { .. } => ErrorKind::Traffic,
            Error::Teardown { .. } => ErrorKind::Teardown,
            Error::Interrupted => ErrorKind::Interrupted,
        }
    }

    pub fn log(&self) {
        match self {
            Error::Provisioning { step, error } => {
                error!(%step, %error, "{}", self);
            }
            Error::SessionOpen(error) => {
                error!(%error, "{}", self);
            }
            Error::StaticRoute { prefix, error } => {
                error!(%prefix, %error, "{}", self);
            }
            Error::ProgrammingRequest { entry, error } => {
                error!(%entry, %error, "{}", self);
            }
            Error::ProgrammingFailed { entry, reason } => {
                error!(%entry, %reason, "{}", self);
            }
            Error::ProgrammingTimeout { entry, timeout } => {
                error!(%entry, ?timeout, "{}", self);
            }
            Error::NotInstalledInFib { entry, status } => {
                error!(%entry, %status, "{}", self);
            }
            Error::UnacknowledgedReference { entry, reference } => {
                error!(%entry, %reference, "{}", self);
            }
            Error::MissingResult { entry } => {
                error!(%entry, "{}", self);
            }
            Error::ConvergenceTimeout {
                path,
                expected,
                observed,
                timeout,
            } => {
                error!(%path, %expected, ?observed, ?timeout, "{}", self);
            }
            Error::TelemetryRead { path, error } => {
                error!(%path, %error, "{}", self);
            }
            Error::TrafficLoss {
                flow,
                loss_pct,
                counters,
            } => {
                error!(
                    %flow,
                    %loss_pct,
                    tx = %counters.tx_pkts,
                    rx = %counters.rx_pkts,
                    "{}", self
                );
            }
            Error::NoTrafficTransmitted { flow } => {
                error!(%flow, "{}", self);
            }
            Error::TrafficControl { flow, error } => {
                error!(%flow, %error, "{}", self);
            }
            Error::Teardown { step, error } => {
                warn!(%step, %error, "{}", self);
            }
            Error::Interrupted => {
                warn!("{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Provisioning { step, .. } => {
                write!(f, "failed to provision {step}")
            }
            Error::SessionOpen(..) => {
                write!(f, "failed to open routing-control session")
            }
            Error::StaticRoute { prefix, .. } => {
                write!(f, "failed to install static route {prefix}")
            }
            Error::ProgrammingRequest { entry, .. } => {
                write!(f, "failed to submit {entry}")
            }
            Error::ProgrammingFailed { entry, reason } => {
                write!(f, "device rejected {entry}: {reason}")
            }
            Error::ProgrammingTimeout { entry, timeout } => {
                write!(f, "{entry} not acknowledged within {timeout:?}")
            }
            Error::NotInstalledInFib { entry, status } => {
                write!(
                    f,
                    "{entry} not installed in forwarding table (status {status})"
                )
            }
            Error::UnacknowledgedReference { entry, reference } => {
                write!(f, "{entry} references unacknowledged {reference}")
            }
            Error::MissingResult { entry } => {
                write!(f, "no programming result received for {entry}")
            }
            Error::ConvergenceTimeout {
                path,
                expected,
                observed,
                timeout,
            } => {
                write!(
                    f,
                    "{path} didn't converge within {timeout:?}: expected {expected}, observed {}",
                    observed.as_deref().unwrap_or("<absent>")
                )
            }
            Error::TelemetryRead { path, .. } => {
                write!(f, "failed to read {path}")
            }
            Error::TrafficLoss {
                flow,
                loss_pct,
                counters,
            } => {
                write!(
                    f,
                    "flow {flow} lost {loss_pct}% of packets (tx {} rx {})",
                    counters.tx_pkts, counters.rx_pkts
                )
            }
            Error::NoTrafficTransmitted { flow } => {
                write!(f, "flow {flow} didn't transmit any packet")
            }
            Error::TrafficControl { flow, .. } => {
                write!(f, "failed to control flow {flow}")
            }
            Error::Teardown { step, .. } => {
                write!(f, "teardown step failed: {step}")
            }
            Error::Interrupted => {
                write!(f, "verification run interrupted")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Provisioning { error, .. }
            | Error::SessionOpen(error)
            | Error::StaticRoute { error, .. }
            | Error::ProgrammingRequest { error, .. }
            | Error::TelemetryRead { error, .. }
            | Error::TrafficControl { error, .. }
            | Error::Teardown { error, .. } => Some(error),
            _ => None,
        }
    }
}

// ===== global functions =====

// Formats an error along with its chain of sources.
pub fn with_source<E: std::error::Error>(error: E) -> String {
    if let Some(source) = error.source() {
        format!("{} ({})", error, with_source(source))
    } else {
        error.to_string()
    }
}
