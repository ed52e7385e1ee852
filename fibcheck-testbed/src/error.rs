//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use fibcheck_utils::client::ClientError;
use fibcheck_utils::gribi::FailureReason;
use tracing::warn;

use crate::gribi::ClientId;

// Testbed errors.
#[derive(Debug)]
pub enum Error {
    UnknownPort(String),
    UnknownInterface(String),
    UnknownInstance(String),
    DefaultInstanceExists(String),
    UnknownFlow(String),
    FlowAlreadyRunning(String),
    UnknownSession(ClientId),
    GribiRejected(ClientId, FailureReason),
}

// ===== impl Error =====

impl Error {
    pub(crate) fn log(&self) {
        match self {
            Error::UnknownPort(port) => {
                warn!(%port, "{}", self);
            }
            Error::UnknownInterface(name) => {
                warn!(%name, "{}", self);
            }
            Error::UnknownInstance(name) => {
                warn!(%name, "{}", self);
            }
            Error::DefaultInstanceExists(name) => {
                warn!(%name, "{}", self);
            }
            Error::UnknownFlow(name) | Error::FlowAlreadyRunning(name) => {
                warn!(flow = %name, "{}", self);
            }
            Error::UnknownSession(client_id) => {
                warn!(%client_id, "{}", self);
            }
            Error::GribiRejected(client_id, reason) => {
                warn!(%client_id, %reason, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnknownPort(..) => {
                write!(f, "unknown testbed port")
            }
            Error::UnknownInterface(..) => {
                write!(f, "unknown ATE interface")
            }
            Error::UnknownInstance(..) => {
                write!(f, "unknown network instance")
            }
            Error::DefaultInstanceExists(..) => {
                write!(f, "default network instance already exists")
            }
            Error::UnknownFlow(..) => {
                write!(f, "unknown traffic flow")
            }
            Error::FlowAlreadyRunning(..) => {
                write!(f, "traffic flow already running")
            }
            Error::UnknownSession(..) => {
                write!(f, "unknown gRIBI session")
            }
            Error::GribiRejected(..) => {
                write!(f, "gRIBI request rejected")
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<Error> for ClientError {
    fn from(error: Error) -> ClientError {
        match error {
            Error::UnknownPort(port) => ClientError::UnknownPort(port),
            Error::UnknownInterface(name) => {
                ClientError::UnknownInterface(name)
            }
            Error::UnknownInstance(name) => ClientError::UnknownInstance(name),
            Error::DefaultInstanceExists(name) => ClientError::Rejected(
                format!("default network instance {name} already exists"),
            ),
            Error::UnknownFlow(name) => ClientError::UnknownFlow(name),
            Error::FlowAlreadyRunning(name) => {
                ClientError::FlowAlreadyRunning(name)
            }
            Error::UnknownSession(..) => ClientError::SessionClosed,
            Error::GribiRejected(_, reason) => {
                ClientError::Rejected(reason.to_string())
            }
        }
    }
}
