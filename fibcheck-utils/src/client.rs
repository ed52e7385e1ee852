//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Contracts of the collaborators driven by the verification harness.
//!
//! Topology provisioning, the static-route configuration channel, the
//! routing-control (gRIBI) session, the telemetry surface and the traffic
//! generator are all accessed exclusively through these traits.

use async_trait::async_trait;
use ipnetwork::Ipv4Network;

use crate::gribi::{AftOperation, OperationResult, SessionParams};
use crate::telemetry::StatePath;
use crate::topology::{
    AteInterfaceCfg, DutInterfaceCfg, NetworkInstanceCfg, StaticRouteCfg,
};
use crate::traffic::{FlowCounters, FlowSpec};

// Collaborator errors.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ClientError {
    UnknownInstance(String),
    UnknownPort(String),
    UnknownInterface(String),
    UnknownFlow(String),
    FlowAlreadyRunning(String),
    SessionClosed,
    Rejected(String),
    Unavailable,
}

#[async_trait]
pub trait Topology: Send + Sync {
    async fn configure_dut_interface(
        &self,
        cfg: DutInterfaceCfg,
    ) -> Result<(), ClientError>;

    async fn configure_ate_interface(
        &self,
        cfg: AteInterfaceCfg,
    ) -> Result<(), ClientError>;

    // Starts the ATE emulated protocols (ARP resolution).
    async fn start_protocols(&self) -> Result<(), ClientError>;

    async fn stop_protocols(&self) -> Result<(), ClientError>;
}

#[async_trait]
pub trait DeviceConfig: Send + Sync {
    async fn replace_network_instance(
        &self,
        cfg: NetworkInstanceCfg,
    ) -> Result<(), ClientError>;

    async fn delete_network_instance(
        &self,
        name: &str,
    ) -> Result<(), ClientError>;

    // Replaces the static route object for the prefix.
    //
    // Fails if the target network instance doesn't exist.
    async fn replace_static_route(
        &self,
        cfg: StaticRouteCfg,
    ) -> Result<(), ClientError>;

    async fn delete_static_route(
        &self,
        instance: &str,
        prefix: Ipv4Network,
    ) -> Result<(), ClientError>;
}

#[async_trait]
pub trait RoutingControl: Send + Sync {
    async fn open(
        &self,
        params: SessionParams,
    ) -> Result<Box<dyn RoutingSession>, ClientError>;
}

#[async_trait]
pub trait RoutingSession: Send + Sync {
    // Returns the parameters negotiated when the session was opened.
    fn params(&self) -> &SessionParams;

    // Submits operations and waits for their results, as governed by the
    // session acknowledgment mode.
    async fn modify(
        &mut self,
        ops: Vec<AftOperation>,
    ) -> Result<Vec<OperationResult>, ClientError>;

    // Removes every entry programmed in the network instance.
    async fn flush(&mut self, instance: &str) -> Result<(), ClientError>;

    async fn close(&mut self) -> Result<(), ClientError>;
}

#[async_trait]
pub trait Telemetry: Send + Sync {
    // Reads a state leaf. Absent state isn't an error.
    async fn get(&self, path: &StatePath)
    -> Result<Option<String>, ClientError>;
}

#[async_trait]
pub trait Traffic: Send + Sync {
    async fn start(&self, flow: FlowSpec) -> Result<(), ClientError>;

    async fn stop(&self, flow_name: &str) -> Result<(), ClientError>;

    async fn counters(
        &self,
        flow_name: &str,
    ) -> Result<FlowCounters, ClientError>;

    async fn loss_pct(&self, flow_name: &str) -> Result<f32, ClientError>;
}

// ===== impl ClientError =====

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::UnknownInstance(name) => {
                write!(f, "network instance {name} not found")
            }
            ClientError::UnknownPort(port) => {
                write!(f, "port {port} not found")
            }
            ClientError::UnknownInterface(name) => {
                write!(f, "interface {name} not found")
            }
            ClientError::UnknownFlow(name) => {
                write!(f, "flow {name} not found")
            }
            ClientError::FlowAlreadyRunning(name) => {
                write!(f, "flow {name} is already running")
            }
            ClientError::SessionClosed => {
                write!(f, "session is closed")
            }
            ClientError::Rejected(reason) => {
                write!(f, "request rejected: {reason}")
            }
            ClientError::Unavailable => {
                write!(f, "device unavailable")
            }
        }
    }
}

impl std::error::Error for ClientError {}
