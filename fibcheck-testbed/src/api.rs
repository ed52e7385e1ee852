//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use fibcheck_utils::Responder;
use fibcheck_utils::gribi::{AftOperation, OperationResult, SessionParams};
use fibcheck_utils::telemetry::StatePath;
use fibcheck_utils::topology::{
    AteInterfaceCfg, DutInterfaceCfg, NetworkInstanceCfg, StaticRouteCfg,
};
use fibcheck_utils::traffic::{FlowCounters, FlowSpec};
use ipnetwork::Ipv4Network;

use crate::error::Error;
use crate::gribi::ClientId;

// Requests processed by the testbed task.
#[derive(Debug)]
pub enum Request {
    // Configure a DUT interface.
    DutInterface {
        cfg: DutInterfaceCfg,
        responder: Responder<Result<(), Error>>,
    },
    // Configure an ATE interface.
    AteInterface {
        cfg: AteInterfaceCfg,
        responder: Responder<Result<(), Error>>,
    },
    // Start or stop the ATE emulated protocols.
    AteProtocols {
        enable: bool,
        responder: Responder<Result<(), Error>>,
    },
    InstanceReplace {
        cfg: NetworkInstanceCfg,
        responder: Responder<Result<(), Error>>,
    },
    InstanceDelete {
        name: String,
        responder: Responder<Result<(), Error>>,
    },
    StaticRouteReplace {
        cfg: StaticRouteCfg,
        responder: Responder<Result<(), Error>>,
    },
    StaticRouteDelete {
        instance: String,
        prefix: Ipv4Network,
        responder: Responder<Result<(), Error>>,
    },
    // Open a new gRIBI session.
    GribiOpen {
        params: SessionParams,
        responder: Responder<ClientId>,
    },
    // Submit gRIBI operations. The response is deferred until the forwarding
    // table is programmed when the session uses FIB acknowledgments.
    GribiModify {
        client_id: ClientId,
        ops: Vec<AftOperation>,
        responder: Responder<Result<Vec<OperationResult>, Error>>,
    },
    GribiFlush {
        client_id: ClientId,
        instance: String,
        responder: Responder<Result<(), Error>>,
    },
    GribiClose {
        client_id: ClientId,
        responder: Responder<Result<(), Error>>,
    },
    // Read a state leaf.
    Get {
        path: StatePath,
        responder: Responder<Option<String>>,
    },
    FlowStart {
        flow: FlowSpec,
        responder: Responder<Result<(), Error>>,
    },
    FlowStop {
        name: String,
        responder: Responder<Result<(), Error>>,
    },
    FlowCounters {
        name: String,
        responder: Responder<Result<FlowCounters, Error>>,
    },
    // Transmission tick of a running flow.
    FlowTick {
        name: String,
    },
}
