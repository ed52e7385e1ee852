//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use async_trait::async_trait;
use fibcheck_utils::client::{
    ClientError, DeviceConfig, RoutingControl, RoutingSession, Telemetry,
    Topology, Traffic,
};
use fibcheck_utils::gribi::{AftOperation, OperationResult, SessionParams};
use fibcheck_utils::telemetry::StatePath;
use fibcheck_utils::topology::{
    AteInterfaceCfg, DutInterfaceCfg, NetworkInstanceCfg, StaticRouteCfg,
};
use fibcheck_utils::traffic::{FlowCounters, FlowSpec};
use fibcheck_utils::{Responder, Sender};
use ipnetwork::Ipv4Network;
use tokio::sync::oneshot;
use tracing::warn;

use crate::Testbed;
use crate::api::Request;
use crate::gribi::ClientId;

// gRIBI session opened against the testbed.
#[derive(Debug)]
pub struct GribiSession {
    request_tx: Sender<Request>,
    client_id: ClientId,
    params: SessionParams,
    closed: bool,
}

// ===== impl Testbed =====

#[async_trait]
impl Topology for Testbed {
    async fn configure_dut_interface(
        &self,
        cfg: DutInterfaceCfg,
    ) -> Result<(), ClientError> {
        request(&self.request_tx, |responder| Request::DutInterface {
            cfg,
            responder,
        })
        .await?
        .map_err(ClientError::from)
    }

    async fn configure_ate_interface(
        &self,
        cfg: AteInterfaceCfg,
    ) -> Result<(), ClientError> {
        request(&self.request_tx, |responder| Request::AteInterface {
            cfg,
            responder,
        })
        .await?
        .map_err(ClientError::from)
    }

    async fn start_protocols(&self) -> Result<(), ClientError> {
        request(&self.request_tx, |responder| Request::AteProtocols {
            enable: true,
            responder,
        })
        .await?
        .map_err(ClientError::from)
    }

    async fn stop_protocols(&self) -> Result<(), ClientError> {
        request(&self.request_tx, |responder| Request::AteProtocols {
            enable: false,
            responder,
        })
        .await?
        .map_err(ClientError::from)
    }
}

#[async_trait]
impl DeviceConfig for Testbed {
    async fn replace_network_instance(
        &self,
        cfg: NetworkInstanceCfg,
    ) -> Result<(), ClientError> {
        request(&self.request_tx, |responder| Request::InstanceReplace {
            cfg,
            responder,
        })
        .await?
        .map_err(ClientError::from)
    }

    async fn delete_network_instance(
        &self,
        name: &str,
    ) -> Result<(), ClientError> {
        let name = name.to_owned();
        request(&self.request_tx, |responder| Request::InstanceDelete {
            name,
            responder,
        })
        .await?
        .map_err(ClientError::from)
    }

    async fn replace_static_route(
        &self,
        cfg: StaticRouteCfg,
    ) -> Result<(), ClientError> {
        request(&self.request_tx, |responder| {
            Request::StaticRouteReplace { cfg, responder }
        })
        .await?
        .map_err(ClientError::from)
    }

    async fn delete_static_route(
        &self,
        instance: &str,
        prefix: Ipv4Network,
    ) -> Result<(), ClientError> {
        let instance = instance.to_owned();
        request(&self.request_tx, |responder| {
            Request::StaticRouteDelete {
                instance,
                prefix,
                responder,
            }
        })
        .await?
        .map_err(ClientError::from)
    }
}

#[async_trait]
impl RoutingControl for Testbed {
    async fn open(
        &self,
        params: SessionParams,
    ) -> Result<Box<dyn RoutingSession>, ClientError> {
        let client_id = request(&self.request_tx, |responder| {
            Request::GribiOpen { params, responder }
        })
        .await?;

        Ok(Box::new(GribiSession {
            request_tx: self.request_tx.clone(),
            client_id,
            params,
            closed: false,
        }))
    }
}

#[async_trait]
impl Telemetry for Testbed {
    async fn get(
        &self,
        path: &StatePath,
    ) -> Result<Option<String>, ClientError> {
        let path = path.clone();
        request(&self.request_tx, |responder| Request::Get { path, responder })
            .await
    }
}

#[async_trait]
impl Traffic for Testbed {
    async fn start(&self, flow: FlowSpec) -> Result<(), ClientError> {
        request(&self.request_tx, |responder| Request::FlowStart {
            flow,
            responder,
        })
        .await?
        .map_err(ClientError::from)
    }

    async fn stop(&self, flow_name: &str) -> Result<(), ClientError> {
        let name = flow_name.to_owned();
        request(&self.request_tx, |responder| Request::FlowStop {
            name,
            responder,
        })
        .await?
        .map_err(ClientError::from)
    }

    async fn counters(
        &self,
        flow_name: &str,
    ) -> Result<FlowCounters, ClientError> {
        let name = flow_name.to_owned();
        request(&self.request_tx, |responder| Request::FlowCounters {
            name,
            responder,
        })
        .await?
        .map_err(ClientError::from)
    }

    async fn loss_pct(&self, flow_name: &str) -> Result<f32, ClientError> {
        let counters = self.counters(flow_name).await?;
        Ok(counters.loss_pct().unwrap_or(0.0))
    }
}

// ===== impl GribiSession =====

#[async_trait]
impl RoutingSession for GribiSession {
    fn params(&self) -> &SessionParams {
        &self.params
    }

    async fn modify(
        &mut self,
        ops: Vec<AftOperation>,
    ) -> Result<Vec<OperationResult>, ClientError> {
        if self.closed {
            return Err(ClientError::SessionClosed);
        }

        let client_id = self.client_id;
        request(&self.request_tx, |responder| Request::GribiModify {
            client_id,
            ops,
            responder,
        })
        .await?
        .map_err(ClientError::from)
    }

    async fn flush(&mut self, instance: &str) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::SessionClosed);
        }

        let client_id = self.client_id;
        let instance = instance.to_owned();
        request(&self.request_tx, |responder| Request::GribiFlush {
            client_id,
            instance,
            responder,
        })
        .await?
        .map_err(ClientError::from)
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let client_id = self.client_id;
        request(&self.request_tx, |responder| Request::GribiClose {
            client_id,
            responder,
        })
        .await?
        .map_err(ClientError::from)
    }
}

impl Drop for GribiSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        warn!(
            client_id = %self.client_id,
            "gRIBI session dropped without being closed"
        );
        let (responder, _) = oneshot::channel();
        let _ = self.request_tx.try_send(Request::GribiClose {
            client_id: self.client_id,
            responder,
        });
    }
}

// ===== helper functions =====

// Sends a request to the testbed task and waits for its response.
async fn request<T, F>(
    request_tx: &Sender<Request>,
    build: F,
) -> Result<T, ClientError>
where
    T: Send,
    F: FnOnce(Responder<T>) -> Request + Send,
{
    let (responder_tx, responder_rx) = oneshot::channel();
    request_tx
        .send(build(responder_tx))
        .await
        .map_err(|_| ClientError::Unavailable)?;
    responder_rx.await.map_err(|_| ClientError::Unavailable)
}
