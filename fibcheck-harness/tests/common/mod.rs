//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use fibcheck_harness::scenario::Scenario;
use fibcheck_testbed::{Config, Testbed};
use fibcheck_utils::client::{
    ClientError, DeviceConfig, RoutingControl, RoutingSession, Telemetry,
    Topology, Traffic,
};
use fibcheck_utils::gribi::{
    AckMode, AftOperation, ElectionId, OperationResult, ProgrammingStatus,
    SessionParams,
};
use fibcheck_utils::telemetry::StatePath;
use fibcheck_utils::topology::{
    AteInterfaceCfg, DutInterfaceCfg, NetworkInstanceCfg, StaticRouteCfg,
};
use fibcheck_utils::traffic::{FlowCounters, FlowSpec};
use ipnetwork::Ipv4Network;
use tokio::time::Instant;
use tracing::info;

static INIT: Once = Once::new();

// Reply of the fake routing session to a modify request.
#[derive(Clone, Debug)]
pub enum Reply {
    Status(ProgrammingStatus),
    Error(ClientError),
    // Never reply.
    Hang,
}

// Requests received by the fake routing session.
#[derive(Debug, Default)]
pub struct SessionLog {
    pub ops: Vec<AftOperation>,
    pub flushed: Vec<String>,
    pub closed: bool,
}

// Routing session replying from a script.
//
// Operations not covered by the script are RIB programmed.
#[derive(Debug)]
pub struct FakeSession {
    params: SessionParams,
    replies: VecDeque<Reply>,
    log: Arc<Mutex<SessionLog>>,
}

// Telemetry surface replying from a script.
//
// The last scripted reply is repeated once the script is exhausted.
#[derive(Debug)]
pub struct FakeTelemetry {
    replies: Mutex<VecDeque<Result<Option<String>, ClientError>>>,
    pub reads: Mutex<Vec<Instant>>,
}

// Traffic generator whose counters follow a script.
//
// The last scripted counters are repeated once the script is exhausted.
#[derive(Debug)]
pub struct FakeTraffic {
    counters: Mutex<VecDeque<Result<FlowCounters, ClientError>>>,
    current: Mutex<FlowCounters>,
    pub events: Mutex<Vec<String>>,
}

// Testbed front-end failing selected requests.
//
// Provisioning and teardown requests are recorded, whether they fail or not.
#[derive(Debug)]
pub struct FaultyTestbed<'a> {
    testbed: &'a Testbed,
    pub fail_open: Option<ClientError>,
    pub fail_instance_delete: Option<ClientError>,
    pub events: Mutex<Vec<String>>,
}

// ===== impl FaultyTestbed =====

impl<'a> FaultyTestbed<'a> {
    pub fn new(testbed: &'a Testbed) -> FaultyTestbed<'a> {
        FaultyTestbed {
            testbed,
            fail_open: None,
            fail_instance_delete: None,
            events: Default::default(),
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: &str) {
        self.events.lock().unwrap().push(event.to_owned());
    }
}

#[async_trait]
impl Topology for FaultyTestbed<'_> {
    async fn configure_dut_interface(
        &self,
        cfg: DutInterfaceCfg,
    ) -> Result<(), ClientError> {
        self.testbed.configure_dut_interface(cfg).await
    }

    async fn configure_ate_interface(
        &self,
        cfg: AteInterfaceCfg,
    ) -> Result<(), ClientError> {
        self.testbed.configure_ate_interface(cfg).await
    }

    async fn start_protocols(&self) -> Result<(), ClientError> {
        self.record("start protocols");
        self.testbed.start_protocols().await
    }

    async fn stop_protocols(&self) -> Result<(), ClientError> {
        self.record("stop protocols");
        self.testbed.stop_protocols().await
    }
}

#[async_trait]
impl DeviceConfig for FaultyTestbed<'_> {
    async fn replace_network_instance(
        &self,
        cfg: NetworkInstanceCfg,
    ) -> Result<(), ClientError> {
        self.testbed.replace_network_instance(cfg).await
    }

    async fn delete_network_instance(
        &self,
        name: &str,
    ) -> Result<(), ClientError> {
        self.record("delete network instance");
        if let Some(error) = &self.fail_instance_delete {
            return Err(error.clone());
        }
        self.testbed.delete_network_instance(name).await
    }

    async fn replace_static_route(
        &self,
        cfg: StaticRouteCfg,
    ) -> Result<(), ClientError> {
        self.testbed.replace_static_route(cfg).await
    }

    async fn delete_static_route(
        &self,
        instance: &str,
        prefix: Ipv4Network,
    ) -> Result<(), ClientError> {
        self.record("delete static route");
        self.testbed.delete_static_route(instance, prefix).await
    }
}

#[async_trait]
impl RoutingControl for FaultyTestbed<'_> {
    async fn open(
        &self,
        params: SessionParams,
    ) -> Result<Box<dyn RoutingSession>, ClientError> {
        if let Some(error) = &self.fail_open {
            return Err(error.clone());
        }
        self.testbed.open(params).await
    }
}

// ===== impl FakeSession =====

impl FakeSession {
    pub fn start(
        ack_mode: AckMode,
        replies: Vec<Reply>,
    ) -> (Box<dyn RoutingSession>, Arc<Mutex<SessionLog>>) {
        let log = Arc::new(Mutex::new(SessionLog::default()));
        let session = FakeSession {
            params: SessionParams::new(true, ack_mode, ElectionId::new(0, 10)),
            replies: replies.into(),
            log: log.clone(),
        };
        (Box::new(session), log)
    }
}

#[async_trait]
impl RoutingSession for FakeSession {
    fn params(&self) -> &SessionParams {
        &self.params
    }

    async fn modify(
        &mut self,
        ops: Vec<AftOperation>,
    ) -> Result<Vec<OperationResult>, ClientError> {
        self.log.lock().unwrap().ops.extend(ops.iter().cloned());

        let reply = self
            .replies
            .pop_front()
            .unwrap_or(Reply::Status(ProgrammingStatus::RibProgrammed));
        match reply {
            Reply::Status(status) => Ok(ops
                .iter()
                .map(|op| OperationResult::new(op.id, status))
                .collect()),
            Reply::Error(error) => Err(error),
            Reply::Hang => std::future::pending().await,
        }
    }

    async fn flush(&mut self, instance: &str) -> Result<(), ClientError> {
        self.log.lock().unwrap().flushed.push(instance.to_owned());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.log.lock().unwrap().closed = true;
        Ok(())
    }
}

// ===== impl FakeTelemetry =====

impl FakeTelemetry {
    pub fn new(
        replies: Vec<Result<Option<String>, ClientError>>,
    ) -> FakeTelemetry {
        FakeTelemetry {
            replies: Mutex::new(replies.into()),
            reads: Default::default(),
        }
    }

    pub fn reads(&self) -> Vec<Instant> {
        self.reads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Telemetry for FakeTelemetry {
    async fn get(
        &self,
        _path: &StatePath,
    ) -> Result<Option<String>, ClientError> {
        self.reads.lock().unwrap().push(Instant::now());

        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop_front().unwrap()
        } else {
            replies.front().cloned().unwrap_or(Ok(None))
        }
    }
}

// ===== impl FakeTraffic =====

impl FakeTraffic {
    pub fn new(
        counters: Vec<Result<FlowCounters, ClientError>>,
    ) -> FakeTraffic {
        FakeTraffic {
            counters: Mutex::new(counters.into()),
            current: Default::default(),
            events: Default::default(),
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Traffic for FakeTraffic {
    async fn start(&self, flow: FlowSpec) -> Result<(), ClientError> {
        self.events.lock().unwrap().push(format!("start {}", flow.name));
        Ok(())
    }

    async fn stop(&self, flow_name: &str) -> Result<(), ClientError> {
        self.events.lock().unwrap().push(format!("stop {flow_name}"));
        Ok(())
    }

    async fn counters(
        &self,
        _flow_name: &str,
    ) -> Result<FlowCounters, ClientError> {
        let mut counters = self.counters.lock().unwrap();
        let reply = if counters.len() > 1 {
            counters.pop_front().unwrap()
        } else {
            counters.front().cloned().unwrap_or(Ok(Default::default()))
        };
        if let Ok(reply) = &reply {
            *self.current.lock().unwrap() = *reply;
        }
        reply
    }

    async fn loss_pct(&self, _flow_name: &str) -> Result<f32, ClientError> {
        let current = self.current.lock().unwrap();
        Ok(current.loss_pct().unwrap_or(0.0))
    }
}

// ===== helper functions =====

// Initializes tracing subscriber.
fn init_tracing() {
    tracing_subscriber::fmt::Subscriber::builder()
        .with_target(false)
        .with_ansi(false)
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("starting");
}

// ===== global functions =====

// Common initialization required by all tests.
pub fn setup() {
    INIT.call_once(|| {
        init_tracing();
    });
}

pub fn counters(tx_pkts: u64, rx_pkts: u64) -> FlowCounters {
    FlowCounters { tx_pkts, rx_pkts }
}

// Scenario with short polling intervals and a small flow.
pub fn scenario() -> Scenario {
    let mut scenario = Scenario::default();
    scenario.convergence.timeout_ms = 5_000;
    scenario.convergence.poll_interval_ms = 100;
    scenario.gribi.ack_timeout_ms = 1_000;
    scenario.traffic.packet_count = 500;
    scenario.traffic.duration_secs = 5;
    scenario.traffic.poll_interval_ms = 200;
    scenario
}

// Starts a testbed with the scenario links provisioned and the scenario
// network instance created.
pub async fn provisioned_testbed(scenario: &Scenario) -> Testbed {
    setup();

    let testbed = Testbed::start(Config::default());
    for link in &scenario.links {
        let cfg = DutInterfaceCfg::new(link.dut.clone(), None);
        testbed.configure_dut_interface(cfg).await.unwrap();
        let cfg = AteInterfaceCfg::new(link.ate.clone(), link.dut.ipv4);
        testbed.configure_ate_interface(cfg).await.unwrap();
    }
    testbed.start_protocols().await.unwrap();
    testbed
        .replace_network_instance(NetworkInstanceCfg::new(
            scenario.instance.clone(),
            scenario.instance_type,
            None,
        ))
        .await
        .unwrap();

    testbed
}
