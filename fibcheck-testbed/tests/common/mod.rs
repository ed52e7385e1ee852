//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![allow(dead_code)]

use std::net::Ipv4Addr;
use std::sync::Once;
use std::time::Duration;

use fibcheck_testbed::{Config, Testbed};
use fibcheck_utils::DEFAULT_INSTANCE;
use fibcheck_utils::client::{DeviceConfig, Telemetry, Topology};
use fibcheck_utils::gribi::{
    AckMode, AftEntry, AftOperation, ElectionId, Ipv4Entry, NextHopEntry,
    NextHopGroupEntry, OperationKind, SessionParams,
};
use fibcheck_utils::telemetry::StatePath;
use fibcheck_utils::topology::{
    AteInterfaceCfg, DutInterfaceCfg, NetworkInstanceCfg, NetworkInstanceType,
    PortAttrs, StaticRouteCfg,
};
use ipnetwork::Ipv4Network;
use maplit::btreemap;
use tracing::info;

static INIT: Once = Once::new();

pub const STATIC_NEXTHOP: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 6);
pub const GRIBI_NEXTHOP: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 10);
pub const NH_INDEX: u64 = 1;
pub const NHG_ID: u64 = 42;
pub const STATIC_PROTOCOL: &str = "static-1";

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

pub fn prefix() -> Ipv4Network {
    "203.0.113.0/24".parse().unwrap()
}

pub fn dut_port(n: u8) -> PortAttrs {
    PortAttrs::new(
        format!("port{n}"),
        format!("dutPort{n}"),
        format!("dutPort{n}"),
        Ipv4Addr::new(192, 0, 2, 4 * (n - 1) + 1),
        30,
    )
}

pub fn ate_port(n: u8) -> PortAttrs {
    PortAttrs::new(
        format!("port{n}"),
        format!("atePort{n}"),
        format!("atePort{n}"),
        Ipv4Addr::new(192, 0, 2, 4 * (n - 1) + 2),
        30,
    )
}

// Starts a testbed with three DUT <-> ATE links, ATE protocols running and
// the default network instance created.
pub async fn provision() -> Testbed {
    provision_instance(DEFAULT_INSTANCE).await
}

// Same as `provision`, with the default network instance named as given.
pub async fn provision_instance(name: &str) -> Testbed {
    setup();

    let testbed = Testbed::start(Config::default());
    for n in 1..=3 {
        let dut = dut_port(n);
        let ate = ate_port(n);
        testbed
            .configure_dut_interface(DutInterfaceCfg::new(dut.clone(), None))
            .await
            .unwrap();
        testbed
            .configure_ate_interface(AteInterfaceCfg::new(ate, dut.ipv4))
            .await
            .unwrap();
    }
    testbed.start_protocols().await.unwrap();
    testbed
        .replace_network_instance(NetworkInstanceCfg::new(
            name.to_owned(),
            NetworkInstanceType::Default,
            None,
        ))
        .await
        .unwrap();

    testbed
}

pub fn static_route(nexthop: Ipv4Addr) -> StaticRouteCfg {
    StaticRouteCfg::single(
        DEFAULT_INSTANCE,
        STATIC_PROTOCOL,
        prefix(),
        "nhg1",
        nexthop,
        Some("Static route added by gNMI-OC".to_owned()),
    )
}

pub fn session_params(ack_mode: AckMode, low: u64) -> SessionParams {
    SessionParams::new(true, ack_mode, ElectionId::new(0, low))
}

pub fn next_hop_op(
    id: u64,
    op: OperationKind,
    addr: Ipv4Addr,
) -> AftOperation {
    let nh = NextHopEntry::new(NH_INDEX, addr, DEFAULT_INSTANCE.to_owned());
    AftOperation::new(id, op, AftEntry::NextHop(nh))
}

pub fn next_hop_group_op(id: u64, op: OperationKind) -> AftOperation {
    let nhg = NextHopGroupEntry::new(
        NHG_ID,
        btreemap! { NH_INDEX => 1 },
        DEFAULT_INSTANCE.to_owned(),
    );
    AftOperation::new(id, op, AftEntry::NextHopGroup(nhg))
}

pub fn ipv4_entry_op(id: u64, op: OperationKind) -> AftOperation {
    let entry = Ipv4Entry::new(
        prefix(),
        NHG_ID,
        DEFAULT_INSTANCE.to_owned(),
        None,
        None,
    );
    AftOperation::new(id, op, AftEntry::Ipv4(entry))
}

// Returns the next-hop, next-hop-group and IPv4 entry additions, in
// programming order.
pub fn gribi_route_ops() -> Vec<AftOperation> {
    vec![
        next_hop_op(1, OperationKind::Add, GRIBI_NEXTHOP),
        next_hop_group_op(2, OperationKind::Add),
        ipv4_entry_op(3, OperationKind::Add),
    ]
}

// Reads a state leaf once the FIB programming delay has elapsed.
pub async fn settled_state(
    testbed: &Testbed,
    path: &StatePath,
) -> Option<String> {
    tokio::time::sleep(Duration::from_millis(500)).await;
    testbed.get(path).await.unwrap()
}

pub async fn origin(testbed: &Testbed) -> Option<String> {
    let path = StatePath::aft_origin_protocol(DEFAULT_INSTANCE, prefix());
    settled_state(testbed, &path).await
}
