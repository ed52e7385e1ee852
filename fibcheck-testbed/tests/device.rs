//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

mod common;

use std::net::Ipv4Addr;

use fibcheck_utils::DEFAULT_INSTANCE;
use fibcheck_utils::client::{
    ClientError, DeviceConfig, RoutingControl, Telemetry, Topology,
};
use fibcheck_utils::gribi::{
    AckMode, FailureReason, OperationKind, ProgrammingStatus,
};
use fibcheck_utils::telemetry::StatePath;
use fibcheck_utils::topology::{
    DutInterfaceCfg, NetworkInstanceCfg, NetworkInstanceType,
};

use crate::common::*;

// Test description:
//
// A static route whose nexthop is reachable through a connected subnet should
// be installed in the AFT, and removed once deleted.
#[tokio::test(start_paused = true)]
async fn static_route_install() {
    let testbed = provision().await;
    let path = StatePath::aft_prefix(DEFAULT_INSTANCE, prefix());

    testbed
        .replace_static_route(static_route(STATIC_NEXTHOP))
        .await
        .unwrap();
    assert_eq!(
        settled_state(&testbed, &path).await.as_deref(),
        Some("203.0.113.0/24")
    );
    assert_eq!(origin(&testbed).await.as_deref(), Some("STATIC"));
    let static_path = StatePath::static_route_prefix(
        DEFAULT_INSTANCE,
        STATIC_PROTOCOL,
        prefix(),
    );
    assert_eq!(
        testbed.get(&static_path).await.unwrap().as_deref(),
        Some("203.0.113.0/24")
    );
    // The route is held by a single STATIC protocol instance.
    let other_path = StatePath::static_route_prefix(
        DEFAULT_INSTANCE,
        "static-2",
        prefix(),
    );
    assert_eq!(testbed.get(&other_path).await.unwrap(), None);

    testbed
        .delete_static_route(DEFAULT_INSTANCE, prefix())
        .await
        .unwrap();
    assert_eq!(settled_state(&testbed, &path).await, None);
    assert_eq!(testbed.get(&static_path).await.unwrap(), None);
}

// Test description:
//
// Static routes can't be installed in a network instance that doesn't exist.
#[tokio::test(start_paused = true)]
async fn static_route_unknown_instance() {
    let testbed = provision().await;

    let mut cfg = static_route(STATIC_NEXTHOP);
    cfg.instance = "VRF-A".to_owned();
    assert_eq!(
        testbed.replace_static_route(cfg).await,
        Err(ClientError::UnknownInstance("VRF-A".to_owned()))
    );
}

// Test description:
//
// Replacing a static route with identical arguments leaves the observable
// state untouched.
#[tokio::test(start_paused = true)]
async fn static_route_replace_idempotent() {
    let testbed = provision().await;
    let path = StatePath::aft_prefix(DEFAULT_INSTANCE, prefix());

    testbed
        .replace_static_route(static_route(STATIC_NEXTHOP))
        .await
        .unwrap();
    let before = settled_state(&testbed, &path).await;

    for _ in 0..3 {
        testbed
            .replace_static_route(static_route(STATIC_NEXTHOP))
            .await
            .unwrap();
        // The entry is never withdrawn.
        assert_eq!(testbed.get(&path).await.unwrap(), before);
    }
    assert_eq!(settled_state(&testbed, &path).await, before);
    assert_eq!(origin(&testbed).await.as_deref(), Some("STATIC"));
}

// Test description:
//
// With both channels programming the same prefix, the static route is
// preferred. Once it's removed, the gRIBI route takes over.
#[tokio::test(start_paused = true)]
async fn static_preferred_over_gribi() {
    let testbed = provision().await;

    testbed
        .replace_static_route(static_route(STATIC_NEXTHOP))
        .await
        .unwrap();
    let mut session = testbed
        .open(session_params(AckMode::RibAck, 10))
        .await
        .unwrap();
    session.modify(gribi_route_ops()).await.unwrap();
    assert_eq!(origin(&testbed).await.as_deref(), Some("STATIC"));

    testbed
        .delete_static_route(DEFAULT_INSTANCE, prefix())
        .await
        .unwrap();
    assert_eq!(origin(&testbed).await.as_deref(), Some("GRIBI"));

    session.close().await.unwrap();
}

// Test description:
//
// A static route whose nexthop isn't resolvable doesn't shadow the gRIBI
// route.
#[tokio::test(start_paused = true)]
async fn static_route_unresolvable_nexthop() {
    let testbed = provision().await;

    testbed
        .replace_static_route(static_route(Ipv4Addr::new(198, 51, 100, 1)))
        .await
        .unwrap();
    assert_eq!(origin(&testbed).await, None);

    let mut session = testbed
        .open(session_params(AckMode::RibAck, 10))
        .await
        .unwrap();
    session.modify(gribi_route_ops()).await.unwrap();
    assert_eq!(origin(&testbed).await.as_deref(), Some("GRIBI"));

    session.close().await.unwrap();
}

// Test description:
//
// Disabling the interface used to reach the static nexthop withdraws the
// static route from the FIB in favor of the gRIBI route.
#[tokio::test(start_paused = true)]
async fn interface_disable_reselects_route() {
    let testbed = provision().await;

    testbed
        .replace_static_route(static_route(STATIC_NEXTHOP))
        .await
        .unwrap();
    let mut session = testbed
        .open(session_params(AckMode::RibAck, 10))
        .await
        .unwrap();
    session.modify(gribi_route_ops()).await.unwrap();
    assert_eq!(origin(&testbed).await.as_deref(), Some("STATIC"));

    let cfg = DutInterfaceCfg::new(dut_port(2), Some(false));
    testbed.configure_dut_interface(cfg).await.unwrap();
    assert_eq!(origin(&testbed).await.as_deref(), Some("GRIBI"));

    let cfg = DutInterfaceCfg::new(dut_port(2), Some(true));
    testbed.configure_dut_interface(cfg).await.unwrap();
    assert_eq!(origin(&testbed).await.as_deref(), Some("STATIC"));

    session.close().await.unwrap();
}

// Test description:
//
// Deleting a network instance removes its static routes, gRIBI entries and
// forwarding state. Re-creating it starts from a clean table.
#[tokio::test(start_paused = true)]
async fn instance_delete_wipes_state() {
    let testbed = provision().await;
    let path = StatePath::aft_prefix(DEFAULT_INSTANCE, prefix());
    let static_path = StatePath::static_route_prefix(
        DEFAULT_INSTANCE,
        STATIC_PROTOCOL,
        prefix(),
    );
    let type_path = StatePath::instance_type(DEFAULT_INSTANCE);

    testbed
        .replace_static_route(static_route(STATIC_NEXTHOP))
        .await
        .unwrap();
    let mut session = testbed
        .open(session_params(AckMode::RibAck, 10))
        .await
        .unwrap();
    session.modify(gribi_route_ops()).await.unwrap();
    assert!(settled_state(&testbed, &path).await.is_some());
    assert_eq!(
        testbed.get(&type_path).await.unwrap().as_deref(),
        Some("DEFAULT_INSTANCE")
    );

    testbed
        .delete_network_instance(DEFAULT_INSTANCE)
        .await
        .unwrap();
    assert_eq!(settled_state(&testbed, &path).await, None);
    assert_eq!(
        testbed.delete_network_instance(DEFAULT_INSTANCE).await,
        Err(ClientError::UnknownInstance(DEFAULT_INSTANCE.to_owned()))
    );

    assert_eq!(testbed.get(&type_path).await.unwrap(), None);

    testbed
        .replace_network_instance(NetworkInstanceCfg::new(
            DEFAULT_INSTANCE.to_owned(),
            NetworkInstanceType::Default,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(settled_state(&testbed, &path).await, None);
    assert_eq!(testbed.get(&static_path).await.unwrap(), None);

    // Entries programmed before the deletion are gone as well.
    let results = session
        .modify(vec![next_hop_group_op(1, OperationKind::Add)])
        .await
        .unwrap();
    assert_eq!(
        results[0].status,
        ProgrammingStatus::Failed(FailureReason::MissingReference)
    );

    session.close().await.unwrap();
}

// Test description:
//
// A device has a single network instance of type DEFAULT_INSTANCE, whatever
// its name. VRF instances can be added next to it.
#[tokio::test(start_paused = true)]
async fn single_default_instance() {
    let testbed = provision().await;

    assert!(matches!(
        testbed
            .replace_network_instance(NetworkInstanceCfg::new(
                "VRF-A".to_owned(),
                NetworkInstanceType::Default,
                None,
            ))
            .await,
        Err(ClientError::Rejected(..))
    ));
    assert_eq!(
        testbed
            .get(&StatePath::instance_type("VRF-A"))
            .await
            .unwrap(),
        None
    );

    testbed
        .replace_network_instance(NetworkInstanceCfg::new(
            "VRF-A".to_owned(),
            NetworkInstanceType::L3Vrf,
            Some("Customer VRF".to_owned()),
        ))
        .await
        .unwrap();
    assert_eq!(
        testbed
            .get(&StatePath::instance_type("VRF-A"))
            .await
            .unwrap()
            .as_deref(),
        Some("L3VRF")
    );

    // Replacing the default instance itself is fine.
    testbed
        .replace_network_instance(NetworkInstanceCfg::new(
            DEFAULT_INSTANCE.to_owned(),
            NetworkInstanceType::Default,
            None,
        ))
        .await
        .unwrap();
}
