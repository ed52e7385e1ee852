//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

mod common;

use std::time::Duration;

use fibcheck_harness::error::{Error, ErrorKind};
use fibcheck_harness::installer;
use fibcheck_harness::verifier::{ConvergenceVerifier, PrefixState};
use fibcheck_utils::client::{ClientError, Telemetry};
use fibcheck_utils::telemetry::StatePath;
use fibcheck_utils::topology::StaticRouteCfg;
use tokio::time::Instant;

use crate::common::*;

const PREFIX: &str = "203.0.113.0/24";

fn path() -> StatePath {
    StatePath::aft_prefix("DEFAULT", PREFIX.parse().unwrap())
}

// Test description:
//
// The entry is absent for a while before showing up. Absence isn't an error
// and polling goes on until the expected value is observed.
#[tokio::test(start_paused = true)]
async fn transient_absence() {
    setup();
    let telemetry = FakeTelemetry::new(vec![
        Ok(None),
        Ok(None),
        Ok(Some(PREFIX.to_owned())),
    ]);
    let verifier =
        ConvergenceVerifier::new(&telemetry, Duration::from_millis(100));

    let start = Instant::now();
    let state = verifier
        .await_state(&path(), PREFIX, Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(
        state,
        PrefixState {
            observed: Some(PREFIX.to_owned()),
            matched: true,
        }
    );
    assert_eq!(telemetry.reads().len(), 3);
    assert!(start.elapsed() < Duration::from_secs(1));
}

// Test description:
//
// The entry never converges. The last read happens at the deadline, and the
// timeout is reported along with the last observed value.
#[tokio::test(start_paused = true)]
async fn timeout_reports_observed() {
    setup();
    let observed = Some("192.0.2.0/24".to_owned());
    let telemetry = FakeTelemetry::new(vec![Ok(observed)]);
    let verifier =
        ConvergenceVerifier::new(&telemetry, Duration::from_millis(300));

    let start = Instant::now();
    let timeout = Duration::from_secs(1);
    let error = verifier
        .await_state(&path(), PREFIX, timeout)
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Convergence);
    match error {
        Error::ConvergenceTimeout {
            expected, observed, ..
        } => {
            assert_eq!(expected, PREFIX);
            assert_eq!(observed.as_deref(), Some("192.0.2.0/24"));
        }
        error => panic!("unexpected error: {error}"),
    }

    // Reads at 0, 300, 600, 900 and 1000 milliseconds.
    let reads = telemetry.reads();
    assert!(reads.len() >= 5);
    assert!(*reads.last().unwrap() - start >= timeout);
}

// Test description:
//
// Telemetry read errors aren't mistaken for absent state.
#[tokio::test(start_paused = true)]
async fn read_error() {
    setup();
    let telemetry = FakeTelemetry::new(vec![Err(ClientError::Unavailable)]);
    let verifier =
        ConvergenceVerifier::new(&telemetry, Duration::from_millis(100));

    let error = verifier
        .await_state(&path(), PREFIX, Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        Error::TelemetryRead {
            error: ClientError::Unavailable,
            ..
        }
    ));
    assert_eq!(error.kind(), ErrorKind::Convergence);
    assert_eq!(telemetry.reads().len(), 1);
}

// Test description:
//
// Once the AFT entry of a static route is observed, an immediate read of the
// same path returns the same value.
#[tokio::test(start_paused = true)]
async fn converged_state_is_stable() {
    let scenario = scenario();
    let testbed = provisioned_testbed(&scenario).await;
    let cfg = StaticRouteCfg::single(
        &scenario.instance,
        &scenario.static_protocol,
        scenario.prefix,
        &scenario.static_nh_key,
        scenario.static_nexthop,
        None,
    );
    installer::install_static_route(&testbed, cfg).await.unwrap();

    let verifier =
        ConvergenceVerifier::new(&testbed, Duration::from_millis(10));
    let expected = scenario.prefix.to_string();
    let state = verifier
        .await_prefix_state(
            &scenario.instance,
            scenario.prefix,
            &expected,
            Duration::from_secs(1),
        )
        .await
        .unwrap();
    assert!(state.matched);

    let path = StatePath::aft_prefix(&scenario.instance, scenario.prefix);
    assert_eq!(testbed.get(&path).await.unwrap(), state.observed);
    assert_eq!(verifier.poll_state(&path, &expected).await.unwrap(), state);
}
