//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![allow(clippy::derivable_impls)]

use std::net::Ipv4Addr;
use std::time::Duration;

use fibcheck_utils::DEFAULT_INSTANCE;
use fibcheck_utils::gribi::{AckMode, ElectionId, SessionParams};
use fibcheck_utils::protocol::Protocol;
use fibcheck_utils::topology::{NetworkInstanceType, PortAttrs};
use fibcheck_utils::traffic::Ipv4AddrRange;
use ipnetwork::Ipv4Network;
use serde::Deserialize;

// Parameters of the static/gRIBI route preference scenario.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Scenario {
    // Network instance both channels program.
    pub instance: String,
    pub instance_type: NetworkInstanceType,
    pub instance_description: Option<String>,
    // DUT <-> ATE links. The first one sources the traffic.
    pub links: Vec<Link>,
    // Prefix programmed through both channels.
    pub prefix: Ipv4Network,
    // STATIC protocol instance holding the static route.
    pub static_protocol: String,
    pub static_nexthop: Ipv4Addr,
    pub static_nh_key: String,
    pub static_description: Option<String>,
    pub nh_index: u64,
    pub nhg_id: u64,
    pub gribi_nexthop: Ipv4Addr,
    pub ipv4_entry_tag: Option<String>,
    // Channel the AFT is expected to report as the prefix origin.
    pub expected_origin: Protocol,
    pub gribi: Gribi,
    pub convergence: Convergence,
    pub traffic: TrafficParams,
    pub deviations: Deviations,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Link {
    pub dut: PortAttrs,
    pub ate: PortAttrs,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Gribi {
    pub persistence: bool,
    pub fib_ack: bool,
    pub election_id: ElectionId,
    pub flush_on_teardown: bool,
    pub ack_timeout_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Convergence {
    pub timeout_ms: u64,
    pub poll_interval_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrafficParams {
    pub flow_name: String,
    pub src_endpoint: String,
    pub dst_endpoint: String,
    pub dst_min: Ipv4Addr,
    pub dst_max: Ipv4Addr,
    pub dst_count: u32,
    pub packet_count: u64,
    pub rate_pps: u64,
    // Upper bound of the observation window.
    pub duration_secs: u64,
    pub poll_interval_ms: u64,
    // Consecutive unchanged counter reads required to consider the flow
    // complete.
    pub stable_polls: u32,
}

// Device-specific workarounds.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Deviations {
    // Explicitly enable interfaces and their IPv4 subinterfaces.
    pub interface_enabled: bool,
}

// ===== impl Scenario =====

impl Scenario {
    pub fn session_params(&self) -> SessionParams {
        let ack_mode = if self.gribi.fib_ack {
            AckMode::RibAndFibAck
        } else {
            AckMode::RibAck
        };
        SessionParams::new(
            self.gribi.persistence,
            ack_mode,
            self.gribi.election_id,
        )
    }

    pub fn dst_range(&self) -> Ipv4AddrRange {
        Ipv4AddrRange::new(
            self.traffic.dst_min,
            self.traffic.dst_max,
            self.traffic.dst_count,
        )
    }
}

impl Default for Scenario {
    fn default() -> Scenario {
        let links = (1..=3).map(Link::numbered).collect();

        Scenario {
            instance: DEFAULT_INSTANCE.to_owned(),
            instance_type: NetworkInstanceType::Default,
            instance_description: Some(
                "Network instance for route preference checks".to_owned(),
            ),
            links,
            prefix: Ipv4Network::new(Ipv4Addr::new(203, 0, 113, 0), 24)
                .unwrap(),
            static_protocol: "static-1".to_owned(),
            static_nexthop: Ipv4Addr::new(192, 0, 2, 6),
            static_nh_key: "nhg1".to_owned(),
            static_description: Some(
                "Static route added by gNMI-OC".to_owned(),
            ),
            nh_index: 1,
            nhg_id: 42,
            gribi_nexthop: Ipv4Addr::new(192, 0, 2, 10),
            ipv4_entry_tag: None,
            expected_origin: Protocol::STATIC,
            gribi: Default::default(),
            convergence: Default::default(),
            traffic: Default::default(),
            deviations: Default::default(),
        }
    }
}

// ===== impl Link =====

impl Link {
    // Builds the n-th link of a chain of /30 subnets carved from
    // 192.0.2.0/24, with the DUT taking the first host address.
    pub fn numbered(n: u8) -> Link {
        let base = 4 * (n - 1);
        let attrs = |role: &str, host: u8| {
            PortAttrs::new(
                format!("port{n}"),
                format!("{role}Port{n}"),
                format!("{role}Port{n}"),
                Ipv4Addr::new(192, 0, 2, base + host),
                30,
            )
        };

        Link {
            dut: attrs("dut", 1),
            ate: attrs("ate", 2),
        }
    }
}

// ===== impl Gribi =====

impl Gribi {
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }
}

impl Default for Gribi {
    fn default() -> Gribi {
        Gribi {
            persistence: true,
            fib_ack: false,
            election_id: ElectionId::new(0, 10),
            flush_on_teardown: true,
            ack_timeout_ms: 5000,
        }
    }
}

// ===== impl Convergence =====

impl Convergence {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for Convergence {
    fn default() -> Convergence {
        Convergence {
            timeout_ms: 60_000,
            poll_interval_ms: 500,
        }
    }
}

// ===== impl TrafficParams =====

impl TrafficParams {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for TrafficParams {
    fn default() -> TrafficParams {
        TrafficParams {
            flow_name: "Flow".to_owned(),
            src_endpoint: "atePort1".to_owned(),
            dst_endpoint: "atePort2".to_owned(),
            dst_min: Ipv4Addr::new(203, 0, 113, 0),
            dst_max: Ipv4Addr::new(203, 0, 113, 254),
            dst_count: 250,
            packet_count: 2500,
            rate_pps: 1000,
            duration_secs: 15,
            poll_interval_ms: 500,
            stable_polls: 3,
        }
    }
}
