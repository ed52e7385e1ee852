//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};

// Structured state paths exposed by the device telemetry surface.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum StatePath {
    // Network instance type leaf.
    InstanceType {
        instance: String,
    },
    // Static route prefix leaf, under the given STATIC protocol instance.
    StaticRoutePrefix {
        instance: String,
        protocol_name: String,
        prefix: Ipv4Network,
    },
    // AFT IPv4 entry prefix leaf.
    AftIpv4EntryPrefix {
        instance: String,
        prefix: Ipv4Network,
    },
    // AFT IPv4 entry origin protocol leaf.
    AftIpv4EntryOriginProtocol {
        instance: String,
        prefix: Ipv4Network,
    },
}

// ===== impl StatePath =====

impl StatePath {
    pub fn instance_type(instance: &str) -> StatePath {
        StatePath::InstanceType {
            instance: instance.to_owned(),
        }
    }

    pub fn static_route_prefix(
        instance: &str,
        protocol_name: &str,
        prefix: Ipv4Network,
    ) -> StatePath {
        StatePath::StaticRoutePrefix {
            instance: instance.to_owned(),
            protocol_name: protocol_name.to_owned(),
            prefix,
        }
    }

    pub fn aft_prefix(instance: &str, prefix: Ipv4Network) -> StatePath {
        StatePath::AftIpv4EntryPrefix {
            instance: instance.to_owned(),
            prefix,
        }
    }

    pub fn aft_origin_protocol(
        instance: &str,
        prefix: Ipv4Network,
    ) -> StatePath {
        StatePath::AftIpv4EntryOriginProtocol {
            instance: instance.to_owned(),
            prefix,
        }
    }

    pub fn instance(&self) -> &str {
        match self {
            StatePath::InstanceType { instance }
            | StatePath::StaticRoutePrefix { instance, .. }
            | StatePath::AftIpv4EntryPrefix { instance, .. }
            | StatePath::AftIpv4EntryOriginProtocol { instance, .. } => {
                instance
            }
        }
    }
}

impl std::fmt::Display for StatePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "/network-instances/network-instance[name={}]",
            self.instance()
        )?;
        match self {
            StatePath::InstanceType { .. } => write!(f, "/state/type"),
            StatePath::StaticRoutePrefix {
                protocol_name,
                prefix,
                ..
            } => write!(
                f,
                "/protocols/protocol[identifier=STATIC][name={protocol_name}]/static-routes/static[prefix={prefix}]/state/prefix"
            ),
            StatePath::AftIpv4EntryPrefix { prefix, .. } => write!(
                f,
                "/afts/ipv4-unicast/ipv4-entry[prefix={prefix}]/state/prefix"
            ),
            StatePath::AftIpv4EntryOriginProtocol { prefix, .. } => write!(
                f,
                "/afts/ipv4-unicast/ipv4-entry[prefix={prefix}]/state/origin-protocol"
            ),
        }
    }
}
