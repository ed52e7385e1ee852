//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use derive_new::new;
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};

// Addressing attributes of one end of a DUT <-> ATE link.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct PortAttrs {
    // Testbed port identifier (e.g. "port1").
    pub port: String,
    pub name: String,
    pub desc: String,
    pub ipv4: Ipv4Addr,
    pub prefix_len: u8,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct DutInterfaceCfg {
    pub attrs: PortAttrs,
    // Explicit administrative state, when the device requires it.
    pub enabled: Option<bool>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct AteInterfaceCfg {
    pub attrs: PortAttrs,
    pub gateway: Ipv4Addr,
}

// OpenConfig network instance types.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum NetworkInstanceType {
    #[serde(rename = "DEFAULT_INSTANCE")]
    Default,
    #[serde(rename = "L3VRF")]
    L3Vrf,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct NetworkInstanceCfg {
    pub name: String,
    pub instance_type: NetworkInstanceType,
    pub description: Option<String>,
}

// Static route, held by a STATIC protocol instance.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct StaticRouteCfg {
    pub instance: String,
    // Name of the STATIC protocol instance (e.g. "static-1").
    pub protocol_name: String,
    pub prefix: Ipv4Network,
    // Next-hop key to next-hop address.
    pub next_hops: BTreeMap<String, Ipv4Addr>,
    pub description: Option<String>,
}

// ===== impl PortAttrs =====

impl PortAttrs {
    // Returns the interface address along with its prefix length.
    pub fn ipv4_cidr(&self) -> Ipv4Network {
        Ipv4Network::new(self.ipv4, self.prefix_len)
            .unwrap_or_else(|_| Ipv4Network::from(self.ipv4))
    }
}

// ===== impl NetworkInstanceType =====

impl std::fmt::Display for NetworkInstanceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkInstanceType::Default => write!(f, "DEFAULT_INSTANCE"),
            NetworkInstanceType::L3Vrf => write!(f, "L3VRF"),
        }
    }
}

// ===== impl StaticRouteCfg =====

impl StaticRouteCfg {
    // Creates a static route with a single next-hop.
    pub fn single(
        instance: &str,
        protocol_name: &str,
        prefix: Ipv4Network,
        nh_key: &str,
        nexthop: Ipv4Addr,
        description: Option<String>,
    ) -> StaticRouteCfg {
        let mut next_hops = BTreeMap::new();
        next_hops.insert(nh_key.to_owned(), nexthop);
        StaticRouteCfg {
            instance: instance.to_owned(),
            protocol_name: protocol_name.to_owned(),
            prefix,
            next_hops,
            description,
        }
    }
}
