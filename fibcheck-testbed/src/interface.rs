//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use derive_new::new;
use fibcheck_utils::topology::DutInterfaceCfg;
use ipnetwork::Ipv4Network;
use tracing::debug;

use crate::error::Error;

// DUT interfaces, indexed by testbed port.
#[derive(Debug, Default)]
pub struct Interfaces {
    ports: Vec<String>,
    tree: BTreeMap<String, Interface>,
}

#[derive(Clone, Debug, new)]
pub struct Interface {
    pub port: String,
    pub addr: Ipv4Network,
    pub enabled: bool,
}

// ===== impl Interfaces =====

impl Interfaces {
    pub(crate) fn new(ports: Vec<String>) -> Interfaces {
        Interfaces {
            ports,
            tree: Default::default(),
        }
    }

    // Replaces the configuration of the interface attached to the given port.
    //
    // Returns whether the interface changed.
    pub(crate) fn configure(
        &mut self,
        cfg: DutInterfaceCfg,
    ) -> Result<bool, Error> {
        if !self.has_port(&cfg.attrs.port) {
            return Err(Error::UnknownPort(cfg.attrs.port));
        }

        let iface = Interface::new(
            cfg.attrs.port.clone(),
            cfg.attrs.ipv4_cidr(),
            cfg.enabled.unwrap_or(true),
        );
        let changed = match self.tree.get(&iface.port) {
            Some(old) => old.addr != iface.addr || old.enabled != iface.enabled,
            None => true,
        };
        if changed {
            debug!(
                port = %iface.port,
                desc = %cfg.attrs.desc,
                addr = %iface.addr,
                enabled = %iface.enabled,
                "interface updated"
            );
        }
        self.tree.insert(iface.port.clone(), iface);

        Ok(changed)
    }

    pub(crate) fn has_port(&self, port: &str) -> bool {
        self.ports.iter().any(|p| p == port)
    }

    pub(crate) fn get(&self, port: &str) -> Option<&Interface> {
        self.tree.get(port)
    }

    // Returns the operative interface whose connected subnet contains the
    // given address.
    pub(crate) fn connected(&self, addr: Ipv4Addr) -> Option<&Interface> {
        self.tree.values().find(|iface| {
            iface.enabled
                && iface.addr.contains(addr)
                && iface.addr.ip() != addr
        })
    }
}
