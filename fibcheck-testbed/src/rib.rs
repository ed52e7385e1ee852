//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet, btree_map};
use std::net::Ipv4Addr;

use bitflags::bitflags;
use derive_new::new;
use fibcheck_utils::ip::Ipv4AddrExt;
use fibcheck_utils::UnboundedSender;
use fibcheck_utils::protocol::Protocol;
use ipnetwork::Ipv4Network;
use prefix_trie::map::PrefixMap;
use tracing::debug;

use crate::interface::Interfaces;

// Routing table of a network instance.
//
// Routes for the same prefix are kept ordered by administrative distance,
// each tagged with the channel that installed it.
#[derive(Debug)]
pub struct Rib {
    pub ipv4: PrefixMap<Ipv4Network, BTreeMap<(u32, Protocol), Route>>,
    pub fib: PrefixMap<Ipv4Network, FibEntry>,
    pub update_queue: BTreeSet<Ipv4Network>,
    pub update_queue_tx: UnboundedSender<()>,
}

#[derive(Clone, Debug, Eq, PartialEq, new)]
pub struct Route {
    pub protocol: Protocol,
    pub distance: u32,
    pub tag: Option<String>,
    pub nhg: Option<u64>,
    // Next-hop address to relative weight.
    pub nexthops: BTreeMap<Ipv4Addr, u64>,
    pub flags: RouteFlags,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct RouteFlags: u8 {
        const ACTIVE = 0x01;
        const REMOVED = 0x02;
    }
}

// Forwarding (AFT) entry derived from the active route of a prefix.
#[derive(Clone, Debug, Eq, PartialEq, new)]
pub struct FibEntry {
    pub protocol: Protocol,
    pub distance: u32,
    pub nhg: Option<u64>,
    pub nexthops: Vec<FibNexthop>,
}

#[derive(Clone, Debug, Eq, PartialEq, new)]
pub struct FibNexthop {
    pub addr: Ipv4Addr,
    pub port: String,
    pub weight: u64,
}

// ===== impl Rib =====

impl Rib {
    pub(crate) fn new(update_queue_tx: UnboundedSender<()>) -> Rib {
        Rib {
            ipv4: Default::default(),
            fib: Default::default(),
            update_queue: Default::default(),
            update_queue_tx,
        }
    }

    // Adds route to the RIB.
    //
    // Returns false when an identical route is already present.
    pub(crate) fn route_add(
        &mut self,
        prefix: Ipv4Network,
        route: Route,
    ) -> bool {
        let rib_prefix = self.ipv4.entry(prefix).or_default();
        match rib_prefix.entry((route.distance, route.protocol)) {
            btree_map::Entry::Vacant(v) => {
                // If the route does not exist, create a new entry.
                v.insert(route);
            }
            btree_map::Entry::Occupied(o) => {
                let old = o.into_mut();
                if !old.flags.contains(RouteFlags::REMOVED)
                    && old.tag == route.tag
                    && old.nhg == route.nhg
                    && old.nexthops == route.nexthops
                {
                    return false;
                }

                // Update the existing route with the new information.
                old.tag = route.tag;
                old.nhg = route.nhg;
                old.nexthops = route.nexthops;
                old.flags.remove(RouteFlags::REMOVED);
            }
        }

        // Add route to the update queue.
        self.update_queue_add(prefix);
        true
    }

    // Removes route from the RIB.
    pub(crate) fn route_del(
        &mut self,
        prefix: Ipv4Network,
        protocol: Protocol,
    ) {
        let Some(rib_prefix) = self.ipv4.get_mut(&prefix) else {
            return;
        };

        // Find route entry from the same installing channel.
        if let Some(route) = rib_prefix
            .values_mut()
            .find(|route| route.protocol == protocol)
        {
            // Mark route as removed.
            route.flags.insert(RouteFlags::REMOVED);

            // Add route to the update queue.
            self.update_queue_add(prefix);
        }
    }

    // Schedules all prefixes for re-evaluation.
    pub(crate) fn update_queue_add_all(&mut self) {
        self.update_queue
            .extend(self.ipv4.iter().map(|(prefix, _)| *prefix));
        let _ = self.update_queue_tx.send(());
    }

    // Processes routes present in the update queue.
    pub(crate) fn process_update_queue(
        &mut self,
        instance: &str,
        interfaces: &Interfaces,
    ) {
        while let Some(prefix) = self.update_queue.pop_first() {
            let Some(rib_prefix) = self.ipv4.get_mut(&prefix) else {
                self.fib_uninstall(instance, prefix);
                continue;
            };

            // Remove routes marked with the REMOVED flag.
            rib_prefix
                .retain(|_, route| !route.flags.contains(RouteFlags::REMOVED));

            // Select the preferred route with at least one resolvable
            // nexthop.
            let mut best = None;
            for route in rib_prefix.values_mut() {
                if best.is_none() {
                    let nexthops = resolve_nexthops(route, interfaces);
                    if !nexthops.is_empty() {
                        route.flags.insert(RouteFlags::ACTIVE);
                        best = Some(FibEntry::new(
                            route.protocol,
                            route.distance,
                            route.nhg,
                            nexthops,
                        ));
                        continue;
                    }
                }
                route.flags.remove(RouteFlags::ACTIVE);
            }

            // Remove prefix entry from the RIB if there are no routes left.
            if rib_prefix.is_empty() {
                self.ipv4.remove(&prefix);
            }

            match best {
                Some(entry) => self.fib_install(instance, prefix, entry),
                None => self.fib_uninstall(instance, prefix),
            }
        }
    }

    // Returns the route installed by the given channel.
    pub(crate) fn route(
        &self,
        prefix: &Ipv4Network,
        protocol: Protocol,
    ) -> Option<&Route> {
        self.ipv4
            .get(prefix)?
            .values()
            .find(|route| route.protocol == protocol)
    }

    // Returns the forwarding entry matching the given address.
    pub(crate) fn lookup(
        &self,
        addr: Ipv4Addr,
    ) -> Option<(&Ipv4Network, &FibEntry)> {
        self.fib.get_lpm(&addr.to_host_prefix())
    }

    fn fib_install(
        &mut self,
        instance: &str,
        prefix: Ipv4Network,
        entry: FibEntry,
    ) {
        if self.fib.get(&prefix) == Some(&entry) {
            return;
        }
        debug!(
            %instance,
            %prefix,
            protocol = %entry.protocol,
            "route installed in the FIB"
        );
        self.fib.insert(prefix, entry);
    }

    // Adds IP route to the update queue.
    fn update_queue_add(&mut self, prefix: Ipv4Network) {
        self.update_queue.insert(prefix);
        let _ = self.update_queue_tx.send(());
    }

    fn fib_uninstall(&mut self, instance: &str, prefix: Ipv4Network) {
        if self.fib.remove(&prefix).is_some() {
            debug!(%instance, %prefix, "route removed from the FIB");
        }
    }
}

// ===== impl FibEntry =====

impl FibEntry {
    // Selects the nexthop used to forward traffic towards the given address,
    // honoring the relative nexthop weights.
    pub(crate) fn select(&self, addr: Ipv4Addr) -> Option<&FibNexthop> {
        let total: u64 = self.nexthops.iter().map(|nh| nh.weight).sum();
        if total == 0 {
            return self.nexthops.first();
        }

        let mut point = flow_hash(addr) % total;
        for nh in &self.nexthops {
            if point < nh.weight {
                return Some(nh);
            }
            point -= nh.weight;
        }
        self.nexthops.last()
    }
}

// ===== helper functions =====

fn resolve_nexthops(route: &Route, interfaces: &Interfaces) -> Vec<FibNexthop> {
    route
        .nexthops
        .iter()
        .filter_map(|(addr, weight)| {
            let iface = interfaces.connected(*addr)?;
            Some(FibNexthop::new(*addr, iface.port.clone(), *weight))
        })
        .collect()
}

fn flow_hash(addr: Ipv4Addr) -> u64 {
    let mut h = u32::from(addr);
    h ^= h >> 16;
    h = h.wrapping_mul(0x7feb_352d);
    h ^= h >> 15;
    h as u64
}
