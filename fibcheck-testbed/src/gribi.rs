//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};

use derive_new::new;
use fibcheck_utils::Responder;
use fibcheck_utils::gribi::{
    AckMode, AftEntry, AftOperation, FailureReason, Ipv4Entry, NextHopEntry,
    NextHopGroupEntry, OperationKind, OperationResult, ProgrammingStatus,
    SessionParams,
};
use fibcheck_utils::ip::{Ipv4AddrExt, Ipv4NetworkExt};
use fibcheck_utils::protocol::Protocol;
use ipnetwork::Ipv4Network;
use tracing::debug;

use crate::device::Master;
use crate::error::Error;
use crate::rib::{Route, RouteFlags};

pub type ClientId = u64;

// Emulated gRIBI server.
#[derive(Debug, Default)]
pub struct GribiServer {
    next_client_id: ClientId,
    // Open sessions.
    pub clients: BTreeMap<ClientId, SessionParams>,
    // Programmed entries, per network instance.
    pub tables: BTreeMap<String, GribiTables>,
    // Replies waiting for the forwarding table to be programmed.
    pub pending_acks: Vec<PendingAck>,
}

#[derive(Debug, Default)]
pub struct GribiTables {
    pub next_hops: BTreeMap<u64, NextHopEntry>,
    pub next_hop_groups: BTreeMap<u64, NextHopGroupEntry>,
    pub ipv4: BTreeMap<Ipv4Network, Ipv4Entry>,
}

#[derive(Debug, new)]
pub struct PendingAck {
    pub client_id: ClientId,
    pub results: Vec<(OperationResult, Option<FibTarget>)>,
    pub responder: Responder<Result<Vec<OperationResult>, Error>>,
}

// Forwarding-table entry that must be selected for an operation to be
// reported as FIB programmed.
#[derive(Debug, new)]
pub struct FibTarget {
    pub instance: String,
    pub prefix: Ipv4Network,
}

// ===== impl GribiServer =====

impl GribiServer {
    pub(crate) fn open(&mut self, params: SessionParams) -> ClientId {
        self.next_client_id += 1;
        let client_id = self.next_client_id;
        self.clients.insert(client_id, params);

        debug!(
            %client_id,
            persistence = %params.persistence,
            ack_mode = ?params.ack_mode,
            election_id = ?params.election_id,
            "gRIBI session opened"
        );

        client_id
    }

    // Returns the session holding the highest election ID. Ties are won by
    // the oldest session.
    pub(crate) fn primary(&self) -> Option<ClientId> {
        self.clients
            .iter()
            .max_by(|(a_id, a), (b_id, b)| {
                a.election_id.cmp(&b.election_id).then(b_id.cmp(a_id))
            })
            .map(|(client_id, _)| *client_id)
    }

    pub(crate) fn is_primary(&self, client_id: ClientId) -> bool {
        self.primary() == Some(client_id)
    }

    // Returns the IPv4 entries resolving through the given next-hop-group.
    fn nhg_users(
        &self,
        nhg_instance: &str,
        nhg_id: u64,
    ) -> impl Iterator<Item = &Ipv4Entry> + '_ {
        let nhg_instance = nhg_instance.to_owned();
        self.tables
            .values()
            .flat_map(|tables| tables.ipv4.values())
            .filter(move |entry| {
                entry.next_hop_group == nhg_id
                    && effective_nhg_instance(entry) == nhg_instance
            })
    }
}

// ===== global functions =====

pub(crate) fn process_modify(
    master: &mut Master,
    client_id: ClientId,
    ops: Vec<AftOperation>,
    responder: Responder<Result<Vec<OperationResult>, Error>>,
) {
    let Some(params) = master.gribi.clients.get(&client_id).copied() else {
        let error = Error::UnknownSession(client_id);
        error.log();
        let _ = responder.send(Err(error));
        return;
    };
    let primary = master.gribi.is_primary(client_id);

    let mut results = vec![];
    for op in ops {
        let result = if primary {
            process_operation(master, &op)
        } else {
            Err(FailureReason::NotPrimary)
        };
        let (status, target) = match result {
            Ok(target) => (ProgrammingStatus::RibProgrammed, target),
            Err(reason) => {
                debug!(
                    %client_id,
                    id = %op.id,
                    entry = %op.entry,
                    %reason,
                    "gRIBI operation failed"
                );
                (ProgrammingStatus::Failed(reason), None)
            }
        };
        results.push((OperationResult::new(op.id, status), target));
    }

    match params.ack_mode {
        AckMode::RibAck => {
            let results = results.into_iter().map(|(result, _)| result);
            let _ = responder.send(Ok(results.collect()));
        }
        AckMode::RibAndFibAck => {
            // Reply once the update queue has been processed.
            let ack = PendingAck::new(client_id, results, responder);
            master.gribi.pending_acks.push(ack);
            let _ = master.update_queue_tx.send(());
        }
    }
}

pub(crate) fn process_flush(
    master: &mut Master,
    client_id: ClientId,
    instance: &str,
) -> Result<(), Error> {
    if !master.gribi.clients.contains_key(&client_id) {
        return Err(Error::UnknownSession(client_id));
    }
    if !master.gribi.is_primary(client_id) {
        return Err(Error::GribiRejected(client_id, FailureReason::NotPrimary));
    }
    if !master.instances.contains_key(instance) {
        return Err(Error::UnknownInstance(instance.to_owned()));
    }

    instance_flush(master, instance);
    Ok(())
}

pub(crate) fn process_close(
    master: &mut Master,
    client_id: ClientId,
) -> Result<(), Error> {
    let primary = master.gribi.is_primary(client_id);
    let params = master
        .gribi
        .clients
        .remove(&client_id)
        .ok_or(Error::UnknownSession(client_id))?;
    debug!(%client_id, "gRIBI session closed");

    // Without persistence, the entries installed through the primary session
    // don't outlive it.
    if primary && !params.persistence {
        let instances =
            master.gribi.tables.keys().cloned().collect::<Vec<_>>();
        for instance in instances {
            instance_flush(master, &instance);
        }
    }

    Ok(())
}

// Resolves FIB acknowledgments once the update queues were processed.
pub(crate) fn process_pending_acks(master: &mut Master) {
    for ack in std::mem::take(&mut master.gribi.pending_acks) {
        let results = ack
            .results
            .into_iter()
            .map(|(mut result, target)| {
                if result.status == ProgrammingStatus::RibProgrammed
                    && fib_installed(master, target.as_ref())
                {
                    result.status = ProgrammingStatus::FibProgrammed;
                }
                result
            })
            .collect();
        debug!(client_id = %ack.client_id, "gRIBI FIB acknowledgment sent");
        let _ = ack.responder.send(Ok(results));
    }
}

// Removes all entries programmed in the given network instance.
pub(crate) fn instance_flush(master: &mut Master, name: &str) {
    let Some(tables) = master.gribi.tables.remove(name) else {
        return;
    };
    if let Some(instance) = master.instances.get_mut(name) {
        for prefix in tables.ipv4.keys() {
            instance.rib.route_del(*prefix, Protocol::GRIBI);
        }
    }
    debug!(instance = %name, "gRIBI entries flushed");
}

// ===== helper functions =====

fn process_operation(
    master: &mut Master,
    op: &AftOperation,
) -> Result<Option<FibTarget>, FailureReason> {
    if !master.instances.contains_key(op.entry.instance()) {
        return Err(FailureReason::UnknownInstance);
    }

    match (op.op, &op.entry) {
        (
            OperationKind::Add | OperationKind::Replace,
            AftEntry::NextHop(nh),
        ) => next_hop_add(master, nh),
        (
            OperationKind::Add | OperationKind::Replace,
            AftEntry::NextHopGroup(nhg),
        ) => next_hop_group_add(master, nhg),
        (
            OperationKind::Add | OperationKind::Replace,
            AftEntry::Ipv4(entry),
        ) => ipv4_entry_add(master, entry),
        (OperationKind::Delete, AftEntry::NextHop(nh)) => {
            next_hop_del(master, nh)
        }
        (OperationKind::Delete, AftEntry::NextHopGroup(nhg)) => {
            next_hop_group_del(master, nhg)
        }
        (OperationKind::Delete, AftEntry::Ipv4(entry)) => {
            ipv4_entry_del(master, entry)
        }
    }
}

fn next_hop_add(
    master: &mut Master,
    nh: &NextHopEntry,
) -> Result<Option<FibTarget>, FailureReason> {
    if !nh.ip_address.is_usable() {
        return Err(FailureReason::InvalidEntry);
    }

    let tables = master.gribi.tables.entry(nh.instance.clone()).or_default();
    let old = tables.next_hops.insert(nh.index, nh.clone());

    // Re-resolve the entries using the replaced next-hop.
    if old.is_some_and(|old| old != *nh) {
        let nhg_ids = tables
            .next_hop_groups
            .values()
            .filter(|nhg| nhg.next_hops.contains_key(&nh.index))
            .map(|nhg| nhg.id)
            .collect::<BTreeSet<_>>();
        ipv4_entries_refresh(master, &nh.instance, &nhg_ids);
    }

    Ok(None)
}

fn next_hop_group_add(
    master: &mut Master,
    nhg: &NextHopGroupEntry,
) -> Result<Option<FibTarget>, FailureReason> {
    if nhg.next_hops.is_empty() {
        return Err(FailureReason::InvalidEntry);
    }

    let tables = master.gribi.tables.entry(nhg.instance.clone()).or_default();
    if nhg
        .next_hops
        .keys()
        .any(|index| !tables.next_hops.contains_key(index))
    {
        return Err(FailureReason::MissingReference);
    }
    let old = tables.next_hop_groups.insert(nhg.id, nhg.clone());

    // Re-resolve the entries using the replaced next-hop-group.
    if old.is_some_and(|old| old != *nhg) {
        let nhg_ids = BTreeSet::from([nhg.id]);
        ipv4_entries_refresh(master, &nhg.instance, &nhg_ids);
    }

    Ok(None)
}

fn ipv4_entry_add(
    master: &mut Master,
    entry: &Ipv4Entry,
) -> Result<Option<FibTarget>, FailureReason> {
    if entry.prefix != entry.prefix.apply_mask() {
        return Err(FailureReason::InvalidEntry);
    }
    if !master.instances.contains_key(effective_nhg_instance(entry)) {
        return Err(FailureReason::UnknownInstance);
    }
    let route =
        entry_route(master, entry).ok_or(FailureReason::MissingReference)?;

    master
        .gribi
        .tables
        .entry(entry.instance.clone())
        .or_default()
        .ipv4
        .insert(entry.prefix, entry.clone());
    if let Some(instance) = master.instances.get_mut(&entry.instance) {
        instance.rib.route_add(entry.prefix, route);
    }

    Ok(Some(FibTarget::new(entry.instance.clone(), entry.prefix)))
}

fn next_hop_del(
    master: &mut Master,
    nh: &NextHopEntry,
) -> Result<Option<FibTarget>, FailureReason> {
    let tables = master
        .gribi
        .tables
        .get_mut(&nh.instance)
        .filter(|tables| tables.next_hops.contains_key(&nh.index))
        .ok_or(FailureReason::InvalidEntry)?;
    if tables
        .next_hop_groups
        .values()
        .any(|nhg| nhg.next_hops.contains_key(&nh.index))
    {
        return Err(FailureReason::InUse);
    }
    tables.next_hops.remove(&nh.index);

    Ok(None)
}

fn next_hop_group_del(
    master: &mut Master,
    nhg: &NextHopGroupEntry,
) -> Result<Option<FibTarget>, FailureReason> {
    if master.gribi.nhg_users(&nhg.instance, nhg.id).next().is_some() {
        return Err(FailureReason::InUse);
    }
    master
        .gribi
        .tables
        .get_mut(&nhg.instance)
        .and_then(|tables| tables.next_hop_groups.remove(&nhg.id))
        .ok_or(FailureReason::InvalidEntry)?;

    Ok(None)
}

fn ipv4_entry_del(
    master: &mut Master,
    entry: &Ipv4Entry,
) -> Result<Option<FibTarget>, FailureReason> {
    master
        .gribi
        .tables
        .get_mut(&entry.instance)
        .and_then(|tables| tables.ipv4.remove(&entry.prefix))
        .ok_or(FailureReason::InvalidEntry)?;
    if let Some(instance) = master.instances.get_mut(&entry.instance) {
        instance.rib.route_del(entry.prefix, Protocol::GRIBI);
    }

    Ok(None)
}

// Re-resolves the IPv4 entries using any of the given next-hop-groups.
fn ipv4_entries_refresh(
    master: &mut Master,
    nhg_instance: &str,
    nhg_ids: &BTreeSet<u64>,
) {
    let entries = nhg_ids
        .iter()
        .flat_map(|nhg_id| master.gribi.nhg_users(nhg_instance, *nhg_id))
        .cloned()
        .collect::<Vec<_>>();
    for entry in entries {
        let Some(route) = entry_route(master, &entry) else {
            continue;
        };
        if let Some(instance) = master.instances.get_mut(&entry.instance) {
            instance.rib.route_add(entry.prefix, route);
        }
    }
}

// Builds the RIB route corresponding to an IPv4 entry, provided its
// next-hop-group and next-hops are programmed.
fn entry_route(master: &Master, entry: &Ipv4Entry) -> Option<Route> {
    let tables = master.gribi.tables.get(effective_nhg_instance(entry))?;
    let nhg = tables.next_hop_groups.get(&entry.next_hop_group)?;

    let mut nexthops = BTreeMap::new();
    for (index, weight) in &nhg.next_hops {
        let nh = tables.next_hops.get(index)?;
        *nexthops.entry(nh.ip_address).or_insert(0) += *weight;
    }

    Some(Route::new(
        Protocol::GRIBI,
        master.config.gribi_distance,
        entry.tag.clone(),
        Some(nhg.id),
        nexthops,
        RouteFlags::empty(),
    ))
}

fn fib_installed(master: &Master, target: Option<&FibTarget>) -> bool {
    let Some(target) = target else {
        return true;
    };
    master
        .instances
        .get(&target.instance)
        .and_then(|instance| {
            instance.rib.route(&target.prefix, Protocol::GRIBI)
        })
        .is_some_and(|route| route.flags.contains(RouteFlags::ACTIVE))
}

fn effective_nhg_instance(entry: &Ipv4Entry) -> &str {
    entry.nhg_instance.as_deref().unwrap_or(&entry.instance)
}
