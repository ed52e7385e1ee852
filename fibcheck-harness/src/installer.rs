//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;
use std::time::Duration;

use fibcheck_utils::client::{ClientError, DeviceConfig, RoutingSession};
use fibcheck_utils::gribi::{
    AftEntry, AftOperation, Ipv4Entry, NextHopEntry, NextHopGroupEntry,
    OperationKind, ProgrammingStatus, SessionParams,
};
use fibcheck_utils::topology::StaticRouteCfg;
use tokio::time;
use tracing::debug;

use crate::error::Error;

// Programs routes through the gRIBI session of a verification run.
//
// Keeps track of the next-hops and next-hop-groups acknowledged by the
// device, so that entries referencing unacknowledged objects are refused
// before being submitted.
pub struct RouteInstaller {
    session: Box<dyn RoutingSession>,
    // Acknowledged next-hops, keyed by network instance and index.
    next_hops: BTreeSet<(String, u64)>,
    // Acknowledged next-hop-groups, keyed by network instance and ID.
    next_hop_groups: BTreeSet<(String, u64)>,
    next_op_id: u64,
    ack_timeout: Duration,
}

// ===== impl RouteInstaller =====

impl RouteInstaller {
    pub fn new(
        session: Box<dyn RoutingSession>,
        ack_timeout: Duration,
    ) -> RouteInstaller {
        RouteInstaller {
            session,
            next_hops: Default::default(),
            next_hop_groups: Default::default(),
            next_op_id: 1,
            ack_timeout,
        }
    }

    pub fn params(&self) -> &SessionParams {
        self.session.params()
    }

    pub async fn install_next_hop(
        &mut self,
        nh: NextHopEntry,
    ) -> Result<ProgrammingStatus, Error> {
        let key = (nh.instance.clone(), nh.index);
        let status =
            self.program(OperationKind::Add, AftEntry::NextHop(nh)).await?;
        self.next_hops.insert(key);
        Ok(status)
    }

    pub async fn install_next_hop_group(
        &mut self,
        nhg: NextHopGroupEntry,
    ) -> Result<ProgrammingStatus, Error> {
        let instance = &nhg.instance;
        if let Some(index) = nhg.next_hops.keys().find(|index| {
            !self.next_hops.contains(&(instance.clone(), **index))
        }) {
            let reference = format!("next-hop[{index}]");
            return Err(Error::UnacknowledgedReference {
                entry: AftEntry::NextHopGroup(nhg).to_string(),
                reference,
            });
        }

        let key = (nhg.instance.clone(), nhg.id);
        let status = self
            .program(OperationKind::Add, AftEntry::NextHopGroup(nhg))
            .await?;
        self.next_hop_groups.insert(key);
        Ok(status)
    }

    pub async fn install_ipv4_entry(
        &mut self,
        entry: Ipv4Entry,
    ) -> Result<ProgrammingStatus, Error> {
        let nhg_instance =
            entry.nhg_instance.as_ref().unwrap_or(&entry.instance);
        let key = (nhg_instance.clone(), entry.next_hop_group);
        if !self.next_hop_groups.contains(&key) {
            let reference =
                format!("next-hop-group[{}]", entry.next_hop_group);
            return Err(Error::UnacknowledgedReference {
                entry: AftEntry::Ipv4(entry).to_string(),
                reference,
            });
        }

        self.program(OperationKind::Add, AftEntry::Ipv4(entry)).await
    }

    pub async fn delete_ipv4_entry(
        &mut self,
        entry: Ipv4Entry,
    ) -> Result<ProgrammingStatus, Error> {
        self.program(OperationKind::Delete, AftEntry::Ipv4(entry))
            .await
    }

    pub async fn delete_next_hop_group(
        &mut self,
        nhg: NextHopGroupEntry,
    ) -> Result<ProgrammingStatus, Error> {
        let key = (nhg.instance.clone(), nhg.id);
        let status = self
            .program(OperationKind::Delete, AftEntry::NextHopGroup(nhg))
            .await?;
        self.next_hop_groups.remove(&key);
        Ok(status)
    }

    pub async fn delete_next_hop(
        &mut self,
        nh: NextHopEntry,
    ) -> Result<ProgrammingStatus, Error> {
        let key = (nh.instance.clone(), nh.index);
        let status = self
            .program(OperationKind::Delete, AftEntry::NextHop(nh))
            .await?;
        self.next_hops.remove(&key);
        Ok(status)
    }

    // Removes every entry programmed in the network instance.
    pub async fn flush(&mut self, instance: &str) -> Result<(), ClientError> {
        self.session.flush(instance).await?;
        self.next_hops.retain(|(nh_instance, _)| nh_instance != instance);
        self.next_hop_groups
            .retain(|(nhg_instance, _)| nhg_instance != instance);
        debug!(%instance, "gRIBI entries flushed");
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), ClientError> {
        self.session.close().await?;
        debug!("gRIBI session closed");
        Ok(())
    }

    // Submits a single operation and waits for its result, as governed by
    // the session acknowledgment mode.
    async fn program(
        &mut self,
        op: OperationKind,
        entry: AftEntry,
    ) -> Result<ProgrammingStatus, Error> {
        let id = self.next_op_id;
        self.next_op_id += 1;
        let name = entry.to_string();
        let ack_mode = self.session.params().ack_mode;

        debug!(
            %id, ?op, entry = %name, ?ack_mode,
            "submitting gRIBI operation"
        );
        let ops = vec![AftOperation::new(id, op, entry)];
        let results = time::timeout(self.ack_timeout, self.session.modify(ops))
            .await
            .map_err(|_| Error::ProgrammingTimeout {
                entry: name.clone(),
                timeout: self.ack_timeout,
            })?
            .map_err(|error| Error::ProgrammingRequest {
                entry: name.clone(),
                error,
            })?;
        let status = results
            .into_iter()
            .find(|result| result.id == id)
            .map(|result| result.status)
            .ok_or_else(|| Error::MissingResult {
                entry: name.clone(),
            })?;

        match status {
            ProgrammingStatus::Failed(reason) => {
                Err(Error::ProgrammingFailed {
                    entry: name,
                    reason,
                })
            }
            status if !status.satisfies(ack_mode) => {
                Err(Error::NotInstalledInFib {
                    entry: name,
                    status,
                })
            }
            status => {
                debug!(
                    %id, entry = %name, %status,
                    "gRIBI operation acknowledged"
                );
                Ok(status)
            }
        }
    }
}

impl std::fmt::Debug for RouteInstaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteInstaller")
            .field("params", self.session.params())
            .field("next_hops", &self.next_hops)
            .field("next_hop_groups", &self.next_hop_groups)
            .finish()
    }
}

// ===== global functions =====

// Replaces the static route object for the prefix.
pub async fn install_static_route<D>(
    device: &D,
    cfg: StaticRouteCfg,
) -> Result<(), Error>
where
    D: DeviceConfig + ?Sized,
{
    let prefix = cfg.prefix;
    debug!(instance = %cfg.instance, %prefix, "installing static route");
    device
        .replace_static_route(cfg)
        .await
        .map_err(|error| Error::StaticRoute { prefix, error })
}
