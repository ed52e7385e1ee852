//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use derive_new::new;
use fibcheck_utils::task::IntervalTask;
use fibcheck_utils::topology::AteInterfaceCfg;
use fibcheck_utils::traffic::{FlowCounters, FlowSpec};
use ipnetwork::Ipv4Network;
use tracing::debug;

use crate::api::Request;
use crate::device::Master;
use crate::error::Error;

// Emulated traffic generator.
#[derive(Debug, Default)]
pub struct Ate {
    // Whether ARP resolution is enabled.
    pub protocols_running: bool,
    pub interfaces: BTreeMap<String, AteInterface>,
    pub flows: BTreeMap<String, Flow>,
}

#[derive(Debug, new)]
pub struct AteInterface {
    pub name: String,
    pub port: String,
    pub addr: Ipv4Network,
    pub gateway: Ipv4Addr,
}

#[derive(Debug)]
pub struct Flow {
    pub spec: FlowSpec,
    pub counters: FlowCounters,
    // Transmission task, present while the flow is running.
    pub task: Option<IntervalTask>,
}

// ===== impl Ate =====

impl Ate {
    pub(crate) fn interface_configure(&mut self, cfg: AteInterfaceCfg) {
        let iface = AteInterface::new(
            cfg.attrs.name.clone(),
            cfg.attrs.port.clone(),
            cfg.attrs.ipv4_cidr(),
            cfg.gateway,
        );
        debug!(
            name = %iface.name,
            port = %iface.port,
            addr = %iface.addr,
            gateway = %iface.gateway,
            "ATE interface updated"
        );
        self.interfaces.insert(iface.name.clone(), iface);
    }

    // Returns the ATE interface answering ARP requests for the given address
    // on the given port.
    pub(crate) fn neighbor(
        &self,
        port: &str,
        addr: Ipv4Addr,
    ) -> Option<&AteInterface> {
        if !self.protocols_running {
            return None;
        }
        self.interfaces
            .values()
            .find(|iface| iface.port == port && iface.addr.ip() == addr)
    }
}

// ===== global functions =====

pub(crate) fn flow_start(
    master: &mut Master,
    spec: FlowSpec,
) -> Result<(), Error> {
    for endpoint in std::iter::once(&spec.src_endpoint)
        .chain(spec.dst_endpoints.iter())
    {
        if !master.ate.interfaces.contains_key(endpoint) {
            return Err(Error::UnknownInterface(endpoint.clone()));
        }
    }
    if master
        .ate
        .flows
        .get(&spec.name)
        .is_some_and(|flow| flow.task.is_some())
    {
        return Err(Error::FlowAlreadyRunning(spec.name));
    }

    // Start transmission task.
    let request_tx = master.request_tx.clone();
    let name = spec.name.clone();
    let tick = Duration::from_millis(master.config.traffic_tick_ms);
    let task = IntervalTask::new(tick, move || {
        let request_tx = request_tx.clone();
        let name = name.clone();
        async move {
            let Some(request_tx) = request_tx.upgrade() else {
                return false;
            };
            request_tx.send(Request::FlowTick { name }).await.is_ok()
        }
    });

    debug!(
        flow = %spec.name,
        src = %spec.src_endpoint,
        packets = %spec.packet_count,
        rate = %spec.rate_pps,
        "flow started"
    );
    let flow = Flow {
        spec,
        counters: Default::default(),
        task: Some(task),
    };
    master.ate.flows.insert(flow.spec.name.clone(), flow);

    Ok(())
}

pub(crate) fn flow_stop(
    master: &mut Master,
    name: &str,
) -> Result<(), Error> {
    let flow = master
        .ate
        .flows
        .get_mut(name)
        .ok_or_else(|| Error::UnknownFlow(name.to_owned()))?;
    if let Some(task) = flow.task.take() {
        task.stop();
        debug!(flow = %name, tx = %flow.counters.tx_pkts, "flow stopped");
    }

    Ok(())
}

pub(crate) fn flow_counters(
    master: &Master,
    name: &str,
) -> Result<FlowCounters, Error> {
    master
        .ate
        .flows
        .get(name)
        .map(|flow| flow.counters)
        .ok_or_else(|| Error::UnknownFlow(name.to_owned()))
}

// Transmits the next batch of packets of a running flow.
pub(crate) fn process_flow_tick(master: &mut Master, name: &str) {
    let Some(flow) = master.ate.flows.get(name) else {
        return;
    };
    // Ignore ticks queued before the flow was stopped.
    if flow.task.is_none() {
        return;
    }

    let batch = (flow.spec.rate_pps * master.config.traffic_tick_ms / 1000)
        .max(1)
        .min(flow.spec.packet_count.saturating_sub(flow.counters.tx_pkts));
    let start = flow.counters.tx_pkts;
    let mut received = 0;
    for seq in start..start + batch {
        let Some(dst) = flow.spec.dst_range.nth_addr(seq) else {
            continue;
        };
        let delivered = master
            .forward(&flow.spec.src_endpoint, dst)
            .is_some_and(|egress| flow.spec.dst_endpoints.contains(&egress));
        if delivered {
            received += 1;
        }
    }

    let Some(flow) = master.ate.flows.get_mut(name) else {
        return;
    };
    flow.counters.tx_pkts += batch;
    flow.counters.rx_pkts += received;
    if flow.counters.tx_pkts >= flow.spec.packet_count {
        flow.task = None;
        debug!(
            flow = %name,
            tx = %flow.counters.tx_pkts,
            rx = %flow.counters.rx_pkts,
            "flow finished"
        );
    }
}
