//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use derive_new::new;
use serde::{Deserialize, Serialize};

// Range of destination addresses a flow cycles through.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct Ipv4AddrRange {
    pub min: Ipv4Addr,
    pub max: Ipv4Addr,
    pub count: u32,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct FlowSpec {
    pub name: String,
    // Name of the ATE interface the flow is sourced from.
    pub src_endpoint: String,
    // Names of the ATE interfaces expected to receive the flow.
    pub dst_endpoints: Vec<String>,
    pub dst_range: Ipv4AddrRange,
    pub packet_count: u64,
    pub rate_pps: u64,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct FlowCounters {
    pub tx_pkts: u64,
    pub rx_pkts: u64,
}

// ===== impl Ipv4AddrRange =====

impl Ipv4AddrRange {
    // Returns the number of addresses in the range.
    pub fn len(&self) -> u32 {
        let span = u32::from(self.max).saturating_sub(u32::from(self.min));
        self.count.min(span.saturating_add(1))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Returns the n-th address of the range, wrapping around once the
    // range is exhausted.
    //
    // Addresses are spread evenly between `min` and `max`.
    pub fn nth_addr(&self, n: u64) -> Option<Ipv4Addr> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        let span = u32::from(self.max).saturating_sub(u32::from(self.min));
        let step = if len > 1 { (span / (len - 1)).max(1) } else { 0 };
        let idx = (n % len as u64) as u32;
        Some(Ipv4Addr::from(u32::from(self.min) + idx * step))
    }

    pub fn iter(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        (0..self.len() as u64).filter_map(|n| self.nth_addr(n))
    }
}

// ===== impl FlowCounters =====

impl FlowCounters {
    // Returns the percentage of transmitted packets that weren't received.
    //
    // Undefined when nothing was transmitted.
    pub fn loss_pct(&self) -> Option<f32> {
        if self.tx_pkts == 0 {
            return None;
        }
        let lost = self.tx_pkts.saturating_sub(self.rx_pkts);
        Some(lost as f32 * 100.0 / self.tx_pkts as f32)
    }
}
