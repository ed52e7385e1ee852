//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use fibcheck_utils::client::Traffic;
use fibcheck_utils::traffic::{FlowCounters, FlowSpec};
use serde::Serialize;
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use crate::error::Error;

// Validates forwarding decisions by sending synthetic traffic through the
// device.
#[derive(Debug)]
pub struct TrafficValidator<'a, T: Traffic + ?Sized> {
    traffic: &'a T,
    poll_interval: Duration,
    stable_polls: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrafficResult {
    pub flow: String,
    pub counters: FlowCounters,
    pub loss_pct: f32,
}

// ===== impl TrafficValidator =====

impl<'a, T> TrafficValidator<'a, T>
where
    T: Traffic + ?Sized,
{
    pub fn new(
        traffic: &'a T,
        poll_interval: Duration,
        stable_polls: u32,
    ) -> TrafficValidator<'a, T> {
        TrafficValidator {
            traffic,
            poll_interval,
            stable_polls,
        }
    }

    // Runs the flow until all of its packets were transmitted and the
    // received counter stopped moving, or until `duration` elapses.
    //
    // The flow is always stopped before returning. Any loss is a failure.
    pub async fn run_traffic_check(
        &self,
        flow: FlowSpec,
        duration: Duration,
    ) -> Result<TrafficResult, Error> {
        let name = flow.name.clone();
        let control_error = |error| Error::TrafficControl {
            flow: name.clone(),
            error,
        };

        debug!(
            flow = %name,
            src = %flow.src_endpoint,
            dst = ?flow.dst_endpoints,
            packets = %flow.packet_count,
            "starting flow"
        );
        let packet_count = flow.packet_count;
        self.traffic.start(flow).await.map_err(control_error)?;

        let observed = self.observe(&name, packet_count, duration).await;
        let stopped = self.traffic.stop(&name).await;
        debug!(flow = %name, "flow stopped");
        observed?;
        stopped.map_err(control_error)?;

        let counters =
            self.traffic.counters(&name).await.map_err(control_error)?;
        if counters.tx_pkts == 0 {
            return Err(Error::NoTrafficTransmitted { flow: name });
        }
        let loss_pct =
            self.traffic.loss_pct(&name).await.map_err(control_error)?;
        if loss_pct > 0.0 {
            return Err(Error::TrafficLoss {
                flow: name,
                loss_pct,
                counters,
            });
        }

        debug!(
            flow = %name,
            tx = %counters.tx_pkts,
            rx = %counters.rx_pkts,
            "no traffic loss"
        );
        Ok(TrafficResult {
            flow: name,
            counters,
            loss_pct,
        })
    }

    // Polls the flow counters until they stabilize or `duration` elapses.
    async fn observe(
        &self,
        name: &str,
        packet_count: u64,
        duration: Duration,
    ) -> Result<(), Error> {
        let deadline = Instant::now() + duration;
        let mut last_rx = None;
        let mut stable = 0;

        loop {
            let now = Instant::now();
            if now >= deadline {
                warn!(flow = %name, ?duration, "flow didn't settle in time");
                return Ok(());
            }
            time::sleep(self.poll_interval.min(deadline - now)).await;

            let counters = self.traffic.counters(name).await.map_err(
                |error| Error::TrafficControl {
                    flow: name.to_owned(),
                    error,
                },
            )?;
            if last_rx == Some(counters.rx_pkts) {
                stable += 1;
            } else {
                stable = 0;
            }
            last_rx = Some(counters.rx_pkts);

            if counters.tx_pkts >= packet_count && stable >= self.stable_polls
            {
                debug!(
                    flow = %name,
                    tx = %counters.tx_pkts,
                    rx = %counters.rx_pkts,
                    "flow counters settled"
                );
                return Ok(());
            }
        }
    }
}
