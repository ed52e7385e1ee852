//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! In-process emulation of a device under test (DUT) and of the automated
//! test equipment (ATE) attached to it.
//!
//! A single task owns all emulated state and serves requests coming from the
//! [`Testbed`] handle, which implements every collaborator contract defined in
//! `fibcheck_utils::client`.

#![warn(rust_2018_idioms)]

mod api;
mod ate;
mod client;
mod device;
pub mod error;
mod gribi;
mod interface;
mod rib;
mod state;

use fibcheck_utils::Sender;
use fibcheck_utils::task::Task;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{Instrument, debug_span};

use crate::api::Request;
use crate::device::Master;

// Testbed configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    // Testbed ports shared by the DUT and the ATE.
    pub ports: Vec<String>,
    // Administrative distance of static routes.
    pub static_distance: u32,
    // Administrative distance of gRIBI routes.
    pub gribi_distance: u32,
    // Delay between a RIB update and its installation in the FIB.
    pub fib_programming_delay_ms: u64,
    // Transmission interval of the traffic engine.
    pub traffic_tick_ms: u64,
}

// Handle to a running testbed. Dropping it stops the testbed task.
#[derive(Debug)]
pub struct Testbed {
    request_tx: Sender<Request>,
    _task: Task<()>,
}

// ===== impl Config =====

impl Default for Config {
    fn default() -> Config {
        Config {
            ports: vec![
                "port1".to_owned(),
                "port2".to_owned(),
                "port3".to_owned(),
                "port4".to_owned(),
            ],
            static_distance: 1,
            gribi_distance: 5,
            fib_programming_delay_ms: 50,
            traffic_tick_ms: 10,
        }
    }
}

// ===== impl Testbed =====

impl Testbed {
    // Spawns the testbed task.
    //
    // Must be called from within a tokio runtime.
    pub fn start(config: Config) -> Testbed {
        let (request_tx, request_rx) = mpsc::channel(16);
        let (update_queue_tx, update_queue_rx) = mpsc::unbounded_channel();

        let mut master =
            Master::new(config, request_tx.downgrade(), update_queue_tx);
        let task = Task::spawn(async move {
            let span = debug_span!("testbed");
            master.run(request_rx, update_queue_rx).instrument(span).await;
        });

        Testbed {
            request_tx,
            _task: task,
        }
    }
}
