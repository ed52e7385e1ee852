//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Route-programming and verification engine.
//!
//! A verification run programs the same prefix through two channels (a
//! static route and a gRIBI entry), waits for the device telemetry to
//! converge, and validates the forwarding decision with synthetic traffic.
//! Collaborators are only accessed through the contracts defined in
//! `fibcheck_utils::client`.

#![warn(rust_2018_idioms)]

pub mod error;
pub mod installer;
pub mod orchestrator;
pub mod report;
pub mod scenario;
pub mod traffic;
pub mod verifier;

pub use crate::error::{Error, ErrorKind};
pub use crate::orchestrator::{Collaborators, Orchestrator, RunState};
pub use crate::report::RunReport;
pub use crate::scenario::Scenario;
