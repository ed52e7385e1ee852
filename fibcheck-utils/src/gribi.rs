//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Routing-control (gRIBI) data model.
//!
//! Entries are programmed as a strictly ordered triple: next-hops first, then
//! the next-hop-groups referencing them, and finally the IPv4 entries
//! resolving through those groups.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use derive_new::new;
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};

// Acknowledgment mode of a routing-control session.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AckMode {
    // Acknowledged once the entry is accepted into the RIB.
    #[default]
    RibAck,
    // Acknowledged once the entry is installed in the forwarding table.
    RibAndFibAck,
}

// Election identifier. The client holding the highest one is the primary.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct ElectionId {
    pub high: u64,
    pub low: u64,
}

// Parameters negotiated when a session is opened.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct SessionParams {
    // Keep installed entries when the session is closed.
    pub persistence: bool,
    pub ack_mode: AckMode,
    pub election_id: ElectionId,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct NextHopEntry {
    pub index: u64,
    pub ip_address: Ipv4Addr,
    pub instance: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct NextHopGroupEntry {
    pub id: u64,
    // Next-hop index to relative weight.
    pub next_hops: BTreeMap<u64, u64>,
    pub instance: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct Ipv4Entry {
    pub prefix: Ipv4Network,
    pub next_hop_group: u64,
    pub instance: String,
    // Network instance holding the next-hop-group, when it's not the same as
    // the entry's.
    pub nhg_instance: Option<String>,
    pub tag: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum AftEntry {
    NextHop(NextHopEntry),
    NextHopGroup(NextHopGroupEntry),
    Ipv4(Ipv4Entry),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum OperationKind {
    Add,
    Replace,
    Delete,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct AftOperation {
    pub id: u64,
    pub op: OperationKind,
    pub entry: AftEntry,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct OperationResult {
    pub id: u64,
    pub status: ProgrammingStatus,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum ProgrammingStatus {
    RibProgrammed,
    FibProgrammed,
    Failed(FailureReason),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum FailureReason {
    // The session doesn't hold the highest election ID.
    NotPrimary,
    // The target network instance doesn't exist.
    UnknownInstance,
    // A referenced next-hop or next-hop-group isn't programmed.
    MissingReference,
    // The entry is still referenced by another entry.
    InUse,
    // The entry is malformed or doesn't exist.
    InvalidEntry,
}

// ===== impl AftEntry =====

impl AftEntry {
    // Returns the network instance the entry is programmed in.
    pub fn instance(&self) -> &str {
        match self {
            AftEntry::NextHop(nh) => &nh.instance,
            AftEntry::NextHopGroup(nhg) => &nhg.instance,
            AftEntry::Ipv4(entry) => &entry.instance,
        }
    }

    // Returns a short description of the entry kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AftEntry::NextHop(..) => "next-hop",
            AftEntry::NextHopGroup(..) => "next-hop-group",
            AftEntry::Ipv4(..) => "ipv4-entry",
        }
    }

    // Returns the key identifying the entry within its table.
    pub fn key(&self) -> String {
        match self {
            AftEntry::NextHop(nh) => nh.index.to_string(),
            AftEntry::NextHopGroup(nhg) => nhg.id.to_string(),
            AftEntry::Ipv4(entry) => entry.prefix.to_string(),
        }
    }
}

impl std::fmt::Display for AftEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]@{}", self.kind(), self.key(), self.instance())
    }
}

// ===== impl ProgrammingStatus =====

impl ProgrammingStatus {
    // Returns whether the status completes a call made with the given
    // acknowledgment mode.
    pub fn satisfies(&self, ack_mode: AckMode) -> bool {
        match (self, ack_mode) {
            (ProgrammingStatus::Failed(..), _) => false,
            (_, AckMode::RibAck) => true,
            (ProgrammingStatus::FibProgrammed, AckMode::RibAndFibAck) => true,
            (ProgrammingStatus::RibProgrammed, AckMode::RibAndFibAck) => {
                false
            }
        }
    }
}

impl std::fmt::Display for ProgrammingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgrammingStatus::RibProgrammed => write!(f, "RIB_PROGRAMMED"),
            ProgrammingStatus::FibProgrammed => write!(f, "FIB_PROGRAMMED"),
            ProgrammingStatus::Failed(reason) => {
                write!(f, "FAILED ({reason})")
            }
        }
    }
}

// ===== impl FailureReason =====

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::NotPrimary => write!(f, "not primary"),
            FailureReason::UnknownInstance => {
                write!(f, "unknown network instance")
            }
            FailureReason::MissingReference => {
                write!(f, "referenced entry not programmed")
            }
            FailureReason::InUse => write!(f, "entry still referenced"),
            FailureReason::InvalidEntry => write!(f, "invalid entry"),
        }
    }
}
