//! The crate `types` defines a set types used by swim.

// Copyright 2026 The swim Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde::{Deserialize, Serialize};

/// A stable, opaque identifier of one member.  The embedder owns the
/// mapping between ids and addresses, it never changes once assigned.
pub type MemberId = u64;

/// A per-member monotonic counter ordering competing status claims about
/// the same member.  Owned exclusively by the member it describes.
pub type Incarnation = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberStatus {
    Alive,
    Suspected,
    Faulty,
}

impl std::fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A snapshot of one member's status, piggybacked on outgoing messages.
///
/// A `Suspect` update is an entry with status `Suspected`, a refutation is
/// an entry with status `Alive` and a fresher incarnation, a `Confirm` is
/// an entry with status `Faulty`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GossipEntry {
    pub member: MemberId,
    pub incarnation: Incarnation,
    pub status: MemberStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingMsg {
    pub seq: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckMsg {
    pub seq: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingReqMsg {
    pub target: MemberId,
    pub seq: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MsgDetail {
    None,
    Ping(PingMsg),
    Ack(AckMsg),
    PingReq(PingReqMsg),
}

impl std::fmt::Display for MsgDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let msg = match &self {
            MsgDetail::Ping(_) => "Ping",
            MsgDetail::Ack(_) => "Ack",
            MsgDetail::PingReq(_) => "PingReq",
            _ => "none",
        };
        write!(f, "{}", msg)
    }
}

/// The wire message exchanged between members.  Every message carries a
/// bounded batch of gossip entries besides its detail, so dissemination
/// rides on already-scheduled probe traffic.
#[derive(Clone, Serialize, Deserialize)]
pub struct Message {
    pub from: MemberId,

    /// Who this message send to.
    pub to: MemberId,

    /// Piggybacked membership updates, length capped independent of the
    /// cluster size.
    pub gossip: Vec<GossipEntry>,

    pub detail: MsgDetail,
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let num_gossip = self.gossip.len();
        f.debug_struct("Message")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("detail", &self.detail)
            .field("num_gossip", &num_gossip)
            .finish()
    }
}

/// Membership changes surfaced to the embedding application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberEvent {
    /// A member became known, via a join message or gossip.
    Joined {
        id: MemberId,
        incarnation: Incarnation,
    },
    /// A member stopped answering probes, directly and indirectly.
    Suspected {
        id: MemberId,
        incarnation: Incarnation,
    },
    /// A suspicion was cleared by a refuting alive declaration.
    Recovered {
        id: MemberId,
        incarnation: Incarnation,
    },
    /// A suspicion stood past the timeout, the member is confirmed faulty
    /// and removed from the active view.
    Failed {
        id: MemberId,
        incarnation: Incarnation,
    },
}

impl std::fmt::Display for MemberEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            MemberEvent::Joined { id, .. } => write!(f, "Joined({})", id),
            MemberEvent::Suspected { id, .. } => write!(f, "Suspected({})", id),
            MemberEvent::Recovered { id, .. } => write!(f, "Recovered({})", id),
            MemberEvent::Failed { id, .. } => write!(f, "Failed({})", id),
        }
    }
}
