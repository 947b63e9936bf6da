//! # swim
//!
//! `swim` is an implementation of the SWIM group membership and failure
//! detection protocol. It is based on the paper:
//!
//! > SWIM: Scalable Weakly-consistent Infection-style Process Group
//! Membership Protocol (DSN '02)
//!
//! Like original SWIM, `swim` separates failure detection from membership
//! update dissemination: each member probes one randomized round-robin
//! target per protocol period (escalating to indirect probes through k
//! helpers on a timeout), and piggybacks a bounded batch of membership
//! gossip on every ping, ping-req and ack.  A suspected member gets a
//! refutation window before it is confirmed faulty: by bumping its own
//! incarnation number it outranks stale suspicion about itself, which
//! bounds the false-positive rate without synchronized clocks.
//!
//! The crate is a pure state machine: the embedder owns the timer and the
//! transport, calls `tick()` at a fixed interval, feeds received messages
//! to `step()`, and drains `advance()` for outgoing messages and
//! membership-change events.  Message encoding is the embedder's choice,
//! every wire type is serde-serializable.

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

extern crate chrono;
extern crate log;
extern crate rand;
extern crate serde;
extern crate thiserror;

mod detector;
mod error;
mod gossip;
mod schedule;

pub mod constant;
pub mod table;
pub mod types;

pub use crate::detector::{Ready, Swim, SwimOption};
pub use crate::error::Error;
pub use crate::gossip::{GossipItem, GossipQueue};
pub use crate::schedule::ProbeSchedule;
pub use crate::table::{MemberTable, MembershipEntry, UpsertOutcome};
