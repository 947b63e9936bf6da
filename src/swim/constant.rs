//! The crate `constant` defines a set constant used by swim.

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

/// A special value is used to mark illegal or invalid id of member.
pub const INVALID_MEMBER_ID: u64 = std::u64::MAX;

/// The incarnation of a member when it first starts up.  A member only
/// increments its own incarnation, and only in response to observing its
/// own suspicion.
pub const INITIAL_INCARNATION: u64 = 0;

/// A special value is used to mark an unassigned probe sequence number, any
/// issued sequence number will large than zero.
pub const INVALID_SEQ: u64 = 0;

/// The default number of ticks in one protocol period.
pub const DEFAULT_PROTOCOL_PERIOD_TICKS: u32 = 10;

/// The default number of ticks to wait for a direct ack before escalating
/// to indirect probing.
pub const DEFAULT_ACK_TIMEOUT_TICKS: u32 = 3;

/// The default number of helpers contacted for indirect probing.
pub const DEFAULT_INDIRECT_PROBE_COUNT: usize = 3;

/// The default number of whole protocol periods a suspicion may stand
/// before the member is confirmed faulty.
pub const DEFAULT_SUSPICION_PERIODS: u64 = 5;

/// The default cap of gossip entries attached to one outgoing message.
/// This cap is independent of the membership table size.
pub const DEFAULT_GOSSIP_LIMIT: usize = 6;

/// The default capacity of the dissemination buffer.
pub const DEFAULT_GOSSIP_CAPACITY: usize = 64;

/// The default number of times one update is attached to outgoing messages
/// before it is retired from the dissemination buffer.
pub const DEFAULT_MAX_TRANSMISSIONS: u32 = 8;

/// The default number of whole protocol periods a faulty entry is retained
/// as a tombstone before it is purged.
pub const DEFAULT_FAULTY_PURGE_PERIODS: u64 = 8;
