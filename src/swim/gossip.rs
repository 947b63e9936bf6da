//! The crate `gossip` implements the bounded dissemination buffer.
//! Membership updates ride on already-scheduled probe traffic: every
//! outgoing ping, ping-req and ack carries a capped batch of the least
//! gossipped pending updates.

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

use std::collections::HashMap;

use log::trace;

use crate::types::{GossipEntry, MemberId, MemberStatus};

/// One pending membership update and the number of times it was attached
/// to an outgoing message.
#[derive(Debug, Clone)]
pub struct GossipItem {
    pub entry: GossipEntry,
    pub gossip_count: u32,
}

/// A bounded, count-weighted buffer of pending membership updates.
///
/// The buffer holds at most one item per member: a fresher update for the
/// same member replaces the queued one and resets its count, since only
/// the latest state is worth spreading.  Items are retired once they have
/// been attached `max_transmissions` times, which bounds the dissemination
/// window of every update, faulty declarations included.
#[derive(Debug)]
pub struct GossipQueue {
    capacity: usize,
    max_transmissions: u32,

    /// Percentage of each attachment batch reserved for faulty
    /// declarations, the remainder goes to alive/suspect updates.  Either
    /// pool backfills the other when it runs short.
    faulty_share: u32,

    items: HashMap<MemberId, GossipItem>,
}

impl GossipQueue {
    pub fn new(capacity: usize, max_transmissions: u32, faulty_share: u32) -> GossipQueue {
        GossipQueue {
            capacity,
            max_transmissions,
            faulty_share,
            items: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Enqueue one update with a fresh gossip count.  On a full buffer the
    /// most gossipped item is evicted to make room; an item that was never
    /// attached is protected from eviction while any attached item exists,
    /// so brand-new updates cannot be starved under churn.  When every
    /// queued item is itself brand-new, the incoming update is the one
    /// dropped.
    pub fn push(&mut self, entry: GossipEntry) {
        if let Some(item) = self.items.get_mut(&entry.member) {
            item.entry = entry;
            item.gossip_count = 0;
            return;
        }

        if self.items.len() >= self.capacity {
            let victim = self
                .items
                .values()
                .filter(|i| i.gossip_count > 0)
                .max_by_key(|i| (i.gossip_count, i.entry.member))
                .map(|i| i.entry.member);
            match victim {
                Some(id) => {
                    trace!("dissemination buffer full, evict update about member {}", id);
                    self.items.remove(&id);
                }
                None => {
                    trace!(
                        "dissemination buffer full of fresh updates, drop update about member {}",
                        entry.member
                    );
                    return;
                }
            }
        }

        self.items.insert(
            entry.member,
            GossipItem {
                entry,
                gossip_count: 0,
            },
        );
    }

    /// Drop the pending update about one member, if any.
    pub fn remove(&mut self, member: MemberId) {
        self.items.remove(&member);
    }

    /// Choose up to `max_count` updates to attach to one outgoing message,
    /// preferring the least gossipped first so every update gets a fair
    /// chance to propagate.  The batch draws proportionally from the
    /// faulty and non-faulty pools; counts are incremented on every item
    /// actually attached, and items reaching the transmission cap are
    /// retired.
    pub fn select_for_attachment(&mut self, max_count: usize) -> Vec<GossipEntry> {
        if max_count == 0 || self.items.is_empty() {
            return Vec::new();
        }

        let mut faulty = Vec::new();
        let mut live = Vec::new();
        for item in self.items.values() {
            if item.entry.status == MemberStatus::Faulty {
                faulty.push((item.gossip_count, item.entry.member));
            } else {
                live.push((item.gossip_count, item.entry.member));
            }
        }
        faulty.sort();
        live.sort();

        let faulty_quota = max_count * self.faulty_share as usize / 100;
        let mut chosen = Vec::with_capacity(max_count);
        let mut faulty_iter = faulty.into_iter();
        let mut live_iter = live.into_iter();
        for _ in 0..faulty_quota {
            match faulty_iter.next() {
                Some((_, id)) => chosen.push(id),
                None => break,
            }
        }
        while chosen.len() < max_count {
            match live_iter.next() {
                Some((_, id)) => chosen.push(id),
                None => break,
            }
        }
        // Backfill the unused live quota from the faulty pool.
        while chosen.len() < max_count {
            match faulty_iter.next() {
                Some((_, id)) => chosen.push(id),
                None => break,
            }
        }

        let mut batch = Vec::with_capacity(chosen.len());
        for id in chosen {
            let retired = {
                let item = self.items.get_mut(&id).unwrap();
                item.gossip_count += 1;
                batch.push(item.entry);
                item.gossip_count >= self.max_transmissions
            };
            if retired {
                self.items.remove(&id);
            }
        }
        batch
    }
}
