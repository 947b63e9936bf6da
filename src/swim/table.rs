//! The crate `table` implements the authoritative local view of all known
//! members.  Every mutation funnels through [`MemberTable::upsert`], so the
//! incarnation/status ordering rule is enforced in one place.

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

use chrono::prelude::*;
use log::trace;

use crate::types::{GossipEntry, Incarnation, MemberId, MemberStatus};

/// One row of the membership table.  The period stamps drive the suspicion
/// timeout and the faulty tombstone purge, both counted in whole protocol
/// periods of the local member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipEntry {
    pub id: MemberId,
    pub incarnation: Incarnation,
    pub status: MemberStatus,

    /// Local wall-clock nanos of the last accepted update.
    pub updated_at: i64,

    /// The local period at which this entry entered `Suspected`.
    pub suspected_at_period: Option<u64>,

    /// The local period at which this entry entered `Faulty`.
    pub faulty_at_period: Option<u64>,
}

impl MembershipEntry {
    pub fn snapshot(&self) -> GossipEntry {
        GossipEntry {
            member: self.id,
            incarnation: self.incarnation,
            status: self.status,
        }
    }
}

/// The outcome of applying one update to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The member was previously unknown, a fresh entry was created.
    Inserted,
    /// The update superseded the recorded status or incarnation.
    Updated,
    /// The update was stale or an idempotent duplicate, nothing changed.
    Unchanged,
}

#[inline(always)]
fn status_rank(status: MemberStatus) -> u8 {
    match status {
        MemberStatus::Alive => 0,
        MemberStatus::Suspected => 1,
        MemberStatus::Faulty => 2,
    }
}

/// The ordering rule deciding whether `incoming` may overwrite `current`.
///
/// `Faulty` is terminal and absorbing: a confirm overrides any outstanding
/// alive or suspect claim regardless of incarnation, and nothing overrides
/// a recorded confirm.  Below `Faulty`, the higher incarnation wins; at
/// equal incarnation `Suspected` outranks `Alive`, except that an alive
/// claim carried by the subject member itself (`self_claim`) clears the
/// suspicion.  Equal incarnation and equal status is a no-op.
///
/// Without the `self_claim` carve-out the rule is a lexicographic max over
/// `(is-faulty, incarnation, status rank)`, so applying two conflicting
/// updates in either order converges to the same entry.
pub(crate) fn supersedes(
    current: (Incarnation, MemberStatus),
    incoming: (Incarnation, MemberStatus),
    self_claim: bool,
) -> bool {
    let (cur_incarnation, cur_status) = current;
    let (incarnation, status) = incoming;
    if cur_status == MemberStatus::Faulty {
        return false;
    }
    if status == MemberStatus::Faulty {
        return true;
    }
    if incarnation != cur_incarnation {
        return incarnation > cur_incarnation;
    }
    if self_claim && status == MemberStatus::Alive && cur_status == MemberStatus::Suspected {
        return true;
    }
    status_rank(status) > status_rank(cur_status)
}

/// The authoritative local membership view.  Exactly one entry exists per
/// known member id; faulty entries are kept as tombstones until the
/// detector purges them, but are excluded from the active view.
#[derive(Debug)]
pub struct MemberTable {
    local_id: MemberId,
    entries: HashMap<MemberId, MembershipEntry>,
}

impl MemberTable {
    pub fn new(local_id: MemberId) -> MemberTable {
        MemberTable {
            local_id,
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, id: MemberId) -> Option<&MembershipEntry> {
        self.entries.get(&id)
    }

    /// Apply one status claim to the table, gated by the ordering rule.
    ///
    /// `self_claim` marks an alive declaration carried directly by the
    /// subject member itself, `period` is the local protocol period used to
    /// stamp suspicion and faulty transitions.
    ///
    /// The recorded incarnation is monotone: a faulty confirm overrides the
    /// status at any incarnation but keeps the higher of the two values,
    /// and a claim bounced off a tombstone still raises the recorded
    /// incarnation.  Both orders of two conflicting updates thus converge
    /// to the same entry.
    pub fn upsert(
        &mut self,
        update: GossipEntry,
        self_claim: bool,
        period: u64,
    ) -> UpsertOutcome {
        let now = Local::now().timestamp_nanos();
        match self.entries.get_mut(&update.member) {
            None => {
                let entry = MembershipEntry {
                    id: update.member,
                    incarnation: update.incarnation,
                    status: update.status,
                    updated_at: now,
                    suspected_at_period: match update.status {
                        MemberStatus::Suspected => Some(period),
                        _ => None,
                    },
                    faulty_at_period: match update.status {
                        MemberStatus::Faulty => Some(period),
                        _ => None,
                    },
                };
                self.entries.insert(update.member, entry);
                UpsertOutcome::Inserted
            }
            Some(entry) => {
                let current = (entry.incarnation, entry.status);
                if !supersedes(current, (update.incarnation, update.status), self_claim) {
                    if update.incarnation > entry.incarnation {
                        // Only a tombstone rejects a higher incarnation;
                        // record it so the incarnation never runs backwards
                        // if the confirm and the refutation race.
                        entry.incarnation = update.incarnation;
                    }
                    trace!(
                        "node {} drop stale update about member {}: known ({}, {}), got ({}, {})",
                        self.local_id,
                        update.member,
                        entry.incarnation,
                        entry.status,
                        update.incarnation,
                        update.status
                    );
                    return UpsertOutcome::Unchanged;
                }

                if update.status == MemberStatus::Suspected
                    && entry.status != MemberStatus::Suspected
                {
                    entry.suspected_at_period = Some(period);
                } else if update.status != MemberStatus::Suspected {
                    entry.suspected_at_period = None;
                }
                if update.status == MemberStatus::Faulty {
                    entry.faulty_at_period = Some(period);
                }
                entry.incarnation = entry.incarnation.max(update.incarnation);
                entry.status = update.status;
                entry.updated_at = now;
                UpsertOutcome::Updated
            }
        }
    }

    pub fn remove(&mut self, id: MemberId) -> Option<MembershipEntry> {
        self.entries.remove(&id)
    }

    /// The active membership view: every non-faulty entry, the local
    /// member included.
    pub fn list(&self) -> Vec<&MembershipEntry> {
        self.entries
            .values()
            .filter(|e| e.status != MemberStatus::Faulty)
            .collect()
    }

    /// Iterate all entries, faulty tombstones included.
    pub fn iter(&self) -> impl Iterator<Item = &MembershipEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(member: MemberId, incarnation: Incarnation, status: MemberStatus) -> GossipEntry {
        GossipEntry {
            member,
            incarnation,
            status,
        }
    }

    fn final_state(table: &MemberTable, id: MemberId) -> (Incarnation, MemberStatus) {
        let entry = table.get(id).unwrap();
        (entry.incarnation, entry.status)
    }

    #[test]
    fn upsert_inserts_unknown_member() {
        let mut table = MemberTable::new(1);
        let outcome = table.upsert(update(2, 0, MemberStatus::Alive), false, 0);
        assert_eq!(outcome, UpsertOutcome::Inserted);
        assert_eq!(final_state(&table, 2), (0, MemberStatus::Alive));
        assert_eq!(table.list().len(), 1);
    }

    #[test]
    fn incarnation_never_decreases() {
        let mut table = MemberTable::new(1);
        table.upsert(update(2, 5, MemberStatus::Alive), false, 0);

        for incarnation in 0..5 {
            for status in [MemberStatus::Alive, MemberStatus::Suspected].iter() {
                let outcome = table.upsert(update(2, incarnation, *status), false, 0);
                assert_eq!(outcome, UpsertOutcome::Unchanged);
                assert_eq!(table.get(2).unwrap().incarnation, 5);
            }
        }

        let outcome = table.upsert(update(2, 6, MemberStatus::Alive), false, 0);
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(table.get(2).unwrap().incarnation, 6);

        // A faulty confirm carrying an old incarnation overrides the
        // status but must not roll the recorded incarnation back.
        let outcome = table.upsert(update(2, 0, MemberStatus::Faulty), false, 0);
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(final_state(&table, 2), (6, MemberStatus::Faulty));

        // Nor can a claim bounced off the tombstone lower it; a higher
        // incarnation is still recorded.
        let outcome = table.upsert(update(2, 9, MemberStatus::Alive), true, 0);
        assert_eq!(outcome, UpsertOutcome::Unchanged);
        assert_eq!(final_state(&table, 2), (9, MemberStatus::Faulty));
    }

    #[test]
    fn suspect_outranks_alive_at_equal_incarnation() {
        let mut table = MemberTable::new(1);
        table.upsert(update(2, 3, MemberStatus::Alive), false, 0);

        let outcome = table.upsert(update(2, 3, MemberStatus::Suspected), false, 0);
        assert_eq!(outcome, UpsertOutcome::Updated);

        // A third party alive claim at the same incarnation must not clear
        // the suspicion.
        let outcome = table.upsert(update(2, 3, MemberStatus::Alive), false, 0);
        assert_eq!(outcome, UpsertOutcome::Unchanged);
        assert_eq!(final_state(&table, 2), (3, MemberStatus::Suspected));
    }

    #[test]
    fn self_claim_clears_suspicion_at_equal_incarnation() {
        let mut table = MemberTable::new(1);
        table.upsert(update(2, 3, MemberStatus::Suspected), false, 0);

        let outcome = table.upsert(update(2, 3, MemberStatus::Alive), true, 0);
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(final_state(&table, 2), (3, MemberStatus::Alive));
    }

    #[test]
    fn higher_incarnation_alive_clears_suspicion() {
        let mut table = MemberTable::new(1);
        table.upsert(update(2, 3, MemberStatus::Suspected), false, 7);
        assert_eq!(table.get(2).unwrap().suspected_at_period, Some(7));

        let outcome = table.upsert(update(2, 4, MemberStatus::Alive), false, 8);
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(final_state(&table, 2), (4, MemberStatus::Alive));
        assert_eq!(table.get(2).unwrap().suspected_at_period, None);
    }

    #[test]
    fn faulty_is_terminal() {
        let mut table = MemberTable::new(1);
        table.upsert(update(2, 0, MemberStatus::Faulty), false, 0);

        for incarnation in 0..10 {
            let outcome = table.upsert(update(2, incarnation, MemberStatus::Alive), true, 0);
            assert_eq!(outcome, UpsertOutcome::Unchanged);
        }
        assert_eq!(table.get(2).unwrap().status, MemberStatus::Faulty);
        assert!(table.list().is_empty());
    }

    #[test]
    fn faulty_overrides_any_incarnation() {
        let mut table = MemberTable::new(1);
        table.upsert(update(2, 9, MemberStatus::Alive), false, 0);

        let outcome = table.upsert(update(2, 0, MemberStatus::Faulty), false, 3);
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(final_state(&table, 2), (9, MemberStatus::Faulty));
        assert_eq!(table.get(2).unwrap().faulty_at_period, Some(3));
    }

    #[test]
    fn equal_updates_are_idempotent() {
        let mut table = MemberTable::new(1);
        table.upsert(update(2, 2, MemberStatus::Suspected), false, 0);
        let outcome = table.upsert(update(2, 2, MemberStatus::Suspected), false, 5);
        assert_eq!(outcome, UpsertOutcome::Unchanged);
        // The suspicion clock must not restart on duplicates.
        assert_eq!(table.get(2).unwrap().suspected_at_period, Some(0));
    }

    #[test]
    fn precedence_is_commutative() {
        let statuses = [
            MemberStatus::Alive,
            MemberStatus::Suspected,
            MemberStatus::Faulty,
        ];
        let mut updates = Vec::new();
        for incarnation in 0..3 {
            for status in statuses.iter() {
                updates.push(update(7, incarnation, *status));
            }
        }

        for a in &updates {
            for b in &updates {
                let mut forward = MemberTable::new(1);
                forward.upsert(*a, false, 0);
                forward.upsert(*b, false, 0);

                let mut backward = MemberTable::new(1);
                backward.upsert(*b, false, 0);
                backward.upsert(*a, false, 0);

                assert_eq!(
                    final_state(&forward, 7),
                    final_state(&backward, 7),
                    "order dependence applying {:?} and {:?}",
                    a,
                    b
                );
            }
        }
    }
}
