//! The crate `schedule` implements round-robin probe target selection.
//! Walking a shuffled list and reshuffling only on wrap-around bounds the
//! worst-case time until any member is probed, which random selection
//! alone cannot guarantee.

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

use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};

use crate::types::MemberId;

/// An ordered list of probe targets walked by a cursor.
///
/// A member present in the list is selected at least once within `2n - 1`
/// selections: at worst it sits right behind the cursor for the rest of
/// the current traversal (`n - 1` selections) and is drawn last after the
/// reshuffle (`n` more).  Joining members are spliced in at a uniformly
/// random position instead of reshuffling the whole list, which preserves
/// the bound for everyone already present.
#[derive(Debug)]
pub struct ProbeSchedule {
    order: Vec<MemberId>,
    cursor: usize,
}

impl ProbeSchedule {
    pub fn new() -> ProbeSchedule {
        ProbeSchedule {
            order: Vec::new(),
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: MemberId) -> bool {
        self.order.contains(&id)
    }

    /// Splice a joining member in at a uniformly random position.  A
    /// position before the cursor means the newcomer waits until the next
    /// traversal; the cursor is shifted so no current member is probed
    /// twice or skipped.
    pub fn insert(&mut self, id: MemberId) {
        if self.contains(id) {
            return;
        }
        let position = thread_rng().gen_range(0..=self.order.len());
        self.order.insert(position, id);
        if position < self.cursor {
            self.cursor += 1;
        }
    }

    pub fn remove(&mut self, id: MemberId) {
        if let Some(position) = self.order.iter().position(|m| *m == id) {
            self.order.remove(position);
            if position < self.cursor {
                self.cursor -= 1;
            }
        }
    }

    /// Return the member at the cursor and advance it; reshuffle the list
    /// once the cursor passes the end.
    pub fn select_next(&mut self) -> Option<MemberId> {
        if self.order.is_empty() {
            return None;
        }
        if self.cursor >= self.order.len() {
            self.order.shuffle(&mut thread_rng());
            self.cursor = 0;
        }
        let id = self.order[self.cursor];
        self.cursor += 1;
        Some(id)
    }
}
