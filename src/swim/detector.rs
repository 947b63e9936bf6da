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

use log::{debug, info, trace, warn};
use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::constant::*;
use crate::error::Error;
use crate::gossip::GossipQueue;
use crate::schedule::ProbeSchedule;
use crate::table::{MemberTable, MembershipEntry, UpsertOutcome};
use crate::types::*;

/// The options for create a swim member.
#[derive(Debug, Clone)]
pub struct SwimOption {
    /// Specify the number of ticks in one protocol period.  One probe
    /// round runs per period, so together with the embedder's tick
    /// duration this fixes the probing rate.
    ///
    /// default: 10
    pub protocol_period_ticks: u32,

    /// Specify the number of ticks to wait for a direct ack before asking
    /// helpers to probe indirectly.  Must be strictly smaller than
    /// `protocol_period_ticks`, and should exceed the expected round-trip
    /// time of the deployment.
    ///
    /// default: 3
    pub ack_timeout_ticks: u32,

    /// Specify the number of helpers contacted for indirect probing when
    /// the direct probe times out.
    ///
    /// default: 3
    pub indirect_probe_count: usize,

    /// Specify the number of whole protocol periods a suspicion may stand
    /// without a refuting alive declaration before the member is confirmed
    /// faulty.
    ///
    /// default: 5
    pub suspicion_periods: u64,

    /// Specify the cap of gossip entries attached to one outgoing message.
    /// The cap is a hard constraint: message size stays O(1) no matter how
    /// large the membership grows.
    ///
    /// default: 6
    pub gossip_limit: usize,

    /// Specify the capacity of the dissemination buffer.
    ///
    /// default: 64
    pub gossip_capacity: usize,

    /// Specify the number of times one update is attached to outgoing
    /// messages before it is retired from the dissemination buffer.
    ///
    /// default: 8
    pub max_transmissions: u32,

    /// Specify the percentage of each gossip batch reserved for faulty
    /// declarations.
    ///
    /// default: 50
    pub faulty_gossip_share: u32,

    /// Specify the number of whole protocol periods a faulty entry is
    /// retained as a tombstone before it is purged from the table.
    ///
    /// default: 8
    pub faulty_purge_periods: u64,
}

impl Default for SwimOption {
    fn default() -> SwimOption {
        SwimOption {
            protocol_period_ticks: DEFAULT_PROTOCOL_PERIOD_TICKS,
            ack_timeout_ticks: DEFAULT_ACK_TIMEOUT_TICKS,
            indirect_probe_count: DEFAULT_INDIRECT_PROBE_COUNT,
            suspicion_periods: DEFAULT_SUSPICION_PERIODS,
            gossip_limit: DEFAULT_GOSSIP_LIMIT,
            gossip_capacity: DEFAULT_GOSSIP_CAPACITY,
            max_transmissions: DEFAULT_MAX_TRANSMISSIONS,
            faulty_gossip_share: 50,
            faulty_purge_periods: DEFAULT_FAULTY_PURGE_PERIODS,
        }
    }
}

impl SwimOption {
    pub fn validate(&self) -> Result<(), Error> {
        if self.ack_timeout_ticks == 0 {
            return Err(Error::InvalidOption("ack timeout must be at least one tick"));
        }
        if self.ack_timeout_ticks >= self.protocol_period_ticks {
            return Err(Error::InvalidOption(
                "ack timeout must be shorter than the protocol period",
            ));
        }
        if self.indirect_probe_count == 0 {
            return Err(Error::InvalidOption(
                "indirect probing needs at least one helper",
            ));
        }
        if self.gossip_limit == 0 {
            return Err(Error::InvalidOption(
                "at least one gossip entry per message is required",
            ));
        }
        if self.gossip_capacity < self.gossip_limit {
            return Err(Error::InvalidOption(
                "dissemination buffer smaller than one gossip batch",
            ));
        }
        if self.suspicion_periods == 0 {
            return Err(Error::InvalidOption(
                "suspicion timeout must be at least one period",
            ));
        }
        if self.max_transmissions == 0 {
            return Err(Error::InvalidOption(
                "updates must be transmitted at least once",
            ));
        }
        if self.faulty_gossip_share > 100 {
            return Err(Error::InvalidOption(
                "faulty gossip share is a percentage",
            ));
        }
        if self.faulty_purge_periods == 0 {
            return Err(Error::InvalidOption(
                "faulty entries must be retained for at least one period",
            ));
        }
        Ok(())
    }
}

/// Bookkeeping of the one outstanding probe of the current protocol
/// period.  Created when the ping is sent, destroyed on ack or period end.
#[derive(Debug)]
struct ProbeRecord {
    target: MemberId,
    seq: u64,
    indirect_sent: bool,
    helpers: Vec<MemberId>,
}

/// Helper-side bookkeeping of one forwarded ping-req probe, keyed by the
/// helper's own ping sequence number.
#[derive(Debug)]
struct RelayRecord {
    origin: MemberId,
    origin_seq: u64,
    target: MemberId,
    expires_at_period: u64,
}

/// The struct `Ready` buffers the output generated by the state machine
/// after receiving messages and ticks.  The `advance()` function will take
/// the value of `Ready`: outgoing messages for the transport and
/// membership-change events for the application.
#[derive(Debug, Default)]
pub struct Ready {
    pub msgs: Vec<Message>,
    pub events: Vec<MemberEvent>,
}

impl Ready {
    fn send_msg(&mut self, msg: Message) {
        assert_ne!(msg.to, INVALID_MEMBER_ID);
        self.msgs.push(msg);
    }
}

/// The SWIM protocol state machine of one member.
///
/// The embedder owns the timer and the transport: it calls [`Swim::tick`]
/// at a fixed interval, feeds every received message to [`Swim::step`],
/// and drains [`Swim::advance`] afterwards, sending the returned messages
/// over the transport.  The state machine itself never blocks and never
/// touches the network.
#[derive(Debug)]
pub struct Swim {
    option: SwimOption,

    id: MemberId,
    incarnation: Incarnation,

    table: MemberTable,
    gossip: GossipQueue,
    schedule: ProbeSchedule,

    /// Completed protocol periods since startup.
    period: u64,
    /// Ticks elapsed in the current period.
    elapsed_tick: u32,
    next_seq: u64,

    probe: Option<ProbeRecord>,
    relays: HashMap<u64, RelayRecord>,

    /// Recently purged tombstones and the period they were purged at,
    /// retained for a grace window to tell late stragglers from bugs.
    purged: HashMap<MemberId, u64>,

    ready: Ready,
}

impl Swim {
    pub fn new(id: MemberId, seeds: &[MemberId], option: SwimOption) -> Result<Swim, Error> {
        option.validate()?;
        if id == INVALID_MEMBER_ID {
            return Err(Error::InvalidMemberId(id));
        }

        let mut s = Swim {
            id,
            incarnation: INITIAL_INCARNATION,
            table: MemberTable::new(id),
            gossip: GossipQueue::new(
                option.gossip_capacity,
                option.max_transmissions,
                option.faulty_gossip_share,
            ),
            schedule: ProbeSchedule::new(),
            period: 0,
            elapsed_tick: 0,
            next_seq: INVALID_SEQ,
            probe: None,
            relays: HashMap::new(),
            purged: HashMap::new(),
            ready: Ready::default(),
            option,
        };

        let local = GossipEntry {
            member: id,
            incarnation: INITIAL_INCARNATION,
            status: MemberStatus::Alive,
        };
        s.table.upsert(local, true, 0);
        // Announce ourselves on the first probes we send.
        s.gossip.push(local);

        for seed in seeds {
            if *seed == INVALID_MEMBER_ID {
                return Err(Error::InvalidMemberId(*seed));
            }
            if *seed == id {
                continue;
            }
            let entry = GossipEntry {
                member: *seed,
                incarnation: INITIAL_INCARNATION,
                status: MemberStatus::Alive,
            };
            if s.table.upsert(entry, false, 0) == UpsertOutcome::Inserted {
                s.schedule.insert(*seed);
            }
        }

        info!("node {} starts with {} seed members", id, s.schedule.len());
        // Period 0 probes like any other; waiting for the first boundary
        // would delay every detection by one full period.
        s.begin_period();
        Ok(s)
    }

    pub fn local_id(&self) -> MemberId {
        self.id
    }

    pub fn incarnation(&self) -> Incarnation {
        self.incarnation
    }

    /// The active membership view: every non-faulty member this node
    /// knows, itself included.
    pub fn members(&self) -> Vec<MembershipEntry> {
        self.table.list().into_iter().cloned().collect()
    }

    pub fn status_of(&self, id: MemberId) -> Option<MemberStatus> {
        self.table.get(id).map(|e| e.status)
    }

    /// Advance logical time by one tick.  Escalates a timed out direct
    /// probe to indirect probing mid-period; at period boundaries settles
    /// the finished round and starts the next one.
    pub fn tick(&mut self) {
        self.elapsed_tick += 1;
        self.maybe_escalate_probe();
        if self.elapsed_tick >= self.option.protocol_period_ticks {
            self.finish_period();
            self.elapsed_tick = 0;
            self.period += 1;
            self.begin_period();
        }
    }

    /// Feed one received message into the state machine.
    pub fn step(&mut self, msg: Message) {
        if msg.to != self.id {
            warn!(
                "node {} receive misrouted {} from {} addressed to {}",
                self.id, msg.detail, msg.from, msg.to
            );
            return;
        }
        if msg.from == self.id || msg.from == INVALID_MEMBER_ID {
            warn!("node {} receive message with bogus sender {}", self.id, msg.from);
            return;
        }
        if self.reference_to_purged(msg.from) {
            return;
        }

        self.observe_sender(msg.from);
        self.apply_gossip(msg.from, &msg.gossip);

        match msg.detail {
            MsgDetail::Ping(ping) => self.handle_ping(msg.from, &ping),
            MsgDetail::PingReq(ping_req) => self.handle_ping_req(msg.from, &ping_req),
            MsgDetail::Ack(ack) => self.handle_ack(msg.from, &ack),
            MsgDetail::None => {}
        }
    }

    /// Drain the buffered outputs: messages to hand to the transport and
    /// events to hand to the application.
    pub fn advance(&mut self) -> Ready {
        std::mem::take(&mut self.ready)
    }

    fn issue_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Build and buffer one outgoing message, piggybacking a bounded batch
    /// of pending gossip.
    fn send(&mut self, to: MemberId, detail: MsgDetail) {
        let gossip = self.gossip.select_for_attachment(self.option.gossip_limit);
        self.ready.send_msg(Message {
            from: self.id,
            to,
            gossip,
            detail,
        });
    }

    fn begin_period(&mut self) {
        let attempts = self.schedule.len();
        for _ in 0..attempts {
            let target = match self.schedule.select_next() {
                Some(target) => target,
                None => return,
            };
            if target == self.id {
                continue;
            }
            match self.table.get(target) {
                Some(entry) if entry.status != MemberStatus::Faulty => {}
                _ => continue,
            }

            let seq = self.issue_seq();
            debug!(
                "node {} period {} probe member {} seq {}",
                self.id, self.period, target, seq
            );
            self.probe = Some(ProbeRecord {
                target,
                seq,
                indirect_sent: false,
                helpers: Vec::new(),
            });
            self.send(target, MsgDetail::Ping(PingMsg { seq }));
            return;
        }
    }

    fn maybe_escalate_probe(&mut self) {
        let (target, seq) = match &self.probe {
            Some(p) if !p.indirect_sent && self.elapsed_tick >= self.option.ack_timeout_ticks => {
                (p.target, p.seq)
            }
            _ => return,
        };

        let candidates = self
            .table
            .list()
            .iter()
            .map(|e| e.id)
            .filter(|id| *id != self.id && *id != target)
            .collect::<Vec<_>>();
        let helpers = candidates
            .choose_multiple(&mut thread_rng(), self.option.indirect_probe_count)
            .cloned()
            .collect::<Vec<_>>();

        debug!(
            "node {} direct probe of member {} timed out, ask {} helpers",
            self.id,
            target,
            helpers.len()
        );
        for helper in helpers.clone() {
            self.send(helper, MsgDetail::PingReq(PingReqMsg { target, seq }));
        }
        if let Some(p) = &mut self.probe {
            p.indirect_sent = true;
            p.helpers = helpers;
        }
    }

    fn finish_period(&mut self) {
        if let Some(probe) = self.probe.take() {
            self.on_probe_failed(&probe);
        }

        let period = self.period;
        self.relays.retain(|seq, relay| {
            if relay.expires_at_period <= period {
                trace!(
                    "drop expired relay seq {} for origin {} target {}",
                    seq,
                    relay.origin,
                    relay.target
                );
                false
            } else {
                true
            }
        });

        self.expire_suspicions();
        self.purge_faulty();

        let grace = 2 * self.option.faulty_purge_periods;
        self.purged.retain(|_, at| period - *at <= grace);
    }

    /// The period ended without a direct or relayed ack: the target looks
    /// unreachable from here, mark it suspected and start the refutation
    /// window.  A single failed probe never confirms a failure.
    fn on_probe_failed(&mut self, probe: &ProbeRecord) {
        let entry = match self.table.get(probe.target) {
            Some(entry) => entry,
            None => return,
        };
        if entry.status != MemberStatus::Alive {
            return;
        }

        let update = GossipEntry {
            member: probe.target,
            incarnation: entry.incarnation,
            status: MemberStatus::Suspected,
        };
        if self.table.upsert(update, false, self.period) == UpsertOutcome::Updated {
            info!(
                "node {} suspects member {} at incarnation {}, {} helpers asked",
                self.id,
                probe.target,
                update.incarnation,
                probe.helpers.len()
            );
            self.gossip.push(update);
            self.ready.events.push(MemberEvent::Suspected {
                id: probe.target,
                incarnation: update.incarnation,
            });
        }
    }

    /// Confirm members whose suspicion stood the whole timeout without a
    /// refuting alive declaration.  Every member runs this scan on its own
    /// clock, so a faulty member is confirmed even if the original
    /// suspecting member crashed meanwhile.
    fn expire_suspicions(&mut self) {
        let period = self.period;
        let timeout = self.option.suspicion_periods;
        let expired = self
            .table
            .iter()
            .filter(|e| e.status == MemberStatus::Suspected)
            .filter(|e| match e.suspected_at_period {
                Some(since) => period - since >= timeout,
                None => false,
            })
            .map(|e| (e.id, e.incarnation))
            .collect::<Vec<_>>();

        for (id, incarnation) in expired {
            let update = GossipEntry {
                member: id,
                incarnation,
                status: MemberStatus::Faulty,
            };
            if self.table.upsert(update, false, self.period) == UpsertOutcome::Updated {
                info!(
                    "node {} confirms member {} faulty at incarnation {}",
                    self.id, id, incarnation
                );
                self.schedule.remove(id);
                self.gossip.push(update);
                self.ready.events.push(MemberEvent::Failed { id, incarnation });
            }
        }
    }

    /// Drop faulty tombstones past the dissemination window.  The id is
    /// remembered for a grace window, after that the member may re-join
    /// with a fresh entry.
    fn purge_faulty(&mut self) {
        let period = self.period;
        let retain = self.option.faulty_purge_periods;
        let purgeable = self
            .table
            .iter()
            .filter(|e| e.status == MemberStatus::Faulty)
            .filter(|e| match e.faulty_at_period {
                Some(since) => period - since >= retain,
                None => false,
            })
            .map(|e| e.id)
            .collect::<Vec<_>>();

        for id in purgeable {
            info!("node {} purges faulty member {}", self.id, id);
            self.table.remove(id);
            self.gossip.remove(id);
            self.schedule.remove(id);
            self.purged.insert(id, period);
        }
    }

    /// Check a member reference against the recently purged tombstones.
    /// A reference soon after the purge is a straggler of the faulty
    /// dissemination and is dropped quietly; one long past the window
    /// points at a TTL misconfiguration or a bug.
    fn reference_to_purged(&mut self, id: MemberId) -> bool {
        let at = match self.purged.get(&id) {
            Some(at) => *at,
            None => return false,
        };
        if self.period - at <= self.option.faulty_purge_periods {
            trace!(
                "node {} drop straggler reference to purged member {}",
                self.id,
                id
            );
        } else {
            warn!(
                "node {} reference to member {} purged {} periods ago, TTL misconfigured?",
                self.id,
                id,
                self.period - at
            );
            debug_assert!(false, "reference to member {} long past purge", id);
        }
        true
    }

    fn observe_sender(&mut self, from: MemberId) {
        if self.table.get(from).is_some() {
            return;
        }
        let entry = GossipEntry {
            member: from,
            incarnation: INITIAL_INCARNATION,
            status: MemberStatus::Alive,
        };
        self.table.upsert(entry, true, self.period);
        self.schedule.insert(from);
        self.gossip.push(entry);
        info!("node {} learns member {} from incoming message", self.id, from);
        self.ready.events.push(MemberEvent::Joined {
            id: from,
            incarnation: INITIAL_INCARNATION,
        });
    }

    fn apply_gossip(&mut self, from: MemberId, items: &[GossipEntry]) {
        for item in items {
            if item.member == INVALID_MEMBER_ID {
                warn!("node {} drop gossip about invalid member id", self.id);
                continue;
            }
            if item.member == self.id {
                self.handle_self_gossip(item);
                continue;
            }
            if self.reference_to_purged(item.member) {
                continue;
            }

            let self_claim = from == item.member && item.status == MemberStatus::Alive;
            let before = self.table.get(item.member).map(|e| e.status);
            match self.table.upsert(*item, self_claim, self.period) {
                UpsertOutcome::Unchanged => {}
                UpsertOutcome::Inserted => {
                    // The update changed our view, keep it spreading.
                    self.gossip.push(*item);
                    if item.status == MemberStatus::Faulty {
                        continue;
                    }
                    self.schedule.insert(item.member);
                    self.ready.events.push(MemberEvent::Joined {
                        id: item.member,
                        incarnation: item.incarnation,
                    });
                    if item.status == MemberStatus::Suspected {
                        self.ready.events.push(MemberEvent::Suspected {
                            id: item.member,
                            incarnation: item.incarnation,
                        });
                    }
                }
                UpsertOutcome::Updated => {
                    self.gossip.push(*item);
                    match (before, item.status) {
                        (_, MemberStatus::Faulty) => {
                            info!(
                                "node {} learns member {} is confirmed faulty",
                                self.id, item.member
                            );
                            self.schedule.remove(item.member);
                            self.ready.events.push(MemberEvent::Failed {
                                id: item.member,
                                incarnation: item.incarnation,
                            });
                        }
                        (Some(MemberStatus::Suspected), MemberStatus::Alive) => {
                            info!(
                                "node {} clears suspicion of member {} at incarnation {}",
                                self.id, item.member, item.incarnation
                            );
                            self.ready.events.push(MemberEvent::Recovered {
                                id: item.member,
                                incarnation: item.incarnation,
                            });
                        }
                        (_, MemberStatus::Suspected) => {
                            self.ready.events.push(MemberEvent::Suspected {
                                id: item.member,
                                incarnation: item.incarnation,
                            });
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    /// Gossip about ourselves.  Seeing our own id suspected or confirmed
    /// faulty is refuted by outranking the rumor: bump our incarnation
    /// past it and declare ourselves alive.  Only we are allowed to do
    /// this.
    fn handle_self_gossip(&mut self, item: &GossipEntry) {
        match item.status {
            MemberStatus::Alive => {}
            MemberStatus::Suspected | MemberStatus::Faulty => {
                if item.incarnation < self.incarnation {
                    trace!(
                        "node {} ignore stale {} rumor about itself at incarnation {}",
                        self.id,
                        item.status,
                        item.incarnation
                    );
                    return;
                }
                let refuted = item.incarnation + 1;
                info!(
                    "node {} refutes {} rumor about itself, incarnation {} -> {}",
                    self.id, item.status, self.incarnation, refuted
                );
                self.incarnation = refuted;
                let alive = GossipEntry {
                    member: self.id,
                    incarnation: refuted,
                    status: MemberStatus::Alive,
                };
                self.table.upsert(alive, true, self.period);
                self.gossip.push(alive);
            }
        }
    }

    fn handle_ping(&mut self, from: MemberId, ping: &PingMsg) {
        trace!("node {} ack ping seq {} from {}", self.id, ping.seq, from);
        self.send(from, MsgDetail::Ack(AckMsg { seq: ping.seq }));
    }

    fn handle_ping_req(&mut self, from: MemberId, ping_req: &PingReqMsg) {
        if ping_req.target == self.id {
            // We are reachable, answer for ourselves.
            warn!(
                "node {} asked by {} to probe itself, acking directly",
                self.id, from
            );
            self.send(from, MsgDetail::Ack(AckMsg { seq: ping_req.seq }));
            return;
        }
        if ping_req.target == INVALID_MEMBER_ID {
            warn!("node {} drop ping-req with invalid target", self.id);
            return;
        }

        let seq = self.issue_seq();
        debug!(
            "node {} probe member {} seq {} on behalf of {}",
            self.id, ping_req.target, seq, from
        );
        self.relays.insert(
            seq,
            RelayRecord {
                origin: from,
                origin_seq: ping_req.seq,
                target: ping_req.target,
                expires_at_period: self.period + 1,
            },
        );
        self.send(ping_req.target, MsgDetail::Ping(PingMsg { seq }));
    }

    fn handle_ack(&mut self, from: MemberId, ack: &AckMsg) {
        // First match wins: an ack resolving the outstanding probe drops
        // the record, later duplicates fall through to the trace below.
        if let Some(probe) = &self.probe {
            if probe.seq == ack.seq {
                debug!(
                    "node {} probe of member {} resolved by ack from {}",
                    self.id, probe.target, from
                );
                self.probe = None;
                return;
            }
        }

        if let Some(relay) = self.relays.remove(&ack.seq) {
            trace!(
                "node {} relay ack of member {} back to origin {}",
                self.id,
                relay.target,
                relay.origin
            );
            self.send(relay.origin, MsgDetail::Ack(AckMsg { seq: relay.origin_seq }));
            return;
        }

        trace!("node {} drop late or duplicate ack seq {}", self.id, ack.seq);
    }
}
