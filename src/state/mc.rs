use std::fmt::Debug;
use std::marker::PhantomData;

use crate::access::AccessEgress;
use crate::direction::Direction;
use crate::events::{DebugListeners, Outcome};
use crate::network::{PatternIdx, StopIdx, Transfer};
use crate::path::{Leg, Path};
use crate::primitives::{Cost, Round, Time};
use crate::request::{C2Dominance, RelaxFunction};
use crate::state::pareto::ParetoSet;
use crate::state::StopMarks;
use crate::timetable::TripRef;
use crate::worker::{RoutingStrategy, SearchCtx};

/// Handle into the label arena. Labels reference their predecessor by
/// index, never by pointer, and are neither hashed nor structurally
/// compared — the chain is for path reconstruction only.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct LabelIdx(pub u32);
impl Debug for LabelIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("l#{}", self.0))
    }
}

pub const NO_LABEL: LabelIdx = LabelIdx(u32::MAX);

#[derive(Debug, Clone, Copy)]
pub enum ArrivedBy {
    Access { departure: Time },
    Transit {
        pattern: PatternIdx,
        board_stop: StopIdx,
        board_time: Time,
    },
    Transfer { from: StopIdx },
    Egress { display_time: Time },
}

/// One multi-criteria stop arrival.
///
/// `pareto_round` advances by one per transit boarding and one per foot
/// transfer (the access label starts at 0), so a transit arrival always
/// dominates a transfer arrival of the same logical round. The public
/// round number derives from it.
#[derive(Debug, Clone, Copy)]
pub struct McLabel {
    pub stop: StopIdx,
    pub time: Time,
    pub pareto_round: u32,
    pub c1: Cost,
    pub c2: u32,
    pub arrived_on_board: bool,
    pub prev: LabelIdx,
    pub arrived_by: ArrivedBy,
}

impl McLabel {
    pub fn round(&self) -> Round {
        (self.pareto_round + 1) / 2
    }
}

type DominanceFn = fn(&Dominator, &McLabel, &McLabel) -> bool;

/// The composite dominance relation over (arrival time, pareto round,
/// c1, optional c2), with arrived-on-board as the final tie-break.
///
/// The concrete variant is a pure function of whether the relax function
/// is the identity and whether a c2 dominance is configured; it is
/// chosen once here and never re-dispatched per comparison.
pub struct Dominator {
    forward: bool,
    relax: RelaxFunction,
    c2: C2Dominance,
    chosen: DominanceFn,
}

impl Dominator {
    pub fn new(forward: bool, relax: RelaxFunction, c2: Option<C2Dominance>) -> Self {
        let chosen: DominanceFn = match (relax.is_identity(), c2.is_some()) {
            (true, false) => Self::base,
            (false, false) => Self::relaxed,
            (true, true) => Self::with_c2,
            (false, true) => Self::relaxed_with_c2,
        };
        Self {
            forward,
            relax,
            c2: c2.unwrap_or(C2Dominance::SmallerIsBetter),
            chosen,
        }
    }

    /// True if `l` dominates `r`, or the two are criteria-equal. Used as
    /// the rejection/eviction relation of the Pareto sets.
    #[inline]
    pub fn dominates_or_equals(&self, l: &McLabel, r: &McLabel) -> bool {
        (self.chosen)(self, l, r)
    }

    #[inline]
    fn time_before(&self, a: Time, b: Time) -> bool {
        if self.forward {
            a < b
        } else {
            a > b
        }
    }

    #[inline(always)]
    fn compare(&self, l: &McLabel, r: &McLabel, relaxed: bool, use_c2: bool) -> bool {
        let mut l_better = false;
        let mut r_better = false;
        if l.time != r.time {
            if self.time_before(l.time, r.time) {
                l_better = true;
            } else {
                r_better = true;
            }
        }
        if l.pareto_round != r.pareto_round {
            if l.pareto_round < r.pareto_round {
                l_better = true;
            } else {
                r_better = true;
            }
        }
        if relaxed {
            // A value within the relaxed band of the other is not beaten.
            if r.c1 > self.relax.relax(l.c1) {
                l_better = true;
            }
            if l.c1 > self.relax.relax(r.c1) {
                r_better = true;
            }
        } else if l.c1 != r.c1 {
            if l.c1 < r.c1 {
                l_better = true;
            } else {
                r_better = true;
            }
        }
        if use_c2 {
            if self.c2.dominates(l.c2, r.c2) {
                l_better = true;
            }
            if self.c2.dominates(r.c2, l.c2) {
                r_better = true;
            }
        }
        if r_better {
            return false;
        }
        if l_better {
            return true;
        }
        // Distinct c1 values inside the relaxed band: both survive, that
        // is the point of relaxing.
        if relaxed && l.c1 != r.c1 {
            return false;
        }
        // Complete tie: an on-board arrival keeps more downstream options
        // than a foot arrival.
        l.arrived_on_board || !r.arrived_on_board
    }

    fn base(&self, l: &McLabel, r: &McLabel) -> bool {
        self.compare(l, r, false, false)
    }

    fn relaxed(&self, l: &McLabel, r: &McLabel) -> bool {
        self.compare(l, r, true, false)
    }

    fn with_c2(&self, l: &McLabel, r: &McLabel) -> bool {
        self.compare(l, r, false, true)
    }

    fn relaxed_with_c2(&self, l: &McLabel, r: &McLabel) -> bool {
        self.compare(l, r, true, true)
    }
}

#[derive(Debug, Clone, Copy)]
struct PatternRide {
    trip: TripRef,
    board_pos: usize,
    board_time: Time,
    prev: LabelIdx,
    pareto_round: u32,
    c1: Cost,
    c2: u32,
}

/// Multi-criteria arrival state: a lazily grown Pareto set of labels per
/// stop, a destination front fed by egress legs, and the label arena the
/// back-walk runs over.
pub struct McState<D: Direction> {
    arena: Vec<McLabel>,
    stops: Vec<ParetoSet<LabelIdx>>,
    destination: ParetoSet<LabelIdx>,
    dominator: Dominator,
    use_c2: bool,
    group_bits: bool,
    rides: Vec<PatternRide>,
    marks: StopMarks,
    transit_set: StopMarks,
    round: Round,
    destination_reached: bool,
    _direction: PhantomData<D>,
}

impl<D: Direction> McState<D> {
    pub fn new(num_stops: usize, relax: RelaxFunction, c2: Option<C2Dominance>) -> Self {
        Self {
            arena: Vec::new(),
            stops: (0..num_stops).map(|_| ParetoSet::new()).collect(),
            destination: ParetoSet::new(),
            dominator: Dominator::new(D::IS_FORWARD, relax, c2),
            use_c2: c2.is_some(),
            group_bits: matches!(c2, Some(C2Dominance::GroupPriority)),
            rides: Vec::new(),
            marks: StopMarks::new(num_stops),
            transit_set: StopMarks::new(num_stops),
            round: 0,
            destination_reached: false,
            _direction: PhantomData,
        }
    }

    pub fn label(&self, idx: LabelIdx) -> &McLabel {
        &self.arena[idx.0 as usize]
    }

    pub fn destination_front(&self) -> &[LabelIdx] {
        self.destination.as_slice()
    }

    pub fn stop_front(&self, stop: StopIdx) -> &[LabelIdx] {
        self.stops[stop.0 as usize].as_slice()
    }

    /// Best arrival per stop over all labels, for the result views.
    pub fn best_overall(&self) -> Vec<Time> {
        self.fold_stops(|_| true)
    }

    pub fn best_transit(&self) -> Vec<Time> {
        self.fold_stops(|l| l.arrived_on_board)
    }

    fn fold_stops(&self, keep: impl Fn(&McLabel) -> bool) -> Vec<Time> {
        self.stops
            .iter()
            .map(|set| {
                set.iter()
                    .map(|&idx| self.label(idx))
                    .filter(|l| keep(l))
                    .map(|l| l.time)
                    .fold(D::unreached(), |acc, t| {
                        if D::is_before(t, acc) {
                            t
                        } else {
                            acc
                        }
                    })
            })
            .collect()
    }

    pub fn best_num_transfers(&self) -> Vec<Option<u8>> {
        self.stops
            .iter()
            .map(|set| {
                set.iter()
                    .map(|&idx| self.label(idx).round().saturating_sub(1) as u8)
                    .min()
            })
            .collect()
    }

    /// Admissible destination pruning: projects the candidate to the
    /// destination with the heuristic lower bounds and rejects it only
    /// if the current destination front already dominates the
    /// projection.
    fn pruned(&self, ctx: &SearchCtx, label: &McLabel) -> bool {
        let Some(h) = ctx.heuristics else {
            return false;
        };
        if !h.reachable(label.stop) {
            return true;
        }
        if self.destination.is_empty() {
            return false;
        }
        let projected = McLabel {
            time: D::shift(label.time, h.remaining_duration(label.stop)),
            pareto_round: label.pareto_round + h.remaining_rides(label.stop) as u32,
            // Favor the projection on the tie-break; pruning must stay
            // conservative.
            arrived_on_board: true,
            ..*label
        };
        self.destination
            .iter()
            .any(|&d| self.dominator.dominates_or_equals(self.label(d), &projected))
    }

    fn offer(&mut self, ctx: &SearchCtx, ev: &mut DebugListeners, label: McLabel) -> bool {
        if self.pruned(ctx, &label) {
            ev.stop_arrival(label.stop, self.round, label.time, Outcome::Rejected);
            return false;
        }
        self.arena.push(label);
        let idx = LabelIdx((self.arena.len() - 1) as u32);
        let arena = &self.arena;
        let dominator = &self.dominator;
        let result = self.stops[label.stop.0 as usize].try_insert(idx, |l, r| {
            dominator.dominates_or_equals(&arena[l.0 as usize], &arena[r.0 as usize])
        });
        if result.accepted {
            self.marks.mark(label.stop);
            ev.stop_arrival(label.stop, self.round, label.time, Outcome::Accepted);
            true
        } else {
            // Nothing references the candidate yet; reclaim the slot.
            self.arena.pop();
            ev.stop_arrival(label.stop, self.round, label.time, Outcome::Rejected);
            false
        }
    }

    fn offer_destination(&mut self, label: McLabel) -> bool {
        self.destination_reached = true;
        self.arena.push(label);
        let idx = LabelIdx((self.arena.len() - 1) as u32);
        let arena = &self.arena;
        let dominator = &self.dominator;
        let result = self.destination.try_insert(idx, |l, r| {
            dominator.dominates_or_equals(&arena[l.0 as usize], &arena[r.0 as usize])
        });
        if !result.accepted {
            self.arena.pop();
        }
        result.accepted
    }

    /// Labels usable as a source for the given phase of the current
    /// round.
    fn sources(&self, stop: StopIdx, round: Round, on_board: bool) -> Vec<LabelIdx> {
        self.stops[stop.0 as usize]
            .iter()
            .copied()
            .filter(|&idx| {
                let l = self.label(idx);
                l.round() == round && l.arrived_on_board == on_board
            })
            .collect()
    }

    fn add_ride(&mut self, ev: &mut DebugListeners, pattern: PatternIdx, stop: StopIdx, ride: PatternRide) {
        let use_c2 = self.use_c2;
        let comparable = move |a: &PatternRide, b: &PatternRide| {
            a.trip == b.trip && (!use_c2 || a.c2 == b.c2)
        };
        let dominated = self.rides.iter().any(|r| {
            comparable(r, &ride) && r.c1 <= ride.c1 && r.pareto_round <= ride.pareto_round
        });
        if dominated {
            ev.pattern_ride(pattern, stop, ride.board_time, Outcome::Rejected);
            return;
        }
        self.rides
            .retain(|r| !(comparable(r, &ride) && ride.c1 <= r.c1 && ride.pareto_round <= r.pareto_round));
        ev.pattern_ride(pattern, stop, ride.board_time, Outcome::Accepted);
        self.rides.push(ride);
    }
}

impl<D: Direction> RoutingStrategy<D> for McState<D> {
    fn begin_iteration(&mut self) {
        self.rides.clear();
        self.marks.clear();
        self.transit_set.clear();
    }

    fn begin_round(&mut self, round: Round) {
        self.round = round;
        self.transit_set.clear();
    }

    fn access_arrival(
        &mut self,
        ctx: &SearchCtx,
        ev: &mut DebugListeners,
        _leg_idx: u32,
        leg: &AccessEgress,
        departure: Time,
    ) {
        let label = McLabel {
            stop: leg.stop(),
            time: D::shift(departure, leg.duration()),
            pareto_round: 0,
            c1: leg.c1(),
            c2: 0,
            arrived_on_board: false,
            prev: NO_LABEL,
            arrived_by: ArrivedBy::Access { departure },
        };
        self.offer(ctx, ev, label);
    }

    fn prepare_pattern(&mut self) {
        self.rides.clear();
    }

    fn alight_at(&mut self, ctx: &SearchCtx, ev: &mut DebugListeners, pattern: PatternIdx, pos: usize) {
        if self.rides.is_empty() {
            return;
        }
        let p = ctx.net.pattern(pattern);
        let stop = p.stop_at(pos);
        let slack = ctx.slack.alight_slack(p.slack_index());
        let rides = self.rides.clone();
        for ride in rides {
            if !D::is_downstream(ride.board_pos, pos) {
                continue;
            }
            let raw = D::ride_arrival(p.timetable(), ride.trip, ride.board_pos, pos);
            let time = D::shift(raw, slack);
            let ride_duration = (time - ride.board_time).abs();
            let label = McLabel {
                stop,
                time,
                pareto_round: ride.pareto_round,
                c1: ride.c1 + ctx.cost.ride_cost(ride_duration, p.slack_index()),
                c2: ride.c2,
                arrived_on_board: true,
                prev: ride.prev,
                arrived_by: ArrivedBy::Transit {
                    pattern,
                    board_stop: self.label(ride.prev).stop,
                    board_time: ride.board_time,
                },
            };
            if self.offer(ctx, ev, label) {
                self.transit_set.mark(stop);
            }
        }
    }

    fn board_at(&mut self, ctx: &SearchCtx, ev: &mut DebugListeners, pattern: PatternIdx, pos: usize) {
        let p = ctx.net.pattern(pattern);
        let stop = p.stop_at(pos);
        let board_slack = ctx.slack.board_slack(p.slack_index());
        let group_bit = if self.group_bits { p.group_bit() } else { 0 };
        for source_idx in self.sources(stop, ctx.round - 1, false) {
            let source = *self.label(source_idx);
            let limit = D::shift(source.time, board_slack);
            let Some(boarding) = D::find_boarding(p.timetable(), pos, limit) else {
                continue;
            };
            let wait = (boarding.time - source.time).abs();
            let ride = PatternRide {
                trip: boarding.trip,
                board_pos: pos,
                board_time: boarding.time,
                prev: source_idx,
                pareto_round: source.pareto_round + 1,
                c1: source.c1 + ctx.cost.boarding_cost(source.pareto_round == 0, wait),
                c2: if self.use_c2 {
                    source.c2 | group_bit
                } else {
                    0
                },
            };
            self.add_ride(ev, pattern, stop, ride);
        }
    }

    fn transfer_arrival(
        &mut self,
        ctx: &SearchCtx,
        ev: &mut DebugListeners,
        from: StopIdx,
        transfer: &Transfer,
    ) {
        for source_idx in self.sources(from, ctx.round, true) {
            let source = *self.label(source_idx);
            let label = McLabel {
                stop: transfer.to,
                time: D::shift(source.time, transfer.duration),
                pareto_round: source.pareto_round + 1,
                c1: source.c1 + ctx.cost.walk_cost(transfer.duration, transfer.c1),
                c2: source.c2,
                arrived_on_board: false,
                prev: source_idx,
                arrived_by: ArrivedBy::Transfer { from },
            };
            self.offer(ctx, ev, label);
        }
    }

    fn egress_arrival(
        &mut self,
        ctx: &SearchCtx,
        _ev: &mut DebugListeners,
        _leg_idx: u32,
        leg: &AccessEgress,
    ) {
        for source_idx in self.sources(leg.stop(), ctx.round, true) {
            let source = *self.label(source_idx);
            let display_time = D::shift(source.time, leg.limit_duration());
            if let Some(limit) = ctx.arrival_limit {
                if D::is_before(limit, display_time) {
                    continue;
                }
            }
            let label = McLabel {
                stop: source.stop,
                time: D::shift(source.time, leg.duration()),
                pareto_round: source.pareto_round,
                c1: source.c1 + leg.c1(),
                c2: source.c2,
                arrived_on_board: false,
                prev: source_idx,
                arrived_by: ArrivedBy::Egress { display_time },
            };
            self.offer_destination(label);
        }
    }

    fn transit_marks(&self) -> Vec<StopIdx> {
        self.transit_set.stops().to_vec()
    }

    fn is_marked(&self, stop: StopIdx) -> bool {
        self.marks.is_marked(stop)
    }

    fn finish_round(&mut self) -> Vec<StopIdx> {
        self.marks.take()
    }

    fn end_iteration(&mut self, _ctx: &SearchCtx, _ev: &mut DebugListeners) {}

    fn destination_reached(&self) -> bool {
        self.destination_reached
    }
}

impl<D: Direction> McState<D> {
    /// One path per non-dominated destination arrival, deterministically
    /// ordered and deduplicated by the caller.
    pub fn extract_paths(&self) -> Vec<Path> {
        self.destination
            .iter()
            .map(|&idx| self.extract_path(idx))
            .collect()
    }

    fn extract_path(&self, dest_idx: LabelIdx) -> Path {
        let dest = self.label(dest_idx);
        let ArrivedBy::Egress { display_time } = dest.arrived_by else {
            panic!("destination label without egress leg");
        };
        let mut walked: Vec<Leg> = Vec::new();
        let mut current = *self.label(dest.prev);

        walked.push(if D::IS_FORWARD {
            Leg::Egress {
                stop: current.stop,
                departure: current.time,
                arrival: display_time,
            }
        } else {
            Leg::Access {
                stop: current.stop,
                departure: display_time,
                arrival: current.time,
            }
        });

        loop {
            match current.arrived_by {
                ArrivedBy::Transit {
                    pattern,
                    board_stop,
                    board_time,
                } => {
                    walked.push(if D::IS_FORWARD {
                        Leg::Transit {
                            pattern,
                            board_stop,
                            alight_stop: current.stop,
                            board_time,
                            alight_time: current.time,
                        }
                    } else {
                        Leg::Transit {
                            pattern,
                            board_stop: current.stop,
                            alight_stop: board_stop,
                            board_time: current.time,
                            alight_time: board_time,
                        }
                    });
                    current = *self.label(current.prev);
                }
                ArrivedBy::Transfer { from } => {
                    let source = *self.label(current.prev);
                    walked.push(if D::IS_FORWARD {
                        Leg::Transfer {
                            from,
                            to: current.stop,
                            departure: source.time,
                            arrival: current.time,
                        }
                    } else {
                        Leg::Transfer {
                            from: current.stop,
                            to: from,
                            departure: current.time,
                            arrival: source.time,
                        }
                    });
                    current = source;
                }
                ArrivedBy::Access { departure } => {
                    walked.push(if D::IS_FORWARD {
                        Leg::Access {
                            stop: current.stop,
                            departure,
                            arrival: current.time,
                        }
                    } else {
                        Leg::Egress {
                            stop: current.stop,
                            departure: current.time,
                            arrival: departure,
                        }
                    });
                    break;
                }
                ArrivedBy::Egress { .. } => {
                    panic!("egress label inside an arrival chain");
                }
            }
        }

        if D::IS_FORWARD {
            walked.reverse();
        }
        Path::from_legs(walked, dest.c1, dest.c2)
    }
}
