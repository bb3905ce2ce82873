use std::marker::PhantomData;

use crate::access::AccessEgress;
use crate::direction::Direction;
use crate::events::{DebugListeners, Outcome};
use crate::network::{PatternIdx, StopIdx, Transfer};
use crate::path::{Leg, Path};
use crate::primitives::{Round, Time};
use crate::state::StopMarks;
use crate::timetable::TripRef;
use crate::worker::{RoutingStrategy, SearchCtx};

/// How a standard-mode arrival was produced, for the back-walk.
#[derive(Debug, Clone, Copy)]
pub enum StdPrev {
    None,
    Access { departure: Time },
    Transit {
        pattern: PatternIdx,
        board_stop: StopIdx,
        board_time: Time,
    },
    Transfer { from: StopIdx },
}

#[derive(Debug, Clone, Copy)]
pub struct StdArrival {
    pub time: Time,
    pub arrived_by: StdPrev,
}

#[derive(Clone, Copy)]
struct OnboardRide {
    trip: TripRef,
    board_pos: usize,
    board_stop: StopIdx,
    board_time: Time,
}

#[derive(Clone, Copy)]
struct StdDest {
    /// Comparison arrival, time penalty included.
    time: Time,
    /// Reported arrival, penalty excluded.
    display_time: Time,
    stop: StopIdx,
}

/// Standard arrival state: one best label per stop per round, overwritten
/// unconditionally when a strictly better candidate arrives. Transit
/// arrivals are kept in a second array so that a better foot arrival at
/// the same stop never hides the ride that transfers and egress legs
/// continue from.
pub struct StdState<D: Direction> {
    num_stops: usize,
    best: Vec<Time>,
    best_transit: Vec<Time>,
    first_reached_round: Vec<Option<u8>>,
    rounds: Vec<Vec<StdArrival>>,
    transit_rounds: Vec<Vec<StdArrival>>,
    dest_per_round: Vec<Option<StdDest>>,
    best_dest_time: Time,
    destination_reached: bool,
    onboard: Option<OnboardRide>,
    marks: StopMarks,
    transit_set: StopMarks,
    round: Round,
    collect_paths: bool,
    paths: Vec<Path>,
    _direction: PhantomData<D>,
}

impl<D: Direction> StdState<D> {
    pub fn new(num_stops: usize, collect_paths: bool) -> Self {
        Self {
            num_stops,
            best: vec![D::unreached(); num_stops],
            best_transit: vec![D::unreached(); num_stops],
            first_reached_round: vec![None; num_stops],
            rounds: Vec::new(),
            transit_rounds: Vec::new(),
            dest_per_round: Vec::new(),
            best_dest_time: D::unreached(),
            destination_reached: false,
            onboard: None,
            marks: StopMarks::new(num_stops),
            transit_set: StopMarks::new(num_stops),
            round: 0,
            collect_paths,
            paths: Vec::new(),
            _direction: PhantomData,
        }
    }

    pub fn best_overall(&self) -> &[Time] {
        &self.best
    }

    pub fn best_transit(&self) -> &[Time] {
        &self.best_transit
    }

    /// Fewest transfers needed to reach each stop (rides minus one).
    pub fn best_num_transfers(&self) -> Vec<Option<u8>> {
        self.first_reached_round
            .iter()
            .map(|r| r.map(|round| round.saturating_sub(1)))
            .collect()
    }

    pub fn take_paths(&mut self) -> Vec<Path> {
        std::mem::take(&mut self.paths)
    }

    fn ensure_round(&mut self, round: Round) {
        let unreached = StdArrival {
            time: D::unreached(),
            arrived_by: StdPrev::None,
        };
        while self.rounds.len() <= round as usize {
            self.rounds.push(vec![unreached; self.num_stops]);
            self.transit_rounds.push(vec![unreached; self.num_stops]);
            self.dest_per_round.push(None);
        }
    }

    /// Destination pruning: reject a candidate that provably cannot beat
    /// the best known destination arrival. The heuristic bound is
    /// admissible, so no potentially optimal branch is lost.
    fn pruned(&self, ctx: &SearchCtx, stop: StopIdx, time: Time) -> bool {
        let Some(h) = ctx.heuristics else {
            return false;
        };
        if !h.reachable(stop) {
            return true;
        }
        if self.best_dest_time == D::unreached() {
            return false;
        }
        let projected = D::shift(time, h.remaining_duration(stop));
        D::is_before(self.best_dest_time, projected)
    }

    fn try_overall(
        &mut self,
        ctx: &SearchCtx,
        ev: &mut DebugListeners,
        stop: StopIdx,
        time: Time,
        arrived_by: StdPrev,
    ) -> bool {
        if !D::is_before(time, self.best[stop.0 as usize]) || self.pruned(ctx, stop, time) {
            ev.stop_arrival(stop, self.round, time, Outcome::Rejected);
            return false;
        }
        self.best[stop.0 as usize] = time;
        self.rounds[self.round as usize][stop.0 as usize] = StdArrival { time, arrived_by };
        let reached = &mut self.first_reached_round[stop.0 as usize];
        if reached.is_none() {
            *reached = Some(self.round as u8);
        }
        self.marks.mark(stop);
        ev.stop_arrival(stop, self.round, time, Outcome::Accepted);
        true
    }
}

impl<D: Direction> RoutingStrategy<D> for StdState<D> {
    fn begin_iteration(&mut self) {
        self.onboard = None;
        self.marks.clear();
        self.transit_set.clear();
    }

    fn begin_round(&mut self, round: Round) {
        self.round = round;
        self.ensure_round(round);
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
        let time = D::shift(departure, leg.duration());
        self.try_overall(ctx, ev, leg.stop(), time, StdPrev::Access { departure });
    }

    fn prepare_pattern(&mut self) {
        self.onboard = None;
    }

    fn alight_at(&mut self, ctx: &SearchCtx, ev: &mut DebugListeners, pattern: PatternIdx, pos: usize) {
        let Some(ride) = self.onboard else {
            return;
        };
        if !D::is_downstream(ride.board_pos, pos) {
            return;
        }
        let p = ctx.net.pattern(pattern);
        let stop = p.stop_at(pos);
        let raw = D::ride_arrival(p.timetable(), ride.trip, ride.board_pos, pos);
        let time = D::shift(raw, ctx.slack.alight_slack(p.slack_index()));

        if !D::is_before(time, self.best_transit[stop.0 as usize]) || self.pruned(ctx, stop, time) {
            ev.stop_arrival(stop, self.round, time, Outcome::Rejected);
            return;
        }
        let arrived_by = StdPrev::Transit {
            pattern,
            board_stop: ride.board_stop,
            board_time: ride.board_time,
        };
        self.best_transit[stop.0 as usize] = time;
        self.transit_rounds[self.round as usize][stop.0 as usize] = StdArrival { time, arrived_by };
        self.transit_set.mark(stop);
        self.try_overall(ctx, ev, stop, time, arrived_by);
    }

    fn board_at(&mut self, ctx: &SearchCtx, ev: &mut DebugListeners, pattern: PatternIdx, pos: usize) {
        let p = ctx.net.pattern(pattern);
        let stop = p.stop_at(pos);
        let prev = self.rounds[self.round as usize - 1][stop.0 as usize];
        if prev.time == D::unreached() {
            return;
        }
        let tt = p.timetable();
        let limit = D::shift(prev.time, ctx.slack.board_slack(p.slack_index()));
        let Some(boarding) = D::find_boarding(tt, pos, limit) else {
            return;
        };
        let reboard = match self.onboard {
            None => true,
            Some(current) => D::is_before(
                boarding.time,
                D::ride_departure(tt, current.trip, current.board_pos, pos),
            ),
        };
        if reboard {
            self.onboard = Some(OnboardRide {
                trip: boarding.trip,
                board_pos: pos,
                board_stop: stop,
                board_time: boarding.time,
            });
            ev.pattern_ride(pattern, stop, boarding.time, Outcome::Accepted);
        } else {
            ev.pattern_ride(pattern, stop, boarding.time, Outcome::Rejected);
        }
    }

    fn transfer_arrival(
        &mut self,
        ctx: &SearchCtx,
        ev: &mut DebugListeners,
        from: StopIdx,
        transfer: &Transfer,
    ) {
        // Foot transfers chain off transit arrivals only; two walks in a
        // row never improve a standard search.
        let source = self.transit_rounds[self.round as usize][from.0 as usize];
        if source.time == D::unreached() {
            return;
        }
        let time = D::shift(source.time, transfer.duration);
        self.try_overall(ctx, ev, transfer.to, time, StdPrev::Transfer { from });
    }

    fn egress_arrival(
        &mut self,
        ctx: &SearchCtx,
        _ev: &mut DebugListeners,
        _leg_idx: u32,
        leg: &AccessEgress,
    ) {
        let source = self.transit_rounds[self.round as usize][leg.stop().0 as usize];
        if source.time == D::unreached() {
            return;
        }
        let display_time = D::shift(source.time, leg.limit_duration());
        if let Some(limit) = ctx.arrival_limit {
            // Time penalties are excluded from the boundary check.
            if D::is_before(limit, display_time) {
                return;
            }
        }
        let time = D::shift(source.time, leg.duration());
        let slot = &mut self.dest_per_round[self.round as usize];
        if slot.map_or(true, |d| D::is_before(time, d.time)) {
            *slot = Some(StdDest {
                time,
                display_time,
                stop: leg.stop(),
            });
        }
        if D::is_before(time, self.best_dest_time) {
            self.best_dest_time = time;
        }
        self.destination_reached = true;
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

    fn end_iteration(&mut self, _ctx: &SearchCtx, ev: &mut DebugListeners) {
        if self.collect_paths {
            // At most one path per round; a round only yields one if it
            // improves on every lower round of this iteration.
            let mut best_so_far: Option<Time> = None;
            for round in 1..self.dest_per_round.len() {
                let Some(dest) = self.dest_per_round[round] else {
                    continue;
                };
                if best_so_far.is_none_or(|b| D::is_before(dest.time, b)) {
                    best_so_far = Some(dest.time);
                    let path = self.extract_path(round as Round, &dest);
                    ev.path(path.arrival, path.num_transfers, Outcome::Accepted);
                    self.paths.push(path);
                }
            }
        }
        self.dest_per_round.iter_mut().for_each(|d| *d = None);
    }

    fn destination_reached(&self) -> bool {
        self.destination_reached
    }
}

impl<D: Direction> StdState<D> {
    /// Walks the arrival chain backward from a destination arrival and
    /// materializes one leg per hop, in chronological order.
    fn extract_path(&self, round: Round, dest: &StdDest) -> Path {
        let mut walked: Vec<Leg> = Vec::new();
        let mut r = round as usize;
        let mut stop = dest.stop;
        let mut arrival = self.transit_rounds[r][stop.0 as usize];

        // In a reverse search the walk starts at the real origin side, so
        // the destination-side leg of the worker is the real access walk.
        walked.push(if D::IS_FORWARD {
            Leg::Egress {
                stop,
                departure: arrival.time,
                arrival: dest.display_time,
            }
        } else {
            Leg::Access {
                stop,
                departure: dest.display_time,
                arrival: arrival.time,
            }
        });

        loop {
            match arrival.arrived_by {
                StdPrev::Transit {
                    pattern,
                    board_stop,
                    board_time,
                } => {
                    walked.push(if D::IS_FORWARD {
                        Leg::Transit {
                            pattern,
                            board_stop,
                            alight_stop: stop,
                            board_time,
                            alight_time: arrival.time,
                        }
                    } else {
                        Leg::Transit {
                            pattern,
                            board_stop: stop,
                            alight_stop: board_stop,
                            board_time: arrival.time,
                            alight_time: board_time,
                        }
                    });
                    r -= 1;
                    stop = board_stop;
                    arrival = self.rounds[r][stop.0 as usize];
                }
                StdPrev::Transfer { from } => {
                    let source = self.transit_rounds[r][from.0 as usize];
                    walked.push(if D::IS_FORWARD {
                        Leg::Transfer {
                            from,
                            to: stop,
                            departure: source.time,
                            arrival: arrival.time,
                        }
                    } else {
                        Leg::Transfer {
                            from: stop,
                            to: from,
                            departure: arrival.time,
                            arrival: source.time,
                        }
                    });
                    stop = from;
                    arrival = source;
                }
                StdPrev::Access { departure } => {
                    walked.push(if D::IS_FORWARD {
                        Leg::Access {
                            stop,
                            departure,
                            arrival: arrival.time,
                        }
                    } else {
                        Leg::Egress {
                            stop,
                            departure: arrival.time,
                            arrival: departure,
                        }
                    });
                    break;
                }
                StdPrev::None => {
                    panic!("arrival chain of {:?} broke at {:?}", dest.stop, stop);
                }
            }
        }

        // A forward back-walk runs destination to origin; a reverse one
        // is already chronological.
        if D::IS_FORWARD {
            walked.reverse();
        }
        Path::from_legs(walked, 0, 0)
    }
}
