use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::debug;

use crate::access::AccessEgress;
use crate::cost::CostCalculator;
use crate::direction::Direction;
use crate::events::DebugListeners;
use crate::heuristic::Heuristics;
use crate::network::{PatternIdx, StopIdx, TransitData, Transfer};
use crate::primitives::{Round, Time};
use crate::slack::SlackProvider;

/// Cooperative cancellation flag shared between a request-level timeout
/// watchdog and the running searches. Checked at round boundaries only;
/// a fired token never corrupts state, it just stops the search early.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Read-only search environment handed to the routing strategy on every
/// call. Rebuilt per phase; strategies never store it.
pub struct SearchCtx<'a> {
    pub net: &'a dyn TransitData,
    pub slack: &'a dyn SlackProvider,
    pub cost: &'a CostCalculator,
    pub heuristics: Option<&'a Heuristics>,
    pub round: Round,
    /// Direction-wise arrival boundary for destination arrivals
    /// (latest-arrival forward, earliest-departure reverse). Time
    /// penalties are excluded from this check.
    pub arrival_limit: Option<Time>,
}

/// The per-stop/per-round state variant driven by the worker: one best
/// label (standard) or a Pareto set (multi-criteria) per stop.
///
/// The worker owns the round structure; the strategy owns all arrival
/// state, including which stops improved. Infeasible candidates simply
/// create no state — absence of a label is the only signal.
pub trait RoutingStrategy<D: Direction> {
    /// New range-raptor iteration; previous arrivals are kept and may
    /// only improve.
    fn begin_iteration(&mut self);

    fn begin_round(&mut self, round: Round);

    /// Seed one access leg; `departure` is already time-shifted.
    fn access_arrival(
        &mut self,
        ctx: &SearchCtx,
        ev: &mut DebugListeners,
        leg_idx: u32,
        leg: &AccessEgress,
        departure: Time,
    );

    /// Forget any onboard state from the previous pattern.
    fn prepare_pattern(&mut self);

    /// Offer arrivals at this position from every ride boarded upstream.
    fn alight_at(&mut self, ctx: &SearchCtx, ev: &mut DebugListeners, pattern: PatternIdx, pos: usize);

    /// Try to board at this position from the previous round's arrivals.
    fn board_at(&mut self, ctx: &SearchCtx, ev: &mut DebugListeners, pattern: PatternIdx, pos: usize);

    /// Offer a foot transfer from a stop improved by transit this round.
    fn transfer_arrival(
        &mut self,
        ctx: &SearchCtx,
        ev: &mut DebugListeners,
        from: StopIdx,
        transfer: &Transfer,
    );

    /// Offer a destination arrival through an egress leg whose stop
    /// improved this round.
    fn egress_arrival(
        &mut self,
        ctx: &SearchCtx,
        ev: &mut DebugListeners,
        leg_idx: u32,
        leg: &AccessEgress,
    );

    /// Stops improved by transit in the current round, for the transfer
    /// phase.
    fn transit_marks(&self) -> Vec<StopIdx>;

    fn is_marked(&self, stop: StopIdx) -> bool;

    /// Ends the round, returning and clearing all improved stops. An
    /// empty result terminates the iteration.
    fn finish_round(&mut self) -> Vec<StopIdx>;

    /// Ends the iteration (standard mode extracts this iteration's
    /// paths here, before the next departure time overwrites state).
    fn end_iteration(&mut self, ctx: &SearchCtx, ev: &mut DebugListeners);

    fn destination_reached(&self) -> bool;
}

/// Drives range-raptor rounds over one direction and one strategy:
/// access seeding, transit riding per pattern, foot transfers, and the
/// no-improvement/max-rounds termination check.
pub struct RaptorWorker<'a, D: Direction, S: RoutingStrategy<D>> {
    net: &'a dyn TransitData,
    slack: &'a dyn SlackProvider,
    cost: &'a CostCalculator,
    heuristics: Option<&'a Heuristics>,
    strategy: S,
    events: DebugListeners<'a>,
    access: Vec<AccessEgress>,
    egress: Vec<AccessEgress>,
    max_rounds: usize,
    arrival_limit: Option<Time>,
    cancel: Option<CancelToken>,
    round_observers: Vec<Box<dyn FnMut(Round) + 'a>>,
    prev_flags: Vec<bool>,
    pattern_seen: Vec<bool>,
    _direction: PhantomData<D>,
}

impl<'a, D: Direction, S: RoutingStrategy<D>> RaptorWorker<'a, D, S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        net: &'a dyn TransitData,
        slack: &'a dyn SlackProvider,
        cost: &'a CostCalculator,
        heuristics: Option<&'a Heuristics>,
        strategy: S,
        access: Vec<AccessEgress>,
        egress: Vec<AccessEgress>,
        max_rounds: usize,
        arrival_limit: Option<Time>,
        cancel: Option<CancelToken>,
    ) -> Self {
        let num_stops = net.num_stops();
        let num_patterns = net.num_patterns();
        Self {
            net,
            slack,
            cost,
            heuristics,
            strategy,
            events: DebugListeners::default(),
            access,
            egress,
            max_rounds,
            arrival_limit,
            cancel,
            round_observers: Vec::new(),
            prev_flags: vec![false; num_stops],
            pattern_seen: vec![false; num_patterns],
            _direction: PhantomData,
        }
    }

    pub fn set_listeners(&mut self, events: DebugListeners<'a>) {
        self.events = events;
    }

    /// Registers a round-lifecycle observer, called at the start of each
    /// round. The list is empty by default and costs nothing then.
    pub fn add_round_observer(&mut self, observer: Box<dyn FnMut(Round) + 'a>) {
        self.round_observers.push(observer);
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn into_strategy(self) -> S {
        self.strategy
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }

    fn ctx(&self, round: Round) -> SearchCtx<'a> {
        SearchCtx {
            net: self.net,
            slack: self.slack,
            cost: self.cost,
            heuristics: self.heuristics,
            round,
            arrival_limit: self.arrival_limit,
        }
    }

    fn notify_round(&mut self, round: Round) {
        self.slack.round_changed(round);
        for observer in &mut self.round_observers {
            observer(round);
        }
        self.strategy.begin_round(round);
    }

    /// Runs one whole search: one range-raptor iteration per departure
    /// time, latest first. Returns true if the search was cancelled.
    pub fn route(&mut self, departure_times: &[Time]) -> bool {
        for &departure in departure_times {
            if self.is_cancelled() {
                return true;
            }
            if self.run_iteration(departure) {
                return true;
            }
        }
        false
    }

    fn run_iteration(&mut self, departure: Time) -> bool {
        self.strategy.begin_iteration();
        self.notify_round(0);
        let ctx = self.ctx(0);
        for (leg_idx, leg) in self.access.iter().enumerate() {
            // Infeasible legs are skipped, not errors.
            if let Some(shifted) = D::leg_departure(leg, departure) {
                self.strategy
                    .access_arrival(&ctx, &mut self.events, leg_idx as u32, leg, shifted);
            }
        }
        let mut marked = self.strategy.finish_round();

        for round in 1..=self.max_rounds as Round {
            if marked.is_empty() {
                break;
            }
            if self.is_cancelled() {
                debug!("Search cancelled in round {}", round);
                return true;
            }
            self.notify_round(round);
            let ctx = self.ctx(round);

            for &stop in &marked {
                self.prev_flags[stop.0 as usize] = true;
            }

            let net = self.net;
            let patterns = self.touched_patterns(&marked);
            for &pattern in &patterns {
                self.strategy.prepare_pattern();
                let num_stops = net.pattern(pattern).num_stops();
                for pos in D::positions(num_stops) {
                    let stop = net.pattern(pattern).stop_at(pos);
                    self.strategy.alight_at(&ctx, &mut self.events, pattern, pos);
                    if self.prev_flags[stop.0 as usize] {
                        self.strategy.board_at(&ctx, &mut self.events, pattern, pos);
                    }
                }
            }

            for &stop in &marked {
                self.prev_flags[stop.0 as usize] = false;
            }

            // Transfers, including the implicit zero-length transfer that
            // allows reboarding at the alighting stop next round.
            let transit_marked = self.strategy.transit_marks();
            for &stop in &transit_marked {
                let same_stop = Transfer {
                    to: stop,
                    duration: 0,
                    c1: 0,
                };
                self.strategy
                    .transfer_arrival(&ctx, &mut self.events, stop, &same_stop);
                for transfer in net.transfers_from(stop) {
                    self.strategy
                        .transfer_arrival(&ctx, &mut self.events, stop, transfer);
                }
            }

            for (leg_idx, leg) in self.egress.iter().enumerate() {
                if self.strategy.is_marked(leg.stop()) {
                    self.strategy
                        .egress_arrival(&ctx, &mut self.events, leg_idx as u32, leg);
                }
            }

            marked = self.strategy.finish_round();
        }

        let ctx = self.ctx(0);
        self.strategy.end_iteration(&ctx, &mut self.events);
        false
    }

    /// Unique patterns visiting any of the given stops.
    fn touched_patterns(&mut self, stops: &[StopIdx]) -> Vec<PatternIdx> {
        let mut patterns = Vec::new();
        for &stop in stops {
            for &pattern in self.net.patterns_at_stop(stop) {
                let seen = &mut self.pattern_seen[pattern.0 as usize];
                if !*seen {
                    *seen = true;
                    patterns.push(pattern);
                }
            }
        }
        for &pattern in &patterns {
            self.pattern_seen[pattern.0 as usize] = false;
        }
        patterns
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::access::AccessEgress;
    use crate::cost::{CostCalculator, CostParams};
    use crate::direction::Forward;
    use crate::network::ExtStopId;
    use crate::slack::{DefaultSlackSource, ForwardSlack};
    use crate::state::standard::StdState;
    use crate::test::sample::create_sample;

    #[test]
    fn round_observers_see_every_round_once() {
        let (net, idx) = create_sample();
        let slack = ForwardSlack::new(DefaultSlackSource::uniform(0, 0, 0));
        let calculator = CostCalculator::new(&CostParams::default());
        let access = vec![AccessEgress::new(idx[&ExtStopId(0)], 300)];
        let egress = vec![AccessEgress::new(idx[&ExtStopId(5)], 240)];

        let rounds: RefCell<Vec<Round>> = RefCell::new(Vec::new());
        let mut worker = RaptorWorker::<Forward, _>::new(
            &net,
            &slack,
            &calculator,
            None,
            StdState::<Forward>::new(7, false),
            access,
            egress,
            12,
            None,
            None,
        );
        worker.add_round_observer(Box::new(|round| rounds.borrow_mut().push(round)));

        let cancelled = worker.route(&[28_500]);
        assert!(!cancelled);
        // Round 0 (access), three transit rounds, then convergence.
        assert_eq!(*rounds.borrow(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn a_fired_token_stops_the_search_between_rounds() {
        let (net, idx) = create_sample();
        let slack = ForwardSlack::new(DefaultSlackSource::uniform(0, 0, 0));
        let calculator = CostCalculator::new(&CostParams::default());
        let access = vec![AccessEgress::new(idx[&ExtStopId(0)], 300)];
        let egress = vec![AccessEgress::new(idx[&ExtStopId(5)], 240)];

        let token = CancelToken::new();
        token.cancel();
        let mut worker = RaptorWorker::<Forward, _>::new(
            &net,
            &slack,
            &calculator,
            None,
            StdState::<Forward>::new(7, true),
            access,
            egress,
            12,
            None,
            Some(token),
        );
        assert!(worker.route(&[28_500]));
    }
}
