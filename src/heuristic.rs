use itertools::Itertools;
use log::debug;

use crate::access::AccessEgress;
use crate::network::{StopIdx, TransitData};
use crate::primitives::{DurationSec, Time};
use crate::request::Profile;

const UNREACHABLE: DurationSec = DurationSec::MAX;
const NO_RIDES: u8 = u8::MAX;

/// Admissible per-stop lower bounds toward one side of the search (the
/// destination for pruning, the origin for window estimation). Produced
/// by a cheap single-criterion label-correcting sweep that rides the
/// fastest conceivable trip of every pattern and ignores slack, so the
/// bounds never exceed any realizable journey.
pub struct Heuristics {
    remaining_duration: Box<[DurationSec]>,
    remaining_rides: Box<[u8]>,
}

impl Heuristics {
    pub fn reachable(&self, stop: StopIdx) -> bool {
        self.remaining_duration[stop.0 as usize] != UNREACHABLE
    }

    pub fn remaining_duration(&self, stop: StopIdx) -> DurationSec {
        self.remaining_duration[stop.0 as usize]
    }

    pub fn remaining_rides(&self, stop: StopIdx) -> u8 {
        self.remaining_rides[stop.0 as usize]
    }

    /// Best conceivable overall duration between the two leg sets, used
    /// to estimate a missing search-time anchor.
    pub fn best_overall_duration(&self, opposite_legs: &[AccessEgress]) -> Option<DurationSec> {
        opposite_legs
            .iter()
            .filter(|leg| self.reachable(leg.stop()))
            .map(|leg| leg.limit_duration() + self.remaining_duration(leg.stop()))
            .min()
    }
}

/// Which heuristic searches must run for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeuristicToRun {
    Neither,
    Forward,
    Reverse,
    Both,
}

/// Decides the heuristic plan from the profile, the requested
/// optimizations and which time parameters are present.
///
/// Destination pruning mandates the reverse heuristic; a missing
/// earliest-departure-time needs the reverse bounds to estimate one; a
/// multi-criteria search without latest-arrival-time runs the forward
/// heuristic to bound the window. Without any time anchor a
/// non-multicriteria profile runs no heuristic at all.
pub fn resolve_heuristics(
    profile: Profile,
    destination_pruning: bool,
    has_edt: bool,
    has_lat: bool,
) -> HeuristicToRun {
    if !has_edt && !has_lat && profile != Profile::MultiCriteria {
        return HeuristicToRun::Neither;
    }
    let reverse = destination_pruning || !has_edt;
    let forward = profile == Profile::MultiCriteria && !has_lat;
    match (forward, reverse) {
        (false, false) => HeuristicToRun::Neither,
        (true, false) => HeuristicToRun::Forward,
        (false, true) => HeuristicToRun::Reverse,
        (true, true) => HeuristicToRun::Both,
    }
}

/// Propagation direction of the sweep. `TowardSeeds` yields, per stop,
/// a bound on reaching any seed from that stop (reverse heuristic);
/// `AwayFromSeeds` bounds reaching the stop from any seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sweep {
    TowardSeeds,
    AwayFromSeeds,
}

/// Minimum ride time between consecutive positions of a pattern, over
/// all scheduled trips and frequency templates.
fn min_leg_times(net: &dyn TransitData, pattern: crate::network::PatternIdx) -> Vec<DurationSec> {
    let p = net.pattern(pattern);
    let tt = p.timetable();
    let n = p.num_stops();
    (0..n.saturating_sub(1))
        .map(|pos| {
            let scheduled = tt
                .trips()
                .iter()
                .map(|t| t.alight_time(pos + 1) - t.board_time(pos));
            let frequency = tt
                .frequencies()
                .iter()
                .map(|f| f.template().alight_time(pos + 1) - f.template().board_time(pos));
            scheduled.chain(frequency).min().unwrap_or(UNREACHABLE).max(0)
        })
        .collect_vec()
}

/// Runs the label-correcting sweep to a fixpoint and returns the bounds.
pub fn compute_heuristics(
    net: &dyn TransitData,
    seeds: &[AccessEgress],
    sweep: Sweep,
) -> Heuristics {
    let n = net.num_stops();
    let mut duration = vec![UNREACHABLE; n];
    let mut rides = vec![NO_RIDES; n];
    for leg in seeds {
        let d = &mut duration[leg.stop().0 as usize];
        *d = (*d).min(leg.limit_duration());
        rides[leg.stop().0 as usize] = 0;
    }

    let legs_by_pattern = (0..net.num_patterns())
        .map(|i| min_leg_times(net, crate::network::PatternIdx(i as u32)))
        .collect_vec();

    let mut sweeps = 0usize;
    loop {
        let mut improved = false;
        for (p_raw, legs) in legs_by_pattern.iter().enumerate() {
            let pattern = net.pattern(crate::network::PatternIdx(p_raw as u32));
            let n_pos = pattern.num_stops();
            // Ride the fastest conceivable trip along the pattern. One
            // directional pass relaxes every (board, alight) pair.
            let mut carry_d = UNREACHABLE;
            let mut carry_r = NO_RIDES;
            let positions: Box<dyn Iterator<Item = usize>> = match sweep {
                Sweep::TowardSeeds => Box::new((0..n_pos).rev()),
                Sweep::AwayFromSeeds => Box::new(0..n_pos),
            };
            for pos in positions {
                let stop = pattern.stop_at(pos).0 as usize;
                if carry_d < duration[stop] {
                    duration[stop] = carry_d;
                    improved = true;
                }
                if carry_r < rides[stop] {
                    rides[stop] = carry_r;
                    improved = true;
                }
                let leg = match sweep {
                    Sweep::TowardSeeds => pos.checked_sub(1).map(|i| legs[i]),
                    Sweep::AwayFromSeeds => (pos + 1 < n_pos).then(|| legs[pos]),
                };
                if let Some(leg_time) = leg {
                    if leg_time != UNREACHABLE {
                        let from_here = duration[stop].min(carry_d);
                        carry_d = from_here.saturating_add(leg_time);
                        if rides[stop] != NO_RIDES {
                            carry_r = carry_r.min(rides[stop].saturating_add(1));
                        }
                    } else {
                        carry_d = UNREACHABLE;
                        carry_r = NO_RIDES;
                    }
                }
            }
        }
        // Foot transfers, both orientations: walking is symmetric enough
        // for a lower bound.
        for stop in 0..n {
            for tr in net.transfers_from(StopIdx(stop as u32)) {
                let to = tr.to.0 as usize;
                let (a, b) = (stop.min(to), stop.max(to));
                for (from, into) in [(a, b), (b, a)] {
                    if duration[into] != UNREACHABLE {
                        let candidate = duration[into].saturating_add(tr.duration);
                        if candidate < duration[from] {
                            duration[from] = candidate;
                            improved = true;
                        }
                    }
                    if rides[into] < rides[from] {
                        rides[from] = rides[into];
                        improved = true;
                    }
                }
            }
        }
        sweeps += 1;
        if !improved {
            break;
        }
    }
    debug!("Heuristic bounds converged after {} sweeps", sweeps);

    Heuristics {
        remaining_duration: duration.into_boxed_slice(),
        remaining_rides: rides.into_boxed_slice(),
    }
}

/// Estimates a missing earliest-departure-time from the latest arrival
/// and the reverse bounds.
pub fn estimate_earliest_departure(
    latest_arrival: Time,
    access: &[AccessEgress],
    reverse: &Heuristics,
) -> Option<Time> {
    reverse
        .best_overall_duration(access)
        .map(|d| latest_arrival - d)
}
