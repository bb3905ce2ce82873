use std::cmp::Ordering;
use std::fmt::{self, Display};

use crate::events::{DebugListeners, Outcome};
use crate::network::{PatternIdx, StopIdx};
use crate::primitives::{fmt_time, Cost, DurationSec, Time};

/// One hop of a reconstructed itinerary, in chronological order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Leg {
    Access {
        stop: StopIdx,
        departure: Time,
        arrival: Time,
    },
    Transit {
        pattern: PatternIdx,
        board_stop: StopIdx,
        alight_stop: StopIdx,
        board_time: Time,
        alight_time: Time,
    },
    Transfer {
        from: StopIdx,
        to: StopIdx,
        departure: Time,
        arrival: Time,
    },
    Egress {
        stop: StopIdx,
        departure: Time,
        arrival: Time,
    },
}

/// A complete itinerary, immutable once extracted. Paths are compared by
/// stop sequence and criteria vector, never by identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub legs: Vec<Leg>,
    pub departure: Time,
    pub arrival: Time,
    pub num_transfers: u32,
    pub c1: Cost,
    pub c2: u32,
}

impl Path {
    /// Builds a path from chronological legs, deriving the summary
    /// fields. Panics on an empty leg list — extraction never produces
    /// one.
    pub fn from_legs(legs: Vec<Leg>, c1: Cost, c2: u32) -> Self {
        assert!(!legs.is_empty(), "path without legs");
        let departure = match legs.first().unwrap() {
            Leg::Access { departure, .. }
            | Leg::Transfer { departure, .. }
            | Leg::Egress { departure, .. } => *departure,
            Leg::Transit { board_time, .. } => *board_time,
        };
        let arrival = match legs.last().unwrap() {
            Leg::Access { arrival, .. }
            | Leg::Transfer { arrival, .. }
            | Leg::Egress { arrival, .. } => *arrival,
            Leg::Transit { alight_time, .. } => *alight_time,
        };
        let rides = legs
            .iter()
            .filter(|l| matches!(l, Leg::Transit { .. }))
            .count() as u32;
        Self {
            legs,
            departure,
            arrival,
            num_transfers: rides.saturating_sub(1),
            c1,
            c2,
        }
    }

    pub fn duration(&self) -> DurationSec {
        self.arrival - self.departure
    }

    /// Boarding/alighting stops in travel order, the dedup key together
    /// with the criteria vector.
    pub fn stop_sequence(&self) -> Vec<StopIdx> {
        let mut stops = Vec::new();
        for leg in &self.legs {
            match *leg {
                Leg::Access { stop, .. } => stops.push(stop),
                Leg::Transit {
                    board_stop,
                    alight_stop,
                    ..
                } => {
                    if stops.last() != Some(&board_stop) {
                        stops.push(board_stop);
                    }
                    stops.push(alight_stop);
                }
                Leg::Transfer { to, .. } => stops.push(to),
                Leg::Egress { stop, .. } => {
                    if stops.last() != Some(&stop) {
                        stops.push(stop);
                    }
                }
            }
        }
        stops
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} .. {} ({}s, {} transfers)",
            fmt_time(self.departure),
            fmt_time(self.arrival),
            self.duration(),
            self.num_transfers
        )?;
        for leg in &self.legs {
            match *leg {
                Leg::Access { stop, .. } => write!(f, " walk>{:?}", stop)?,
                Leg::Transit {
                    pattern,
                    alight_stop,
                    board_time,
                    alight_time,
                    ..
                } => write!(
                    f,
                    " [{:?} {}-{}]>{:?}",
                    pattern,
                    fmt_time(board_time),
                    fmt_time(alight_time),
                    alight_stop
                )?,
                Leg::Transfer { to, .. } => write!(f, " walk>{:?}", to)?,
                Leg::Egress { .. } => write!(f, " walk>dest")?,
            }
        }
        Ok(())
    }
}

/// The fixed path ordering that makes result lists reproducible: by
/// arrival, number of transfers, generalized cost, c2, latest departure
/// first, then the stop sequence as the final tie-break.
pub fn path_cmp(a: &Path, b: &Path) -> Ordering {
    a.arrival
        .cmp(&b.arrival)
        .then_with(|| a.num_transfers.cmp(&b.num_transfers))
        .then_with(|| a.c1.cmp(&b.c1))
        .then_with(|| a.c2.cmp(&b.c2))
        .then_with(|| b.departure.cmp(&a.departure))
        .then_with(|| a.stop_sequence().cmp(&b.stop_sequence()))
}

fn same_journey(a: &Path, b: &Path) -> bool {
    a.arrival == b.arrival
        && a.departure == b.departure
        && a.num_transfers == b.num_transfers
        && a.c1 == b.c1
        && a.c2 == b.c2
        && a.stop_sequence() == b.stop_sequence()
}

/// Sorts deterministically and removes journeys equal in stop sequence
/// and criteria vector.
pub fn sort_and_dedup(paths: &mut Vec<Path>, events: &mut DebugListeners) {
    paths.sort_by(path_cmp);
    let mut kept: Vec<Path> = Vec::with_capacity(paths.len());
    for path in paths.drain(..) {
        if kept.last().is_some_and(|prev| same_journey(prev, &path)) {
            events.path(path.arrival, path.num_transfers, Outcome::Dropped);
            continue;
        }
        events.path(path.arrival, path.num_transfers, Outcome::Accepted);
        kept.push(path);
    }
    *paths = kept;
}

/// Default merge of two path collections: union, deterministic order,
/// duplicates removed.
pub fn merge_paths(mut a: Vec<Path>, mut b: Vec<Path>) -> Vec<Path> {
    a.append(&mut b);
    let mut events = DebugListeners::default();
    sort_and_dedup(&mut a, &mut events);
    a
}
