use std::fmt::Debug;

use itertools::Itertools;
use log::info;

use crate::col::{map_new, map_with_capacity, HashMap};
use crate::primitives::{Cost, DurationSec, Time};
use crate::timetable::{FrequencyEntry, Timetable, TripSchedule};

/// Dense stop index. All per-stop search state lives in flat arrays
/// indexed by this value, never keyed by object identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StopIdx(pub u32);
impl Debug for StopIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("s#{}", self.0))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatternIdx(pub u32);
impl Debug for PatternIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("r#{}", self.0))
    }
}

/// Slack/cost class of a pattern (typically one per transit mode).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlackIdx(pub u32);
impl Debug for SlackIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("g#{}", self.0))
    }
}

/// Ordered stop sequence shared by all trips of one service variant.
#[derive(Debug)]
pub struct TripPattern {
    stops: Box<[StopIdx]>,
    slack_index: SlackIdx,
    /// Transit-group bit carried into c2 on boarding. 0 when the pattern
    /// belongs to no group.
    group_bit: u32,
    timetable: Timetable,
}

impl TripPattern {
    pub fn new(
        stops: Vec<StopIdx>,
        slack_index: SlackIdx,
        group_bit: u32,
        timetable: Timetable,
    ) -> Self {
        Self {
            stops: stops.into_boxed_slice(),
            slack_index,
            group_bit,
            timetable,
        }
    }

    pub fn num_stops(&self) -> usize {
        self.stops.len()
    }

    pub fn stop_at(&self, pos: usize) -> StopIdx {
        self.stops[pos]
    }

    pub fn stops(&self) -> &[StopIdx] {
        &self.stops
    }

    /// First position of `stop` in the pattern, if visited at all.
    pub fn position_of(&self, stop: StopIdx) -> Option<usize> {
        self.stops.iter().position(|&s| s == stop)
    }

    pub fn slack_index(&self) -> SlackIdx {
        self.slack_index
    }

    pub fn group_bit(&self) -> u32 {
        self.group_bit
    }

    pub fn timetable(&self) -> &Timetable {
        &self.timetable
    }
}

/// Precomputed foot path between two stops.
#[derive(Debug, Clone)]
pub struct Transfer {
    pub to: StopIdx,
    pub duration: DurationSec,
    pub c1: Cost,
}

/// Read-only snapshot of the transit network consumed by a search. Any
/// number of concurrent searches may share one instance; nothing here is
/// ever mutated after construction.
pub trait TransitData: Sync {
    fn num_stops(&self) -> usize;
    fn num_patterns(&self) -> usize;
    fn pattern(&self, idx: PatternIdx) -> &TripPattern;
    /// Patterns visiting a stop, for the boarding scan.
    fn patterns_at_stop(&self, stop: StopIdx) -> &[PatternIdx];
    fn transfers_from(&self, stop: StopIdx) -> &[Transfer];
}

// --- External (pre-index) description of the network ------------------

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtStopId(pub u32);
impl Debug for ExtStopId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("_s#{}", self.0))
    }
}

#[derive(Debug, Clone)]
pub struct ExtStopTime {
    pub stop: ExtStopId,
    pub arrival: Time,
    pub departure: Time,
}

#[derive(Debug, Clone)]
pub struct ExtTrip {
    /// Trips with equal route id and equal stop sequence share a pattern.
    pub route: u32,
    pub slack_class: u32,
    pub group_bit: u32,
    pub stop_times: Vec<ExtStopTime>,
}

#[derive(Debug, Clone)]
pub struct ExtFrequencyTrip {
    pub trip: ExtTrip,
    pub start: Time,
    pub end: Time,
    pub headway: DurationSec,
    pub exact: bool,
}

#[derive(Debug, Clone)]
pub struct ExtTransfer {
    pub from: ExtStopId,
    pub to: ExtStopId,
    pub duration: DurationSec,
    pub c1: Cost,
}

#[derive(Debug)]
pub enum NetworkError {
    TripTooShort { route: u32 },
    NonMonotonicTimes { route: u32, position: usize },
    NegativeTransferDuration { from: ExtStopId, to: ExtStopId },
    UnknownTransferStop { stop: ExtStopId },
}

/// In-memory [TransitData] implementation, built once per timetable
/// snapshot and shared read-only between searches.
#[derive(Debug)]
pub struct TransitNetwork {
    patterns: Vec<TripPattern>,
    patterns_at_stop: Vec<Vec<PatternIdx>>,
    transfers: Vec<Vec<Transfer>>,
    num_stops: usize,
}

impl TransitData for TransitNetwork {
    fn num_stops(&self) -> usize {
        self.num_stops
    }

    fn num_patterns(&self) -> usize {
        self.patterns.len()
    }

    fn pattern(&self, idx: PatternIdx) -> &TripPattern {
        &self.patterns[idx.0 as usize]
    }

    fn patterns_at_stop(&self, stop: StopIdx) -> &[PatternIdx] {
        &self.patterns_at_stop[stop.0 as usize]
    }

    fn transfers_from(&self, stop: StopIdx) -> &[Transfer] {
        &self.transfers[stop.0 as usize]
    }
}

fn validate_trip(trip: &ExtTrip) -> Result<(), NetworkError> {
    if trip.stop_times.len() < 2 {
        return Err(NetworkError::TripTooShort { route: trip.route });
    }
    for (pos, pair) in trip.stop_times.windows(2).enumerate() {
        let ok = pair[0].arrival <= pair[0].departure && pair[0].departure <= pair[1].arrival;
        if !ok {
            return Err(NetworkError::NonMonotonicTimes {
                route: trip.route,
                position: pos,
            });
        }
    }
    let last = trip.stop_times.last().unwrap();
    if last.arrival > last.departure {
        return Err(NetworkError::NonMonotonicTimes {
            route: trip.route,
            position: trip.stop_times.len() - 1,
        });
    }
    Ok(())
}

fn schedule_of(trip: &ExtTrip, stop_idx: &HashMap<ExtStopId, StopIdx>) -> (Vec<StopIdx>, TripSchedule) {
    let stops = trip
        .stop_times
        .iter()
        .map(|st| stop_idx[&st.stop])
        .collect_vec();
    let board = trip.stop_times.iter().map(|st| st.departure).collect_vec();
    let alight = trip.stop_times.iter().map(|st| st.arrival).collect_vec();
    (stops, TripSchedule::new(board, alight))
}

impl TransitNetwork {
    /// Indexes external trips, frequency trips and transfers into the
    /// flat pattern/stop arrays the search operates on. Returns the
    /// network together with the external-to-dense stop id mapping.
    pub fn create(
        trips: Vec<ExtTrip>,
        frequency_trips: Vec<ExtFrequencyTrip>,
        transfers: Vec<ExtTransfer>,
    ) -> Result<(Self, HashMap<ExtStopId, StopIdx>), NetworkError> {
        for trip in &trips {
            validate_trip(trip)?;
        }
        for freq in &frequency_trips {
            validate_trip(&freq.trip)?;
        }

        let mut stop_ids = trips
            .iter()
            .chain(frequency_trips.iter().map(|f| &f.trip))
            .flat_map(|t| t.stop_times.iter().map(|st| st.stop))
            .collect_vec();
        stop_ids.sort_by_key(|id| id.0);
        stop_ids.dedup();

        let stop_idx: HashMap<ExtStopId, StopIdx> = stop_ids
            .iter()
            .enumerate()
            .map(|(i, &ext)| (ext, StopIdx(i as u32)))
            .collect();
        let num_stops = stop_idx.len();

        // Group trips by (route, stop sequence) into patterns.
        type PatternKey = (u32, Vec<StopIdx>);
        let mut pattern_by_key: HashMap<PatternKey, usize> = map_with_capacity(trips.len());
        let mut scheduled: Vec<(SlackIdx, u32, Vec<StopIdx>, Vec<TripSchedule>, Vec<FrequencyEntry>)> =
            Vec::new();

        let mut add_trip = |trip: &ExtTrip, freq: Option<&ExtFrequencyTrip>| {
            let (stops, schedule) = schedule_of(trip, &stop_idx);
            let key = (trip.route, stops.clone());
            let entry = *pattern_by_key.entry(key).or_insert_with(|| {
                scheduled.push((
                    SlackIdx(trip.slack_class),
                    trip.group_bit,
                    stops,
                    Vec::new(),
                    Vec::new(),
                ));
                scheduled.len() - 1
            });
            match freq {
                None => scheduled[entry].3.push(schedule),
                Some(f) => scheduled[entry].4.push(FrequencyEntry::new(
                    f.start, f.end, f.headway, f.exact, schedule,
                )),
            }
        };
        for trip in &trips {
            add_trip(trip, None);
        }
        for freq in &frequency_trips {
            add_trip(&freq.trip, Some(freq));
        }

        let patterns = scheduled
            .into_iter()
            .map(|(slack_index, group_bit, stops, trips, frequencies)| {
                TripPattern::new(stops, slack_index, group_bit, Timetable::new(trips, frequencies))
            })
            .collect_vec();

        let mut patterns_at_stop: Vec<Vec<PatternIdx>> = vec![Vec::new(); num_stops];
        for (p_idx, pattern) in patterns.iter().enumerate() {
            for &stop in pattern.stops().iter().unique() {
                patterns_at_stop[stop.0 as usize].push(PatternIdx(p_idx as u32));
            }
        }

        let mut transfer_lists: Vec<Vec<Transfer>> = vec![Vec::new(); num_stops];
        for tr in &transfers {
            if tr.duration < 0 {
                return Err(NetworkError::NegativeTransferDuration {
                    from: tr.from,
                    to: tr.to,
                });
            }
            let from = *stop_idx
                .get(&tr.from)
                .ok_or(NetworkError::UnknownTransferStop { stop: tr.from })?;
            let to = *stop_idx
                .get(&tr.to)
                .ok_or(NetworkError::UnknownTransferStop { stop: tr.to })?;
            transfer_lists[from.0 as usize].push(Transfer {
                to,
                duration: tr.duration,
                c1: tr.c1,
            });
        }

        info!(
            "Indexed transit network: {} stops, {} patterns, {} transfers",
            num_stops,
            patterns.len(),
            transfers.len()
        );

        Ok((
            Self {
                patterns,
                patterns_at_stop,
                transfers: transfer_lists,
                num_stops,
            },
            stop_idx,
        ))
    }

    pub fn patterns(&self) -> impl Iterator<Item = (PatternIdx, &TripPattern)> {
        self.patterns
            .iter()
            .enumerate()
            .map(|(i, p)| (PatternIdx(i as u32), p))
    }

    /// Reverse lookup for callers holding only external ids.
    pub fn stop_lookup(stop_idx: &HashMap<ExtStopId, StopIdx>) -> HashMap<StopIdx, ExtStopId> {
        let mut rev = map_new();
        for (&ext, &idx) in stop_idx {
            rev.insert(idx, ext);
        }
        rev
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip(route: u32, stops: &[(u32, Time, Time)]) -> ExtTrip {
        ExtTrip {
            route,
            slack_class: 0,
            group_bit: 0,
            stop_times: stops
                .iter()
                .map(|&(s, arr, dep)| ExtStopTime {
                    stop: ExtStopId(s),
                    arrival: arr,
                    departure: dep,
                })
                .collect(),
        }
    }

    #[test]
    fn trips_with_equal_stop_sequence_share_a_pattern() {
        let (net, idx) = TransitNetwork::create(
            vec![
                trip(7, &[(0, 100, 100), (1, 200, 210), (2, 300, 300)]),
                trip(7, &[(0, 400, 400), (1, 500, 510), (2, 600, 600)]),
                trip(7, &[(0, 150, 150), (2, 450, 450)]),
            ],
            vec![],
            vec![],
        )
        .unwrap();

        assert_eq!(net.num_stops(), 3);
        assert_eq!(net.num_patterns(), 2);

        let s0 = idx[&ExtStopId(0)];
        assert_eq!(net.patterns_at_stop(s0).len(), 2);

        let three_stop = net
            .patterns()
            .find(|(_, p)| p.num_stops() == 3)
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(net.pattern(three_stop).timetable().trips().len(), 2);
        // Sorted by departure.
        assert_eq!(net.pattern(three_stop).timetable().trip(0).board_time(0), 100);
    }

    #[test]
    fn invalid_times_are_rejected() {
        let result = TransitNetwork::create(
            vec![trip(1, &[(0, 100, 100), (1, 90, 95)])],
            vec![],
            vec![],
        );
        assert!(matches!(
            result,
            Err(NetworkError::NonMonotonicTimes { route: 1, position: 0 })
        ));
    }

    #[test]
    fn transfers_are_indexed_by_origin_stop() {
        let (net, idx) = TransitNetwork::create(
            vec![trip(1, &[(0, 100, 100), (1, 200, 200)])],
            vec![],
            vec![ExtTransfer {
                from: ExtStopId(1),
                to: ExtStopId(0),
                duration: 120,
                c1: 240,
            }],
        )
        .unwrap();
        let s1 = idx[&ExtStopId(1)];
        assert_eq!(net.transfers_from(s1).len(), 1);
        assert_eq!(net.transfers_from(s1)[0].duration, 120);
    }
}
