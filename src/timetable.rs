use crate::primitives::{DurationSec, Time, NO_DEPARTURE};

/// Immutable board/alight times of one vehicle run, indexed by
/// stop-position within its pattern.
///
/// Invariant for every position `i`:
/// `alight_time(i) <= board_time(i) <= alight_time(i + 1)`.
#[derive(Debug, Clone)]
pub struct TripSchedule {
    board_times: Box<[Time]>,
    alight_times: Box<[Time]>,
}

impl TripSchedule {
    pub fn new(board_times: Vec<Time>, alight_times: Vec<Time>) -> Self {
        assert_eq!(board_times.len(), alight_times.len());
        let schedule = Self {
            board_times: board_times.into_boxed_slice(),
            alight_times: alight_times.into_boxed_slice(),
        };
        debug_assert!(schedule.times_are_monotone());
        schedule
    }

    fn times_are_monotone(&self) -> bool {
        (0..self.num_stops()).all(|i| {
            self.alight_times[i] <= self.board_times[i]
                && (i + 1 == self.num_stops() || self.board_times[i] <= self.alight_times[i + 1])
        })
    }

    pub fn num_stops(&self) -> usize {
        self.board_times.len()
    }

    /// Departure time at a stop position.
    pub fn board_time(&self, pos: usize) -> Time {
        self.board_times[pos]
    }

    /// Arrival time at a stop position.
    pub fn alight_time(&self, pos: usize) -> Time {
        self.alight_times[pos]
    }
}

/// Headway-based trip generation over the stop offsets of a template
/// schedule. `start`/`end` bound the departures at the first stop
/// position; `exact` selects fixed departures at `start + k * headway`
/// over "expected wait of one headway" semantics.
#[derive(Debug, Clone)]
pub struct FrequencyEntry {
    start: Time,
    end: Time,
    headway: DurationSec,
    exact: bool,
    template: TripSchedule,
}

impl FrequencyEntry {
    pub fn new(
        start: Time,
        end: Time,
        headway: DurationSec,
        exact: bool,
        template: TripSchedule,
    ) -> Self {
        assert!(headway > 0, "frequency entry with non-positive headway");
        assert!(start <= end, "frequency entry with empty window");
        Self {
            start,
            end,
            headway,
            exact,
            template,
        }
    }

    pub fn template(&self) -> &TripSchedule {
        &self.template
    }

    fn board_offset(&self, pos: usize) -> DurationSec {
        self.template.board_time(pos) - self.template.board_time(0)
    }

    fn alight_offset(&self, pos: usize) -> DurationSec {
        self.template.alight_time(pos) - self.template.board_time(0)
    }

    /// Earliest generated departure at `pos` that is not before `after`,
    /// or [NO_DEPARTURE] once the window is exhausted.
    pub fn next_departure_time(&self, pos: usize, after: Time) -> Time {
        let offset = self.board_offset(pos);
        if !self.exact {
            // Expected wait of one headway, anywhere within the window.
            let at = (after - offset).max(self.start);
            return if at <= self.end {
                at + self.headway + offset
            } else {
                NO_DEPARTURE
            };
        }
        let k = if after - offset <= self.start {
            0
        } else {
            (after - offset - self.start + self.headway - 1) / self.headway
        };
        let departure_at_first_stop = self.start + k * self.headway;
        if departure_at_first_stop <= self.end {
            departure_at_first_stop + offset
        } else {
            NO_DEPARTURE
        }
    }

    /// Latest generated arrival at `pos` that is not after `before`, or
    /// [NO_DEPARTURE]. Mirror of [Self::next_departure_time] for the
    /// reverse search.
    pub fn prev_arrival_time(&self, pos: usize, before: Time) -> Time {
        let offset = self.alight_offset(pos);
        if !self.exact {
            let at = (before - offset).min(self.end);
            return if at - self.headway >= self.start {
                at - self.headway + offset
            } else {
                NO_DEPARTURE
            };
        }
        if before - offset < self.start {
            return NO_DEPARTURE;
        }
        let k = ((before - offset - self.start) / self.headway).min((self.end - self.start) / self.headway);
        self.start + k * self.headway + offset
    }
}

/// Reference to a boarded vehicle run: either a scheduled trip, or a
/// departure generated from a frequency entry. Frequency rides carry
/// the direction-side boarding time; the remaining stop times follow
/// from the template offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripRef {
    Scheduled(u32),
    Frequency { entry: u32, time: Time },
}

/// Result of a trip search: the trip to ride and the board-side time at
/// the searched position.
#[derive(Debug, Clone, Copy)]
pub struct TripBoarding {
    pub trip: TripRef,
    pub time: Time,
}

/// All vehicle runs of one trip pattern. Scheduled trips are sorted by
/// departure time at the first stop position; patterns are assumed
/// overtaking-free, so the order holds at every position.
#[derive(Debug, Clone, Default)]
pub struct Timetable {
    trips: Vec<TripSchedule>,
    frequencies: Vec<FrequencyEntry>,
}

impl Timetable {
    pub fn new(mut trips: Vec<TripSchedule>, frequencies: Vec<FrequencyEntry>) -> Self {
        trips.sort_by_key(|t| t.board_time(0));
        Self { trips, frequencies }
    }

    pub fn trips(&self) -> &[TripSchedule] {
        &self.trips
    }

    pub fn trip(&self, idx: u32) -> &TripSchedule {
        &self.trips[idx as usize]
    }

    pub fn frequencies(&self) -> &[FrequencyEntry] {
        &self.frequencies
    }

    pub fn frequency(&self, idx: u32) -> &FrequencyEntry {
        &self.frequencies[idx as usize]
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty() && self.frequencies.is_empty()
    }

    /// Earliest trip departing from `pos` at or after `earliest`.
    pub fn earliest_boarding(&self, pos: usize, earliest: Time) -> Option<TripBoarding> {
        let idx = self
            .trips
            .partition_point(|t| t.board_time(pos) < earliest);
        let mut best: Option<TripBoarding> = self.trips.get(idx).map(|t| TripBoarding {
            trip: TripRef::Scheduled(idx as u32),
            time: t.board_time(pos),
        });
        for (f_idx, freq) in self.frequencies.iter().enumerate() {
            let t = freq.next_departure_time(pos, earliest);
            if t == NO_DEPARTURE {
                continue;
            }
            if best.map_or(true, |b| t < b.time) {
                best = Some(TripBoarding {
                    trip: TripRef::Frequency {
                        entry: f_idx as u32,
                        time: t,
                    },
                    time: t,
                });
            }
        }
        best
    }

    /// Latest trip arriving at `pos` at or before `latest`. Boarding
    /// search of the reverse direction.
    pub fn latest_alighting(&self, pos: usize, latest: Time) -> Option<TripBoarding> {
        let idx = self
            .trips
            .partition_point(|t| t.alight_time(pos) <= latest);
        let mut best: Option<TripBoarding> = idx.checked_sub(1).map(|i| TripBoarding {
            trip: TripRef::Scheduled(i as u32),
            time: self.trips[i].alight_time(pos),
        });
        for (f_idx, freq) in self.frequencies.iter().enumerate() {
            let t = freq.prev_arrival_time(pos, latest);
            if t == NO_DEPARTURE {
                continue;
            }
            if best.map_or(true, |b| t > b.time) {
                best = Some(TripBoarding {
                    trip: TripRef::Frequency {
                        entry: f_idx as u32,
                        time: t,
                    },
                    time: t,
                });
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template_8_stops() -> TripSchedule {
        // 8 stops, 300s apart, no dwell.
        let times: Vec<Time> = (0..8).map(|i| i * 300).collect();
        TripSchedule::new(times.clone(), times)
    }

    #[test]
    fn exact_frequency_window() {
        let freq = FrequencyEntry::new(100_000, 150_001, 100, true, template_8_stops());
        assert_eq!(freq.next_departure_time(0, 100_000), 100_000);
        assert_eq!(freq.next_departure_time(0, 100_001), 100_100);
        assert_eq!(freq.next_departure_time(0, 150_000), 150_000);
        // Past the end of the window.
        assert_eq!(freq.next_departure_time(0, 150_100), NO_DEPARTURE);
        // Downstream stop offsets shift the generated times.
        assert_eq!(freq.next_departure_time(3, 100_000), 100_900);
        assert_eq!(freq.next_departure_time(3, 100_901), 101_000);
    }

    #[test]
    fn exact_frequency_reverse_window() {
        let freq = FrequencyEntry::new(100_000, 150_001, 100, true, template_8_stops());
        assert_eq!(freq.prev_arrival_time(0, 100_000), 100_000);
        assert_eq!(freq.prev_arrival_time(0, 99_999), NO_DEPARTURE);
        assert_eq!(freq.prev_arrival_time(0, 200_000), 150_000);
        assert_eq!(freq.prev_arrival_time(3, 100_950), 100_900);
    }

    #[test]
    fn inexact_frequency_adds_headway_wait() {
        let freq = FrequencyEntry::new(1000, 2000, 120, false, template_8_stops());
        assert_eq!(freq.next_departure_time(0, 500), 1120);
        assert_eq!(freq.next_departure_time(0, 1500), 1620);
        assert_eq!(freq.next_departure_time(0, 2001), NO_DEPARTURE);
    }

    #[test]
    fn earliest_boarding_prefers_scheduled_or_frequency() {
        let s1 = TripSchedule::new(vec![900, 1500], vec![900, 1500]);
        let s2 = TripSchedule::new(vec![1800, 2400], vec![1800, 2400]);
        let freq = FrequencyEntry::new(
            1000,
            3000,
            200,
            true,
            TripSchedule::new(vec![0, 600], vec![0, 600]),
        );
        let tt = Timetable::new(vec![s2, s1], vec![freq]);

        // Trips were sorted: trip 0 departs 900.
        let b = tt.earliest_boarding(0, 0).unwrap();
        assert_eq!(b.time, 900);
        assert_eq!(b.trip, TripRef::Scheduled(0));

        // At 950 the frequency departure at 1000 beats the 1800 trip.
        let b = tt.earliest_boarding(0, 950).unwrap();
        assert_eq!(b.time, 1000);
        assert!(matches!(b.trip, TripRef::Frequency { .. }));

        assert!(tt.earliest_boarding(0, 10_000).is_none());
    }

    #[test]
    fn latest_alighting_mirrors_earliest_boarding() {
        let s1 = TripSchedule::new(vec![900, 1500], vec![900, 1500]);
        let s2 = TripSchedule::new(vec![1800, 2400], vec![1800, 2400]);
        let tt = Timetable::new(vec![s1, s2], vec![]);

        let b = tt.latest_alighting(1, 2400).unwrap();
        assert_eq!(b.time, 2400);
        let b = tt.latest_alighting(1, 2399).unwrap();
        assert_eq!(b.time, 1500);
        assert!(tt.latest_alighting(1, 1499).is_none());
    }
}
