use crate::network::StopIdx;
use crate::primitives::{Cost, DurationSec, Time};

/// Time penalty attached to an access/egress leg. The decorated duration
/// is `constant + coefficient * raw`, counted in Pareto comparisons but
/// excluded from arrive-by/depart-after boundary checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimePenalty {
    pub constant: DurationSec,
    pub coefficient: f32,
}

impl TimePenalty {
    pub fn applied_to(&self, duration: DurationSec) -> DurationSec {
        self.constant + (self.coefficient * duration as f32).round() as DurationSec
    }
}

/// Service window of a leg, expressed on its departure time. A departure
/// outside the window shifts forward to `opens`; past `closes` the leg
/// is not usable at all.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpeningHours {
    pub opens: Time,
    pub closes: Time,
}

/// Precomputed non-transit path between the virtual origin/destination
/// and a boarding/alighting stop.
///
/// Infeasibility (outside opening hours, booking notice not satisfiable)
/// is reported as `None` from the time-shifting accessors; it is never an
/// error.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessEgress {
    stop: StopIdx,
    duration: DurationSec,
    c1: Cost,
    opening_hours: Option<OpeningHours>,
    /// Minimum lead time between deciding to travel and departing, for
    /// legs that must be booked ahead.
    booking_notice: Option<DurationSec>,
    time_penalty: Option<TimePenalty>,
}

impl AccessEgress {
    pub fn new(stop: StopIdx, duration: DurationSec) -> Self {
        Self {
            stop,
            duration,
            c1: 0,
            opening_hours: None,
            booking_notice: None,
            time_penalty: None,
        }
    }

    pub fn with_cost(mut self, c1: Cost) -> Self {
        self.c1 = c1;
        self
    }

    pub fn with_opening_hours(mut self, opens: Time, closes: Time) -> Self {
        self.opening_hours = Some(OpeningHours { opens, closes });
        self
    }

    pub fn with_booking_notice(mut self, notice: DurationSec) -> Self {
        self.booking_notice = Some(notice);
        self
    }

    /// Decorates the leg with a time penalty.
    pub fn with_time_penalty(mut self, penalty: TimePenalty) -> Self {
        self.time_penalty = Some(penalty);
        self
    }

    /// Strips a time-penalty decoration, restoring the original leg.
    pub fn remove_time_penalty(mut self) -> Self {
        self.time_penalty = None;
        self
    }

    pub fn stop(&self) -> StopIdx {
        self.stop
    }

    /// Duration as seen by Pareto comparisons, penalty included.
    pub fn duration(&self) -> DurationSec {
        match &self.time_penalty {
            Some(p) => p.applied_to(self.duration),
            None => self.duration,
        }
    }

    /// Duration used for search-window boundary checks, penalty excluded.
    pub fn limit_duration(&self) -> DurationSec {
        self.duration
    }

    pub fn c1(&self) -> Cost {
        self.c1
    }

    pub fn has_opening_hours(&self) -> bool {
        self.opening_hours.is_some()
    }

    /// Earliest realizable departure at or after `t`, or `None` when the
    /// leg cannot be used anymore that day.
    pub fn earliest_departure(&self, t: Time) -> Option<Time> {
        let t = t + self.booking_notice.unwrap_or(0);
        match self.opening_hours {
            None => Some(t),
            Some(oh) => {
                let shifted = t.max(oh.opens);
                (shifted <= oh.closes).then_some(shifted)
            }
        }
    }

    /// Latest realizable departure at or before `t`; the reverse-search
    /// counterpart of [Self::earliest_departure].
    pub fn latest_departure(&self, t: Time) -> Option<Time> {
        let t = t - self.booking_notice.unwrap_or(0);
        match self.opening_hours {
            None => Some(t),
            Some(oh) => {
                let shifted = t.min(oh.closes);
                (shifted >= oh.opens).then_some(shifted)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_penalty_scales_the_duration() {
        let leg = AccessEgress::new(StopIdx(3), 1800);
        let decorated = leg.clone().with_time_penalty(TimePenalty {
            constant: 600,
            coefficient: 1.0,
        });
        assert_eq!(decorated.duration(), 2400);
        assert_eq!(decorated.limit_duration(), 1800);

        let tripled = leg.clone().with_time_penalty(TimePenalty {
            constant: 0,
            coefficient: 3.0,
        });
        assert_eq!(tripled.duration(), 5400);
    }

    #[test]
    fn removing_the_penalty_restores_the_original_leg() {
        let leg = AccessEgress::new(StopIdx(3), 1800).with_opening_hours(100, 900);
        let decorated = leg.clone().with_time_penalty(TimePenalty {
            constant: 600,
            coefficient: 1.0,
        });
        let restored = decorated.remove_time_penalty();
        assert_eq!(restored, leg);
        assert_eq!(restored.duration(), 1800);
        assert_eq!(restored.earliest_departure(0), leg.earliest_departure(0));
    }

    #[test]
    fn opening_hours_shift_or_reject_departures() {
        let leg = AccessEgress::new(StopIdx(0), 60).with_opening_hours(1000, 2000);
        assert_eq!(leg.earliest_departure(500), Some(1000));
        assert_eq!(leg.earliest_departure(1500), Some(1500));
        assert_eq!(leg.earliest_departure(2001), None);

        assert_eq!(leg.latest_departure(2500), Some(2000));
        assert_eq!(leg.latest_departure(1500), Some(1500));
        assert_eq!(leg.latest_departure(999), None);
    }

    #[test]
    fn booking_notice_delays_the_departure() {
        let leg = AccessEgress::new(StopIdx(0), 60)
            .with_opening_hours(1000, 2000)
            .with_booking_notice(1200);
        assert_eq!(leg.earliest_departure(500), Some(1700));
        assert_eq!(leg.earliest_departure(900), None);
    }
}
