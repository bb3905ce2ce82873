use std::iter::Rev;
use std::ops::Range;

use itertools::Either;

use crate::access::AccessEgress;
use crate::primitives::{DurationSec, Time, UNREACHED_FORWARD, UNREACHED_REVERSE};
use crate::timetable::{Timetable, TripBoarding, TripRef, TripSchedule};

/// Time arithmetic and board/alight role swap of one search direction.
///
/// The round worker is written once against this trait; instantiating it
/// with [Reverse] walks the timetable backwards in time, turning egress
/// legs into the seeding side and alighting into the boarding-equivalent
/// operation.
pub trait Direction: Copy + Default + Send + Sync + 'static {
    const IS_FORWARD: bool;

    /// Sentinel for "stop not reached yet".
    fn unreached() -> Time;

    /// Strictly better in this direction (earlier forward, later reverse).
    fn is_before(a: Time, b: Time) -> bool;

    /// Moves `t` by `d` seconds along the direction of travel.
    fn shift(t: Time, d: DurationSec) -> Time;

    /// Departure-side time of a scheduled trip at a position.
    fn board_time(s: &TripSchedule, pos: usize) -> Time;

    /// Arrival-side time of a scheduled trip at a position.
    fn alight_time(s: &TripSchedule, pos: usize) -> Time;

    /// Best boardable trip at `pos` given the direction-wise earliest
    /// usable board time.
    fn find_boarding(tt: &Timetable, pos: usize, limit: Time) -> Option<TripBoarding>;

    /// Raw arrival-side time at `pos` when riding `trip` boarded at
    /// `board_pos`.
    fn ride_arrival(tt: &Timetable, trip: TripRef, board_pos: usize, pos: usize) -> Time;

    /// Board-side time of an onboard trip at `pos`, for deciding whether
    /// an earlier trip can replace the current ride.
    fn ride_departure(tt: &Timetable, trip: TripRef, board_pos: usize, pos: usize) -> Time;

    /// Stop positions of a pattern in riding order.
    fn positions(n: usize) -> Either<Range<usize>, Rev<Range<usize>>>;

    /// True if a trip boarded at `board_pos` passes `pos` later.
    fn is_downstream(board_pos: usize, pos: usize) -> bool;

    /// Realizable leg departure for the seeding side, after applying
    /// opening-hours/booking time shifting. `None` means infeasible.
    fn leg_departure(leg: &AccessEgress, t: Time) -> Option<Time>;
}

#[derive(Clone, Copy, Default)]
pub struct Forward;

#[derive(Clone, Copy, Default)]
pub struct Reverse;

impl Direction for Forward {
    const IS_FORWARD: bool = true;

    fn unreached() -> Time {
        UNREACHED_FORWARD
    }

    fn is_before(a: Time, b: Time) -> bool {
        a < b
    }

    fn shift(t: Time, d: DurationSec) -> Time {
        t + d
    }

    fn board_time(s: &TripSchedule, pos: usize) -> Time {
        s.board_time(pos)
    }

    fn alight_time(s: &TripSchedule, pos: usize) -> Time {
        s.alight_time(pos)
    }

    fn find_boarding(tt: &Timetable, pos: usize, limit: Time) -> Option<TripBoarding> {
        tt.earliest_boarding(pos, limit)
    }

    fn ride_arrival(tt: &Timetable, trip: TripRef, board_pos: usize, pos: usize) -> Time {
        match trip {
            TripRef::Scheduled(idx) => tt.trip(idx).alight_time(pos),
            TripRef::Frequency { entry, time } => {
                let tpl = tt.frequency(entry).template();
                time + (tpl.alight_time(pos) - tpl.board_time(board_pos))
            }
        }
    }

    fn ride_departure(tt: &Timetable, trip: TripRef, board_pos: usize, pos: usize) -> Time {
        match trip {
            TripRef::Scheduled(idx) => tt.trip(idx).board_time(pos),
            TripRef::Frequency { entry, time } => {
                let tpl = tt.frequency(entry).template();
                time + (tpl.board_time(pos) - tpl.board_time(board_pos))
            }
        }
    }

    fn positions(n: usize) -> Either<Range<usize>, Rev<Range<usize>>> {
        Either::Left(0..n)
    }

    fn is_downstream(board_pos: usize, pos: usize) -> bool {
        pos > board_pos
    }

    fn leg_departure(leg: &AccessEgress, t: Time) -> Option<Time> {
        leg.earliest_departure(t)
    }
}

impl Direction for Reverse {
    const IS_FORWARD: bool = false;

    fn unreached() -> Time {
        UNREACHED_REVERSE
    }

    fn is_before(a: Time, b: Time) -> bool {
        a > b
    }

    fn shift(t: Time, d: DurationSec) -> Time {
        t - d
    }

    fn board_time(s: &TripSchedule, pos: usize) -> Time {
        s.alight_time(pos)
    }

    fn alight_time(s: &TripSchedule, pos: usize) -> Time {
        s.board_time(pos)
    }

    fn find_boarding(tt: &Timetable, pos: usize, limit: Time) -> Option<TripBoarding> {
        tt.latest_alighting(pos, limit)
    }

    fn ride_arrival(tt: &Timetable, trip: TripRef, board_pos: usize, pos: usize) -> Time {
        match trip {
            TripRef::Scheduled(idx) => tt.trip(idx).board_time(pos),
            TripRef::Frequency { entry, time } => {
                let tpl = tt.frequency(entry).template();
                time - (tpl.alight_time(board_pos) - tpl.board_time(pos))
            }
        }
    }

    fn ride_departure(tt: &Timetable, trip: TripRef, board_pos: usize, pos: usize) -> Time {
        match trip {
            TripRef::Scheduled(idx) => tt.trip(idx).alight_time(pos),
            TripRef::Frequency { entry, time } => {
                let tpl = tt.frequency(entry).template();
                time - (tpl.alight_time(board_pos) - tpl.alight_time(pos))
            }
        }
    }

    fn positions(n: usize) -> Either<Range<usize>, Rev<Range<usize>>> {
        Either::Right((0..n).rev())
    }

    fn is_downstream(board_pos: usize, pos: usize) -> bool {
        pos < board_pos
    }

    fn leg_departure(leg: &AccessEgress, t: Time) -> Option<Time> {
        leg.latest_departure(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timetable::Timetable;

    #[test]
    fn forward_and_reverse_swap_board_and_alight() {
        let s = TripSchedule::new(vec![100, 300], vec![90, 280]);
        assert_eq!(Forward::board_time(&s, 0), 100);
        assert_eq!(Forward::alight_time(&s, 1), 280);
        assert_eq!(Reverse::board_time(&s, 1), 280);
        assert_eq!(Reverse::alight_time(&s, 0), 100);
    }

    #[test]
    fn ride_arrival_is_symmetric_on_scheduled_trips() {
        let s = TripSchedule::new(vec![100, 300, 500], vec![90, 280, 480]);
        let tt = Timetable::new(vec![s], vec![]);
        let trip = TripRef::Scheduled(0);
        assert_eq!(Forward::ride_arrival(&tt, trip, 0, 2), 480);
        assert_eq!(Reverse::ride_arrival(&tt, trip, 2, 0), 100);
    }

    #[test]
    fn positions_iterate_in_riding_order() {
        assert_eq!(Forward::positions(3).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(Reverse::positions(3).collect::<Vec<_>>(), vec![2, 1, 0]);
    }
}
