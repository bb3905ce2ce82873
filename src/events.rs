use crate::network::{PatternIdx, StopIdx};
use crate::primitives::{Round, Time};

/// Outcome of offering a candidate to the search state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Candidate entered the state.
    Accepted,
    /// Candidate was dominated or worse than the existing label.
    Rejected,
    /// A previously accepted element was displaced by a new one.
    Dropped,
}

#[derive(Debug, Clone, Copy)]
pub struct StopArrivalEvent {
    pub stop: StopIdx,
    pub round: Round,
    pub time: Time,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Copy)]
pub struct PatternRideEvent {
    pub pattern: PatternIdx,
    pub board_stop: StopIdx,
    pub board_time: Time,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Copy)]
pub struct PathEvent {
    pub arrival: Time,
    pub num_transfers: u32,
    pub outcome: Outcome,
}

/// Introspection hooks invoked synchronously from the hot loop. All
/// listeners are observers only; results must not depend on them. Unset
/// listeners cost a single `Option` check per event site.
#[derive(Default)]
pub struct DebugListeners<'a> {
    pub on_stop_arrival: Option<Box<dyn FnMut(&StopArrivalEvent) + 'a>>,
    pub on_pattern_ride: Option<Box<dyn FnMut(&PatternRideEvent) + 'a>>,
    pub on_path: Option<Box<dyn FnMut(&PathEvent) + 'a>>,
}

impl<'a> DebugListeners<'a> {
    #[inline]
    pub fn stop_arrival(&mut self, stop: StopIdx, round: Round, time: Time, outcome: Outcome) {
        if let Some(listener) = &mut self.on_stop_arrival {
            listener(&StopArrivalEvent {
                stop,
                round,
                time,
                outcome,
            });
        }
    }

    #[inline]
    pub fn pattern_ride(
        &mut self,
        pattern: PatternIdx,
        board_stop: StopIdx,
        board_time: Time,
        outcome: Outcome,
    ) {
        if let Some(listener) = &mut self.on_pattern_ride {
            listener(&PatternRideEvent {
                pattern,
                board_stop,
                board_time,
                outcome,
            });
        }
    }

    #[inline]
    pub fn path(&mut self, arrival: Time, num_transfers: u32, outcome: Outcome) {
        if let Some(listener) = &mut self.on_path {
            listener(&PathEvent {
                arrival,
                num_transfers,
                outcome,
            });
        }
    }
}
