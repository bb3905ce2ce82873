use std::cell::Cell;

use crate::network::SlackIdx;
use crate::primitives::{DurationSec, Round};

/// Direction-agnostic slack values, indexed by a pattern's slack class.
pub trait SlackSource {
    fn board_slack(&self, index: SlackIdx) -> DurationSec;
    fn alight_slack(&self, index: SlackIdx) -> DurationSec;
    fn transfer_slack(&self) -> DurationSec;
}

impl<T: SlackSource + ?Sized> SlackSource for &T {
    fn board_slack(&self, index: SlackIdx) -> DurationSec {
        (**self).board_slack(index)
    }

    fn alight_slack(&self, index: SlackIdx) -> DurationSec {
        (**self).alight_slack(index)
    }

    fn transfer_slack(&self) -> DurationSec {
        (**self).transfer_slack()
    }
}

#[derive(Debug, Clone)]
pub struct DefaultSlackSource {
    board: Vec<DurationSec>,
    alight: Vec<DurationSec>,
    transfer: DurationSec,
}

impl DefaultSlackSource {
    pub fn new(board: Vec<DurationSec>, alight: Vec<DurationSec>, transfer: DurationSec) -> Self {
        assert_eq!(board.len(), alight.len());
        Self {
            board,
            alight,
            transfer,
        }
    }

    /// One slack class with the same values for every pattern.
    pub fn uniform(board: DurationSec, alight: DurationSec, transfer: DurationSec) -> Self {
        Self::new(vec![board], vec![alight], transfer)
    }

    fn clamp(&self, index: SlackIdx) -> usize {
        // A single-class source serves any slack index.
        (index.0 as usize).min(self.board.len() - 1)
    }
}

impl SlackSource for DefaultSlackSource {
    fn board_slack(&self, index: SlackIdx) -> DurationSec {
        self.board[self.clamp(index)]
    }

    fn alight_slack(&self, index: SlackIdx) -> DurationSec {
        self.alight[self.clamp(index)]
    }

    fn transfer_slack(&self) -> DurationSec {
        self.transfer
    }
}

/// Direction-correct slack accessors used by the worker.
///
/// Transfer slack is folded into the boarding-equivalent side from round
/// 2 onward only: round 0 is access, round 1 the first transit ride, so
/// no transfer has happened before round 2. The worker re-notifies the
/// provider at the start of every round via [SlackProvider::round_changed].
pub trait SlackProvider {
    fn board_slack(&self, index: SlackIdx) -> DurationSec;
    fn alight_slack(&self, index: SlackIdx) -> DurationSec;
    fn transfer_slack(&self) -> DurationSec;
    fn round_changed(&self, round: Round);
}

pub struct ForwardSlack<S> {
    source: S,
    include_transfer: Cell<bool>,
}

impl<S> ForwardSlack<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            include_transfer: Cell::new(false),
        }
    }
}

impl<S: SlackSource> SlackProvider for ForwardSlack<S> {
    fn board_slack(&self, index: SlackIdx) -> DurationSec {
        let transfer = if self.include_transfer.get() {
            self.source.transfer_slack()
        } else {
            0
        };
        self.source.board_slack(index) + transfer
    }

    fn alight_slack(&self, index: SlackIdx) -> DurationSec {
        self.source.alight_slack(index)
    }

    fn transfer_slack(&self) -> DurationSec {
        self.source.transfer_slack()
    }

    fn round_changed(&self, round: Round) {
        self.include_transfer.set(round >= 2);
    }
}

/// Walking backward in time, alighting is the boarding-equivalent
/// operation: board and alight swap, and the transfer slack moves to the
/// alight side so that `forward.board_slack(i) == reverse.alight_slack(i)`
/// holds for every slack index.
pub struct ReverseSlack<S> {
    source: S,
    include_transfer: Cell<bool>,
}

impl<S> ReverseSlack<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            include_transfer: Cell::new(false),
        }
    }
}

impl<S: SlackSource> SlackProvider for ReverseSlack<S> {
    fn board_slack(&self, index: SlackIdx) -> DurationSec {
        self.source.alight_slack(index)
    }

    fn alight_slack(&self, index: SlackIdx) -> DurationSec {
        let transfer = if self.include_transfer.get() {
            self.source.transfer_slack()
        } else {
            0
        };
        self.source.board_slack(index) + transfer
    }

    fn transfer_slack(&self) -> DurationSec {
        self.source.transfer_slack()
    }

    fn round_changed(&self, round: Round) {
        self.include_transfer.set(round >= 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> DefaultSlackSource {
        DefaultSlackSource::new(vec![30, 60], vec![10, 20], 120)
    }

    #[test]
    fn forward_folds_transfer_slack_into_board_slack_from_round_2() {
        let fwd = ForwardSlack::new(source());
        fwd.round_changed(1);
        assert_eq!(fwd.board_slack(SlackIdx(0)), 30);
        fwd.round_changed(2);
        assert_eq!(fwd.board_slack(SlackIdx(0)), 150);
        assert_eq!(fwd.board_slack(SlackIdx(1)), 180);
        assert_eq!(fwd.alight_slack(SlackIdx(0)), 10);
    }

    #[test]
    fn adapters_are_symmetric_for_every_slack_index() {
        let fwd = ForwardSlack::new(source());
        let rev = ReverseSlack::new(source());
        for round in [2, 3, 7] {
            fwd.round_changed(round);
            rev.round_changed(round);
            for i in [SlackIdx(0), SlackIdx(1)] {
                assert_eq!(fwd.board_slack(i), rev.alight_slack(i));
                assert_eq!(fwd.alight_slack(i), rev.board_slack(i));
            }
        }
    }

    #[test]
    fn transfer_slack_contributes_nothing_before_round_2() {
        let fwd = ForwardSlack::new(source());
        let rev = ReverseSlack::new(source());
        for round in [0, 1] {
            fwd.round_changed(round);
            rev.round_changed(round);
            for i in [SlackIdx(0), SlackIdx(1)] {
                assert_eq!(fwd.board_slack(i), rev.alight_slack(i));
                assert_eq!(fwd.alight_slack(i), rev.board_slack(i));
                assert_eq!(fwd.board_slack(i), source().board_slack(i));
            }
        }
    }
}
