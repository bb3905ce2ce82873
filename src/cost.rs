use crate::network::SlackIdx;
use crate::primitives::{Cost, DurationSec};

/// Tunables of the generalized-cost criterion (c1). Factors are
/// dimensionless reluctances applied to seconds; the result is counted
/// in cost centi-units (1 second of plain transit time = 100).
#[derive(Debug, Clone)]
pub struct CostParams {
    pub board_cost: Cost,
    pub transfer_cost: Cost,
    pub wait_factor: f64,
    /// One reluctance per slack class; the last entry serves any higher
    /// class.
    pub transit_factors: Vec<f64>,
}

impl Default for CostParams {
    fn default() -> Self {
        Self {
            board_cost: 60_000,
            transfer_cost: 0,
            wait_factor: 1.0,
            transit_factors: vec![1.0],
        }
    }
}

/// Computes c1 contributions of waits, boardings and rides. Built once
/// per search; stateless afterwards.
#[derive(Debug, Clone)]
pub struct CostCalculator {
    board_cost: Cost,
    transfer_cost: Cost,
    wait_factor_centi: Cost,
    transit_factors_centi: Vec<Cost>,
}

const CENTI: f64 = 100.0;

impl CostCalculator {
    pub fn new(params: &CostParams) -> Self {
        assert!(
            !params.transit_factors.is_empty(),
            "cost params without transit factors"
        );
        Self {
            board_cost: params.board_cost,
            transfer_cost: params.transfer_cost,
            wait_factor_centi: (params.wait_factor * CENTI).round() as Cost,
            transit_factors_centi: params
                .transit_factors
                .iter()
                .map(|f| (f * CENTI).round() as Cost)
                .collect(),
        }
    }

    fn transit_factor(&self, index: SlackIdx) -> Cost {
        let i = (index.0 as usize).min(self.transit_factors_centi.len() - 1);
        self.transit_factors_centi[i]
    }

    /// Cost of waiting `wait` seconds and then boarding. The transfer
    /// penalty applies to every boarding after the first.
    pub fn boarding_cost(&self, first_boarding: bool, wait: DurationSec) -> Cost {
        let transfer = if first_boarding { 0 } else { self.transfer_cost };
        self.wait_factor_centi * wait + self.board_cost + transfer
    }

    /// Cost of riding for `duration` seconds on a pattern of the given
    /// slack class.
    pub fn ride_cost(&self, duration: DurationSec, index: SlackIdx) -> Cost {
        self.transit_factor(index) * duration
    }

    /// Cost of a foot leg of `duration` seconds with an explicit extra
    /// cost (transfer edges carry their own c1).
    pub fn walk_cost(&self, duration: DurationSec, extra: Cost) -> Cost {
        CENTI as Cost * duration + extra
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boarding_cost_includes_wait_and_penalties() {
        let calc = CostCalculator::new(&CostParams {
            board_cost: 600,
            transfer_cost: 400,
            wait_factor: 0.5,
            transit_factors: vec![1.0],
        });
        assert_eq!(calc.boarding_cost(true, 100), 50 * 100 + 600);
        assert_eq!(calc.boarding_cost(false, 100), 50 * 100 + 600 + 400);
    }

    #[test]
    fn ride_cost_uses_the_pattern_slack_class() {
        let calc = CostCalculator::new(&CostParams {
            board_cost: 0,
            transfer_cost: 0,
            wait_factor: 1.0,
            transit_factors: vec![1.0, 2.0],
        });
        assert_eq!(calc.ride_cost(60, SlackIdx(0)), 6000);
        assert_eq!(calc.ride_cost(60, SlackIdx(1)), 12000);
        // Higher classes fall back to the last factor.
        assert_eq!(calc.ride_cost(60, SlackIdx(9)), 12000);
    }
}
