use crate::access::AccessEgress;
use crate::cost::CostParams;
use crate::primitives::{Cost, DurationSec, Time};

/// Search profile. Resolved once at setup into a concrete worker and
/// state variant; never re-dispatched inside the rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Earliest arrival and number of transfers, one best label per stop
    /// per round, range-raptor over the search window.
    Standard,
    /// Earliest arrival only; cheapest variant, also used by heuristics.
    BestTime,
    /// Range-raptor picking the iteration minimizing travel duration.
    MinTravelDuration,
    /// Full Pareto search over arrival time, rounds, c1 and optional c2.
    MultiCriteria,
}

/// `relax(x) = x * ratio + constant`, widening the c1 dominance check so
/// that "close enough" alternatives survive.
#[derive(Debug, Clone, Copy)]
pub struct RelaxFunction {
    ratio: f64,
    constant: Cost,
}

impl RelaxFunction {
    pub fn new(ratio: f64, constant: Cost) -> Self {
        assert!(ratio >= 1.0, "relax ratio below 1 would tighten dominance");
        assert!(constant >= 0, "negative relax constant");
        Self { ratio, constant }
    }

    pub fn identity() -> Self {
        Self {
            ratio: 1.0,
            constant: 0,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.ratio == 1.0 && self.constant == 0
    }

    #[inline]
    pub fn relax(&self, value: Cost) -> Cost {
        (value as f64 * self.ratio) as Cost + self.constant
    }
}

impl Default for RelaxFunction {
    fn default() -> Self {
        Self::identity()
    }
}

/// Dominance over the secondary criterion c2.
#[derive(Debug, Clone, Copy)]
pub enum C2Dominance {
    /// Transit-group priority bitmask: the left value dominates when the
    /// right carries a group bit the left lacks.
    GroupPriority,
    /// Plain minimization.
    SmallerIsBetter,
}

impl C2Dominance {
    #[inline]
    pub fn dominates(&self, left: u32, right: u32) -> bool {
        match self {
            C2Dominance::GroupPriority => (right & !left) != 0,
            C2Dominance::SmallerIsBetter => left < right,
        }
    }
}

/// Optional secondary-criterion configuration. When present, labels
/// carry c2 and the comparator factory selects a c2-aware variant.
#[derive(Debug, Clone, Copy)]
pub struct C2Config {
    pub dominance: C2Dominance,
}

#[derive(Debug)]
pub enum RequestError {
    NoAccessLegs,
    NoEgressLegs,
    /// Neither earliest-departure nor latest-arrival given; the search
    /// has no time anchor.
    MissingTimeAnchor,
    ZeroRounds,
    /// Multi-criteria needs an earliest departure time (possibly
    /// estimated from the reverse heuristic), never a bare LAT window.
    SearchWindowTooLarge { window: DurationSec },
}

pub const MAX_SEARCH_WINDOW: DurationSec = 24 * 3600;

/// All parameters of one routing request. The access/egress legs are
/// precomputed by the caller (street search is not this crate's job).
#[derive(Debug, Clone)]
pub struct RaptorRequest {
    pub profile: Profile,
    pub earliest_departure: Option<Time>,
    pub latest_arrival: Option<Time>,
    pub search_window: Option<DurationSec>,
    pub max_rounds: usize,
    /// Prune stop arrivals that provably cannot improve the destination
    /// front. Mandates the reverse heuristic.
    pub destination_pruning: bool,
    pub relax_c1: RelaxFunction,
    pub c2: Option<C2Config>,
    pub cost: CostParams,
    pub access: Vec<AccessEgress>,
    pub egress: Vec<AccessEgress>,
}

impl RaptorRequest {
    pub fn new(access: Vec<AccessEgress>, egress: Vec<AccessEgress>) -> Self {
        Self {
            profile: Profile::Standard,
            earliest_departure: None,
            latest_arrival: None,
            search_window: None,
            max_rounds: 12,
            destination_pruning: false,
            relax_c1: RelaxFunction::identity(),
            c2: None,
            cost: CostParams::default(),
            access,
            egress,
        }
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        if self.access.is_empty() {
            return Err(RequestError::NoAccessLegs);
        }
        if self.egress.is_empty() {
            return Err(RequestError::NoEgressLegs);
        }
        if self.earliest_departure.is_none() && self.latest_arrival.is_none() {
            return Err(RequestError::MissingTimeAnchor);
        }
        if self.max_rounds == 0 {
            return Err(RequestError::ZeroRounds);
        }
        if let Some(window) = self.search_window {
            if !(0..=MAX_SEARCH_WINDOW).contains(&window) {
                return Err(RequestError::SearchWindowTooLarge { window });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::StopIdx;

    fn leg() -> AccessEgress {
        AccessEgress::new(StopIdx(0), 60)
    }

    #[test]
    fn group_priority_dominance_fixture() {
        let dom = C2Dominance::GroupPriority;
        let a = 0x01;
        let b = 0x02;

        // Non-overlapping groups dominate each other symmetrically.
        assert!(dom.dominates(a, b));
        assert!(dom.dominates(b, a));
        // Not reflexive.
        assert!(!dom.dominates(a, a));
        // The merged group is dominated by each single group, while the
        // merged group dominates neither.
        assert!(dom.dominates(a, a | b));
        assert!(dom.dominates(b, a | b));
        assert!(!dom.dominates(a | b, a));
        assert!(!dom.dominates(a | b, b));
    }

    #[test]
    fn relax_function_widens_costs() {
        let relax = RelaxFunction::new(1.25, 200);
        assert_eq!(relax.relax(1000), 1450);
        assert!(!relax.is_identity());
        assert!(RelaxFunction::identity().is_identity());
        assert_eq!(RelaxFunction::identity().relax(1000), 1000);
    }

    #[test]
    fn requests_without_time_anchor_are_rejected() {
        let mut req = RaptorRequest::new(vec![leg()], vec![leg()]);
        assert!(matches!(
            req.validate(),
            Err(RequestError::MissingTimeAnchor)
        ));
        req.earliest_departure = Some(0);
        assert!(req.validate().is_ok());
        req.access.clear();
        assert!(matches!(req.validate(), Err(RequestError::NoAccessLegs)));
    }
}
