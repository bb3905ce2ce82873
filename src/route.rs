use std::fmt::{self, Display};

use log::{debug, info};

use crate::cost::CostCalculator;
use crate::direction::{Direction, Forward, Reverse};
use crate::events::DebugListeners;
use crate::heuristic::{
    compute_heuristics, estimate_earliest_departure, resolve_heuristics, Heuristics,
    HeuristicToRun, Sweep,
};
use crate::network::TransitData;
use crate::path::{sort_and_dedup, Path};
use crate::primitives::{DurationSec, Time, ITERATION_STEP};
use crate::request::{Profile, RaptorRequest, RequestError};
use crate::slack::{ForwardSlack, ReverseSlack, SlackProvider, SlackSource};
use crate::state::mc::McState;
use crate::state::standard::StdState;
use crate::worker::{CancelToken, RaptorWorker, RoutingStrategy};

#[derive(Debug)]
pub enum RaptorError {
    /// The request-level timeout fired; both sub-searches of a composite
    /// run were cancelled before this was raised.
    SearchTimeout,
    InvalidRequest(RequestError),
}

impl Display for RaptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaptorError::SearchTimeout => write!(f, "search cancelled by request timeout"),
            RaptorError::InvalidRequest(e) => write!(f, "invalid request: {e:?}"),
        }
    }
}

impl std::error::Error for RaptorError {}

/// Outcome of one whole search: the extracted paths plus the
/// best-per-criterion convenience views over all stops.
pub struct SearchResult {
    pub paths: Vec<Path>,
    pub best_overall: Vec<Time>,
    pub best_transit: Vec<Time>,
    pub best_num_transfers: Vec<Option<u8>>,
    pub destination_reached: bool,
    pub cancelled: bool,
}

impl SearchResult {
    pub fn extract_paths(&self) -> &[Path] {
        &self.paths
    }

    pub fn is_destination_reached(&self) -> bool {
        self.destination_reached
    }
}

struct HeuristicPlan {
    forward: Option<Heuristics>,
    reverse: Option<Heuristics>,
}

fn run_heuristics(net: &dyn TransitData, request: &RaptorRequest) -> HeuristicPlan {
    let plan = resolve_heuristics(
        request.profile,
        request.destination_pruning,
        request.earliest_departure.is_some(),
        request.latest_arrival.is_some(),
    );
    debug!("Heuristic plan: {:?}", plan);
    let forward = || compute_heuristics(net, &request.access, Sweep::AwayFromSeeds);
    let reverse = || compute_heuristics(net, &request.egress, Sweep::TowardSeeds);
    match plan {
        HeuristicToRun::Neither => HeuristicPlan {
            forward: None,
            reverse: None,
        },
        HeuristicToRun::Forward => HeuristicPlan {
            forward: Some(forward()),
            reverse: None,
        },
        HeuristicToRun::Reverse => HeuristicPlan {
            forward: None,
            reverse: Some(reverse()),
        },
        HeuristicToRun::Both => {
            // Independent searches with no shared state; fan out.
            let (f, r) = rayon::join(forward, reverse);
            HeuristicPlan {
                forward: Some(f),
                reverse: Some(r),
            }
        }
    }
}

/// Departure anchors of the range-raptor iterations, processed from the
/// window-interior end toward the anchor so that every iteration can
/// only improve the retained state.
fn iteration_times<D: Direction>(anchor: Time, window: DurationSec) -> Vec<Time> {
    let n = (window / ITERATION_STEP).max(1);
    (0..n)
        .map(|k| D::shift(anchor, k * ITERATION_STEP))
        .rev()
        .collect()
}

/// Routes one request over the shared network snapshot. The entry point
/// of the engine; profile and direction dispatch happen once here.
pub fn route<'a>(
    net: &'a dyn TransitData,
    slack: &'a dyn SlackSource,
    request: &RaptorRequest,
    cancel: Option<CancelToken>,
    events: DebugListeners<'a>,
) -> Result<SearchResult, RaptorError> {
    request.validate().map_err(RaptorError::InvalidRequest)?;
    let heuristics = run_heuristics(net, request);

    let edt = request.earliest_departure.or_else(|| {
        let reverse = heuristics.reverse.as_ref()?;
        let lat = request.latest_arrival?;
        let estimate = estimate_earliest_departure(lat, &request.access, reverse)?;
        info!("Estimated earliest departure {} from reverse bounds", estimate);
        Some(estimate)
    });

    if request.profile == Profile::MultiCriteria {
        let Some(edt) = edt else {
            // No anchor and nothing reachable to estimate one from.
            return Ok(empty_result(net.num_stops()));
        };
        return Ok(run_mc::<Forward>(
            net, slack, request, &heuristics, edt, cancel, events,
        ));
    }

    match request.earliest_departure {
        Some(edt) => Ok(run_std::<Forward>(
            net, slack, request, &heuristics, edt, cancel, events,
        )),
        // Anchored on the latest arrival only: symmetric reverse search.
        None => Ok(run_std::<Reverse>(
            net,
            slack,
            request,
            &heuristics,
            request.latest_arrival.expect("validated time anchor"),
            cancel,
            events,
        )),
    }
}

fn empty_result(num_stops: usize) -> SearchResult {
    SearchResult {
        paths: Vec::new(),
        best_overall: vec![Time::MAX; num_stops],
        best_transit: vec![Time::MAX; num_stops],
        best_num_transfers: vec![None; num_stops],
        destination_reached: false,
        cancelled: false,
    }
}

fn slack_adapter<D: Direction>(source: &dyn SlackSource) -> Box<dyn SlackProvider + '_> {
    if D::IS_FORWARD {
        Box::new(ForwardSlack::new(source))
    } else {
        Box::new(ReverseSlack::new(source))
    }
}

/// Destination pruning bounds for a search in direction `D`: bounds
/// toward the direction-wise destination side. Only forward searches
/// prune (the reverse heuristic bounds toward the real destination).
fn pruning_bounds<'a, D: Direction>(
    request: &RaptorRequest,
    heuristics: &'a HeuristicPlan,
) -> Option<&'a Heuristics> {
    if !request.destination_pruning || !D::IS_FORWARD {
        return None;
    }
    heuristics.reverse.as_ref()
}

fn run_std<'a, D: Direction>(
    net: &'a dyn TransitData,
    slack: &'a dyn SlackSource,
    request: &RaptorRequest,
    heuristics: &HeuristicPlan,
    anchor: Time,
    cancel: Option<CancelToken>,
    events: DebugListeners<'a>,
) -> SearchResult {
    let adapter = slack_adapter::<D>(slack);
    let calculator = CostCalculator::new(&request.cost);
    let collect_paths = request.profile != Profile::BestTime;
    let strategy = StdState::<D>::new(net.num_stops(), collect_paths);

    let (seed, target, limit) = if D::IS_FORWARD {
        (
            request.access.clone(),
            request.egress.clone(),
            request.latest_arrival,
        )
    } else {
        (
            request.egress.clone(),
            request.access.clone(),
            request.earliest_departure,
        )
    };

    let bounds = pruning_bounds::<D>(request, heuristics);
    let mut worker = RaptorWorker::<D, _>::new(
        net,
        adapter.as_ref(),
        &calculator,
        bounds,
        strategy,
        seed,
        target,
        request.max_rounds,
        limit,
        cancel,
    );
    worker.set_listeners(events);

    let window = request.search_window.unwrap_or(0);
    let cancelled = worker.route(&iteration_times::<D>(anchor, window));

    let mut state = worker.into_strategy();
    let mut paths = state.take_paths();
    let mut silent = DebugListeners::default();
    sort_and_dedup(&mut paths, &mut silent);

    SearchResult {
        best_overall: state.best_overall().to_vec(),
        best_transit: state.best_transit().to_vec(),
        best_num_transfers: state.best_num_transfers(),
        destination_reached: state.destination_reached(),
        cancelled,
        paths,
    }
}

fn run_mc<'a, D: Direction>(
    net: &'a dyn TransitData,
    slack: &'a dyn SlackSource,
    request: &RaptorRequest,
    heuristics: &HeuristicPlan,
    anchor: Time,
    cancel: Option<CancelToken>,
    events: DebugListeners<'a>,
) -> SearchResult {
    let adapter = slack_adapter::<D>(slack);
    let calculator = CostCalculator::new(&request.cost);
    let strategy = McState::<D>::new(
        net.num_stops(),
        request.relax_c1,
        request.c2.map(|c| c.dominance),
    );

    let bounds = pruning_bounds::<D>(request, heuristics);
    let mut worker = RaptorWorker::<D, _>::new(
        net,
        adapter.as_ref(),
        &calculator,
        bounds,
        strategy,
        request.access.clone(),
        request.egress.clone(),
        request.max_rounds,
        request.latest_arrival,
        cancel,
    );
    worker.set_listeners(events);

    // Waiting is priced into c1, so multi-criteria runs one iteration.
    let cancelled = worker.route(&[anchor]);

    let state = worker.into_strategy();
    let mut paths = state.extract_paths();
    let mut silent = DebugListeners::default();
    sort_and_dedup(&mut paths, &mut silent);

    SearchResult {
        best_overall: state.best_overall(),
        best_transit: state.best_transit(),
        best_num_transfers: state.best_num_transfers(),
        destination_reached: RoutingStrategy::<D>::destination_reached(&state),
        cancelled,
        paths,
    }
}
