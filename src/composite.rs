use log::debug;

use crate::path::{merge_paths, Path};
use crate::primitives::Time;
use crate::route::{RaptorError, SearchResult};

/// Combines a main and an alternative search (typically differing only
/// in the access/egress configuration) into one result.
///
/// The merged path list is the only place the alternative contributes;
/// every single-criterion convenience view reports the main search
/// alone.
pub struct CompositeResult {
    main: SearchResult,
    alternative_reached: bool,
    merged_paths: Vec<Path>,
}

impl CompositeResult {
    pub fn extract_paths(&self) -> &[Path] {
        &self.merged_paths
    }

    pub fn is_destination_reached(&self) -> bool {
        self.main.destination_reached || self.alternative_reached
    }

    pub fn best_overall_arrivals(&self) -> &[Time] {
        &self.main.best_overall
    }

    pub fn best_transit_arrivals(&self) -> &[Time] {
        &self.main.best_transit
    }

    pub fn best_num_transfers(&self) -> &[Option<u8>] {
        &self.main.best_num_transfers
    }

    pub fn main(&self) -> &SearchResult {
        &self.main
    }
}

/// Runs two whole searches and merges their path sets with `merge`. With
/// `parallel` the searches run on the rayon pool; each owns its state
/// exclusively, only the finished path collections meet.
///
/// A fired cancellation token surfaces as [RaptorError::SearchTimeout]
/// once both sub-searches have stopped; any other failure of either
/// search is returned as-is (main first).
pub fn route_concurrent<M, A>(
    main: M,
    alternative: A,
    merge: impl Fn(Vec<Path>, Vec<Path>) -> Vec<Path>,
    parallel: bool,
) -> Result<CompositeResult, RaptorError>
where
    M: FnOnce() -> Result<SearchResult, RaptorError> + Send,
    A: FnOnce() -> Result<SearchResult, RaptorError> + Send,
{
    let (main_result, alt_result) = if parallel {
        rayon::join(main, alternative)
    } else {
        (main(), alternative())
    };
    let main_result = main_result?;
    let alt_result = alt_result?;

    if main_result.cancelled || alt_result.cancelled {
        debug!("Composite search cancelled; discarding partial results");
        return Err(RaptorError::SearchTimeout);
    }

    let alternative_reached = alt_result.destination_reached;
    let merged_paths = merge(main_result.paths.clone(), alt_result.paths);
    Ok(CompositeResult {
        main: main_result,
        alternative_reached,
        merged_paths,
    })
}

/// The default merge: deduplicating union in the deterministic path
/// order.
pub fn default_merge(a: Vec<Path>, b: Vec<Path>) -> Vec<Path> {
    merge_paths(a, b)
}
