use crate::col::HashMap;
use crate::network::{ExtStopId, ExtStopTime, ExtTransfer, ExtTrip, StopIdx, TransitNetwork};
use crate::primitives::Time;

fn trip(route: u32, group_bit: u32, stop_times: &[(u32, Time, Time)]) -> ExtTrip {
    ExtTrip {
        route,
        slack_class: 0,
        group_bit,
        stop_times: stop_times
            .iter()
            .map(|&(stop, arrival, departure)| ExtStopTime {
                stop: ExtStopId(stop),
                arrival,
                departure,
            })
            .collect(),
    }
}

/// A small hand-built network with one interchange and one slower direct
/// line, so that two-ride and one-ride journeys are both Pareto-optimal:
///
/// - line A (group 0x01): stops 0-1-2-3, every 10 min from 08:00
/// - line B (group 0x02): stops 2-4-5, timed to connect off line A
/// - line C (group 0x04): stops 0-6-5, slower but direct
/// - foot transfer 3 -> 4 (120s)
pub fn create_sample() -> (TransitNetwork, HashMap<ExtStopId, StopIdx>) {
    let mut trips = Vec::new();
    for k in 0..3 {
        let o = 600 * k;
        trips.push(trip(
            1,
            0x01,
            &[
                (0, 28_800 + o, 28_800 + o),
                (1, 29_400 + o, 29_400 + o),
                (2, 30_000 + o, 30_000 + o),
                (3, 30_600 + o, 30_600 + o),
            ],
        ));
        trips.push(trip(
            2,
            0x02,
            &[
                (2, 30_300 + o, 30_300 + o),
                (4, 30_900 + o, 30_960 + o),
                (5, 31_500 + o, 31_500 + o),
            ],
        ));
    }
    for k in 0..2 {
        let o = 1200 * k;
        trips.push(trip(
            3,
            0x04,
            &[
                (0, 28_800 + o, 28_800 + o),
                (6, 30_000 + o, 30_000 + o),
                (5, 32_400 + o, 32_400 + o),
            ],
        ));
    }
    let transfers = vec![ExtTransfer {
        from: ExtStopId(3),
        to: ExtStopId(4),
        duration: 120,
        c1: 0,
    }];
    TransitNetwork::create(trips, vec![], transfers).expect("sample network is valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessEgress;
    use crate::composite::{default_merge, route_concurrent};
    use crate::events::DebugListeners;
    use crate::path::Leg;
    use crate::request::{C2Config, C2Dominance, Profile, RaptorRequest};
    use crate::route::{route, RaptorError, SearchResult};
    use crate::slack::DefaultSlackSource;
    use crate::worker::CancelToken;

    fn legs(idx: &HashMap<ExtStopId, StopIdx>) -> (Vec<AccessEgress>, Vec<AccessEgress>) {
        let access = vec![AccessEgress::new(idx[&ExtStopId(0)], 300)];
        let egress = vec![AccessEgress::new(idx[&ExtStopId(5)], 240)];
        (access, egress)
    }

    fn no_slack() -> DefaultSlackSource {
        DefaultSlackSource::uniform(0, 0, 0)
    }

    #[test]
    fn standard_forward_finds_one_path_per_round() {
        let (net, idx) = create_sample();
        let (access, egress) = legs(&idx);
        let mut request = RaptorRequest::new(access, egress);
        request.earliest_departure = Some(28_500);

        let slack = no_slack();
        let result = route(&net, &slack, &request, None, DebugListeners::default()).unwrap();

        assert!(result.is_destination_reached());
        assert!(!result.cancelled);
        assert_eq!(result.paths.len(), 2);

        // Round 2: A then B, one transfer.
        assert_eq!(result.paths[0].arrival, 31_740);
        assert_eq!(result.paths[0].departure, 28_500);
        assert_eq!(result.paths[0].num_transfers, 1);
        // Round 1: direct line C.
        assert_eq!(result.paths[1].arrival, 32_640);
        assert_eq!(result.paths[1].num_transfers, 0);

        let s5 = idx[&ExtStopId(5)];
        assert_eq!(result.best_overall[s5.0 as usize], 31_500);
        assert_eq!(result.best_transit[s5.0 as usize], 31_500);
        // Reachable with a single ride (line C).
        assert_eq!(result.best_num_transfers[s5.0 as usize], Some(0));
    }

    #[test]
    fn transit_legs_carry_the_scheduled_times() {
        let (net, idx) = create_sample();
        let (access, egress) = legs(&idx);
        let mut request = RaptorRequest::new(access, egress);
        request.earliest_departure = Some(28_500);

        let slack = no_slack();
        let result = route(&net, &slack, &request, None, DebugListeners::default()).unwrap();

        let path = &result.paths[0];
        let rides: Vec<_> = path
            .legs
            .iter()
            .filter_map(|l| match l {
                Leg::Transit {
                    board_time,
                    alight_time,
                    ..
                } => Some((*board_time, *alight_time)),
                _ => None,
            })
            .collect();
        assert_eq!(rides, vec![(28_800, 30_000), (30_300, 31_500)]);
    }

    #[test]
    fn range_raptor_iterates_the_search_window() {
        let (net, idx) = create_sample();
        let (access, egress) = legs(&idx);
        let mut request = RaptorRequest::new(access, egress);
        request.earliest_departure = Some(28_500);
        request.search_window = Some(1200);

        let slack = no_slack();
        let result = route(&net, &slack, &request, None, DebugListeners::default()).unwrap();

        let summary: Vec<_> = result
            .paths
            .iter()
            .map(|p| (p.departure, p.arrival, p.num_transfers))
            .collect();
        assert_eq!(
            summary,
            vec![
                (28_500, 31_740, 1),
                (29_100, 32_340, 1),
                (29_640, 32_940, 1),
                (29_640, 33_840, 0),
            ]
        );
    }

    #[test]
    fn slack_delays_boardings() {
        let (net, idx) = create_sample();
        let (access, egress) = legs(&idx);
        let mut request = RaptorRequest::new(access, egress);
        request.earliest_departure = Some(28_500);

        // 60s board, 30s alight, 120s transfer slack: the 08:00 departure
        // of line A is no longer catchable.
        let slack = DefaultSlackSource::uniform(60, 30, 120);
        let result = route(&net, &slack, &request, None, DebugListeners::default()).unwrap();

        let summary: Vec<_> = result
            .paths
            .iter()
            .map(|p| (p.arrival, p.num_transfers))
            .collect();
        assert_eq!(summary, vec![(32_370, 1), (33_870, 0)]);
    }

    #[test]
    fn multi_criteria_keeps_the_transfer_tradeoff() {
        let (net, idx) = create_sample();
        let (access, egress) = legs(&idx);
        let mut request = RaptorRequest::new(access, egress);
        request.profile = Profile::MultiCriteria;
        request.earliest_departure = Some(28_500);

        let slack = no_slack();
        let result = route(&net, &slack, &request, None, DebugListeners::default()).unwrap();

        assert!(result.is_destination_reached());
        assert_eq!(result.paths.len(), 2);
        assert_eq!(result.paths[0].arrival, 31_740);
        assert_eq!(result.paths[0].num_transfers, 1);
        assert_eq!(result.paths[1].arrival, 32_640);
        assert_eq!(result.paths[1].num_transfers, 0);
        // Generalized cost is accumulated along the legs.
        assert!(result.paths.iter().all(|p| p.c1 > 0));
    }

    #[test]
    fn group_bits_accumulate_into_c2() {
        let (net, idx) = create_sample();
        let (access, egress) = legs(&idx);
        let mut request = RaptorRequest::new(access, egress);
        request.profile = Profile::MultiCriteria;
        request.earliest_departure = Some(28_500);
        request.c2 = Some(C2Config {
            dominance: C2Dominance::GroupPriority,
        });

        let slack = no_slack();
        let result = route(&net, &slack, &request, None, DebugListeners::default()).unwrap();

        let by_transfers: HashMap<u32, u32> = result
            .paths
            .iter()
            .map(|p| (p.num_transfers, p.c2))
            .collect();
        assert_eq!(by_transfers[&1], 0x01 | 0x02);
        assert_eq!(by_transfers[&0], 0x04);
    }

    #[test]
    fn destination_pruning_preserves_the_frontier() {
        let (net, idx) = create_sample();
        let (access, egress) = legs(&idx);
        let mut request = RaptorRequest::new(access, egress);
        request.profile = Profile::MultiCriteria;
        request.earliest_departure = Some(28_500);

        let slack = no_slack();
        let plain = route(&net, &slack, &request, None, DebugListeners::default()).unwrap();

        request.destination_pruning = true;
        let pruned = route(&net, &slack, &request, None, DebugListeners::default()).unwrap();

        let key = |r: &SearchResult| {
            r.paths
                .iter()
                .map(|p| (p.departure, p.arrival, p.num_transfers, p.c1))
                .collect::<Vec<_>>()
        };
        assert_eq!(key(&plain), key(&pruned));
    }

    #[test]
    fn latest_arrival_only_runs_the_reverse_search() {
        let (net, idx) = create_sample();
        let (access, egress) = legs(&idx);
        let mut request = RaptorRequest::new(access, egress);
        request.latest_arrival = Some(32_700);

        let slack = no_slack();
        let result = route(&net, &slack, &request, None, DebugListeners::default()).unwrap();

        assert!(result.is_destination_reached());
        let summary: Vec<_> = result
            .paths
            .iter()
            .map(|p| (p.departure, p.num_transfers))
            .collect();
        // The direct line must leave at 07:55; the interchange journey
        // can leave ten minutes later.
        assert_eq!(summary, vec![(28_500, 0), (29_100, 1)]);
    }

    #[test]
    fn arrive_by_boundary_drops_late_journeys() {
        let (net, idx) = create_sample();
        let (access, egress) = legs(&idx);
        let mut request = RaptorRequest::new(access, egress);
        request.earliest_departure = Some(28_500);
        request.latest_arrival = Some(32_000);

        let slack = no_slack();
        let result = route(&net, &slack, &request, None, DebugListeners::default()).unwrap();

        // Only the interchange journey arrives in time.
        assert_eq!(result.paths.len(), 1);
        assert_eq!(result.paths[0].arrival, 31_740);
    }

    #[test]
    fn listeners_observe_but_do_not_change_results() {
        let (net, idx) = create_sample();
        let (access, egress) = legs(&idx);
        let mut request = RaptorRequest::new(access, egress);
        request.earliest_departure = Some(28_500);

        let slack = no_slack();
        let mut accepted = 0usize;
        let result = {
            let mut listeners = DebugListeners::default();
            listeners.on_stop_arrival = Some(Box::new(|event| {
                if event.outcome == crate::events::Outcome::Accepted {
                    accepted += 1;
                }
            }));
            route(&net, &slack, &request, None, listeners).unwrap()
        };
        let silent = route(&net, &slack, &request, None, DebugListeners::default()).unwrap();

        assert!(accepted > 0);
        assert_eq!(result.paths, silent.paths);
    }

    #[test]
    fn composite_merges_paths_and_reports_main_views() {
        let (net, idx) = create_sample();
        let slack = no_slack();

        // Main: the full request. Alternative: access at stop 6 only, so
        // it can only use line C's tail.
        let (access, egress) = legs(&idx);
        let mut main_request = RaptorRequest::new(access, egress.clone());
        main_request.earliest_departure = Some(28_500);

        let alt_access = vec![AccessEgress::new(idx[&ExtStopId(6)], 120)];
        let mut alt_request = RaptorRequest::new(alt_access, egress);
        alt_request.earliest_departure = Some(28_500);

        let composite = route_concurrent(
            || route(&net, &slack, &main_request, None, DebugListeners::default()),
            || route(&net, &slack, &alt_request, None, DebugListeners::default()),
            default_merge,
            true,
        )
        .unwrap();

        assert!(composite.is_destination_reached());
        // Merged paths contain the alternative's boarding at stop 6.
        let s6 = idx[&ExtStopId(6)];
        assert!(composite.extract_paths().iter().any(|p| p
            .legs
            .iter()
            .any(|l| matches!(l, Leg::Access { stop, .. } if *stop == s6))));
        // Convenience views come from the main search only: the main
        // search reaches stop 1, the alternative never does.
        let s1 = idx[&ExtStopId(1)];
        assert_eq!(composite.best_overall_arrivals()[s1.0 as usize], 29_400);
    }

    #[test]
    fn cancellation_surfaces_as_search_timeout() {
        let (net, idx) = create_sample();
        let slack = no_slack();
        let (access, egress) = legs(&idx);
        let mut request = RaptorRequest::new(access, egress);
        request.earliest_departure = Some(28_500);

        let token = CancelToken::new();
        token.cancel();

        let result = route_concurrent(
            || {
                route(
                    &net,
                    &slack,
                    &request,
                    Some(token.clone()),
                    DebugListeners::default(),
                )
            },
            || {
                route(
                    &net,
                    &slack,
                    &request,
                    Some(token.clone()),
                    DebugListeners::default(),
                )
            },
            default_merge,
            true,
        );
        assert!(matches!(result, Err(RaptorError::SearchTimeout)));

        // Both sub-searches stopped early and reported it.
        let sub = route(&net, &slack, &request, Some(token), DebugListeners::default()).unwrap();
        assert!(sub.cancelled);
        assert!(sub.paths.is_empty());
    }

    #[test]
    fn infeasible_access_is_skipped_without_error() {
        let (net, idx) = create_sample();
        let slack = no_slack();
        let (mut access, egress) = legs(&idx);
        // Opening hours end before the request departs.
        access[0] = access[0].clone().with_opening_hours(0, 20_000);
        let mut request = RaptorRequest::new(access, egress);
        request.earliest_departure = Some(28_500);

        let result = route(&net, &slack, &request, None, DebugListeners::default()).unwrap();
        assert!(!result.is_destination_reached());
        assert!(result.paths.is_empty());
    }
}
