use ridehail_dispatcher::ranking::CandidateRanker;
use ridehail_domain::models::GeoPoint;
use ridehail_testing_utils::DriverBuilder;

fn pickup() -> GeoPoint {
    GeoPoint::new(30.08917, 31.18961)
}

#[test]
fn test_rank_orders_by_squared_distance_ascending() {
    let ranker = CandidateRanker::new();
    let drivers = vec![
        DriverBuilder::new()
            .with_id(1)
            .with_location(30.20, 31.30)
            .connected("c1")
            .build(),
        DriverBuilder::new()
            .with_id(2)
            .with_location(30.09, 31.19)
            .connected("c2")
            .build(),
        DriverBuilder::new()
            .with_id(3)
            .with_location(30.12, 31.22)
            .connected("c3")
            .build(),
    ];

    let ranked = ranker.rank(pickup(), &drivers);
    let ids: Vec<i64> = ranked.iter().map(|c| c.driver_id).collect();
    assert_eq!(ids, vec![2, 3, 1]);

    // 距离字段单调不减
    for pair in ranked.windows(2) {
        assert!(pair[0].squared_distance <= pair[1].squared_distance);
    }
}

#[test]
fn test_rank_filters_drivers_without_connection() {
    let ranker = CandidateRanker::new();
    let drivers = vec![
        DriverBuilder::new()
            .with_id(1)
            .with_location(30.09, 31.19)
            .offline()
            .build(),
        DriverBuilder::new()
            .with_id(2)
            .with_location(30.20, 31.30)
            .connected("c2")
            .build(),
    ];

    let ranked = ranker.rank(pickup(), &drivers);
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].driver_id, 2);
    assert_eq!(ranked[0].connection_id.as_deref(), Some("c2"));
}

#[test]
fn test_rank_ties_keep_input_order() {
    let ranker = CandidateRanker::new();
    // 三位司机与上车点距离完全相同
    let drivers = vec![
        DriverBuilder::new()
            .with_id(5)
            .with_location(30.10, 31.20)
            .connected("c5")
            .build(),
        DriverBuilder::new()
            .with_id(3)
            .with_location(30.10, 31.20)
            .connected("c3")
            .build(),
        DriverBuilder::new()
            .with_id(8)
            .with_location(30.10, 31.20)
            .connected("c8")
            .build(),
    ];

    let ids: Vec<i64> = ranker
        .rank(pickup(), &drivers)
        .iter()
        .map(|c| c.driver_id)
        .collect();
    assert_eq!(ids, vec![5, 3, 8]);
}

#[test]
fn test_rank_is_deterministic() {
    let ranker = CandidateRanker::new();
    let drivers: Vec<_> = (1..=10)
        .map(|id| {
            DriverBuilder::new()
                .with_id(id)
                .with_location(30.0 + id as f64 * 0.01, 31.0)
                .connected(&format!("c{id}"))
                .build()
        })
        .collect();

    let first: Vec<i64> = ranker
        .rank(pickup(), &drivers)
        .iter()
        .map(|c| c.driver_id)
        .collect();
    let second: Vec<i64> = ranker
        .rank(pickup(), &drivers)
        .iter()
        .map(|c| c.driver_id)
        .collect();
    assert_eq!(first, second);
}

#[test]
fn test_rank_empty_input_yields_empty_sequence() {
    let ranker = CandidateRanker::new();
    assert!(ranker.rank(pickup(), &[]).is_empty());
}
