use std::sync::Arc;
use std::time::Duration;

use ridehail_dispatcher::ranking::Candidate;
use ridehail_dispatcher::sequencer::{CreateRideRequest, DispatchSequencer, SequencerConfig};
use ridehail_domain::models::{GeoPoint, NewRide, RideStatus, VehicleClass};
use ridehail_domain::repositories::RideRepository;
use ridehail_errors::DispatchError;
use ridehail_infrastructure::MetricsCollector;
use ridehail_testing_utils::{
    DriverBuilder, MockDriverRepository, MockGeoLookup, MockRideRepository, MockRiderRepository,
    RecordingPushChannel, RiderBuilder,
};

const PICKUP: GeoPoint = GeoPoint {
    lat: 30.08917,
    lng: 31.18961,
};

struct Harness {
    ride_repo: Arc<MockRideRepository>,
    driver_repo: Arc<MockDriverRepository>,
    rider_repo: Arc<MockRiderRepository>,
    push: Arc<RecordingPushChannel>,
    sequencer: Arc<DispatchSequencer>,
}

fn harness_with(geo: MockGeoLookup, offer_timeout: Duration) -> Harness {
    let ride_repo = Arc::new(MockRideRepository::new());
    let driver_repo = Arc::new(MockDriverRepository::new());
    let rider_repo = Arc::new(MockRiderRepository::new());
    let push = Arc::new(RecordingPushChannel::new());

    let sequencer = Arc::new(DispatchSequencer::new(
        ride_repo.clone(),
        driver_repo.clone(),
        rider_repo.clone(),
        push.clone(),
        push.clone(),
        Arc::new(geo),
        SequencerConfig {
            offer_timeout,
            ..SequencerConfig::default()
        },
        Arc::new(MetricsCollector::new().unwrap()),
    ));

    // 乘客1默认在线且推送连接可达
    rider_repo.insert(RiderBuilder::new().with_id(1).connected("rider-1").build());
    push.connect("rider-1");

    Harness {
        ride_repo,
        driver_repo,
        rider_repo,
        push,
        sequencer,
    }
}

fn harness() -> Harness {
    harness_with(MockGeoLookup::new(), Duration::from_secs(30))
}

impl Harness {
    /// 注册一位在线司机并让其推送连接可达
    fn seed_reachable_driver(&self, id: i64, lat: f64, lng: f64) {
        let conn = format!("driver-conn-{id}");
        self.driver_repo.insert(
            DriverBuilder::new()
                .with_id(id)
                .with_location(lat, lng)
                .connected(&conn)
                .build(),
        );
        self.push.connect(&conn);
    }

    /// 注册一位登记了连接但推送已失效的司机（僵尸连接）
    fn seed_dead_socket_driver(&self, id: i64, lat: f64, lng: f64) {
        let conn = format!("driver-conn-{id}");
        self.driver_repo.insert(
            DriverBuilder::new()
                .with_id(id)
                .with_location(lat, lng)
                .connected(&conn)
                .build(),
        );
        // 不在推送通道注册：投递返回 false
    }

    /// 注册一位离线司机（无连接标识）
    fn seed_offline_driver(&self, id: i64, lat: f64, lng: f64) {
        self.driver_repo.insert(
            DriverBuilder::new()
                .with_id(id)
                .with_location(lat, lng)
                .offline()
                .build(),
        );
    }

    async fn create_pending_ride(&self) -> i64 {
        let ride = self
            .ride_repo
            .create(&NewRide::new(1, "Dokki, Giza", "Maadi, Cairo", VehicleClass::Car))
            .await
            .unwrap();
        ride.id
    }

    async fn status_of(&self, ride_id: i64) -> RideStatus {
        self.ride_repo
            .get_by_id(ride_id)
            .await
            .unwrap()
            .unwrap()
            .status
    }

    async fn cursor_of(&self, ride_id: i64) -> i64 {
        self.ride_repo
            .get_by_id(ride_id)
            .await
            .unwrap()
            .unwrap()
            .current_captain_index
    }

    fn offers_to_driver(&self, id: i64) -> usize {
        self.push
            .deliveries_for(&format!("driver-conn-{id}"))
            .iter()
            .filter(|m| m.payload.event_name() == "new-ride")
            .count()
    }
}

fn candidates(ids: &[i64]) -> Vec<Candidate> {
    ids.iter()
        .map(|id| Candidate {
            driver_id: *id,
            connection_id: Some(format!("driver-conn-{id}")),
            squared_distance: 0.0,
        })
        .collect()
}

#[tokio::test]
async fn test_empty_candidate_list_cancels_immediately() {
    let h = harness();
    let ride_id = h.create_pending_ride().await;

    h.sequencer
        .on_candidates_ready(ride_id, PICKUP, vec![])
        .await
        .unwrap();

    assert_eq!(h.status_of(ride_id).await, RideStatus::Cancelled);
    assert_eq!(h.push.count_event("new-ride"), 0);
    assert_eq!(h.push.count_event("ride-cancelled"), 1);
    let to_rider = h.push.deliveries_for("rider-1");
    assert_eq!(to_rider.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_offer_times_out_and_advances_to_next_candidate() {
    let h = harness();
    h.seed_reachable_driver(1, 30.09, 31.19);
    h.seed_reachable_driver(2, 30.10, 31.20);
    let ride_id = h.create_pending_ride().await;

    h.sequencer
        .on_candidates_ready(ride_id, PICKUP, candidates(&[1, 2]))
        .await
        .unwrap();

    assert_eq!(h.offers_to_driver(1), 1);
    assert_eq!(h.offers_to_driver(2), 0);
    assert_eq!(h.cursor_of(ride_id).await, 0);

    // 30秒窗口结束，报价推进到第二位
    tokio::time::sleep(Duration::from_secs(31)).await;

    assert_eq!(h.offers_to_driver(2), 1);
    assert_eq!(h.cursor_of(ride_id).await, 1);
    assert_eq!(h.status_of(ride_id).await, RideStatus::Pending);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_candidates_skipped_without_consuming_timer() {
    let h = harness();
    h.seed_offline_driver(1, 30.09, 31.19);
    h.seed_dead_socket_driver(2, 30.09, 31.19);
    h.seed_reachable_driver(3, 30.10, 31.20);
    let ride_id = h.create_pending_ride().await;

    let before = tokio::time::Instant::now();
    h.sequencer
        .on_candidates_ready(ride_id, PICKUP, candidates(&[1, 2, 3]))
        .await
        .unwrap();

    // 两位不可达候选被跳过，没有消耗任何报价窗口
    assert_eq!(tokio::time::Instant::now(), before);
    assert_eq!(h.cursor_of(ride_id).await, 2);
    assert_eq!(h.offers_to_driver(3), 1);
    assert_eq!(h.status_of(ride_id).await, RideStatus::Pending);
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_after_k_timeouts_never_revisits() {
    let h = harness();
    for id in 1..=3 {
        h.seed_reachable_driver(id, 30.09, 31.19);
    }
    let ride_id = h.create_pending_ride().await;

    h.sequencer
        .on_candidates_ready(ride_id, PICKUP, candidates(&[1, 2, 3]))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(3 * 30 + 2)).await;

    assert_eq!(h.status_of(ride_id).await, RideStatus::Cancelled);
    // 每位候选恰好收到一次报价，从不回头
    for id in 1..=3 {
        assert_eq!(h.offers_to_driver(id), 1);
    }
    assert_eq!(h.push.count_event("ride-cancelled"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_decline_advances_immediately() {
    let h = harness();
    h.seed_reachable_driver(1, 30.09, 31.19);
    h.seed_reachable_driver(2, 30.10, 31.20);
    let ride_id = h.create_pending_ride().await;

    h.sequencer
        .on_candidates_ready(ride_id, PICKUP, candidates(&[1, 2]))
        .await
        .unwrap();

    let before = tokio::time::Instant::now();
    h.sequencer.on_driver_decline(ride_id, 1).await.unwrap();

    // 拒单等同超时，但不等待窗口
    assert_eq!(tokio::time::Instant::now(), before);
    assert_eq!(h.offers_to_driver(2), 1);
    assert_eq!(h.cursor_of(ride_id).await, 1);

    h.sequencer.on_driver_decline(ride_id, 2).await.unwrap();
    assert_eq!(h.status_of(ride_id).await, RideStatus::Cancelled);
}

#[tokio::test]
async fn test_decline_from_out_of_turn_driver_is_noop() {
    let h = harness();
    h.seed_reachable_driver(1, 30.09, 31.19);
    h.seed_reachable_driver(2, 30.10, 31.20);
    let ride_id = h.create_pending_ride().await;

    h.sequencer
        .on_candidates_ready(ride_id, PICKUP, candidates(&[1, 2]))
        .await
        .unwrap();

    // 司机2还没被报价，它的拒单不得推进游标
    h.sequencer.on_driver_decline(ride_id, 2).await.unwrap();
    assert_eq!(h.cursor_of(ride_id).await, 0);
    assert_eq!(h.offers_to_driver(2), 0);
}

#[tokio::test]
async fn test_accept_assigns_driver_and_notifies_rider() {
    let h = harness();
    h.seed_reachable_driver(1, 30.09, 31.19);
    let ride_id = h.create_pending_ride().await;

    h.sequencer
        .on_candidates_ready(ride_id, PICKUP, candidates(&[1]))
        .await
        .unwrap();

    let ride = h.sequencer.on_driver_accept(ride_id, 1).await.unwrap();
    assert_eq!(ride.status, RideStatus::Accepted);
    assert_eq!(ride.captain_id, Some(1));

    let to_rider = h.push.deliveries_for("rider-1");
    assert_eq!(to_rider.len(), 1);
    assert_eq!(to_rider[0].payload.event_name(), "ride-confirmed");
}

#[tokio::test]
async fn test_accept_from_out_of_turn_driver_is_rejected() {
    let h = harness();
    h.seed_reachable_driver(1, 30.09, 31.19);
    h.seed_reachable_driver(2, 30.10, 31.20);
    let ride_id = h.create_pending_ride().await;

    h.sequencer
        .on_candidates_ready(ride_id, PICKUP, candidates(&[1, 2]))
        .await
        .unwrap();

    let result = h.sequencer.on_driver_accept(ride_id, 2).await;
    assert!(matches!(
        result,
        Err(DispatchError::RideNotAvailable { .. })
    ));
    // 被拒的接单不产生任何副作用
    assert_eq!(h.status_of(ride_id).await, RideStatus::Pending);
    assert_eq!(h.cursor_of(ride_id).await, 0);
    assert_eq!(h.push.count_event("ride-confirmed"), 0);
}

#[tokio::test]
async fn test_accept_on_resolved_ride_is_conflict() {
    let h = harness();
    h.seed_reachable_driver(1, 30.09, 31.19);
    let ride_id = h.create_pending_ride().await;

    h.sequencer
        .on_candidates_ready(ride_id, PICKUP, candidates(&[1]))
        .await
        .unwrap();
    h.sequencer.on_rider_cancel(ride_id).await.unwrap();

    let result = h.sequencer.on_driver_accept(ride_id, 1).await;
    assert!(matches!(
        result,
        Err(DispatchError::RideNotAvailable { .. })
    ));
}

#[tokio::test]
async fn test_concurrent_accepts_exactly_one_wins() {
    let h = harness();
    for id in 1..=3 {
        h.seed_reachable_driver(id, 30.09, 31.19);
    }
    let ride_id = h.create_pending_ride().await;

    h.sequencer
        .on_candidates_ready(ride_id, PICKUP, candidates(&[1, 2, 3]))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for driver_id in [1, 2, 3, 1, 2, 3, 1, 1] {
        let sequencer = h.sequencer.clone();
        handles.push(tokio::spawn(async move {
            sequencer.on_driver_accept(ride_id, driver_id).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            winners += 1;
        }
    }

    assert_eq!(winners, 1);
    let ride = h.ride_repo.get_by_id(ride_id).await.unwrap().unwrap();
    assert_eq!(ride.status, RideStatus::Accepted);
    assert_eq!(ride.captain_id, Some(1));
    assert_eq!(h.push.count_event("ride-confirmed"), 1);
}

#[tokio::test]
async fn test_stale_timer_fire_is_pure_noop() {
    let h = harness();
    h.seed_reachable_driver(1, 30.09, 31.19);
    h.seed_reachable_driver(2, 30.10, 31.20);
    let ride_id = h.create_pending_ride().await;

    h.sequencer
        .on_candidates_ready(ride_id, PICKUP, candidates(&[1, 2]))
        .await
        .unwrap();
    h.sequencer.on_driver_accept(ride_id, 1).await.unwrap();

    let deliveries_before = h.push.deliveries().len();

    // 行程已接单，位置0的定时器触发必须不改状态、不发事件
    h.sequencer.on_offer_timer_fired(ride_id, 0).await.unwrap();
    // 游标从未到过的位置同理
    h.sequencer.on_offer_timer_fired(ride_id, 5).await.unwrap();

    let ride = h.ride_repo.get_by_id(ride_id).await.unwrap().unwrap();
    assert_eq!(ride.status, RideStatus::Accepted);
    assert_eq!(ride.captain_id, Some(1));
    assert_eq!(h.push.deliveries().len(), deliveries_before);
}

#[tokio::test(start_paused = true)]
async fn test_rider_cancel_invalidates_pending_offer_timer() {
    let h = harness();
    h.seed_reachable_driver(1, 30.09, 31.19);
    h.seed_reachable_driver(2, 30.10, 31.20);
    let ride_id = h.create_pending_ride().await;

    h.sequencer
        .on_candidates_ready(ride_id, PICKUP, candidates(&[1, 2]))
        .await
        .unwrap();
    h.sequencer.on_rider_cancel(ride_id).await.unwrap();
    assert_eq!(h.status_of(ride_id).await, RideStatus::Cancelled);

    // 位置0的定时器仍会触发，但守卫让它变成no-op，司机2永远不会被报价
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(h.offers_to_driver(2), 0);
    assert_eq!(h.status_of(ride_id).await, RideStatus::Cancelled);
}

#[tokio::test]
async fn test_rider_cancel_broadcasts_once_and_is_idempotent() {
    let h = harness();
    // 两位同车型在线司机在广播半径内，一位bike不受影响
    h.seed_reachable_driver(1, 30.09, 31.19);
    h.seed_reachable_driver(2, 30.095, 31.192);
    let conn = "driver-conn-9";
    h.driver_repo.insert(
        DriverBuilder::new()
            .with_id(9)
            .with_vehicle(VehicleClass::Bike)
            .with_location(30.09, 31.19)
            .connected(conn)
            .build(),
    );
    h.push.connect(conn);

    let ride_id = h.create_pending_ride().await;
    h.sequencer
        .on_candidates_ready(ride_id, PICKUP, candidates(&[1, 2]))
        .await
        .unwrap();

    let cancelled = h.sequencer.on_rider_cancel(ride_id).await.unwrap();
    assert_eq!(cancelled.status, RideStatus::Cancelled);

    let broadcast_after_first = h.push.count_event("ride-cancelled");
    assert_eq!(broadcast_after_first, 2, "取消应广播给附近同车型司机");
    assert_eq!(
        h.push
            .deliveries_for(conn)
            .iter()
            .filter(|m| m.payload.event_name() == "ride-cancelled")
            .count(),
        0,
        "不同车型的司机不在广播范围内"
    );

    // 再次取消：幂等成功，不再广播
    let again = h.sequencer.on_rider_cancel(ride_id).await.unwrap();
    assert_eq!(again.status, RideStatus::Cancelled);
    assert_eq!(h.push.count_event("ride-cancelled"), broadcast_after_first);
}

#[tokio::test]
async fn test_cancel_of_accepted_ride_is_rejected() {
    let h = harness();
    h.seed_reachable_driver(1, 30.09, 31.19);
    let ride_id = h.create_pending_ride().await;

    h.sequencer
        .on_candidates_ready(ride_id, PICKUP, candidates(&[1]))
        .await
        .unwrap();
    h.sequencer.on_driver_accept(ride_id, 1).await.unwrap();

    let result = h.sequencer.on_rider_cancel(ride_id).await;
    assert!(matches!(
        result,
        Err(DispatchError::RideNotAvailable { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_scenario_skip_timeout_then_accept() {
    // 候选 = [D1(不可达), D2(可达), D3(可达)]：
    // D1被瞬间跳过，D2报价30秒后超时，D3在t=31s接单
    let h = harness();
    h.seed_offline_driver(1, 30.09, 31.19);
    h.seed_reachable_driver(2, 30.10, 31.20);
    h.seed_reachable_driver(3, 30.11, 31.21);
    let ride_id = h.create_pending_ride().await;

    h.sequencer
        .on_candidates_ready(ride_id, PICKUP, candidates(&[1, 2, 3]))
        .await
        .unwrap();

    assert_eq!(h.offers_to_driver(2), 1);
    assert_eq!(h.offers_to_driver(3), 0);

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(h.offers_to_driver(3), 1);

    let ride = h.sequencer.on_driver_accept(ride_id, 3).await.unwrap();
    assert_eq!(ride.status, RideStatus::Accepted);
    assert_eq!(ride.captain_id, Some(3));
}

#[tokio::test(start_paused = true)]
async fn test_create_ride_runs_ranking_in_background() {
    let geo = MockGeoLookup::new().with_address("Tahrir Square", GeoPoint::new(30.0444, 31.2357));
    let h = harness_with(geo, Duration::from_secs(30));
    // 近处司机后注册，排序必须按距离而不是注册顺序
    h.seed_reachable_driver(1, 30.10, 31.30);
    h.seed_reachable_driver(2, 30.045, 31.236);
    let ride = h
        .sequencer
        .create_ride(CreateRideRequest {
            rider_id: 1,
            pickup: "Tahrir Square".to_string(),
            destination: "Maadi, Cairo".to_string(),
            vehicle: VehicleClass::Car,
        })
        .await
        .unwrap();
    assert_eq!(ride.status, RideStatus::Pending);
    assert!(ride.available_captains.is_empty());

    // 等后台派单任务完成候选落库与首次报价
    tokio::time::sleep(Duration::from_millis(10)).await;

    let dispatched = h.ride_repo.get_by_id(ride.id).await.unwrap().unwrap();
    assert_eq!(dispatched.available_captains, vec![2, 1]);
    assert_eq!(h.offers_to_driver(2), 1);
    assert_eq!(h.offers_to_driver(1), 0);
}

#[tokio::test]
async fn test_geo_lookup_failure_cancels_like_empty_list() {
    let h = harness_with(MockGeoLookup::strict(), Duration::from_secs(30));
    h.seed_reachable_driver(1, 30.09, 31.19);
    let ride_id = h.create_pending_ride().await;

    h.sequencer.dispatch_ride(ride_id).await.unwrap();

    assert_eq!(h.status_of(ride_id).await, RideStatus::Cancelled);
    assert_eq!(h.push.count_event("new-ride"), 0);
    assert_eq!(h.push.count_event("ride-cancelled"), 1);
}

#[tokio::test]
async fn test_ride_start_requires_matching_otp_and_driver() {
    let h = harness();
    h.seed_reachable_driver(1, 30.09, 31.19);
    let ride_id = h.create_pending_ride().await;
    let otp = h
        .ride_repo
        .get_by_id(ride_id)
        .await
        .unwrap()
        .unwrap()
        .otp
        .clone();

    h.sequencer
        .on_candidates_ready(ride_id, PICKUP, candidates(&[1]))
        .await
        .unwrap();
    h.sequencer.on_driver_accept(ride_id, 1).await.unwrap();

    // 错误验证码
    let bad_otp = if otp == "000000" { "111111" } else { "000000" };
    let result = h.sequencer.on_ride_start(ride_id, 1, bad_otp).await;
    assert!(matches!(result, Err(DispatchError::InvalidOtp { .. })));

    // 非接单司机
    let result = h.sequencer.on_ride_start(ride_id, 2, &otp).await;
    assert!(matches!(
        result,
        Err(DispatchError::RideNotAvailable { .. })
    ));

    let ride = h.sequencer.on_ride_start(ride_id, 1, &otp).await.unwrap();
    assert_eq!(ride.status, RideStatus::Ongoing);
    assert_eq!(h.push.count_event("ride-started"), 1);
}

#[tokio::test]
async fn test_ride_end_completes_ongoing_ride() {
    let h = harness();
    h.seed_reachable_driver(1, 30.09, 31.19);
    let ride_id = h.create_pending_ride().await;
    let otp = h
        .ride_repo
        .get_by_id(ride_id)
        .await
        .unwrap()
        .unwrap()
        .otp
        .clone();

    h.sequencer
        .on_candidates_ready(ride_id, PICKUP, candidates(&[1]))
        .await
        .unwrap();
    h.sequencer.on_driver_accept(ride_id, 1).await.unwrap();

    // 行程未开始时不能结束
    let result = h.sequencer.on_ride_end(ride_id, 1).await;
    assert!(matches!(
        result,
        Err(DispatchError::RideNotAvailable { .. })
    ));

    h.sequencer.on_ride_start(ride_id, 1, &otp).await.unwrap();
    let ride = h.sequencer.on_ride_end(ride_id, 1).await.unwrap();
    assert_eq!(ride.status, RideStatus::Completed);
    assert_eq!(h.push.count_event("ride-ended"), 1);
}

#[tokio::test]
async fn test_rider_offline_does_not_fail_dispatch() {
    let h = harness();
    // 乘客2没有任何连接
    h.rider_repo
        .insert(RiderBuilder::new().with_id(2).build());
    let ride = h
        .ride_repo
        .create(&NewRide::new(2, "Dokki, Giza", "Maadi, Cairo", VehicleClass::Car))
        .await
        .unwrap();

    h.sequencer
        .on_candidates_ready(ride.id, PICKUP, vec![])
        .await
        .unwrap();

    // 通知送不出去，但行程照常收敛
    assert_eq!(h.status_of(ride.id).await, RideStatus::Cancelled);
    assert_eq!(h.push.count_event("ride-cancelled"), 0);
}
