use std::sync::Arc;
use std::time::Duration;

use ridehail_dispatcher::sequencer::{CreateRideRequest, DispatchSequencer, SequencerConfig};
use ridehail_domain::models::VehicleClass;
use ridehail_domain::RideRepository;
use ridehail_infrastructure::MetricsCollector;
use ridehail_testing_utils::{
    DriverBuilder, MockDriverRepository, MockGeoLookup, MockRideRepository, MockRiderRepository,
    RecordingPushChannel, RiderBuilder,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== 派单状态机演示 ===\n");

    let ride_repo = Arc::new(MockRideRepository::new());
    let driver_repo = Arc::new(MockDriverRepository::new());
    let rider_repo = Arc::new(MockRiderRepository::new());
    let push = Arc::new(RecordingPushChannel::new());

    // 演示用2秒报价窗口，生产配置为30秒
    let sequencer = Arc::new(DispatchSequencer::new(
        ride_repo.clone(),
        driver_repo.clone(),
        rider_repo.clone(),
        push.clone(),
        push.clone(),
        Arc::new(MockGeoLookup::new()),
        SequencerConfig {
            offer_timeout: Duration::from_secs(2),
            ..SequencerConfig::default()
        },
        Arc::new(MetricsCollector::new()?),
    ));

    println!("1. 注册乘客与司机:");
    rider_repo.insert(RiderBuilder::new().with_id(1).connected("rider-1").build());
    // 司机1离线，司机2距上车点更远，司机3最近
    driver_repo.insert(
        DriverBuilder::new()
            .with_id(1)
            .with_name("Omar")
            .with_location(30.090, 31.190)
            .offline()
            .build(),
    );
    driver_repo.insert(
        DriverBuilder::new()
            .with_id(2)
            .with_name("Ahmed")
            .with_location(30.150, 31.250)
            .connected("driver-2")
            .build(),
    );
    driver_repo.insert(
        DriverBuilder::new()
            .with_id(3)
            .with_name("Youssef")
            .with_location(30.090, 31.190)
            .connected("driver-3")
            .build(),
    );
    push.connect("driver-2");
    push.connect("driver-3");
    println!("   Omar: 离线   Ahmed: 在线(较远)   Youssef: 在线(最近)\n");

    println!("2. 创建行程，后台开始派单:");
    let ride = sequencer
        .create_ride(CreateRideRequest {
            rider_id: 1,
            pickup: "Dokki, Giza".to_string(),
            destination: "Maadi, Cairo".to_string(),
            vehicle: VehicleClass::Car,
        })
        .await?;
    println!("   行程 {} 已创建，状态: {}\n", ride.id, ride.status);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let dispatched = ride_repo.get_by_id(ride.id).await?.unwrap();
    println!("3. 候选排序结果（按距离升序）:");
    println!("   {:?}，当前报价位置: {}\n", dispatched.available_captains, dispatched.current_captain_index);

    println!("4. 最近的司机不应答，等待报价窗口超时...");
    tokio::time::sleep(Duration::from_millis(2200)).await;
    let advanced = ride_repo.get_by_id(ride.id).await?.unwrap();
    println!("   游标推进到位置 {}，报价转给下一位\n", advanced.current_captain_index);

    println!("5. 第二位司机接单:");
    let accepted = sequencer.on_driver_accept(ride.id, 2).await?;
    println!(
        "   行程 {} 状态: {}，司机: {:?}\n",
        accepted.id, accepted.status, accepted.captain_id
    );

    println!("6. 过期接单被拒绝:");
    match sequencer.on_driver_accept(ride.id, 3).await {
        Err(e) => println!("   司机3: {}", e.user_message()),
        Ok(_) => unreachable!(),
    }

    println!("\n7. 推送事件流水:");
    for (connection, message) in push.deliveries() {
        println!("   {} <- {}", connection, message.payload.event_name());
    }

    Ok(())
}
