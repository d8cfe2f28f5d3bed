//! Mock implementations for the repository and port traits
//!
//! In-memory implementations with the same conditional-write semantics as
//! the SQLite repositories, usable without a database connection.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use ridehail_domain::events::PushMessage;
use ridehail_domain::models::{
    Driver, GeoPoint, NewDriver, NewRide, NewRider, Ride, Rider, RideStatus, VehicleClass,
};
use ridehail_domain::ports::{ConnectionRegistry, GeoLookup, PushChannel};
use ridehail_domain::repositories::{DriverRepository, RideRepository, RiderRepository};
use ridehail_errors::{DispatchError, DispatchResult};

/// Mock implementation of RideRepository for testing
#[derive(Debug, Clone)]
pub struct MockRideRepository {
    rides: Arc<Mutex<HashMap<i64, Ride>>>,
    next_id: Arc<Mutex<i64>>,
}

impl Default for MockRideRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRideRepository {
    pub fn new() -> Self {
        Self {
            rides: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    pub fn with_rides(rides: Vec<Ride>) -> Self {
        let mut map = HashMap::new();
        let mut max_id = 0;
        for ride in rides {
            if ride.id > max_id {
                max_id = ride.id;
            }
            map.insert(ride.id, ride);
        }
        Self {
            rides: Arc::new(Mutex::new(map)),
            next_id: Arc::new(Mutex::new(max_id + 1)),
        }
    }

    pub fn insert(&self, ride: Ride) {
        self.rides.lock().unwrap().insert(ride.id, ride);
    }

    pub fn count(&self) -> usize {
        self.rides.lock().unwrap().len()
    }

    pub fn get_all_rides(&self) -> Vec<Ride> {
        self.rides.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl RideRepository for MockRideRepository {
    async fn create(&self, ride: &NewRide) -> DispatchResult<Ride> {
        let mut rides = self.rides.lock().unwrap();
        let mut next_id = self.next_id.lock().unwrap();

        let now = Utc::now();
        let created = Ride {
            id: *next_id,
            rider_id: ride.rider_id,
            captain_id: None,
            pickup: ride.pickup.clone(),
            destination: ride.destination.clone(),
            pickup_point: None,
            vehicle: ride.vehicle,
            status: RideStatus::Pending,
            available_captains: vec![],
            current_captain_index: 0,
            otp: ride.otp.clone(),
            created_at: now,
            updated_at: now,
        };
        *next_id += 1;
        rides.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> DispatchResult<Option<Ride>> {
        let rides = self.rides.lock().unwrap();
        Ok(rides.get(&id).cloned())
    }

    async fn set_candidates_and_cursor(
        &self,
        ride_id: i64,
        pickup_point: GeoPoint,
        candidates: &[i64],
        cursor: i64,
    ) -> DispatchResult<bool> {
        let mut rides = self.rides.lock().unwrap();
        match rides.get_mut(&ride_id) {
            Some(ride) if ride.status == RideStatus::Pending => {
                ride.pickup_point = Some(pickup_point);
                ride.available_captains = candidates.to_vec();
                ride.current_captain_index = cursor;
                ride.updated_at = Utc::now();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(DispatchError::ride_not_found(ride_id)),
        }
    }

    async fn advance_cursor(
        &self,
        ride_id: i64,
        expected_cursor: i64,
        new_cursor: i64,
    ) -> DispatchResult<bool> {
        let mut rides = self.rides.lock().unwrap();
        match rides.get_mut(&ride_id) {
            Some(ride)
                if ride.status == RideStatus::Pending
                    && ride.current_captain_index == expected_cursor =>
            {
                ride.current_captain_index = new_cursor;
                ride.updated_at = Utc::now();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(DispatchError::ride_not_found(ride_id)),
        }
    }

    async fn compare_and_set_status(
        &self,
        ride_id: i64,
        expected_status: RideStatus,
        expected_cursor: Option<i64>,
        new_status: RideStatus,
        assigned_driver: Option<i64>,
    ) -> DispatchResult<bool> {
        let mut rides = self.rides.lock().unwrap();
        match rides.get_mut(&ride_id) {
            Some(ride) => {
                if ride.status != expected_status {
                    return Ok(false);
                }
                if let Some(cursor) = expected_cursor {
                    if ride.current_captain_index != cursor {
                        return Ok(false);
                    }
                }
                ride.status = new_status;
                if assigned_driver.is_some() {
                    ride.captain_id = assigned_driver;
                }
                ride.updated_at = Utc::now();
                Ok(true)
            }
            None => Err(DispatchError::ride_not_found(ride_id)),
        }
    }

    async fn get_pending_rides(&self) -> DispatchResult<Vec<Ride>> {
        let rides = self.rides.lock().unwrap();
        let mut pending: Vec<Ride> = rides
            .values()
            .filter(|r| r.status == RideStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.id);
        Ok(pending)
    }
}

/// Mock implementation of DriverRepository for testing
#[derive(Debug, Clone)]
pub struct MockDriverRepository {
    drivers: Arc<Mutex<HashMap<i64, Driver>>>,
    next_id: Arc<Mutex<i64>>,
}

impl Default for MockDriverRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriverRepository {
    pub fn new() -> Self {
        Self {
            drivers: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    pub fn with_drivers(drivers: Vec<Driver>) -> Self {
        let mut map = HashMap::new();
        let mut max_id = 0;
        for driver in drivers {
            if driver.id > max_id {
                max_id = driver.id;
            }
            map.insert(driver.id, driver);
        }
        Self {
            drivers: Arc::new(Mutex::new(map)),
            next_id: Arc::new(Mutex::new(max_id + 1)),
        }
    }

    pub fn insert(&self, driver: Driver) {
        self.drivers.lock().unwrap().insert(driver.id, driver);
    }
}

#[async_trait]
impl DriverRepository for MockDriverRepository {
    async fn register(&self, driver: &NewDriver) -> DispatchResult<Driver> {
        let mut drivers = self.drivers.lock().unwrap();
        let mut next_id = self.next_id.lock().unwrap();

        let created = Driver {
            id: *next_id,
            name: driver.name.clone(),
            vehicle: driver.vehicle,
            location: driver.location,
            connection_id: None,
            created_at: Utc::now(),
        };
        *next_id += 1;
        drivers.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> DispatchResult<Option<Driver>> {
        let drivers = self.drivers.lock().unwrap();
        Ok(drivers.get(&id).cloned())
    }

    async fn update_location(&self, driver_id: i64, location: GeoPoint) -> DispatchResult<()> {
        let mut drivers = self.drivers.lock().unwrap();
        let driver = drivers
            .get_mut(&driver_id)
            .ok_or(DispatchError::DriverNotFound { id: driver_id })?;
        driver.location = location;
        Ok(())
    }

    async fn update_connection(
        &self,
        driver_id: i64,
        connection_id: Option<&str>,
    ) -> DispatchResult<()> {
        let mut drivers = self.drivers.lock().unwrap();
        let driver = drivers
            .get_mut(&driver_id)
            .ok_or(DispatchError::DriverNotFound { id: driver_id })?;
        driver.connection_id = connection_id.map(str::to_string);
        Ok(())
    }

    async fn clear_connection(&self, connection_id: &str) -> DispatchResult<()> {
        let mut drivers = self.drivers.lock().unwrap();
        for driver in drivers.values_mut() {
            if driver.connection_id.as_deref() == Some(connection_id) {
                driver.connection_id = None;
            }
        }
        Ok(())
    }

    async fn get_in_radius(
        &self,
        center: GeoPoint,
        radius_km: f64,
        vehicle: Option<VehicleClass>,
    ) -> DispatchResult<Vec<Driver>> {
        let drivers = self.drivers.lock().unwrap();
        let mut found: Vec<Driver> = drivers
            .values()
            .filter(|d| d.connection_id.is_some())
            .filter(|d| vehicle.is_none_or(|v| d.vehicle == v))
            .filter(|d| d.location.haversine_km(&center) <= radius_km)
            .cloned()
            .collect();
        found.sort_by_key(|d| d.id);
        Ok(found)
    }
}

/// Mock implementation of RiderRepository for testing
#[derive(Debug, Clone)]
pub struct MockRiderRepository {
    riders: Arc<Mutex<HashMap<i64, Rider>>>,
    next_id: Arc<Mutex<i64>>,
}

impl Default for MockRiderRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRiderRepository {
    pub fn new() -> Self {
        Self {
            riders: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    pub fn insert(&self, rider: Rider) {
        self.riders.lock().unwrap().insert(rider.id, rider);
    }
}

#[async_trait]
impl RiderRepository for MockRiderRepository {
    async fn register(&self, rider: &NewRider) -> DispatchResult<Rider> {
        let mut riders = self.riders.lock().unwrap();
        let mut next_id = self.next_id.lock().unwrap();

        let created = Rider {
            id: *next_id,
            name: rider.name.clone(),
            connection_id: None,
            created_at: Utc::now(),
        };
        *next_id += 1;
        riders.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> DispatchResult<Option<Rider>> {
        let riders = self.riders.lock().unwrap();
        Ok(riders.get(&id).cloned())
    }

    async fn update_connection(
        &self,
        rider_id: i64,
        connection_id: Option<&str>,
    ) -> DispatchResult<()> {
        let mut riders = self.riders.lock().unwrap();
        let rider = riders
            .get_mut(&rider_id)
            .ok_or(DispatchError::RiderNotFound { id: rider_id })?;
        rider.connection_id = connection_id.map(str::to_string);
        Ok(())
    }

    async fn clear_connection(&self, connection_id: &str) -> DispatchResult<()> {
        let mut riders = self.riders.lock().unwrap();
        for rider in riders.values_mut() {
            if rider.connection_id.as_deref() == Some(connection_id) {
                rider.connection_id = None;
            }
        }
        Ok(())
    }
}

/// Recording push channel: tracks which connections are live and logs
/// every delivered message for assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingPushChannel {
    reachable: Arc<Mutex<HashSet<String>>>,
    deliveries: Arc<Mutex<Vec<(String, PushMessage)>>>,
}

impl RecordingPushChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a connection as live
    pub fn connect(&self, connection_id: &str) {
        self.reachable
            .lock()
            .unwrap()
            .insert(connection_id.to_string());
    }

    pub fn disconnect(&self, connection_id: &str) {
        self.reachable.lock().unwrap().remove(connection_id);
    }

    pub fn deliveries(&self) -> Vec<(String, PushMessage)> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn deliveries_for(&self, connection_id: &str) -> Vec<PushMessage> {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .filter(|(conn, _)| conn == connection_id)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    pub fn count_event(&self, event_name: &str) -> usize {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, msg)| msg.payload.event_name() == event_name)
            .count()
    }
}

#[async_trait]
impl PushChannel for RecordingPushChannel {
    async fn deliver(&self, connection_id: &str, message: &PushMessage) -> DispatchResult<bool> {
        if !self.reachable.lock().unwrap().contains(connection_id) {
            return Ok(false);
        }
        self.deliveries
            .lock()
            .unwrap()
            .push((connection_id.to_string(), message.clone()));
        Ok(true)
    }
}

#[async_trait]
impl ConnectionRegistry for RecordingPushChannel {
    async fn is_reachable(&self, connection_id: &str) -> bool {
        self.reachable.lock().unwrap().contains(connection_id)
    }
}

/// Mock geo lookup backed by a fixed address table
#[derive(Debug, Clone)]
pub struct MockGeoLookup {
    table: Arc<Mutex<HashMap<String, GeoPoint>>>,
    fallback: Option<GeoPoint>,
}

impl MockGeoLookup {
    /// Unknown addresses resolve to the default test coordinate
    pub fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(HashMap::new())),
            fallback: Some(GeoPoint::new(30.08917, 31.18961)),
        }
    }

    /// Unknown addresses fail instead of falling back
    pub fn strict() -> Self {
        Self {
            table: Arc::new(Mutex::new(HashMap::new())),
            fallback: None,
        }
    }

    pub fn with_address(self, address: &str, point: GeoPoint) -> Self {
        self.table
            .lock()
            .unwrap()
            .insert(address.to_string(), point);
        self
    }
}

impl Default for MockGeoLookup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GeoLookup for MockGeoLookup {
    async fn resolve(&self, address: &str) -> DispatchResult<GeoPoint> {
        if let Some(point) = self.table.lock().unwrap().get(address) {
            return Ok(*point);
        }
        self.fallback
            .ok_or_else(|| DispatchError::GeoLookup(format!("Unable to fetch coordinates: {address}")))
    }
}
