//! Test data builders for creating test entities
//!
//! Builder patterns with sensible defaults and easy customization.

use chrono::Utc;

use ridehail_domain::models::{Driver, GeoPoint, Ride, Rider, RideStatus, VehicleClass};

/// Builder for creating test Ride entities
pub struct RideBuilder {
    ride: Ride,
}

impl RideBuilder {
    pub fn new() -> Self {
        Self {
            ride: Ride {
                id: 1,
                rider_id: 1,
                captain_id: None,
                pickup: "Dokki, Giza".to_string(),
                destination: "Maadi, Cairo".to_string(),
                pickup_point: None,
                vehicle: VehicleClass::Car,
                status: RideStatus::Pending,
                available_captains: vec![],
                current_captain_index: 0,
                otp: "123456".to_string(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.ride.id = id;
        self
    }

    pub fn with_rider_id(mut self, rider_id: i64) -> Self {
        self.ride.rider_id = rider_id;
        self
    }

    pub fn with_captain(mut self, captain_id: i64) -> Self {
        self.ride.captain_id = Some(captain_id);
        self
    }

    pub fn with_pickup(mut self, pickup: &str) -> Self {
        self.ride.pickup = pickup.to_string();
        self
    }

    pub fn with_pickup_point(mut self, point: GeoPoint) -> Self {
        self.ride.pickup_point = Some(point);
        self
    }

    pub fn with_vehicle(mut self, vehicle: VehicleClass) -> Self {
        self.ride.vehicle = vehicle;
        self
    }

    pub fn with_status(mut self, status: RideStatus) -> Self {
        self.ride.status = status;
        self
    }

    pub fn with_candidates(mut self, candidates: Vec<i64>) -> Self {
        self.ride.available_captains = candidates;
        self
    }

    pub fn with_cursor(mut self, cursor: i64) -> Self {
        self.ride.current_captain_index = cursor;
        self
    }

    pub fn with_otp(mut self, otp: &str) -> Self {
        self.ride.otp = otp.to_string();
        self
    }

    pub fn accepted_by(mut self, captain_id: i64) -> Self {
        self.ride.status = RideStatus::Accepted;
        self.ride.captain_id = Some(captain_id);
        self
    }

    pub fn build(self) -> Ride {
        self.ride
    }
}

impl Default for RideBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test Driver entities
pub struct DriverBuilder {
    driver: Driver,
}

impl DriverBuilder {
    pub fn new() -> Self {
        Self {
            driver: Driver {
                id: 1,
                name: "Ahmed".to_string(),
                vehicle: VehicleClass::Car,
                location: GeoPoint::new(30.08917, 31.18961),
                connection_id: None,
                created_at: Utc::now(),
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.driver.id = id;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.driver.name = name.to_string();
        self
    }

    pub fn with_vehicle(mut self, vehicle: VehicleClass) -> Self {
        self.driver.vehicle = vehicle;
        self
    }

    pub fn with_location(mut self, lat: f64, lng: f64) -> Self {
        self.driver.location = GeoPoint::new(lat, lng);
        self
    }

    pub fn connected(mut self, connection_id: &str) -> Self {
        self.driver.connection_id = Some(connection_id.to_string());
        self
    }

    pub fn offline(mut self) -> Self {
        self.driver.connection_id = None;
        self
    }

    pub fn build(self) -> Driver {
        self.driver
    }
}

impl Default for DriverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test Rider entities
pub struct RiderBuilder {
    rider: Rider,
}

impl RiderBuilder {
    pub fn new() -> Self {
        Self {
            rider: Rider {
                id: 1,
                name: "Mona".to_string(),
                connection_id: None,
                created_at: Utc::now(),
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.rider.id = id;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.rider.name = name.to_string();
        self
    }

    pub fn connected(mut self, connection_id: &str) -> Self {
        self.rider.connection_id = Some(connection_id.to_string());
        self
    }

    pub fn build(self) -> Rider {
        self.rider
    }
}

impl Default for RiderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
