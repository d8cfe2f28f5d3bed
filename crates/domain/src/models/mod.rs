pub mod driver;
pub mod geo;
pub mod ride;
pub mod rider;

pub use driver::{Driver, NewDriver, VehicleClass};
pub use geo::GeoPoint;
pub use ride::{NewRide, Ride, RideStatus};
pub use rider::{NewRider, Rider};
