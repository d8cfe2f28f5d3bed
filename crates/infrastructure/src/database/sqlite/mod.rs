pub mod sqlite_driver_repository;
pub mod sqlite_ride_repository;
pub mod sqlite_rider_repository;

pub use sqlite_driver_repository::SqliteDriverRepository;
pub use sqlite_ride_repository::SqliteRideRepository;
pub use sqlite_rider_repository::SqliteRiderRepository;
