pub mod database;
pub mod geo_lookup;
pub mod metrics_collector;
pub mod push_gateway;

pub use database::sqlite::{SqliteDriverRepository, SqliteRideRepository, SqliteRiderRepository};
pub use database::{create_pool, init_schema};
pub use geo_lookup::StaticGeoLookup;
pub use metrics_collector::MetricsCollector;
pub use push_gateway::InProcessPushGateway;
