pub mod geo;
pub mod push;

pub use geo::GeoLookup;
pub use push::{ConnectionRegistry, PushChannel};
