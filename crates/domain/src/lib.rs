pub mod events;
pub mod models;
pub mod ports;
pub mod repositories;

pub use events::*;
pub use models::*;
pub use ports::*;
pub use repositories::*;
pub use ridehail_errors::{DispatchError, DispatchResult};
