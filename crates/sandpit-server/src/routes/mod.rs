//! HTTP routes.

pub mod exec;
pub mod health;
pub mod home;
pub mod transform;

pub use exec::{NO_OUTPUT, exec_handler};
pub use health::{HealthResponse, health_routes};
pub use home::home_handler;
pub use transform::{TransformParams, transform_handler};
