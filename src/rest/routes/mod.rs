pub mod devices;
pub mod events;
pub mod health;
pub mod profiles;
pub mod results;
pub mod telemetry;
