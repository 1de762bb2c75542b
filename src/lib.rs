pub mod dispatch;
pub mod error;
pub mod extract;
pub mod model;
pub mod output;
pub mod sample;
pub mod telemetry;
