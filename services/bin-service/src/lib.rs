//! Waste-bin telemetry service: sensor ingestion, bin registry, proximity
//! search and the notification feed.

pub mod app;
pub mod bin_handlers;
pub mod bins;
pub mod config;
pub mod error;
pub mod geo;
pub mod ingest;
pub mod listing;
pub mod model;
pub mod notification_handlers;
pub mod notifications;
pub mod proximity;
pub mod sensor_handlers;
pub mod status;
pub mod store;

pub use error::{CoreError, CoreResult};
