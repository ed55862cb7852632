pub mod api;
pub mod client;
pub mod credentials;
pub mod error;
pub mod models;
pub mod readiness;
pub mod registration;
pub mod sensor;
pub mod settings;

pub use api::LaundrifyApi;
pub use client::{ApiClient, RequestOptions, RetryPolicy};
pub use credentials::{CredentialRecord, CredentialStore};
pub use error::Error;
pub use models::{Machine, MachineStatus};
pub use readiness::Readiness;
pub use sensor::{ContactSensorState, SensorReading};
pub use settings::Settings;
