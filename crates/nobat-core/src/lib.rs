pub mod app_config;
pub mod config;
pub mod records;
pub mod status;

pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env, ConfigError, ScrapeConfig};
pub use records::{DoctorRecord, Office};
pub use status::{ErrorEntry, ProgressCounts, RetryState, RunState, StatusSnapshot};
