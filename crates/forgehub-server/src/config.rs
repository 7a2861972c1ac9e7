use serde::Serialize;
use std::time::Duration;

pub const CONFIG_SCHEMA_VERSION: &str = "1";

#[derive(Debug, Clone, Serialize)]
pub struct ApiConfig {
    pub max_body_bytes: usize,
    pub max_file_bytes: usize,
    pub max_files_per_checkin: usize,
    pub max_activity_records: usize,
    pub activity_feed_limit: usize,
    pub slow_request_threshold: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 64 * 1024 * 1024,
            max_file_bytes: 16 * 1024 * 1024,
            max_files_per_checkin: 64,
            max_activity_records: 10_000,
            activity_feed_limit: 50,
            slow_request_threshold: Duration::from_millis(500),
        }
    }
}

pub fn validate_startup_config_contract(api: &ApiConfig) -> Result<(), String> {
    if api.max_body_bytes == 0 || api.max_file_bytes == 0 {
        return Err("payload size limits must be > 0".to_string());
    }
    if api.max_file_bytes > api.max_body_bytes {
        return Err("max_file_bytes must not exceed max_body_bytes".to_string());
    }
    if api.max_files_per_checkin == 0 {
        return Err("max_files_per_checkin must be > 0".to_string());
    }
    if api.max_activity_records == 0 || api.activity_feed_limit == 0 {
        return Err("activity limits must be > 0".to_string());
    }
    Ok(())
}
