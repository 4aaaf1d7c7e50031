//! Ingestion request/response types and payload validation.

use serde::{Deserialize, Serialize};

pub const HEART_RATE_MIN: f64 = 30.0;
pub const HEART_RATE_MAX: f64 = 250.0;

/// One telemetry sample as reported by a wearable:
/// its own heart rate plus the distance to the nearest peer device.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRequest {
    pub device_id: String,
    pub nearby_device_id: String,
    pub distance: f64,
    pub heart_rate: f64,
}

impl TelemetryRequest {
    /// Every violated constraint, in declaration order. Empty = valid.
    pub fn validate(&self) -> Vec<String> {
        let mut violations = Vec::new();
        if self.device_id.trim().is_empty() {
            violations.push("deviceId must not be empty".to_string());
        }
        if self.nearby_device_id.trim().is_empty() {
            violations.push("nearbyDeviceId must not be empty".to_string());
        }
        if !self.distance.is_finite() || self.distance < 0.0 {
            violations.push("distance must be 0 or greater".to_string());
        }
        if !self.heart_rate.is_finite()
            || self.heart_rate < HEART_RATE_MIN
            || self.heart_rate > HEART_RATE_MAX
        {
            violations.push("heartRate must be between 30 and 250".to_string());
        }
        violations
    }
}

/// Echo of a successfully persisted sample.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryAck {
    pub event_id: String,
    pub device_id: String,
    pub timestamp_ms: i64,
    pub heart_rate: i64,
    pub nearby_device_id: String,
    /// Meters, rounded to the stored integer value.
    pub distance: i64,
}
