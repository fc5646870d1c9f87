//! MW telemetry collaborator
//!
//! The correlation engine asks two questions about microwave equipment: is a
//! radio hop fading, and is a site running on battery. Both are answered by a
//! [`TelemetryClient`]. Any error is treated as "no signal" by the engine.

use crate::error::{DashboardError, Result};
use serde::{Deserialize, Serialize};

/// Result code of a successful telemetry check
pub const RESULT_OK: &str = "1111";
/// Equipment unknown to the telemetry collector
pub const RESULT_NOT_FOUND: &str = "9998";
/// Collection failed on the remote side
pub const RESULT_COLLECTION_FAILED: &str = "0000";
/// Required parameters were missing
pub const RESULT_MISSING_PARAMS: &str = "9999";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadingStatus {
    Fading,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerStatus {
    Battery,
    Mains,
}

/// Fading check request body
#[derive(Debug, Clone, Serialize)]
pub struct FadingRequest<'a> {
    pub source_equip_id: &'a str,
    pub target_equip_id: &'a str,
    pub check_type: &'static str,
}

impl<'a> FadingRequest<'a> {
    pub fn new(source_equip_id: &'a str, target_equip_id: &'a str) -> Self {
        Self {
            source_equip_id,
            target_equip_id,
            check_type: "fading_analysis",
        }
    }
}

/// Power check request body
#[derive(Debug, Clone, Serialize)]
pub struct PowerRequest<'a> {
    pub equip_id: &'a str,
    pub guksa_name: &'a str,
    pub check_type: &'static str,
}

impl<'a> PowerRequest<'a> {
    pub fn new(equip_id: &'a str, guksa_name: &'a str) -> Self {
        Self {
            equip_id,
            guksa_name,
            check_type: "power_analysis",
        }
    }
}

fn check_result_code(code: Option<&str>, message: Option<&str>) -> Result<()> {
    match code {
        None | Some(RESULT_OK) => Ok(()),
        Some(code) => Err(DashboardError::Rejected(format!(
            "telemetry result {}: {}",
            code,
            message.unwrap_or("no message")
        ))),
    }
}

/// Fading check response body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FadingResponse {
    #[serde(default)]
    pub is_fading: String,
    #[serde(default)]
    pub result_code: Option<String>,
    #[serde(default)]
    pub result_msg: Option<String>,
}

impl FadingResponse {
    pub fn status(&self) -> Result<FadingStatus> {
        check_result_code(self.result_code.as_deref(), self.result_msg.as_deref())?;
        Ok(if self.is_fading == "fading" {
            FadingStatus::Fading
        } else {
            FadingStatus::Normal
        })
    }
}

/// Power check response body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PowerResponse {
    #[serde(default)]
    pub battery_mode: String,
    #[serde(default)]
    pub result_code: Option<String>,
    #[serde(default)]
    pub result_msg: Option<String>,
}

impl PowerResponse {
    pub fn status(&self) -> Result<PowerStatus> {
        check_result_code(self.result_code.as_deref(), self.result_msg.as_deref())?;
        Ok(if self.battery_mode == "battery" {
            PowerStatus::Battery
        } else {
            PowerStatus::Mains
        })
    }
}

/// Source of MW fading and power telemetry
#[cfg_attr(test, mockall::automock)]
pub trait TelemetryClient: Send + Sync {
    /// Check whether the radio hop between two MW endpoints is fading
    fn check_fading(&self, source_id: &str, target_id: &str) -> Result<FadingStatus>;

    /// Check whether a MW site is running on battery. `site` may be empty.
    fn check_power(&self, equip_id: &str, site: &str) -> Result<PowerStatus>;
}

/// Telemetry that always reports healthy equipment
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl TelemetryClient for NoopTelemetry {
    fn check_fading(&self, _source_id: &str, _target_id: &str) -> Result<FadingStatus> {
        Ok(FadingStatus::Normal)
    }

    fn check_power(&self, _equip_id: &str, _site: &str) -> Result<PowerStatus> {
        Ok(PowerStatus::Mains)
    }
}
