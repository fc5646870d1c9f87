//! Signal-level heuristics behind the MW telemetry checks
//!
//! A hop is considered fading when its average SNR is low and either the bit
//! error rate is high or the link is unstable (high SNR or BER variance). A
//! site is on battery when its rectifier input voltage drops below the
//! battery threshold or the power controller says so.

use super::telemetry::{FadingStatus, PowerStatus, TelemetryClient};
use crate::error::{DashboardError, Result};
use serde::{Deserialize, Serialize};

pub const SNR_THRESHOLD_DB: f64 = 25.0;
pub const BER_THRESHOLD: f64 = 1e-4;
pub const SNR_VARIANCE_THRESHOLD: f64 = 10.0;
pub const BER_VARIANCE_THRESHOLD: f64 = 1e-6;

/// Input voltage below which a site is assumed to run on battery
pub const BATTERY_VOLTAGE_THRESHOLD: f64 = 200.0;
/// Normal rectifier input range
pub const NORMAL_VOLTAGE_RANGE: (f64, f64) = (210.0, 250.0);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalSample {
    pub snr_db: f64,
    pub ber: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FadingAnalysis {
    pub samples: usize,
    pub avg_snr_db: f64,
    pub avg_ber: f64,
    pub snr_variance: f64,
    pub ber_variance: f64,
    pub is_fading: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerSample {
    pub input_voltage: f64,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PowerAnalysis {
    pub input_voltage: f64,
    pub battery_mode: bool,
    pub within_normal_range: bool,
}

fn mean_and_variance(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let n = values.clone().count() as f64;
    let mean = values.clone().sum::<f64>() / n;
    let variance = values.map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance)
}

/// Analyze a window of SNR/BER samples; `None` when there are no samples
pub fn analyze_fading(samples: &[SignalSample]) -> Option<FadingAnalysis> {
    if samples.is_empty() {
        return None;
    }

    let (avg_snr_db, snr_variance) = mean_and_variance(samples.iter().map(|s| s.snr_db));
    let (avg_ber, ber_variance) = mean_and_variance(samples.iter().map(|s| s.ber));

    let low_snr = avg_snr_db < SNR_THRESHOLD_DB;
    let high_ber = avg_ber > BER_THRESHOLD;
    let unstable = snr_variance > SNR_VARIANCE_THRESHOLD || ber_variance > BER_VARIANCE_THRESHOLD;

    Some(FadingAnalysis {
        samples: samples.len(),
        avg_snr_db,
        avg_ber,
        snr_variance,
        ber_variance,
        is_fading: low_snr && (high_ber || unstable),
    })
}

pub fn analyze_power(sample: &PowerSample) -> PowerAnalysis {
    let (low, high) = NORMAL_VOLTAGE_RANGE;
    PowerAnalysis {
        input_voltage: sample.input_voltage,
        battery_mode: sample.input_voltage < BATTERY_VOLTAGE_THRESHOLD
            || sample.status.eq_ignore_ascii_case("battery"),
        within_normal_range: (low..=high).contains(&sample.input_voltage),
    }
}

/// Raw measurements behind [`SampledTelemetry`]
pub trait SignalSource: Send + Sync {
    fn signal_samples(&self, source_id: &str, target_id: &str) -> Result<Vec<SignalSample>>;

    fn power_sample(&self, equip_id: &str, site: &str) -> Result<PowerSample>;
}

/// [`TelemetryClient`] that derives its answers from raw samples
#[derive(Debug, Clone)]
pub struct SampledTelemetry<S> {
    source: S,
}

impl<S: SignalSource> SampledTelemetry<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: SignalSource> TelemetryClient for SampledTelemetry<S> {
    fn check_fading(&self, source_id: &str, target_id: &str) -> Result<FadingStatus> {
        let samples = self.source.signal_samples(source_id, target_id)?;
        let analysis = analyze_fading(&samples).ok_or_else(|| {
            DashboardError::NotFound(format!("no signal samples for {} - {}", source_id, target_id))
        })?;

        tracing::trace!(
            "Fading analysis {} - {}: snr {:.1} dB, ber {:.2e}, fading {}",
            source_id,
            target_id,
            analysis.avg_snr_db,
            analysis.avg_ber,
            analysis.is_fading
        );

        Ok(if analysis.is_fading {
            FadingStatus::Fading
        } else {
            FadingStatus::Normal
        })
    }

    fn check_power(&self, equip_id: &str, site: &str) -> Result<PowerStatus> {
        let analysis = analyze_power(&self.source.power_sample(equip_id, site)?);
        if !analysis.battery_mode && !analysis.within_normal_range {
            tracing::debug!(
                "{} input voltage {:.1} V outside the normal range",
                equip_id,
                analysis.input_voltage
            );
        }
        Ok(if analysis.battery_mode {
            PowerStatus::Battery
        } else {
            PowerStatus::Mains
        })
    }
}
