//! Signal-level vocal features
//!
//! Cheap, model-free estimates computed directly on the decoded chunk:
//! - loudness: RMS level in dBFS
//! - stability: spread of per-frame RMS levels
//! - pitch: zero-crossing rate estimate
//! - speech rate: energy onsets per minute

use super::{Probe, ProviderError, VocalFeatureAnalyzer};
use crate::audio::rms_db;
use icoach_common::models::VocalResult;

/// Analysis frame length
const FRAME_SECS: f64 = 0.02;

/// Frames below this level never count as an onset
const ONSET_FLOOR_DB: f64 = -45.0;

pub struct EnergyVocalAnalyzer;

impl Probe for EnergyVocalAnalyzer {
    fn name(&self) -> &'static str {
        "energy_features"
    }
}

impl VocalFeatureAnalyzer for EnergyVocalAnalyzer {
    fn analyze(&self, samples: &[f32], sample_rate: u32) -> Result<VocalResult, ProviderError> {
        if samples.is_empty() || sample_rate == 0 {
            return Err(ProviderError::InvalidResponse("no samples to analyze".to_string()));
        }

        let loudness_db = rms_db(samples);
        let frame_len = ((sample_rate as f64 * FRAME_SECS) as usize).max(1);
        let frame_levels: Vec<f64> = samples.chunks(frame_len).map(frame_rms).collect();

        let stability = stability(&frame_levels);
        let pitch_hz = zero_crossing_pitch(samples, sample_rate);
        let duration_secs = samples.len() as f64 / sample_rate as f64;
        let speech_rate = onset_count(&frame_levels) as f64 / duration_secs * 60.0;

        let confidence = vocal_confidence(loudness_db, pitch_hz, speech_rate);

        Ok(VocalResult {
            pitch_hz,
            loudness_db,
            stability,
            speech_rate,
            confidence,
        })
    }
}

fn frame_rms(frame: &[f32]) -> f64 {
    let sum: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / frame.len() as f64).sqrt()
}

/// 1.0 for perfectly even delivery, falling as frame levels spread
fn stability(levels: &[f64]) -> f64 {
    let n = levels.len() as f64;
    let mean = levels.iter().sum::<f64>() / n;
    let variance = levels.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / n;
    1.0 - (variance.sqrt() * 5.0).min(1.0)
}

fn zero_crossing_pitch(samples: &[f32], sample_rate: u32) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
        .count();
    let rate = crossings as f64 / (samples.len() - 1) as f64;
    rate * sample_rate as f64 / 2.0
}

/// Rising edges through half the peak frame level
fn onset_count(levels: &[f64]) -> usize {
    let peak = levels.iter().cloned().fold(0.0f64, f64::max);
    let floor = 10f64.powf(ONSET_FLOOR_DB / 20.0);
    let threshold = (peak * 0.5).max(floor);

    let mut above = false;
    let mut onsets = 0;
    for &level in levels {
        let now_above = level > threshold;
        if now_above && !above {
            onsets += 1;
        }
        above = now_above;
    }
    onsets
}

/// Weighted 0-100 delivery score
///
/// volume (0.4): full marks between -25 and -5 dBFS, else 0.6
/// pitch (0.3): full marks above 50 Hz, else 0.5
/// rate (0.3): full marks between 100 and 180 per minute, else 0.7
pub fn vocal_confidence(loudness_db: f64, pitch_hz: f64, speech_rate: f64) -> f64 {
    let volume = if (-25.0..=-5.0).contains(&loudness_db) { 1.0 } else { 0.6 };
    let pitch = if pitch_hz > 50.0 { 1.0 } else { 0.5 };
    let rate = if (100.0..=180.0).contains(&speech_rate) { 1.0 } else { 0.7 };
    (volume * 0.4 + pitch * 0.3 + rate * 0.3) * 100.0
}
