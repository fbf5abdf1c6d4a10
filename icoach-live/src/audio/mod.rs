//! Audio handling for the live session

pub mod decode;
pub mod segmenter;

pub use decode::{decode_base64_wav, DecodedAudio};
pub use segmenter::AudioSegmenter;

use icoach_common::models::SILENCE_FLOOR_DB;

/// RMS level in dBFS, floored at [`SILENCE_FLOOR_DB`]
pub fn rms_db(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return SILENCE_FLOOR_DB;
    }
    let mean_square = samples.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>() / samples.len() as f64;
    let rms = mean_square.sqrt();
    if rms <= 0.0 {
        return SILENCE_FLOOR_DB;
    }
    (20.0 * rms.log10()).max(SILENCE_FLOOR_DB)
}
