//! Error type shared by every fallible operation in the crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SoundError {
    /// Output levels are linear gain multipliers and must not be negative.
    #[error("output level must be a finite value >= 0, got {0}")]
    NegativeOutputLevel(f32),

    #[error("invalid value for `{name}`: {value}")]
    InvalidParameter { name: &'static str, value: f32 },

    #[error("unknown noise type `{0}` (expected white, pink or brown)")]
    InvalidNoiseType(String),

    #[error("unknown waveform `{0}` (expected sine, square, sawtooth or triangle)")]
    InvalidWaveform(String),

    /// A setter was called for a processing stage the generator was built without.
    #[error("generator has no {0} stage")]
    MissingStage(&'static str),

    #[error("no clip is associated with the requested key")]
    UnknownClip,

    #[error("a sound generator is already registered as `{0}`")]
    DuplicateId(String),

    #[error("no sound generator is registered as `{0}`")]
    UnknownId(String),

    #[error("no default output device available")]
    NoOutputDevice,

    #[error("audio device error: {0}")]
    Device(String),
}

impl From<cpal::DefaultStreamConfigError> for SoundError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        SoundError::Device(err.to_string())
    }
}

impl From<cpal::BuildStreamError> for SoundError {
    fn from(err: cpal::BuildStreamError) -> Self {
        SoundError::Device(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for SoundError {
    fn from(err: cpal::PlayStreamError) -> Self {
        SoundError::Device(err.to_string())
    }
}

/// Reject negative or non-finite gain levels.
pub(crate) fn check_output_level(level: f32) -> Result<f32, SoundError> {
    if level.is_finite() && level >= 0.0 {
        Ok(level)
    } else {
        Err(SoundError::NegativeOutputLevel(level))
    }
}

/// Reject non-positive or non-finite values for a named parameter.
pub(crate) fn check_positive(name: &'static str, value: f32) -> Result<f32, SoundError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(SoundError::InvalidParameter { name, value })
    }
}
