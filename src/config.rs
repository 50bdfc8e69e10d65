//! Startup configuration for the audio system.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default capacity of the control → render command queue.
pub const DEFAULT_COMMAND_QUEUE_CAPACITY: usize = 4096;

/// Options read once when the audio system starts.
///
/// ```
/// use simsound::config::AudioConfig;
///
/// let config = AudioConfig::default().sample_rate(44_100).queue_capacity(1024);
/// assert_eq!(config.preferred_sample_rate, Some(44_100));
/// ```
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct AudioConfig {
    /// When false the system never opens a device and runs on the silent backend.
    pub enabled: bool,
    /// Requested device sample rate. The device default is used when unset or unsupported.
    pub preferred_sample_rate: Option<u32>,
    pub command_queue_capacity: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            preferred_sample_rate: None,
            command_queue_capacity: DEFAULT_COMMAND_QUEUE_CAPACITY,
        }
    }
}

impl AudioConfig {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.preferred_sample_rate = Some(sample_rate);
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.command_queue_capacity = capacity.max(1);
        self
    }
}
