//! Output device handling.
//!
//! [`AudioSystem`] picks the backend once at startup. With a working output
//! device it runs the software renderer on cpal's audio thread; without one
//! it hands out a [`NullBackend`] so every generator keeps working silently.

use std::{rc::Rc, sync::Once};

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    FromSample, SizedSample,
};
use tracing::{info, warn};

use crate::{
    backend::{AudioBackend, NullBackend, RenderContext, Renderer},
    config::AudioConfig,
    error::SoundError,
    MAX_BLOCK_SIZE,
};

static FALLBACK_NOTICE: Once = Once::new();

pub struct AudioSystem {
    backend: Rc<dyn AudioBackend>,
    // Dropping the stream stops playback.
    stream: Option<cpal::Stream>,
    device_name: Option<String>,
}

impl AudioSystem {
    /// Open the default output device and start rendering.
    ///
    /// A disabled config yields a silent system rather than an error.
    pub fn start(config: &AudioConfig) -> Result<Self, SoundError> {
        if !config.enabled {
            return Ok(Self::silent());
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(SoundError::NoOutputDevice)?;
        let device_name = device.name().unwrap_or_else(|_| String::from("<unknown>"));

        let supported = match config.preferred_sample_rate {
            Some(rate) => preferred_config(&device, rate)?,
            None => None,
        };
        let supported = match supported {
            Some(supported) => supported,
            None => device.default_output_config()?,
        };

        let sample_format = supported.sample_format();
        let stream_config: cpal::StreamConfig = supported.into();
        let sample_rate = stream_config.sample_rate.0 as f32;

        info!(
            device = %device_name,
            sample_rate,
            channels = stream_config.channels,
            ?sample_format,
            "starting audio output"
        );

        let (context, renderer) = RenderContext::new(sample_rate, config.command_queue_capacity);

        let stream = match sample_format {
            cpal::SampleFormat::F32 => make_stream::<f32>(&device, &stream_config, renderer)?,
            cpal::SampleFormat::F64 => make_stream::<f64>(&device, &stream_config, renderer)?,
            cpal::SampleFormat::I16 => make_stream::<i16>(&device, &stream_config, renderer)?,
            cpal::SampleFormat::I32 => make_stream::<i32>(&device, &stream_config, renderer)?,
            cpal::SampleFormat::U16 => make_stream::<u16>(&device, &stream_config, renderer)?,
            other => {
                return Err(SoundError::Device(format!(
                    "unsupported sample format: {other:?}"
                )))
            }
        };
        stream.play()?;

        Ok(Self {
            backend: Rc::new(context),
            stream: Some(stream),
            device_name: Some(device_name),
        })
    }

    /// Like [`start`](Self::start), but substitutes the silent backend on any
    /// failure. The first fallback in a process logs a warning.
    pub fn start_or_silent(config: &AudioConfig) -> Self {
        match Self::start(config) {
            Ok(system) => system,
            Err(err) => {
                FALLBACK_NOTICE.call_once(|| {
                    warn!(%err, "audio output unavailable, continuing without sound");
                });
                Self::silent()
            }
        }
    }

    pub fn silent() -> Self {
        Self {
            backend: Rc::new(NullBackend::new()),
            stream: None,
            device_name: None,
        }
    }

    pub fn backend(&self) -> Rc<dyn AudioBackend> {
        Rc::clone(&self.backend)
    }

    pub fn is_silent(&self) -> bool {
        self.stream.is_none()
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    pub fn sample_rate(&self) -> f32 {
        self.backend.sample_rate()
    }
}

/// A supported output config running at exactly `rate`, if the device has one.
fn preferred_config(
    device: &cpal::Device,
    rate: u32,
) -> Result<Option<cpal::SupportedStreamConfig>, SoundError> {
    let configs = device
        .supported_output_configs()
        .map_err(|err| SoundError::Device(err.to_string()))?;

    let mut candidates: Vec<cpal::SupportedStreamConfigRange> = configs
        .filter(|range| range.min_sample_rate().0 <= rate && rate <= range.max_sample_rate().0)
        .collect();
    candidates.sort_by(|a, b| b.cmp_default_heuristics(a));

    match candidates.into_iter().next() {
        Some(range) => Ok(Some(range.with_sample_rate(cpal::SampleRate(rate)))),
        None => {
            warn!(rate, "preferred sample rate unsupported, using device default");
            Ok(None)
        }
    }
}

fn make_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut renderer: Renderer,
) -> Result<cpal::Stream, SoundError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels.max(1) as usize;
    let mut scratch = vec![0.0f32; MAX_BLOCK_SIZE * channels];

    let stream = device.build_output_stream(
        config,
        move |output: &mut [T], _: &cpal::OutputCallbackInfo| {
            for chunk in output.chunks_mut(scratch.len()) {
                let block = &mut scratch[..chunk.len()];
                renderer.render_interleaved(block, channels);

                for (out, &sample) in chunk.iter_mut().zip(block.iter()) {
                    *out = T::from_sample(sample);
                }
            }
        },
        |err| warn!(%err, "audio stream error"),
        None,
    )?;

    Ok(stream)
}
