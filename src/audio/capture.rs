//! Microphone-array capture via `cpal`.
//!
//! A [`CaptureSource`] starts delivering interleaved `f32` samples into a
//! [`SharedCaptureBuffer`] and returns a [`CaptureHandle`].
//! [`CaptureHandle::stop`] is a blocking teardown: once it returns, the
//! callback never fires again.
//!
//! [`DeviceCapture`] is the hardware implementation.  The cpal callback does
//! nothing but lock the buffer and copy the period in.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use crate::config::AudioConfig;

use super::buffer::SharedCaptureBuffer;

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while setting up or running the audio capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to read device name: {0}")]
    DeviceName(#[from] cpal::DeviceNameError),

    #[error("failed to query supported input configs: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("device `{device}` cannot capture {channels} channels of f32 at {sample_rate} Hz")]
    UnsupportedConfig {
        device: String,
        channels: u16,
        sample_rate: u32,
    },

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("failed to spawn capture thread: {0}")]
    Spawn(#[source] std::io::Error),
}

// ---------------------------------------------------------------------------
// CaptureSource / CaptureHandle
// ---------------------------------------------------------------------------

/// Something that can fill a capture buffer in the background.
pub trait CaptureSource {
    /// Begin capturing into `buffer`.
    fn start(&self, buffer: SharedCaptureBuffer) -> Result<Box<dyn CaptureHandle>, CaptureError>;
}

/// A running capture.
pub trait CaptureHandle {
    /// Stop capturing and wait until the producer is gone.
    fn stop(self: Box<Self>);
}

// ---------------------------------------------------------------------------
// DeviceCapture
// ---------------------------------------------------------------------------

/// Hardware capture from a cpal input device.
pub struct DeviceCapture {
    device: cpal::Device,
    device_name: String,
    config: cpal::StreamConfig,
}

impl DeviceCapture {
    /// Pick an input device and negotiate the stream configuration.
    ///
    /// The first input device whose name contains `audio.device_name` is
    /// used; without a match (or without a configured name) the host's
    /// default input device is used.  The device must support `f32` samples
    /// at the configured channel count and sample rate.  The period is fixed
    /// at `period_frames` when the device allows it.
    ///
    /// # Errors
    ///
    /// [`CaptureError::NoDevice`] when no input device exists and
    /// [`CaptureError::UnsupportedConfig`] when the format is not supported.
    pub fn new(audio: &AudioConfig, period_frames: usize) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = select_device(&host, audio.device_name.as_deref())?;
        let device_name = device.name()?;

        let supported = device
            .supported_input_configs()?
            .find(|range| {
                range.channels() == audio.channels
                    && range.sample_format() == cpal::SampleFormat::F32
                    && range.min_sample_rate().0 <= audio.sample_rate
                    && audio.sample_rate <= range.max_sample_rate().0
            })
            .ok_or_else(|| CaptureError::UnsupportedConfig {
                device: device_name.clone(),
                channels: audio.channels,
                sample_rate: audio.sample_rate,
            })?;

        let period = period_frames as u32;
        let buffer_size = match supported.buffer_size() {
            cpal::SupportedBufferSize::Range { min, max } if (*min..=*max).contains(&period) => {
                cpal::BufferSize::Fixed(period)
            }
            cpal::SupportedBufferSize::Range { .. } => {
                log::warn!(
                    "capture: device `{device_name}` rejects a {period}-frame period, using its default"
                );
                cpal::BufferSize::Default
            }
            cpal::SupportedBufferSize::Unknown => cpal::BufferSize::Fixed(period),
        };

        let config = cpal::StreamConfig {
            channels: audio.channels,
            sample_rate: cpal::SampleRate(audio.sample_rate),
            buffer_size,
        };

        log::info!(
            "capture: using `{device_name}` ({} ch @ {} Hz, buffer {:?})",
            config.channels,
            audio.sample_rate,
            config.buffer_size
        );

        Ok(Self {
            device,
            device_name,
            config,
        })
    }

    /// Name of the selected device.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

fn select_device(host: &cpal::Host, wanted: Option<&str>) -> Result<cpal::Device, CaptureError> {
    if let Some(wanted) = wanted {
        for device in host.input_devices()? {
            if device.name().is_ok_and(|name| name.contains(wanted)) {
                return Ok(device);
            }
        }
        log::warn!("capture: no input device matching `{wanted}`, falling back to default");
    }
    host.default_input_device().ok_or(CaptureError::NoDevice)
}

impl CaptureSource for DeviceCapture {
    fn start(&self, buffer: SharedCaptureBuffer) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                buffer.push_interleaved(data);
            },
            |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
            },
            None,
        )?;

        stream.play()?;
        Ok(Box::new(StreamHandle { stream }))
    }
}

/// Keeps the cpal stream alive until [`CaptureHandle::stop`].
struct StreamHandle {
    stream: cpal::Stream,
}

impl CaptureHandle for StreamHandle {
    fn stop(self: Box<Self>) {
        if let Err(e) = self.stream.pause() {
            log::warn!("capture: failed to pause stream: {e}");
        }
        // Dropping the stream joins the backend's callback thread.
        drop(self.stream);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_config_message_names_the_format() {
        let err = CaptureError::UnsupportedConfig {
            device: "UMA-8".into(),
            channels: 8,
            sample_rate: 48_000,
        };
        assert_eq!(
            err.to_string(),
            "device `UMA-8` cannot capture 8 channels of f32 at 48000 Hz"
        );
    }

    #[test]
    fn spawn_error_keeps_its_source() {
        use std::error::Error as _;
        let err = CaptureError::Spawn(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert!(err.source().is_some());
    }
}
