//! Audio input via CPAL
//!
//! Opens an input stream and hands every captured block to the bridge
//! producer together with the built-in transport. The producer lives inside
//! the stream callback; dropping the [`InputHandle`] stops capture.

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};

use loopscope_core::{AudioBlock, Producer};

use crate::config::InputConfig;
use crate::transport::InputTransport;

/// Block size reported to the bridge when the device does not say
const BLOCK_SIZE_HINT: usize = 1024;

/// Keeps the input stream alive
pub struct InputHandle {
    _stream: Stream,
    device_name: String,
    sample_rate: u32,
    channels: u16,
}

impl InputHandle {
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

/// Names of all input devices on the default host
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .context("Failed to enumerate input devices")?;
    Ok(devices
        .map(|device| device.name().unwrap_or_else(|_| "Unknown".to_string()))
        .collect())
}

/// Open the configured input and start feeding `producer`
pub fn start_input(config: &InputConfig, mut producer: Producer) -> Result<InputHandle> {
    let host = cpal::default_host();
    let device = match &config.device {
        Some(name) => find_input_device(&host, name)?,
        None => host
            .default_input_device()
            .ok_or_else(|| anyhow!("No default input device"))?,
    };

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using input device: {}", device_name);

    let supported = select_input_config(&device, config.sample_rate)?;
    let stream_config: StreamConfig = supported.config();
    let sample_rate = stream_config.sample_rate.0;
    let channels = stream_config.channels;

    let block_hint = match supported.buffer_size() {
        cpal::SupportedBufferSize::Range { max, .. } => (*max as usize).min(BLOCK_SIZE_HINT),
        cpal::SupportedBufferSize::Unknown => BLOCK_SIZE_HINT,
    };
    producer
        .configure(sample_rate as f64, block_hint)
        .context("Failed to configure analysis bridge")?;

    log::info!(
        "Input config: {} channels, {}Hz, transport {}",
        channels,
        sample_rate,
        match config.tempo_bpm {
            Some(bpm) => format!("{:.1} BPM", bpm),
            None => "off".to_string(),
        }
    );

    let mut transport = InputTransport::new(config.tempo_bpm, sample_rate as f64);
    let interleaved = channels as usize;

    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                let block = AudioBlock::Interleaved {
                    data,
                    channels: interleaved,
                };
                let host = transport.next_block(block.frames());
                producer.on_audio_block(&block, &host);
            },
            move |err| {
                log::error!("Input stream error: {}", err);
            },
            None,
        )
        .context("Failed to build input stream")?;

    stream.play().context("Failed to start input stream")?;
    log::info!("Input stream started");

    Ok(InputHandle {
        _stream: stream,
        device_name,
        sample_rate,
        channels,
    })
}

fn find_input_device(host: &cpal::Host, name: &str) -> Result<cpal::Device> {
    host.input_devices()
        .context("Failed to enumerate input devices")?
        .find(|device| device.name().map(|n| n == name).unwrap_or(false))
        .ok_or_else(|| anyhow!("Input device not found: {}", name))
}

/// Prefer an f32 configuration at the requested (or default) sample rate
fn select_input_config(
    device: &cpal::Device,
    preferred_rate: Option<u32>,
) -> Result<cpal::SupportedStreamConfig> {
    let default = device
        .default_input_config()
        .context("Failed to get default input config")?;
    let target_rate = preferred_rate.unwrap_or(default.sample_rate().0);

    let best = device
        .supported_input_configs()
        .context("Failed to query input configs")?
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .find(|c| target_rate >= c.min_sample_rate().0 && target_rate <= c.max_sample_rate().0);

    match best {
        Some(range) => Ok(range.with_sample_rate(cpal::SampleRate(target_rate))),
        None if default.sample_format() == SampleFormat::F32 => {
            log::warn!(
                "Input device doesn't support {}Hz as f32, using {}Hz",
                target_rate,
                default.sample_rate().0
            );
            Ok(default)
        }
        None => Err(anyhow!(
            "Input device has no f32 configuration (default is {:?})",
            default.sample_format()
        )),
    }
}
