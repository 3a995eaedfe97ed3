//! Output line: a CPAL stream sized to one track's format.
//!
//! A line is opened per track, fed interleaved `f32` samples through a bounded
//! [`SampleQueue`], and torn down when the track ends or the run stops. The
//! device callback drains the queue without blocking and fills underruns with
//! silence; `f32` → device sample format conversion happens in the callback.
//!
//! No resampling and no channel mapping: a device that cannot satisfy the
//! track's rate and channel count is a setup failure.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::config::PlaybackTuning;
use crate::queue::{SampleQueue, queue_capacity};
use crate::source::TrackFormat;

/// An open, started output line.
///
/// Holds the CPAL stream alive; dropping the line stops the device callback.
pub(crate) struct OutputLine {
    queue: Arc<SampleQueue>,
    _stream: cpal::Stream,
}

impl OutputLine {
    /// Acquire and start an output line for `format` on the default device.
    pub(crate) fn open(format: &TrackFormat, tuning: &PlaybackTuning) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("no default output device"))?;

        let config = pick_line_config(&device, format)?;
        let mut stream_config: cpal::StreamConfig = config.clone().into();
        if let Some(buffer) = pick_buffer_size(&config) {
            stream_config.buffer_size = buffer;
        }

        let capacity = queue_capacity(
            format.sample_rate,
            format.channels as usize,
            tuning.buffer_seconds,
        );
        let queue = Arc::new(SampleQueue::new(capacity));

        let stream = build_stream(&device, &stream_config, config.sample_format(), &queue)?;
        stream.play().context("start output stream")?;

        tracing::debug!(
            device = %device.description()?,
            rate_hz = format.sample_rate,
            channels = format.channels,
            sample_format = ?config.sample_format(),
            "output line started"
        );

        Ok(Self {
            queue,
            _stream: stream,
        })
    }

    /// Write interleaved samples, blocking while the line's buffer is full.
    pub(crate) fn write(&self, samples: &[f32]) {
        self.queue.push_blocking(samples);
    }

    /// Let buffered audio play out, then release the line.
    ///
    /// Returns `false` if `cancelled` fired before the queue drained (the
    /// remainder is discarded).
    pub(crate) fn drain(self, cancelled: impl Fn() -> bool) -> bool {
        let drained = self.queue.wait_drained(&cancelled);
        self.queue.close();
        if drained {
            // The device callback still owns up to one buffer of audio.
            thread::sleep(Duration::from_millis(100));
        }
        drained
    }

    /// Release the line immediately, discarding buffered audio.
    pub(crate) fn close(self) {
        tracing::trace!(dropped_samples = self.queue.len(), "line closed early");
        self.queue.close();
    }
}

/// Choose a supported output config matching the track's rate and channels.
///
/// Among matches, prefer sample formats in `f32 > i32 > i16 > u16` order.
fn pick_line_config(
    device: &cpal::Device,
    format: &TrackFormat,
) -> Result<cpal::SupportedStreamConfig> {
    let ranges: Vec<cpal::SupportedStreamConfigRange> = device
        .supported_output_configs()
        .context("query output configs")?
        .collect();

    let mut best: Option<(u8, cpal::SupportedStreamConfig)> = None;
    for range in ranges {
        if range.channels() != format.channels {
            continue;
        }
        if !rate_in_range(
            format.sample_rate,
            range.min_sample_rate(),
            range.max_sample_rate(),
        ) {
            continue;
        }
        let rank = sample_format_rank(range.sample_format());
        let replace = best.as_ref().map(|(r, _)| rank < *r).unwrap_or(true);
        if replace {
            best = Some((rank, range.with_sample_rate(format.sample_rate)));
        }
    }

    best.map(|(_, config)| config).ok_or_else(|| {
        anyhow!(
            "no supported output config for {} Hz / {} channels",
            format.sample_rate,
            format.channels
        )
    })
}

fn rate_in_range(rate: u32, min: u32, max: u32) -> bool {
    rate >= min && rate <= max
}

fn sample_format_rank(format: cpal::SampleFormat) -> u8 {
    match format {
        cpal::SampleFormat::F32 => 0,
        cpal::SampleFormat::I32 => 1,
        cpal::SampleFormat::I16 => 2,
        cpal::SampleFormat::U16 => 3,
        _ => 10,
    }
}

/// Prefer a fixed buffer size if the device advertises one.
///
/// Returns `None` when the device only supports the default buffer size.
fn pick_buffer_size(config: &cpal::SupportedStreamConfig) -> Option<cpal::BufferSize> {
    match config.buffer_size() {
        cpal::SupportedBufferSize::Range { min, max } => {
            Some(cpal::BufferSize::Fixed(clamp_buffer_frames(*min, *max)))
        }
        cpal::SupportedBufferSize::Unknown => None,
    }
}

fn clamp_buffer_frames(min: u32, max: u32) -> u32 {
    const MAX_FRAMES: u32 = 16_384;
    if max > MAX_FRAMES {
        if min > MAX_FRAMES { min } else { MAX_FRAMES }
    } else {
        max
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    queue: &Arc<SampleQueue>,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream_typed::<f32>(device, config, queue),
        cpal::SampleFormat::I16 => build_stream_typed::<i16>(device, config, queue),
        cpal::SampleFormat::I32 => build_stream_typed::<i32>(device, config, queue),
        cpal::SampleFormat::U16 => build_stream_typed::<u16>(device, config, queue),
        other => Err(anyhow!("unsupported sample format: {other:?}")),
    }
}

/// Type-specialized stream builder for CPAL sample formats.
///
/// The callback drains the queue without blocking; a shortfall becomes
/// silence so the device never starves.
fn build_stream_typed<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    queue: &Arc<SampleQueue>,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let queue = Arc::clone(queue);
    let err_fn = |err| tracing::warn!("output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            let chunk = queue.pop(data.len());
            for (slot, sample) in data.iter_mut().zip(chunk.iter()) {
                *slot = <T as cpal::Sample>::from_sample::<f32>(*sample);
            }
            for slot in data.iter_mut().skip(chunk.len()) {
                *slot = <T as cpal::Sample>::from_sample::<f32>(0.0);
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_format_rank_prefers_f32() {
        assert!(sample_format_rank(cpal::SampleFormat::F32) < sample_format_rank(cpal::SampleFormat::I32));
        assert!(sample_format_rank(cpal::SampleFormat::I32) < sample_format_rank(cpal::SampleFormat::I16));
        assert!(sample_format_rank(cpal::SampleFormat::I16) < sample_format_rank(cpal::SampleFormat::U16));
    }

    #[test]
    fn rate_in_range_is_inclusive() {
        assert!(rate_in_range(44_100, 44_100, 96_000));
        assert!(rate_in_range(96_000, 44_100, 96_000));
        assert!(!rate_in_range(22_050, 44_100, 96_000));
        assert!(!rate_in_range(192_000, 44_100, 96_000));
    }

    #[test]
    fn clamp_buffer_frames_caps_large_ranges() {
        assert_eq!(clamp_buffer_frames(64, 8_192), 8_192);
        assert_eq!(clamp_buffer_frames(64, 32_768), 16_384);
        assert_eq!(clamp_buffer_frames(20_000, 40_000), 20_000);
    }
}
