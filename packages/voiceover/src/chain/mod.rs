//! Per-utterance signal chain.
//!
//! ```text
//! source ─▶ mono @ 48 kHz ─▶ time-stretch(speed) ─▶ target rate
//!        ─▶ target layout/format ─▶ rebased pts
//! ```
//!
//! One chain is built per cue and dropped once the utterance has been
//! flushed. Input frames may arrive in any size; output frames are emitted as
//! soon as samples leave the last stage.

mod resample;
mod tempo;

pub use resample::StreamResampler;
pub use tempo::TimeStretch;

use thiserror::Error;
use tracing::debug;
use voiceover_domain::{AudioFrame, FrameError, StreamFormat, TimeBase};

/// Rate every utterance is normalized to before stretching.
pub const INTERMEDIATE_RATE: u32 = 48_000;

/* ─────────────────────────────── ERRORS ────────────────────────────── */

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("sample rate must be positive")]
    ZeroSampleRate,

    #[error("channel count must be positive")]
    ZeroChannels,

    #[error("time-stretch speed {0} is not a positive finite number")]
    InvalidSpeed(f64),

    #[error("resampler construction failed: {0}")]
    Construction(#[from] rubato::ResamplerConstructionError),

    #[error("resampling failed: {0}")]
    Resample(#[from] rubato::ResampleError),

    #[error(
        "input is {found_rate} Hz x{found_channels}, chain was built for {rate} Hz x{channels}"
    )]
    InputFormat {
        rate: u32,
        channels: usize,
        found_rate: u32,
        found_channels: usize,
    },

    #[error(transparent)]
    Frame(#[from] FrameError),
}

/* ─────────────────────────────── CHAIN ─────────────────────────────── */

pub struct UtteranceChain {
    source: StreamFormat,
    target: StreamFormat,
    target_time_base: TimeBase,
    normalize: StreamResampler,
    stretch: Option<TimeStretch>,
    restore: StreamResampler,
    origin: Option<i64>,
    emitted: u64,
}

impl UtteranceChain {
    /// Build the chain converting `source` audio into `target` audio played
    /// `speed` times faster, with output timestamps in `target_time_base`.
    pub fn build(
        source: StreamFormat,
        target: StreamFormat,
        target_time_base: TimeBase,
        speed: f64,
    ) -> Result<Self, ChainError> {
        for format in [&source, &target] {
            if format.sample_rate == 0 {
                return Err(ChainError::ZeroSampleRate);
            }
            if format.channels == 0 {
                return Err(ChainError::ZeroChannels);
            }
        }
        if !speed.is_finite() || speed <= 0.0 {
            return Err(ChainError::InvalidSpeed(speed));
        }

        let normalize = StreamResampler::new(source.sample_rate, INTERMEDIATE_RATE)?;
        let stretch = if speed == 1.0 {
            None
        } else {
            Some(TimeStretch::new(speed)?)
        };
        let restore = StreamResampler::new(INTERMEDIATE_RATE, target.sample_rate)?;

        debug!(
            src_rate = source.sample_rate,
            src_channels = source.channels,
            dst_rate = target.sample_rate,
            dst_channels = target.channels,
            dst_format = %target.sample_format,
            speed,
            "utterance chain built"
        );

        Ok(Self {
            source,
            target,
            target_time_base,
            normalize,
            stretch,
            restore,
            origin: None,
            emitted: 0,
        })
    }

    /// Run one decoded frame through every stage.
    pub fn push(&mut self, frame: &AudioFrame) -> Result<Option<AudioFrame>, ChainError> {
        if frame.sample_rate() != self.source.sample_rate
            || frame.channels() != self.source.channels
        {
            return Err(ChainError::InputFormat {
                rate: self.source.sample_rate,
                channels: self.source.channels,
                found_rate: frame.sample_rate(),
                found_channels: frame.channels(),
            });
        }
        if self.origin.is_none() {
            self.origin = frame
                .pts()
                .map(|pts| frame.time_base().rescale(pts, self.target_time_base));
        }

        let mono = downmix(&frame.to_planar_f32());
        let normalized = self.normalize.push(&mono)?;
        let stretched = match self.stretch.as_mut() {
            Some(stretch) => stretch.push(&normalized),
            None => normalized,
        };
        let restored = self.restore.push(&stretched)?;
        self.emit(restored)
    }

    /// Drain every stage; the chain is spent afterwards.
    pub fn flush(&mut self) -> Result<Option<AudioFrame>, ChainError> {
        let mut stretched = Vec::new();
        let tail = self.normalize.flush()?;
        match self.stretch.as_mut() {
            Some(stretch) => {
                stretched.extend(stretch.push(&tail));
                stretched.extend(stretch.flush());
            }
            None => stretched = tail,
        }

        let mut restored = self.restore.push(&stretched)?;
        restored.extend(self.restore.flush()?);
        self.emit(restored)
    }

    fn emit(&mut self, mono: Vec<f32>) -> Result<Option<AudioFrame>, ChainError> {
        if mono.is_empty() {
            return Ok(None);
        }
        let pts = self.origin.map(|origin| {
            let offset = i64::try_from(self.emitted).unwrap_or(i64::MAX);
            let rate_tb = TimeBase::from_sample_rate(self.target.sample_rate)
                .unwrap_or(self.target_time_base);
            origin + rate_tb.rescale(offset, self.target_time_base)
        });
        self.emitted += mono.len() as u64;

        let channels = vec![mono; self.target.channels];
        let frame =
            AudioFrame::from_planar_f32(self.target, self.target_time_base, pts, &channels)?;
        Ok(Some(frame))
    }
}

/// Average all channels into one.
fn downmix(channels: &[Vec<f32>]) -> Vec<f32> {
    match channels {
        [] => Vec::new(),
        [mono] => mono.clone(),
        [first, rest @ ..] => {
            let scale = 1.0 / channels.len() as f32;
            let mut out = first.clone();
            for channel in rest {
                for (acc, &s) in out.iter_mut().zip(channel) {
                    *acc += s;
                }
            }
            out.iter_mut().for_each(|s| *s *= scale);
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voiceover_domain::{SampleBuffer, SampleFormat};

    fn source(rate: u32, channels: usize) -> StreamFormat {
        StreamFormat::new(rate, channels, SampleFormat::F32P)
    }

    fn tone(format: StreamFormat, len: usize, pts: Option<i64>) -> AudioFrame {
        let tb = TimeBase::from_sample_rate(format.sample_rate).unwrap();
        let mono: Vec<f32> = (0..len)
            .map(|i| (i as f32 * 0.05).sin() * 0.5)
            .collect();
        AudioFrame::from_planar_f32(format, tb, pts, &vec![mono; format.channels]).unwrap()
    }

    fn run(chain: &mut UtteranceChain, frames: &[AudioFrame]) -> Vec<AudioFrame> {
        let mut out = Vec::new();
        for frame in frames {
            out.extend(chain.push(frame).expect("push"));
        }
        out.extend(chain.flush().expect("flush"));
        out
    }

    #[test]
    fn test_build_rejects_bad_parameters() {
        let ok = source(16_000, 1);
        let tb = TimeBase::MILLISECONDS;
        assert!(matches!(
            UtteranceChain::build(source(0, 1), ok, tb, 1.0),
            Err(ChainError::ZeroSampleRate)
        ));
        assert!(matches!(
            UtteranceChain::build(ok, source(48_000, 0), tb, 1.0),
            Err(ChainError::ZeroChannels)
        ));
        assert!(matches!(
            UtteranceChain::build(ok, ok, tb, 0.0),
            Err(ChainError::InvalidSpeed(_))
        ));
    }

    #[test]
    fn test_output_length_and_format() {
        let src = source(16_000, 2);
        let dst = StreamFormat::new(44_100, 2, SampleFormat::S16);
        let dst_tb = TimeBase::from_sample_rate(44_100).unwrap();
        let mut chain = UtteranceChain::build(src, dst, dst_tb, 1.4).expect("chain");

        let frames: Vec<_> = (0..4)
            .map(|i| tone(src, 4_000, Some(i * 4_000)))
            .collect();
        let out = run(&mut chain, &frames);

        // 16 000 -> 48 000 -> /1.4 -> 44 100
        let stretched = (48_000_f64 / 1.4).round() as u64;
        let expected = (stretched * 44_100 + 24_000) / 48_000;
        let total: usize = out.iter().map(AudioFrame::nb_samples).sum();
        assert_eq!(total as u64, expected);
        assert!(out.iter().all(|f| f.format() == SampleFormat::S16 && f.channels() == 2));
        assert!(out.iter().all(|f| f.time_base() == dst_tb));
    }

    #[test]
    fn test_timestamps_are_rebased_and_contiguous() {
        let src = source(48_000, 1);
        let dst = StreamFormat::new(48_000, 1, SampleFormat::F32);
        let dst_tb = TimeBase::from_sample_rate(48_000).unwrap();
        let mut chain = UtteranceChain::build(src, dst, dst_tb, 1.0).expect("chain");

        // Source pts already shifted to 1 s.
        let frames = vec![tone(src, 1_000, Some(48_000)), tone(src, 1_000, Some(49_000))];
        let out = run(&mut chain, &frames);

        let mut expected_pts = 48_000;
        for frame in &out {
            assert_eq!(frame.pts(), Some(expected_pts));
            expected_pts += frame.nb_samples() as i64;
        }
        assert_eq!(expected_pts, 50_000);
    }

    #[test]
    fn test_unit_speed_same_rate_passes_audio_through() {
        let src = source(48_000, 1);
        let dst = StreamFormat::new(48_000, 1, SampleFormat::F32P);
        let tb = TimeBase::MICROSECONDS;
        let mut chain = UtteranceChain::build(src, dst, tb, 1.0).expect("chain");
        let input = tone(src, 512, Some(0));
        let out = run(&mut chain, std::slice::from_ref(&input));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].data(), input.data());
    }

    #[test]
    fn test_input_format_checked() {
        let src = source(16_000, 1);
        let mut chain =
            UtteranceChain::build(src, src, TimeBase::MILLISECONDS, 1.0).expect("chain");
        let stereo = AudioFrame::new(
            source(16_000, 2),
            TimeBase::MILLISECONDS,
            None,
            SampleBuffer::F32(vec![vec![0.0; 4], vec![0.0; 4]]),
        )
        .unwrap();
        assert!(matches!(
            chain.push(&stereo),
            Err(ChainError::InputFormat { .. })
        ));
    }

    #[test]
    fn test_downmix_averages_channels() {
        let mono = downmix(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]]);
        assert_eq!(mono, vec![0.5, 0.5]);
    }
}
