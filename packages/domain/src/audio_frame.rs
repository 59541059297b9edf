//! Audio frames exchanged between the decoder, the utterance chain, the
//! playback queue and the mixer.

use crate::frame_error::FrameError;
use crate::sample_buffer::{PcmScalar, SampleBuffer};
use crate::sample_format::SampleFormat;
use crate::time_base::TimeBase;

/// Rate, channel count and sample format of a PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: usize,
    pub sample_format: SampleFormat,
}

impl StreamFormat {
    pub const fn new(sample_rate: u32, channels: usize, sample_format: SampleFormat) -> Self {
        Self {
            sample_rate,
            channels,
            sample_format,
        }
    }

    /// Reject zero rates and channel counts.
    pub fn validate(&self) -> Result<(), FrameError> {
        if self.sample_rate == 0 {
            return Err(FrameError::ZeroSampleRate);
        }
        if self.channels == 0 {
            return Err(FrameError::ZeroChannels);
        }
        Ok(())
    }

    /// `1 / sample_rate`.
    pub fn natural_time_base(&self) -> Option<TimeBase> {
        TimeBase::from_sample_rate(self.sample_rate)
    }
}

/// A block of PCM samples with a presentation timestamp.
///
/// `nb_samples` counts samples per channel. Interleaved frames hold a single
/// plane of `nb_samples * channels` scalars; planar frames hold `channels`
/// planes of `nb_samples` scalars each.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    format: StreamFormat,
    nb_samples: usize,
    pts: Option<i64>,
    time_base: TimeBase,
    data: SampleBuffer,
}

impl AudioFrame {
    /// Build a frame, checking that `data` matches the declared layout.
    pub fn new(
        format: StreamFormat,
        time_base: TimeBase,
        pts: Option<i64>,
        data: SampleBuffer,
    ) -> Result<Self, FrameError> {
        format.validate()?;
        let sample_format = format.sample_format;
        if data.kind() != sample_format.kind() {
            return Err(FrameError::KindMismatch {
                format: sample_format,
                found: data.kind(),
            });
        }

        let expected = sample_format.plane_count(format.channels);
        if data.plane_count() != expected {
            return Err(FrameError::PlaneCount {
                expected,
                found: data.plane_count(),
            });
        }

        let Some(plane_len) = data.plane_len() else {
            return Err(FrameError::PlaneLength {
                expected: 0,
                found: 0,
            });
        };
        let nb_samples = if sample_format.is_planar() {
            plane_len
        } else {
            if plane_len % format.channels != 0 {
                return Err(FrameError::Interleave {
                    len: plane_len,
                    channels: format.channels,
                });
            }
            plane_len / format.channels
        };

        Ok(Self {
            format,
            nb_samples,
            pts,
            time_base,
            data,
        })
    }

    /// A frame of `nb_samples` silent samples.
    pub fn silence(
        format: StreamFormat,
        time_base: TimeBase,
        pts: Option<i64>,
        nb_samples: usize,
    ) -> Result<Self, FrameError> {
        format.validate()?;
        let sample_format = format.sample_format;
        let planes = sample_format.plane_count(format.channels);
        let len = if sample_format.is_planar() {
            nb_samples
        } else {
            nb_samples * format.channels
        };
        Self::new(
            format,
            time_base,
            pts,
            SampleBuffer::silence(sample_format.kind(), planes, len),
        )
    }

    /// Convert planar `f32` channels into a frame of `format`.
    pub fn from_planar_f32(
        format: StreamFormat,
        time_base: TimeBase,
        pts: Option<i64>,
        channels: &[Vec<f32>],
    ) -> Result<Self, FrameError> {
        if channels.len() != format.channels {
            return Err(FrameError::PlaneCount {
                expected: format.channels,
                found: channels.len(),
            });
        }
        let data = SampleBuffer::from_planar_f32(
            format.sample_format.kind(),
            format.sample_format.is_planar(),
            channels,
        )?;
        Self::new(format, time_base, pts, data)
    }

    /// Every channel as a separate `f32` vector.
    pub fn to_planar_f32(&self) -> Vec<Vec<f32>> {
        self.data
            .to_planar_f32(self.format.sample_format.is_planar(), self.format.channels)
    }

    #[inline]
    pub fn stream_format(&self) -> StreamFormat {
        self.format
    }

    #[inline]
    pub fn format(&self) -> SampleFormat {
        self.format.sample_format
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.format.channels
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    /// Samples per channel.
    #[inline]
    pub fn nb_samples(&self) -> usize {
        self.nb_samples
    }

    #[inline]
    pub fn pts(&self) -> Option<i64> {
        self.pts
    }

    pub fn set_pts(&mut self, pts: Option<i64>) {
        self.pts = pts;
    }

    #[inline]
    pub fn time_base(&self) -> TimeBase {
        self.time_base
    }

    #[inline]
    pub fn data(&self) -> &SampleBuffer {
        &self.data
    }

    /// Typed planes, if the frame holds `T` scalars.
    pub fn planes<T: PcmScalar>(&self) -> Option<&[Vec<T>]> {
        T::planes(&self.data)
    }

    /// Mutable typed planes. Plane lengths stay fixed, so the sample count
    /// cannot change through this view.
    pub fn planes_mut<T: PcmScalar>(&mut self) -> Option<impl Iterator<Item = &mut [T]>> {
        T::planes_mut(&mut self.data).map(|planes| planes.iter_mut().map(Vec::as_mut_slice))
    }

    /// Release the sample storage.
    pub fn into_data(self) -> SampleBuffer {
        self.data
    }
}
