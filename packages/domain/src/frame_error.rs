use thiserror::Error;

use crate::sample_format::{SampleFormat, SampleKind};

/// Errors raised while constructing or reshaping an [`AudioFrame`](crate::AudioFrame).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// A frame must carry at least one channel.
    #[error("audio frame has zero channels")]
    ZeroChannels,

    /// A frame must have a positive sample rate.
    #[error("audio frame has a zero sample rate")]
    ZeroSampleRate,

    /// Buffer kind does not match the declared sample format.
    #[error("sample buffer holds {found} scalars but format {format} was declared")]
    KindMismatch {
        format: SampleFormat,
        found: SampleKind,
    },

    /// Wrong number of planes for the declared layout.
    #[error("expected {expected} planes, found {found}")]
    PlaneCount { expected: usize, found: usize },

    /// Planes are not all the same length.
    #[error("expected plane length {expected}, found {found}")]
    PlaneLength { expected: usize, found: usize },

    /// Interleaved plane length is not a multiple of the channel count.
    #[error("interleaved plane of {len} scalars does not divide into {channels} channels")]
    Interleave { len: usize, channels: usize },

    /// Sample storage could not be reserved.
    #[error("out of memory while allocating sample storage")]
    Allocation,
}
