//! Error taxonomy of the dubbing pipeline.
//!
//! Per-cue failures (`BackendUnreachable`, `InvalidSpeed`, `ChainBuild`,
//! `Decode`) are contained by the controller: the cue is discarded and the
//! primary audio passes through untouched. `AllocationFailure` is the only
//! variant that aborts the current call.

use thiserror::Error;
use voiceover_domain::{CueId, FrameError, SampleFormat};

use crate::chain::ChainError;
use crate::decode::DecodeError;

pub type Result<T> = std::result::Result<T, DubError>;

#[derive(Error, Debug)]
pub enum DubError {
    /// The synthesis server could not be reached, or its answer could not be
    /// opened as audio.
    #[error("synthesis backend unreachable for {url}: {source}")]
    BackendUnreachable {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The computed playback speed is not positive.
    #[error("invalid playback speed {0}")]
    InvalidSpeed(f64),

    /// The per-utterance processing chain could not be constructed.
    #[error("cannot build utterance chain: {0}")]
    ChainBuild(#[source] ChainError),

    /// Decoding the synthesized audio failed mid-stream.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Memory for queued audio could not be reserved.
    #[error("out of memory while queueing synthesized audio")]
    AllocationFailure,

    #[error("mix error: {0}")]
    Mix(#[from] MixError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("subtitle error: {0}")]
    Subtitle(#[from] crate::subtitle::SubtitleError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

impl DubError {
    /// `true` when the error must abort the current call instead of being
    /// contained to a single cue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AllocationFailure)
    }
}

impl From<FrameError> for DubError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Allocation => Self::AllocationFailure,
            other => Self::Decode(DecodeError::Frame(other)),
        }
    }
}

/// Failures raised by the sample mixer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MixError {
    /// The primary frame does not match the format the mixer was built for.
    #[error("primary frame is {found} x{found_channels}, mixer expects {expected} x{channels}")]
    PrimaryFormat {
        expected: SampleFormat,
        channels: usize,
        found: SampleFormat,
        found_channels: usize,
    },

    /// A queued frame does not match the primary stream.
    #[error("{cue} queued {found} x{found_channels}, primary is {expected} x{channels}")]
    FormatMismatch {
        cue: CueId,
        expected: SampleFormat,
        channels: usize,
        found: SampleFormat,
        found_channels: usize,
    },
}
