//! # Voiceover Domain
//!
//! Shared value types for the voiceover workspace: sample formats, typed
//! sample buffers, audio frames, rational time bases and subtitle cues.
//!
//! Nothing in here performs I/O; the types are shared between the synthesis
//! backend, the utterance chain and the mixer so that every stage agrees on
//! how audio and time are represented.

pub mod audio_frame;
pub mod cue;
pub mod frame_error;
pub mod sample_buffer;
pub mod sample_format;
pub mod time_base;

// Re-export core types
pub use audio_frame::{AudioFrame, StreamFormat};
pub use cue::{Cue, CueId};
pub use frame_error::FrameError;
pub use sample_buffer::{PcmScalar, SampleBuffer};
pub use sample_format::{SampleFormat, SampleKind};
pub use time_base::TimeBase;

/// Prelude module containing commonly used types.
pub mod prelude {
    pub use crate::{
        AudioFrame, Cue, CueId, FrameError, PcmScalar, SampleBuffer, SampleFormat, SampleKind,
        StreamFormat, TimeBase,
    };
}
