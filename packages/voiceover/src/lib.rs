//! # Voiceover
//!
//! Turns subtitle cues into spoken audio and mixes it into a primary audio
//! stream:
//!
//! 1. cues become due as primary frames arrive ([`subtitle`]),
//! 2. each cue's text is synthesized by a remote server and decoded
//!    ([`driver`], [`decode`]),
//! 3. the speech is resampled and time-stretched so it fits the cue's
//!    display window ([`chain`], [`speed`]),
//! 4. the resulting frames wait in a FIFO ([`queue`]) and are added to the
//!    primary audio sample-accurately ([`mixer`]).
//!
//! [`DubbingPipeline`] ties the stages together; the `voiceover` binary
//! drives it from WAV files.

/* ─────────────────────────── sub-modules ─────────────────────────── */

pub mod chain;
pub mod cli;
pub mod config;
pub mod controller;
pub mod decode;
pub mod driver;
pub mod error;
pub mod mixer;
pub mod queue;
pub mod speed;
pub mod subtitle;
pub mod wav_io;

/* ───────────────────────── public re-exports ──────────────────────── */

pub use chain::{ChainError, UtteranceChain};
pub use config::DubConfig;
pub use controller::{CueRecord, CueState, DubbingPipeline, PipelineOptions, PipelineStats};
pub use decode::{DecodeError, FrameSource, RemoteAudio};
pub use driver::{GenerationReport, SynthesisDriver};
pub use error::{DubError, MixError, Result};
pub use mixer::{MixOutcome, Mixer, Volumes};
pub use queue::{PlaybackQueue, QueuedFrame};
pub use speed::SpeedBounds;
pub use subtitle::{CueSource, SubtitleError, SubtitleTrack};
pub use wav_io::{WavFrameReader, WavFrameWriter};
