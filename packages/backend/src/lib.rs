//! # Voiceover Backend
//!
//! Client side of the remote text-to-speech server. The server is addressed
//! by a base URL; the cue text is percent-encoded and appended as
//! `text=<encoded>`, and the response body is an audio resource that the
//! pipeline probes and decodes.

pub mod client;
pub mod encoding;
pub mod error;

pub use client::{BackendConfig, HttpSynthesisBackend};
pub use encoding::{percent_decode, percent_encode, request_url};
pub use error::{BackendError, Result};

/// Raw synthesized audio as returned by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    /// Encoded audio resource (WAV, MP3, ...).
    pub bytes: Vec<u8>,
    /// `Content-Type` reported by the server, if any.
    pub content_type: Option<String>,
}

impl SynthesizedAudio {
    pub fn new(bytes: Vec<u8>, content_type: Option<String>) -> Self {
        Self {
            bytes,
            content_type,
        }
    }

    /// File extension implied by the content type, used as a probe hint.
    pub fn extension_hint(&self) -> Option<&'static str> {
        let mime = self.content_type.as_deref()?;
        let essence = mime.split(';').next().unwrap_or(mime).trim();
        match essence.to_ascii_lowercase().as_str() {
            "audio/wav" | "audio/x-wav" | "audio/wave" | "audio/vnd.wave" => Some("wav"),
            "audio/mpeg" | "audio/mp3" => Some("mp3"),
            "audio/ogg" | "audio/vorbis" | "application/ogg" => Some("ogg"),
            "audio/flac" | "audio/x-flac" => Some("flac"),
            "audio/aac" | "audio/mp4" | "audio/x-m4a" => Some("m4a"),
            _ => None,
        }
    }
}

/// Anything that can turn text into an encoded audio resource.
///
/// One backend instance belongs to one pipeline; implementations do not need
/// to be shared across threads.
pub trait SynthesisBackend {
    /// Synthesize `text`, blocking until the full resource is available.
    fn synthesize(&self, text: &str) -> Result<SynthesizedAudio>;
}

impl<B: SynthesisBackend + ?Sized> SynthesisBackend for Box<B> {
    fn synthesize(&self, text: &str) -> Result<SynthesizedAudio> {
        (**self).synthesize(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_hint_from_content_type() {
        let audio = SynthesizedAudio::new(vec![1], Some("audio/x-wav; charset=binary".into()));
        assert_eq!(audio.extension_hint(), Some("wav"));
        let audio = SynthesizedAudio::new(vec![1], Some("Audio/MPEG".into()));
        assert_eq!(audio.extension_hint(), Some("mp3"));
        let audio = SynthesizedAudio::new(vec![1], None);
        assert_eq!(audio.extension_hint(), None);
    }
}
