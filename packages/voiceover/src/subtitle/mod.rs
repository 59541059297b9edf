//! Cue sources: where the pipeline learns what to say and when.
//!
//! [`SubtitleTrack`] is the in-memory source used by the CLI; it is built
//! from SubRip (`.srt`) or Advanced SubStation (`.ass`/`.ssa`) files, or
//! from cues assembled by the caller.

mod ass;
mod srt;

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;
use voiceover_domain::Cue;

#[derive(Error, Debug)]
pub enum SubtitleError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported subtitle format {0:?} (expected .srt, .ass or .ssa)")]
    UnsupportedFormat(String),

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

impl SubtitleError {
    fn parse(line: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            line,
            reason: reason.into(),
        }
    }
}

/// Supplies cues once their presentation time has been reached.
pub trait CueSource {
    /// Next cue whose presentation time is `<= now`, if any.
    fn pull(&mut self, now: Duration) -> Option<Cue>;
}

impl<S: CueSource + ?Sized> CueSource for Box<S> {
    fn pull(&mut self, now: Duration) -> Option<Cue> {
        (**self).pull(now)
    }
}

/// Cues sorted by presentation time, handed out once each.
#[derive(Debug, Clone, Default)]
pub struct SubtitleTrack {
    cues: VecDeque<Cue>,
}

impl SubtitleTrack {
    /// Sort `cues` by presentation time (stable) and drop the blank ones.
    pub fn from_cues(mut cues: Vec<Cue>) -> Self {
        cues.retain(|c| !c.is_blank());
        cues.sort_by_key(Cue::presentation_time);
        Self { cues: cues.into() }
    }

    /// Load a subtitle file, choosing the parser from its extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SubtitleError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let text = std::fs::read_to_string(path).map_err(|source| SubtitleError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let track = match ext.as_str() {
            "srt" => Self::parse_srt(&text)?,
            "ass" | "ssa" => Self::parse_ass(&text)?,
            _ => return Err(SubtitleError::UnsupportedFormat(ext)),
        };
        debug!(path = %path.display(), cues = track.len(), "subtitle track loaded");
        Ok(track)
    }

    pub fn parse_srt(text: &str) -> Result<Self, SubtitleError> {
        Ok(Self::from_cues(srt::parse(strip_bom(text))?))
    }

    pub fn parse_ass(text: &str) -> Result<Self, SubtitleError> {
        Ok(Self::from_cues(ass::parse(strip_bom(text))?))
    }

    /// Cues not yet pulled.
    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cue> {
        self.cues.iter()
    }
}

impl CueSource for SubtitleTrack {
    fn pull(&mut self, now: Duration) -> Option<Cue> {
        if self.cues.front()?.presentation_time() <= now {
            self.cues.pop_front()
        } else {
            None
        }
    }
}

fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

/// Parse `H:MM:SS<sep>frac` where `frac` is read as a decimal fraction of a
/// second (`,123` and `.12` both work).
fn parse_clock(raw: &str, line: usize) -> Result<Duration, SubtitleError> {
    let bad = || SubtitleError::parse(line, format!("invalid timestamp {raw:?}"));
    let raw = raw.trim();
    let (clock, frac) = match raw.rfind([',', '.']) {
        Some(i) => (&raw[..i], &raw[i + 1..]),
        None => (raw, ""),
    };

    let mut parts = clock.split(':');
    let (Some(h), Some(m), Some(s), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(bad());
    };
    let num = |v: &str| v.trim().parse::<u64>().map_err(|_| bad());
    let (h, m, s) = (num(h)?, num(m)?, num(s)?);
    if m >= 60 || s >= 60 {
        return Err(bad());
    }

    let mut nanos = 0u64;
    if !frac.is_empty() {
        if frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad());
        }
        nanos = num(frac)? * 10u64.pow(9 - frac.len() as u32);
    }
    Ok(Duration::from_secs(h * 3600 + m * 60 + s) + Duration::from_nanos(nanos))
}
