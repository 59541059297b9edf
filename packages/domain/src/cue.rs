//! Subtitle cues as seen by the dubbing pipeline.

use std::fmt;
use std::time::Duration;

/// A timed subtitle event: what to say, when, and for how long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    text: String,
    presentation_time: Duration,
    duration: Duration,
}

impl Cue {
    pub fn new(text: impl Into<String>, presentation_time: Duration, duration: Duration) -> Self {
        Self {
            text: text.into(),
            presentation_time,
            duration,
        }
    }

    /// Build a cue from markup lines already stripped of styling codes.
    /// Lines are joined with `\n`.
    pub fn from_lines<I, S>(lines: I, presentation_time: Duration, duration: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut text = String::new();
        for (i, line) in lines.into_iter().enumerate() {
            if i > 0 {
                text.push('\n');
            }
            text.push_str(line.as_ref());
        }
        Self::new(text, presentation_time, duration)
    }

    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[inline]
    pub fn presentation_time(&self) -> Duration {
        self.presentation_time
    }

    #[inline]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Time at which the cue stops being displayed.
    pub fn end(&self) -> Duration {
        self.presentation_time.saturating_add(self.duration)
    }

    /// `true` when there is nothing to speak.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Identifier handed out to cues in pull order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CueId(pub u64);

impl CueId {
    /// The id following this one.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for CueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cue#{}", self.0)
    }
}
