//! FIFO of synthesized frames waiting to be mixed.

use std::collections::VecDeque;

use voiceover_domain::{AudioFrame, CueId};

use crate::error::{DubError, Result};

/// A synthesized frame tagged with the cue it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedFrame {
    pub cue_id: CueId,
    pub frame: AudioFrame,
}

impl QueuedFrame {
    pub fn new(cue_id: CueId, frame: AudioFrame) -> Self {
        Self { cue_id, frame }
    }
}

/// Strictly ordered, unbounded queue of [`QueuedFrame`]s.
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    frames: VecDeque<QueuedFrame>,
    queued_samples: usize,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame behind everything already queued.
    pub fn push_back(&mut self, frame: QueuedFrame) -> Result<()> {
        self.frames
            .try_reserve(1)
            .map_err(|_| DubError::AllocationFailure)?;
        self.queued_samples += frame.frame.nb_samples();
        self.frames.push_back(frame);
        Ok(())
    }

    pub fn peek_front(&self) -> Option<&QueuedFrame> {
        self.frames.front()
    }

    /// Mutable access to the front frame. The sample count cannot be changed
    /// through `AudioFrame`, so the queued total stays valid.
    pub fn peek_front_mut(&mut self) -> Option<&mut QueuedFrame> {
        self.frames.front_mut()
    }

    /// Remove the front frame, handing ownership to the caller.
    pub fn take_front(&mut self) -> Option<QueuedFrame> {
        let frame = self.frames.pop_front()?;
        self.queued_samples -= frame.frame.nb_samples();
        Some(frame)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Samples per channel across every queued frame.
    pub fn queued_samples(&self) -> usize {
        self.queued_samples
    }

    /// Keep only the frames for which `keep` returns `true`, in order.
    pub fn retain(&mut self, mut keep: impl FnMut(&QueuedFrame) -> bool) {
        self.frames.retain(|f| keep(f));
        self.queued_samples = self.frames.iter().map(|f| f.frame.nb_samples()).sum();
    }
}
