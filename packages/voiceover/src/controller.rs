//! Frame-driven orchestration: pull due cues, generate them, mix.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, error, info, warn};
use voiceover_backend::SynthesisBackend;
use voiceover_domain::{AudioFrame, Cue, CueId, StreamFormat, TimeBase};

use crate::driver::{GenerationReport, SynthesisDriver};
use crate::error::{DubError, MixError, Result};
use crate::mixer::{Mixer, Volumes};
use crate::queue::PlaybackQueue;
use crate::speed::SpeedBounds;
use crate::subtitle::CueSource;

/// Lifecycle of a cue inside the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CueState {
    /// Not pulled from the cue source yet.
    AwaitingCue,
    /// Synthesis in progress.
    Generating,
    /// Frames queued, none mixed yet.
    Queued,
    /// Some of its frames have been mixed.
    Mixing,
    /// All of its frames have been mixed.
    Retired,
    /// Produced no audio.
    Discarded,
}

impl fmt::Display for CueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AwaitingCue => "awaiting",
            Self::Generating => "generating",
            Self::Queued => "queued",
            Self::Mixing => "mixing",
            Self::Retired => "retired",
            Self::Discarded => "discarded",
        })
    }
}

/// What the pipeline knows about one pulled cue.
#[derive(Debug, Clone, PartialEq)]
pub struct CueRecord {
    pub id: CueId,
    pub cue: Cue,
    pub state: CueState,
    pub speed: Option<f64>,
    pub frames_queued: usize,
    /// Why the cue was discarded or cut short.
    pub failure: Option<String>,
}

/// Running totals, logged by [`DubbingPipeline::finish`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub cues_pulled: u64,
    pub cues_discarded: u64,
    pub cues_retired: u64,
    pub frames_processed: u64,
    /// Samples per channel of primary audio that received speech.
    pub samples_mixed: u64,
    /// Synthesized frames still queued when the stream ended.
    pub pending_frames: usize,
}

/// Tunables shared by the driver and the mixer.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Base URL, used to label requests in logs.
    pub server: String,
    pub bounds: SpeedBounds,
    pub volumes: Volumes,
}

/// Mixes synthesized speech for a cue track into one primary audio stream.
///
/// Frames must be fed in arrival order. Generation happens synchronously
/// inside [`process_frame`](Self::process_frame), so a frame that triggers a
/// cue is delayed by the synthesis round-trip.
pub struct DubbingPipeline<S, B> {
    source: S,
    driver: SynthesisDriver<B>,
    queue: PlaybackQueue,
    mixer: Mixer,
    stream: StreamFormat,
    time_base: TimeBase,
    next_id: CueId,
    records: BTreeMap<CueId, CueRecord>,
    stats: PipelineStats,
    position: i64,
}

impl<S: CueSource, B: SynthesisBackend> DubbingPipeline<S, B> {
    /// Pipeline for primary frames of `stream` timestamped in `time_base`.
    pub fn new(
        stream: StreamFormat,
        time_base: TimeBase,
        options: PipelineOptions,
        source: S,
        backend: B,
    ) -> Result<Self> {
        stream
            .validate()
            .map_err(|e| DubError::Config(format!("primary stream: {e}")))?;
        let driver =
            SynthesisDriver::new(backend, options.server, options.bounds, stream, time_base);
        Ok(Self {
            source,
            driver,
            queue: PlaybackQueue::new(),
            mixer: Mixer::new(stream, options.volumes),
            stream,
            time_base,
            next_id: CueId(0),
            records: BTreeMap::new(),
            stats: PipelineStats::default(),
            position: 0,
        })
    }

    /// Overlay due speech onto `frame` and hand it back.
    ///
    /// The frame's sample count and timestamp never change. Only
    /// `AllocationFailure` and a primary frame of the wrong format are
    /// returned as errors; cue failures are logged and counted.
    pub fn process_frame(&mut self, mut frame: AudioFrame) -> Result<AudioFrame> {
        let effective_pts = self.effective_pts(&frame);
        let now = frame.time_base().to_duration(effective_pts);

        while let Some(cue) = self.source.pull(now) {
            self.start_cue(cue)?;
        }

        match self.mixer.mix(&mut frame, effective_pts, &mut self.queue) {
            Ok(outcome) => {
                for id in outcome.touched {
                    self.transition(id, CueState::Queued, CueState::Mixing);
                }
                for id in outcome.retired {
                    if self.set_state(id, CueState::Retired) {
                        self.stats.cues_retired += 1;
                        debug!(cue_id = %id, "cue retired");
                    }
                }
                self.stats.samples_mixed += outcome.mixed_samples as u64;
            }
            Err(MixError::FormatMismatch { cue, .. }) => {
                // Drop the offending cue's frames; the primary frame stays intact.
                warn!(
                    cue_id = %cue,
                    "queued audio does not match the primary stream, dropping cue"
                );
                self.drop_queued(cue);
                self.discard(cue, "queued audio does not match the primary stream".into());
            }
            Err(e) => return Err(e.into()),
        }

        self.stats.frames_processed += 1;
        self.position = self.position.saturating_add(frame.nb_samples() as i64);
        Ok(frame)
    }

    /// State of `id`; cues not pulled yet are `AwaitingCue`.
    pub fn cue_state(&self, id: CueId) -> CueState {
        self.records
            .get(&id)
            .map_or(CueState::AwaitingCue, |r| r.state)
    }

    /// Every pulled cue, in pull order.
    pub fn cue_records(&self) -> impl Iterator<Item = &CueRecord> {
        self.records.values()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn queue(&self) -> &PlaybackQueue {
        &self.queue
    }

    /// End of stream: report totals. Speech still queued is dropped.
    pub fn finish(self) -> PipelineStats {
        let mut stats = self.stats;
        stats.pending_frames = self.queue.len();
        info!(
            cues_pulled = stats.cues_pulled,
            cues_retired = stats.cues_retired,
            cues_discarded = stats.cues_discarded,
            frames = stats.frames_processed,
            samples_mixed = stats.samples_mixed,
            pending_frames = stats.pending_frames,
            "dubbing finished"
        );
        if stats.pending_frames > 0 {
            warn!(
                pending_frames = stats.pending_frames,
                pending_samples = self.queue.queued_samples(),
                "stream ended before all speech was mixed"
            );
        }
        stats
    }

    /// Frame pts, or the running sample position when the frame has none.
    fn effective_pts(&self, frame: &AudioFrame) -> i64 {
        frame.pts().unwrap_or_else(|| {
            let rate_tb =
                TimeBase::from_sample_rate(self.stream.sample_rate).unwrap_or(self.time_base);
            rate_tb.rescale(self.position, frame.time_base())
        })
    }

    fn start_cue(&mut self, cue: Cue) -> Result<()> {
        let id = self.next_id;
        self.next_id = id.next();
        self.stats.cues_pulled += 1;
        info!(
            cue_id = %id,
            at_ms = cue.presentation_time().as_millis() as u64,
            window_ms = cue.duration().as_millis() as u64,
            text = cue.text(),
            "cue due"
        );
        self.records.insert(
            id,
            CueRecord {
                id,
                cue: cue.clone(),
                state: CueState::Generating,
                speed: None,
                frames_queued: 0,
                failure: None,
            },
        );

        if cue.is_blank() {
            self.discard(id, "empty text".into());
            return Ok(());
        }

        let result = self.driver.generate(id, &cue, &mut self.queue);
        self.settle(id, result)
    }

    /// Record how generation of `id` ended.
    fn settle(&mut self, id: CueId, result: Result<GenerationReport>) -> Result<()> {
        match result {
            Ok(report) => {
                let failure = report.decode_error.as_ref().map(ToString::to_string);
                if let Some(record) = self.records.get_mut(&id) {
                    record.speed = Some(report.speed);
                    record.frames_queued = report.frames_queued;
                    record.failure = failure.clone();
                }
                if report.frames_queued == 0 {
                    self.discard(id, failure.unwrap_or_else(|| "no audio produced".into()));
                } else {
                    self.set_state(id, CueState::Queued);
                    info!(
                        cue_id = %id,
                        speed = report.speed,
                        frames = report.frames_queued,
                        samples = report.samples_queued,
                        "cue queued"
                    );
                }
                Ok(())
            }
            Err(e) if e.is_fatal() => {
                error!(cue_id = %id, error = %e, "fatal error while generating cue");
                self.drop_queued(id);
                self.discard(id, e.to_string());
                Err(e)
            }
            Err(e) => {
                warn!(cue_id = %id, error = %e, "cue skipped");
                self.drop_queued(id);
                self.discard(id, e.to_string());
                Ok(())
            }
        }
    }

    /// Remove every queued frame belonging to `id`.
    fn drop_queued(&mut self, id: CueId) {
        let before = self.queue.len();
        self.queue.retain(|f| f.cue_id != id);
        let dropped = before - self.queue.len();
        if dropped > 0 {
            debug!(cue_id = %id, frames = dropped, "dropped queued audio");
        }
    }

    fn discard(&mut self, id: CueId, reason: String) {
        if let Some(record) = self.records.get_mut(&id)
            && record.state != CueState::Discarded
        {
            record.state = CueState::Discarded;
            record.failure = Some(reason);
            self.stats.cues_discarded += 1;
        }
    }

    fn set_state(&mut self, id: CueId, state: CueState) -> bool {
        match self.records.get_mut(&id) {
            Some(record) if record.state != state && record.state != CueState::Discarded => {
                record.state = state;
                true
            }
            _ => false,
        }
    }

    fn transition(&mut self, id: CueId, from: CueState, to: CueState) {
        if self.cue_state(id) == from {
            self.set_state(id, to);
        }
    }
}
