//! Fetch, decode and stretch one cue's utterance into the playback queue.

use std::time::Duration;

use tracing::{debug, warn};
use voiceover_backend::{SynthesisBackend, request_url};
use voiceover_domain::{AudioFrame, Cue, CueId, FrameError, StreamFormat, TimeBase};

use crate::chain::{ChainError, UtteranceChain};
use crate::decode::{DecodeError, FrameSource, RemoteAudio};
use crate::error::{DubError, Result};
use crate::queue::{PlaybackQueue, QueuedFrame};
use crate::speed::{SpeedBounds, validate_speed};

/// Outcome of a generation that got as far as streaming audio.
#[derive(Debug)]
pub struct GenerationReport {
    pub cue_id: CueId,
    /// Natural duration of the synthesized utterance, zero when unknown.
    pub remote_duration: Duration,
    pub speed: f64,
    pub frames_queued: usize,
    /// Samples per channel appended to the queue.
    pub samples_queued: usize,
    /// Set when decoding stopped early; frames queued before it stay valid.
    pub decode_error: Option<DecodeError>,
}

/// Turns cues into queued audio for one primary stream.
pub struct SynthesisDriver<B> {
    backend: B,
    server: String,
    bounds: SpeedBounds,
    target: StreamFormat,
    target_time_base: TimeBase,
}

impl<B: SynthesisBackend> SynthesisDriver<B> {
    /// `server` is only used to label log lines and errors; requests go
    /// through `backend`.
    pub fn new(
        backend: B,
        server: impl Into<String>,
        bounds: SpeedBounds,
        target: StreamFormat,
        target_time_base: TimeBase,
    ) -> Self {
        Self {
            backend,
            server: server.into(),
            bounds,
            target,
            target_time_base,
        }
    }

    /// Synthesize `cue`, fit it to the cue's duration and append the result
    /// to `queue`.
    ///
    /// Returns an error when nothing could be queued because the backend, the
    /// speed or the chain failed. A decode failure mid-stream still returns a
    /// report so the caller can keep the frames already queued.
    pub fn generate(
        &mut self,
        cue_id: CueId,
        cue: &Cue,
        queue: &mut PlaybackQueue,
    ) -> Result<GenerationReport> {
        let url = request_url(&self.server, cue.text());
        let unreachable = |source: Box<dyn std::error::Error + Send + Sync>| {
            DubError::BackendUnreachable {
                url: url.clone(),
                source,
            }
        };

        let audio = self
            .backend
            .synthesize(cue.text())
            .map_err(|e| unreachable(Box::new(e)))?;
        let remote = RemoteAudio::open(audio).map_err(|e| unreachable(Box::new(e)))?;
        self.stream_utterance(cue_id, cue, remote, queue)
    }

    /// Stretch already decoded utterance audio into `queue`.
    pub fn stream_utterance<A: FrameSource>(
        &mut self,
        cue_id: CueId,
        cue: &Cue,
        mut remote: A,
        queue: &mut PlaybackQueue,
    ) -> Result<GenerationReport> {
        let remote_duration = remote.duration();
        let speed = self
            .bounds
            .speed_for(remote_duration.as_secs_f64(), cue.duration().as_secs_f64());
        let speed = validate_speed(speed)?;

        let mut chain = UtteranceChain::build(
            remote.stream_format(),
            self.target,
            self.target_time_base,
            speed,
        )
        .map_err(DubError::ChainBuild)?;
        debug!(
            %cue_id,
            remote_ms = remote_duration.as_millis() as u64,
            window_ms = cue.duration().as_millis() as u64,
            speed,
            "utterance ready"
        );

        let mut report = GenerationReport {
            cue_id,
            remote_duration,
            speed,
            frames_queued: 0,
            samples_queued: 0,
            decode_error: None,
        };

        let offset = remote.time_base().from_duration(cue.presentation_time());
        loop {
            let mut frame = match remote.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    report.decode_error = Some(e);
                    break;
                }
            };
            let position = remote
                .decoded_samples()
                .saturating_sub(frame.nb_samples() as u64);
            let local = frame
                .pts()
                .unwrap_or_else(|| i64::try_from(position).unwrap_or(i64::MAX));
            frame.set_pts(Some(local.saturating_add(offset)));

            match chain.push(&frame) {
                Ok(out) => enqueue(queue, cue_id, out, &mut report)?,
                Err(ChainError::Frame(FrameError::Allocation)) => {
                    return Err(DubError::AllocationFailure);
                }
                Err(e) => {
                    report.decode_error = Some(e.into());
                    break;
                }
            }
        }

        // Flush even after a failure so everything decoded so far plays.
        match chain.flush() {
            Ok(out) => enqueue(queue, cue_id, out, &mut report)?,
            Err(ChainError::Frame(FrameError::Allocation)) => {
                return Err(DubError::AllocationFailure);
            }
            Err(e) => {
                report.decode_error.get_or_insert(e.into());
            }
        }

        if let Some(err) = &report.decode_error {
            warn!(
                %cue_id,
                error = %err,
                frames = report.frames_queued,
                "utterance decode stopped early"
            );
        }
        Ok(report)
    }
}

fn enqueue(
    queue: &mut PlaybackQueue,
    cue_id: CueId,
    frame: Option<AudioFrame>,
    report: &mut GenerationReport,
) -> Result<()> {
    let Some(frame) = frame else {
        return Ok(());
    };
    report.frames_queued += 1;
    report.samples_queued += frame.nb_samples();
    queue.push_back(QueuedFrame::new(cue_id, frame))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use symphonia::core::errors::Error as SymphoniaError;
    use voiceover_backend::{BackendError, SynthesizedAudio};
    use voiceover_domain::SampleFormat;

    const RATE: u32 = 16_000;

    /// Never asked for audio: every test hands frames in directly.
    struct NoBackend;

    impl SynthesisBackend for NoBackend {
        fn synthesize(&self, text: &str) -> voiceover_backend::Result<SynthesizedAudio> {
            Err(BackendError::EmptyBody {
                url: format!("none://{text}"),
            })
        }
    }

    /// Plays back prepared frames, then optionally fails.
    struct Frames {
        format: StreamFormat,
        duration: Duration,
        frames: VecDeque<AudioFrame>,
        fail_at_end: bool,
        decoded: u64,
    }

    impl Frames {
        fn tone(format: StreamFormat, count: usize, len: usize, fail_at_end: bool) -> Self {
            let tb = format.natural_time_base().unwrap();
            let frames = (0..count)
                .map(|i| {
                    let mono: Vec<f32> = (0..len)
                        .map(|n| ((i * len + n) as f32 * 0.07).sin() * 0.3)
                        .collect();
                    let planes = vec![mono; format.channels];
                    AudioFrame::from_planar_f32(format, tb, Some((i * len) as i64), &planes)
                        .unwrap()
                })
                .collect();
            Self {
                format,
                duration: Duration::ZERO,
                frames,
                fail_at_end,
                decoded: 0,
            }
        }
    }

    impl FrameSource for Frames {
        fn stream_format(&self) -> StreamFormat {
            self.format
        }

        fn time_base(&self) -> TimeBase {
            self.format.natural_time_base().unwrap()
        }

        fn duration(&self) -> Duration {
            self.duration
        }

        fn next_frame(&mut self) -> std::result::Result<Option<AudioFrame>, DecodeError> {
            match self.frames.pop_front() {
                Some(frame) => {
                    self.decoded += frame.nb_samples() as u64;
                    Ok(Some(frame))
                }
                None if self.fail_at_end => {
                    Err(SymphoniaError::DecodeError("corrupt packet").into())
                }
                None => Ok(None),
            }
        }

        fn decoded_samples(&self) -> u64 {
            self.decoded
        }
    }

    fn mono(format: SampleFormat) -> StreamFormat {
        StreamFormat::new(RATE, 1, format)
    }

    fn driver(bounds: SpeedBounds) -> SynthesisDriver<NoBackend> {
        let target = mono(SampleFormat::S16);
        SynthesisDriver::new(
            NoBackend,
            "none://tts?",
            bounds,
            target,
            target.natural_time_base().unwrap(),
        )
    }

    fn cue(at_ms: u64) -> Cue {
        Cue::new(
            "hello",
            Duration::from_millis(at_ms),
            Duration::from_secs(2),
        )
    }

    #[test]
    fn test_decode_error_keeps_frames_already_decoded() {
        let mut driver = driver(SpeedBounds::default());
        let mut queue = PlaybackQueue::new();
        let source = Frames::tone(mono(SampleFormat::F32P), 3, 1_600, true);

        let report = driver
            .stream_utterance(CueId(4), &cue(0), source, &mut queue)
            .expect("report");

        assert!(matches!(
            report.decode_error,
            Some(DecodeError::Symphonia(SymphoniaError::DecodeError(_)))
        ));
        assert_eq!(report.speed, 1.0);
        assert!(report.frames_queued > 0);
        assert_eq!(report.frames_queued, queue.len());
        // Everything decoded before the failure was flushed through the chain.
        assert_eq!(report.samples_queued, 4_800);
        assert_eq!(queue.queued_samples(), 4_800);
        assert!(queue.peek_front().is_some_and(|f| f.cue_id == CueId(4)));
    }

    #[test]
    fn test_clean_end_of_stream_has_no_error() {
        let mut driver = driver(SpeedBounds::default());
        let mut queue = PlaybackQueue::new();
        let source = Frames::tone(mono(SampleFormat::F32P), 2, 800, false);

        let report = driver
            .stream_utterance(CueId(0), &cue(500), source, &mut queue)
            .expect("report");

        assert!(report.decode_error.is_none());
        assert_eq!(queue.queued_samples(), 1_600);
        // Timestamps start at the cue's presentation time.
        assert_eq!(queue.peek_front().and_then(|f| f.frame.pts()), Some(8_000));
    }

    #[test]
    fn test_immediate_decode_error_queues_nothing() {
        let mut driver = driver(SpeedBounds::default());
        let mut queue = PlaybackQueue::new();
        let source = Frames::tone(mono(SampleFormat::F32P), 0, 0, true);

        let report = driver
            .stream_utterance(CueId(1), &cue(0), source, &mut queue)
            .expect("report");

        assert!(report.decode_error.is_some());
        assert_eq!(report.frames_queued, 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_zero_speed_bounds_reject_the_utterance() {
        let mut driver = driver(SpeedBounds::new(0.0, 0.0));
        let mut queue = PlaybackQueue::new();
        let mut source = Frames::tone(mono(SampleFormat::F32P), 2, 800, false);
        source.duration = Duration::from_millis(100);

        let err = driver
            .stream_utterance(CueId(2), &cue(0), source, &mut queue)
            .unwrap_err();

        assert!(matches!(err, DubError::InvalidSpeed(s) if s == 0.0));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_unbuildable_chain_is_reported() {
        let mut driver = driver(SpeedBounds::default());
        let mut queue = PlaybackQueue::new();
        let source = Frames {
            format: StreamFormat::new(0, 1, SampleFormat::F32P),
            duration: Duration::ZERO,
            frames: VecDeque::new(),
            fail_at_end: false,
            decoded: 0,
        };

        let err = driver
            .stream_utterance(CueId(3), &cue(0), source, &mut queue)
            .unwrap_err();

        assert!(matches!(err, DubError::ChainBuild(ChainError::ZeroSampleRate)));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_backend_failure_is_unreachable() {
        let mut driver = driver(SpeedBounds::default());
        let mut queue = PlaybackQueue::new();

        let err = driver.generate(CueId(5), &cue(0), &mut queue).unwrap_err();

        match err {
            DubError::BackendUnreachable { url, .. } => assert_eq!(url, "none://tts?text=hello"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(queue.is_empty());
    }
}
