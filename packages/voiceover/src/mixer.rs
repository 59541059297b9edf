//! Sample-accurate overlay of queued speech onto primary frames.
//
//  • One kernel per sample format, picked once in `Mixer::new`.
//  • Each scalar becomes `saturate(wide(primary * aud) + wide(synth * sub))`
//    with a widened integer accumulator or a clamped float.
//  • The queued-frame offset survives across calls; the primary offset
//    never does.

use voiceover_domain::{AudioFrame, CueId, PcmScalar, SampleFormat, StreamFormat, TimeBase};

use crate::error::MixError;
use crate::queue::PlaybackQueue;

/* ─────────────────────────────── VOLUMES ───────────────────────────── */

/// Linear gains applied before summing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Volumes {
    /// Gain of the primary audio.
    pub aud_volume: f64,
    /// Gain of the synthesized speech.
    pub sub_volume: f64,
}

impl Default for Volumes {
    fn default() -> Self {
        Self {
            aud_volume: 1.0,
            sub_volume: 1.0,
        }
    }
}

/* ──────────────────────────── TRAIT CORE ───────────────────────────── */

/// Scalar types the mixer can sum with saturation.
pub trait MixSample: PcmScalar {
    fn mix(primary: Self, synth: Self, volumes: Volumes) -> Self;
}

impl MixSample for u8 {
    #[inline]
    fn mix(primary: Self, synth: Self, v: Volumes) -> Self {
        let a = (f64::from(primary) * v.aud_volume) as u16;
        let b = (f64::from(synth) * v.sub_volume) as u16;
        a.saturating_add(b).min(u16::from(u8::MAX)) as u8
    }
}

impl MixSample for i16 {
    #[inline]
    fn mix(primary: Self, synth: Self, v: Volumes) -> Self {
        let a = (f64::from(primary) * v.aud_volume) as i32;
        let b = (f64::from(synth) * v.sub_volume) as i32;
        a.saturating_add(b)
            .clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
    }
}

impl MixSample for i32 {
    #[inline]
    fn mix(primary: Self, synth: Self, v: Volumes) -> Self {
        let a = (f64::from(primary) * v.aud_volume) as i64;
        let b = (f64::from(synth) * v.sub_volume) as i64;
        a.saturating_add(b)
            .clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
    }
}

impl MixSample for f32 {
    #[inline]
    fn mix(primary: Self, synth: Self, v: Volumes) -> Self {
        (primary * v.aud_volume as f32 + synth * v.sub_volume as f32).clamp(-1.0, 1.0)
    }
}

impl MixSample for f64 {
    #[inline]
    fn mix(primary: Self, synth: Self, v: Volumes) -> Self {
        (primary * v.aud_volume + synth * v.sub_volume).clamp(-1.0, 1.0)
    }
}

/* ─────────────────────────────── KERNELS ───────────────────────────── */

/// Mix `n` samples per channel of `src` (from `src_off`) into `dst` (from
/// `dst_off`). Both frames have the same format and channel count.
type Kernel = fn(&mut AudioFrame, usize, &AudioFrame, usize, usize, Volumes);

fn mix_packed<T: MixSample>(
    dst: &mut AudioFrame,
    dst_off: usize,
    src: &AudioFrame,
    src_off: usize,
    n: usize,
    volumes: Volumes,
) {
    let channels = dst.channels();
    let Some(src) = src.planes::<T>().and_then(|p| p.first()) else {
        return;
    };
    let Some(dst) = dst.planes_mut::<T>().and_then(|mut p| p.next()) else {
        return;
    };
    let dst = &mut dst[dst_off * channels..(dst_off + n) * channels];
    let src = &src[src_off * channels..(src_off + n) * channels];
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = T::mix(*d, s, volumes);
    }
}

fn mix_planar<T: MixSample>(
    dst: &mut AudioFrame,
    dst_off: usize,
    src: &AudioFrame,
    src_off: usize,
    n: usize,
    volumes: Volumes,
) {
    let (Some(src), Some(dst)) = (src.planes::<T>(), dst.planes_mut::<T>()) else {
        return;
    };
    for (dst, src) in dst.zip(src) {
        let dst = &mut dst[dst_off..dst_off + n];
        let src = &src[src_off..src_off + n];
        for (d, &s) in dst.iter_mut().zip(src) {
            *d = T::mix(*d, s, volumes);
        }
    }
}

fn kernel_for(format: SampleFormat) -> Kernel {
    match format {
        SampleFormat::U8 => mix_packed::<u8>,
        SampleFormat::U8P => mix_planar::<u8>,
        SampleFormat::S16 => mix_packed::<i16>,
        SampleFormat::S16P => mix_planar::<i16>,
        SampleFormat::S32 => mix_packed::<i32>,
        SampleFormat::S32P => mix_planar::<i32>,
        SampleFormat::F32 => mix_packed::<f32>,
        SampleFormat::F32P => mix_planar::<f32>,
        SampleFormat::F64 => mix_packed::<f64>,
        SampleFormat::F64P => mix_planar::<f64>,
    }
}

/* ─────────────────────────────── MIXER ─────────────────────────────── */

/// What one call to [`Mixer::mix`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MixOutcome {
    /// Samples per channel of the primary frame that received speech.
    pub mixed_samples: usize,
    /// Cues whose frames were (partly) mixed, in queue order.
    pub touched: Vec<CueId>,
    /// Cues whose last queued frame was fully consumed.
    pub retired: Vec<CueId>,
}

pub struct Mixer {
    stream: StreamFormat,
    volumes: Volumes,
    kernel: Kernel,
    queued_offset: usize,
}

impl Mixer {
    pub fn new(stream: StreamFormat, volumes: Volumes) -> Self {
        Self {
            stream,
            volumes,
            kernel: kernel_for(stream.sample_format),
            queued_offset: 0,
        }
    }

    /// Samples per channel already consumed from the front queued frame.
    pub fn queued_offset(&self) -> usize {
        self.queued_offset
    }

    /// Overlay queued speech onto `frame` in place.
    ///
    /// Nothing happens when the queue is empty or when the front frame is
    /// due strictly after `effective_pts` (expressed in the frame's time
    /// base). The frame's sample count and timestamp are never changed.
    pub fn mix(
        &mut self,
        frame: &mut AudioFrame,
        effective_pts: i64,
        queue: &mut PlaybackQueue,
    ) -> Result<MixOutcome, MixError> {
        if frame.format() != self.stream.sample_format || frame.channels() != self.stream.channels
        {
            return Err(MixError::PrimaryFormat {
                expected: self.stream.sample_format,
                channels: self.stream.channels,
                found: frame.format(),
                found_channels: frame.channels(),
            });
        }

        let mut outcome = MixOutcome::default();
        let Some(front) = queue.peek_front() else {
            return Ok(outcome);
        };
        if let Some(pts) = front.frame.pts() {
            let due = rescale(pts, front.frame.time_base(), frame.time_base());
            if due > effective_pts {
                return Ok(outcome);
            }
        }

        let mut primary_offset = 0;
        while let Some(front) = queue.peek_front() {
            let cue_id = front.cue_id;
            let queued = &front.frame;
            if queued.format() != frame.format() || queued.channels() != frame.channels() {
                return Err(MixError::FormatMismatch {
                    cue: cue_id,
                    expected: frame.format(),
                    channels: frame.channels(),
                    found: queued.format(),
                    found_channels: queued.channels(),
                });
            }

            let queued_len = queued.nb_samples();
            let n = (frame.nb_samples() - primary_offset)
                .min(queued_len.saturating_sub(self.queued_offset));
            (self.kernel)(frame, primary_offset, queued, self.queued_offset, n, self.volumes);

            if n > 0 && outcome.touched.last() != Some(&cue_id) {
                outcome.touched.push(cue_id);
            }
            outcome.mixed_samples += n;
            primary_offset += n;
            self.queued_offset += n;

            if self.queued_offset >= queued_len {
                queue.take_front();
                self.queued_offset = 0;
                if queue.peek_front().map(|f| f.cue_id) != Some(cue_id) {
                    outcome.retired.push(cue_id);
                }
            }
            if primary_offset >= frame.nb_samples() {
                break;
            }
        }
        Ok(outcome)
    }
}

fn rescale(pts: i64, from: TimeBase, to: TimeBase) -> i64 {
    if from == to { pts } else { from.rescale(pts, to) }
}
