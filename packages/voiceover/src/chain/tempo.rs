//! Pitch-preserving time-stretch (WSOLA).
//!
//! Hann-windowed frames of `WINDOW` samples are overlap-added every `HOP`
//! output samples. Frame `k` is taken from around input position
//! `k * HOP * speed`; within `±SEEK` samples the start that best continues
//! the previous frame (highest cross-correlation) wins, which keeps the
//! waveform phase-coherent without touching pitch.

use std::f32::consts::PI;

use super::ChainError;

const WINDOW: usize = 1024;
const HOP: usize = WINDOW / 2;
const SEEK: usize = 256;

pub struct TimeStretch {
    speed: f64,
    window: Vec<f32>,
    input: Vec<f32>,
    /// Absolute input index of `input[0]`.
    base: usize,
    fed: u64,
    frame: usize,
    prev_start: Option<usize>,
    overlap: Vec<f32>,
    emitted: u64,
}

impl TimeStretch {
    pub fn new(speed: f64) -> Result<Self, ChainError> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(ChainError::InvalidSpeed(speed));
        }
        // Periodic Hann: w[i] + w[i + HOP] == 1.
        let window = (0..WINDOW)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / WINDOW as f32).cos())
            .collect();
        Ok(Self {
            speed,
            window,
            input: Vec::new(),
            base: 0,
            fed: 0,
            frame: 0,
            prev_start: None,
            overlap: vec![0.0; HOP],
            emitted: 0,
        })
    }

    /// Output length once everything fed so far has been flushed.
    pub fn expected_len(&self) -> u64 {
        (self.fed as f64 / self.speed).round() as u64
    }

    pub fn push(&mut self, samples: &[f32]) -> Vec<f32> {
        self.input.extend_from_slice(samples);
        self.fed += samples.len() as u64;

        let mut out = Vec::new();
        while self.can_step(true) {
            self.step(&mut out);
        }
        out
    }

    /// Zero-pad the tail and emit exactly `expected_len()` samples in total.
    pub fn flush(&mut self) -> Vec<f32> {
        let target = self.expected_len();
        let mut out = Vec::new();
        while self.emitted < target {
            if self.can_step(false) {
                self.step(&mut out);
            } else {
                let len = self.input.len() + WINDOW + SEEK;
                self.input.resize(len, 0.0);
            }
        }
        if self.emitted > target {
            let excess = (self.emitted - target) as usize;
            out.truncate(out.len().saturating_sub(excess));
            self.emitted = target;
        }
        out
    }

    fn nominal(&self, frame: usize) -> usize {
        (frame as f64 * HOP as f64 * self.speed).round() as usize
    }

    fn can_step(&self, live: bool) -> bool {
        let end = self.base + self.input.len();
        let search_end = self.nominal(self.frame) + SEEK + WINDOW;
        let natural_end = self.prev_start.map_or(0, |p| p + HOP + WINDOW);
        if search_end.max(natural_end) > end {
            return false;
        }
        // While streaming never run ahead of the final output length.
        !live || self.emitted + HOP as u64 <= self.expected_len()
    }

    fn step(&mut self, out: &mut Vec<f32>) {
        let start = match self.prev_start {
            None => 0,
            Some(prev) => self.best_start(prev),
        };
        let from = start - self.base;
        let segment = &self.input[from..from + WINDOW];

        // The first frame has nothing to overlap with, so its rising half is
        // left unwindowed.
        let first = self.frame == 0;
        for i in 0..HOP {
            let head = if first {
                segment[i]
            } else {
                segment[i] * self.window[i]
            };
            out.push(self.overlap[i] + head);
            self.overlap[i] = segment[HOP + i] * self.window[HOP + i];
        }

        self.emitted += HOP as u64;
        self.prev_start = Some(start);
        self.frame += 1;

        let keep_from = self
            .nominal(self.frame)
            .saturating_sub(SEEK)
            .min(start + HOP);
        if keep_from > self.base {
            self.input.drain(..keep_from - self.base);
            self.base = keep_from;
        }
    }

    /// Start within the seek range that best continues the previous frame.
    fn best_start(&self, prev: usize) -> usize {
        let natural = prev + HOP - self.base;
        let reference = &self.input[natural..natural + WINDOW];
        let score = |p: usize| {
            let from = p - self.base;
            self.input[from..from + WINDOW]
                .iter()
                .zip(reference)
                .map(|(a, b)| a * b)
                .sum::<f32>()
        };

        let centre = self.nominal(self.frame);
        let mut best = (centre, score(centre));
        for p in centre.saturating_sub(SEEK).max(self.base)..=centre + SEEK {
            let s = score(p);
            if s > best.1 {
                best = (p, s);
            }
        }
        best.0
    }
}
