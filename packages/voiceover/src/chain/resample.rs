//! Streaming mono resampler used on both ends of the utterance chain.
//!
//! Wraps rubato's `FftFixedIn`: input is buffered until a full chunk is
//! available, the resampler's output delay is dropped from the head, and
//! `flush` pads the tail so the total output length is exactly
//! `round(input_len * to / from)`.

use rubato::{FftFixedIn, Resampler};

use super::ChainError;

const CHUNK: usize = 1024;
const SUB_CHUNKS: usize = 2;
/// Upper bound on zero-input calls while draining the resampler.
const MAX_DRAIN_CALLS: usize = 64;

pub struct StreamResampler {
    from: u32,
    to: u32,
    engine: Option<FftFixedIn<f32>>,
    pending: Vec<f32>,
    skip: usize,
    fed: u64,
    produced: u64,
}

impl StreamResampler {
    /// Resampler from `from` Hz to `to` Hz; a pass-through when they match.
    pub fn new(from: u32, to: u32) -> Result<Self, ChainError> {
        if from == 0 || to == 0 {
            return Err(ChainError::ZeroSampleRate);
        }
        let engine = if from == to {
            None
        } else {
            Some(FftFixedIn::<f32>::new(
                from as usize,
                to as usize,
                CHUNK,
                SUB_CHUNKS,
                1,
            )?)
        };
        let skip = engine.as_ref().map_or(0, |e| e.output_delay());
        Ok(Self {
            from,
            to,
            engine,
            pending: Vec::new(),
            skip,
            fed: 0,
            produced: 0,
        })
    }

    pub fn is_bypass(&self) -> bool {
        self.engine.is_none()
    }

    /// Output length once everything fed so far has been flushed.
    pub fn expected_len(&self) -> u64 {
        let num = u128::from(self.fed) * u128::from(self.to) + u128::from(self.from) / 2;
        (num / u128::from(self.from)) as u64
    }

    pub fn push(&mut self, input: &[f32]) -> Result<Vec<f32>, ChainError> {
        self.fed += input.len() as u64;
        let Some(engine) = self.engine.as_mut() else {
            self.produced += input.len() as u64;
            return Ok(input.to_vec());
        };

        self.pending.extend_from_slice(input);
        let mut out = Vec::new();
        let mut consumed = 0;
        loop {
            let need = engine.input_frames_next();
            if self.pending.len() - consumed < need {
                break;
            }
            let input = [&self.pending[consumed..consumed + need]];
            let block = engine.process(&input[..], None)?;
            consumed += need;
            accept(&mut self.skip, &mut self.produced, &block[0], &mut out);
        }
        self.pending.drain(..consumed);
        Ok(out)
    }

    /// Drain buffered input and the resampler's delay line.
    pub fn flush(&mut self) -> Result<Vec<f32>, ChainError> {
        let expected = self.expected_len();
        let Some(engine) = self.engine.as_mut() else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        if !self.pending.is_empty() {
            let tail = [&self.pending[..]];
            let block = engine.process_partial(Some(&tail[..]), None)?;
            accept(&mut self.skip, &mut self.produced, &block[0], &mut out);
            self.pending.clear();
        }

        let mut calls = 0;
        while self.produced < expected && calls < MAX_DRAIN_CALLS {
            let block = engine.process_partial(None::<&[Vec<f32>]>, None)?;
            accept(&mut self.skip, &mut self.produced, &block[0], &mut out);
            calls += 1;
        }

        if self.produced > expected {
            let excess = (self.produced - expected) as usize;
            out.truncate(out.len().saturating_sub(excess));
            self.produced = expected;
        }
        Ok(out)
    }
}

/// Append `block` to `out`, first discarding whatever delay is left.
fn accept(skip: &mut usize, produced: &mut u64, block: &[f32], out: &mut Vec<f32>) {
    let dropped = (*skip).min(block.len());
    *skip -= dropped;
    let kept = &block[dropped..];
    *produced += kept.len() as u64;
    out.extend_from_slice(kept);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(rate: u32, freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin() * 0.5)
            .collect()
    }

    fn run(from: u32, to: u32, input: &[f32], piece: usize) -> Vec<f32> {
        let mut rs = StreamResampler::new(from, to).expect("resampler");
        let mut out = Vec::new();
        for chunk in input.chunks(piece) {
            out.extend(rs.push(chunk).expect("push"));
        }
        out.extend(rs.flush().expect("flush"));
        out
    }

    #[test]
    fn test_same_rate_is_bypass() {
        let mut rs = StreamResampler::new(48_000, 48_000).expect("resampler");
        assert!(rs.is_bypass());
        assert_eq!(rs.push(&[0.1, 0.2]).expect("push"), vec![0.1, 0.2]);
        assert!(rs.flush().expect("flush").is_empty());
    }

    #[test]
    fn test_output_length_is_exact() {
        let input = sine(16_000, 440.0, 16_000);
        assert_eq!(run(16_000, 48_000, &input, 700).len(), 48_000);
        let input = sine(44_100, 440.0, 10_000);
        assert_eq!(run(44_100, 48_000, &input, 4_096).len(), 10_884);
        let input = sine(48_000, 440.0, 3_333);
        assert_eq!(run(48_000, 22_050, &input, 333).len(), 1_531);
    }

    #[test]
    fn test_short_input_still_produces_output() {
        let input = sine(24_000, 300.0, 100);
        assert_eq!(run(24_000, 48_000, &input, 100).len(), 200);
    }

    #[test]
    fn test_delay_is_compensated() {
        // A click at a known position should come out at the scaled position.
        let mut input = vec![0.0_f32; 8_000];
        input[4_000] = 1.0;
        let out = run(16_000, 48_000, &input, 1_000);
        let peak = out
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(i, _)| i)
            .expect("peak");
        assert!((peak as i64 - 12_000).abs() <= 4, "peak at {peak}");
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(matches!(
            StreamResampler::new(0, 48_000),
            Err(ChainError::ZeroSampleRate)
        ));
    }
}
