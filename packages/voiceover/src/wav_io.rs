//! Primary-stream I/O: WAV files in and out, one frame at a time.
//
//  Integer WAV maps onto packed sample formats by bit depth:
//    8 → U8 (offset binary)   16 → S16   24 → S32 (left-aligned)   32 → S32
//  and 32-bit float maps onto F32. Frames are timestamped in `1 / rate`.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use hound::{WavReader, WavSpec, WavWriter};
use tracing::debug;
use voiceover_domain::{
    AudioFrame, PcmScalar, SampleBuffer, SampleFormat, SampleKind, StreamFormat, TimeBase,
};

use crate::error::{DubError, Result};

/* ─────────────────────────────── format map ──────────────────────────── */

fn sample_format_for(spec: &WavSpec) -> Result<SampleFormat> {
    match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 8) => Ok(SampleFormat::U8),
        (hound::SampleFormat::Int, 16) => Ok(SampleFormat::S16),
        (hound::SampleFormat::Int, 24 | 32) => Ok(SampleFormat::S32),
        (hound::SampleFormat::Float, 32) => Ok(SampleFormat::F32),
        (kind, bits) => Err(DubError::Config(format!(
            "unsupported WAV encoding: {bits}-bit {kind:?}"
        ))),
    }
}

/// WAV header matching a primary stream, for writing the mixed result.
pub fn spec_for(stream: StreamFormat) -> Result<WavSpec> {
    let (bits_per_sample, sample_format) = match stream.sample_format.kind() {
        SampleKind::U8 => (8, hound::SampleFormat::Int),
        SampleKind::S16 => (16, hound::SampleFormat::Int),
        SampleKind::S32 => (32, hound::SampleFormat::Int),
        SampleKind::F32 => (32, hound::SampleFormat::Float),
        SampleKind::F64 => {
            return Err(DubError::Config("WAV output cannot hold f64 samples".into()));
        }
    };
    let channels = u16::try_from(stream.channels).map_err(|_| {
        DubError::Config(format!(
            "{} channels do not fit a WAV header",
            stream.channels
        ))
    })?;
    Ok(WavSpec {
        channels,
        sample_rate: stream.sample_rate,
        bits_per_sample,
        sample_format,
    })
}

/* ──────────────────────────────── reader ─────────────────────────────── */

/// Reads a WAV file as a sequence of packed [`AudioFrame`]s.
pub struct WavFrameReader {
    reader: WavReader<BufReader<File>>,
    stream: StreamFormat,
    time_base: TimeBase,
    frame_size: usize,
    position: i64,
}

impl WavFrameReader {
    pub fn open(path: impl AsRef<Path>, frame_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let reader = WavReader::open(path)?;
        let spec = reader.spec();
        let stream = StreamFormat::new(
            spec.sample_rate,
            usize::from(spec.channels),
            sample_format_for(&spec)?,
        );
        stream
            .validate()
            .map_err(|e| DubError::Config(format!("{}: {e}", path.display())))?;
        let time_base = stream
            .natural_time_base()
            .ok_or_else(|| DubError::Config(format!("{}: zero sample rate", path.display())))?;
        if frame_size == 0 {
            return Err(DubError::Config("frame_size must be positive".into()));
        }
        debug!(
            path = %path.display(),
            rate = spec.sample_rate,
            channels = spec.channels,
            bits = spec.bits_per_sample,
            format = %stream.sample_format,
            "opened primary audio"
        );
        Ok(Self {
            reader,
            stream,
            time_base,
            frame_size,
            position: 0,
        })
    }

    pub fn spec(&self) -> WavSpec {
        self.reader.spec()
    }

    pub fn stream_format(&self) -> StreamFormat {
        self.stream
    }

    pub fn time_base(&self) -> TimeBase {
        self.time_base
    }

    /// Next frame of at most `frame_size` samples per channel, or `None` at
    /// the end of the file. A trailing partial sample is dropped.
    pub fn next_frame(&mut self) -> Result<Option<AudioFrame>> {
        let channels = self.stream.channels;
        let want = self.frame_size * channels;
        let spec = self.reader.spec();

        let data = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Float, _) => {
                SampleBuffer::F32(vec![self.read_whole::<f32>(want, channels)?])
            }
            (_, 8) => {
                let raw = self.read_whole::<i32>(want, channels)?;
                let offset = raw
                    .into_iter()
                    .map(|s| (s + 128).clamp(0, 255) as u8)
                    .collect();
                SampleBuffer::U8(vec![offset])
            }
            (_, 16) => {
                let raw = self.read_whole::<i32>(want, channels)?;
                SampleBuffer::S16(vec![raw.into_iter().map(|s| s as i16).collect()])
            }
            (_, 24) => {
                let raw = self.read_whole::<i32>(want, channels)?;
                SampleBuffer::S32(vec![raw.into_iter().map(|s| s << 8).collect()])
            }
            _ => SampleBuffer::S32(vec![self.read_whole::<i32>(want, channels)?]),
        };

        if data.plane_len().unwrap_or(0) == 0 {
            return Ok(None);
        }
        let frame = AudioFrame::new(self.stream, self.time_base, Some(self.position), data)?;
        self.position += frame.nb_samples() as i64;
        Ok(Some(frame))
    }

    /// Up to `want` scalars, truncated to whole multi-channel samples.
    fn read_whole<S: hound::Sample>(&mut self, want: usize, channels: usize) -> Result<Vec<S>> {
        let mut out = Vec::with_capacity(want);
        for sample in self.reader.samples::<S>().take(want) {
            out.push(sample?);
        }
        out.truncate(out.len() - out.len() % channels);
        Ok(out)
    }
}

/* ──────────────────────────────── writer ─────────────────────────────── */

/// Writes packed or planar frames to a WAV file.
pub struct WavFrameWriter {
    writer: WavWriter<BufWriter<File>>,
    spec: WavSpec,
    frames_written: u64,
}

impl WavFrameWriter {
    pub fn create(path: impl AsRef<Path>, spec: WavSpec) -> Result<Self> {
        let writer = WavWriter::create(path, spec)?;
        Ok(Self {
            writer,
            spec,
            frames_written: 0,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Append one frame. Frames whose scalar type differs from the file's
    /// encoding are converted through `f32`.
    pub fn write_frame(&mut self, frame: &AudioFrame) -> Result<()> {
        if usize::from(self.spec.channels) != frame.channels() {
            return Err(DubError::Config(format!(
                "frame has {} channels, output has {}",
                frame.channels(),
                self.spec.channels
            )));
        }
        match (self.spec.sample_format, self.spec.bits_per_sample) {
            (hound::SampleFormat::Float, _) => {
                for s in interleaved::<f32>(frame) {
                    self.writer.write_sample(s)?;
                }
            }
            (_, 8) => {
                for s in interleaved::<u8>(frame) {
                    self.writer.write_sample((i16::from(s) - 128) as i8)?;
                }
            }
            (_, 16) => {
                for s in interleaved::<i16>(frame) {
                    self.writer.write_sample(s)?;
                }
            }
            (_, 24) => {
                for s in interleaved::<i32>(frame) {
                    self.writer.write_sample(s >> 8)?;
                }
            }
            _ => {
                for s in interleaved::<i32>(frame) {
                    self.writer.write_sample(s)?;
                }
            }
        }
        self.frames_written += 1;
        Ok(())
    }

    /// Flush the header and close the file.
    pub fn finalize(self) -> Result<()> {
        self.writer.finalize()?;
        Ok(())
    }
}

/// Samples of `frame` in interleaved order as `T`.
fn interleaved<T: PcmScalar>(frame: &AudioFrame) -> Vec<T> {
    let channels = frame.channels();
    let n = frame.nb_samples();
    match frame.planes::<T>() {
        Some(planes) if !frame.format().is_planar() => planes[0].clone(),
        Some(planes) => (0..n)
            .flat_map(|i| planes.iter().map(move |p| p[i]))
            .collect(),
        None => {
            let planar = frame.to_planar_f32();
            (0..n)
                .flat_map(|i| planar.iter().take(channels).map(move |c| T::from_f32(c[i])))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_s16(path: &Path, channels: u16, samples: &[i16]) {
        let spec = WavSpec {
            channels,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut w = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            w.write_sample(s).unwrap();
        }
        w.finalize().unwrap();
    }

    #[test]
    fn test_reader_splits_into_frames_with_pts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.wav");
        let samples: Vec<i16> = (0..20).collect();
        write_s16(&path, 2, &samples);

        let mut reader = WavFrameReader::open(&path, 4).unwrap();
        assert_eq!(reader.stream_format(), StreamFormat::new(8_000, 2, SampleFormat::S16));
        assert_eq!(reader.time_base(), TimeBase::from_sample_rate(8_000).unwrap());

        let mut sizes = Vec::new();
        let mut pts = Vec::new();
        while let Some(frame) = reader.next_frame().unwrap() {
            sizes.push(frame.nb_samples());
            pts.push(frame.pts().unwrap());
        }
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(pts, vec![0, 4, 8]);
    }

    #[test]
    fn test_write_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let stream = StreamFormat::new(16_000, 1, SampleFormat::S16);
        let tb = stream.natural_time_base().unwrap();

        let mut writer = WavFrameWriter::create(&path, spec_for(stream).unwrap()).unwrap();
        let data = SampleBuffer::S16(vec![vec![1, -2, 3]]);
        let frame = AudioFrame::new(stream, tb, Some(0), data).unwrap();
        writer.write_frame(&frame).unwrap();
        assert_eq!(writer.frames_written(), 1);
        writer.finalize().unwrap();

        let mut reader = WavFrameReader::open(&path, 1024).unwrap();
        let back = reader.next_frame().unwrap().unwrap();
        assert_eq!(back.data(), &SampleBuffer::S16(vec![vec![1, -2, 3]]));
        assert!(reader.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_planar_frames_are_interleaved_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("planar.wav");
        let stream = StreamFormat::new(8_000, 2, SampleFormat::S16P);
        let tb = stream.natural_time_base().unwrap();
        let packed = StreamFormat::new(8_000, 2, SampleFormat::S16);

        let mut writer = WavFrameWriter::create(&path, spec_for(packed).unwrap()).unwrap();
        let frame = AudioFrame::new(
            stream,
            tb,
            Some(0),
            SampleBuffer::S16(vec![vec![1, 2], vec![10, 20]]),
        )
        .unwrap();
        writer.write_frame(&frame).unwrap();
        writer.finalize().unwrap();

        let mut reader = WavFrameReader::open(&path, 16).unwrap();
        let back = reader.next_frame().unwrap().unwrap();
        assert_eq!(back.data(), &SampleBuffer::S16(vec![vec![1, 10, 2, 20]]));
    }

    #[test]
    fn test_eight_bit_is_offset_binary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("u8.wav");
        let stream = StreamFormat::new(8_000, 1, SampleFormat::U8);
        let tb = stream.natural_time_base().unwrap();

        let mut writer = WavFrameWriter::create(&path, spec_for(stream).unwrap()).unwrap();
        let data = SampleBuffer::U8(vec![vec![0, 128, 255]]);
        let frame = AudioFrame::new(stream, tb, Some(0), data).unwrap();
        writer.write_frame(&frame).unwrap();
        writer.finalize().unwrap();

        let mut reader = WavFrameReader::open(&path, 8).unwrap();
        let back = reader.next_frame().unwrap().unwrap();
        assert_eq!(back.format(), SampleFormat::U8);
        assert_eq!(back.data(), &SampleBuffer::U8(vec![vec![0, 128, 255]]));
    }

    #[test]
    fn test_channel_mismatch_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.wav");
        let mono = StreamFormat::new(8_000, 1, SampleFormat::S16);
        let stereo = StreamFormat::new(8_000, 2, SampleFormat::S16);
        let mut writer = WavFrameWriter::create(&path, spec_for(stereo).unwrap()).unwrap();
        let frame = AudioFrame::silence(mono, TimeBase::MILLISECONDS, None, 4).unwrap();
        assert!(matches!(writer.write_frame(&frame), Err(DubError::Config(_))));
    }
}
