//! Opening and decoding a synthesized audio resource with symphonia.

use std::borrow::Cow;
use std::io::Cursor;
use std::time::Duration;

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{CODEC_TYPE_NULL, Decoder, DecoderOptions};
use symphonia::core::conv::FromSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use thiserror::Error;
use voiceover_backend::SynthesizedAudio;
use voiceover_domain::{AudioFrame, FrameError, SampleFormat, StreamFormat, TimeBase};

use crate::chain::ChainError;

#[derive(Error, Debug)]
pub enum DecodeError {
    /// The bytes could not be probed as any known container.
    #[error("cannot open synthesized audio: {0}")]
    Open(#[source] SymphoniaError),

    #[error("no decodable audio track")]
    NoTrack,

    #[error("audio track has no sample rate")]
    UnknownSampleRate,

    #[error("audio track has no channel layout")]
    UnknownChannels,

    #[error("decoding failed: {0}")]
    Symphonia(#[from] SymphoniaError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Decoded utterance audio, one frame at a time.
pub trait FrameSource {
    /// Rate and layout of every frame returned by [`next_frame`](Self::next_frame).
    fn stream_format(&self) -> StreamFormat;

    /// Time base of frame timestamps.
    fn time_base(&self) -> TimeBase;

    /// Natural duration, zero when unknown.
    fn duration(&self) -> Duration;

    /// `Ok(None)` marks the end of the stream.
    fn next_frame(&mut self) -> Result<Option<AudioFrame>, DecodeError>;

    /// Samples per channel returned so far.
    fn decoded_samples(&self) -> u64;
}

/// An opened synthesized utterance, decoded packet by packet.
pub struct RemoteAudio {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    format: StreamFormat,
    time_base: TimeBase,
    n_frames: Option<u64>,
    decoded: u64,
}

impl RemoteAudio {
    /// Probe `audio` and prepare a decoder for its first audio track.
    pub fn open(audio: SynthesizedAudio) -> Result<Self, DecodeError> {
        let mut hint = Hint::new();
        if let Some(ext) = audio.extension_hint() {
            hint.with_extension(ext);
        }

        let mss = MediaSourceStream::new(Box::new(Cursor::new(audio.bytes)), Default::default());
        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(DecodeError::Open)?;
        let reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoTrack)?;
        let params = track.codec_params.clone();
        let track_id = track.id;

        let sample_rate = params
            .sample_rate
            .filter(|&sr| sr > 0)
            .ok_or(DecodeError::UnknownSampleRate)?;
        let channels = params
            .channels
            .map(|c| c.count())
            .filter(|&c| c > 0)
            .ok_or(DecodeError::UnknownChannels)?;
        let time_base = params
            .time_base
            .and_then(|tb| TimeBase::new(tb.numer, tb.denom))
            .or_else(|| TimeBase::from_sample_rate(sample_rate))
            .ok_or(DecodeError::UnknownSampleRate)?;

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(DecodeError::Open)?;

        Ok(Self {
            reader,
            decoder,
            track_id,
            format: StreamFormat::new(sample_rate, channels, SampleFormat::F32P),
            time_base,
            n_frames: params.n_frames,
            decoded: 0,
        })
    }
}

impl FrameSource for RemoteAudio {
    /// Decoded frames are planar `f32` at the track's native rate and layout.
    fn stream_format(&self) -> StreamFormat {
        self.format
    }

    /// Time base of decoded frame timestamps.
    fn time_base(&self) -> TimeBase {
        self.time_base
    }

    /// Natural duration reported by the container, zero when unknown.
    fn duration(&self) -> Duration {
        match self.n_frames {
            Some(n) => Duration::from_secs_f64(n as f64 / f64::from(self.format.sample_rate)),
            None => Duration::ZERO,
        }
    }

    /// Decode the next packet of the selected track.
    ///
    /// `Ok(None)` marks the end of the stream.
    fn next_frame(&mut self) -> Result<Option<AudioFrame>, DecodeError> {
        loop {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            if packet.track_id() != self.track_id {
                continue;
            }

            let planes = match self.decoder.decode(&packet)? {
                AudioBufferRef::U8(buf) => planar_f32(buf),
                AudioBufferRef::U16(buf) => planar_f32(buf),
                AudioBufferRef::U24(buf) => planar_f32(buf),
                AudioBufferRef::U32(buf) => planar_f32(buf),
                AudioBufferRef::S8(buf) => planar_f32(buf),
                AudioBufferRef::S16(buf) => planar_f32(buf),
                AudioBufferRef::S24(buf) => planar_f32(buf),
                AudioBufferRef::S32(buf) => planar_f32(buf),
                AudioBufferRef::F32(buf) => planar_f32(buf),
                AudioBufferRef::F64(buf) => planar_f32(buf),
            };
            let frames = planes.first().map_or(0, Vec::len);
            if frames == 0 {
                continue;
            }

            let pts = i64::try_from(packet.ts()).ok();
            self.decoded += frames as u64;
            let frame = AudioFrame::from_planar_f32(self.format, self.time_base, pts, &planes)?;
            return Ok(Some(frame));
        }
    }

    /// Samples per channel decoded so far.
    fn decoded_samples(&self) -> u64 {
        self.decoded
    }
}

fn planar_f32<T>(buf: Cow<'_, AudioBuffer<T>>) -> Vec<Vec<f32>>
where
    T: Sample,
    f32: FromSample<T>,
{
    (0..buf.spec().channels.count())
        .map(|c| buf.chan(c).iter().map(|&v| f32::from_sample(v)).collect())
        .collect()
}
