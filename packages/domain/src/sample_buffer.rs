//! Typed sample storage shared by frames of every format.
//
//  • One `Vec` per plane; interleaved data is a single plane.
//  • `PcmScalar` is implemented via a macro for every scalar type we carry;
//    it maps a scalar type onto its `SampleBuffer` variant and provides the
//    `f32` conversions the DSP stages work in.

use crate::frame_error::FrameError;
use crate::sample_format::SampleKind;

/* ─────────────────────────────── BUFFER ────────────────────────────── */

/// Sample planes of one frame, tagged by numeric kind.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleBuffer {
    U8(Vec<Vec<u8>>),
    S16(Vec<Vec<i16>>),
    S32(Vec<Vec<i32>>),
    F32(Vec<Vec<f32>>),
    F64(Vec<Vec<f64>>),
}

impl SampleBuffer {
    /// Numeric kind stored in this buffer.
    pub fn kind(&self) -> SampleKind {
        match self {
            Self::U8(_) => SampleKind::U8,
            Self::S16(_) => SampleKind::S16,
            Self::S32(_) => SampleKind::S32,
            Self::F32(_) => SampleKind::F32,
            Self::F64(_) => SampleKind::F64,
        }
    }

    /// `planes` planes of `len` silent scalars.
    pub fn silence(kind: SampleKind, planes: usize, len: usize) -> Self {
        match kind {
            SampleKind::U8 => Self::U8(vec![vec![u8::SILENCE; len]; planes]),
            SampleKind::S16 => Self::S16(vec![vec![i16::SILENCE; len]; planes]),
            SampleKind::S32 => Self::S32(vec![vec![i32::SILENCE; len]; planes]),
            SampleKind::F32 => Self::F32(vec![vec![f32::SILENCE; len]; planes]),
            SampleKind::F64 => Self::F64(vec![vec![f64::SILENCE; len]; planes]),
        }
    }

    pub fn plane_count(&self) -> usize {
        match self {
            Self::U8(p) => p.len(),
            Self::S16(p) => p.len(),
            Self::S32(p) => p.len(),
            Self::F32(p) => p.len(),
            Self::F64(p) => p.len(),
        }
    }

    /// Length of every plane, or `None` if the planes disagree.
    pub fn plane_len(&self) -> Option<usize> {
        fn uniform<T>(planes: &[Vec<T>]) -> Option<usize> {
            let first = planes.first().map_or(0, Vec::len);
            planes.iter().all(|p| p.len() == first).then_some(first)
        }
        match self {
            Self::U8(p) => uniform(p),
            Self::S16(p) => uniform(p),
            Self::S32(p) => uniform(p),
            Self::F32(p) => uniform(p),
            Self::F64(p) => uniform(p),
        }
    }

    /// Convert planar `f32` channels (`channels[c][i]`) into `kind`, either
    /// keeping one plane per channel or interleaving into a single plane.
    pub fn from_planar_f32(
        kind: SampleKind,
        planar: bool,
        channels: &[Vec<f32>],
    ) -> Result<Self, FrameError> {
        Ok(match kind {
            SampleKind::U8 => Self::U8(convert_planes(planar, channels)?),
            SampleKind::S16 => Self::S16(convert_planes(planar, channels)?),
            SampleKind::S32 => Self::S32(convert_planes(planar, channels)?),
            SampleKind::F32 => Self::F32(convert_planes(planar, channels)?),
            SampleKind::F64 => Self::F64(convert_planes(planar, channels)?),
        })
    }

    /// De-interleave (if needed) and convert every channel to `f32`.
    pub fn to_planar_f32(&self, planar: bool, channels: usize) -> Vec<Vec<f32>> {
        match self {
            Self::U8(p) => collect_planes(planar, channels, p),
            Self::S16(p) => collect_planes(planar, channels, p),
            Self::S32(p) => collect_planes(planar, channels, p),
            Self::F32(p) => collect_planes(planar, channels, p),
            Self::F64(p) => collect_planes(planar, channels, p),
        }
    }
}

fn convert_planes<T: PcmScalar>(
    planar: bool,
    channels: &[Vec<f32>],
) -> Result<Vec<Vec<T>>, FrameError> {
    let len = channels.first().map_or(0, Vec::len);
    if channels.iter().any(|c| c.len() != len) {
        return Err(FrameError::PlaneLength {
            expected: len,
            found: channels.iter().map(Vec::len).find(|&l| l != len).unwrap_or(len),
        });
    }

    if planar {
        let mut planes = Vec::new();
        planes
            .try_reserve_exact(channels.len())
            .map_err(|_| FrameError::Allocation)?;
        for channel in channels {
            let mut plane = Vec::new();
            plane.try_reserve_exact(len).map_err(|_| FrameError::Allocation)?;
            plane.extend(channel.iter().map(|&v| T::from_f32(v)));
            planes.push(plane);
        }
        Ok(planes)
    } else {
        let mut plane = Vec::new();
        plane
            .try_reserve_exact(len * channels.len())
            .map_err(|_| FrameError::Allocation)?;
        for i in 0..len {
            plane.extend(channels.iter().map(|c| T::from_f32(c[i])));
        }
        Ok(vec![plane])
    }
}

fn collect_planes<T: PcmScalar>(planar: bool, channels: usize, planes: &[Vec<T>]) -> Vec<Vec<f32>> {
    if planar {
        return planes
            .iter()
            .map(|p| p.iter().map(|&v| v.to_f32()).collect())
            .collect();
    }
    let Some(plane) = planes.first() else {
        return vec![Vec::new(); channels];
    };
    let channels = channels.max(1);
    let mut out = vec![Vec::with_capacity(plane.len() / channels); channels];
    for sample in plane.chunks_exact(channels) {
        for (c, &v) in sample.iter().enumerate() {
            out[c].push(v.to_f32());
        }
    }
    out
}

/* ──────────────────────────── TRAIT CORE ───────────────────────────── */

/// A scalar type that can live in a [`SampleBuffer`].
///
/// Conversions to and from `f32` use the nominal `[-1.0, 1.0]` range and
/// saturate instead of wrapping.
pub trait PcmScalar: Copy + PartialOrd + Send + Sync + 'static {
    /// Value that encodes silence.
    const SILENCE: Self;
    /// Convert from a nominal `[-1.0, 1.0]` float.
    fn from_f32(v: f32) -> Self;
    /// Convert to a nominal `[-1.0, 1.0]` float.
    fn to_f32(self) -> f32;
    /// Borrow the planes if `buf` holds this scalar type.
    fn planes(buf: &SampleBuffer) -> Option<&[Vec<Self>]>;
    /// Mutably borrow the planes if `buf` holds this scalar type.
    fn planes_mut(buf: &mut SampleBuffer) -> Option<&mut [Vec<Self>]>;
}

/* ───────────────────── blanket impl via macro ──────────────────────── */

macro_rules! with_pcm_scalar {
    ($ty:ty, $variant:ident, $silence:expr, $from_f32:expr, $to_f32:expr) => {
        impl PcmScalar for $ty {
            const SILENCE: Self = $silence;
            #[inline]
            fn from_f32(v: f32) -> Self {
                $from_f32(v)
            }
            #[inline]
            fn to_f32(self) -> f32 {
                $to_f32(self)
            }
            #[inline]
            fn planes(buf: &SampleBuffer) -> Option<&[Vec<Self>]> {
                match buf {
                    SampleBuffer::$variant(p) => Some(p),
                    _ => None,
                }
            }
            #[inline]
            fn planes_mut(buf: &mut SampleBuffer) -> Option<&mut [Vec<Self>]> {
                match buf {
                    SampleBuffer::$variant(p) => Some(p),
                    _ => None,
                }
            }
        }
    };
}

/* u8, silence at the midpoint */
with_pcm_scalar!(
    u8,
    U8,
    128,
    |v: f32| (v * 128.0 + 128.0).round().clamp(0.0, 255.0) as u8,
    |v: u8| (f32::from(v) - 128.0) / 128.0
);
/* i16 */
with_pcm_scalar!(
    i16,
    S16,
    0,
    |v: f32| (v * 32_768.0).round().clamp(-32_768.0, 32_767.0) as i16,
    |v: i16| f32::from(v) / 32_768.0
);
/* i32, widened through f64 to keep the low bits */
with_pcm_scalar!(
    i32,
    S32,
    0,
    |v: f32| (f64::from(v) * 2_147_483_648.0)
        .round()
        .clamp(-2_147_483_648.0, 2_147_483_647.0) as i32,
    |v: i32| (f64::from(v) / 2_147_483_648.0) as f32
);
/* f32 */
with_pcm_scalar!(f32, F32, 0.0, |v: f32| v, |v: f32| v);
/* f64 */
with_pcm_scalar!(f64, F64, 0.0, |v: f32| f64::from(v), |v: f64| v as f32);
