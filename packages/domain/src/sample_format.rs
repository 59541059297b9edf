//! Sample representations accepted by the mixing path.
//
//  • Five numeric kinds, each available interleaved or planar (ten formats).
//  • The kind decides the accumulator and saturation range used when mixing;
//    the layout decides how channels are addressed inside a frame.

use std::fmt;

/* ─────────────────────────────── ENUMS ─────────────────────────────── */

/// Numeric kind of a single scalar sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleKind {
    /// 8-bit unsigned integer, silence at 128.
    U8,
    /// 16-bit signed integer.
    S16,
    /// 32-bit signed integer.
    S32,
    /// 32-bit float, nominal range `[-1.0, 1.0]`.
    F32,
    /// 64-bit float, nominal range `[-1.0, 1.0]`.
    F64,
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::U8 => "u8",
            Self::S16 => "s16",
            Self::S32 => "s32",
            Self::F32 => "f32",
            Self::F64 => "f64",
        })
    }
}

/// PCM sample encoding: numeric kind plus memory layout.
///
/// Interleaved formats store every channel of a sample next to each other in
/// a single plane; the `…P` formats keep one contiguous plane per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    U8,
    U8P,
    S16,
    S16P,
    S32,
    S32P,
    F32,
    F32P,
    F64,
    F64P,
}

impl SampleFormat {
    /// Every supported format, interleaved before planar for each kind.
    pub const ALL: [SampleFormat; 10] = [
        Self::U8,
        Self::U8P,
        Self::S16,
        Self::S16P,
        Self::S32,
        Self::S32P,
        Self::F32,
        Self::F32P,
        Self::F64,
        Self::F64P,
    ];

    /// Numeric kind of the format.
    #[inline]
    pub const fn kind(self) -> SampleKind {
        match self {
            Self::U8 | Self::U8P => SampleKind::U8,
            Self::S16 | Self::S16P => SampleKind::S16,
            Self::S32 | Self::S32P => SampleKind::S32,
            Self::F32 | Self::F32P => SampleKind::F32,
            Self::F64 | Self::F64P => SampleKind::F64,
        }
    }

    /// `true` when every channel lives in its own plane.
    #[inline]
    pub const fn is_planar(self) -> bool {
        matches!(
            self,
            Self::U8P | Self::S16P | Self::S32P | Self::F32P | Self::F64P
        )
    }

    /// Number of planes a frame with `channels` channels uses.
    #[inline]
    pub const fn plane_count(self, channels: usize) -> usize {
        if self.is_planar() { channels } else { 1 }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_planar() {
            write!(f, "{}p", self.kind())
        } else {
            write!(f, "{}", self.kind())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_both_layouts() {
        for kind in [
            SampleKind::U8,
            SampleKind::S16,
            SampleKind::S32,
            SampleKind::F32,
            SampleKind::F64,
        ] {
            let layouts: Vec<bool> = SampleFormat::ALL
                .iter()
                .filter(|f| f.kind() == kind)
                .map(|f| f.is_planar())
                .collect();
            assert_eq!(layouts, vec![false, true]);
        }
    }

    #[test]
    fn test_layout_helpers() {
        assert_eq!(SampleFormat::S32P.plane_count(6), 6);
        assert_eq!(SampleFormat::S32.plane_count(6), 1);
        assert_eq!(SampleFormat::F64P.kind(), SampleKind::F64);
        assert_eq!(SampleFormat::U8P.to_string(), "u8p");
    }
}
