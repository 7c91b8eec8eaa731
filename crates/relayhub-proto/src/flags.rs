//! Frame flags bitfield.

/// Per-frame processing flags.
///
/// Only [`FrameFlags::VOLATILE`] is defined. Unknown bits are preserved so a
/// newer peer's flags survive a relay hop untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameFlags(u8);

impl FrameFlags {
    /// Frame may be dropped instead of queued under backpressure.
    pub const VOLATILE: Self = Self(0b0000_0001);

    /// No flags set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build from the raw header byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// Raw header byte.
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        self.0
    }

    /// All bits of `other` are set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of both flag sets.
    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volatile_bit_round_trips_through_byte() {
        let flags = FrameFlags::empty().with(FrameFlags::VOLATILE);
        assert!(FrameFlags::from_byte(flags.to_byte()).contains(FrameFlags::VOLATILE));
        assert!(!FrameFlags::empty().contains(FrameFlags::VOLATILE));
    }

    #[test]
    fn unknown_bits_are_preserved() {
        let flags = FrameFlags::from_byte(0b1000_0000).with(FrameFlags::VOLATILE);
        assert_eq!(flags.to_byte(), 0b1000_0001);
    }
}
