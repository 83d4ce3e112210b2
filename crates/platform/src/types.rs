//! Shared domain enums.
//!
//! These sit in the platform crate because the event queue, the synth
//! adapters, the MiSTer mirror, and the orchestrator all exchange them.
//! Each enum keeps its user-visible string table next to the variant set so
//! the compiler enforces that they stay in sync (an exhaustive `match`, no
//! separate table to forget).

/// The four synthesizer engines. Exactly one is active at a time; the set is
/// fixed at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SynthKind {
    /// Roland LA synthesis (MT-32 / CM series emulation).
    Mt32,
    /// SoundFont-driven General MIDI engine.
    SoundFont,
    /// OPL3 FM engine.
    FmOpl,
    /// OPN2 FM engine.
    FmOpn,
}

impl SynthKind {
    /// Mode string shown on the display when this synth activates.
    pub const fn mode_name(self) -> &'static str {
        match self {
            SynthKind::Mt32 => "MT-32 mode",
            SynthKind::SoundFont => "SoundFont mode",
            SynthKind::FmOpl => "OPL mode",
            SynthKind::FmOpn => "OPN mode",
        }
    }

    /// Decode the wire/config representation used by custom SysEx and the
    /// MiSTer status frame.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(SynthKind::Mt32),
            1 => Some(SynthKind::SoundFont),
            2 => Some(SynthKind::FmOpl),
            3 => Some(SynthKind::FmOpn),
            _ => None,
        }
    }

    /// Wire/config representation.
    pub const fn as_u8(self) -> u8 {
        match self {
            SynthKind::Mt32 => 0,
            SynthKind::SoundFont => 1,
            SynthKind::FmOpl => 2,
            SynthKind::FmOpn => 3,
        }
    }
}

/// LA control/PCM ROM image pairs.
///
/// `Any` resolves to the first present pair in preference order
/// (old MT-32 → new MT-32 → CM-32L); `All` is a predicate used only while
/// scanning ("stop early, we have everything").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RomSet {
    /// Old-generation MT-32 control ROM + MT-32 PCM.
    Mt32Old,
    /// New-generation MT-32 control ROM + MT-32 PCM.
    Mt32New,
    /// CM-32L control ROM + CM-32L PCM.
    CmL,
    /// First available set in preference order.
    Any,
    /// Every category present (scan predicate only).
    All,
}

impl RomSet {
    /// Decode the wire/config representation. Only the three concrete sets
    /// are addressable from the wire.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(RomSet::Mt32Old),
            1 => Some(RomSet::Mt32New),
            2 => Some(RomSet::CmL),
            _ => None,
        }
    }

    /// Wire/config representation of a concrete set; `Any`/`All` have none.
    pub const fn as_u8(self) -> u8 {
        match self {
            RomSet::Mt32Old => 0,
            RomSet::Mt32New => 1,
            RomSet::CmL => 2,
            RomSet::Any | RomSet::All => 0xFF,
        }
    }
}
