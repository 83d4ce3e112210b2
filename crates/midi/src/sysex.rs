//! SysEx constant tables and helpers.
//!
//! Shared by the synth adapters (which intercept display/reset messages
//! before their engines see them) and the orchestrator (custom control
//! messages under the educational manufacturer ID).

/// Manufacturer IDs.
pub mod manufacturer {
    /// Roland Corporation.
    pub const ROLAND: u8 = 0x41;
    /// Yamaha Corporation.
    pub const YAMAHA: u8 = 0x43;
    /// Universal Non-Real-Time.
    pub const UNIVERSAL_NON_REALTIME: u8 = 0x7E;
    /// Universal Real-Time.
    pub const UNIVERSAL_REALTIME: u8 = 0x7F;
    /// Educational / non-commercial; carries the custom control commands.
    pub const EDUCATIONAL: u8 = 0x7D;
}

/// Device IDs.
pub mod device {
    /// Default device ID of Roland Sound Canvas modules.
    pub const SOUND_CANVAS_DEFAULT: u8 = 0x10;
    /// "All call" broadcast.
    pub const ALL_CALL: u8 = 0x7F;
}

/// Universal Non-Real-Time sub-IDs.
pub mod universal {
    /// General MIDI message class.
    pub const GENERAL_MIDI: u8 = 0x09;
    /// GM System On.
    pub const GM_ON: u8 = 0x01;
    /// GM System Off.
    pub const GM_OFF: u8 = 0x02;
}

/// Roland model and address constants.
pub mod roland {
    /// GS sound modules.
    pub const MODEL_GS: u8 = 0x42;
    /// SC-55 display messages.
    pub const MODEL_SC55: u8 = 0x45;

    /// Data set (DT1) command.
    pub const COMMAND_DT1: u8 = 0x12;
    /// Data request (RQ1) command.
    pub const COMMAND_RQ1: u8 = 0x11;

    /// System Mode Set address (high/mid bytes).
    pub const ADDRESS_SYSTEM_MODE_SET: u32 = 0x00_007F;
    /// GS Reset address (high/mid bytes).
    pub const ADDRESS_GS_RESET: u32 = 0x40_007F;
    /// "Use for Rhythm Part" patch-part address.
    pub const ADDRESS_USE_FOR_RHYTHM_PART: u32 = 0x40_1015;
    /// SC-55 display text address (high/mid bytes).
    pub const ADDRESS_SC55_DISPLAY_TEXT: u32 = 0x10_0000;
    /// SC-55 display dots address (high/mid bytes).
    pub const ADDRESS_SC55_DISPLAY_DOTS: u32 = 0x10_0100;

    /// Mask selecting the patch-part address class (channel nibble wild).
    pub const ADDRESS_MASK_PATCH_PART: u32 = 0xFF_F0FF;
}

/// Yamaha model and address constants.
pub mod yamaha {
    /// XG sound modules.
    pub const MODEL_XG: u8 = 0x4C;

    /// XG System On address (high/mid bytes).
    pub const ADDRESS_XG_SYSTEM_ON: u32 = 0x00_007E;
    /// Display Letter address (high/mid bytes).
    pub const ADDRESS_DISPLAY_LETTER: u32 = 0x06_0000;
    /// Display Bitmap address (high/mid bytes).
    pub const ADDRESS_DISPLAY_BITMAP: u32 = 0x07_0000;
}

/// Roland checksum over an address + data span: the two's complement of the
/// 7-bit byte sum, such that `(sum + checksum) & 0x7F == 0`.
pub fn roland_checksum(bytes: &[u8]) -> u8 {
    let sum: u32 = bytes.iter().map(|&b| u32::from(b)).sum();
    ((128 - (sum % 128)) % 128) as u8
}
