//! Typed startup configuration.
//!
//! The INI file on the SD card is parsed once at boot by the configuration
//! front-end (outside this crate); everything downstream consumes this
//! typed snapshot. Unknown keys are logged and ignored by the parser, so
//! every field here has a shipping default.

use heapless::String;

use crate::types::{RomSet, SynthKind};

/// The product name, as shown on displays and in session handshakes.
pub const APP_NAME: &str = "Soul Synth";

/// Application version (synchronized with Cargo.toml).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Audio output routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AudioOutputDevice {
    /// On-board PWM.
    Pwm,
    /// HDMI embedded audio.
    Hdmi,
    /// External I²S DAC.
    I2s,
}

/// LA-engine sample-rate converter quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResamplerQuality {
    /// Bypass the converter.
    None,
    /// Lowest CPU cost.
    Fastest,
    /// Low CPU cost.
    Fast,
    /// Balanced (default).
    Good,
    /// Highest quality.
    Best,
}

/// LA-engine MIDI channel assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MidiChannelMap {
    /// Parts on channels 1–8, rhythm on 10.
    Standard,
    /// Parts on channels 1–8 shifted, rhythm on 10.
    Alternate,
}

/// Character vs. graphical display selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LcdType {
    /// No display fitted.
    None,
    /// HD44780 on 4-bit GPIO.
    Hd44780FourBit,
    /// HD44780 behind an I²C backpack.
    Hd44780I2c,
    /// SH1106 OLED on I²C.
    Sh1106I2c,
    /// SSD1306 OLED on I²C.
    Ssd1306I2c,
}

/// Physical control scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlScheme {
    /// No controls fitted.
    None,
    /// Four push buttons.
    SimpleButtons,
    /// Rotary encoder plus two buttons.
    SimpleEncoder,
}

/// Rotary encoder detent behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncoderType {
    /// One event per quadrature cycle.
    Full,
    /// Two events per cycle.
    Half,
    /// Four events per cycle.
    Quarter,
}

/// Network attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetworkMode {
    /// Networking disabled.
    Off,
    /// Wired Ethernet.
    Ethernet,
    /// Wi-Fi station.
    WiFi,
}

/// `[system]` section.
#[derive(Debug, Clone)]
pub struct SystemConfig {
    /// Engine activated at boot.
    pub default_synth: SynthKind,
    /// Gate transient-I/O warnings and startup banners.
    pub verbose: bool,
    /// Idle seconds before power saving; 0 disables.
    pub power_save_timeout_secs: u16,
    /// Enable the USB host stack.
    pub usb: bool,
}

/// `[audio]` section.
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Output route.
    pub output_device: AudioOutputDevice,
    /// Render sample rate in Hz.
    pub sample_rate: u32,
    /// Frames per render chunk (also the device queue size).
    pub chunk_size: usize,
    /// Swap left/right during conversion.
    pub reversed_stereo: bool,
}

/// `[midi]` section.
#[derive(Debug, Clone)]
pub struct MidiConfig {
    /// GPIO UART baud rate (31250 for DIN MIDI).
    pub gpio_baud: u32,
    /// Echo received UART bytes back out (software thru).
    pub gpio_thru: bool,
    /// USB serial baud rate.
    pub usb_serial_baud: u32,
}

/// `[mt32]` section (LA engine).
#[derive(Debug, Clone)]
pub struct Mt32Config {
    /// Preferred ROM set at startup.
    pub rom_set: RomSet,
    /// Sample-rate converter quality.
    pub resampler_quality: ResamplerQuality,
    /// Channel assignment sent after init.
    pub midi_channels: MidiChannelMap,
    /// Output gain.
    pub gain: f32,
    /// Reverb output gain.
    pub reverb_gain: f32,
    /// Swap the LA engine's stereo image.
    pub reversed_stereo: bool,
}

/// `[soundfont]` section.
#[derive(Debug, Clone)]
pub struct SoundFontConfig {
    /// Index into the sorted SoundFont list at startup.
    pub initial_index: usize,
    /// Voice limit.
    pub polyphony: u16,
    /// Gain used when a font's profile does not override it.
    pub default_gain: f32,
    /// Reverb enable default.
    pub reverb: bool,
    /// Reverb damping default.
    pub reverb_damping: f32,
    /// Reverb level default.
    pub reverb_level: f32,
    /// Reverb room size default.
    pub reverb_room_size: f32,
    /// Reverb width default.
    pub reverb_width: f32,
    /// Chorus enable default.
    pub chorus: bool,
    /// Chorus depth default.
    pub chorus_depth: f32,
    /// Chorus level default.
    pub chorus_level: f32,
    /// Chorus voice count default.
    pub chorus_voices: i32,
    /// Chorus speed default.
    pub chorus_speed: f32,
}

/// `[lcd]` section.
#[derive(Debug, Clone)]
pub struct LcdConfig {
    /// Fitted display type.
    pub kind: LcdType,
    /// Width in native units.
    pub width: u8,
    /// Height in native units.
    pub height: u8,
    /// Rotate the panel 180°.
    pub rotation: bool,
    /// Mirror the panel horizontally.
    pub mirror: bool,
    /// I²C address for backpack/OLED variants.
    pub i2c_address: u8,
}

/// `[control]` section.
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// Fitted control scheme.
    pub scheme: ControlScheme,
    /// Encoder detent behaviour.
    pub encoder_type: EncoderType,
    /// Reverse encoder direction.
    pub encoder_reversed: bool,
    /// Seconds a deferred SoundFont selection rests before loading.
    pub switch_timeout_secs: u16,
    /// Enable the MiSTer I²C mirror.
    pub mister: bool,
}

/// `[network]` section.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Attachment mode.
    pub mode: NetworkMode,
    /// Use DHCP; otherwise the static parameters below apply.
    pub dhcp: bool,
    /// Static IP address.
    pub ip_address: [u8; 4],
    /// Static subnet mask.
    pub subnet_mask: [u8; 4],
    /// Static default gateway.
    pub gateway: [u8; 4],
    /// Static DNS server.
    pub dns_server: [u8; 4],
    /// Hostname announced via DHCP.
    pub hostname: String<32>,
    /// Accept RTP-MIDI sessions on 5004/5005.
    pub rtp_midi: bool,
    /// Accept raw MIDI datagrams on 1999.
    pub udp_midi: bool,
    /// Enable the FTP file service.
    pub ftp: bool,
    /// FTP credentials.
    pub ftp_username: String<32>,
    /// FTP credentials.
    pub ftp_password: String<32>,
}

/// Complete startup configuration snapshot.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// `[system]`.
    pub system: SystemConfig,
    /// `[audio]`.
    pub audio: AudioConfig,
    /// `[midi]`.
    pub midi: MidiConfig,
    /// `[mt32]`.
    pub mt32: Mt32Config,
    /// `[soundfont]`.
    pub soundfont: SoundFontConfig,
    /// `[lcd]`.
    pub lcd: LcdConfig,
    /// `[control]`.
    pub control: ControlConfig,
    /// `[network]`.
    pub network: NetworkConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            default_synth: SynthKind::Mt32,
            verbose: false,
            power_save_timeout_secs: 300,
            usb: true,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            output_device: AudioOutputDevice::Pwm,
            sample_rate: 48_000,
            chunk_size: 256,
            reversed_stereo: false,
        }
    }
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            gpio_baud: 31_250,
            gpio_thru: false,
            usb_serial_baud: 38_400,
        }
    }
}

impl Default for Mt32Config {
    fn default() -> Self {
        Self {
            rom_set: RomSet::Any,
            resampler_quality: ResamplerQuality::Good,
            midi_channels: MidiChannelMap::Standard,
            gain: 1.0,
            reverb_gain: 1.0,
            reversed_stereo: false,
        }
    }
}

impl Default for SoundFontConfig {
    fn default() -> Self {
        Self {
            initial_index: 0,
            polyphony: 200,
            default_gain: 0.2,
            reverb: true,
            reverb_damping: 0.0,
            reverb_level: 0.9,
            reverb_room_size: 0.2,
            reverb_width: 0.5,
            chorus: true,
            chorus_depth: 8.0,
            chorus_level: 2.0,
            chorus_voices: 3,
            chorus_speed: 0.3,
        }
    }
}

impl Default for LcdConfig {
    fn default() -> Self {
        Self {
            kind: LcdType::None,
            width: 20,
            height: 2,
            rotation: false,
            mirror: false,
            i2c_address: 0x3C,
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            scheme: ControlScheme::None,
            encoder_type: EncoderType::Full,
            encoder_reversed: false,
            switch_timeout_secs: 1,
            mister: false,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mode: NetworkMode::Off,
            dhcp: true,
            ip_address: [0; 4],
            subnet_mask: [0; 4],
            gateway: [0; 4],
            dns_server: [0; 4],
            hostname: String::new(),
            rtp_midi: true,
            udp_midi: true,
            ftp: false,
            ftp_username: String::new(),
            ftp_password: String::new(),
        }
    }
}
