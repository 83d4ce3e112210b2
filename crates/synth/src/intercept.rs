//! SysEx messages handled before the engine sees them.
//!
//! Every adapter runs incoming SysEx through [`intercept_sysex`] first:
//! reset messages (GM On/Off, GS Reset, System Mode Set, XG System On)
//! reset the MIDI monitor but still reach the engine; SC-55 and Yamaha
//! display messages are routed to the UI and consumed. Roland messages are
//! checksum-verified before interpretation.

use midi::monitor::MidiMonitor;
use midi::sysex::{manufacturer, roland, roland_checksum, universal, yamaha};
use platform::clock::Micros;
use ui::message::{self, SysExDisplayKind, UiQueue};

/// Default percussion assignment: GM channel 10.
pub const DEFAULT_PERCUSSION_MASK: u16 = 1 << 9;

/// What to do with the message after interception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SysExDisposition {
    /// Fully handled here; do not forward to the engine.
    Consumed,
    /// Forward to the engine (possibly after monitor side effects).
    Forward,
}

/// Inspect one framed SysEx message (`F0 … F7`).
///
/// `percussion_mask` is supplied by adapters that track rhythm-part
/// assignments (the SoundFont engine); reset messages restore it to the GM
/// default, and Roland "Use for Rhythm Part" writes update it.
pub fn intercept_sysex(
    data: &[u8],
    monitor: &mut MidiMonitor,
    mut percussion_mask: Option<&mut u16>,
    ui: Option<&UiQueue>,
    now: Micros,
) -> SysExDisposition {
    if is_gm_mode_set(data) {
        reset_monitor(monitor, percussion_mask.as_deref_mut(), now);
        return SysExDisposition::Forward;
    }

    if let Some(disposition) = intercept_roland(data, monitor, percussion_mask.as_deref_mut(), ui, now)
    {
        return disposition;
    }

    if let Some(disposition) = intercept_yamaha(data, monitor, percussion_mask, ui, now) {
        return disposition;
    }

    SysExDisposition::Forward
}

fn reset_monitor(monitor: &mut MidiMonitor, percussion_mask: Option<&mut u16>, now: Micros) {
    monitor.all_notes_off(now);
    monitor.reset_controllers(false);
    if let Some(mask) = percussion_mask {
        *mask = DEFAULT_PERCUSSION_MASK;
    }
}

/// GM Mode On/Off: `F0 7E 7F 09 01|02 F7`.
fn is_gm_mode_set(data: &[u8]) -> bool {
    matches!(
        data,
        [0xF0, m, d, s1, s2, .., 0xF7]
            if *m == manufacturer::UNIVERSAL_NON_REALTIME
                && *d == 0x7F
                && *s1 == universal::GENERAL_MIDI
                && (*s2 == universal::GM_ON || *s2 == universal::GM_OFF)
    )
}

fn intercept_roland(
    data: &[u8],
    monitor: &mut MidiMonitor,
    percussion_mask: Option<&mut u16>,
    ui: Option<&UiQueue>,
    now: Micros,
) -> Option<SysExDisposition> {
    // Header after F0: manufacturer, device, model, command, address[3];
    // then at least one data byte, the checksum, and EOX.
    if data.len() < 11 || data.get(1) != Some(&manufacturer::ROLAND) {
        return None;
    }

    let model = *data.get(3)?;
    let address = [*data.get(5)?, *data.get(6)?, *data.get(7)?];
    let payload = data.get(8..data.len() - 2)?;
    let checksum = *data.get(data.len() - 2)?;

    let checked_span = data.get(5..data.len() - 2)?;
    if roland_checksum(checked_span) != checksum {
        warn!("Roland SysEx with bad checksum dropped");
        return None;
    }

    let full_address =
        u32::from(address[0]) << 16 | u32::from(address[1]) << 8 | u32::from(address[2]);
    let hi_med = full_address & 0xFF_FF00;
    let address_lo = address[2];

    if model == roland::MODEL_GS && payload.len() == 1 {
        let value = *payload.first()?;

        if (full_address == roland::ADDRESS_GS_RESET
            || full_address == roland::ADDRESS_SYSTEM_MODE_SET)
            && value == 0
        {
            // Reset the monitor, then let the engine perform its own reset.
            reset_monitor(monitor, percussion_mask, now);
            return Some(SysExDisposition::Forward);
        }

        if full_address & roland::ADDRESS_MASK_PATCH_PART == roland::ADDRESS_USE_FOR_RHYTHM_PART {
            // The engine exposes no channel-mode query, so rhythm
            // assignments are tracked here for the meters.
            if let Some(mask) = percussion_mask {
                let channel = address[1] & 0x0F;
                if value != 0 {
                    *mask |= 1 << channel;
                } else {
                    *mask &= !(1 << channel);
                }
            }
            return Some(SysExDisposition::Forward);
        }
    }

    if model == roland::MODEL_SC55 {
        if hi_med == roland::ADDRESS_SC55_DISPLAY_TEXT {
            if let Some(ui) = ui {
                message::show_sysex_text(ui, SysExDisplayKind::Roland, payload, address_lo);
            }
            return Some(SysExDisposition::Consumed);
        }
        if hi_med == roland::ADDRESS_SC55_DISPLAY_DOTS {
            if let Some(ui) = ui {
                message::show_sysex_bitmap(ui, SysExDisplayKind::Roland, payload);
            }
            return Some(SysExDisposition::Consumed);
        }
    }

    None
}

fn intercept_yamaha(
    data: &[u8],
    monitor: &mut MidiMonitor,
    percussion_mask: Option<&mut u16>,
    ui: Option<&UiQueue>,
    now: Micros,
) -> Option<SysExDisposition> {
    // Header after F0: manufacturer, device, model, address[3]; then at
    // least one data byte and EOX. No checksum on XG display messages.
    if data.len() < 9 || data.get(1) != Some(&manufacturer::YAMAHA) {
        return None;
    }

    let model = *data.get(3)?;
    if model != yamaha::MODEL_XG {
        return None;
    }

    let address = [*data.get(4)?, *data.get(5)?, *data.get(6)?];
    let payload = data.get(7..data.len() - 1)?;
    let full_address =
        u32::from(address[0]) << 16 | u32::from(address[1]) << 8 | u32::from(address[2]);
    let hi_med = full_address & 0xFF_FF00;
    let address_lo = address[2];

    if full_address == yamaha::ADDRESS_XG_SYSTEM_ON && payload.first() == Some(&0) {
        reset_monitor(monitor, percussion_mask, now);
        return Some(SysExDisposition::Forward);
    }

    if hi_med == yamaha::ADDRESS_DISPLAY_LETTER {
        if let Some(ui) = ui {
            message::show_sysex_text(ui, SysExDisplayKind::Yamaha, payload, address_lo);
        }
        return Some(SysExDisposition::Consumed);
    }

    if hi_med == yamaha::ADDRESS_DISPLAY_BITMAP {
        if let Some(ui) = ui {
            message::show_sysex_bitmap(ui, SysExDisplayKind::Yamaha, payload);
        }
        return Some(SysExDisposition::Consumed);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use midi::pack_short;
    use ui::message::UiMessage;

    fn gs_message(address: [u8; 3], payload: &[u8], model: u8) -> Vec<u8> {
        let mut msg = vec![0xF0, 0x41, 0x10, model, 0x12];
        msg.extend_from_slice(&address);
        msg.extend_from_slice(payload);
        let mut span = address.to_vec();
        span.extend_from_slice(payload);
        msg.push(roland_checksum(&span));
        msg.push(0xF7);
        msg
    }

    fn loud_monitor(now: Micros) -> MidiMonitor {
        let mut monitor = MidiMonitor::new();
        monitor.on_short_message(pack_short(0x90, 60, 127), now);
        monitor
    }

    fn level_of(monitor: &mut MidiMonitor, channel: usize, now: Micros) -> f32 {
        let mut l = [0.0; 16];
        let mut p = [0.0; 16];
        monitor.get_channel_levels(now, &mut l, &mut p, 0);
        l[channel]
    }

    #[test]
    fn test_gm_on_resets_monitor_and_forwards() {
        let mut monitor = loud_monitor(0);
        let mut mask = 0u16;
        let msg = [0xF0, 0x7E, 0x7F, 0x09, 0x01, 0xF7];
        let d = intercept_sysex(&msg, &mut monitor, Some(&mut mask), None, 1_000_000);
        assert_eq!(d, SysExDisposition::Forward);
        assert_eq!(mask, DEFAULT_PERCUSSION_MASK);
        assert_eq!(level_of(&mut monitor, 0, 2_000_000), 0.0);
    }

    #[test]
    fn test_gs_reset_resets_monitor_and_forwards() {
        let mut monitor = loud_monitor(0);
        let msg = gs_message([0x40, 0x00, 0x7F], &[0x00], roland::MODEL_GS);
        let d = intercept_sysex(&msg, &mut monitor, None, None, 1_000_000);
        assert_eq!(d, SysExDisposition::Forward);
        assert_eq!(level_of(&mut monitor, 0, 2_000_000), 0.0);
    }

    #[test]
    fn test_bad_checksum_is_ignored() {
        let mut monitor = loud_monitor(0);
        let mut msg = gs_message([0x40, 0x00, 0x7F], &[0x00], roland::MODEL_GS);
        let csum_index = msg.len() - 2;
        msg[csum_index] ^= 0x01;
        let d = intercept_sysex(&msg, &mut monitor, None, None, 1_000_000);
        assert_eq!(d, SysExDisposition::Forward);
        // Monitor untouched: the note still sounds.
        assert!(level_of(&mut monitor, 0, 1_100_000) > 0.0);
    }

    #[test]
    fn test_rhythm_part_updates_mask_and_forwards() {
        let mut monitor = MidiMonitor::new();
        let mut mask = DEFAULT_PERCUSSION_MASK;

        // Channel 2 (address 40 12 15) to rhythm mode.
        let msg = gs_message([0x40, 0x12, 0x15], &[0x01], roland::MODEL_GS);
        let d = intercept_sysex(&msg, &mut monitor, Some(&mut mask), None, 0);
        assert_eq!(d, SysExDisposition::Forward);
        assert_eq!(mask, DEFAULT_PERCUSSION_MASK | 1 << 2);

        // And back to melodic.
        let msg = gs_message([0x40, 0x12, 0x15], &[0x00], roland::MODEL_GS);
        intercept_sysex(&msg, &mut monitor, Some(&mut mask), None, 0);
        assert_eq!(mask, DEFAULT_PERCUSSION_MASK);
    }

    #[test]
    fn test_sc55_text_goes_to_ui_and_is_consumed() {
        let mut monitor = MidiMonitor::new();
        let ui = UiQueue::new();
        let msg = gs_message([0x10, 0x00, 0x00], b"Hello", roland::MODEL_SC55);
        let d = intercept_sysex(&msg, &mut monitor, None, Some(&ui), 0);
        assert_eq!(d, SysExDisposition::Consumed);
        match ui.dequeue_one() {
            Some(UiMessage::SysExText { kind, text }) => {
                assert_eq!(kind, SysExDisplayKind::Roland);
                assert_eq!(text.as_str(), "Hello");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_sc55_dots_go_to_ui_and_are_consumed() {
        let mut monitor = MidiMonitor::new();
        let ui = UiQueue::new();
        let msg = gs_message([0x10, 0x01, 0x00], &[0x1F; 16], roland::MODEL_SC55);
        let d = intercept_sysex(&msg, &mut monitor, None, Some(&ui), 0);
        assert_eq!(d, SysExDisposition::Consumed);
        assert!(matches!(
            ui.dequeue_one(),
            Some(UiMessage::SysExBitmap { .. })
        ));
    }

    #[test]
    fn test_xg_system_on_resets_and_forwards() {
        let mut monitor = loud_monitor(0);
        let msg = [0xF0, 0x43, 0x10, 0x4C, 0x00, 0x00, 0x7E, 0x00, 0xF7];
        let d = intercept_sysex(&msg, &mut monitor, None, None, 1_000_000);
        assert_eq!(d, SysExDisposition::Forward);
        assert_eq!(level_of(&mut monitor, 0, 2_000_000), 0.0);
    }

    #[test]
    fn test_yamaha_display_letter_consumed() {
        let mut monitor = MidiMonitor::new();
        let ui = UiQueue::new();
        let mut msg = vec![0xF0, 0x43, 0x10, 0x4C, 0x06, 0x00, 0x00];
        msg.extend_from_slice(b"Letter!");
        msg.push(0xF7);
        let d = intercept_sysex(&msg, &mut monitor, None, Some(&ui), 0);
        assert_eq!(d, SysExDisposition::Consumed);
        assert!(matches!(ui.dequeue_one(), Some(UiMessage::SysExText { .. })));
    }

    #[test]
    fn test_ordinary_sysex_forwards_untouched() {
        let mut monitor = loud_monitor(0);
        // An MT-32-addressed message is none of the intercepted classes.
        let msg = [0xF0, 0x41, 0x10, 0x16, 0x12, 0x10, 0x00, 0x16, 0x64, 0x76, 0xF7];
        let d = intercept_sysex(&msg, &mut monitor, None, None, 1_000_000);
        assert_eq!(d, SysExDisposition::Forward);
        assert!(level_of(&mut monitor, 0, 1_100_000) > 0.0);
    }
}
