//! RTP-MIDI data-packet parsing.
//!
//! An RTP header (payload type 0x61, version 2, no CSRC) is followed by a
//! MIDI command section: a flags/length byte, optional 12-bit length
//! extension, then a list of delta-time-prefixed commands using running
//! status. SysEx may arrive segmented across packets (`F0…F0` first,
//! `F7…F0` middle, `F7…F7` last, `F7…F4` cancelled); segments are handed to
//! the byte-stream parser downstream, which reassembles them through its
//! normal framing rules.

/// RTP-MIDI payload type.
pub const PAYLOAD_TYPE: u8 = 0x61;

/// RTP version.
pub const RTP_VERSION: u8 = 2;

/// RTP header length.
pub const RTP_HEADER_LEN: usize = 12;

/// A parsed RTP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    /// Sequence number.
    pub sequence: u16,
    /// Media timestamp.
    pub timestamp: u32,
    /// Sender SSRC.
    pub ssrc: u32,
}

/// Parse a complete RTP-MIDI packet, invoking `handler` once per decoded
/// MIDI command (real-time byte, channel message, or SysEx segment).
///
/// Returns the header on success; `None` drops the packet (§ protocol
/// violation: log, drop, resynchronise on the next packet).
pub fn parse_packet(data: &[u8], handler: &mut dyn FnMut(&[u8])) -> Option<RtpHeader> {
    // Header plus at least the command-section flags byte.
    if data.len() < RTP_HEADER_LEN + 1 {
        return None;
    }

    let flags = u16::from_be_bytes([*data.first()?, *data.get(1)?]);
    if (flags >> 14) as u8 & 0x03 != RTP_VERSION {
        return None;
    }
    // No CSRC identifiers.
    if (flags >> 8) as u8 & 0x0F != 0 {
        return None;
    }
    if flags as u8 != PAYLOAD_TYPE {
        return None;
    }

    let header = RtpHeader {
        sequence: u16::from_be_bytes([*data.get(2)?, *data.get(3)?]),
        timestamp: u32::from_be_bytes([
            *data.get(4)?,
            *data.get(5)?,
            *data.get(6)?,
            *data.get(7)?,
        ]),
        ssrc: u32::from_be_bytes([
            *data.get(8)?,
            *data.get(9)?,
            *data.get(10)?,
            *data.get(11)?,
        ]),
    };

    if parse_command_section(data.get(RTP_HEADER_LEN..)?, handler) {
        Some(header)
    } else {
        None
    }
}

/// Parse the MIDI command section that follows the RTP header.
pub fn parse_command_section(data: &[u8], handler: &mut dyn FnMut(&[u8])) -> bool {
    // At least the section header and one status byte.
    if data.len() < 2 {
        return false;
    }

    let section_header = match data.first() {
        Some(&b) => b,
        None => return false,
    };
    let mut commands = data.get(1..).unwrap_or(&[]);

    // Lower 4 bits are the length; with the B flag set it grows to 12 bits.
    let mut length = usize::from(section_header & 0x0F);
    if section_header & 0x80 != 0 {
        let Some(&ext) = commands.first() else {
            return false;
        };
        length = length << 8 | usize::from(ext);
        commands = commands.get(1..).unwrap_or(&[]);
    }

    if length > commands.len() {
        error!("Invalid MIDI command length");
        return false;
    }
    let mut remaining = commands.get(..length).unwrap_or(&[]);

    let mut running_status = 0u8;
    let mut commands_processed = 0usize;

    while !remaining.is_empty() {
        // With the Z flag set the first entry carries a delta time too.
        if commands_processed > 0 || section_header & 0x20 != 0 {
            let consumed = delta_time_length(remaining);
            remaining = remaining.get(consumed..).unwrap_or(&[]);
        }

        if remaining.is_empty() {
            break;
        }

        let consumed = parse_command(remaining, &mut running_status, handler);
        if consumed == 0 {
            // Un-decodable command; drop the rest of the section.
            return false;
        }
        remaining = remaining.get(consumed..).unwrap_or(&[]);
        commands_processed += 1;
    }

    true
}

/// Length of a variable-length delta time (7 bits per byte, at most 4).
fn delta_time_length(data: &[u8]) -> usize {
    let mut length = 0usize;
    while length < 4 {
        let Some(&byte) = data.get(length) else {
            break;
        };
        length += 1;
        if byte & 0x80 == 0 {
            break;
        }
    }
    length
}

fn parse_command(data: &[u8], running_status: &mut u8, handler: &mut dyn FnMut(&[u8])) -> usize {
    let Some(&first) = data.first() else {
        return 0;
    };

    // System Real-Time: single byte, dispatch immediately.
    if first >= 0xF8 {
        if first != 0xF9 && first != 0xFD {
            handler(&[first]);
        }
        return 1;
    }

    let mut consumed = 0usize;
    let status = if first & 0x80 != 0 {
        // Update running status on channel voice statuses only.
        *running_status = if first < 0xF0 { first } else { 0 };
        consumed += 1;
        first
    } else {
        // First byte is data: invalid without running status.
        if *running_status == 0 {
            return 0;
        }
        *running_status
    };

    if status < 0xF0 {
        let data_bytes = match status & 0xF0 {
            0xC0 | 0xD0 => 1,
            _ => 2,
        };
        consumed += data_bytes;
        let Some(command) = data.get(..consumed) else {
            return 0;
        };
        handler(command);
        return consumed;
    }

    match status {
        // SysEx head or continuation: scan for a terminator.
        0xF0 | 0xF7 => parse_sysex_segment(data, handler),

        0xF1 | 0xF3 => {
            consumed += 1;
            let Some(command) = data.get(..consumed) else {
                return 0;
            };
            handler(command);
            consumed
        }

        0xF2 => {
            consumed += 2;
            let Some(command) = data.get(..consumed) else {
                return 0;
            };
            handler(command);
            consumed
        }

        // 0xF4/0xF5/0xF6 carry no data.
        _ => {
            let Some(command) = data.get(..consumed) else {
                return 0;
            };
            handler(command);
            consumed
        }
    }
}

/// Decode one SysEx segment starting at a `F0` or `F7` head byte.
///
/// The segment runs to the next `F0`/`F7`/`F4` (or the section end); the
/// framing rules decide which bytes are forwarded:
///
/// | head | tail | meaning              | forwarded                  |
/// |------|------|----------------------|----------------------------|
/// | F0   | F7   | complete message     | everything                 |
/// | F0   | F0   | first segment        | without the trailing `F0`  |
/// | F7   | F0   | middle segment       | without either delimiter   |
/// | F7   | F7   | last segment         | without the leading `F7`   |
/// | F7   | F4   | cancelled message    | the lone `F7` terminator   |
fn parse_sysex_segment(data: &[u8], handler: &mut dyn FnMut(&[u8])) -> usize {
    let Some(&head) = data.first() else {
        return 0;
    };

    let mut parsed = 1usize;
    let mut tail = 0u8;
    while parsed < data.len() && !(tail == 0xF0 || tail == 0xF7 || tail == 0xF4) {
        tail = match data.get(parsed) {
            Some(&b) => b,
            None => break,
        };
        parsed += 1;
    }

    let (start, mut receive_len) = (0usize, parsed);

    let (start, receive_len) = if head == 0xF0 && tail == 0xF0 {
        // First segment of a segmented message.
        receive_len -= 1;
        (start, receive_len)
    } else if head == 0xF7 && tail == 0xF0 {
        // Middle segment.
        (1, parsed.saturating_sub(2))
    } else if head == 0xF7 && tail == 0xF7 {
        // Last segment.
        (1, parsed.saturating_sub(1))
    } else if head == 0xF7 && tail == 0xF4 {
        // Cancelled: hand the terminator through so the stream parser
        // abandons its partial message.
        (0, 1)
    } else {
        (start, receive_len)
    };

    if let Some(segment) = data.get(start..start + receive_len) {
        handler(segment);
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(data: &[u8]) -> Option<(RtpHeader, Vec<Vec<u8>>)> {
        let mut commands = Vec::new();
        let header = parse_packet(data, &mut |cmd| commands.push(cmd.to_vec()))?;
        Some((header, commands))
    }

    fn packet(sequence: u16, command_section: &[u8]) -> Vec<u8> {
        let mut out = vec![0x80, PAYLOAD_TYPE];
        out.extend_from_slice(&sequence.to_be_bytes());
        out.extend_from_slice(&0x11223344u32.to_be_bytes()); // timestamp
        out.extend_from_slice(&0xAABBCCDDu32.to_be_bytes()); // ssrc
        out.extend_from_slice(command_section);
        out
    }

    #[test]
    fn test_single_note_on() {
        let data = packet(7, &[0x03, 0x90, 0x3C, 0x64]);
        let (header, commands) = collect(&data).unwrap();
        assert_eq!(header.sequence, 7);
        assert_eq!(header.ssrc, 0xAABB_CCDD);
        assert_eq!(commands, [vec![0x90, 0x3C, 0x64]]);
    }

    #[test]
    fn test_running_status_across_commands() {
        // Note on, delta time 0, then a bare data pair.
        let data = packet(1, &[0x06, 0x90, 0x3C, 0x64, 0x00, 0x3E, 0x60]);
        let (_, commands) = collect(&data).unwrap();
        assert_eq!(commands, [vec![0x90, 0x3C, 0x64], vec![0x3E, 0x60]]);
    }

    #[test]
    fn test_z_flag_leading_delta_time() {
        let data = packet(1, &[0x20 | 0x04, 0x00, 0x90, 0x3C, 0x64]);
        let (_, commands) = collect(&data).unwrap();
        assert_eq!(commands, [vec![0x90, 0x3C, 0x64]]);
    }

    #[test]
    fn test_long_length_uses_b_flag() {
        let mut section = vec![0x80 | 0x00, 0x03];
        section.extend_from_slice(&[0x90, 0x3C, 0x64]);
        let data = packet(1, &section);
        let (_, commands) = collect(&data).unwrap();
        assert_eq!(commands, [vec![0x90, 0x3C, 0x64]]);
    }

    #[test]
    fn test_wrong_payload_type_rejected() {
        let mut data = packet(1, &[0x03, 0x90, 0x3C, 0x64]);
        data[1] = 0x60;
        assert!(collect(&data).is_none());
    }

    #[test]
    fn test_csrc_rejected() {
        let mut data = packet(1, &[0x03, 0x90, 0x3C, 0x64]);
        data[0] = 0x81; // CC = 1
        assert!(collect(&data).is_none());
    }

    #[test]
    fn test_overlong_declared_length_rejected() {
        let data = packet(1, &[0x0F, 0x90, 0x3C, 0x64]);
        assert!(collect(&data).is_none());
    }

    #[test]
    fn test_complete_sysex_in_one_packet() {
        let data = packet(1, &[0x06, 0xF0, 0x7E, 0x7F, 0x09, 0x01, 0xF7]);
        let (_, commands) = collect(&data).unwrap();
        assert_eq!(commands, [vec![0xF0, 0x7E, 0x7F, 0x09, 0x01, 0xF7]]);
    }

    #[test]
    fn test_segmented_sysex_first_segment_drops_trailing_f0() {
        let data = packet(1, &[0x05, 0xF0, 0x41, 0x10, 0x45, 0xF0]);
        let (_, commands) = collect(&data).unwrap();
        assert_eq!(commands, [vec![0xF0, 0x41, 0x10, 0x45]]);
    }

    #[test]
    fn test_segmented_sysex_middle_strips_both_delimiters() {
        let data = packet(1, &[0x04, 0xF7, 0x12, 0x34, 0xF0]);
        let (_, commands) = collect(&data).unwrap();
        assert_eq!(commands, [vec![0x12, 0x34]]);
    }

    #[test]
    fn test_segmented_sysex_last_strips_leading_f7() {
        let data = packet(1, &[0x04, 0xF7, 0x56, 0x78, 0xF7]);
        let (_, commands) = collect(&data).unwrap();
        assert_eq!(commands, [vec![0x56, 0x78, 0xF7]]);
    }

    #[test]
    fn test_cancelled_sysex_yields_terminator_only() {
        let data = packet(1, &[0x03, 0xF7, 0x12, 0xF4]);
        let (_, commands) = collect(&data).unwrap();
        assert_eq!(commands, [vec![0xF7]]);
    }

    #[test]
    fn test_realtime_between_commands() {
        let data = packet(1, &[0x05, 0xF8, 0x00, 0x90, 0x3C, 0x64]);
        let (_, commands) = collect(&data).unwrap();
        assert_eq!(commands, [vec![0xF8], vec![0x90, 0x3C, 0x64]]);
    }
}
