//! AppleMIDI participant state machine.
//!
//! Serves exactly one initiator at a time over the standard control/data
//! port pair. The machine is polled from the network task with the session
//! sync clock (100 µs units); sockets are non-blocking.
//!
//! Lifecycle: `ControlInvitation` (accept an `IN` on the control port) →
//! `MidiInvitation` (accept an `IN` on the data port from the same peer,
//! 5 s timeout) → `Connected` (RTP-MIDI data, `CK` sync exchanges, `RS`
//! receiver feedback every second, `BY` teardown, 60 s sync timeout).

use crate::packets::{
    self, build_accept, build_feedback, build_reject, build_sync, parse_session_packet,
    parse_sync_packet, Command, NAME_MAX, SESSION_PACKET_MIN, SYNC_PACKET_SIZE,
};
use crate::rtp;
use crate::transport::{SocketAddr, UdpSocket};

/// Invitation timeout: 5 s in 100 µs units.
const INVITATION_TIMEOUT: u64 = 5 * 10_000;

/// Sync timeout: 60 s in 100 µs units.
const SYNC_TIMEOUT: u64 = 60 * 10_000;

/// Receiver feedback period: 1 s in 100 µs units.
const RECEIVER_FEEDBACK_PERIOD: u64 = 10_000;

/// Largest datagram either socket accepts.
const RECEIVE_BUFFER_SIZE: usize = 1472;

/// Session observer; implemented by the orchestrator.
pub trait AppleMidiHandler {
    /// The data-port handshake completed.
    fn on_connect(&mut self, addr: &SocketAddr, name: &str);

    /// The initiator ended the session.
    fn on_disconnect(&mut self, addr: &SocketAddr, name: &str);

    /// One reassembled MIDI command (fed to the byte-stream parser).
    fn on_data(&mut self, data: &[u8]);
}

/// Where the participant is in the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionState {
    /// Waiting for a control-port invitation.
    ControlInvitation,
    /// Control accepted; waiting for the data-port invitation.
    MidiInvitation,
    /// Session established.
    Connected,
}

/// The participant.
pub struct AppleMidiParticipant<C: UdpSocket, D: UdpSocket, R: FnMut() -> u32> {
    control: C,
    data: D,
    rng: R,

    state: SessionState,
    initiator_addr: SocketAddr,
    initiator_data_port: u16,
    initiator_token: u32,
    initiator_ssrc: u32,
    ssrc: u32,

    offset_estimate: i64,
    last_sync_time: u64,

    sequence: u16,
    last_feedback_sequence: u16,
    last_feedback_time: u64,
}

impl<C: UdpSocket, D: UdpSocket, R: FnMut() -> u32> AppleMidiParticipant<C, D, R> {
    /// Wrap the two bound sockets; `rng` seeds each session's local SSRC.
    pub fn new(control: C, data: D, rng: R) -> Self {
        Self {
            control,
            data,
            rng,
            state: SessionState::ControlInvitation,
            initiator_addr: SocketAddr::default(),
            initiator_data_port: 0,
            initiator_token: 0,
            initiator_ssrc: 0,
            ssrc: 0,
            offset_estimate: 0,
            last_sync_time: 0,
            sequence: 0,
            last_feedback_sequence: 0,
            last_feedback_time: 0,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Our SSRC for the current session (0 when idle).
    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    /// Last clock-offset estimate from a completed sync exchange.
    pub fn offset_estimate(&self) -> i64 {
        self.offset_estimate
    }

    /// Direct access to the control socket (tests and diagnostics).
    pub fn control_socket_mut(&mut self) -> &mut C {
        &mut self.control
    }

    /// Direct access to the data socket (tests and diagnostics).
    pub fn data_socket_mut(&mut self) -> &mut D {
        &mut self.data
    }

    /// One poll iteration at sync-clock time `now` (100 µs units).
    pub fn poll(&mut self, now: u64, handler: &mut dyn AppleMidiHandler) {
        let mut control_buf = [0u8; RECEIVE_BUFFER_SIZE];
        let control_packet = match self.control.recv_from(&mut control_buf) {
            Ok(packet) => packet,
            Err(_) => {
                error!("Control socket receive error");
                None
            }
        };

        let mut data_buf = [0u8; RECEIVE_BUFFER_SIZE];
        let data_packet = match self.data.recv_from(&mut data_buf) {
            Ok(packet) => packet,
            Err(_) => {
                error!("MIDI socket receive error");
                None
            }
        };

        let control = control_packet.and_then(|(n, addr)| control_buf.get(..n).map(|b| (b, addr)));
        let data = data_packet.and_then(|(n, addr)| data_buf.get(..n).map(|b| (b, addr)));

        match self.state {
            SessionState::ControlInvitation => self.control_invitation_state(control, now),
            SessionState::MidiInvitation => self.midi_invitation_state(control, data, now, handler),
            SessionState::Connected => self.connected_state(control, data, now, handler),
        }
    }

    /// Drop all session state and return to `ControlInvitation`.
    pub fn reset(&mut self) {
        self.state = SessionState::ControlInvitation;
        self.initiator_addr = SocketAddr::default();
        self.initiator_data_port = 0;
        self.initiator_token = 0;
        self.initiator_ssrc = 0;
        self.ssrc = 0;
        self.offset_estimate = 0;
        self.last_sync_time = 0;
        self.sequence = 0;
        self.last_feedback_sequence = 0;
        self.last_feedback_time = 0;
    }

    fn control_invitation_state(&mut self, control: Option<(&[u8], SocketAddr)>, now: u64) {
        let Some((bytes, addr)) = control else {
            return;
        };

        let Some(invitation) = parse_session_packet(bytes, Command::Invitation) else {
            error!("Unexpected packet");
            return;
        };

        // Store initiator details and accept with a fresh SSRC.
        self.initiator_addr = addr;
        self.initiator_token = invitation.initiator_token;
        self.initiator_ssrc = invitation.ssrc;
        self.ssrc = (self.rng)();

        if !self.send_accept_on_control() {
            error!("Couldn't accept control invitation");
            return;
        }

        self.last_sync_time = now;
        self.state = SessionState::MidiInvitation;
    }

    fn midi_invitation_state(
        &mut self,
        control: Option<(&[u8], SocketAddr)>,
        data: Option<(&[u8], SocketAddr)>,
        now: u64,
        handler: &mut dyn AppleMidiHandler,
    ) {
        if let Some((bytes, addr)) = control {
            if let Some(invitation) = parse_session_packet(bytes, Command::Invitation) {
                if addr != self.initiator_addr {
                    // A second initiator; only one session at a time.
                    self.send_reject(false, addr, invitation.initiator_token);
                } else {
                    error!("Unexpected packet");
                }
            }
        }

        if let Some((bytes, addr)) = data {
            let Some(invitation) = parse_session_packet(bytes, Command::Invitation) else {
                error!("Unexpected packet");
                return;
            };

            if addr.ip != self.initiator_addr.ip {
                self.send_reject(true, addr, invitation.initiator_token);
                return;
            }

            self.initiator_data_port = addr.port;

            if self.send_accept_on_data() {
                info!("AppleMIDI connection established");
                self.last_sync_time = now;
                self.state = SessionState::Connected;
                let peer = self.initiator_addr;
                handler.on_connect(&peer, invitation.name.as_str());
            } else {
                error!("Couldn't accept MIDI invitation");
                self.reset();
            }
        } else if now.saturating_sub(self.last_sync_time) > INVITATION_TIMEOUT {
            error!("MIDI port invitation timed out");
            self.reset();
        }
    }

    fn connected_state(
        &mut self,
        control: Option<(&[u8], SocketAddr)>,
        data: Option<(&[u8], SocketAddr)>,
        now: u64,
        handler: &mut dyn AppleMidiHandler,
    ) {
        if let Some((bytes, addr)) = control {
            if let Some(end) = parse_session_packet(bytes, Command::EndSession) {
                if addr == self.initiator_addr && end.ssrc == self.initiator_ssrc {
                    info!("Initiator ended session");
                    let peer = self.initiator_addr;
                    handler.on_disconnect(&peer, end.name.as_str());
                    self.reset();
                    return;
                }
            } else if let Some(invitation) = parse_session_packet(bytes, Command::Invitation) {
                if addr != self.initiator_addr {
                    self.send_reject(false, addr, invitation.initiator_token);
                } else {
                    error!("Unexpected packet");
                }
            }
        }

        if let Some((bytes, addr)) = data {
            if addr.ip != self.initiator_addr.ip || addr.port != self.initiator_data_port {
                error!("Unexpected packet");
            } else if let Some(header) = rtp::parse_packet(bytes, &mut |cmd| handler.on_data(cmd)) {
                self.sequence = header.sequence;
            } else if let Some(sync) = parse_sync_packet(bytes) {
                if sync.ssrc == self.initiator_ssrc && (sync.count == 0 || sync.count == 2) {
                    if sync.count == 0 {
                        // Reply with our receive time in slot 2.
                        self.send_sync(sync.timestamps[0], now);
                    } else {
                        // Completed exchange: estimate the clock offset.
                        #[allow(clippy::cast_possible_wrap)] // sync clocks fit i64
                        {
                            let ts = sync.timestamps;
                            self.offset_estimate =
                                ((ts[2] as i64 + ts[0] as i64) / 2) - ts[1] as i64;
                        }
                    }
                    self.last_sync_time = now;
                } else {
                    error!("Unexpected sync packet");
                }
            }
        }

        // Receiver feedback: acknowledge progress roughly once a second.
        if now.saturating_sub(self.last_feedback_time) > RECEIVER_FEEDBACK_PERIOD {
            if self.sequence != self.last_feedback_sequence {
                self.send_feedback();
                self.last_feedback_sequence = self.sequence;
            }
            self.last_feedback_time = now;
        }

        if now.saturating_sub(self.last_sync_time) > SYNC_TIMEOUT {
            error!("Initiator timed out");
            self.reset();
        }
    }

    fn send_accept_on_control(&mut self) -> bool {
        let mut buf = [0u8; SESSION_PACKET_MIN + NAME_MAX];
        let len = build_accept(&mut buf, self.initiator_token, self.ssrc);
        let addr = self.initiator_addr;
        send(&mut self.control, &buf, len, addr)
    }

    fn send_accept_on_data(&mut self) -> bool {
        let mut buf = [0u8; SESSION_PACKET_MIN + NAME_MAX];
        let len = build_accept(&mut buf, self.initiator_token, self.ssrc);
        let addr = SocketAddr::new(self.initiator_addr.ip, self.initiator_data_port);
        send(&mut self.data, &buf, len, addr)
    }

    fn send_reject(&mut self, on_data: bool, addr: SocketAddr, token: u32) {
        let mut buf = [0u8; SESSION_PACKET_MIN + NAME_MAX];
        let len = build_reject(&mut buf, token, self.ssrc);
        let sent = if on_data {
            send(&mut self.data, &buf, len, addr)
        } else {
            send(&mut self.control, &buf, len, addr)
        };
        if !sent {
            error!("Couldn't send rejection");
        }
    }

    fn send_sync(&mut self, ts1: u64, ts2: u64) {
        let mut buf = [0u8; SYNC_PACKET_SIZE];
        build_sync(&mut buf, self.ssrc, ts1, ts2);
        let addr = SocketAddr::new(self.initiator_addr.ip, self.initiator_data_port);
        if !send(&mut self.data, &buf, buf.len(), addr) {
            error!("Couldn't send sync reply");
        }
    }

    fn send_feedback(&mut self) {
        let mut buf = [0u8; packets::FEEDBACK_PACKET_SIZE];
        build_feedback(&mut buf, self.ssrc, self.sequence);
        let addr = self.initiator_addr;
        if !send(&mut self.control, &buf, buf.len(), addr) {
            error!("Couldn't send receiver feedback");
        }
    }
}

fn send<S: UdpSocket>(socket: &mut S, buf: &[u8], len: usize, addr: SocketAddr) -> bool {
    let Some(data) = buf.get(..len) else {
        return false;
    };
    match socket.send_to(data, addr) {
        Ok(sent) if sent == len => true,
        Ok(_) => {
            error!("Send failure, short datagram");
            false
        }
        Err(_) => {
            error!("Send failure");
            false
        }
    }
}
