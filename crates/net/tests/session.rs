//! End-to-end AppleMIDI session flow against scripted sockets.

use net::packets::{
    build_end_session, build_invitation, build_sync_with_count, parse_session_packet,
    parse_sync_packet, Command, NAME_MAX, SESSION_PACKET_MIN, SYNC_PACKET_SIZE,
};
use net::transport::mocks::MockUdpSocket;
use net::transport::SocketAddr;
use net::{AppleMidiHandler, AppleMidiParticipant, SessionState};

const INITIATOR_TOKEN: u32 = 0xCAFE_BABE;
const INITIATOR_SSRC: u32 = 0x1234_5678;
const LOCAL_SSRC: u32 = 0x0BAD_F00D;

fn initiator_control() -> SocketAddr {
    SocketAddr::new([192, 168, 1, 10], 52_000)
}

fn initiator_data() -> SocketAddr {
    SocketAddr::new([192, 168, 1, 10], 52_001)
}

#[derive(Default)]
struct Events {
    connects: Vec<String>,
    disconnects: Vec<String>,
    data: Vec<Vec<u8>>,
}

impl AppleMidiHandler for Events {
    fn on_connect(&mut self, _addr: &SocketAddr, name: &str) {
        self.connects.push(name.to_string());
    }

    fn on_disconnect(&mut self, _addr: &SocketAddr, name: &str) {
        self.disconnects.push(name.to_string());
    }

    fn on_data(&mut self, data: &[u8]) {
        self.data.push(data.to_vec());
    }
}

type Participant = AppleMidiParticipant<MockUdpSocket, MockUdpSocket, fn() -> u32>;

fn participant() -> Participant {
    AppleMidiParticipant::new(MockUdpSocket::new(), MockUdpSocket::new(), || LOCAL_SSRC)
}

fn invitation_bytes(name: &str) -> Vec<u8> {
    let mut buf = [0u8; SESSION_PACKET_MIN + NAME_MAX];
    let len = build_invitation(&mut buf, INITIATOR_TOKEN, INITIATOR_SSRC, name);
    buf[..len].to_vec()
}

/// Drive the handshake to `Connected`, asserting each reply on the way.
fn connect(participant: &mut Participant, events: &mut Events) {
    // Control invitation → OK with our generated SSRC.
    participant
        .control_socket_mut()
        .push_rx(&invitation_bytes("Test DAW"), initiator_control());
    participant.poll(0, events);
    assert_eq!(participant.state(), SessionState::MidiInvitation);

    let reply = participant.control_socket_mut().pop_tx().unwrap();
    let accept = parse_session_packet(&reply.data, Command::InvitationAccepted).unwrap();
    assert_eq!(accept.initiator_token, INITIATOR_TOKEN);
    assert_eq!(accept.ssrc, LOCAL_SSRC);
    assert_eq!(reply.addr, initiator_control());

    // Data invitation → OK on the data socket + on_connect.
    participant
        .data_socket_mut()
        .push_rx(&invitation_bytes("Test DAW"), initiator_data());
    participant.poll(10, events);
    assert_eq!(participant.state(), SessionState::Connected);

    let reply = participant.data_socket_mut().pop_tx().unwrap();
    assert!(parse_session_packet(&reply.data, Command::InvitationAccepted).is_some());
    assert_eq!(reply.addr, initiator_data());
    assert_eq!(events.connects, ["Test DAW"]);
}

fn rtp_note_on(sequence: u16) -> Vec<u8> {
    let mut out = vec![0x80, 0x61];
    out.extend_from_slice(&sequence.to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(&INITIATOR_SSRC.to_be_bytes());
    out.extend_from_slice(&[0x03, 0x90, 0x3C, 0x64]);
    out
}

#[test]
fn test_invitation_flow_reaches_connected() {
    let mut participant = participant();
    let mut events = Events::default();
    connect(&mut participant, &mut events);
}

#[test]
fn test_second_peer_is_rejected_during_handshake() {
    let mut participant = participant();
    let mut events = Events::default();

    participant
        .control_socket_mut()
        .push_rx(&invitation_bytes("First"), initiator_control());
    participant.poll(0, &mut events);
    let _ = participant.control_socket_mut().pop_tx();

    // A different peer invites on the control port mid-handshake.
    let stranger = SocketAddr::new([192, 168, 1, 77], 4_000);
    participant
        .control_socket_mut()
        .push_rx(&invitation_bytes("Intruder"), stranger);
    participant.poll(5, &mut events);

    let reply = participant.control_socket_mut().pop_tx().unwrap();
    assert!(parse_session_packet(&reply.data, Command::InvitationRejected).is_some());
    assert_eq!(reply.addr, stranger);
    assert_eq!(participant.state(), SessionState::MidiInvitation);
}

#[test]
fn test_invitation_times_out_after_five_seconds() {
    let mut participant = participant();
    let mut events = Events::default();

    participant
        .control_socket_mut()
        .push_rx(&invitation_bytes("Test DAW"), initiator_control());
    participant.poll(0, &mut events);
    assert_eq!(participant.state(), SessionState::MidiInvitation);

    // 5 s in 100 µs units, plus one tick.
    participant.poll(5 * 10_000 + 1, &mut events);
    assert_eq!(participant.state(), SessionState::ControlInvitation);
}

#[test]
fn test_rtp_data_reaches_handler_and_updates_sequence() {
    let mut participant = participant();
    let mut events = Events::default();
    connect(&mut participant, &mut events);

    participant
        .data_socket_mut()
        .push_rx(&rtp_note_on(0x0042), initiator_data());
    participant.poll(20, &mut events);

    assert_eq!(events.data, [vec![0x90, 0x3C, 0x64]]);

    // Sequence progress triggers receiver feedback after the period.
    participant.poll(20 + 10_001, &mut events);
    let feedback = participant.control_socket_mut().pop_tx().unwrap();
    assert_eq!(&feedback.data[2..4], b"RS");
    assert_eq!(&feedback.data[8..12], &[0x00, 0x42, 0x00, 0x00]);
}

#[test]
fn test_sync_count_zero_gets_count_one_reply() {
    let mut participant = participant();
    let mut events = Events::default();
    connect(&mut participant, &mut events);

    let mut sync = [0u8; SYNC_PACKET_SIZE];
    build_sync_with_count(&mut sync, INITIATOR_SSRC, 0, [1000, 0, 0]);
    participant.data_socket_mut().push_rx(&sync, initiator_data());

    let now = 4_321;
    participant.poll(now, &mut events);

    let reply = participant.data_socket_mut().pop_tx().unwrap();
    let parsed = parse_sync_packet(&reply.data).unwrap();
    assert_eq!(parsed.count, 1);
    assert_eq!(parsed.ssrc, LOCAL_SSRC);
    assert_eq!(parsed.timestamps[0], 1000);
    assert_eq!(parsed.timestamps[1], now);
}

#[test]
fn test_sync_count_two_computes_offset_estimate() {
    let mut participant = participant();
    let mut events = Events::default();
    connect(&mut participant, &mut events);

    let mut sync = [0u8; SYNC_PACKET_SIZE];
    build_sync_with_count(&mut sync, INITIATOR_SSRC, 2, [1000, 2000, 3000]);
    participant.data_socket_mut().push_rx(&sync, initiator_data());
    participant.poll(100, &mut events);

    // ((3000 + 1000) / 2) − 2000 = 0 … use asymmetric stamps instead.
    let mut sync = [0u8; SYNC_PACKET_SIZE];
    build_sync_with_count(&mut sync, INITIATOR_SSRC, 2, [1000, 2000, 5000]);
    participant.data_socket_mut().push_rx(&sync, initiator_data());
    participant.poll(200, &mut events);

    assert_eq!(participant.offset_estimate(), 1000);
}

#[test]
fn test_sync_from_wrong_ssrc_is_ignored() {
    let mut participant = participant();
    let mut events = Events::default();
    connect(&mut participant, &mut events);

    let mut sync = [0u8; SYNC_PACKET_SIZE];
    build_sync_with_count(&mut sync, 0xDEAD_0000, 2, [1000, 2000, 5000]);
    participant.data_socket_mut().push_rx(&sync, initiator_data());
    participant.poll(100, &mut events);

    assert_eq!(participant.offset_estimate(), 0);
}

#[test]
fn test_sync_silence_for_sixty_seconds_resets() {
    let mut participant = participant();
    let mut events = Events::default();
    connect(&mut participant, &mut events);

    participant.poll(10 + 60 * 10_000 + 1, &mut events);
    assert_eq!(participant.state(), SessionState::ControlInvitation);
    assert_eq!(participant.ssrc(), 0);
}

#[test]
fn test_end_session_fires_disconnect_and_resets() {
    let mut participant = participant();
    let mut events = Events::default();
    connect(&mut participant, &mut events);

    let mut buf = [0u8; SESSION_PACKET_MIN + NAME_MAX];
    let len = build_end_session(&mut buf, INITIATOR_TOKEN, INITIATOR_SSRC);
    participant
        .control_socket_mut()
        .push_rx(&buf[..len], initiator_control());
    participant.poll(50, &mut events);

    assert_eq!(events.disconnects.len(), 1);
    assert_eq!(participant.state(), SessionState::ControlInvitation);
}
