//! Raw MIDI over UDP.
//!
//! Each datagram on port 1999 is a bare MIDI byte stream handed straight
//! to the stream parser — no framing, no session.

use crate::transport::UdpSocket;

/// The well-known raw MIDI port.
pub const UDP_MIDI_PORT: u16 = 1999;

const RECEIVE_BUFFER_SIZE: usize = 1024;

/// Polled receiver for raw MIDI datagrams.
pub struct UdpMidiReceiver<S: UdpSocket> {
    socket: S,
}

impl<S: UdpSocket> UdpMidiReceiver<S> {
    /// Wrap a socket bound to [`UDP_MIDI_PORT`].
    pub fn new(socket: S) -> Self {
        Self { socket }
    }

    /// Drain pending datagrams, handing each payload to `handler`.
    pub fn poll(&mut self, handler: &mut dyn FnMut(&[u8])) {
        let mut buf = [0u8; RECEIVE_BUFFER_SIZE];
        loop {
            match self.socket.recv_from(&mut buf) {
                Ok(Some((n, _))) if n > 0 => {
                    if let Some(payload) = buf.get(..n) {
                        handler(payload);
                    }
                }
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(_) => {
                    error!("Socket receive error");
                    break;
                }
            }
        }
    }
}
