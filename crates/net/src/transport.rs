//! Minimal UDP socket contract.
//!
//! The network stack itself (Ethernet/Wi-Fi association, ARP, IP) is board
//! support; the session machines only need non-blocking datagram receive
//! and send. Mock sockets back the host tests.

/// An IPv4 endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SocketAddr {
    /// IPv4 address octets.
    pub ip: [u8; 4],
    /// UDP port.
    pub port: u16,
}

impl SocketAddr {
    /// Build an endpoint.
    pub const fn new(ip: [u8; 4], port: u16) -> Self {
        Self { ip, port }
    }
}

/// A bound, non-blocking UDP socket.
pub trait UdpSocket {
    /// Error type for transport failures.
    type Error: core::fmt::Debug;

    /// Receive one pending datagram, or `Ok(None)` when nothing is queued.
    ///
    /// # Errors
    ///
    /// Transport failures; the caller logs and continues polling.
    fn recv_from(&mut self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>, Self::Error>;

    /// Send one datagram; returns the bytes accepted.
    ///
    /// # Errors
    ///
    /// Transport failures; short sends are treated as failures by callers.
    fn send_to(&mut self, data: &[u8], addr: SocketAddr) -> Result<usize, Self::Error>;
}

pub mod mocks {
    //! Scripted sockets for host tests.

    use heapless::Vec;

    use super::{SocketAddr, UdpSocket};

    /// Largest datagram the mocks carry.
    pub const MOCK_DATAGRAM_MAX: usize = 1472;

    /// One queued datagram.
    #[derive(Clone)]
    pub struct Datagram {
        /// Payload bytes.
        pub data: Vec<u8, MOCK_DATAGRAM_MAX>,
        /// Peer endpoint.
        pub addr: SocketAddr,
    }

    /// A socket with scripted receptions and recorded sends.
    #[derive(Default)]
    pub struct MockUdpSocket {
        rx: Vec<Datagram, 16>,
        /// Everything sent through the socket, in order.
        pub tx: Vec<Datagram, 16>,
    }

    impl MockUdpSocket {
        /// An idle socket.
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a datagram for the next `recv_from`.
        pub fn push_rx(&mut self, data: &[u8], addr: SocketAddr) {
            let mut datagram = Datagram {
                data: Vec::new(),
                addr,
            };
            let _ = datagram
                .data
                .extend_from_slice(&data[..data.len().min(MOCK_DATAGRAM_MAX)]);
            let _ = self.rx.push(datagram);
        }

        /// Pop the oldest recorded send.
        pub fn pop_tx(&mut self) -> Option<Datagram> {
            if self.tx.is_empty() {
                None
            } else {
                Some(self.tx.remove(0))
            }
        }
    }

    impl UdpSocket for MockUdpSocket {
        type Error = ();

        fn recv_from(
            &mut self,
            buf: &mut [u8],
        ) -> Result<Option<(usize, SocketAddr)>, Self::Error> {
            if self.rx.is_empty() {
                return Ok(None);
            }
            let datagram = self.rx.remove(0);
            let n = datagram.data.len().min(buf.len());
            buf.get_mut(..n)
                .and_then(|dst| datagram.data.get(..n).map(|src| dst.copy_from_slice(src)))
                .ok_or(())?;
            Ok(Some((n, datagram.addr)))
        }

        fn send_to(&mut self, data: &[u8], addr: SocketAddr) -> Result<usize, Self::Error> {
            let mut datagram = Datagram {
                data: Vec::new(),
                addr,
            };
            let _ = datagram
                .data
                .extend_from_slice(&data[..data.len().min(MOCK_DATAGRAM_MAX)]);
            let _ = self.tx.push(datagram);
            Ok(data.len())
        }
    }
}
