// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Packet source abstraction.
//!
//! The decoder itself is transport-agnostic and synchronous; this module
//! supplies the packet feed around it:
//!
//! - **Live operation**: [`UdpSource`] reading MSOP/DIFOP datagrams
//! - **Testing**: [`ReplaySource`] replaying pre-built packets
//!
//! Packets for this sensor are always 1248 bytes, so a 2 KiB receive buffer
//! is sufficient for either packet kind.

use crate::lidar::Error;
use std::{future::Future, pin::Pin};

/// Trait for packet sources.
pub trait PacketSource: Send {
    /// Receive the next packet into `buf`, returning its length.
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, Error>> + Send + 'a>>;

    /// Whether more packets are available. Infinite sources (UDP) always
    /// return true; replay sources return false when exhausted.
    fn has_more(&self) -> bool;
}

/// UDP socket packet source for live sensor operation.
pub struct UdpSource {
    socket: tokio::net::UdpSocket,
}

impl UdpSource {
    /// Wrap an existing socket.
    pub fn new(socket: tokio::net::UdpSocket) -> Self {
        Self { socket }
    }

    /// Bind to an address and create a UDP source.
    pub async fn bind(addr: &str) -> Result<Self, Error> {
        let socket = tokio::net::UdpSocket::bind(addr).await?;
        Ok(Self { socket })
    }
}

impl PacketSource for UdpSource {
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, Error>> + Send + 'a>> {
        Box::pin(async move {
            let len = self.socket.recv(buf).await?;
            Ok(len)
        })
    }

    fn has_more(&self) -> bool {
        true
    }
}

/// Finite replay source feeding pre-built packets, for tests and benches.
pub struct ReplaySource {
    packets: Vec<Vec<u8>>,
    index: usize,
}

impl ReplaySource {
    pub fn new(packets: Vec<Vec<u8>>) -> Self {
        Self { packets, index: 0 }
    }

    /// Rewind to the first packet.
    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Total number of packets.
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Number of packets not yet replayed.
    pub fn remaining(&self) -> usize {
        self.packets.len() - self.index
    }
}

impl PacketSource for ReplaySource {
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, Error>> + Send + 'a>> {
        Box::pin(async move {
            if self.index >= self.packets.len() {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "no more packets",
                )));
            }

            let packet = &self.packets[self.index];
            let len = packet.len().min(buf.len());
            buf[..len].copy_from_slice(&packet[..len]);
            self.index += 1;
            Ok(len)
        })
    }

    fn has_more(&self) -> bool {
        self.index < self.packets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replay_source() {
        let packets = vec![vec![1u8; 1248], vec![2u8; 1248]];
        let mut source = ReplaySource::new(packets);
        assert_eq!(source.len(), 2);
        assert!(source.has_more());

        let mut buf = [0u8; 2048];
        let len = source.recv(&mut buf).await.unwrap();
        assert_eq!(len, 1248);
        assert_eq!(buf[0], 1);
        assert_eq!(source.remaining(), 1);

        let len = source.recv(&mut buf).await.unwrap();
        assert_eq!(len, 1248);
        assert_eq!(buf[0], 2);

        assert!(!source.has_more());
        assert!(source.recv(&mut buf).await.is_err());

        source.reset();
        assert_eq!(source.remaining(), 2);
        assert!(source.has_more());
    }

    #[tokio::test]
    async fn test_empty_replay_source() {
        let mut source = ReplaySource::new(Vec::new());
        assert!(source.is_empty());
        assert!(!source.has_more());

        let mut buf = [0u8; 2048];
        assert!(source.recv(&mut buf).await.is_err());
    }
}
