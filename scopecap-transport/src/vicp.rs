//! VICP client
//!
//! Wraps a byte [`Transport`] with VICP framing: every command goes out as a
//! single DATA|REMOTE|EOI frame, and replies are reassembled from as many
//! frames as the instrument chooses to send.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tracing::{debug, info, trace};

use scopecap_core::{Frame, FrameDecoder, SequenceCounter};

use crate::{error::*, Transport};

/// Framed connection to a VICP instrument
pub struct VicpClient {
    transport: Box<dyn Transport>,
    sequence: SequenceCounter,
    decoder: FrameDecoder,
    read_timeout: Duration,
}

impl VicpClient {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            sequence: SequenceCounter::new(),
            decoder: FrameDecoder::new(),
            read_timeout: Duration::from_secs(scopecap_core::constants::DEFAULT_TIMEOUT),
        }
    }

    /// Set the per-read timeout used while receiving
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub async fn connect(&mut self) -> Result<()> {
        self.transport.connect().await
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        self.decoder.clear();
        self.transport.disconnect().await
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn remote_addr(&self) -> String {
        self.transport.remote_addr()
    }

    /// Sequence number of the last command sent
    pub fn last_sequence(&self) -> u8 {
        self.sequence.last()
    }

    /// Frame and send one ASCII command
    pub async fn send_command(&mut self, command: &str) -> Result<()> {
        let frame = Frame::command(self.sequence.next(), command);
        debug!("VICP send: {} {:?}", frame, command);

        self.transport.send(&frame.encode()).await
    }

    /// Read frames until one carries EOI, returning the joined DATA payloads
    ///
    /// Frames without DATA (SRQ and other control frames) are consumed and
    /// discarded. If the instrument closes the connection, stops sending, or
    /// resets the socket first, whatever arrived so far is returned; callers
    /// judge completeness by size. Bytes following the EOI frame stay buffered
    /// for the next call.
    pub async fn receive_response(&mut self) -> Result<Bytes> {
        let mut response = BytesMut::new();
        let mut frames = 0usize;

        loop {
            while let Some(frame) = self.decoder.next_frame() {
                frames += 1;
                if frame.is_data() {
                    response.extend_from_slice(&frame.payload);
                }

                debug!(
                    "VICP frame {:3}: op=0x{:02X} len={} total={} eoi={}",
                    frames,
                    frame.flags.bits(),
                    frame.payload.len(),
                    response.len(),
                    frame.is_eoi()
                );

                if frame.is_eoi() {
                    return Ok(response.freeze());
                }
            }

            match self.transport.receive(self.read_timeout).await {
                Ok(chunk) => {
                    trace!("VICP read {} bytes", chunk.len());
                    self.decoder.push(&chunk);
                }
                Err(e) if e.ends_stream() => {
                    info!(
                        "VICP receive ended ({}) after {} frame(s), {} bytes total",
                        e,
                        frames,
                        response.len()
                    );
                    if self.decoder.buffered() > 0 {
                        debug!("Discarding {} bytes of incomplete frame", self.decoder.buffered());
                        self.decoder.clear();
                    }
                    return Ok(response.freeze());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send a query, wait `delay`, and read the reply as trimmed text
    pub async fn query(&mut self, command: &str, delay: Duration) -> Result<String> {
        self.send_command(command).await?;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let reply = self.receive_response().await?;
        Ok(String::from_utf8_lossy(&reply).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockTransport;
    use pretty_assertions::assert_eq;
    use scopecap_core::{FrameHeader, OpFlags};

    fn data_frame(seq: u8, len: usize, eoi: bool) -> BytesMut {
        let flags = if eoi { OpFlags::DATA | OpFlags::EOI } else { OpFlags::DATA };
        Frame::new(flags, seq, vec![0x5A; len]).encode()
    }

    async fn client_for(mock: &MockTransport) -> VicpClient {
        let mut client = VicpClient::new(Box::new(mock.clone()));
        client.connect().await.unwrap();
        client
    }

    #[tokio::test]
    async fn test_send_command_increments_sequence() {
        let mock = MockTransport::new("scope:1861");
        let mut client = client_for(&mock).await;

        client.send_command("*IDN?").await.unwrap();
        client.send_command("SCREEN_DUMP").await.unwrap();

        let sent = mock.sent();
        assert_eq!(sent.len(), 2);

        let first = FrameHeader::parse(&sent[0]).unwrap();
        assert_eq!(first.flags, OpFlags::COMMAND);
        assert_eq!(first.sequence, 1);
        assert_eq!(&sent[0][8..], b"*IDN?");

        let second = FrameHeader::parse(&sent[1]).unwrap();
        assert_eq!(second.sequence, 2);
        assert_eq!(second.length, 11);
        assert_eq!(client.last_sequence(), 2);
    }

    #[tokio::test]
    async fn test_three_frame_image() {
        let mock = MockTransport::new("scope:1861");
        mock.push_read(data_frame(1, 65536, false).freeze());
        mock.push_read(data_frame(2, 65536, false).freeze());
        mock.push_read(data_frame(3, 1024, true).freeze());
        let mut client = client_for(&mock).await;

        let image = client.receive_response().await.unwrap();
        assert_eq!(image.len(), 132096);
    }

    #[tokio::test]
    async fn test_frames_split_across_reads() {
        let mut wire = BytesMut::new();
        wire.extend_from_slice(&data_frame(1, 300, false));
        wire.extend_from_slice(&data_frame(2, 200, true));

        let mock = MockTransport::new("scope:1861");
        for chunk in wire.chunks(7) {
            mock.push_read(Bytes::copy_from_slice(chunk));
        }
        let mut client = client_for(&mock).await;

        let image = client.receive_response().await.unwrap();
        assert_eq!(image.len(), 500);
    }

    #[tokio::test]
    async fn test_control_frames_discarded() {
        let mock = MockTransport::new("scope:1861");
        mock.push_read(Frame::new(OpFlags::SRQ, 1, &b"SRQ-PAYLOAD"[..]).encode().freeze());
        mock.push_read(Frame::new(OpFlags::DATA | OpFlags::EOI, 2, &b"BMdata"[..]).encode().freeze());
        let mut client = client_for(&mock).await;

        let reply = client.receive_response().await.unwrap();
        assert_eq!(&reply[..], b"BMdata");
    }

    #[tokio::test]
    async fn test_eoi_on_control_frame_terminates() {
        let mock = MockTransport::new("scope:1861");
        mock.push_read(data_frame(1, 10, false).freeze());
        mock.push_read(Frame::new(OpFlags::EOI, 2, Bytes::new()).encode().freeze());
        let mut client = client_for(&mock).await;

        assert_eq!(client.receive_response().await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_stops_at_first_eoi() {
        let mut wire = BytesMut::new();
        wire.extend_from_slice(&Frame::new(OpFlags::DATA | OpFlags::EOI, 1, &b"LECROY,WS4034HD"[..]).encode());
        wire.extend_from_slice(&Frame::new(OpFlags::DATA | OpFlags::EOI, 2, &b"NEXT"[..]).encode());

        let mock = MockTransport::new("scope:1861");
        mock.push_read(wire.freeze());
        let mut client = client_for(&mock).await;

        assert_eq!(&client.receive_response().await.unwrap()[..], b"LECROY,WS4034HD");
        assert_eq!(&client.receive_response().await.unwrap()[..], b"NEXT");
    }

    #[tokio::test]
    async fn test_close_is_implicit_terminator() {
        let mock = MockTransport::new("scope:1861");
        mock.push_read(data_frame(1, 4096, false).freeze());
        mock.push_read(data_frame(2, 4096, false).freeze());
        mock.push_close();
        let mut client = client_for(&mock).await;

        assert_eq!(client.receive_response().await.unwrap().len(), 8192);
    }

    #[tokio::test]
    async fn test_timeout_is_implicit_terminator() {
        let mock = MockTransport::new("scope:1861");
        let partial = data_frame(1, 100, false);
        mock.push_read(partial.clone().freeze());
        mock.push_read(Bytes::copy_from_slice(&partial[..20]));
        mock.push_timeout();
        let mut client = client_for(&mock).await;

        assert_eq!(client.receive_response().await.unwrap().len(), 100);
    }

    #[tokio::test]
    async fn test_close_before_any_data() {
        let mock = MockTransport::new("scope:1861");
        let mut client = client_for(&mock).await;

        assert!(client.receive_response().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_not_connected_is_an_error() {
        let mock = MockTransport::new("scope:1861");
        let mut client = VicpClient::new(Box::new(mock));

        assert!(matches!(client.receive_response().await, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn test_query_trims_reply() {
        let mock = MockTransport::new("scope:1861");
        mock.push_read(
            Frame::new(OpFlags::DATA | OpFlags::EOI, 1, &b"LECROY,WS4034HD,LCRY1,9.4\n"[..])
                .encode()
                .freeze(),
        );
        let mut client = client_for(&mock).await;

        let idn = client.query("*IDN?", Duration::ZERO).await.unwrap();
        assert_eq!(idn, "LECROY,WS4034HD,LCRY1,9.4");
    }
}
