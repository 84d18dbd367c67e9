//! Adapts a channel of incoming `Msg`s into the `Read + Seek` source a
//! [`crate::codec::Codec`] expects, without losing the recognition-window
//! bytes once a codec is chosen (spec.md §4.3).

use crate::codec::EncodedSource;
use aurastream_core::msg::Msg;
use crossbeam_channel::Receiver;
use std::collections::VecDeque;
use std::io::{self, Read, Seek, SeekFrom};

/// True once a message that is not `AudioEncoded` has come off the
/// channel — a terminal condition for this stream's byte supply
/// (`Flush`/`Halt`/`Quit`, or the channel being disconnected/EOF).
pub struct ChannelEncodedSource {
    receiver: Receiver<Msg>,
    buffered: VecDeque<u8>,
    terminal: Option<Msg>,
}

impl ChannelEncodedSource {
    /// `prebuffer` is the recognition window already pulled off
    /// `receiver`; it is replayed first so no byte the codec needs is
    /// lost just because recognition already consumed it from the channel.
    pub fn new(receiver: Receiver<Msg>, prebuffer: Vec<u8>) -> Self {
        Self {
            receiver,
            buffered: VecDeque::from(prebuffer),
            terminal: None,
        }
    }

    /// The non-audio message that ended this source's byte supply, if any.
    pub fn take_terminal(&mut self) -> Option<Msg> {
        self.terminal.take()
    }

    fn fill(&mut self) -> io::Result<()> {
        if !self.buffered.is_empty() || self.terminal.is_some() {
            return Ok(());
        }
        match self.receiver.recv() {
            Ok(Msg::AudioEncoded(bytes)) => {
                self.buffered.extend(bytes.as_slice());
                Ok(())
            }
            Ok(other) => {
                self.terminal = Some(other);
                Ok(())
            }
            Err(_) => {
                self.terminal = Some(Msg::Quit);
                Ok(())
            }
        }
    }
}

impl Read for ChannelEncodedSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.fill()?;
        if self.buffered.is_empty() {
            return Ok(0); // terminal reached, symphonia sees this as EOF
        }
        let n = buf.len().min(self.buffered.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.buffered.pop_front().expect("checked len above");
        }
        Ok(n)
    }
}

impl Seek for ChannelEncodedSource {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "network-channel source is not byte-seekable"))
    }
}

impl EncodedSource for ChannelEncodedSource {
    fn is_seekable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aurastream_core::msg::EncodedAudio;

    #[test]
    fn prebuffer_is_read_before_channel_bytes() {
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(Msg::AudioEncoded(EncodedAudio::new(vec![4, 5, 6]))).unwrap();
        let mut source = ChannelEncodedSource::new(rx, vec![1, 2, 3]);
        let mut buf = [0u8; 6];
        let n = source.read(&mut buf).unwrap();
        assert_eq!(n, 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
        let n2 = source.read(&mut buf).unwrap();
        assert_eq!(&buf[..n2], &[4, 5, 6]);
    }

    #[test]
    fn non_audio_message_is_terminal() {
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(Msg::Flush(7)).unwrap();
        let mut source = ChannelEncodedSource::new(rx, vec![]);
        let mut buf = [0u8; 4];
        let n = source.read(&mut buf).unwrap();
        assert_eq!(n, 0);
        match source.take_terminal() {
            Some(Msg::Flush(id)) => assert_eq!(id, 7),
            other => panic!("expected Flush(7), got {:?}", other.as_ref().map(Msg::variant_name)),
        }
    }
}
