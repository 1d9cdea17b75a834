//! buffers for use when writing and reading packets
//!
//! All integers on the wire are 16 bit little endian. Reads never go past the
//! filled part of a buffer; doing so yields `BufferError::EndOfBuffer` rather
//! than stale or zeroed bytes.

use std::cmp::Ordering;

use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum BufferError {
    #[display(fmt = "end of buffer")]
    EndOfBuffer,
    #[display(fmt = "text is not valid utf-8")]
    InvalidText,
}

type Result<T> = std::result::Result<T, BufferError>;

pub trait PacketBuffer {
    fn read(&mut self) -> Result<u8>;
    fn get(&self, pos: usize) -> Result<u8>;
    fn get_range(&self, start: usize, len: usize) -> Result<&[u8]>;
    fn write(&mut self, val: u8) -> Result<()>;
    fn pos(&self) -> usize;
    fn len(&self) -> usize;
    fn seek(&mut self, pos: usize) -> Result<()>;
    fn step(&mut self, steps: usize) -> Result<()>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of readable bytes left after the cursor
    fn remaining(&self) -> usize {
        self.len().saturating_sub(self.pos())
    }

    fn write_u8(&mut self, val: u8) -> Result<()> {
        self.write(val)
    }

    fn write_u16(&mut self, val: u16) -> Result<()> {
        for byte in val.to_le_bytes().iter() {
            self.write(*byte)?;
        }

        Ok(())
    }

    fn read_u16(&mut self) -> Result<u16> {
        let lo = self.read()? as u16;
        let hi = self.read()? as u16;

        Ok(lo | (hi << 8))
    }

    fn write_text(&mut self, text: &str) -> Result<()> {
        for byte in text.as_bytes() {
            self.write(*byte)?;
        }

        Ok(())
    }

    /// Read exactly `len` bytes as utf-8 text
    fn read_text(&mut self, len: usize) -> Result<String> {
        let start = self.pos();
        let text = {
            let raw = self.get_range(start, len)?;
            std::str::from_utf8(raw)
                .map_err(|_| BufferError::InvalidText)?
                .to_string()
        };
        self.step(len)?;

        Ok(text)
    }
}

/// Growable buffer, used for building outgoing packets and for decoding an
/// owned copy of a datagram
#[derive(Default, Clone, Debug)]
pub struct VectorPacketBuffer {
    pub buffer: Vec<u8>,
    pub pos: usize,
}

impl VectorPacketBuffer {
    pub fn new() -> VectorPacketBuffer {
        VectorPacketBuffer {
            buffer: Vec::new(),
            pos: 0,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> VectorPacketBuffer {
        VectorPacketBuffer {
            buffer: bytes.to_vec(),
            pos: 0,
        }
    }

}

impl PacketBuffer for VectorPacketBuffer {
    fn read(&mut self) -> Result<u8> {
        let res = self.get(self.pos)?;
        self.pos += 1;

        Ok(res)
    }

    fn get(&self, pos: usize) -> Result<u8> {
        self.buffer.get(pos).copied().ok_or(BufferError::EndOfBuffer)
    }

    fn get_range(&self, start: usize, len: usize) -> Result<&[u8]> {
        let end = start.checked_add(len).ok_or(BufferError::EndOfBuffer)?;
        self.buffer.get(start..end).ok_or(BufferError::EndOfBuffer)
    }

    fn write(&mut self, val: u8) -> Result<()> {
        match self.pos.cmp(&self.buffer.len()) {
            Ordering::Less => self.buffer[self.pos] = val,
            Ordering::Equal => self.buffer.push(val),
            // a gap would leave bytes nobody wrote
            Ordering::Greater => return Err(BufferError::EndOfBuffer),
        }
        self.pos += 1;

        Ok(())
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn len(&self) -> usize {
        self.buffer.len()
    }

    fn seek(&mut self, pos: usize) -> Result<()> {
        self.pos = pos;

        Ok(())
    }

    fn step(&mut self, steps: usize) -> Result<()> {
        self.pos += steps;

        Ok(())
    }
}

/// Largest datagram either side will read
pub const MAX_DATAGRAM_SIZE: usize = 2048;

/// Fixed size receive buffer
///
/// `filled` marks how many bytes the last receive actually delivered; reads
/// past it fail even though the backing array is larger.
pub struct BytePacketBuffer {
    pub buf: [u8; MAX_DATAGRAM_SIZE],
    pub pos: usize,
    pub filled: usize,
}

impl Default for BytePacketBuffer {
    fn default() -> Self {
        BytePacketBuffer::new()
    }
}

impl BytePacketBuffer {
    pub fn new() -> BytePacketBuffer {
        BytePacketBuffer {
            buf: [0; MAX_DATAGRAM_SIZE],
            pos: 0,
            filled: 0,
        }
    }

    /// Mark the first `len` bytes as received and rewind the cursor
    pub fn set_filled(&mut self, len: usize) {
        self.filled = len.min(MAX_DATAGRAM_SIZE);
        self.pos = 0;
    }
}

impl PacketBuffer for BytePacketBuffer {
    fn read(&mut self) -> Result<u8> {
        let res = self.get(self.pos)?;
        self.pos += 1;

        Ok(res)
    }

    fn get(&self, pos: usize) -> Result<u8> {
        if pos >= self.filled {
            return Err(BufferError::EndOfBuffer);
        }

        Ok(self.buf[pos])
    }

    fn get_range(&self, start: usize, len: usize) -> Result<&[u8]> {
        let end = start.checked_add(len).ok_or(BufferError::EndOfBuffer)?;
        if end > self.filled {
            return Err(BufferError::EndOfBuffer);
        }

        Ok(&self.buf[start..end])
    }

    fn write(&mut self, val: u8) -> Result<()> {
        if self.pos >= MAX_DATAGRAM_SIZE {
            return Err(BufferError::EndOfBuffer);
        }
        self.buf[self.pos] = val;
        self.pos += 1;
        if self.pos > self.filled {
            self.filled = self.pos;
        }

        Ok(())
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn len(&self) -> usize {
        self.filled
    }

    fn seek(&mut self, pos: usize) -> Result<()> {
        self.pos = pos;

        Ok(())
    }

    fn step(&mut self, steps: usize) -> Result<()> {
        self.pos += steps;

        Ok(())
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_u16_is_little_endian() {
        let mut buffer = VectorPacketBuffer::new();
        buffer.write_u16(0x1234).unwrap();

        assert_eq!(vec![0x34, 0x12], buffer.buffer);

        buffer.seek(0).unwrap();
        assert_eq!(0x1234, buffer.read_u16().unwrap());
    }

    #[test]
    fn test_write_after_seek() {
        let mut buffer = VectorPacketBuffer::new();
        buffer.write_text("abc").unwrap();

        buffer.seek(1).unwrap();
        buffer.write_u8(b'x').unwrap();
        assert_eq!(b"axc".to_vec(), buffer.buffer);

        buffer.seek(3).unwrap();
        buffer.write_u8(b'd').unwrap();
        assert_eq!(b"axcd".to_vec(), buffer.buffer);

        buffer.seek(10).unwrap();
        assert!(matches!(buffer.write_u8(b'e'), Err(BufferError::EndOfBuffer)));
        assert_eq!(4, buffer.len());
    }

    #[test]
    fn test_read_past_end_fails() {
        let mut buffer = VectorPacketBuffer::from_bytes(&[1]);
        assert!(matches!(buffer.read_u16(), Err(BufferError::EndOfBuffer)));

        let mut buffer = VectorPacketBuffer::from_bytes(b"ab");
        assert!(matches!(buffer.read_text(3), Err(BufferError::EndOfBuffer)));
        assert_eq!(0, buffer.pos());
        assert_eq!("ab", buffer.read_text(2).unwrap());
        assert_eq!(0, buffer.remaining());
    }

    #[test]
    fn test_invalid_utf8() {
        let mut buffer = VectorPacketBuffer::from_bytes(&[0xff, 0xfe]);
        assert!(matches!(buffer.read_text(2), Err(BufferError::InvalidText)));
    }

    #[test]
    fn test_byte_buffer_respects_filled() {
        let mut buffer = BytePacketBuffer::new();
        buffer.buf[0] = 7;
        buffer.buf[1] = 0;
        buffer.buf[2] = 9;
        buffer.set_filled(2);

        assert_eq!(7, buffer.read_u16().unwrap());
        assert!(buffer.read().is_err());
        assert!(buffer.get_range(1, 2).is_err());
    }
}
