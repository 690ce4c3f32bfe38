use bytes::{Buf, BufMut, Bytes, BytesMut};

// Prefix varint: the lead byte selects the width.
const ONE_BYTE_MAX: u32 = 240;
const TWO_BYTE_MAX: u32 = 2287;
const THREE_BYTE_MAX: u32 = 67823;
const TWO_BYTE_LEAD: u8 = 241;
const THREE_BYTE_LEAD: u8 = 249;
const U24_LEAD: u8 = 250;
const U32_LEAD: u8 = 251;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("payload ended mid-field")]
    UnexpectedEnd,
    #[error("invalid packed prefix byte {0:#04x}")]
    InvalidPrefix(u8),
    #[error("{0} trailing bytes after the last field")]
    TrailingBytes(usize),
    #[error("non-finite value in sample")]
    NonFinite,
}

#[derive(Debug, Default)]
pub struct PackedWriter {
    buf: BytesMut,
}

impl PackedWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn write_u32(&mut self, value: u32) {
        if value <= ONE_BYTE_MAX {
            self.buf.put_u8(value as u8);
        } else if value <= TWO_BYTE_MAX {
            let rest = value - ONE_BYTE_MAX;
            self.buf.put_u8(TWO_BYTE_LEAD + (rest / 256) as u8);
            self.buf.put_u8((rest % 256) as u8);
        } else if value <= THREE_BYTE_MAX {
            let rest = value - (TWO_BYTE_MAX + 1);
            self.buf.put_u8(THREE_BYTE_LEAD);
            self.buf.put_u8((rest / 256) as u8);
            self.buf.put_u8((rest % 256) as u8);
        } else if value < (1 << 24) {
            self.buf.put_u8(U24_LEAD);
            self.buf.put_uint(u64::from(value), 3);
        } else {
            self.buf.put_u8(U32_LEAD);
            self.buf.put_u32(value);
        }
    }

    pub fn write_i32(&mut self, value: i32) {
        self.write_u32(zigzag(value));
    }

    /// Full-precision float. The bit pattern is byte-swapped so the zero low
    /// mantissa bytes of round values land in the small varint range.
    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits().swap_bytes());
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

#[derive(Debug)]
pub struct PackedReader<'a> {
    buf: &'a [u8],
}

impl<'a> PackedReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn read_u32(&mut self) -> Result<u32, WireError> {
        let lead = self.read_u8()?;
        match lead {
            0..=240 => Ok(u32::from(lead)),
            241..=248 => {
                let low = self.read_u8()?;
                Ok(ONE_BYTE_MAX + 256 * u32::from(lead - TWO_BYTE_LEAD) + u32::from(low))
            }
            THREE_BYTE_LEAD => {
                let rest = self.read_be(2)?;
                Ok(TWO_BYTE_MAX + 1 + rest)
            }
            U24_LEAD => self.read_be(3),
            U32_LEAD => self.read_be(4),
            other => Err(WireError::InvalidPrefix(other)),
        }
    }

    pub fn read_i32(&mut self) -> Result<i32, WireError> {
        self.read_u32().map(unzigzag)
    }

    pub fn read_f32(&mut self) -> Result<f32, WireError> {
        self.read_u32().map(|bits| f32::from_bits(bits.swap_bytes()))
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn finish(self) -> Result<(), WireError> {
        match self.buf.remaining() {
            0 => Ok(()),
            extra => Err(WireError::TrailingBytes(extra)),
        }
    }

    fn read_u8(&mut self) -> Result<u8, WireError> {
        if !self.buf.has_remaining() {
            return Err(WireError::UnexpectedEnd);
        }
        Ok(self.buf.get_u8())
    }

    fn read_be(&mut self, width: usize) -> Result<u32, WireError> {
        if self.buf.remaining() < width {
            return Err(WireError::UnexpectedEnd);
        }
        Ok(self.buf.get_uint(width) as u32)
    }
}

#[inline]
fn zigzag(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

#[inline]
fn unzigzag(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}
