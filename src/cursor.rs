//! Bounds-checked reading over an immutable byte slice.

use crate::{Error, ErrorKind, Result};

/// ReadCursor is a wrapper around `&[u8]` used by every wire decoder of the crate:
///
/// * every read checks the remaining length and fails with [`ErrorKind::InvalidToken`] instead of panicking;
/// * reads never copy unless the caller asks for an owned value;
/// * the cursor remembers the whole buffer, so offset-based fields can be resolved against it.
#[derive(Debug, Clone)]
pub struct ReadCursor<'a> {
    inner: &'a [u8],
    pos: usize,
}

impl<'a> ReadCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { inner: bytes, pos: 0 }
    }

    /// Returns the size of the remaining bytes.
    pub fn len(&self) -> usize {
        self.inner.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.inner[self.pos..]
    }

    /// Gets a reference to the underlying buffer wrapped by this cursor.
    pub fn inner(&self) -> &'a [u8] {
        self.inner
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn read_slice(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.len() {
            return Err(Error::new(
                ErrorKind::InvalidToken,
                format!(
                    "not enough bytes: expected {} bytes at offset {}, {} bytes left",
                    n,
                    self.pos,
                    self.len()
                ),
            ));
        }

        let bytes = &self.inner[self.pos..self.pos + n];
        self.pos += n;

        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut array = [0x00; N];
        array.copy_from_slice(self.read_slice(N)?);

        Ok(array)
    }

    pub fn read_remaining(&mut self) -> &'a [u8] {
        let bytes = self.remaining();
        self.pos = self.inner.len();

        bytes
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(u8::from_le_bytes(self.read_array::<1>()?))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array::<2>()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array::<4>()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array::<8>()?))
    }

    pub fn advance(&mut self, len: usize) -> Result<()> {
        self.read_slice(len).map(|_| ())
    }

    /// Resolves a `(length, offset)` pair against the whole wrapped buffer without moving the cursor.
    pub fn slice_at(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        let end = offset.checked_add(len).filter(|end| *end <= self.inner.len()).ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidToken,
                format!(
                    "field of {} bytes at offset {} goes outside the message of {} bytes",
                    len,
                    offset,
                    self.inner.len()
                ),
            )
        })?;

        Ok(&self.inner[offset..end])
    }
}
