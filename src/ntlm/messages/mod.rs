pub(crate) mod av_pair;
pub(crate) mod client;
pub(crate) mod computations;
pub(crate) mod server;

use std::io;

use byteorder::{LittleEndian, WriteBytesExt};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive as _;

use super::{NegotiateFlags, NTLM_VERSION_SIZE};
use crate::cursor::ReadCursor;
use crate::{Error, ErrorKind};

pub const NTLM_SIGNATURE: &[u8; NTLM_SIGNATURE_SIZE] = b"NTLMSSP\0";

pub const CLIENT_SIGN_MAGIC: &[u8] = b"session key to client-to-server signing key magic constant\0";
pub const SERVER_SIGN_MAGIC: &[u8] = b"session key to server-to-client signing key magic constant\0";
pub const CLIENT_SEAL_MAGIC: &[u8] = b"session key to client-to-server sealing key magic constant\0";
pub const SERVER_SEAL_MAGIC: &[u8] = b"session key to server-to-client sealing key magic constant\0";

const NTLM_SIGNATURE_SIZE: usize = 8;
pub(super) const MESSAGE_FIELDS_SIZE: usize = 8;

#[derive(Debug, Copy, Clone, Eq, PartialEq, FromPrimitive, ToPrimitive)]
pub(crate) enum MessageTypes {
    Negotiate = 1,
    Challenge = 2,
    Authenticate = 3,
}

/// A `{Len, MaxLen, BufferOffset}` descriptor together with the payload it points to.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub(crate) struct MessageFields {
    pub buffer: Vec<u8>,
    pub buffer_offset: u32,
}

impl MessageFields {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_buffer(buffer: Vec<u8>) -> Self {
        Self {
            buffer,
            buffer_offset: 0,
        }
    }

    /// Offset of the first byte after this field's payload.
    pub(crate) fn end_offset(&self) -> u32 {
        self.buffer_offset + self.buffer.len() as u32
    }

    pub(crate) fn write_to(&self, mut buffer: impl io::Write) -> io::Result<()> {
        let len = u16::try_from(self.buffer.len()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("message field of {} bytes does not fit in 16 bits", self.buffer.len()),
            )
        })?;

        buffer.write_u16::<LittleEndian>(len)?; // Len
        buffer.write_u16::<LittleEndian>(len)?; // MaxLen
        buffer.write_u32::<LittleEndian>(self.buffer_offset)?;

        Ok(())
    }

    pub(crate) fn write_buffer_to(&self, mut buffer: impl io::Write) -> io::Result<()> {
        buffer.write_all(&self.buffer)
    }

    /// Reads the descriptor. The payload stays empty until `read_buffer_from` resolves it.
    pub(crate) fn read_from(cursor: &mut ReadCursor<'_>) -> crate::Result<FieldDescriptor> {
        let len = cursor.read_u16()?;
        let _max_len = cursor.read_u16()?;
        let buffer_offset = cursor.read_u32()?;

        Ok(FieldDescriptor { len, buffer_offset })
    }

    pub(crate) fn read_buffer_from(cursor: &ReadCursor<'_>, descriptor: FieldDescriptor) -> crate::Result<Self> {
        if descriptor.len == 0 {
            return Ok(Self {
                buffer: Vec::new(),
                buffer_offset: descriptor.buffer_offset,
            });
        }

        let buffer = cursor.slice_at(descriptor.buffer_offset as usize, usize::from(descriptor.len))?;

        Ok(Self {
            buffer: buffer.to_vec(),
            buffer_offset: descriptor.buffer_offset,
        })
    }
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub(crate) struct FieldDescriptor {
    pub len: u16,
    pub buffer_offset: u32,
}

/// Lays the payloads out back to back starting at `offset`, in the order given.
pub(crate) fn assign_offsets(offset: u32, fields: &mut [&mut MessageFields]) {
    let mut offset = offset;
    for field in fields.iter_mut() {
        field.buffer_offset = offset;
        offset = field.end_offset();
    }
}

pub(crate) fn write_ntlm_header(message_type: MessageTypes, mut buffer: impl io::Write) -> io::Result<()> {
    buffer.write_all(NTLM_SIGNATURE)?;
    buffer.write_u32::<LittleEndian>(message_type as u32)?;

    Ok(())
}

pub(crate) fn read_ntlm_header(cursor: &mut ReadCursor<'_>, expected: MessageTypes) -> crate::Result<()> {
    let signature = cursor.read_array::<NTLM_SIGNATURE_SIZE>()?;
    if signature != *NTLM_SIGNATURE {
        return Err(Error::new(
            ErrorKind::InvalidToken,
            format!("read NTLM signature is invalid: {:?}", signature),
        ));
    }

    let message_type = cursor.read_u32()?;
    if MessageTypes::from_u32(message_type) != Some(expected) {
        return Err(Error::new(
            ErrorKind::InvalidToken,
            format!(
                "message type is invalid: expected {:?} ({}), got {}",
                expected, expected as u32, message_type
            ),
        ));
    }

    Ok(())
}

pub(crate) fn read_negotiate_flags(cursor: &mut ReadCursor<'_>) -> crate::Result<NegotiateFlags> {
    Ok(NegotiateFlags::from_bits_truncate(cursor.read_u32()?))
}

/// Reads the VERSION block if the flags announce one.
///
/// A message that ends right before the block is accepted and reported as having no version.
pub(crate) fn try_read_version(
    flags: NegotiateFlags,
    cursor: &mut ReadCursor<'_>,
) -> crate::Result<Option<[u8; NTLM_VERSION_SIZE]>> {
    if flags.contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_VERSION) && cursor.len() >= NTLM_VERSION_SIZE {
        Ok(Some(cursor.read_array::<NTLM_VERSION_SIZE>()?))
    } else {
        Ok(None)
    }
}
