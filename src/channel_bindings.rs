//! `SEC_CHANNEL_BINDINGS` structure passed by the caller to tie the handshake to the underlying transport.

use crate::cursor::ReadCursor;
use crate::{Error, ErrorKind, Result};

// size of SEC_CHANNEL_BINDINGS structure
const SEC_CHANNEL_BINDINGS_SIZE: usize = 32;

/// [SEC_CHANNEL_BINDINGS](https://docs.microsoft.com/en-us/windows/win32/api/sspi/ns-sspi-sec_channel_bindings)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelBindings {
    pub initiator_addr_type: u32,
    pub initiator: Vec<u8>,
    pub acceptor_addr_type: u32,
    pub acceptor: Vec<u8>,
    pub application_data: Vec<u8>,
}

impl ChannelBindings {
    /// Bindings carrying only application data, e.g. the RFC 5929 `tls-server-end-point` token.
    pub fn from_application_data(application_data: impl Into<Vec<u8>>) -> Self {
        Self {
            application_data: application_data.into(),
            ..Default::default()
        }
    }

    pub fn from_bytes<T: AsRef<[u8]>>(data: T) -> Result<Self> {
        let data = data.as_ref();

        if data.len() < SEC_CHANNEL_BINDINGS_SIZE {
            return Err(Error::new(
                ErrorKind::InvalidParameter,
                format!(
                    "invalid SEC_CHANNEL_BINDINGS buffer: buffer is too short: {}. Minimum len: {}",
                    data.len(),
                    SEC_CHANNEL_BINDINGS_SIZE,
                ),
            ));
        }

        let mut cursor = ReadCursor::new(data);

        let initiator_addr_type = cursor.read_u32()?;
        let initiator = read_field(&mut cursor, "initiator")?;
        let acceptor_addr_type = cursor.read_u32()?;
        let acceptor = read_field(&mut cursor, "acceptor")?;
        let application_data = read_field(&mut cursor, "application")?;

        Ok(Self {
            initiator_addr_type,
            initiator,
            acceptor_addr_type,
            acceptor,
            application_data,
        })
    }
}

fn read_field(cursor: &mut ReadCursor<'_>, name: &str) -> Result<Vec<u8>> {
    let len = cursor.read_u32()? as usize;
    let offset = cursor.read_u32()? as usize;

    if len == 0 {
        return Ok(Vec::new());
    }

    cursor.slice_at(offset, len).map(<[u8]>::to_vec).map_err(|_| {
        Error::new(
            ErrorKind::InvalidParameter,
            format!(
                "invalid SEC_CHANNEL_BINDINGS buffer: {} offset + len ({}) goes outside the buffer ({})",
                name,
                offset.saturating_add(len),
                cursor.inner().len()
            ),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::ChannelBindings;
    use crate::ErrorKind;

    fn application_data_buffer(application_offset: u32, application_len: u32) -> [u8; 36] {
        let mut buffer = [0; 36];

        buffer[24..28].copy_from_slice(&application_len.to_le_bytes());
        buffer[28..32].copy_from_slice(&application_offset.to_le_bytes());
        buffer[32..].copy_from_slice(&[1, 2, 3, 4]);

        buffer
    }

    #[test]
    fn from_bytes() {
        let channel_bindings = ChannelBindings::from_bytes(application_data_buffer(32, 4)).unwrap();

        assert_eq!(channel_bindings, ChannelBindings::from_application_data(vec![1, 2, 3, 4]));
    }

    #[test]
    fn from_bytes_reads_initiator_and_acceptor() {
        let mut buffer = vec![0; 32];
        buffer[0..4].copy_from_slice(&2u32.to_le_bytes());
        buffer[4..8].copy_from_slice(&2u32.to_le_bytes());
        buffer[8..12].copy_from_slice(&32u32.to_le_bytes());
        buffer[12..16].copy_from_slice(&3u32.to_le_bytes());
        buffer[16..20].copy_from_slice(&1u32.to_le_bytes());
        buffer[20..24].copy_from_slice(&34u32.to_le_bytes());
        buffer.extend_from_slice(&[0xaa, 0xbb, 0xcc]);

        let channel_bindings = ChannelBindings::from_bytes(&buffer).unwrap();

        assert_eq!(channel_bindings.initiator_addr_type, 2);
        assert_eq!(channel_bindings.initiator, vec![0xaa, 0xbb]);
        assert_eq!(channel_bindings.acceptor_addr_type, 3);
        assert_eq!(channel_bindings.acceptor, vec![0xcc]);
        assert!(channel_bindings.application_data.is_empty());
    }

    #[test]
    fn too_small_buffer() {
        assert!(ChannelBindings::from_bytes([1, 2, 3, 4, 5, 6, 7, 8]).is_err());
        assert!(ChannelBindings::from_bytes([]).is_err());
    }

    #[test]
    fn invalid_len() {
        let error = ChannelBindings::from_bytes(application_data_buffer(32, 6)).unwrap_err();

        assert_eq!(error.error_type, ErrorKind::InvalidParameter);
    }

    #[test]
    fn invalid_offset() {
        assert!(ChannelBindings::from_bytes(application_data_buffer(35, 4)).is_err());
    }
}
