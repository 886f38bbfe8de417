//! `AV_PAIR` lists carried in the TargetInfo field of the Challenge message and in the NTLMv2 response.

use std::io;

use bitflags::bitflags;
use byteorder::{LittleEndian, WriteBytesExt};

use crate::crypto::HASH_SIZE;
use crate::cursor::ReadCursor;
use crate::{Error, ErrorKind};

pub const AV_PAIR_EOL: u16 = 0;
pub const AV_PAIR_NB_COMPUTER_NAME: u16 = 1;
pub const AV_PAIR_NB_DOMAIN_NAME: u16 = 2;
pub const AV_PAIR_DNS_COMPUTER_NAME: u16 = 3;
pub const AV_PAIR_DNS_DOMAIN_NAME: u16 = 4;
pub const AV_PAIR_DNS_TREE_NAME: u16 = 5;
pub const AV_PAIR_FLAGS: u16 = 6;
pub const AV_PAIR_TIMESTAMP: u16 = 7;
pub const AV_PAIR_SINGLE_HOST: u16 = 8;
pub const AV_PAIR_TARGET_NAME: u16 = 9;
pub const AV_PAIR_CHANNEL_BINDINGS: u16 = 10;

pub const SINGLE_HOST_DATA_SIZE: usize = 48;

const AV_PAIR_HEADER_SIZE: usize = 4;
const AV_PAIR_FLAGS_SIZE: usize = 4;
const AV_PAIR_TIMESTAMP_SIZE: usize = 8;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MsvAvFlags: u32 {
        const CONSTRAINED_AUTHENTICATION = 0x0000_0001;
        const MESSAGE_INTEGRITY_CHECK = 0x0000_0002;
        const UNTRUSTED_SPN_SOURCE = 0x0000_0004;
    }
}

/// One entry of a target info list. Names are UTF-16LE encoded, as on the wire.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum AvPair {
    EOL,
    NbComputerName(Vec<u8>),
    NbDomainName(Vec<u8>),
    DnsComputerName(Vec<u8>),
    DnsDomainName(Vec<u8>),
    DnsTreeName(Vec<u8>),
    Flags(u32),
    Timestamp(u64),
    SingleHost([u8; SINGLE_HOST_DATA_SIZE]),
    TargetName(Vec<u8>),
    ChannelBindings([u8; HASH_SIZE]),
    Unknown { id: u16, value: Vec<u8> },
}

impl AvPair {
    pub fn as_u16(&self) -> u16 {
        match self {
            AvPair::EOL => AV_PAIR_EOL,
            AvPair::NbComputerName(_) => AV_PAIR_NB_COMPUTER_NAME,
            AvPair::NbDomainName(_) => AV_PAIR_NB_DOMAIN_NAME,
            AvPair::DnsComputerName(_) => AV_PAIR_DNS_COMPUTER_NAME,
            AvPair::DnsDomainName(_) => AV_PAIR_DNS_DOMAIN_NAME,
            AvPair::DnsTreeName(_) => AV_PAIR_DNS_TREE_NAME,
            AvPair::Flags(_) => AV_PAIR_FLAGS,
            AvPair::Timestamp(_) => AV_PAIR_TIMESTAMP,
            AvPair::SingleHost(_) => AV_PAIR_SINGLE_HOST,
            AvPair::TargetName(_) => AV_PAIR_TARGET_NAME,
            AvPair::ChannelBindings(_) => AV_PAIR_CHANNEL_BINDINGS,
            AvPair::Unknown { id, .. } => *id,
        }
    }

    /// Serializes the pairs in the given order. The caller is responsible for the trailing `EOL`.
    pub fn list_to_buffer(av_pairs: &[AvPair]) -> io::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        for av_pair in av_pairs {
            av_pair.write_to(&mut buffer)?;
        }

        Ok(buffer)
    }

    /// Parses a list up to and including its `EOL`. Bytes after the terminator are ignored.
    pub fn buffer_to_av_pairs(buffer: &[u8]) -> crate::Result<Vec<AvPair>> {
        let mut cursor = ReadCursor::new(buffer);
        let mut av_pairs = Vec::new();

        loop {
            if cursor.len() < AV_PAIR_HEADER_SIZE {
                return Err(Error::new(
                    ErrorKind::InvalidToken,
                    "AV pair list is not terminated by MsvAvEOL",
                ));
            }

            let av_pair = AvPair::read_from(&mut cursor)?;
            let is_eol = av_pair == AvPair::EOL;
            av_pairs.push(av_pair);

            if is_eol {
                break;
            }
        }

        Ok(av_pairs)
    }

    pub fn find(av_pairs: &[AvPair], id: u16) -> Option<&AvPair> {
        av_pairs.iter().find(|av_pair| av_pair.as_u16() == id)
    }

    fn read_from(cursor: &mut ReadCursor<'_>) -> crate::Result<AvPair> {
        let id = cursor.read_u16()?;
        let len = usize::from(cursor.read_u16()?);
        if len > cursor.len() {
            return Err(Error::new(
                ErrorKind::InvalidToken,
                format!(
                    "AV pair {} declares {} bytes but only {} bytes are left",
                    id,
                    len,
                    cursor.len()
                ),
            ));
        }
        let mut value = ReadCursor::new(cursor.read_slice(len)?);

        let av_pair = match id {
            AV_PAIR_EOL => {
                check_len(id, len, 0)?;
                AvPair::EOL
            }
            AV_PAIR_NB_COMPUTER_NAME => AvPair::NbComputerName(value.read_remaining().to_vec()),
            AV_PAIR_NB_DOMAIN_NAME => AvPair::NbDomainName(value.read_remaining().to_vec()),
            AV_PAIR_DNS_COMPUTER_NAME => AvPair::DnsComputerName(value.read_remaining().to_vec()),
            AV_PAIR_DNS_DOMAIN_NAME => AvPair::DnsDomainName(value.read_remaining().to_vec()),
            AV_PAIR_DNS_TREE_NAME => AvPair::DnsTreeName(value.read_remaining().to_vec()),
            AV_PAIR_FLAGS => {
                check_len(id, len, AV_PAIR_FLAGS_SIZE)?;
                AvPair::Flags(value.read_u32()?)
            }
            AV_PAIR_TIMESTAMP => {
                check_len(id, len, AV_PAIR_TIMESTAMP_SIZE)?;
                AvPair::Timestamp(value.read_u64()?)
            }
            AV_PAIR_SINGLE_HOST => {
                check_len(id, len, SINGLE_HOST_DATA_SIZE)?;
                AvPair::SingleHost(value.read_array::<SINGLE_HOST_DATA_SIZE>()?)
            }
            AV_PAIR_TARGET_NAME => AvPair::TargetName(value.read_remaining().to_vec()),
            AV_PAIR_CHANNEL_BINDINGS => {
                check_len(id, len, HASH_SIZE)?;
                AvPair::ChannelBindings(value.read_array::<HASH_SIZE>()?)
            }
            id => AvPair::Unknown {
                id,
                value: value.read_remaining().to_vec(),
            },
        };

        Ok(av_pair)
    }

    fn write_to(&self, mut buffer: impl io::Write) -> io::Result<()> {
        let value = match self {
            AvPair::EOL => Vec::new(),
            AvPair::NbComputerName(value)
            | AvPair::NbDomainName(value)
            | AvPair::DnsComputerName(value)
            | AvPair::DnsDomainName(value)
            | AvPair::DnsTreeName(value)
            | AvPair::TargetName(value)
            | AvPair::Unknown { value, .. } => value.clone(),
            AvPair::Flags(value) => value.to_le_bytes().to_vec(),
            AvPair::Timestamp(value) => value.to_le_bytes().to_vec(),
            AvPair::SingleHost(value) => value.to_vec(),
            AvPair::ChannelBindings(value) => value.to_vec(),
        };
        let len = u16::try_from(value.len()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("AV pair {} value of {} bytes is too long", self.as_u16(), value.len()),
            )
        })?;

        buffer.write_u16::<LittleEndian>(self.as_u16())?;
        buffer.write_u16::<LittleEndian>(len)?;
        buffer.write_all(&value)?;

        Ok(())
    }
}

fn check_len(id: u16, actual: usize, expected: usize) -> crate::Result<()> {
    if actual != expected {
        Err(Error::new(
            ErrorKind::InvalidToken,
            format!("AV pair {} must be {} bytes long, got {}", id, expected, actual),
        ))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn name() -> impl Strategy<Value = Vec<u8>> {
        proptest::collection::vec(any::<u8>(), 0..64)
    }

    fn any_av_pair() -> impl Strategy<Value = AvPair> {
        prop_oneof![
            name().prop_map(AvPair::NbComputerName),
            name().prop_map(AvPair::NbDomainName),
            name().prop_map(AvPair::DnsComputerName),
            name().prop_map(AvPair::DnsDomainName),
            name().prop_map(AvPair::DnsTreeName),
            any::<u32>().prop_map(AvPair::Flags),
            any::<u64>().prop_map(AvPair::Timestamp),
            any::<u8>().prop_map(|byte| AvPair::SingleHost([byte; SINGLE_HOST_DATA_SIZE])),
            name().prop_map(AvPair::TargetName),
            any::<[u8; HASH_SIZE]>().prop_map(AvPair::ChannelBindings),
            (11u16.., name()).prop_map(|(id, value)| AvPair::Unknown { id, value }),
        ]
    }

    proptest! {
        #[test]
        fn list_survives_encoding(mut av_pairs in proptest::collection::vec(any_av_pair(), 0..8)) {
            av_pairs.push(AvPair::EOL);

            let buffer = AvPair::list_to_buffer(&av_pairs).unwrap();

            prop_assert_eq!(AvPair::buffer_to_av_pairs(&buffer).unwrap(), av_pairs);
        }

        #[test]
        fn truncated_list_is_rejected(
            av_pairs in proptest::collection::vec(any_av_pair(), 1..8),
            cut in any::<prop::sample::Index>(),
        ) {
            let buffer = AvPair::list_to_buffer(&av_pairs).unwrap();
            let truncated = &buffer[..cut.index(buffer.len())];

            prop_assert_eq!(
                AvPair::buffer_to_av_pairs(truncated).unwrap_err().error_type,
                ErrorKind::InvalidToken
            );
        }
    }

    #[test]
    fn encodes_challenge_style_list() {
        let av_pairs = [
            AvPair::NbDomainName(vec![0x44, 0x00]),
            AvPair::Timestamp(0x01cf_8b07_b1bd_5733),
            AvPair::EOL,
        ];

        assert_eq!(
            AvPair::list_to_buffer(&av_pairs).unwrap(),
            [
                0x02, 0x00, 0x02, 0x00, 0x44, 0x00, // NbDomainName "D"
                0x07, 0x00, 0x08, 0x00, 0x33, 0x57, 0xbd, 0xb1, 0x07, 0x8b, 0xcf, 0x01, // Timestamp
                0x00, 0x00, 0x00, 0x00, // EOL
            ]
        );
    }

    #[test]
    fn ignores_bytes_after_eol() {
        let buffer = [0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff];

        assert_eq!(AvPair::buffer_to_av_pairs(&buffer).unwrap(), vec![AvPair::EOL]);
    }

    #[test]
    fn rejects_pair_overflowing_buffer() {
        // NbComputerName declaring 16 bytes with 2 available
        let buffer = [0x01, 0x00, 0x10, 0x00, 0x41, 0x00];

        assert_eq!(
            AvPair::buffer_to_av_pairs(&buffer).unwrap_err().error_type,
            ErrorKind::InvalidToken
        );
    }

    #[test]
    fn rejects_missing_eol() {
        let buffer = AvPair::list_to_buffer(&[AvPair::Flags(2)]).unwrap();

        assert_eq!(
            AvPair::buffer_to_av_pairs(&buffer).unwrap_err().error_type,
            ErrorKind::InvalidToken
        );
    }

    #[test]
    fn rejects_wrong_fixed_length() {
        let buffer = [0x06, 0x00, 0x02, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00];

        assert_eq!(
            AvPair::buffer_to_av_pairs(&buffer).unwrap_err().error_type,
            ErrorKind::InvalidToken
        );
    }

    #[test]
    fn finds_pair_by_id() {
        let av_pairs = [AvPair::Flags(2), AvPair::Timestamp(5), AvPair::EOL];

        assert_eq!(
            AvPair::find(&av_pairs, AV_PAIR_TIMESTAMP),
            Some(&AvPair::Timestamp(5))
        );
        assert_eq!(AvPair::find(&av_pairs, AV_PAIR_TARGET_NAME), None);
    }
}
