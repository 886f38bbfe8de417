use crate::{Error, ErrorKind, Result};

pub fn string_to_utf16(value: impl AsRef<str>) -> Vec<u8> {
    value
        .as_ref()
        .encode_utf16()
        .flat_map(|i| i.to_le_bytes())
        .collect::<Vec<u8>>()
}

pub fn bytes_to_utf16_string(value: &[u8]) -> Result<String> {
    if value.len() % 2 != 0 {
        return Err(Error::new(
            ErrorKind::InvalidToken,
            format!("UTF-16 buffer has an odd length: {}", value.len()),
        ));
    }

    let value_u16 = value
        .chunks_exact(2)
        .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
        .collect::<Vec<u16>>();

    Ok(String::from_utf16(&value_u16)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16_round_trip() {
        let encoded = string_to_utf16("HTTP/rw.local");

        assert_eq!(&encoded[..4], &[b'H', 0x00, b'T', 0x00]);
        assert_eq!(bytes_to_utf16_string(&encoded).unwrap(), "HTTP/rw.local");
    }

    #[test]
    fn odd_length_is_invalid_token() {
        assert_eq!(
            bytes_to_utf16_string(&[0x41, 0x00, 0x42]).unwrap_err().error_type,
            ErrorKind::InvalidToken
        );
    }

    #[test]
    fn unpaired_surrogate_is_invalid_token() {
        assert_eq!(
            bytes_to_utf16_string(&[0x00, 0xd8]).unwrap_err().error_type,
            ErrorKind::InvalidToken
        );
    }
}
