use std::fmt::{self, Write as _};

use crate::crypto::{compute_md4, HASH_SIZE};
use crate::utils;

/// Marks a password field that carries an NT hash instead of a password.
pub const NTLM_HASH_PREFIX: &str = "$NTLM$:";

/// The NT hash (MD4 of the UTF-16LE password) of an account.
///
/// Knowing the NT hash is enough to answer an NTLM challenge, so a client can authenticate without the
/// clear-text password:
///
/// ```
/// use rdp_sspi::{AuthIdentityBuffers, NtlmHash};
///
/// let hash = "d5922a65c4d5c082ca444af1be0001db".parse::<NtlmHash>().unwrap();
/// let credentials = AuthIdentityBuffers::from_utf8_with_hash("Username", "Domain", &hash);
///
/// assert_eq!(hash, NtlmHash::from_password("P4ss123!"));
/// assert!(!credentials.is_empty());
/// ```
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct NtlmHash([u8; HASH_SIZE]);

impl NtlmHash {
    #[inline]
    pub fn from_bytes(hash: [u8; HASH_SIZE]) -> Self {
        Self(hash)
    }

    /// Computes the NT hash of a clear-text password.
    pub fn from_password(password: &str) -> Self {
        Self(compute_md4(&utils::string_to_utf16(password)))
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Encodes the hash the way it travels inside a password field: the prefix followed by 32 hex digits.
    pub(crate) fn as_sspi_password(&self) -> String {
        self.0
            .iter()
            .fold(String::from(NTLM_HASH_PREFIX), |mut password, byte| {
                let _ = write!(password, "{byte:02x}");
                password
            })
    }
}

// Never print the hash itself.
impl fmt::Debug for NtlmHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NtlmHash")
    }
}

impl From<[u8; HASH_SIZE]> for NtlmHash {
    fn from(value: [u8; HASH_SIZE]) -> Self {
        NtlmHash(value)
    }
}

impl std::str::FromStr for NtlmHash {
    type Err = NtlmHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NtlmHash::try_from(s)
    }
}

impl TryFrom<&str> for NtlmHash {
    type Error = NtlmHashError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.len() != HASH_SIZE * 2 {
            return Err(NtlmHashError::StringLength);
        }

        let mut hash = [0u8; HASH_SIZE];
        for (i, byte) in hash.iter_mut().enumerate() {
            let hex_byte = value.get(i * 2..i * 2 + 2).ok_or(NtlmHashError::Hex)?;
            *byte = u8::from_str_radix(hex_byte, 16).map_err(|_| NtlmHashError::Hex)?;
        }

        Ok(NtlmHash(hash))
    }
}

impl TryFrom<&[u8]> for NtlmHash {
    type Error = NtlmHashError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let hash: [u8; HASH_SIZE] = value.try_into().map_err(|_| NtlmHashError::ByteLength)?;

        Ok(NtlmHash(hash))
    }
}

/// Errors that can occur when parsing or creating an NT hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NtlmHashError {
    /// Invalid string length for NTLM hash (must be 32-character hex string).
    StringLength,
    /// Invalid byte length for NTLM hash (must be 16 bytes).
    ByteLength,
    /// Invalid hex string.
    Hex,
}

impl std::error::Error for NtlmHashError {}

impl fmt::Display for NtlmHashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NtlmHashError::StringLength => {
                write!(f, "invalid length: expected 32-character hex string for NTLM hash")
            }
            NtlmHashError::ByteLength => write!(f, "invalid length: expected 16 bytes for NTLM hash"),
            NtlmHashError::Hex => write!(f, "invalid hex string for NTLM hash"),
        }
    }
}
