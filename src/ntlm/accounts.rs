use std::collections::HashMap;
use std::fmt;

use super::NtlmHash;

/// NT hashes of the accounts an NTLM server accepts when its own credentials carry no password.
///
/// Names are matched case-insensitively. An account added without a domain matches the user in any domain,
/// but an entry for the exact domain wins.
///
/// ```
/// use rdp_sspi::ntlm::NtlmAccounts;
/// use rdp_sspi::NtlmHash;
///
/// let mut accounts = NtlmAccounts::new();
/// accounts.insert("Administrator", Some("CORP"), NtlmHash::from_password("P4ss123!"));
///
/// assert!(accounts.lookup("administrator", "corp").is_some());
/// assert!(accounts.lookup("administrator", "OTHER").is_none());
/// ```
#[derive(Clone, Default, Eq, PartialEq)]
pub struct NtlmAccounts {
    entries: HashMap<(String, String), NtlmHash>,
}

impl NtlmAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, user: &str, domain: Option<&str>, nt_hash: NtlmHash) -> &mut Self {
        self.entries.insert(key(user, domain.unwrap_or_default()), nt_hash);

        self
    }

    /// Finds the hash of `user` in `domain`, then of `user` added without a domain.
    pub fn lookup(&self, user: &str, domain: &str) -> Option<NtlmHash> {
        self.entries
            .get(&key(user, domain))
            .or_else(|| self.entries.get(&key(user, "")))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn key(user: &str, domain: &str) -> (String, String) {
    (user.to_uppercase(), domain.to_uppercase())
}

impl fmt::Debug for NtlmAccounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NtlmAccounts")
            .field("len", &self.entries.len())
            .finish()
    }
}
