use super::{NtlmAccounts, DEFAULT_NTLM_VERSION, NTLM_VERSION_SIZE};
use crate::negotiate::{NegotiatedProtocol, ProtocolConfig};
use crate::{Ntlm, Result};

/// Knobs of the NTLM mechanism. The defaults produce an NTLMv2 exchange with a MIC and extended protection.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NtlmConfig {
    /// NetBIOS name of this machine. Sent as the Workstation field by the client and used as the computer
    /// name in the server's target info.
    pub workstation: Option<String>,
    /// Server side TargetName. Falls back to `workstation` when not set.
    pub target_name: Option<String>,
    /// Adds the 56-bit, LM key, OEM and VERSION flags to the Negotiate message and implies `use_mic`.
    pub ntlm_v2: bool,
    /// Only has an effect without `ntlm_v2`. The MIC is sent only when the challenge carries a timestamp.
    pub use_mic: bool,
    /// Requests the VERSION block in the Negotiate message. The Authenticate message carries it only with
    /// `ntlm_v2`.
    pub send_version_info: bool,
    pub send_single_host_data: bool,
    pub send_workstation_name: bool,
    /// Skips the ChannelBindings and TargetName AV pairs.
    pub suppress_extended_protection: bool,
    /// Below 2 the LM challenge response is sent zero-filled.
    pub lm_compatibility_level: u32,
    pub version: [u8; NTLM_VERSION_SIZE],
    /// Server side account store, used when the acceptor credentials carry no password.
    pub accounts: Option<NtlmAccounts>,
}

impl NtlmConfig {
    pub fn new(workstation: String) -> Self {
        Self {
            workstation: Some(workstation),
            ..Default::default()
        }
    }
}

impl Default for NtlmConfig {
    fn default() -> Self {
        Self {
            workstation: None,
            target_name: None,
            ntlm_v2: true,
            use_mic: true,
            send_version_info: true,
            send_single_host_data: false,
            send_workstation_name: true,
            suppress_extended_protection: false,
            lm_compatibility_level: 3,
            version: DEFAULT_NTLM_VERSION,
            accounts: None,
        }
    }
}

impl ProtocolConfig for NtlmConfig {
    fn new_instance(&self) -> Result<NegotiatedProtocol> {
        Ok(NegotiatedProtocol::Ntlm(Ntlm::with_config(Clone::clone(self))))
    }

    fn box_clone(&self) -> Box<dyn ProtocolConfig> {
        Box::new(Clone::clone(self))
    }
}
