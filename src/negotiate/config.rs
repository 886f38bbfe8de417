use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

use crate::ntlm::NtlmConfig;
use crate::{NegotiatedProtocol, Result};

/// Factory of the mechanism a [`Negotiate`](crate::Negotiate) context tries first.
pub trait ProtocolConfig: Debug + Send + Sync {
    fn new_instance(&self) -> Result<NegotiatedProtocol>;
    fn box_clone(&self) -> Box<dyn ProtocolConfig>;
}

#[derive(Debug)]
pub struct NegotiateConfig {
    pub protocol_config: Box<dyn ProtocolConfig>,
    /// Configuration of the NTLM context used when Kerberos is not available.
    pub ntlm_config: NtlmConfig,
    /// package_list format, "kerberos,!ntlm"
    pub package_list: Option<String>,
    pub kerberos_availability: KerberosAvailability,
}

impl NegotiateConfig {
    pub fn new(
        protocol_config: Box<dyn ProtocolConfig>,
        ntlm_config: NtlmConfig,
        package_list: Option<String>,
        kerberos_availability: KerberosAvailability,
    ) -> Self {
        Self {
            protocol_config,
            ntlm_config,
            package_list,
            kerberos_availability,
        }
    }

    /// Negotiates with the process-wide Kerberos availability and every package enabled.
    pub fn from_protocol_config(protocol_config: Box<dyn ProtocolConfig>, ntlm_config: NtlmConfig) -> Self {
        Self {
            protocol_config,
            ntlm_config,
            package_list: None,
            kerberos_availability: KerberosAvailability::global(),
        }
    }
}

impl Clone for NegotiateConfig {
    fn clone(&self) -> Self {
        Self {
            protocol_config: self.protocol_config.box_clone(),
            ntlm_config: self.ntlm_config.clone(),
            package_list: self.package_list.clone(),
            kerberos_availability: self.kerberos_availability.clone(),
        }
    }
}

static GLOBAL_KERBEROS_AVAILABILITY: LazyLock<KerberosAvailability> = LazyLock::new(KerberosAvailability::new);

/// Remembers that Kerberos failed for lack of credentials, so that later Negotiate contexts sharing this
/// handle go straight to NTLM.
///
/// Clones share the same flag. Once marked unavailable, the flag is never reset by this crate.
///
/// A context that marks the flag does it with `Release` ordering and the check uses `Acquire`: a context
/// created after the store was observed selects NTLM without touching Kerberos.
#[derive(Debug, Clone, Default)]
pub struct KerberosAvailability {
    unavailable: Arc<AtomicBool>,
}

impl KerberosAvailability {
    pub fn new() -> Self {
        Self::default()
    }

    /// The flag shared by the whole process.
    pub fn global() -> Self {
        GLOBAL_KERBEROS_AVAILABILITY.clone()
    }

    pub fn is_available(&self) -> bool {
        !self.unavailable.load(Ordering::Acquire)
    }

    pub fn mark_unavailable(&self) {
        self.unavailable.store(true, Ordering::Release);
    }
}
