pub(crate) mod client;
mod config;
pub(crate) mod server;

use std::sync::LazyLock;

pub use config::{KerberosAvailability, NegotiateConfig, ProtocolConfig};

use crate::ntlm::NtlmConfig;
use crate::{
    builders, kerberos, ntlm, AcceptSecurityContextResult, AcquireCredentialsHandleResult, AuthIdentity,
    AuthIdentityBuffers, ContextNames, ContextSizes, CredentialUse, DecryptionFlags, EncryptionFlags, Error,
    ErrorKind, InitializeSecurityContextResult, KerberosMechanism, Ntlm, PackageCapabilities, PackageInfo, Result,
    SecurityBuffer, SecurityPackageType, SecurityStatus, SessionKeys, Sspi, SspiImpl, PACKAGE_ID_NONE,
};

pub const PKG_NAME: &str = "Negotiate";

pub static PACKAGE_INFO: LazyLock<PackageInfo> = LazyLock::new(|| PackageInfo {
    capabilities: PackageCapabilities::empty(),
    version: 1,
    rpc_id: PACKAGE_ID_NONE,
    max_token_len: 0xbb80, // 48 000 bytes: default maximum token len in Windows
    name: SecurityPackageType::Negotiate,
    comment: String::from("Microsoft Package Negotiator"),
});

#[derive(Debug)]
pub enum NegotiatedProtocol {
    Kerberos(Box<dyn KerberosMechanism>),
    Ntlm(Ntlm),
}

impl NegotiatedProtocol {
    pub fn protocol_name(&self) -> &str {
        match self {
            NegotiatedProtocol::Kerberos(_) => kerberos::PKG_NAME,
            NegotiatedProtocol::Ntlm(_) => ntlm::PKG_NAME,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum NegotiateState {
    #[default]
    Initial,
    /// The first token went through the selected mechanism.
    NegoInit,
    /// Later legs of the selected mechanism.
    NegoResp,
    Final,
}

#[derive(Debug)]
struct PackageListConfig {
    ntlm: bool,
    kerberos: bool,
}

/// Picks Kerberos when it is configured and available, and falls back to NTLM when Kerberos has no credentials
/// for the user.
///
/// Once a mechanism produced its first token, every call is delegated to it for the rest of the context's life.
#[derive(Debug)]
pub struct Negotiate {
    state: NegotiateState,
    protocol: NegotiatedProtocol,
    protocol_config: Box<dyn ProtocolConfig>,
    ntlm_config: NtlmConfig,
    package_list: Option<String>,
    kerberos_availability: KerberosAvailability,
}

impl Negotiate {
    pub fn new(config: NegotiateConfig) -> Result<Self> {
        let protocol = config.protocol_config.new_instance()?;
        let mut negotiate = Negotiate {
            state: NegotiateState::Initial,
            protocol,
            protocol_config: config.protocol_config,
            ntlm_config: config.ntlm_config,
            package_list: config.package_list,
            kerberos_availability: config.kerberos_availability,
        };

        if let Some(filtered_protocol) = negotiate.filter_protocol()? {
            negotiate.protocol = filtered_protocol;
        }

        Ok(negotiate)
    }

    pub fn negotiated_protocol(&self) -> &NegotiatedProtocol {
        &self.protocol
    }

    pub fn kerberos_availability(&self) -> &KerberosAvailability {
        &self.kerberos_availability
    }

    fn protocol_name(&self) -> &str {
        self.protocol.protocol_name()
    }

    fn parse_package_list_config(package_list: &Option<String>) -> PackageListConfig {
        let mut ntlm: bool = true;
        let mut kerberos: bool = true;

        if let Some(package_list) = &package_list {
            for package in package_list.split(',').map(str::trim).filter(|package| !package.is_empty()) {
                let (package_name, enabled) = if let Some(package_name) = package.strip_prefix('!') {
                    (package_name.to_lowercase(), false)
                } else {
                    let package_name = package.to_lowercase();
                    (package_name, true)
                };

                match package_name.as_str() {
                    "ntlm" => ntlm = enabled,
                    "kerberos" => kerberos = enabled,
                    _ => warn!("unexpected package name: {}", &package_name),
                }
            }
        }

        PackageListConfig { ntlm, kerberos }
    }

    /// Replaces the configured mechanism when the package list or the Kerberos availability rule it out.
    fn filter_protocol(&self) -> Result<Option<NegotiatedProtocol>> {
        let PackageListConfig {
            ntlm: is_ntlm,
            kerberos: is_kerberos,
        } = Self::parse_package_list_config(&self.package_list);

        match &self.protocol {
            NegotiatedProtocol::Kerberos(_) => {
                if !is_kerberos || !self.kerberos_availability.is_available() {
                    if !is_ntlm {
                        return Err(Error::new(
                            ErrorKind::NoCredentials,
                            "Kerberos is not available and NTLM is disabled in package_list",
                        ));
                    }

                    debug!(is_kerberos, "Negotiate: Kerberos is not usable, select the NTLM");

                    return Ok(Some(self.new_ntlm()));
                }
            }
            NegotiatedProtocol::Ntlm(_) => {
                if !is_ntlm {
                    error!(
                        package_list = ?self.package_list,
                        "NTLM protocol has been configured but it is disabled in package_list."
                    );

                    return Err(Error::new(
                        ErrorKind::InvalidParameter,
                        "NTLM protocol has been configured but it is disabled in package_list",
                    ));
                }
            }
        }

        Ok(None)
    }

    fn new_ntlm(&self) -> NegotiatedProtocol {
        NegotiatedProtocol::Ntlm(Ntlm::with_config(self.ntlm_config.clone()))
    }

    fn can_fall_back_to_ntlm(&self) -> bool {
        Self::parse_package_list_config(&self.package_list).ntlm
    }

    fn is_kerberos_enabled(&self) -> bool {
        Self::parse_package_list_config(&self.package_list).kerberos && self.kerberos_availability.is_available()
    }

    /// Tears the Kerberos context down and remembers that Kerberos has no credentials.
    fn fall_back_to_ntlm(&mut self) {
        warn!("Negotiate: Fall back to the NTLM");

        self.kerberos_availability.mark_unavailable();
        self.protocol = self.new_ntlm();
    }

    fn advance(&mut self, status: SecurityStatus) {
        self.state = match (self.state, status) {
            (_, SecurityStatus::Ok) => NegotiateState::Final,
            (NegotiateState::Initial, _) => NegotiateState::NegoInit,
            (NegotiateState::NegoInit, _) => NegotiateState::NegoResp,
            (state, _) => state,
        };
    }
}

impl SspiImpl for Negotiate {
    type CredentialsHandle = Option<AuthIdentityBuffers>;
    type AuthenticationData = AuthIdentity;

    #[instrument(ret, level = "debug", fields(protocol = self.protocol.protocol_name()), skip_all)]
    fn acquire_credentials_handle_impl(
        &mut self,
        builder: builders::FilledAcquireCredentialsHandle<'_, Self::CredentialsHandle, Self::AuthenticationData>,
    ) -> Result<AcquireCredentialsHandleResult<Self::CredentialsHandle>> {
        if builder.credential_use == CredentialUse::Outbound && builder.auth_data.is_none() {
            return Err(Error::new(
                ErrorKind::NoCredentials,
                "The client must specify the auth data",
            ));
        }

        match &mut self.protocol {
            NegotiatedProtocol::Kerberos(kerberos) => kerberos.acquire_credentials_handle_impl(builder),
            NegotiatedProtocol::Ntlm(ntlm) => ntlm.acquire_credentials_handle_impl(builder),
        }
    }

    #[instrument(ret, level = "debug", fields(protocol = self.protocol.protocol_name(), state = ?self.state), skip_all)]
    fn initialize_security_context_impl(
        &mut self,
        builder: &mut builders::FilledInitializeSecurityContext<'_, Self::CredentialsHandle>,
    ) -> Result<InitializeSecurityContextResult> {
        client::initialize_security_context(self, builder)
    }

    #[instrument(ret, level = "debug", fields(protocol = self.protocol.protocol_name(), state = ?self.state), skip_all)]
    fn accept_security_context_impl(
        &mut self,
        builder: builders::FilledAcceptSecurityContext<'_, Self::CredentialsHandle>,
    ) -> Result<AcceptSecurityContextResult> {
        server::accept_security_context(self, builder)
    }
}

impl Sspi for Negotiate {
    #[instrument(ret, level = "debug", fields(protocol = self.protocol.protocol_name()), skip_all)]
    fn complete_auth_token(&mut self, token: &mut [SecurityBuffer]) -> Result<SecurityStatus> {
        match &mut self.protocol {
            NegotiatedProtocol::Kerberos(kerberos) => kerberos.complete_auth_token(token),
            NegotiatedProtocol::Ntlm(ntlm) => ntlm.complete_auth_token(token),
        }
    }

    #[instrument(ret, level = "debug", fields(protocol = self.protocol.protocol_name()), skip_all)]
    fn encrypt_message(
        &mut self,
        flags: EncryptionFlags,
        message: &mut [SecurityBuffer],
        sequence_number: u32,
    ) -> Result<SecurityStatus> {
        match &mut self.protocol {
            NegotiatedProtocol::Kerberos(kerberos) => kerberos.encrypt_message(flags, message, sequence_number),
            NegotiatedProtocol::Ntlm(ntlm) => ntlm.encrypt_message(flags, message, sequence_number),
        }
    }

    #[instrument(ret, level = "debug", fields(protocol = self.protocol.protocol_name()), skip_all)]
    fn decrypt_message(&mut self, message: &mut [SecurityBuffer], sequence_number: u32) -> Result<DecryptionFlags> {
        match &mut self.protocol {
            NegotiatedProtocol::Kerberos(kerberos) => kerberos.decrypt_message(message, sequence_number),
            NegotiatedProtocol::Ntlm(ntlm) => ntlm.decrypt_message(message, sequence_number),
        }
    }

    fn make_signature(&mut self, flags: u32, message: &mut [SecurityBuffer], sequence_number: u32) -> Result<()> {
        match &mut self.protocol {
            NegotiatedProtocol::Kerberos(kerberos) => kerberos.make_signature(flags, message, sequence_number),
            NegotiatedProtocol::Ntlm(ntlm) => ntlm.make_signature(flags, message, sequence_number),
        }
    }

    fn verify_signature(&mut self, message: &mut [SecurityBuffer], sequence_number: u32) -> Result<u32> {
        match &mut self.protocol {
            NegotiatedProtocol::Kerberos(kerberos) => kerberos.verify_signature(message, sequence_number),
            NegotiatedProtocol::Ntlm(ntlm) => ntlm.verify_signature(message, sequence_number),
        }
    }

    #[instrument(ret, level = "debug", fields(protocol = self.protocol.protocol_name()), skip_all)]
    fn query_context_sizes(&mut self) -> Result<ContextSizes> {
        match &mut self.protocol {
            NegotiatedProtocol::Kerberos(kerberos) => kerberos.query_context_sizes(),
            NegotiatedProtocol::Ntlm(ntlm) => ntlm.query_context_sizes(),
        }
    }

    #[instrument(ret, level = "debug", fields(protocol = self.protocol.protocol_name()), skip_all)]
    fn query_context_names(&mut self) -> Result<ContextNames> {
        match &mut self.protocol {
            NegotiatedProtocol::Kerberos(kerberos) => kerberos.query_context_names(),
            NegotiatedProtocol::Ntlm(ntlm) => ntlm.query_context_names(),
        }
    }

    #[instrument(ret, level = "debug", fields(protocol = self.protocol.protocol_name()), skip_all)]
    fn query_context_package_info(&mut self) -> Result<PackageInfo> {
        match &mut self.protocol {
            NegotiatedProtocol::Kerberos(kerberos) => kerberos.query_context_package_info(),
            NegotiatedProtocol::Ntlm(ntlm) => ntlm.query_context_package_info(),
        }
    }

    #[instrument(fields(protocol = self.protocol.protocol_name()), skip_all)]
    fn query_context_session_key(&self) -> Result<SessionKeys> {
        match &self.protocol {
            NegotiatedProtocol::Kerberos(kerberos) => kerberos.query_context_session_key(),
            NegotiatedProtocol::Ntlm(ntlm) => ntlm.query_context_session_key(),
        }
    }
}
