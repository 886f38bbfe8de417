use crate::builders::{FilledAcceptSecurityContext, FilledAcquireCredentialsHandle, FilledInitializeSecurityContext};
use crate::{
    kerberos, negotiate, ntlm, AcceptSecurityContextResult, AcquireCredentialsHandleResult, AuthIdentity,
    AuthIdentityBuffers, ContextNames, ContextSizes, DecryptionFlags, EncryptionFlags,
    InitializeSecurityContextResult, KerberosMechanism, Negotiate, Ntlm, PackageInfo, Result, SecurityBuffer,
    SecurityStatus, SessionKeys, Sspi, SspiImpl,
};

/// Any security context this crate can drive, selected at runtime by package name.
#[derive(Debug)]
#[allow(clippy::large_enum_variant)]
pub enum SspiContext {
    Ntlm(Ntlm),
    Kerberos(Box<dyn KerberosMechanism>),
    Negotiate(Negotiate),
}

impl SspiContext {
    pub fn package_name(&self) -> &str {
        match self {
            SspiContext::Ntlm(_) => ntlm::PKG_NAME,
            SspiContext::Kerberos(_) => kerberos::PKG_NAME,
            SspiContext::Negotiate(_) => negotiate::PKG_NAME,
        }
    }
}

impl From<Ntlm> for SspiContext {
    fn from(ntlm: Ntlm) -> Self {
        SspiContext::Ntlm(ntlm)
    }
}

impl From<Negotiate> for SspiContext {
    fn from(negotiate: Negotiate) -> Self {
        SspiContext::Negotiate(negotiate)
    }
}

impl SspiImpl for SspiContext {
    type CredentialsHandle = Option<AuthIdentityBuffers>;
    type AuthenticationData = AuthIdentity;

    #[instrument(ret, fields(security_package = self.package_name()), skip_all)]
    fn acquire_credentials_handle_impl(
        &mut self,
        builder: FilledAcquireCredentialsHandle<'_, Self::CredentialsHandle, Self::AuthenticationData>,
    ) -> Result<AcquireCredentialsHandleResult<Self::CredentialsHandle>> {
        match self {
            SspiContext::Ntlm(ntlm) => builder.execute(ntlm),
            SspiContext::Kerberos(kerberos) => builder.execute(kerberos.as_mut()),
            SspiContext::Negotiate(negotiate) => builder.execute(negotiate),
        }
    }

    #[instrument(ret, fields(security_package = self.package_name()), skip_all)]
    fn initialize_security_context_impl(
        &mut self,
        builder: &mut FilledInitializeSecurityContext<'_, Self::CredentialsHandle>,
    ) -> Result<InitializeSecurityContextResult> {
        match self {
            SspiContext::Ntlm(ntlm) => ntlm.initialize_security_context_impl(builder),
            SspiContext::Kerberos(kerberos) => kerberos.initialize_security_context_impl(builder),
            SspiContext::Negotiate(negotiate) => negotiate.initialize_security_context_impl(builder),
        }
    }

    #[instrument(ret, fields(security_package = self.package_name()), skip_all)]
    fn accept_security_context_impl(
        &mut self,
        builder: FilledAcceptSecurityContext<'_, Self::CredentialsHandle>,
    ) -> Result<AcceptSecurityContextResult> {
        match self {
            SspiContext::Ntlm(ntlm) => builder.execute(ntlm),
            SspiContext::Kerberos(kerberos) => builder.execute(kerberos.as_mut()),
            SspiContext::Negotiate(negotiate) => builder.execute(negotiate),
        }
    }
}

impl Sspi for SspiContext {
    #[instrument(ret, fields(security_package = self.package_name()), skip_all)]
    fn complete_auth_token(&mut self, token: &mut [SecurityBuffer]) -> Result<SecurityStatus> {
        match self {
            SspiContext::Ntlm(ntlm) => ntlm.complete_auth_token(token),
            SspiContext::Kerberos(kerberos) => kerberos.complete_auth_token(token),
            SspiContext::Negotiate(negotiate) => negotiate.complete_auth_token(token),
        }
    }

    #[instrument(ret, fields(security_package = self.package_name()), skip(self, message))]
    fn encrypt_message(
        &mut self,
        flags: EncryptionFlags,
        message: &mut [SecurityBuffer],
        sequence_number: u32,
    ) -> Result<SecurityStatus> {
        match self {
            SspiContext::Ntlm(ntlm) => ntlm.encrypt_message(flags, message, sequence_number),
            SspiContext::Kerberos(kerberos) => kerberos.encrypt_message(flags, message, sequence_number),
            SspiContext::Negotiate(negotiate) => negotiate.encrypt_message(flags, message, sequence_number),
        }
    }

    #[instrument(ret, fields(security_package = self.package_name()), skip(self, message))]
    fn decrypt_message(&mut self, message: &mut [SecurityBuffer], sequence_number: u32) -> Result<DecryptionFlags> {
        match self {
            SspiContext::Ntlm(ntlm) => ntlm.decrypt_message(message, sequence_number),
            SspiContext::Kerberos(kerberos) => kerberos.decrypt_message(message, sequence_number),
            SspiContext::Negotiate(negotiate) => negotiate.decrypt_message(message, sequence_number),
        }
    }

    fn make_signature(&mut self, flags: u32, message: &mut [SecurityBuffer], sequence_number: u32) -> Result<()> {
        match self {
            SspiContext::Ntlm(ntlm) => ntlm.make_signature(flags, message, sequence_number),
            SspiContext::Kerberos(kerberos) => kerberos.make_signature(flags, message, sequence_number),
            SspiContext::Negotiate(negotiate) => negotiate.make_signature(flags, message, sequence_number),
        }
    }

    fn verify_signature(&mut self, message: &mut [SecurityBuffer], sequence_number: u32) -> Result<u32> {
        match self {
            SspiContext::Ntlm(ntlm) => ntlm.verify_signature(message, sequence_number),
            SspiContext::Kerberos(kerberos) => kerberos.verify_signature(message, sequence_number),
            SspiContext::Negotiate(negotiate) => negotiate.verify_signature(message, sequence_number),
        }
    }

    #[instrument(ret, fields(security_package = self.package_name()), skip_all)]
    fn query_context_sizes(&mut self) -> Result<ContextSizes> {
        match self {
            SspiContext::Ntlm(ntlm) => ntlm.query_context_sizes(),
            SspiContext::Kerberos(kerberos) => kerberos.query_context_sizes(),
            SspiContext::Negotiate(negotiate) => negotiate.query_context_sizes(),
        }
    }

    #[instrument(ret, fields(security_package = self.package_name()), skip_all)]
    fn query_context_names(&mut self) -> Result<ContextNames> {
        match self {
            SspiContext::Ntlm(ntlm) => ntlm.query_context_names(),
            SspiContext::Kerberos(kerberos) => kerberos.query_context_names(),
            SspiContext::Negotiate(negotiate) => negotiate.query_context_names(),
        }
    }

    #[instrument(ret, fields(security_package = self.package_name()), skip_all)]
    fn query_context_package_info(&mut self) -> Result<PackageInfo> {
        match self {
            SspiContext::Ntlm(ntlm) => ntlm.query_context_package_info(),
            SspiContext::Kerberos(kerberos) => kerberos.query_context_package_info(),
            SspiContext::Negotiate(negotiate) => negotiate.query_context_package_info(),
        }
    }

    #[instrument(fields(security_package = self.package_name()), skip_all)]
    fn query_context_session_key(&self) -> Result<SessionKeys> {
        match self {
            SspiContext::Ntlm(ntlm) => ntlm.query_context_session_key(),
            SspiContext::Kerberos(kerberos) => kerberos.query_context_session_key(),
            SspiContext::Negotiate(negotiate) => negotiate.query_context_session_key(),
        }
    }
}
