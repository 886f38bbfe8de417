use std::marker::PhantomData;

use time::OffsetDateTime;

use super::{ArgumentState, Missing, Provided};
use crate::{ClientRequestFlags, ClientResponseFlags, SecurityBuffer, SecurityStatus, SspiImpl};

pub type EmptyInitializeSecurityContext<'a, C> = InitializeSecurityContext<'a, C, Missing, Missing>;
pub type FilledInitializeSecurityContext<'a, C> = InitializeSecurityContext<'a, C, Provided, Provided>;

/// Outcome of one client handshake step.
#[derive(Debug, Clone)]
pub struct InitializeSecurityContextResult {
    pub status: SecurityStatus,
    pub flags: ClientResponseFlags,
    pub expiry: Option<OffsetDateTime>,
}

/// Arguments of one `initialize_security_context` call.
///
/// `execute` needs [`with_credentials_handle`](Self::with_credentials_handle) and
/// [`with_output`](Self::with_output). Everything else is optional.
#[derive(Debug)]
pub struct InitializeSecurityContext<'a, CredsHandle, CredsHandleState, OutputState>
where
    CredsHandleState: ArgumentState,
    OutputState: ArgumentState,
{
    state: PhantomData<(CredsHandleState, OutputState)>,

    pub credentials_handle: Option<&'a mut CredsHandle>,
    pub output: &'a mut [SecurityBuffer],

    pub context_requirements: ClientRequestFlags,
    pub target_name: Option<&'a str>,
    pub input: Option<&'a mut [SecurityBuffer]>,
}

impl<'a, CredsHandle, CredsHandleState, OutputState>
    InitializeSecurityContext<'a, CredsHandle, CredsHandleState, OutputState>
where
    CredsHandleState: ArgumentState,
    OutputState: ArgumentState,
{
    pub fn new() -> Self {
        Self {
            state: PhantomData,
            credentials_handle: None,
            output: &mut [],
            context_requirements: ClientRequestFlags::empty(),
            target_name: None,
            input: None,
        }
    }

    fn transition<C: ArgumentState, O: ArgumentState>(self) -> InitializeSecurityContext<'a, CredsHandle, C, O> {
        InitializeSecurityContext {
            state: PhantomData,
            credentials_handle: self.credentials_handle,
            output: self.output,
            context_requirements: self.context_requirements,
            target_name: self.target_name,
            input: self.input,
        }
    }

    /// The handle returned by `acquire_credentials_handle` with `CredentialUse::Outbound`.
    pub fn with_credentials_handle(
        self,
        credentials_handle: &'a mut CredsHandle,
    ) -> InitializeSecurityContext<'a, CredsHandle, Provided, OutputState> {
        let mut builder = self.transition();
        builder.credentials_handle = Some(credentials_handle);

        builder
    }

    /// Buffers that receive the token for the server. The `Token` buffer is grown as needed.
    pub fn with_output(
        self,
        output: &'a mut [SecurityBuffer],
    ) -> InitializeSecurityContext<'a, CredsHandle, CredsHandleState, Provided> {
        let mut builder = self.transition();
        builder.output = output;

        builder
    }

    pub fn with_context_requirements(self, context_requirements: ClientRequestFlags) -> Self {
        Self {
            context_requirements,
            ..self
        }
    }

    /// Service principal name of the target. NTLM sends it to the server in the `MsvAvTargetName`
    /// attribute unless extended protection is suppressed.
    pub fn with_target_name(self, target_name: &'a str) -> Self {
        Self {
            target_name: Some(target_name),
            ..self
        }
    }

    /// The server's last token, plus an optional `ChannelBindings` buffer. Left out on the first call.
    pub fn with_input(self, input: &'a mut [SecurityBuffer]) -> Self {
        Self {
            input: Some(input),
            ..self
        }
    }
}

impl<CredsHandle, CredsHandleState, OutputState> Default
    for InitializeSecurityContext<'_, CredsHandle, CredsHandleState, OutputState>
where
    CredsHandleState: ArgumentState,
    OutputState: ArgumentState,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<CredsHandle> FilledInitializeSecurityContext<'_, CredsHandle> {
    pub fn execute<I>(mut self, inner: &mut I) -> crate::Result<InitializeSecurityContextResult>
    where
        I: SspiImpl<CredentialsHandle = CredsHandle> + ?Sized,
    {
        inner.initialize_security_context_impl(&mut self)
    }
}
