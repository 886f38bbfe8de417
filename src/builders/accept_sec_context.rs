use std::marker::PhantomData;

use time::OffsetDateTime;

use super::{ArgumentState, Missing, Provided};
use crate::{SecurityBuffer, SecurityStatus, ServerRequestFlags, ServerResponseFlags, SspiImpl};

pub type EmptyAcceptSecurityContext<'a, C> = AcceptSecurityContext<'a, C, Missing, Missing>;
pub type FilledAcceptSecurityContext<'a, C> = AcceptSecurityContext<'a, C, Provided, Provided>;

/// Outcome of one server handshake step.
#[derive(Debug, Clone)]
pub struct AcceptSecurityContextResult {
    pub status: SecurityStatus,
    pub flags: ServerResponseFlags,
    pub expiry: Option<OffsetDateTime>,
}

/// Arguments of one `accept_security_context` call. Needs a credentials handle and output buffers.
#[derive(Debug)]
pub struct AcceptSecurityContext<'a, CredsHandle, CredsHandleState, OutputState>
where
    CredsHandleState: ArgumentState,
    OutputState: ArgumentState,
{
    state: PhantomData<(CredsHandleState, OutputState)>,

    pub credentials_handle: Option<&'a mut CredsHandle>,
    pub output: &'a mut [SecurityBuffer],

    pub context_requirements: ServerRequestFlags,
    pub input: Option<&'a mut [SecurityBuffer]>,
}

impl<'a, CredsHandle, CredsHandleState, OutputState> AcceptSecurityContext<'a, CredsHandle, CredsHandleState, OutputState>
where
    CredsHandleState: ArgumentState,
    OutputState: ArgumentState,
{
    pub fn new() -> Self {
        Self {
            state: PhantomData,
            credentials_handle: None,
            output: &mut [],
            context_requirements: ServerRequestFlags::empty(),
            input: None,
        }
    }

    fn transition<C: ArgumentState, O: ArgumentState>(self) -> AcceptSecurityContext<'a, CredsHandle, C, O> {
        AcceptSecurityContext {
            state: PhantomData,
            credentials_handle: self.credentials_handle,
            output: self.output,
            context_requirements: self.context_requirements,
            input: self.input,
        }
    }

    /// The handle returned by `acquire_credentials_handle` with `CredentialUse::Inbound`.
    pub fn with_credentials_handle(
        self,
        credentials_handle: &'a mut CredsHandle,
    ) -> AcceptSecurityContext<'a, CredsHandle, Provided, OutputState> {
        let mut builder = self.transition();
        builder.credentials_handle = Some(credentials_handle);

        builder
    }

    pub fn with_output(
        self,
        output: &'a mut [SecurityBuffer],
    ) -> AcceptSecurityContext<'a, CredsHandle, CredsHandleState, Provided> {
        let mut builder = self.transition();
        builder.output = output;

        builder
    }

    pub fn with_context_requirements(self, context_requirements: ServerRequestFlags) -> Self {
        Self {
            context_requirements,
            ..self
        }
    }

    /// The client's last token. A `ChannelBindings` buffer may follow the `Token` buffer.
    pub fn with_input(self, input: &'a mut [SecurityBuffer]) -> Self {
        Self {
            input: Some(input),
            ..self
        }
    }
}

impl<CredsHandle, CredsHandleState, OutputState> Default
    for AcceptSecurityContext<'_, CredsHandle, CredsHandleState, OutputState>
where
    CredsHandleState: ArgumentState,
    OutputState: ArgumentState,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<CredsHandle> FilledAcceptSecurityContext<'_, CredsHandle> {
    pub fn execute<I>(self, inner: &mut I) -> crate::Result<AcceptSecurityContextResult>
    where
        I: SspiImpl<CredentialsHandle = CredsHandle> + ?Sized,
    {
        inner.accept_security_context_impl(self)
    }
}
