use std::fmt;
use std::marker::PhantomData;

use time::OffsetDateTime;

use super::{ArgumentState, Missing, Provided};
use crate::{CredentialUse, SspiImpl};

pub type EmptyAcquireCredentialsHandle<'a, C, A> = AcquireCredentialsHandle<'a, C, A, Missing>;
pub type FilledAcquireCredentialsHandle<'a, C, A> = AcquireCredentialsHandle<'a, C, A, Provided>;

#[derive(Debug, Clone)]
pub struct AcquireCredentialsHandleResult<C> {
    pub credentials_handle: C,
    pub expiry: Option<OffsetDateTime>,
}

/// Arguments of one `acquire_credentials_handle` call. Only the credential use is required.
///
/// Outbound credentials need `auth_data`. Inbound credentials without it leave the server to verify clients
/// against its account store.
pub struct AcquireCredentialsHandle<'a, CredsHandle, AuthData, CredentialUseState>
where
    CredentialUseState: ArgumentState,
{
    state: PhantomData<(CredsHandle, CredentialUseState)>,

    pub credential_use: CredentialUse,
    pub auth_data: Option<&'a AuthData>,
}

impl<CredsHandle, AuthData, CredentialUseState> fmt::Debug
    for AcquireCredentialsHandle<'_, CredsHandle, AuthData, CredentialUseState>
where
    CredentialUseState: ArgumentState,
    AuthData: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcquireCredentialsHandle")
            .field("credential_use", &self.credential_use)
            .field("auth_data", &self.auth_data)
            .finish()
    }
}

impl<'a, CredsHandle, AuthData, CredentialUseState> AcquireCredentialsHandle<'a, CredsHandle, AuthData, CredentialUseState>
where
    CredentialUseState: ArgumentState,
{
    pub fn new() -> Self {
        Self {
            state: PhantomData,
            credential_use: CredentialUse::Inbound,
            auth_data: None,
        }
    }

    pub fn with_credential_use(
        self,
        credential_use: CredentialUse,
    ) -> AcquireCredentialsHandle<'a, CredsHandle, AuthData, Provided> {
        AcquireCredentialsHandle {
            state: PhantomData,
            credential_use,
            auth_data: self.auth_data,
        }
    }

    pub fn with_auth_data(self, auth_data: &'a AuthData) -> Self {
        Self {
            auth_data: Some(auth_data),
            ..self
        }
    }
}

impl<CredsHandle, AuthData, CredentialUseState> Default
    for AcquireCredentialsHandle<'_, CredsHandle, AuthData, CredentialUseState>
where
    CredentialUseState: ArgumentState,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<CredsHandle, AuthData> FilledAcquireCredentialsHandle<'_, CredsHandle, AuthData> {
    pub fn execute<I>(self, inner: &mut I) -> crate::Result<AcquireCredentialsHandleResult<CredsHandle>>
    where
        I: SspiImpl<CredentialsHandle = CredsHandle, AuthenticationData = AuthData> + ?Sized,
    {
        inner.acquire_credentials_handle_impl(self)
    }
}
