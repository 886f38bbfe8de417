//! NTLM and Negotiate security contexts for a remote desktop protocol stack.
//!
//! The crate follows the shape of the Windows SSPI: a caller acquires a credentials handle and then repeatedly
//! calls [`Sspi::initialize_security_context`] (client) or [`Sspi::accept_security_context`] (server), feeding
//! the peer's last token as input, until the returned status is [`SecurityStatus::Ok`]. Once the handshake is
//! complete, [`Sspi::encrypt_message`] and [`Sspi::decrypt_message`] protect application messages.
//!
//! # Example
//!
//! ```
//! use rdp_sspi::{AuthIdentity, ClientRequestFlags, CredentialUse, Ntlm, SecurityBuffer, SecurityBufferType,
//!     SecurityStatus, Sspi};
//!
//! let mut client = Ntlm::new();
//! let identity = AuthIdentity {
//!     username: "user".to_owned(),
//!     password: String::from("password").into(),
//!     domain: Some("DOMAIN".to_owned()),
//! };
//!
//! let mut credentials = client
//!     .acquire_credentials_handle()
//!     .with_credential_use(CredentialUse::Outbound)
//!     .with_auth_data(&identity)
//!     .execute(&mut client)
//!     .unwrap()
//!     .credentials_handle;
//!
//! let mut output = vec![SecurityBuffer::new(Vec::new(), SecurityBufferType::Token)];
//! let result = client
//!     .initialize_security_context()
//!     .with_credentials_handle(&mut credentials)
//!     .with_context_requirements(ClientRequestFlags::CONFIDENTIALITY | ClientRequestFlags::ALLOCATE_MEMORY)
//!     .with_output(&mut output)
//!     .execute(&mut client)
//!     .unwrap();
//!
//! assert_eq!(result.status, SecurityStatus::ContinueNeeded);
//! assert!(output[0].buffer.starts_with(b"NTLMSSP\0"));
//! ```

#[macro_use]
extern crate tracing;

pub mod builders;
pub mod channel_bindings;
pub mod clock;
pub mod kerberos;
pub mod negotiate;
pub mod ntlm;

mod auth_identity;
mod context;
mod crypto;
mod cursor;
mod secret;
mod utils;

use std::{error, fmt, io, result, str, string};

use bitflags::bitflags;
use num_derive::{FromPrimitive, ToPrimitive};

pub use self::auth_identity::{AuthIdentity, AuthIdentityBuffers};
pub use self::builders::{
    AcceptSecurityContext, AcceptSecurityContextResult, AcquireCredentialsHandle, AcquireCredentialsHandleResult,
    EmptyAcceptSecurityContext, EmptyAcquireCredentialsHandle, EmptyInitializeSecurityContext,
    FilledAcceptSecurityContext, FilledAcquireCredentialsHandle, FilledInitializeSecurityContext,
    InitializeSecurityContext, InitializeSecurityContextResult,
};
pub use self::channel_bindings::ChannelBindings;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::context::SspiContext;
pub use self::kerberos::KerberosMechanism;
pub use self::negotiate::{KerberosAvailability, Negotiate, NegotiateConfig, NegotiatedProtocol, ProtocolConfig};
pub use self::ntlm::{Ntlm, NtlmAccounts, NtlmConfig, NtlmHash, NtlmHashError};
pub use self::secret::Secret;

pub type Result<T> = result::Result<T, Error>;

/// RPC identifier of a package that has none.
pub const PACKAGE_ID_NONE: u16 = 0xffff;

/// Retrieves information about a specified security package. This information includes the bounds of sizes
/// of authentication information, credentials, and contexts.
///
/// # MSDN
///
/// * [QuerySecurityPackageInfoW function](https://docs.microsoft.com/en-us/windows/win32/api/sspi/nf-sspi-querysecuritypackageinfow)
pub fn query_security_package_info(package_type: SecurityPackageType) -> Result<PackageInfo> {
    match package_type {
        SecurityPackageType::Ntlm => Ok(ntlm::PACKAGE_INFO.clone()),
        SecurityPackageType::Negotiate => Ok(negotiate::PACKAGE_INFO.clone()),
        SecurityPackageType::Kerberos => Ok(kerberos::PACKAGE_INFO.clone()),
        SecurityPackageType::Other(s) => Err(Error::new(
            ErrorKind::SecurityPackageNotFound,
            format!("queried info about unknown package: {:?}", s),
        )),
    }
}

/// Returns an array of `PackageInfo` structures that provide information about the security packages available.
///
/// # MSDN
///
/// * [EnumerateSecurityPackagesW function](https://docs.microsoft.com/en-us/windows/win32/api/sspi/nf-sspi-enumeratesecuritypackagesw)
pub fn enumerate_security_packages() -> Result<Vec<PackageInfo>> {
    Ok(vec![
        negotiate::PACKAGE_INFO.clone(),
        kerberos::PACKAGE_INFO.clone(),
        ntlm::PACKAGE_INFO.clone(),
    ])
}

/// Mechanism-specific half of the security context capability.
///
/// The public entry points are the builders returned by [`Sspi`]. A builder collects the call arguments and
/// hands itself over to one of these methods when executed.
pub trait SspiImpl {
    /// Represents raw data for authentication
    type CredentialsHandle;
    /// Represents authentication data prepared for the authentication process
    type AuthenticationData;

    fn acquire_credentials_handle_impl(
        &mut self,
        builder: FilledAcquireCredentialsHandle<'_, Self::CredentialsHandle, Self::AuthenticationData>,
    ) -> Result<AcquireCredentialsHandleResult<Self::CredentialsHandle>>;

    fn initialize_security_context_impl(
        &mut self,
        builder: &mut FilledInitializeSecurityContext<'_, Self::CredentialsHandle>,
    ) -> Result<InitializeSecurityContextResult>;

    fn accept_security_context_impl(
        &mut self,
        builder: FilledAcceptSecurityContext<'_, Self::CredentialsHandle>,
    ) -> Result<AcceptSecurityContextResult>;
}

/// This trait provides interface for all available SSPI functions. The `acquire_credentials_handle`,
/// `initialize_security_context`, and `accept_security_context` methods return Builders that make it
/// easier to assemble the list of arguments for the function and then execute it.
pub trait Sspi: SspiImpl {
    /// Acquires a handle to preexisting credentials of a security principal. The preexisting credentials are
    /// available only for sessions that were initiated by the caller, and the handle is required by the
    /// `initialize_security_context` and `accept_security_context` functions.
    ///
    /// # MSDN
    ///
    /// * [AcquireCredentialshandleW function](https://docs.microsoft.com/en-us/windows/win32/api/sspi/nf-sspi-acquirecredentialshandlew)
    fn acquire_credentials_handle<'a>(
        &self,
    ) -> EmptyAcquireCredentialsHandle<'a, Self::CredentialsHandle, Self::AuthenticationData>
    where
        Self: Sized,
    {
        AcquireCredentialsHandle::new()
    }

    /// Initiates the client side, outbound security context from a credential handle.
    /// The function is used to build a security context between the client application and a remote peer. The
    /// function returns a token that the client must pass to the remote peer, which the peer in turn submits to
    /// the local security implementation through the `accept_security_context` call.
    ///
    /// # MSDN
    ///
    /// * [InitializeSecurityContextW function](https://docs.microsoft.com/en-us/windows/win32/api/sspi/nf-sspi-initializesecuritycontextw)
    fn initialize_security_context<'a>(&self) -> EmptyInitializeSecurityContext<'a, Self::CredentialsHandle>
    where
        Self: Sized,
    {
        InitializeSecurityContext::new()
    }

    /// Lets the server component of a transport application establish a security context between the server
    /// and a remote client. The remote client calls the `initialize_security_context` function to start the
    /// process of establishing a security context.
    ///
    /// # MSDN
    ///
    /// * [AcceptSecurityContext function](https://docs.microsoft.com/en-us/windows/win32/api/sspi/nf-sspi-acceptsecuritycontext)
    fn accept_security_context<'a>(&self) -> EmptyAcceptSecurityContext<'a, Self::CredentialsHandle>
    where
        Self: Sized,
    {
        AcceptSecurityContext::new()
    }

    /// Completes an authentication token. This function is used by protocols that need to revise the security
    /// information after the transport application has updated some message parameters.
    ///
    /// # MSDN
    ///
    /// * [CompleteAuthToken function](https://docs.microsoft.com/en-us/windows/win32/api/sspi/nf-sspi-completeauthtoken)
    fn complete_auth_token(&mut self, token: &mut [SecurityBuffer]) -> Result<SecurityStatus>;

    /// Encrypts a message to provide privacy. The message is signed as well, the signature is written to the
    /// `Token` buffer and the `Data` buffer is encrypted in place.
    ///
    /// # MSDN
    ///
    /// * [EncryptMessage function](https://docs.microsoft.com/en-us/windows/win32/api/sspi/nf-sspi-encryptmessage)
    fn encrypt_message(
        &mut self,
        flags: EncryptionFlags,
        message: &mut [SecurityBuffer],
        sequence_number: u32,
    ) -> Result<SecurityStatus>;

    /// Decrypts a message produced by the peer's `encrypt_message` and verifies its signature.
    ///
    /// # MSDN
    ///
    /// * [DecryptMessage function](https://docs.microsoft.com/en-us/windows/win32/api/sspi/nf-sspi-decryptmessage)
    fn decrypt_message(&mut self, message: &mut [SecurityBuffer], sequence_number: u32) -> Result<DecryptionFlags>;

    /// Generates a cryptographic checksum of the message. The `Data` buffer is left untouched.
    ///
    /// # MSDN
    ///
    /// * [MakeSignature function](https://docs.microsoft.com/en-us/windows/win32/api/sspi/nf-sspi-makesignature)
    fn make_signature(&mut self, flags: u32, message: &mut [SecurityBuffer], sequence_number: u32) -> Result<()>;

    /// Verifies that a message signed by using the `make_signature` function was received in the correct
    /// sequence and has not been modified.
    ///
    /// # MSDN
    ///
    /// * [VerifySignature function](https://docs.microsoft.com/en-us/windows/win32/api/sspi/nf-sspi-verifysignature)
    fn verify_signature(&mut self, message: &mut [SecurityBuffer], sequence_number: u32) -> Result<u32>;

    /// Retrieves information about the bounds of sizes of authentication information of the current security principal.
    fn query_context_sizes(&mut self) -> Result<ContextSizes>;

    /// Retrieves the username of the credential associated to the context.
    fn query_context_names(&mut self) -> Result<ContextNames>;

    /// Queries the sizes and other package information of the mechanism in use.
    fn query_context_package_info(&mut self) -> Result<PackageInfo>;

    /// Queries the exported session key of an established context.
    fn query_context_session_key(&self) -> Result<SessionKeys>;
}

bitflags! {
    /// Indicate the quality of protection. Used in the `encrypt_message` method.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EncryptionFlags: u32 {
        const WRAP_OOB_DATA = 0x4000_0000;
        const WRAP_NO_ENCRYPT = 0x8000_0001;
    }
}

bitflags! {
    /// Indicate the quality of protection. Returned by the `decrypt_message` method.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DecryptionFlags: u32 {
        const SIGN_ONLY = 0x8000_0000;
        const WRAP_NO_ENCRYPT = 0x8000_0001;
    }
}

bitflags! {
    /// Indicate requests for the context. Not all packages can support all requirements. Bit flags can be
    /// combined by using bitwise-OR operations.
    ///
    /// # MSDN
    ///
    /// * [Context Requirements](https://docs.microsoft.com/en-us/windows/win32/secauthn/context-requirements)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClientRequestFlags: u32 {
        const DELEGATE = 0x1;
        const MUTUAL_AUTH = 0x2;
        const REPLAY_DETECT = 0x4;
        const SEQUENCE_DETECT = 0x8;
        const CONFIDENTIALITY = 0x10;
        const USE_SESSION_KEY = 0x20;
        const PROMPT_FOR_CREDS = 0x40;
        const USE_SUPPLIED_CREDS = 0x80;
        const ALLOCATE_MEMORY = 0x100;
        const USE_DCE_STYLE = 0x200;
        const DATAGRAM = 0x400;
        const CONNECTION = 0x800;
        const CALL_LEVEL = 0x1000;
        const FRAGMENT_SUPPLIED = 0x2000;
        const EXTENDED_ERROR = 0x4000;
        const STREAM = 0x8000;
        const INTEGRITY = 0x10_000;
        const IDENTIFY = 0x20_000;
        const NULL_SESSION = 0x40_000;
        const MANUAL_CRED_VALIDATION = 0x80_000;
        const RESERVED1 = 0x100_000;
        const FRAGMENT_TO_FIT = 0x200_000;
        const FORWARD_CREDENTIALS = 0x400_000;
        const NO_INTEGRITY = 0x800_000;
        const USE_HTTP_STYLE = 0x100_0000;
        const UNVERIFIED_TARGET_NAME = 0x2000_0000;
        const CONFIDENTIALITY_ONLY = 0x4000_0000;
    }
}

bitflags! {
    /// Specify the attributes required by the server to establish the context. Bit flags can be combined by
    /// using bitwise-OR operations.
    ///
    /// # MSDN
    ///
    /// * [AcceptSecurityContext function (fContextReq parameter)](https://docs.microsoft.com/en-us/windows/win32/api/sspi/nf-sspi-acceptsecuritycontext#parameters)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ServerRequestFlags: u32 {
        const DELEGATE = 0x1;
        const MUTUAL_AUTH = 0x2;
        const REPLAY_DETECT = 0x4;
        const SEQUENCE_DETECT = 0x8;
        const CONFIDENTIALITY = 0x10;
        const USE_SESSION_KEY = 0x20;
        const SESSION_TICKET = 0x40;
        const ALLOCATE_MEMORY = 0x100;
        const USE_DCE_STYLE = 0x200;
        const DATAGRAM = 0x400;
        const CONNECTION = 0x800;
        const CALL_LEVEL = 0x1000;
        const FRAGMENT_SUPPLIED = 0x2000;
        const EXTENDED_ERROR = 0x8000;
        const STREAM = 0x10_000;
        const INTEGRITY = 0x20_000;
        const LICENSING = 0x40_000;
        const IDENTIFY = 0x80_000;
        const ALLOW_NULL_SESSION = 0x100_000;
        const ALLOW_NON_USER_LOGONS = 0x200_000;
        const ALLOW_CONTEXT_REPLAY = 0x400_000;
        const FRAGMENT_TO_FIT = 0x80_0000;
        const NO_TOKEN = 0x100_0000;
        const PROXY_BINDINGS = 0x400_0000;
        const ALLOW_MISSING_BINDINGS = 0x1000_0000;
    }
}

bitflags! {
    /// Indicate the attributes of the established context.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClientResponseFlags: u32 {
        const DELEGATE = 0x1;
        const MUTUAL_AUTH = 0x2;
        const REPLAY_DETECT = 0x4;
        const SEQUENCE_DETECT = 0x8;
        const CONFIDENTIALITY = 0x10;
        const USE_SESSION_KEY = 0x20;
        const USED_COLLECTED_CREDS = 0x40;
        const USED_SUPPLIED_CREDS = 0x80;
        const ALLOCATED_MEMORY = 0x100;
        const USED_DCE_STYLE = 0x200;
        const DATAGRAM = 0x400;
        const CONNECTION = 0x800;
        const INTERMEDIATE_RETURN = 0x1000;
        const CALL_LEVEL = 0x2000;
        const EXTENDED_ERROR = 0x4000;
        const STREAM = 0x8000;
        const INTEGRITY = 0x10_000;
        const IDENTIFY = 0x20_000;
        const NULL_SESSION = 0x40_000;
        const MANUAL_CRED_VALIDATION = 0x80_000;
        const RESERVED1 = 0x10_0000;
        const FRAGMENT_ONLY = 0x200_000;
        const FORWARD_CREDENTIALS = 0x400_000;
        const USED_HTTP_STYLE = 0x100_0000;
        const NO_ADDITIONAL_TOKEN = 0x200_0000;
        const REAUTHENTICATION = 0x800_0000;
        const CONFIDENTIALITY_ONLY = 0x4000_0000;
    }
}

bitflags! {
    /// Indicate the attributes of the established context on the server side.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ServerResponseFlags: u32 {
        const DELEGATE = 0x1;
        const MUTUAL_AUTH = 0x2;
        const REPLAY_DETECT = 0x4;
        const SEQUENCE_DETECT = 0x8;
        const CONFIDENTIALITY = 0x10;
        const USE_SESSION_KEY = 0x20;
        const SESSION_TICKET = 0x40;
        const ALLOCATED_MEMORY = 0x100;
        const USED_DCE_STYLE = 0x200;
        const DATAGRAM = 0x400;
        const CONNECTION = 0x800;
        const CALL_LEVEL = 0x2000;
        const THIRD_LEG_FAILED = 0x4000;
        const EXTENDED_ERROR = 0x8000;
        const STREAM = 0x10_000;
        const INTEGRITY = 0x20_000;
        const LICENSING = 0x40_000;
        const IDENTIFY = 0x80_000;
        const NULL_SESSION = 0x100_000;
        const ALLOW_NON_USER_LOGONS = 0x200_000;
        const ALLOW_CONTEXT_REPLAY = 0x400_000;
        const FRAGMENT_ONLY = 0x800_000;
        const NO_TOKEN = 0x100_0000;
        const NO_ADDITIONAL_TOKEN = 0x200_0000;
    }
}

/// Describes a buffer allocated by a transport application to pass to a security package.
///
/// # MSDN
///
/// * [SecBuffer structure](https://docs.microsoft.com/en-us/windows/win32/api/sspi/ns-sspi-secbuffer)
#[derive(Clone, Eq, PartialEq)]
pub struct SecurityBuffer {
    pub buffer: Vec<u8>,
    pub buffer_type: SecurityBufferType,
}

impl fmt::Debug for SecurityBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecurityBuffer {{ buffer_type: {:?}, buffer: 0x", self.buffer_type)?;
        self.buffer.iter().try_for_each(|byte| write!(f, "{byte:02X}"))?;
        write!(f, " }}")?;

        Ok(())
    }
}

impl SecurityBuffer {
    pub fn new(buffer: Vec<u8>, buffer_type: SecurityBufferType) -> Self {
        Self { buffer, buffer_type }
    }

    pub fn find_buffer(buffers: &[SecurityBuffer], buffer_type: SecurityBufferType) -> Result<&SecurityBuffer> {
        buffers.iter().find(|b| b.buffer_type == buffer_type).ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidToken,
                format!("no buffer was provided with type {:?}", buffer_type),
            )
        })
    }

    pub fn find_buffer_mut(
        buffers: &mut [SecurityBuffer],
        buffer_type: SecurityBufferType,
    ) -> Result<&mut SecurityBuffer> {
        buffers.iter_mut().find(|b| b.buffer_type == buffer_type).ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidToken,
                format!("no buffer was provided with type {:?}", buffer_type),
            )
        })
    }
}

/// Bit flags that indicate the type of buffer.
#[repr(u32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, FromPrimitive, ToPrimitive)]
pub enum SecurityBufferType {
    Empty = 0,
    Data = 1,
    Token = 2,
    TransportToPackageParameters = 3,
    Missing = 4,
    Extra = 5,
    StreamTrailer = 6,
    StreamHeader = 7,
    NegotiationInfo = 8,
    Padding = 9,
    Stream = 10,
    ObjectIdsList = 11,
    ObjectIdsListSignature = 12,
    Target = 13,
    ChannelBindings = 14,
    ChangePasswordResponse = 15,
    TargetHost = 16,
    Alert = 17,
    ApplicationProtocol = 18,
}

/// A flag that indicates how the credentials are used.
///
/// # MSDN
///
/// * [AcquireCredentialsHandleW function (fCredentialUse parameter)](https://docs.microsoft.com/en-us/windows/win32/api/sspi/nf-sspi-acquirecredentialshandlew)
#[derive(Debug, Copy, Clone, Eq, PartialEq, FromPrimitive, ToPrimitive)]
pub enum CredentialUse {
    Inbound = 1,
    Outbound = 2,
    Both = 3,
    Default = 4,
}

/// Represents the security principal in use.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SecurityPackageType {
    Ntlm,
    Negotiate,
    Kerberos,
    Other(String),
}

impl fmt::Display for SecurityPackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SecurityPackageType::Ntlm => ntlm::PKG_NAME,
            SecurityPackageType::Negotiate => negotiate::PKG_NAME,
            SecurityPackageType::Kerberos => kerberos::PKG_NAME,
            SecurityPackageType::Other(name) => name.as_str(),
        };

        f.write_str(name)
    }
}

impl str::FromStr for SecurityPackageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            ntlm::PKG_NAME => Ok(SecurityPackageType::Ntlm),
            negotiate::PKG_NAME => Ok(SecurityPackageType::Negotiate),
            kerberos::PKG_NAME => Ok(SecurityPackageType::Kerberos),
            s => Ok(SecurityPackageType::Other(s.to_string())),
        }
    }
}

/// General information about a security package, such as its name and capabilities.
///
/// # MSDN
///
/// * [SecPkgInfoW structure](https://docs.microsoft.com/en-us/windows/win32/api/sspi/ns-sspi-secpkginfow)
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PackageInfo {
    pub capabilities: PackageCapabilities,
    pub version: u16,
    pub rpc_id: u16,
    pub max_token_len: u32,
    pub name: SecurityPackageType,
    pub comment: String,
}

bitflags! {
    /// Set of bit flags that describes the capabilities of the security package.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PackageCapabilities: u32 {
        const INTEGRITY = 0x1;
        const PRIVACY = 0x2;
        const TOKEN_ONLY = 0x4;
        const DATAGRAM = 0x8;
        const CONNECTION = 0x10;
        const MULTI_REQUIRED = 0x20;
        const CLIENT_ONLY = 0x40;
        const EXTENDED_ERROR = 0x80;
        const IMPERSONATION = 0x100;
        const ACCEPT_WIN32_NAME = 0x200;
        const STREAM = 0x400;
        const NEGOTIABLE = 0x800;
        const GSS_COMPATIBLE = 0x1000;
        const LOGON = 0x2000;
        const ASCII_BUFFERS = 0x4000;
        const FRAGMENT = 0x8000;
        const MUTUAL_AUTH = 0x1_0000;
        const DELEGATION = 0x2_0000;
        const READONLY_WITH_CHECKSUM = 0x4_0000;
        const RESTRICTED_TOKENS = 0x8_0000;
        const NEGO_EXTENDER = 0x10_0000;
        const NEGOTIABLE2 = 0x20_0000;
        const APP_CONTAINER_PASSTHROUGH = 0x40_0000;
        const APP_CONTAINER_CHECKS = 0x80_0000;
    }
}

/// Indicates the sizes of important structures used in the message support functions.
///
/// # MSDN
///
/// * [SecPkgContext_Sizes structure](https://docs.microsoft.com/en-us/windows/win32/api/sspi/ns-sspi-secpkgcontext_sizes)
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ContextSizes {
    pub max_token: u32,
    pub max_signature: u32,
    pub block: u32,
    pub security_trailer: u32,
}

/// Indicates the name of the user associated with a security context.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ContextNames {
    pub username: String,
    pub domain: Option<String>,
}

/// Contains the session key of an established context.
#[derive(Debug, Clone)]
pub struct SessionKeys {
    pub session_key: Secret<Vec<u8>>,
}

/// The kind of an SSPI related error. Enables to specify the error based on its type.
#[repr(u32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, FromPrimitive, ToPrimitive)]
pub enum ErrorKind {
    Unknown = 0,
    InsufficientMemory = 0x8009_0300,
    InvalidHandle = 0x8009_0301,
    UnsupportedFunction = 0x8009_0302,
    TargetUnknown = 0x8009_0303,
    /// May correspond to any internal error (I/O error, server error, etc.).
    InternalError = 0x8009_0304,
    SecurityPackageNotFound = 0x8009_0305,
    /// Used in cases when supplied data is missing or invalid.
    InvalidToken = 0x8009_0308,
    OperationNotSupported = 0x8009_030A,
    LogonDenied = 0x8009_030C,
    UnknownCredentials = 0x8009_030D,
    NoCredentials = 0x8009_030E,
    /// The signature, the message integrity check or the proof value does not match the data.
    MessageAltered = 0x8009_030F,
    /// Used when a call does not correspond to the current state, or a message arrives out of order.
    OutOfSequence = 0x8009_0310,
    NoAuthenticatingAuthority = 0x8009_0311,
    ContextExpired = 0x8009_0317,
    IncompleteMessage = 0x8009_0318,
    IncompleteCredentials = 0x8009_0320,
    BufferTooSmall = 0x8009_0321,
    WrongPrincipalName = 0x8009_0322,
    TimeSkew = 0x8009_0324,
    IllegalMessage = 0x8009_0326,
    EncryptFailure = 0x8009_0329,
    DecryptFailure = 0x8009_0330,
    AlgorithmMismatch = 0x8009_0331,
    BadBindings = 0x8009_0346,
    DowngradeDetected = 0x8009_0350,
    InvalidParameter = 0x8009_035D,
    PolicyNtlmOnly = 0x8009_035F,
    NoContext = 0x8009_0361,
    MutualAuthFailed = 0x8009_0363,
}

/// Holds the [`ErrorKind`] and the description of the error.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Error {
    pub error_type: ErrorKind,
    pub description: String,
}

/// The success values returned by the SSPI functions.
#[repr(u32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, FromPrimitive, ToPrimitive)]
pub enum SecurityStatus {
    Ok = 0,
    ContinueNeeded = 0x0009_0312,
    CompleteNeeded = 0x0009_0313,
    CompleteAndContinue = 0x0009_0314,
    LocalLogon = 0x0009_0315,
    ContextExpired = 0x0009_0317,
    IncompleteCredentials = 0x0009_0320,
    Renegotiate = 0x0009_0321,
    NoLsaContext = 0x0009_0323,
}

impl Error {
    /// Allows to fill a new error easily, supplying it with a coherent description.
    pub fn new(error_type: ErrorKind, description: impl ToString) -> Self {
        Self {
            error_type,
            description: description.to_string(),
        }
    }
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.error_type, self.description)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::new(ErrorKind::InternalError, format!("IO error: {:?}", err))
    }
}

impl From<string::FromUtf16Error> for Error {
    fn from(err: string::FromUtf16Error) -> Self {
        Self::new(ErrorKind::InvalidToken, format!("UTF-16 error: {:?}", err))
    }
}

impl From<NtlmHashError> for Error {
    fn from(err: NtlmHashError) -> Self {
        Self::new(ErrorKind::InvalidToken, err)
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        io::Error::other(format!("{:?}: {}", err.error_type, err.description))
    }
}
