mod accounts;
mod config;
mod hash;
mod messages;

use std::fmt;
use std::sync::LazyLock;

use bitflags::bitflags;
use byteorder::{LittleEndian, WriteBytesExt};
use rand::rngs::OsRng;
use rand::RngCore;

pub use self::accounts::NtlmAccounts;
pub use self::config::NtlmConfig;
pub use self::hash::{NtlmHash, NtlmHashError, NTLM_HASH_PREFIX};
pub(crate) use self::messages::NTLM_SIGNATURE;
use self::messages::{client, server};
use crate::channel_bindings::ChannelBindings;
use crate::clock::{Clock, SystemClock};
use crate::crypto::{compute_hmac_md5, Rc4, HASH_SIZE};
use crate::{
    AcceptSecurityContextResult, AcquireCredentialsHandleResult, AuthIdentity, AuthIdentityBuffers,
    ClientRequestFlags, ClientResponseFlags, ContextNames, ContextSizes, CredentialUse, DecryptionFlags,
    EncryptionFlags, Error, ErrorKind, FilledAcceptSecurityContext, FilledAcquireCredentialsHandle,
    FilledInitializeSecurityContext, InitializeSecurityContextResult, PackageCapabilities, PackageInfo, Secret,
    SecurityBuffer, SecurityBufferType, SecurityPackageType, SecurityStatus, ServerRequestFlags, ServerResponseFlags,
    SessionKeys, Sspi, SspiImpl,
};

pub const PKG_NAME: &str = "NTLM";
pub const NTLM_VERSION_SIZE: usize = 8;
pub const DEFAULT_NTLM_VERSION: [u8; NTLM_VERSION_SIZE] = [0x0a, 0x00, 0x63, 0x45, 0x00, 0x00, 0x00, 0x0f];

pub const SIGNATURE_SIZE: usize = SIGNATURE_VERSION_SIZE + SIGNATURE_CHECKSUM_SIZE + SIGNATURE_SEQ_NUM_SIZE;

const CHALLENGE_SIZE: usize = 8;
const SESSION_KEY_SIZE: usize = 16;
const MESSAGE_INTEGRITY_CHECK_SIZE: usize = 16;
const LM_CHALLENGE_RESPONSE_BUFFER_SIZE: usize = HASH_SIZE + CHALLENGE_SIZE;

const SIGNATURE_VERSION_SIZE: usize = 4;
const SIGNATURE_SEQ_NUM_SIZE: usize = 4;
const SIGNATURE_CHECKSUM_SIZE: usize = 8;
const MESSAGES_VERSION: u32 = 1;

pub static PACKAGE_INFO: LazyLock<PackageInfo> = LazyLock::new(|| PackageInfo {
    capabilities: PackageCapabilities::INTEGRITY
        | PackageCapabilities::PRIVACY
        | PackageCapabilities::TOKEN_ONLY
        | PackageCapabilities::CONNECTION
        | PackageCapabilities::MULTI_REQUIRED
        | PackageCapabilities::IMPERSONATION
        | PackageCapabilities::ACCEPT_WIN32_NAME
        | PackageCapabilities::NEGOTIABLE
        | PackageCapabilities::LOGON
        | PackageCapabilities::RESTRICTED_TOKENS,
    version: 1,
    rpc_id: 0x000a,
    max_token_len: 0xb48,
    name: SecurityPackageType::Ntlm,
    comment: String::from("NTLM Security Package"),
});

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum NtlmState {
    Initial,
    Challenge,
    Authenticate,
    Final,
}

/// Specifies the NT LAN Manager (NTLM) Authentication Protocol, used for authentication between clients and servers.
/// NTLM is used by application protocols to authenticate remote users and, optionally, to provide session security when requested by the application.
///
/// One instance drives exactly one handshake, either as the client or as the server. The derived keys, the
/// RC4 states and the credentials are wiped when the context is dropped.
///
/// # MSDN
///
/// * [[MS-NLMP]: NT LAN Manager (NTLM) Authentication Protocol](https://docs.microsoft.com/en-us/openspecs/windows_protocols/ms-nlmp/b38c36ed-2804-4868-a9ff-8dd3182128e4)
pub struct Ntlm {
    config: NtlmConfig,

    negotiate_message: Option<NegotiateMessage>,
    challenge_message: Option<ChallengeMessage>,
    authenticate_message: Option<AuthenticateMessage>,

    channel_bindings: Option<ChannelBindings>,

    state: NtlmState,
    flags: NegotiateFlags,
    identity: Option<AuthIdentityBuffers>,
    is_client: bool,

    signing: bool, // integrity
    sealing: bool, // confidentiality
    sequence_detect: bool,
    send_signing_key: Secret<[u8; HASH_SIZE]>,
    recv_signing_key: Secret<[u8; HASH_SIZE]>,
    send_sealing_key: Option<Rc4>,
    recv_sealing_key: Option<Rc4>,

    // If the NTLM is used as client, then our_seq_number is the client sequence number and remote seq_number is the server sequence number.
    // If the NTLM is used as server, then our_seq_number is the server sequence number and remote seq_number is the client sequence number.
    our_seq_number: u32,
    remote_seq_number: u32,

    session_key: Option<Secret<[u8; SESSION_KEY_SIZE]>>,

    rng: Box<dyn RngCore + Send>,
    clock: Box<dyn Clock>,
}

#[derive(Debug, Clone)]
struct Mic {
    value: [u8; MESSAGE_INTEGRITY_CHECK_SIZE],
    offset: usize,
}

#[derive(Debug, Clone)]
struct NegotiateMessage {
    message: Vec<u8>,
    flags: NegotiateFlags,
}

#[derive(Debug, Clone)]
struct ChallengeMessage {
    message: Vec<u8>,
    target_info: Vec<u8>,
    server_challenge: [u8; CHALLENGE_SIZE],
    timestamp: Option<u64>,
    flags: NegotiateFlags,
}

#[derive(Debug, Clone)]
struct AuthenticateMessage {
    message: Vec<u8>,
    mic: Option<Mic>,
    target_info: Vec<u8>,
    client_challenge: [u8; CHALLENGE_SIZE],
    encrypted_random_session_key: Option<[u8; SESSION_KEY_SIZE]>,
}

impl Ntlm {
    pub fn new() -> Self {
        Self::with_config(NtlmConfig::default())
    }

    pub fn with_config(config: NtlmConfig) -> Self {
        Self::with_rng_and_clock(config, Box::new(OsRng), Box::new(SystemClock))
    }

    /// Creates a context that draws its challenges and session keys from `rng` and its timestamps from `clock`.
    pub fn with_rng_and_clock(config: NtlmConfig, rng: Box<dyn RngCore + Send>, clock: Box<dyn Clock>) -> Self {
        Self {
            config,

            negotiate_message: None,
            challenge_message: None,
            authenticate_message: None,

            channel_bindings: None,

            state: NtlmState::Initial,
            flags: NegotiateFlags::empty(),
            identity: None,
            is_client: true,

            signing: true,
            sealing: true,
            sequence_detect: false,
            send_signing_key: Secret::new([0x00; HASH_SIZE]),
            recv_signing_key: Secret::new([0x00; HASH_SIZE]),
            send_sealing_key: None,
            recv_sealing_key: None,

            our_seq_number: 0,
            remote_seq_number: 0,

            session_key: None,

            rng,
            clock,
        }
    }

    pub fn config(&self) -> &NtlmConfig {
        &self.config
    }

    /// Sets the channel bindings the handshake is tied to. The MD5 hash of the structure is transmitted to the
    /// server as an AV pair in the Authenticate message, and compared with the received one on the server side.
    pub fn set_channel_bindings(&mut self, channel_bindings: ChannelBindings) {
        self.channel_bindings = Some(channel_bindings);
    }

    /// True once the handshake completed and the session keys are derived.
    pub fn is_established(&self) -> bool {
        self.state == NtlmState::Final
    }

    fn reset_cipher_state(&mut self) -> crate::Result<()> {
        use crate::ntlm::messages::computations::generate_signing_key;
        use crate::ntlm::messages::{CLIENT_SEAL_MAGIC, CLIENT_SIGN_MAGIC, SERVER_SEAL_MAGIC, SERVER_SIGN_MAGIC};

        let session_key = self.session_key.as_ref().ok_or_else(|| {
            Error::new(
                ErrorKind::OutOfSequence,
                "the session key is not established, cannot reset cipher state",
            )
        })?;
        let session_key = session_key.as_ref();

        let (send_sign_magic, recv_sign_magic, send_seal_magic, recv_seal_magic) = if self.is_client {
            (CLIENT_SIGN_MAGIC, SERVER_SIGN_MAGIC, CLIENT_SEAL_MAGIC, SERVER_SEAL_MAGIC)
        } else {
            (SERVER_SIGN_MAGIC, CLIENT_SIGN_MAGIC, SERVER_SEAL_MAGIC, CLIENT_SEAL_MAGIC)
        };

        let send_signing_key = Secret::new(generate_signing_key(session_key, send_sign_magic));
        let recv_signing_key = Secret::new(generate_signing_key(session_key, recv_sign_magic));
        let send_sealing_key = Rc4::new(&Secret::new(generate_signing_key(session_key, send_seal_magic)).as_ref()[..]);
        let recv_sealing_key = Rc4::new(&Secret::new(generate_signing_key(session_key, recv_seal_magic)).as_ref()[..]);

        self.send_signing_key = send_signing_key;
        self.recv_signing_key = recv_signing_key;
        self.send_sealing_key = Some(send_sealing_key);
        self.recv_sealing_key = Some(recv_sealing_key);
        self.our_seq_number = 0;
        self.remote_seq_number = 0;

        debug!(is_client = self.is_client, "NTLM session keys are derived");

        Ok(())
    }

    fn check_established(&self) -> crate::Result<()> {
        if self.state != NtlmState::Final {
            return Err(Error::new(
                ErrorKind::OutOfSequence,
                format!("the security context is not established yet: {:?}", self.state),
            ));
        }

        Ok(())
    }

    fn client_response_flags(&self, requirements: ClientRequestFlags) -> ClientResponseFlags {
        let mut flags = ClientResponseFlags::empty();

        if self.signing {
            flags |= ClientResponseFlags::INTEGRITY;
        }
        if self.sealing {
            flags |= ClientResponseFlags::CONFIDENTIALITY;
        }
        if self.sequence_detect {
            flags |= ClientResponseFlags::SEQUENCE_DETECT | ClientResponseFlags::REPLAY_DETECT;
        }
        if requirements.contains(ClientRequestFlags::ALLOCATE_MEMORY) {
            flags |= ClientResponseFlags::ALLOCATED_MEMORY;
        }

        flags
    }

    fn server_response_flags(&self, requirements: ServerRequestFlags) -> ServerResponseFlags {
        let mut flags = ServerResponseFlags::empty();

        if self.signing {
            flags |= ServerResponseFlags::INTEGRITY;
        }
        if self.sealing {
            flags |= ServerResponseFlags::CONFIDENTIALITY;
        }
        if self.sequence_detect {
            flags |= ServerResponseFlags::SEQUENCE_DETECT | ServerResponseFlags::REPLAY_DETECT;
        }
        if requirements.contains(ServerRequestFlags::ALLOCATE_MEMORY) {
            flags |= ServerResponseFlags::ALLOCATED_MEMORY;
        }

        flags
    }

    /// Checks the sequence number of a received signature against the next expected one.
    fn check_remote_seq_number(&self, signature: &[u8]) -> crate::Result<u32> {
        let mut version = [0x00; SIGNATURE_VERSION_SIZE];
        version.copy_from_slice(&signature[..SIGNATURE_VERSION_SIZE]);
        if u32::from_le_bytes(version) != MESSAGES_VERSION {
            return Err(Error::new(
                ErrorKind::MessageAltered,
                "invalid signature version",
            ));
        }

        let mut seq_number = [0x00; SIGNATURE_SEQ_NUM_SIZE];
        seq_number.copy_from_slice(&signature[SIGNATURE_SIZE - SIGNATURE_SEQ_NUM_SIZE..]);
        let seq_number = u32::from_le_bytes(seq_number);

        if seq_number != self.remote_seq_number {
            let error_kind = if self.sequence_detect {
                ErrorKind::OutOfSequence
            } else {
                ErrorKind::MessageAltered
            };

            return Err(Error::new(
                error_kind,
                format!(
                    "invalid sequence number: expected {}, got {}",
                    self.remote_seq_number, seq_number
                ),
            ));
        }

        Ok(seq_number)
    }
}

impl Default for Ntlm {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Ntlm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ntlm")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("flags", &self.flags)
            .field("identity", &self.identity)
            .field("is_client", &self.is_client)
            .field("signing", &self.signing)
            .field("sealing", &self.sealing)
            .field("our_seq_number", &self.our_seq_number)
            .field("remote_seq_number", &self.remote_seq_number)
            .finish_non_exhaustive()
    }
}

impl SspiImpl for Ntlm {
    type CredentialsHandle = Option<AuthIdentityBuffers>;
    type AuthenticationData = AuthIdentity;

    #[instrument(level = "trace", ret, fields(state = ?self.state), skip_all)]
    fn acquire_credentials_handle_impl(
        &mut self,
        builder: FilledAcquireCredentialsHandle<'_, Self::CredentialsHandle, Self::AuthenticationData>,
    ) -> crate::Result<AcquireCredentialsHandleResult<Self::CredentialsHandle>> {
        if builder.credential_use == CredentialUse::Outbound && builder.auth_data.is_none() {
            return Err(Error::new(
                ErrorKind::NoCredentials,
                "The client must specify the auth data",
            ));
        }

        Ok(AcquireCredentialsHandleResult {
            credentials_handle: builder.auth_data.cloned().map(AuthIdentityBuffers::from),
            expiry: None,
        })
    }

    #[instrument(level = "debug", ret, fields(state = ?self.state), skip_all)]
    fn initialize_security_context_impl(
        &mut self,
        builder: &mut FilledInitializeSecurityContext<'_, Self::CredentialsHandle>,
    ) -> crate::Result<InitializeSecurityContextResult> {
        let status = match self.state {
            NtlmState::Initial => {
                let output_token = SecurityBuffer::find_buffer_mut(builder.output, SecurityBufferType::Token)?;

                self.is_client = true;
                self.signing = true;
                self.sealing = builder
                    .context_requirements
                    .contains(ClientRequestFlags::CONFIDENTIALITY);
                self.sequence_detect = builder
                    .context_requirements
                    .intersects(ClientRequestFlags::SEQUENCE_DETECT | ClientRequestFlags::REPLAY_DETECT);

                let mut message = Vec::new();
                let status = client::write_negotiate(self, &mut message)?;
                output_token.buffer = message;

                status
            }
            NtlmState::Challenge => {
                let input = builder.input.as_deref().ok_or_else(|| {
                    Error::new(
                        ErrorKind::InvalidToken,
                        "Input buffers must be specified on subsequent calls",
                    )
                })?;
                let input_token = SecurityBuffer::find_buffer(input, SecurityBufferType::Token)?;
                let channel_bindings = SecurityBuffer::find_buffer(input, SecurityBufferType::ChannelBindings)
                    .ok()
                    .map(|buffer| ChannelBindings::from_bytes(&buffer.buffer))
                    .transpose()?;

                let challenge = client::read_challenge(self, &input_token.buffer)?;

                let credentials = builder
                    .credentials_handle
                    .as_deref()
                    .and_then(Option::as_ref)
                    .ok_or_else(|| Error::new(ErrorKind::NoCredentials, "Credentials handle must be Some"))?;
                let output_token = SecurityBuffer::find_buffer_mut(builder.output, SecurityBufferType::Token)?;

                let mut message = Vec::new();
                let status = client::write_authenticate(
                    self,
                    challenge,
                    credentials,
                    channel_bindings,
                    builder.target_name,
                    &mut message,
                )?;
                output_token.buffer = message;

                status
            }
            _ => {
                return Err(Error::new(
                    ErrorKind::OutOfSequence,
                    format!("Got wrong NTLM state: {:?}", self.state),
                ))
            }
        };

        Ok(InitializeSecurityContextResult {
            status,
            flags: self.client_response_flags(builder.context_requirements),
            expiry: None,
        })
    }

    #[instrument(level = "debug", ret, fields(state = ?self.state), skip_all)]
    fn accept_security_context_impl(
        &mut self,
        builder: FilledAcceptSecurityContext<'_, Self::CredentialsHandle>,
    ) -> crate::Result<AcceptSecurityContextResult> {
        let input = builder
            .input
            .ok_or_else(|| Error::new(ErrorKind::InvalidToken, "Input buffers must be specified"))?;

        let status = match self.state {
            NtlmState::Initial => {
                let input_token = SecurityBuffer::find_buffer(input, SecurityBufferType::Token)?;
                let output_token = SecurityBuffer::find_buffer_mut(builder.output, SecurityBufferType::Token)?;

                let negotiate = server::read_negotiate(self, &input_token.buffer)?;

                let mut message = Vec::new();
                let status = server::write_challenge(self, negotiate, &mut message)?;
                output_token.buffer = message;

                self.is_client = false;
                self.sequence_detect = builder
                    .context_requirements
                    .intersects(ServerRequestFlags::SEQUENCE_DETECT | ServerRequestFlags::REPLAY_DETECT);

                status
            }
            NtlmState::Authenticate => {
                let input_token = SecurityBuffer::find_buffer(input, SecurityBufferType::Token)?;
                let channel_bindings = SecurityBuffer::find_buffer(input, SecurityBufferType::ChannelBindings)
                    .ok()
                    .map(|buffer| ChannelBindings::from_bytes(&buffer.buffer))
                    .transpose()?;

                let credentials = builder.credentials_handle.as_deref().and_then(Option::as_ref);
                let status = server::read_authenticate(self, credentials, channel_bindings, &input_token.buffer)?;

                self.signing = true;
                self.sealing = self.flags.contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_SEAL);

                status
            }
            _ => {
                return Err(Error::new(
                    ErrorKind::OutOfSequence,
                    format!("got wrong NTLM state: {:?}", self.state),
                ))
            }
        };

        Ok(AcceptSecurityContextResult {
            status,
            flags: self.server_response_flags(builder.context_requirements),
            expiry: None,
        })
    }
}

impl Sspi for Ntlm {
    #[instrument(level = "debug", ret, fields(state = ?self.state), skip_all)]
    fn complete_auth_token(&mut self, _token: &mut [SecurityBuffer]) -> crate::Result<SecurityStatus> {
        self.check_established()?;

        Ok(SecurityStatus::Ok)
    }

    #[instrument(level = "debug", ret, fields(state = ?self.state), skip_all)]
    fn encrypt_message(
        &mut self,
        _flags: EncryptionFlags,
        message: &mut [SecurityBuffer],
        _sequence_number: u32,
    ) -> crate::Result<SecurityStatus> {
        self.check_established()?;

        let token_len = SecurityBuffer::find_buffer(message, SecurityBufferType::Token)?.buffer.len();
        if token_len < SIGNATURE_SIZE {
            return Err(Error::new(ErrorKind::BufferTooSmall, "the Token buffer is too small"));
        }

        let sequence_number = self.our_seq_number;
        let sealing = self.sealing;
        let data = SecurityBuffer::find_buffer_mut(message, SecurityBufferType::Data)?;
        let digest = compute_digest(self.send_signing_key.as_ref(), sequence_number, &data.buffer)?;

        let sealing_key = self
            .send_sealing_key
            .as_mut()
            .ok_or_else(|| Error::new(ErrorKind::OutOfSequence, "the sealing key is not established"))?;
        if sealing {
            data.buffer = sealing_key.process(&data.buffer);
        }
        let checksum = sealing_key.process(&digest[..SIGNATURE_CHECKSUM_SIZE]);

        let token = SecurityBuffer::find_buffer_mut(message, SecurityBufferType::Token)?;
        token.buffer.truncate(SIGNATURE_SIZE);
        token.buffer.copy_from_slice(&compute_signature(&checksum, sequence_number));

        self.our_seq_number = self.our_seq_number.wrapping_add(1);

        Ok(SecurityStatus::Ok)
    }

    #[instrument(level = "debug", ret, fields(state = ?self.state), skip_all)]
    fn decrypt_message(&mut self, message: &mut [SecurityBuffer], _sequence_number: u32) -> crate::Result<DecryptionFlags> {
        self.check_established()?;

        let signature = SecurityBuffer::find_buffer(message, SecurityBufferType::Token)?.buffer.as_slice();
        if signature.len() != SIGNATURE_SIZE {
            return Err(Error::new(
                ErrorKind::InvalidToken,
                format!("invalid signature size: {}", signature.len()),
            ));
        }
        let sequence_number = self.check_remote_seq_number(signature)?;

        let data = SecurityBuffer::find_buffer(message, SecurityBufferType::Data)?;

        // a rejected message must not advance the keystream
        let mut sealing_key = self
            .recv_sealing_key
            .clone()
            .ok_or_else(|| Error::new(ErrorKind::OutOfSequence, "the sealing key is not established"))?;
        let decrypted = if self.sealing {
            sealing_key.process(&data.buffer)
        } else {
            data.buffer.clone()
        };

        let digest = compute_digest(self.recv_signing_key.as_ref(), sequence_number, &decrypted)?;
        check_signature(&mut sealing_key, sequence_number, &digest, signature)?;

        SecurityBuffer::find_buffer_mut(message, SecurityBufferType::Data)?.buffer = decrypted;
        self.recv_sealing_key = Some(sealing_key);
        self.remote_seq_number = self.remote_seq_number.wrapping_add(1);

        if self.sealing {
            Ok(DecryptionFlags::empty())
        } else {
            Ok(DecryptionFlags::SIGN_ONLY)
        }
    }

    #[instrument(level = "debug", ret, fields(state = ?self.state), skip_all)]
    fn make_signature(&mut self, _flags: u32, message: &mut [SecurityBuffer], _sequence_number: u32) -> crate::Result<()> {
        self.check_established()?;

        let token_len = SecurityBuffer::find_buffer(message, SecurityBufferType::Token)?.buffer.len();
        if token_len < SIGNATURE_SIZE {
            return Err(Error::new(ErrorKind::BufferTooSmall, "the Token buffer is too small"));
        }

        let sequence_number = self.our_seq_number;
        let data = SecurityBuffer::find_buffer(message, SecurityBufferType::Data)?;
        let digest = compute_digest(self.send_signing_key.as_ref(), sequence_number, &data.buffer)?;

        let checksum = self
            .send_sealing_key
            .as_mut()
            .ok_or_else(|| Error::new(ErrorKind::OutOfSequence, "the sealing key is not established"))?
            .process(&digest[..SIGNATURE_CHECKSUM_SIZE]);

        let token = SecurityBuffer::find_buffer_mut(message, SecurityBufferType::Token)?;
        token.buffer.truncate(SIGNATURE_SIZE);
        token.buffer.copy_from_slice(&compute_signature(&checksum, sequence_number));

        self.our_seq_number = self.our_seq_number.wrapping_add(1);

        Ok(())
    }

    #[instrument(level = "debug", ret, fields(state = ?self.state), skip_all)]
    fn verify_signature(&mut self, message: &mut [SecurityBuffer], _sequence_number: u32) -> crate::Result<u32> {
        self.check_established()?;

        let signature = SecurityBuffer::find_buffer(message, SecurityBufferType::Token)?.buffer.as_slice();
        if signature.len() != SIGNATURE_SIZE {
            return Err(Error::new(
                ErrorKind::InvalidToken,
                format!("invalid signature size: {}", signature.len()),
            ));
        }
        let sequence_number = self.check_remote_seq_number(signature)?;

        let data = SecurityBuffer::find_buffer(message, SecurityBufferType::Data)?;
        let digest = compute_digest(self.recv_signing_key.as_ref(), sequence_number, &data.buffer)?;

        let mut sealing_key = self
            .recv_sealing_key
            .clone()
            .ok_or_else(|| Error::new(ErrorKind::OutOfSequence, "the sealing key is not established"))?;
        check_signature(&mut sealing_key, sequence_number, &digest, signature)?;

        self.recv_sealing_key = Some(sealing_key);
        self.remote_seq_number = self.remote_seq_number.wrapping_add(1);

        Ok(0)
    }

    #[instrument(level = "debug", ret, fields(state = ?self.state), skip(self))]
    fn query_context_sizes(&mut self) -> crate::Result<ContextSizes> {
        Ok(ContextSizes {
            max_token: 2010,
            max_signature: SIGNATURE_SIZE as u32,
            block: 0,
            security_trailer: SIGNATURE_SIZE as u32,
        })
    }

    #[instrument(level = "debug", ret, fields(state = ?self.state), skip(self))]
    fn query_context_names(&mut self) -> crate::Result<ContextNames> {
        if let Some(identity_buffers) = &self.identity {
            let identity =
                AuthIdentity::try_from(identity_buffers).map_err(|e| Error::new(ErrorKind::InvalidParameter, e))?;

            Ok(ContextNames {
                username: identity.username,
                domain: identity.domain,
            })
        } else {
            Err(Error::new(
                ErrorKind::NoCredentials,
                "Requested Names, but no credentials were provided",
            ))
        }
    }

    #[instrument(level = "debug", ret, fields(state = ?self.state), skip(self))]
    fn query_context_package_info(&mut self) -> crate::Result<PackageInfo> {
        crate::query_security_package_info(SecurityPackageType::Ntlm)
    }

    #[instrument(level = "debug", fields(state = ?self.state), skip(self))]
    fn query_context_session_key(&self) -> crate::Result<SessionKeys> {
        if let Some(session_key) = &self.session_key {
            Ok(SessionKeys {
                session_key: session_key.as_ref().to_vec().into(),
            })
        } else {
            Err(Error::new(
                ErrorKind::OutOfSequence,
                "the session key is not established",
            ))
        }
    }
}

impl NegotiateMessage {
    fn new(message: Vec<u8>, flags: NegotiateFlags) -> Self {
        Self { message, flags }
    }
}

impl ChallengeMessage {
    fn new(
        message: Vec<u8>,
        target_info: Vec<u8>,
        server_challenge: [u8; CHALLENGE_SIZE],
        timestamp: Option<u64>,
        flags: NegotiateFlags,
    ) -> Self {
        Self {
            message,
            target_info,
            server_challenge,
            timestamp,
            flags,
        }
    }
}

impl AuthenticateMessage {
    fn new(
        message: Vec<u8>,
        mic: Option<Mic>,
        target_info: Vec<u8>,
        client_challenge: [u8; CHALLENGE_SIZE],
        encrypted_random_session_key: Option<[u8; SESSION_KEY_SIZE]>,
    ) -> Self {
        Self {
            message,
            mic,
            target_info,
            client_challenge,
            encrypted_random_session_key,
        }
    }
}

impl Mic {
    fn new(value: [u8; MESSAGE_INTEGRITY_CHECK_SIZE], offset: usize) -> Self {
        Self { value, offset }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub(crate) struct NegotiateFlags: u32 {
        /// W-bit
        /// requests 56-bit encryption
        const NTLM_SSP_NEGOTIATE56 = 0x8000_0000;

        /// V-bit
        /// requests explicit key exchange
        const NTLM_SSP_NEGOTIATE_KEY_EXCH = 0x4000_0000;

        /// U-bit
        /// requests an 128 bit session key
        const NTLM_SSP_NEGOTIATE128 = 0x2000_0000;

        /// r1
        const NTLM_SSP_NEGOTIATE_RESERVED1  = 0x1000_0000;

        /// r2
        const NTLM_SSP_NEGOTIATE_RESERVED2 = 0x0800_0000;

        /// r3
        const NTLM_SSP_NEGOTIATE_RESERVED3 = 0x0400_0000;

        /// r6
        const NTLM_SSP_NEGOTIATE_VERSION = 0x0200_0000;

        /// r4
        const NTLM_SSP_NEGOTIATE_RESERVED4 = 0x0100_0000;

        /// S-bit
        const NTLM_SSP_NEGOTIATE_TARGET_INFO = 0x0080_0000;

        /// R
        const NTLM_SSP_NEGOTIATE_REQUEST_NON_NT_SESSION_KEY = 0x0040_0000;

        /// r5
        const NTLM_SSP_NEGOTIATE_RESERVED5 = 0x0020_0000;

        /// Q
        const NTLM_SSP_NEGOTIATE_IDENTIFY = 0x0010_0000;

        /// P-bit
        /// NTLMv2 Session Security
        const NTLM_SSP_NEGOTIATE_EXTENDED_SESSION_SECURITY = 0x0008_0000;

        /// r6
        const NTLM_SSP_NEGOTIATE_RESERVED6 = 0x0004_0000;

        /// O
        const NTLM_SSP_NEGOTIATE_TARGET_TYPE_SERVER = 0x0002_0000;

        /// N
        const NTLM_SSP_NEGOTIATE_TARGET_TYPE_DOMAIN = 0x0001_0000;

        /// M-bit
        /// requests a signature block
        const NTLM_SSP_NEGOTIATE_ALWAYS_SIGN = 0x0000_8000;

        /// r7
        const NTLM_SSP_NEGOTIATE_RESERVED7 = 0x0000_4000;

        /// L-bit
        const NTLM_SSP_NEGOTIATE_WORKSTATION_SUPPLIED = 0x0000_2000;

        /// K-bit
        const NTLM_SSP_NEGOTIATE_DOMAIN_SUPPLIED = 0x0000_1000;

        /// J
        const NTLM_SSP_NEGOTIATE_ANONYMOUS = 0x0000_0800;

        /// r8
        const NTLM_SSP_NEGOTIATE_RESERVED8 = 0x0000_0400;

        /// H-bit
        /// NTLMv1 Session Security, deprecated, insecure and not supported by us
        const NTLM_SSP_NEGOTIATE_NTLM = 0x0000_0200;

        /// r9
        const NTLM_SSP_NEGOTIATE_RESERVED9 = 0x0000_0100;

        /// G-bit
        /// LM Session Security, deprecated, insecure and not supported by us
        const NTLM_SSP_NEGOTIATE_LM_KEY = 0x0000_0080;

        /// F
        const NTLM_SSP_NEGOTIATE_DATAGRAM = 0x0000_0040;

        /// E-bit
        /// session key negotiation with message confidentiality
        const NTLM_SSP_NEGOTIATE_SEAL = 0x0000_0020;

        /// D-bit
        const NTLM_SSP_NEGOTIATE_SIGN = 0x0000_0010;

        /// r10
        const NTLM_SSP_NEGOTIATE_SIGN_RESERVED10 = 0x0000_0008;

        /// C-bit
        const NTLM_SSP_NEGOTIATE_REQUEST_TARGET = 0x0000_0004;

        /// B-bit
        const NTLM_SSP_NEGOTIATE_OEM = 0x0000_0002;

        /// A-bit
        const NTLM_SSP_NEGOTIATE_UNICODE = 0x0000_0001;
    }
}

fn compute_digest(key: &[u8], seq_num: u32, data: &[u8]) -> crate::Result<[u8; HASH_SIZE]> {
    let mut digest_data = Vec::with_capacity(SIGNATURE_SEQ_NUM_SIZE + data.len());
    digest_data.write_u32::<LittleEndian>(seq_num)?;
    digest_data.extend_from_slice(data);

    compute_hmac_md5(key, &digest_data)
}

fn compute_signature(checksum: &[u8], seq_num: u32) -> [u8; SIGNATURE_SIZE] {
    let mut signature = [0x00; SIGNATURE_SIZE];
    signature[..SIGNATURE_VERSION_SIZE].clone_from_slice(&MESSAGES_VERSION.to_le_bytes());
    signature[SIGNATURE_VERSION_SIZE..SIGNATURE_VERSION_SIZE + SIGNATURE_CHECKSUM_SIZE].clone_from_slice(checksum);
    signature[SIGNATURE_VERSION_SIZE + SIGNATURE_CHECKSUM_SIZE..].clone_from_slice(&seq_num.to_le_bytes());

    signature
}

fn check_signature(
    sealing_key: &mut Rc4,
    sequence_number: u32,
    digest: &[u8; HASH_SIZE],
    signature: &[u8],
) -> crate::Result<()> {
    let checksum = sealing_key.process(&digest[..SIGNATURE_CHECKSUM_SIZE]);
    let expected_signature = compute_signature(&checksum, sequence_number);

    if signature != expected_signature.as_ref() {
        return Err(Error::new(
            ErrorKind::MessageAltered,
            "signature verification failed, something nasty is going on",
        ));
    }

    Ok(())
}
