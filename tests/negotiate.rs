pub mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{
    accept, check_messages_encryption, create_client_credentials_handle, create_server_credentials_handle,
    init_tracing, initialize, process_authentication, CREDENTIALS,
};
use rdp_sspi::{
    AcceptSecurityContextResult, AcquireCredentialsHandleResult, AuthIdentity, AuthIdentityBuffers,
    ClientRequestFlags, ClientResponseFlags, ContextNames, ContextSizes, DecryptionFlags, EncryptionFlags, Error,
    ErrorKind, FilledAcceptSecurityContext, FilledAcquireCredentialsHandle, FilledInitializeSecurityContext,
    InitializeSecurityContextResult, KerberosAvailability, Negotiate, NegotiateConfig, NegotiatedProtocol, Ntlm,
    NtlmConfig, PackageInfo, ProtocolConfig, SecurityBuffer, SecurityBufferType, SecurityPackageType,
    SecurityStatus, ServerRequestFlags, ServerResponseFlags, SessionKeys, Sspi, SspiImpl,
};

const CLIENT_FLAGS: ClientRequestFlags = ClientRequestFlags::CONFIDENTIALITY.union(ClientRequestFlags::ALLOCATE_MEMORY);
const SERVER_FLAGS: ServerRequestFlags = ServerRequestFlags::ALLOCATE_MEMORY;

/// Kerberos stand-in without a reachable KDC: the first leg always lacks credentials.
#[derive(Debug, Default)]
struct NoTicketKerberos {
    initialize_calls: Arc<AtomicUsize>,
    accept_calls: Arc<AtomicUsize>,
}

impl SspiImpl for NoTicketKerberos {
    type CredentialsHandle = Option<AuthIdentityBuffers>;
    type AuthenticationData = AuthIdentity;

    fn acquire_credentials_handle_impl(
        &mut self,
        builder: FilledAcquireCredentialsHandle<'_, Self::CredentialsHandle, Self::AuthenticationData>,
    ) -> rdp_sspi::Result<AcquireCredentialsHandleResult<Self::CredentialsHandle>> {
        Ok(AcquireCredentialsHandleResult {
            credentials_handle: builder.auth_data.cloned().map(AuthIdentityBuffers::from),
            expiry: None,
        })
    }

    fn initialize_security_context_impl(
        &mut self,
        _builder: &mut FilledInitializeSecurityContext<'_, Self::CredentialsHandle>,
    ) -> rdp_sspi::Result<InitializeSecurityContextResult> {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);

        Err(Error::new(ErrorKind::NoCredentials, "no TGT for the user"))
    }

    fn accept_security_context_impl(
        &mut self,
        _builder: FilledAcceptSecurityContext<'_, Self::CredentialsHandle>,
    ) -> rdp_sspi::Result<AcceptSecurityContextResult> {
        self.accept_calls.fetch_add(1, Ordering::SeqCst);

        Ok(AcceptSecurityContextResult {
            status: SecurityStatus::ContinueNeeded,
            flags: ServerResponseFlags::empty(),
            expiry: None,
        })
    }
}

fn unsupported<T>() -> rdp_sspi::Result<T> {
    Err(Error::new(ErrorKind::UnsupportedFunction, "not a real Kerberos context"))
}

impl Sspi for NoTicketKerberos {
    fn complete_auth_token(&mut self, _token: &mut [SecurityBuffer]) -> rdp_sspi::Result<SecurityStatus> {
        unsupported()
    }

    fn encrypt_message(
        &mut self,
        _flags: EncryptionFlags,
        _message: &mut [SecurityBuffer],
        _sequence_number: u32,
    ) -> rdp_sspi::Result<SecurityStatus> {
        unsupported()
    }

    fn decrypt_message(
        &mut self,
        _message: &mut [SecurityBuffer],
        _sequence_number: u32,
    ) -> rdp_sspi::Result<DecryptionFlags> {
        unsupported()
    }

    fn make_signature(
        &mut self,
        _flags: u32,
        _message: &mut [SecurityBuffer],
        _sequence_number: u32,
    ) -> rdp_sspi::Result<()> {
        unsupported()
    }

    fn verify_signature(&mut self, _message: &mut [SecurityBuffer], _sequence_number: u32) -> rdp_sspi::Result<u32> {
        unsupported()
    }

    fn query_context_sizes(&mut self) -> rdp_sspi::Result<ContextSizes> {
        unsupported()
    }

    fn query_context_names(&mut self) -> rdp_sspi::Result<ContextNames> {
        unsupported()
    }

    fn query_context_package_info(&mut self) -> rdp_sspi::Result<PackageInfo> {
        rdp_sspi::query_security_package_info(SecurityPackageType::Kerberos)
    }

    fn query_context_session_key(&self) -> rdp_sspi::Result<SessionKeys> {
        unsupported()
    }
}

#[derive(Debug, Clone, Default)]
struct NoTicketKerberosConfig {
    initialize_calls: Arc<AtomicUsize>,
    accept_calls: Arc<AtomicUsize>,
}

impl NoTicketKerberosConfig {
    fn initialize_calls(&self) -> usize {
        self.initialize_calls.load(Ordering::SeqCst)
    }

    fn accept_calls(&self) -> usize {
        self.accept_calls.load(Ordering::SeqCst)
    }
}

impl ProtocolConfig for NoTicketKerberosConfig {
    fn new_instance(&self) -> rdp_sspi::Result<NegotiatedProtocol> {
        Ok(NegotiatedProtocol::Kerberos(Box::new(NoTicketKerberos {
            initialize_calls: Arc::clone(&self.initialize_calls),
            accept_calls: Arc::clone(&self.accept_calls),
        })))
    }

    fn box_clone(&self) -> Box<dyn ProtocolConfig> {
        Box::new(self.clone())
    }
}

fn negotiate(
    kerberos: &NoTicketKerberosConfig,
    package_list: Option<&str>,
    kerberos_availability: &KerberosAvailability,
) -> Negotiate {
    Negotiate::new(NegotiateConfig::new(
        Box::new(kerberos.clone()),
        NtlmConfig::new("CLIENT-PC".to_owned()),
        package_list.map(str::to_owned),
        kerberos_availability.clone(),
    ))
    .unwrap()
}

fn authenticate_against_ntlm_server(client: &mut Negotiate) -> rdp_sspi::Result<Ntlm> {
    let client_credentials_handle = create_client_credentials_handle(client, Some(&*CREDENTIALS))?;

    let mut server = Ntlm::new();
    let server_credentials_handle = create_server_credentials_handle(&mut server, &CREDENTIALS)?;

    process_authentication(
        client,
        client_credentials_handle,
        CLIENT_FLAGS,
        &mut server,
        server_credentials_handle,
        SERVER_FLAGS,
    )?;

    Ok(server)
}

#[test]
fn falls_back_to_ntlm_without_kerberos_credentials() {
    init_tracing();

    let kerberos = NoTicketKerberosConfig::default();
    let availability = KerberosAvailability::new();
    let mut client = negotiate(&kerberos, None, &availability);
    assert!(matches!(client.negotiated_protocol(), NegotiatedProtocol::Kerberos(_)));

    let mut server = authenticate_against_ntlm_server(&mut client).unwrap();

    assert!(matches!(client.negotiated_protocol(), NegotiatedProtocol::Ntlm(_)));
    assert_eq!(kerberos.initialize_calls(), 1);
    assert!(!availability.is_available());
    assert_eq!(
        client.query_context_package_info().unwrap().name,
        SecurityPackageType::Ntlm
    );

    check_messages_encryption(&mut client, &mut server).unwrap();
}

#[test]
fn later_contexts_skip_kerberos_after_a_fallback() {
    let kerberos = NoTicketKerberosConfig::default();
    let availability = KerberosAvailability::new();

    let mut first = negotiate(&kerberos, None, &availability);
    authenticate_against_ntlm_server(&mut first).unwrap();

    let mut second = negotiate(&kerberos, None, &availability);
    assert!(matches!(second.negotiated_protocol(), NegotiatedProtocol::Ntlm(_)));

    authenticate_against_ntlm_server(&mut second).unwrap();
    assert_eq!(kerberos.initialize_calls(), 1);
}

#[test]
fn fallback_is_visible_to_contexts_on_other_threads() {
    let kerberos = NoTicketKerberosConfig::default();
    let availability = KerberosAvailability::new();

    let mut first = negotiate(&kerberos, None, &availability);
    std::thread::spawn(move || authenticate_against_ntlm_server(&mut first).map(|_| ()))
        .join()
        .unwrap()
        .unwrap();

    let second = negotiate(&kerberos, None, &availability);

    assert!(matches!(second.negotiated_protocol(), NegotiatedProtocol::Ntlm(_)));
}

#[test]
fn independent_availability_still_tries_kerberos() {
    let kerberos = NoTicketKerberosConfig::default();

    let mut first = negotiate(&kerberos, None, &KerberosAvailability::new());
    authenticate_against_ntlm_server(&mut first).unwrap();

    let second = negotiate(&kerberos, None, &KerberosAvailability::new());

    assert!(matches!(second.negotiated_protocol(), NegotiatedProtocol::Kerberos(_)));
}

#[test]
fn no_fallback_when_ntlm_is_disabled() {
    let kerberos = NoTicketKerberosConfig::default();
    let availability = KerberosAvailability::new();
    let mut client = negotiate(&kerberos, Some("kerberos,!ntlm"), &availability);

    let mut credentials_handle = create_client_credentials_handle(&mut client, Some(&*CREDENTIALS)).unwrap();
    let error = initialize(&mut client, &mut credentials_handle, CLIENT_FLAGS, &mut []).unwrap_err();

    assert_eq!(error.error_type, ErrorKind::NoCredentials);
    assert!(matches!(client.negotiated_protocol(), NegotiatedProtocol::Kerberos(_)));
    assert!(availability.is_available());
}

#[test]
fn kerberos_disabled_in_package_list_selects_ntlm() {
    let kerberos = NoTicketKerberosConfig::default();
    let mut client = negotiate(&kerberos, Some("!kerberos"), &KerberosAvailability::new());

    assert!(matches!(client.negotiated_protocol(), NegotiatedProtocol::Ntlm(_)));

    authenticate_against_ntlm_server(&mut client).unwrap();
    assert_eq!(kerberos.initialize_calls(), 0);
}

#[test]
fn no_mechanism_left_is_an_error() {
    let availability = KerberosAvailability::new();
    availability.mark_unavailable();

    let error = Negotiate::new(NegotiateConfig::new(
        Box::new(NoTicketKerberosConfig::default()),
        NtlmConfig::default(),
        Some("!ntlm".to_owned()),
        availability,
    ))
    .unwrap_err();

    assert_eq!(error.error_type, ErrorKind::NoCredentials);
}

#[test]
fn acceptor_selects_ntlm_for_an_ntlm_token() {
    let kerberos = NoTicketKerberosConfig::default();
    let mut server = negotiate(&kerberos, None, &KerberosAvailability::new());
    let server_credentials_handle = create_server_credentials_handle(&mut server, &CREDENTIALS).unwrap();

    let mut client = Ntlm::new();
    let client_credentials_handle = create_client_credentials_handle(&mut client, Some(&*CREDENTIALS)).unwrap();

    process_authentication(
        &mut client,
        client_credentials_handle,
        CLIENT_FLAGS,
        &mut server,
        server_credentials_handle,
        SERVER_FLAGS,
    )
    .unwrap();

    assert!(matches!(server.negotiated_protocol(), NegotiatedProtocol::Ntlm(_)));
    assert_eq!(kerberos.accept_calls(), 0);

    check_messages_encryption(&mut client, &mut server).unwrap();
}

#[test]
fn acceptor_routes_other_tokens_to_kerberos() {
    let kerberos = NoTicketKerberosConfig::default();
    let mut server = negotiate(&kerberos, None, &KerberosAvailability::new());
    let mut credentials_handle = create_server_credentials_handle(&mut server, &CREDENTIALS).unwrap();

    // GSS-API InitialContextToken
    let mut input = vec![SecurityBuffer::new(vec![0x60, 0x82, 0x06, 0x1e], SecurityBufferType::Token)];
    let (status, _) = accept(&mut server, &mut credentials_handle, SERVER_FLAGS, &mut input).unwrap();

    assert_eq!(status, SecurityStatus::ContinueNeeded);
    assert_eq!(kerberos.accept_calls(), 1);
    assert!(matches!(server.negotiated_protocol(), NegotiatedProtocol::Kerberos(_)));
}

#[test]
fn acceptor_rejects_non_ntlm_token_when_kerberos_is_unusable() {
    let kerberos = NoTicketKerberosConfig::default();
    let mut server = negotiate(&kerberos, Some("!kerberos"), &KerberosAvailability::new());
    let mut credentials_handle = create_server_credentials_handle(&mut server, &CREDENTIALS).unwrap();

    let mut input = vec![SecurityBuffer::new(vec![0x60, 0x82, 0x06, 0x1e], SecurityBufferType::Token)];
    let error = accept(&mut server, &mut credentials_handle, SERVER_FLAGS, &mut input).unwrap_err();

    assert_eq!(error.error_type, ErrorKind::InvalidToken);
    assert_eq!(kerberos.accept_calls(), 0);
}

#[test]
fn negotiate_to_negotiate_over_ntlm() {
    let config = || {
        NegotiateConfig::new(
            Box::new(NtlmConfig::default()),
            NtlmConfig::default(),
            None,
            KerberosAvailability::new(),
        )
    };

    let mut client = Negotiate::new(config()).unwrap();
    let client_credentials_handle = create_client_credentials_handle(&mut client, Some(&*CREDENTIALS)).unwrap();
    let mut server = Negotiate::new(config()).unwrap();
    let server_credentials_handle = create_server_credentials_handle(&mut server, &CREDENTIALS).unwrap();

    process_authentication(
        &mut client,
        client_credentials_handle,
        CLIENT_FLAGS,
        &mut server,
        server_credentials_handle,
        SERVER_FLAGS,
    )
    .unwrap();

    check_messages_encryption(&mut client, &mut server).unwrap();

    let error = initialize(
        &mut client,
        &mut Some(AuthIdentityBuffers::from(CREDENTIALS.clone())),
        CLIENT_FLAGS,
        &mut [],
    )
    .unwrap_err();
    assert_eq!(error.error_type, ErrorKind::OutOfSequence);
}

#[test]
fn response_flags_come_from_the_selected_mechanism() {
    let kerberos = NoTicketKerberosConfig::default();
    let mut client = negotiate(&kerberos, None, &KerberosAvailability::new());
    let mut credentials_handle = create_client_credentials_handle(&mut client, Some(&*CREDENTIALS)).unwrap();

    let mut output = vec![SecurityBuffer::new(Vec::new(), SecurityBufferType::Token)];
    let result = client
        .initialize_security_context()
        .with_credentials_handle(&mut credentials_handle)
        .with_context_requirements(CLIENT_FLAGS)
        .with_output(&mut output)
        .execute(&mut client)
        .unwrap();

    assert_eq!(result.status, SecurityStatus::ContinueNeeded);
    assert!(result.flags.contains(ClientResponseFlags::CONFIDENTIALITY));
    assert!(output[0].buffer.starts_with(b"NTLMSSP\0"));
}
