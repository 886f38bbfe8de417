#![allow(dead_code)]

use std::sync::LazyLock;

use rdp_sspi::{
    AcquireCredentialsHandleResult, AuthIdentity, ClientRequestFlags, CredentialUse, EncryptionFlags,
    SecurityBuffer, SecurityBufferType, SecurityStatus, ServerRequestFlags, Sspi,
};
use time::OffsetDateTime;

pub static CREDENTIALS: LazyLock<AuthIdentity> = LazyLock::new(|| AuthIdentity {
    username: "Username".to_owned(),
    password: String::from("Password").into(),
    domain: Some("Domain".to_owned()),
});

pub const TARGET_NAME: &str = "TERMSRV/DESKTOP-8F33RFH.example.com";

const MESSAGE_TO_CLIENT: &[u8] = b"Hello, client!";
const MESSAGE_TO_SERVER: &[u8] = b"Hello, server!";

/// Installs a test subscriber once, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn create_client_credentials_handle<T>(
    client: &mut T,
    auth_data: Option<&T::AuthenticationData>,
) -> rdp_sspi::Result<T::CredentialsHandle>
where
    T: Sspi,
{
    let AcquireCredentialsHandleResult {
        credentials_handle,
        expiry,
    } = if let Some(auth_data) = auth_data {
        client
            .acquire_credentials_handle()
            .with_credential_use(CredentialUse::Outbound)
            .with_auth_data(auth_data)
            .execute(client)?
    } else {
        client
            .acquire_credentials_handle()
            .with_credential_use(CredentialUse::Outbound)
            .execute(client)?
    };

    if let Some(expiry) = expiry {
        let now = OffsetDateTime::now_utc();
        assert!(now < expiry);
    }

    Ok(credentials_handle)
}

/// The acceptor verifies the initiator against the credentials of its handle.
pub fn create_server_credentials_handle<T>(
    server: &mut T,
    auth_data: &T::AuthenticationData,
) -> rdp_sspi::Result<T::CredentialsHandle>
where
    T: Sspi,
{
    let AcquireCredentialsHandleResult {
        credentials_handle,
        expiry,
    } = server
        .acquire_credentials_handle()
        .with_credential_use(CredentialUse::Inbound)
        .with_auth_data(auth_data)
        .execute(server)?;

    if let Some(expiry) = expiry {
        let now = OffsetDateTime::now_utc();
        assert!(now < expiry);
    }

    Ok(credentials_handle)
}

pub fn initialize<T: Sspi>(
    client: &mut T,
    credentials_handle: &mut T::CredentialsHandle,
    flags: ClientRequestFlags,
    input: &mut [SecurityBuffer],
) -> rdp_sspi::Result<(SecurityStatus, Vec<SecurityBuffer>)> {
    let mut output = vec![SecurityBuffer::new(Vec::new(), SecurityBufferType::Token)];

    let result = client
        .initialize_security_context()
        .with_credentials_handle(credentials_handle)
        .with_context_requirements(flags)
        .with_target_name(TARGET_NAME)
        .with_input(input)
        .with_output(&mut output)
        .execute(client)?;

    Ok((result.status, output))
}

pub fn accept<T: Sspi>(
    server: &mut T,
    credentials_handle: &mut T::CredentialsHandle,
    flags: ServerRequestFlags,
    input: &mut [SecurityBuffer],
) -> rdp_sspi::Result<(SecurityStatus, Vec<SecurityBuffer>)> {
    let mut output = vec![SecurityBuffer::new(Vec::new(), SecurityBufferType::Token)];

    let result = server
        .accept_security_context()
        .with_credentials_handle(credentials_handle)
        .with_context_requirements(flags)
        .with_input(input)
        .with_output(&mut output)
        .execute(server)?;

    Ok((result.status, output))
}

/// Runs the handshake until both sides report `SecurityStatus::Ok`.
pub fn process_authentication<ClientSspi, ServerSspi>(
    client: &mut ClientSspi,
    mut client_credentials_handle: ClientSspi::CredentialsHandle,
    client_flags: ClientRequestFlags,
    server: &mut ServerSspi,
    mut server_credentials_handle: ServerSspi::CredentialsHandle,
    server_flags: ServerRequestFlags,
) -> rdp_sspi::Result<()>
where
    ClientSspi: Sspi,
    ServerSspi: Sspi,
{
    let mut server_output = Vec::new();
    let mut server_status = SecurityStatus::ContinueNeeded;

    loop {
        let (client_status, mut client_output) =
            initialize(client, &mut client_credentials_handle, client_flags, &mut server_output)?;

        if client_status == SecurityStatus::Ok && server_status == SecurityStatus::Ok {
            return Ok(());
        }

        let (status, output) = accept(server, &mut server_credentials_handle, server_flags, &mut client_output)?;
        server_status = status;
        server_output = output;

        if client_status == SecurityStatus::Ok && server_status == SecurityStatus::Ok {
            return Ok(());
        }
    }
}

/// Seals a message with `sender` and opens it with `receiver`.
pub fn send_message(sender: &mut impl Sspi, receiver: &mut impl Sspi, plain: &[u8]) -> rdp_sspi::Result<()> {
    let sizes = sender.query_context_sizes()?;

    let mut message = vec![
        SecurityBuffer::new(vec![0; sizes.security_trailer as usize], SecurityBufferType::Token),
        SecurityBuffer::new(plain.to_vec(), SecurityBufferType::Data),
    ];

    sender.encrypt_message(EncryptionFlags::empty(), &mut message, 0)?;
    assert_ne!(plain, message[1].buffer.as_slice());

    receiver.decrypt_message(&mut message, 0)?;
    assert_eq!(plain, message[1].buffer.as_slice());

    Ok(())
}

pub fn check_messages_encryption(client: &mut impl Sspi, server: &mut impl Sspi) -> rdp_sspi::Result<()> {
    send_message(server, client, MESSAGE_TO_CLIENT)?;
    send_message(client, server, MESSAGE_TO_SERVER)?;

    Ok(())
}
