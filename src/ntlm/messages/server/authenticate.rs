use crate::channel_bindings::ChannelBindings;
use crate::crypto::{compute_md5_channel_bindings_hash, HASH_SIZE};
use crate::cursor::ReadCursor;
use crate::ntlm::messages::av_pair::{AvPair, MsvAvFlags, AV_PAIR_CHANNEL_BINDINGS};
use crate::ntlm::messages::computations::*;
use crate::ntlm::messages::{read_negotiate_flags, read_ntlm_header, try_read_version, MessageFields, MessageTypes};
use crate::ntlm::{
    AuthIdentityBuffers, AuthenticateMessage, Mic, NegotiateFlags, Ntlm, NtlmAccounts, NtlmState,
    MESSAGE_INTEGRITY_CHECK_SIZE, SESSION_KEY_SIZE,
};
use crate::{utils, Error, ErrorKind, Secret, SecurityStatus};

struct AuthenticateMessageFields {
    lm_challenge_response: MessageFields,
    nt_challenge_response: MessageFields,
    domain_name: MessageFields,
    user_name: MessageFields,
    workstation: MessageFields,
    encrypted_random_session_key: MessageFields,
}

struct ParsedAuthenticateMessage {
    flags: NegotiateFlags,
    fields: AuthenticateMessageFields,
    /// Offset right after the optional VERSION block, where a MIC would start.
    mic_offset: usize,
}

fn check_state(state: NtlmState) -> crate::Result<()> {
    if state != NtlmState::Authenticate {
        Err(Error::new(
            ErrorKind::OutOfSequence,
            "Read authenticate was fired but the state is not an Authenticate",
        ))
    } else {
        Ok(())
    }
}

/// Verifies the client's Authenticate message against the server credentials and completes the server side
/// of the handshake.
///
/// The client's user is verified with the password of `credentials`. Without a password, its NT hash is
/// looked up in the configured accounts. `channel_bindings` replace the ones already set on the context.
///
/// Every check runs before the context is updated, so a rejected message leaves it as it was.
pub(crate) fn read_authenticate(
    context: &mut Ntlm,
    credentials: Option<&AuthIdentityBuffers>,
    channel_bindings: Option<ChannelBindings>,
    message: &[u8],
) -> crate::Result<SecurityStatus> {
    check_state(context.state)?;

    let parsed = read_message(message)?;
    let flags = parsed.flags;
    let fields = parsed.fields;

    if fields.nt_challenge_response.buffer.is_empty() {
        return Err(Error::new(ErrorKind::InvalidToken, "NtChallengeResponse cannot be empty"));
    }

    let response = read_ntlm_v2_response(&fields.nt_challenge_response.buffer)?;
    let av_pairs = AvPair::buffer_to_av_pairs(&response.target_info)?;

    let mic = if get_av_flags_from_response(&av_pairs).contains(MsvAvFlags::MESSAGE_INTEGRITY_CHECK) {
        let cursor = ReadCursor::new(message);
        let mut value = [0x00; MESSAGE_INTEGRITY_CHECK_SIZE];
        value.copy_from_slice(cursor.slice_at(parsed.mic_offset, MESSAGE_INTEGRITY_CHECK_SIZE)?);

        Some(Mic::new(value, parsed.mic_offset))
    } else {
        None
    };

    let encrypted_random_session_key = if flags.contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_KEY_EXCH) {
        let key = &fields.encrypted_random_session_key.buffer;
        if key.len() != SESSION_KEY_SIZE {
            return Err(Error::new(
                ErrorKind::InvalidToken,
                format!(
                    "Encrypted random session key has wrong length. Expected {} bytes, got {} bytes.",
                    SESSION_KEY_SIZE,
                    key.len()
                ),
            ));
        }

        let mut encrypted_random_session_key = [0x00; SESSION_KEY_SIZE];
        encrypted_random_session_key.copy_from_slice(key);
        Some(encrypted_random_session_key)
    } else {
        None
    };

    let identity = resolve_identity(
        credentials,
        context.config.accounts.as_ref(),
        fields.user_name.buffer,
        fields.domain_name.buffer,
    )?;

    let challenge = context
        .challenge_message
        .as_ref()
        .ok_or_else(|| Error::new(ErrorKind::OutOfSequence, "the Challenge message was not sent"))?;
    let negotiate = context
        .negotiate_message
        .as_ref()
        .ok_or_else(|| Error::new(ErrorKind::OutOfSequence, "the Negotiate message was not received"))?;

    let ntlm_v2_hash = compute_ntlm_v2_hash(&identity)?;
    let nt_proof = compute_nt_proof(&challenge.server_challenge, &response.blob, ntlm_v2_hash.as_ref())?;
    if nt_proof != response.nt_proof {
        return Err(Error::new(
            ErrorKind::MessageAltered,
            "NtProofStr does not match: wrong credentials or altered response",
        ));
    }

    let channel_bindings = channel_bindings.or_else(|| context.channel_bindings.clone());
    check_channel_bindings(channel_bindings.as_ref(), &av_pairs)?;

    let key_exchange_key = compute_session_base_key(ntlm_v2_hash.as_ref(), &nt_proof)?;
    let exported_session_key = match &encrypted_random_session_key {
        Some(encrypted_random_session_key) => {
            Secret::new(rc4_session_key(key_exchange_key.as_ref(), encrypted_random_session_key))
        }
        None => key_exchange_key,
    };

    if let Some(mic) = &mic {
        let mut authenticate_message = message.to_vec();
        authenticate_message[mic.offset..mic.offset + MESSAGE_INTEGRITY_CHECK_SIZE].fill(0x00);

        let expected = compute_message_integrity_check(
            &negotiate.message,
            &challenge.message,
            &authenticate_message,
            exported_session_key.as_ref(),
        )?;
        if expected != mic.value {
            return Err(Error::new(
                ErrorKind::MessageAltered,
                "Message Integrity Check (MIC) verification failed",
            ));
        }
    }

    debug!(?flags, mic = mic.is_some(), "NTLM Authenticate message is verified");

    context.flags = flags;
    context.authenticate_message = Some(AuthenticateMessage::new(
        message.to_vec(),
        mic,
        response.target_info,
        response.client_challenge,
        encrypted_random_session_key,
    ));
    context.identity = Some(identity);
    context.channel_bindings = channel_bindings;
    context.session_key = Some(exported_session_key);
    context.reset_cipher_state()?;
    context.state = NtlmState::Final;

    Ok(SecurityStatus::Ok)
}

fn read_message(message: &[u8]) -> crate::Result<ParsedAuthenticateMessage> {
    let mut cursor = ReadCursor::new(message);

    read_ntlm_header(&mut cursor, MessageTypes::Authenticate)?;
    let lm_challenge_response = MessageFields::read_from(&mut cursor)?;
    let nt_challenge_response = MessageFields::read_from(&mut cursor)?;
    let domain_name = MessageFields::read_from(&mut cursor)?;
    let user_name = MessageFields::read_from(&mut cursor)?;
    let workstation = MessageFields::read_from(&mut cursor)?;
    let encrypted_random_session_key = MessageFields::read_from(&mut cursor)?;
    let flags = read_negotiate_flags(&mut cursor)?;
    let _version = try_read_version(flags, &mut cursor)?;
    let mic_offset = cursor.pos();

    let fields = AuthenticateMessageFields {
        lm_challenge_response: MessageFields::read_buffer_from(&cursor, lm_challenge_response)?,
        nt_challenge_response: MessageFields::read_buffer_from(&cursor, nt_challenge_response)?,
        domain_name: MessageFields::read_buffer_from(&cursor, domain_name)?,
        user_name: MessageFields::read_buffer_from(&cursor, user_name)?,
        workstation: MessageFields::read_buffer_from(&cursor, workstation)?,
        encrypted_random_session_key: MessageFields::read_buffer_from(&cursor, encrypted_random_session_key)?,
    };

    trace!(
        lm_len = fields.lm_challenge_response.buffer.len(),
        workstation_len = fields.workstation.buffer.len(),
        "NTLM Authenticate message fields are resolved"
    );

    Ok(ParsedAuthenticateMessage {
        flags,
        fields,
        mic_offset,
    })
}

/// Builds the identity the client's response is checked against.
fn resolve_identity(
    credentials: Option<&AuthIdentityBuffers>,
    accounts: Option<&NtlmAccounts>,
    user: Vec<u8>,
    domain: Vec<u8>,
) -> crate::Result<AuthIdentityBuffers> {
    if let Some(credentials) = credentials.filter(|credentials| !credentials.password.is_empty()) {
        return Ok(AuthIdentityBuffers {
            user,
            domain,
            password: credentials.password.clone(),
        });
    }

    let accounts = accounts.ok_or_else(|| {
        Error::new(
            ErrorKind::NoCredentials,
            "the server has neither a password nor an account store to verify the Authenticate message",
        )
    })?;

    let user_name = utils::bytes_to_utf16_string(&user)?;
    let domain_name = utils::bytes_to_utf16_string(&domain)?;
    let nt_hash = accounts.lookup(&user_name, &domain_name).ok_or_else(|| {
        Error::new(
            ErrorKind::LogonDenied,
            format!("unknown account: {}\\{}", domain_name, user_name),
        )
    })?;

    debug!(user = %user_name, domain = %domain_name, "NTLM account is found");

    let password = Secret::new(nt_hash.as_sspi_password());

    Ok(AuthIdentityBuffers {
        user,
        domain,
        password: utils::string_to_utf16(password.as_ref()).into(),
    })
}

fn check_channel_bindings(channel_bindings: Option<&ChannelBindings>, av_pairs: &[AvPair]) -> crate::Result<()> {
    let (Some(AvPair::ChannelBindings(hash)), Some(channel_bindings)) =
        (AvPair::find(av_pairs, AV_PAIR_CHANNEL_BINDINGS), channel_bindings)
    else {
        return Ok(());
    };

    // a client without bindings sends zeros
    if *hash != [0x00; HASH_SIZE] && compute_md5_channel_bindings_hash(channel_bindings) != *hash {
        return Err(Error::new(ErrorKind::BadBindings, "Channel bindings hash mismatch"));
    }

    Ok(())
}
