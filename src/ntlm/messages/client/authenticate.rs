use std::io;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::channel_bindings::ChannelBindings;
use crate::ntlm::messages::computations::*;
use crate::ntlm::messages::{assign_offsets, write_ntlm_header, MessageFields, MessageTypes};
use crate::ntlm::{
    AuthIdentityBuffers, AuthenticateMessage, ChallengeMessage, Mic, NegotiateFlags, Ntlm, NtlmState,
    LM_CHALLENGE_RESPONSE_BUFFER_SIZE, MESSAGE_INTEGRITY_CHECK_SIZE,
};
use crate::{utils, Error, ErrorKind, SecurityStatus};

const HEADER_SIZE: usize = 64;
const LM_V2_MIN_COMPATIBILITY_LEVEL: u32 = 2;

struct AuthenticateMessageFields {
    lm_challenge_response: MessageFields,
    nt_challenge_response: MessageFields,
    domain_name: MessageFields,
    user_name: MessageFields,
    workstation: MessageFields,
    encrypted_random_session_key: MessageFields,
}

impl AuthenticateMessageFields {
    fn new(
        payload_offset: u32,
        lm_challenge_response: Vec<u8>,
        nt_challenge_response: Vec<u8>,
        identity: &AuthIdentityBuffers,
        workstation: Vec<u8>,
        encrypted_random_session_key: Vec<u8>,
    ) -> Self {
        let mut fields = Self {
            lm_challenge_response: MessageFields::with_buffer(lm_challenge_response),
            nt_challenge_response: MessageFields::with_buffer(nt_challenge_response),
            domain_name: MessageFields::with_buffer(identity.domain.clone()),
            user_name: MessageFields::with_buffer(identity.user.clone()),
            workstation: MessageFields::with_buffer(workstation),
            encrypted_random_session_key: MessageFields::with_buffer(encrypted_random_session_key),
        };

        assign_offsets(
            payload_offset,
            &mut [
                &mut fields.domain_name,
                &mut fields.user_name,
                &mut fields.workstation,
                &mut fields.lm_challenge_response,
                &mut fields.nt_challenge_response,
                &mut fields.encrypted_random_session_key,
            ],
        );

        fields
    }

    fn data_len(&self) -> usize {
        self.encrypted_random_session_key.end_offset() as usize
    }
}

fn check_state(state: NtlmState) -> crate::Result<()> {
    if state != NtlmState::Challenge {
        Err(Error::new(
            ErrorKind::OutOfSequence,
            "Write authenticate was fired but the state is not a Challenge",
        ))
    } else {
        Ok(())
    }
}

fn check_credentials(credentials: &AuthIdentityBuffers) -> crate::Result<()> {
    if credentials.is_empty() || credentials.password.is_empty() {
        Err(Error::new(
            ErrorKind::NoCredentials,
            "the user name or the password is missing",
        ))
    } else {
        Ok(())
    }
}

/// Answers `challenge` and completes the client side of the handshake.
///
/// `channel_bindings` replace the ones already set on the context. Nothing is committed to the context unless
/// the whole message could be built.
pub(crate) fn write_authenticate(
    context: &mut Ntlm,
    challenge: ChallengeMessage,
    credentials: &AuthIdentityBuffers,
    channel_bindings: Option<ChannelBindings>,
    service_principal_name: Option<&str>,
    mut transport: impl io::Write,
) -> crate::Result<SecurityStatus> {
    check_state(context.state)?;
    check_credentials(credentials)?;

    let channel_bindings = channel_bindings.or_else(|| context.channel_bindings.clone());

    let negotiate_message = context
        .negotiate_message
        .as_ref()
        .ok_or_else(|| Error::new(ErrorKind::OutOfSequence, "the Negotiate message was not sent"))?;

    let use_mic = (context.config.ntlm_v2 || context.config.use_mic) && challenge.timestamp.is_some();
    let timestamp = match challenge.timestamp {
        Some(timestamp) if timestamp != 0 => timestamp,
        _ => context.clock.file_time_now()?,
    };

    let target_info = get_authenticate_target_info(
        &challenge.target_info,
        AuthenticateTargetInfo {
            use_mic,
            send_single_host_data: context.config.send_single_host_data,
            suppress_extended_protection: context.config.suppress_extended_protection,
            channel_bindings: channel_bindings.as_ref(),
            service_principal_name,
        },
    )?;

    let client_challenge = generate_challenge(&mut *context.rng);
    let ntlm_v2_hash = compute_ntlm_v2_hash(credentials)?;

    let lm_challenge_response = if context.config.lm_compatibility_level < LM_V2_MIN_COMPATIBILITY_LEVEL {
        [0x00; LM_CHALLENGE_RESPONSE_BUFFER_SIZE]
    } else {
        compute_lm_v2_response(&client_challenge, &challenge.server_challenge, ntlm_v2_hash.as_ref())?
    };
    let (nt_challenge_response, key_exchange_key) = compute_ntlm_v2_response(
        &client_challenge,
        &challenge.server_challenge,
        &target_info,
        ntlm_v2_hash.as_ref(),
        timestamp,
    )?;

    let (exported_session_key, encrypted_random_session_key) =
        if challenge.flags.contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_KEY_EXCH) {
            let random_session_key = generate_random_session_key(&mut *context.rng);
            let encrypted_random_session_key = rc4_session_key(key_exchange_key.as_ref(), random_session_key.as_ref());

            (random_session_key, Some(encrypted_random_session_key))
        } else {
            (key_exchange_key, None)
        };

    let flags = get_flags(context, &challenge, credentials, use_mic);

    let workstation = if context.config.send_workstation_name {
        context
            .config
            .workstation
            .as_deref()
            .map(utils::string_to_utf16)
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    let mut payload_offset = HEADER_SIZE;
    if flags.contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_VERSION) {
        payload_offset += context.config.version.len();
    }
    if use_mic {
        payload_offset += MESSAGE_INTEGRITY_CHECK_SIZE;
    }

    let message_fields = AuthenticateMessageFields::new(
        payload_offset as u32,
        lm_challenge_response.to_vec(),
        nt_challenge_response,
        credentials,
        workstation,
        encrypted_random_session_key.map(|key| key.to_vec()).unwrap_or_default(),
    );

    let mut buffer = Vec::with_capacity(message_fields.data_len());
    let mic_offset = write_header(
        flags,
        &context.config.version,
        use_mic,
        &message_fields,
        &mut buffer,
    )?;
    write_payload(&message_fields, &mut buffer)?;

    let mic = if use_mic {
        let value = compute_message_integrity_check(
            &negotiate_message.message,
            &challenge.message,
            &buffer,
            exported_session_key.as_ref(),
        )?;
        buffer[mic_offset..mic_offset + MESSAGE_INTEGRITY_CHECK_SIZE].copy_from_slice(&value);

        Some(Mic::new(value, mic_offset))
    } else {
        None
    };

    transport.write_all(buffer.as_slice())?;
    transport.flush()?;

    debug!(?flags, use_mic, len = buffer.len(), "NTLM Authenticate message is written");

    context.flags = flags;
    context.challenge_message = Some(challenge);
    context.authenticate_message = Some(AuthenticateMessage::new(
        buffer,
        mic,
        target_info,
        client_challenge,
        encrypted_random_session_key,
    ));
    context.identity = Some(credentials.clone());
    context.channel_bindings = channel_bindings;
    context.session_key = Some(exported_session_key);
    context.reset_cipher_state()?;
    context.state = NtlmState::Final;

    Ok(SecurityStatus::Ok)
}

fn get_flags(
    context: &Ntlm,
    challenge: &ChallengeMessage,
    credentials: &AuthIdentityBuffers,
    use_mic: bool,
) -> NegotiateFlags {
    let mut flags = NegotiateFlags::NTLM_SSP_NEGOTIATE128
        | NegotiateFlags::NTLM_SSP_NEGOTIATE_EXTENDED_SESSION_SECURITY
        | NegotiateFlags::NTLM_SSP_NEGOTIATE_ALWAYS_SIGN
        | NegotiateFlags::NTLM_SSP_NEGOTIATE_NTLM
        | NegotiateFlags::NTLM_SSP_NEGOTIATE_SIGN
        | NegotiateFlags::NTLM_SSP_NEGOTIATE_REQUEST_TARGET
        | NegotiateFlags::NTLM_SSP_NEGOTIATE_UNICODE;

    if context.config.ntlm_v2 {
        flags |= NegotiateFlags::NTLM_SSP_NEGOTIATE56;

        if context.config.send_version_info {
            flags |= NegotiateFlags::NTLM_SSP_NEGOTIATE_VERSION;
        }
    }

    if use_mic {
        flags |= NegotiateFlags::NTLM_SSP_NEGOTIATE_TARGET_INFO;
    }

    if context.config.send_workstation_name {
        flags |= NegotiateFlags::NTLM_SSP_NEGOTIATE_WORKSTATION_SUPPLIED;
    }

    if context.sealing {
        flags |= NegotiateFlags::NTLM_SSP_NEGOTIATE_SEAL;
    }

    if challenge.flags.contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_KEY_EXCH) {
        flags |= NegotiateFlags::NTLM_SSP_NEGOTIATE_KEY_EXCH;
    }

    if !credentials.domain.is_empty() {
        flags |= NegotiateFlags::NTLM_SSP_NEGOTIATE_DOMAIN_SUPPLIED;
    }

    flags
}

/// Writes the fixed part of the message and returns the offset of the zeroed MIC field.
fn write_header(
    flags: NegotiateFlags,
    version: &[u8],
    use_mic: bool,
    message_fields: &AuthenticateMessageFields,
    buffer: &mut Vec<u8>,
) -> io::Result<usize> {
    write_ntlm_header(MessageTypes::Authenticate, &mut *buffer)?;
    message_fields.lm_challenge_response.write_to(&mut *buffer)?;
    message_fields.nt_challenge_response.write_to(&mut *buffer)?;
    message_fields.domain_name.write_to(&mut *buffer)?;
    message_fields.user_name.write_to(&mut *buffer)?;
    message_fields.workstation.write_to(&mut *buffer)?;
    message_fields.encrypted_random_session_key.write_to(&mut *buffer)?;
    buffer.write_u32::<LittleEndian>(flags.bits())?;

    if flags.contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_VERSION) {
        buffer.extend_from_slice(version);
    }

    let mic_offset = buffer.len();
    if use_mic {
        buffer.extend_from_slice(&[0x00; MESSAGE_INTEGRITY_CHECK_SIZE]);
    }

    Ok(mic_offset)
}

fn write_payload(message_fields: &AuthenticateMessageFields, buffer: &mut Vec<u8>) -> io::Result<()> {
    message_fields.domain_name.write_buffer_to(&mut *buffer)?;
    message_fields.user_name.write_buffer_to(&mut *buffer)?;
    message_fields.workstation.write_buffer_to(&mut *buffer)?;
    message_fields.lm_challenge_response.write_buffer_to(&mut *buffer)?;
    message_fields.nt_challenge_response.write_buffer_to(&mut *buffer)?;
    message_fields.encrypted_random_session_key.write_buffer_to(&mut *buffer)?;

    Ok(())
}
