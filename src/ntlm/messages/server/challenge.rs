use std::io;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::ntlm::messages::computations::{generate_challenge, get_challenge_target_info};
use crate::ntlm::messages::{assign_offsets, write_ntlm_header, MessageFields, MessageTypes};
use crate::ntlm::{ChallengeMessage, NegotiateFlags, NegotiateMessage, Ntlm, NtlmState, NTLM_VERSION_SIZE};
use crate::{utils, SecurityStatus};

const HEADER_SIZE: usize = 48;
const RESERVED_SIZE: usize = 8;

/// Flags the acceptor is able to honor. The rest of the client's request is dropped.
const SUPPORTED_FLAGS: NegotiateFlags = NegotiateFlags::NTLM_SSP_NEGOTIATE56
    .union(NegotiateFlags::NTLM_SSP_NEGOTIATE_KEY_EXCH)
    .union(NegotiateFlags::NTLM_SSP_NEGOTIATE128)
    .union(NegotiateFlags::NTLM_SSP_NEGOTIATE_VERSION)
    .union(NegotiateFlags::NTLM_SSP_NEGOTIATE_EXTENDED_SESSION_SECURITY)
    .union(NegotiateFlags::NTLM_SSP_NEGOTIATE_ALWAYS_SIGN)
    .union(NegotiateFlags::NTLM_SSP_NEGOTIATE_NTLM)
    .union(NegotiateFlags::NTLM_SSP_NEGOTIATE_SEAL)
    .union(NegotiateFlags::NTLM_SSP_NEGOTIATE_SIGN)
    .union(NegotiateFlags::NTLM_SSP_NEGOTIATE_REQUEST_TARGET)
    .union(NegotiateFlags::NTLM_SSP_NEGOTIATE_UNICODE);

fn check_state(state: NtlmState) -> crate::Result<()> {
    if state != NtlmState::Initial {
        Err(crate::Error::new(
            crate::ErrorKind::OutOfSequence,
            "Write challenge was fired but the state is not an Initial",
        ))
    } else {
        Ok(())
    }
}

pub(crate) fn write_challenge(
    context: &mut Ntlm,
    negotiate: NegotiateMessage,
    mut transport: impl io::Write,
) -> crate::Result<SecurityStatus> {
    check_state(context.state)?;

    let flags = (negotiate.flags & SUPPORTED_FLAGS) | NegotiateFlags::NTLM_SSP_NEGOTIATE_TARGET_INFO;
    let server_challenge = generate_challenge(&mut *context.rng);
    let timestamp = context.clock.file_time_now()?;

    let computer_name = context
        .config
        .target_name
        .as_deref()
        .or(context.config.workstation.as_deref())
        .map(utils::string_to_utf16)
        .unwrap_or_default();
    let target_info = get_challenge_target_info(&computer_name, timestamp)?;

    let mut target_name = if flags.contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_REQUEST_TARGET) {
        MessageFields::with_buffer(computer_name)
    } else {
        MessageFields::new()
    };
    let mut target_info_field = MessageFields::with_buffer(target_info.clone());

    let mut payload_offset = HEADER_SIZE;
    if flags.contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_VERSION) {
        payload_offset += NTLM_VERSION_SIZE;
    }
    assign_offsets(payload_offset as u32, &mut [&mut target_name, &mut target_info_field]);

    let mut buffer = Vec::with_capacity(target_info_field.end_offset() as usize);

    write_ntlm_header(MessageTypes::Challenge, &mut buffer)?;
    target_name.write_to(&mut buffer)?;
    buffer.write_u32::<LittleEndian>(flags.bits())?;
    buffer.extend_from_slice(&server_challenge);
    buffer.extend_from_slice(&[0x00; RESERVED_SIZE]);
    target_info_field.write_to(&mut buffer)?;
    if flags.contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_VERSION) {
        buffer.extend_from_slice(&context.config.version);
    }

    target_name.write_buffer_to(&mut buffer)?;
    target_info_field.write_buffer_to(&mut buffer)?;

    transport.write_all(buffer.as_slice())?;
    transport.flush()?;

    debug!(?flags, len = buffer.len(), "NTLM Challenge message is written");

    context.flags = flags;
    context.negotiate_message = Some(negotiate);
    context.challenge_message = Some(ChallengeMessage::new(
        buffer,
        target_info,
        server_challenge,
        Some(timestamp),
        flags,
    ));
    context.state = NtlmState::Authenticate;

    Ok(SecurityStatus::ContinueNeeded)
}
