use std::io;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::ntlm::messages::{assign_offsets, write_ntlm_header, MessageFields, MessageTypes};
use crate::ntlm::{NegotiateFlags, NegotiateMessage, Ntlm, NtlmState, NTLM_VERSION_SIZE};
use crate::SecurityStatus;

const HEADER_SIZE: usize = 32;

fn check_state(state: NtlmState) -> crate::Result<()> {
    if state != NtlmState::Initial {
        Err(crate::Error::new(
            crate::ErrorKind::OutOfSequence,
            "Write negotiate was fired but the state is not an Initial",
        ))
    } else {
        Ok(())
    }
}

pub(crate) fn write_negotiate(context: &mut Ntlm, mut transport: impl io::Write) -> crate::Result<SecurityStatus> {
    check_state(context.state)?;

    let negotiate_flags = get_flags(context);

    let send_version = negotiate_flags.contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_VERSION);
    let payload_offset = if send_version {
        HEADER_SIZE + NTLM_VERSION_SIZE
    } else {
        HEADER_SIZE
    };

    // the domain and the workstation are only sent in the Authenticate message
    let mut domain_name = MessageFields::new();
    let mut workstation = MessageFields::new();
    assign_offsets(payload_offset as u32, &mut [&mut domain_name, &mut workstation]);

    let mut buffer = Vec::with_capacity(workstation.end_offset() as usize);

    write_ntlm_header(MessageTypes::Negotiate, &mut buffer)?;
    buffer.write_u32::<LittleEndian>(negotiate_flags.bits())?;
    domain_name.write_to(&mut buffer)?;
    workstation.write_to(&mut buffer)?;
    if send_version {
        buffer.extend_from_slice(&context.config.version);
    }

    domain_name.write_buffer_to(&mut buffer)?;
    workstation.write_buffer_to(&mut buffer)?;

    transport.write_all(buffer.as_slice())?;
    transport.flush()?;

    debug!(flags = ?negotiate_flags, len = buffer.len(), "NTLM Negotiate message is written");

    context.flags = negotiate_flags;
    context.negotiate_message = Some(NegotiateMessage::new(buffer, negotiate_flags));
    context.state = NtlmState::Challenge;

    Ok(SecurityStatus::ContinueNeeded)
}

fn get_flags(context: &Ntlm) -> NegotiateFlags {
    let mut flags = NegotiateFlags::NTLM_SSP_NEGOTIATE_KEY_EXCH
        | NegotiateFlags::NTLM_SSP_NEGOTIATE128
        | NegotiateFlags::NTLM_SSP_NEGOTIATE_EXTENDED_SESSION_SECURITY
        | NegotiateFlags::NTLM_SSP_NEGOTIATE_ALWAYS_SIGN
        | NegotiateFlags::NTLM_SSP_NEGOTIATE_NTLM
        | NegotiateFlags::NTLM_SSP_NEGOTIATE_SIGN
        | NegotiateFlags::NTLM_SSP_NEGOTIATE_REQUEST_TARGET
        | NegotiateFlags::NTLM_SSP_NEGOTIATE_UNICODE;

    if context.config.ntlm_v2 {
        flags |= NegotiateFlags::NTLM_SSP_NEGOTIATE56
            | NegotiateFlags::NTLM_SSP_NEGOTIATE_VERSION
            | NegotiateFlags::NTLM_SSP_NEGOTIATE_LM_KEY
            | NegotiateFlags::NTLM_SSP_NEGOTIATE_OEM;
    }

    if context.sealing {
        flags |= NegotiateFlags::NTLM_SSP_NEGOTIATE_SEAL;
    }

    if context.config.send_version_info {
        flags |= NegotiateFlags::NTLM_SSP_NEGOTIATE_VERSION;
    }

    flags
}
