use crate::cursor::ReadCursor;
use crate::ntlm::messages::{
    read_negotiate_flags, read_ntlm_header, try_read_version, MessageFields, MessageTypes, MESSAGE_FIELDS_SIZE,
};
use crate::ntlm::{NegotiateFlags, NegotiateMessage, Ntlm, NtlmState};

fn check_state(state: NtlmState) -> crate::Result<()> {
    if state != NtlmState::Initial {
        Err(crate::Error::new(
            crate::ErrorKind::OutOfSequence,
            "Read negotiate was fired but the state is not an Initial",
        ))
    } else {
        Ok(())
    }
}

/// Parses the client's Negotiate message without touching the context.
pub(crate) fn read_negotiate(context: &Ntlm, message: &[u8]) -> crate::Result<NegotiateMessage> {
    check_state(context.state)?;

    let mut cursor = ReadCursor::new(message);

    read_ntlm_header(&mut cursor, MessageTypes::Negotiate)?;
    let flags = read_negotiate_flags(&mut cursor)?;
    check_flags(flags)?;

    // Domain and Workstation fields are optional in messages from old clients
    if cursor.len() >= 2 * MESSAGE_FIELDS_SIZE {
        let domain_name = MessageFields::read_from(&mut cursor)?;
        let workstation = MessageFields::read_from(&mut cursor)?;
        let _version = try_read_version(flags, &mut cursor)?;

        MessageFields::read_buffer_from(&cursor, domain_name)?;
        MessageFields::read_buffer_from(&cursor, workstation)?;
    }

    debug!(?flags, "NTLM Negotiate message is read");

    Ok(NegotiateMessage::new(message.to_vec(), flags))
}

fn check_flags(flags: NegotiateFlags) -> crate::Result<()> {
    let required = NegotiateFlags::NTLM_SSP_NEGOTIATE_REQUEST_TARGET
        | NegotiateFlags::NTLM_SSP_NEGOTIATE_NTLM
        | NegotiateFlags::NTLM_SSP_NEGOTIATE_ALWAYS_SIGN
        | NegotiateFlags::NTLM_SSP_NEGOTIATE_UNICODE;

    if !flags.contains(required) {
        return Err(crate::Error::new(
            crate::ErrorKind::InvalidToken,
            format!(
                "Negotiate flags do not contain the necessary flags: missing {:?}",
                required - flags
            ),
        ));
    }

    Ok(())
}
