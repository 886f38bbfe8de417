use crate::cursor::ReadCursor;
use crate::ntlm::messages::av_pair::AvPair;
use crate::ntlm::messages::computations::get_challenge_timestamp;
use crate::ntlm::messages::{
    read_negotiate_flags, read_ntlm_header, try_read_version, FieldDescriptor, MessageFields, MessageTypes,
    MESSAGE_FIELDS_SIZE,
};
use crate::ntlm::{ChallengeMessage, Ntlm, NtlmState, CHALLENGE_SIZE};

const RESERVED_SIZE: usize = 8;

fn check_state(state: NtlmState) -> crate::Result<()> {
    if state != NtlmState::Challenge {
        Err(crate::Error::new(
            crate::ErrorKind::OutOfSequence,
            "Read challenge was fired but the state is not a Challenge",
        ))
    } else {
        Ok(())
    }
}

/// Parses the server's Challenge message. The context is left untouched: the caller commits the result
/// together with the Authenticate message.
pub(crate) fn read_challenge(context: &Ntlm, message: &[u8]) -> crate::Result<ChallengeMessage> {
    check_state(context.state)?;

    let mut cursor = ReadCursor::new(message);

    read_ntlm_header(&mut cursor, MessageTypes::Challenge)?;
    let target_name = MessageFields::read_from(&mut cursor)?;
    let flags = read_negotiate_flags(&mut cursor)?;
    let server_challenge = cursor.read_array::<CHALLENGE_SIZE>()?;
    cursor.advance(RESERVED_SIZE)?;

    // Old servers stop right after the reserved bytes
    let target_info = if cursor.len() >= MESSAGE_FIELDS_SIZE {
        MessageFields::read_from(&mut cursor)?
    } else {
        FieldDescriptor::default()
    };
    let _version = try_read_version(flags, &mut cursor)?;

    let _target_name = MessageFields::read_buffer_from(&cursor, target_name)?;
    let target_info = MessageFields::read_buffer_from(&cursor, target_info)?.buffer;

    let timestamp = if target_info.is_empty() {
        None
    } else {
        get_challenge_timestamp(&AvPair::buffer_to_av_pairs(&target_info)?)
    };

    debug!(?flags, ?timestamp, target_info_len = target_info.len(), "NTLM Challenge message is read");

    Ok(ChallengeMessage::new(
        message.to_vec(),
        target_info,
        server_challenge,
        timestamp,
        flags,
    ))
}
