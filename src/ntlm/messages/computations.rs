
use rand::RngCore;

use super::av_pair::{AvPair, MsvAvFlags, AV_PAIR_FLAGS, AV_PAIR_TIMESTAMP, SINGLE_HOST_DATA_SIZE};
use crate::channel_bindings::ChannelBindings;
use crate::crypto::{compute_hmac_md5, compute_md4, compute_md5, compute_md5_channel_bindings_hash, Rc4, HASH_SIZE};
use crate::cursor::ReadCursor;
use crate::ntlm::hash::NTLM_HASH_PREFIX;
use crate::ntlm::{
    AuthIdentityBuffers, CHALLENGE_SIZE, LM_CHALLENGE_RESPONSE_BUFFER_SIZE, MESSAGE_INTEGRITY_CHECK_SIZE,
    SESSION_KEY_SIZE,
};
use crate::{utils, Error, ErrorKind, NtlmHash, Secret};

const NT_V2_RESPONSE_BASE_SIZE: usize = 28;
const NT_V2_RESPONSE_TYPE: u8 = 1;
const SINGLE_HOST_CUSTOM_DATA: u32 = 0x2000;
const SINGLE_HOST_MACHINE_ID: u8 = 0xaa;

/// The parts of an NTLMv2 `NtChallengeResponse` the acceptor needs.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct NtlmV2Response {
    pub nt_proof: [u8; HASH_SIZE],
    /// Everything after the proof, i.e. the `temp` value the proof was computed over.
    pub blob: Vec<u8>,
    pub timestamp: u64,
    pub client_challenge: [u8; CHALLENGE_SIZE],
    pub target_info: Vec<u8>,
}

/// Fixed `Single_Host_Data` structure: Size, Z4, DataPresent, CustomData, MachineID.
pub(crate) fn single_host_data() -> [u8; SINGLE_HOST_DATA_SIZE] {
    let mut data = [SINGLE_HOST_MACHINE_ID; SINGLE_HOST_DATA_SIZE];
    data[0..4].copy_from_slice(&(SINGLE_HOST_DATA_SIZE as u32).to_le_bytes());
    data[4..8].copy_from_slice(&0u32.to_le_bytes());
    data[8..12].copy_from_slice(&1u32.to_le_bytes());
    data[12..16].copy_from_slice(&SINGLE_HOST_CUSTOM_DATA.to_le_bytes());

    data
}

/// Server target info: NetBIOS and DNS names of the domain and the computer, the timestamp, `EOL`.
pub(crate) fn get_challenge_target_info(computer_name: &[u8], timestamp: u64) -> crate::Result<Vec<u8>> {
    let av_pairs = [
        AvPair::NbDomainName(computer_name.to_vec()),
        AvPair::NbComputerName(computer_name.to_vec()),
        AvPair::DnsDomainName(computer_name.to_vec()),
        AvPair::DnsComputerName(computer_name.to_vec()),
        AvPair::Timestamp(timestamp),
        AvPair::EOL,
    ];

    Ok(AvPair::list_to_buffer(&av_pairs)?)
}

/// Options that shape the client's target info.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AuthenticateTargetInfo<'a> {
    pub use_mic: bool,
    pub send_single_host_data: bool,
    pub suppress_extended_protection: bool,
    pub channel_bindings: Option<&'a ChannelBindings>,
    pub service_principal_name: Option<&'a str>,
}

/// Client target info: the names and the timestamp copied from the challenge, then the client's own pairs,
/// `EOL`, and 8 bytes of padding.
pub(crate) fn get_authenticate_target_info(
    challenge_target_info: &[u8],
    options: AuthenticateTargetInfo<'_>,
) -> crate::Result<Vec<u8>> {
    let challenge_av_pairs = if challenge_target_info.is_empty() {
        Vec::new()
    } else {
        AvPair::buffer_to_av_pairs(challenge_target_info)?
    };

    let mut av_pairs = Vec::with_capacity(challenge_av_pairs.len() + 5);
    for known in [
        AvPair::NbDomainName(Vec::new()),
        AvPair::NbComputerName(Vec::new()),
        AvPair::DnsDomainName(Vec::new()),
        AvPair::DnsComputerName(Vec::new()),
        AvPair::DnsTreeName(Vec::new()),
        AvPair::Timestamp(0),
    ] {
        if let Some(av_pair) = AvPair::find(&challenge_av_pairs, known.as_u16()) {
            av_pairs.push(av_pair.clone());
        }
    }

    if options.use_mic {
        av_pairs.push(AvPair::Flags(MsvAvFlags::MESSAGE_INTEGRITY_CHECK.bits()));
    }

    if options.send_single_host_data {
        av_pairs.push(AvPair::SingleHost(single_host_data()));
    }

    if !options.suppress_extended_protection {
        let channel_bindings_hash = options
            .channel_bindings
            .map(compute_md5_channel_bindings_hash)
            .unwrap_or([0x00; HASH_SIZE]);
        av_pairs.push(AvPair::ChannelBindings(channel_bindings_hash));

        if let Some(spn) = options.service_principal_name.filter(|spn| !spn.is_empty()) {
            av_pairs.push(AvPair::TargetName(utils::string_to_utf16(spn)));
        }
    }

    av_pairs.push(AvPair::EOL);

    let mut target_info = AvPair::list_to_buffer(&av_pairs)?;
    // AvEOL ([0x00; 4]) + reserved ([0x00; 4])
    target_info.extend_from_slice(&[0x00; 8]);

    Ok(target_info)
}

pub(crate) fn generate_challenge(rng: &mut dyn RngCore) -> [u8; CHALLENGE_SIZE] {
    let mut challenge = [0x00; CHALLENGE_SIZE];
    rng.fill_bytes(&mut challenge);

    challenge
}

pub(crate) fn generate_random_session_key(rng: &mut dyn RngCore) -> Secret<[u8; SESSION_KEY_SIZE]> {
    let mut session_key = Secret::new([0x00; SESSION_KEY_SIZE]);
    rng.fill_bytes(session_key.as_mut());

    session_key
}

/// RC4 with the key exchange key. The same transform encrypts and decrypts the random session key.
pub(crate) fn rc4_session_key(key_exchange_key: &[u8], session_key: &[u8; SESSION_KEY_SIZE]) -> [u8; SESSION_KEY_SIZE] {
    let mut result = [0x00; SESSION_KEY_SIZE];
    result.copy_from_slice(&Rc4::new(key_exchange_key).process(session_key));

    result
}

pub(crate) fn generate_signing_key(exported_session_key: &[u8], sign_magic: &[u8]) -> [u8; HASH_SIZE] {
    let mut value = exported_session_key.to_vec();
    value.extend_from_slice(sign_magic);

    compute_md5(value.as_ref())
}

/// HMAC-MD5 over the three messages. The MIC field of `authenticate_message` must already be zeroed.
pub(crate) fn compute_message_integrity_check(
    negotiate_message: &[u8],
    challenge_message: &[u8],
    authenticate_message: &[u8],
    exported_session_key: &[u8],
) -> crate::Result<[u8; MESSAGE_INTEGRITY_CHECK_SIZE]> {
    let mut message_integrity_check = negotiate_message.to_vec();
    message_integrity_check.extend_from_slice(challenge_message);
    message_integrity_check.extend_from_slice(authenticate_message);

    compute_hmac_md5(exported_session_key, message_integrity_check.as_ref())
}

fn compute_nt_hash(identity: &AuthIdentityBuffers) -> crate::Result<Secret<[u8; HASH_SIZE]>> {
    let password = identity.password.as_ref();
    let password_string = Secret::new(utils::bytes_to_utf16_string(password).unwrap_or_default());

    match password_string.as_ref().strip_prefix(NTLM_HASH_PREFIX) {
        Some(hash) => Ok(Secret::new(*hash.parse::<NtlmHash>()?.as_bytes())),
        None => Ok(Secret::new(compute_md4(password))),
    }
}

/// NTOWFv2: HMAC-MD5 keyed with the NT hash over `UPPER(user) || domain`.
pub(crate) fn compute_ntlm_v2_hash(identity: &AuthIdentityBuffers) -> crate::Result<Secret<[u8; HASH_SIZE]>> {
    if identity.is_empty() {
        return Err(Error::new(
            ErrorKind::NoCredentials,
            "cannot compute the NTLMv2 hash of an empty identity",
        ));
    }

    let nt_hash = compute_nt_hash(identity)?;

    let user = utils::bytes_to_utf16_string(identity.user.as_ref())?;
    let mut user_uppercase_with_domain = utils::string_to_utf16(user.to_uppercase());
    user_uppercase_with_domain.extend_from_slice(&identity.domain);

    Ok(Secret::new(compute_hmac_md5(nt_hash.as_ref(), &user_uppercase_with_domain)?))
}

pub(crate) fn compute_lm_v2_response(
    client_challenge: &[u8; CHALLENGE_SIZE],
    server_challenge: &[u8; CHALLENGE_SIZE],
    ntlm_v2_hash: &[u8],
) -> crate::Result<[u8; LM_CHALLENGE_RESPONSE_BUFFER_SIZE]> {
    let mut lm_challenge_data = [0x00; CHALLENGE_SIZE * 2];
    lm_challenge_data[0..CHALLENGE_SIZE].copy_from_slice(server_challenge);
    lm_challenge_data[CHALLENGE_SIZE..].copy_from_slice(client_challenge);

    let mut lm_challenge_response = [0x00; LM_CHALLENGE_RESPONSE_BUFFER_SIZE];
    lm_challenge_response[0..HASH_SIZE].copy_from_slice(&compute_hmac_md5(ntlm_v2_hash, &lm_challenge_data)?);
    lm_challenge_response[HASH_SIZE..].copy_from_slice(client_challenge);

    Ok(lm_challenge_response)
}

/// The `temp` value of the NTLMv2 response.
pub(crate) fn compute_ntlm_v2_blob(
    client_challenge: &[u8; CHALLENGE_SIZE],
    target_info: &[u8],
    timestamp: u64,
) -> Vec<u8> {
    let mut blob = Vec::with_capacity(NT_V2_RESPONSE_BASE_SIZE + target_info.len());
    blob.push(NT_V2_RESPONSE_TYPE); // RespType
    blob.push(NT_V2_RESPONSE_TYPE); // HiRespType
    blob.extend_from_slice(&[0x00; 2]); // Reserved1
    blob.extend_from_slice(&[0x00; 4]); // Reserved2
    blob.extend_from_slice(&timestamp.to_le_bytes());
    blob.extend_from_slice(client_challenge);
    blob.extend_from_slice(&[0x00; 4]); // Reserved3
    blob.extend_from_slice(target_info);

    blob
}

pub(crate) fn compute_nt_proof(
    server_challenge: &[u8; CHALLENGE_SIZE],
    blob: &[u8],
    ntlm_v2_hash: &[u8],
) -> crate::Result<[u8; HASH_SIZE]> {
    let mut nt_proof_input = server_challenge.to_vec();
    nt_proof_input.extend_from_slice(blob);

    compute_hmac_md5(ntlm_v2_hash, &nt_proof_input)
}

/// Returns the `NtChallengeResponse` and the session base key.
pub(crate) fn compute_ntlm_v2_response(
    client_challenge: &[u8; CHALLENGE_SIZE],
    server_challenge: &[u8; CHALLENGE_SIZE],
    target_info: &[u8],
    ntlm_v2_hash: &[u8],
    timestamp: u64,
) -> crate::Result<(Vec<u8>, Secret<[u8; SESSION_KEY_SIZE]>)> {
    let blob = compute_ntlm_v2_blob(client_challenge, target_info, timestamp);
    let nt_proof = compute_nt_proof(server_challenge, &blob, ntlm_v2_hash)?;

    let mut nt_challenge_response = nt_proof.to_vec();
    nt_challenge_response.extend_from_slice(&blob);

    let session_base_key = compute_session_base_key(ntlm_v2_hash, &nt_proof)?;

    Ok((nt_challenge_response, session_base_key))
}

pub(crate) fn compute_session_base_key(
    ntlm_v2_hash: &[u8],
    nt_proof: &[u8; HASH_SIZE],
) -> crate::Result<Secret<[u8; SESSION_KEY_SIZE]>> {
    Ok(Secret::new(compute_hmac_md5(ntlm_v2_hash, nt_proof)?))
}

pub(crate) fn read_ntlm_v2_response(challenge_response: &[u8]) -> crate::Result<NtlmV2Response> {
    let mut cursor = ReadCursor::new(challenge_response);

    let nt_proof = cursor.read_array::<HASH_SIZE>()?;
    let blob = cursor.remaining().to_vec();

    let _resp_type = cursor.read_u8()?;
    let _hi_resp_type = cursor.read_u8()?;
    let _reserved1 = cursor.read_u16()?;
    let _reserved2 = cursor.read_u32()?;
    let timestamp = cursor.read_u64()?;
    let client_challenge = cursor.read_array::<CHALLENGE_SIZE>()?;
    let _reserved3 = cursor.read_u32()?;
    let target_info = cursor.read_remaining().to_vec();

    Ok(NtlmV2Response {
        nt_proof,
        blob,
        timestamp,
        client_challenge,
        target_info,
    })
}

pub(crate) fn get_av_flags_from_response(av_pairs: &[AvPair]) -> MsvAvFlags {
    if let Some(AvPair::Flags(value)) = AvPair::find(av_pairs, AV_PAIR_FLAGS) {
        MsvAvFlags::from_bits_truncate(*value)
    } else {
        MsvAvFlags::empty()
    }
}

pub(crate) fn get_challenge_timestamp(av_pairs: &[AvPair]) -> Option<u64> {
    if let Some(AvPair::Timestamp(value)) = AvPair::find(av_pairs, AV_PAIR_TIMESTAMP) {
        Some(*value)
    } else {
        None
    }
}
