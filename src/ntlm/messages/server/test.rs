use crate::crypto::Rc4;
use crate::ntlm::messages::server::{read_authenticate, read_negotiate, write_challenge};
use crate::ntlm::messages::test::*;
use crate::ntlm::{
    ChallengeMessage, NegotiateFlags, NegotiateMessage, Ntlm, NtlmAccounts, NtlmConfig, NtlmHash, NtlmState,
};
use crate::{utils, AuthIdentityBuffers, ChannelBindings, ErrorKind, FixedClock, SecurityStatus};

const TEST_WORKSTATION_OFFSET: usize = 116;

fn context_waiting_for_authenticate() -> Ntlm {
    let mut context = Ntlm::new();
    context.is_client = false;
    context.state = NtlmState::Authenticate;
    context.negotiate_message = Some(NegotiateMessage::new(
        TEST_NEGOTIATE_MESSAGE.to_vec(),
        NegotiateFlags::from_bits_truncate(0xa208_8207),
    ));
    context.challenge_message = Some(ChallengeMessage::new(
        TEST_CHALLENGE_MESSAGE.to_vec(),
        TEST_CHALLENGE_MESSAGE[56..].to_vec(),
        TEST_SERVER_CHALLENGE,
        Some(TEST_TIMESTAMP),
        NegotiateFlags::from_bits_truncate(0xa288_8207),
    ));

    context
}

fn assert_untouched(context: &Ntlm) {
    assert_eq!(context.state, NtlmState::Authenticate);
    assert!(context.session_key.is_none());
    assert!(context.identity.is_none());
    assert!(context.authenticate_message.is_none());
}

#[test]
fn read_negotiate_accepts_recorded_message() {
    let context = Ntlm::new();

    let negotiate = read_negotiate(&context, &TEST_NEGOTIATE_MESSAGE).unwrap();

    assert_eq!(negotiate.message, TEST_NEGOTIATE_MESSAGE);
    assert!(negotiate.flags.contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_VERSION));
    assert!(negotiate
        .flags
        .contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_EXTENDED_SESSION_SECURITY));
}

#[test]
fn read_negotiate_accepts_message_without_trailing_fields() {
    let context = Ntlm::new();

    let negotiate = read_negotiate(&context, &TEST_NEGOTIATE_MESSAGE[..16]).unwrap();

    assert_eq!(negotiate.flags.bits(), 0xa208_8207);
}

#[test]
fn read_negotiate_rejects_missing_required_flags() {
    let context = Ntlm::new();
    let mut message = TEST_NEGOTIATE_MESSAGE;
    // drop NEGOTIATE_UNICODE
    message[12] &= !0x01;

    let error = read_negotiate(&context, &message).unwrap_err();

    assert_eq!(error.error_type, ErrorKind::InvalidToken);
}

#[test]
fn read_negotiate_rejects_challenge_message() {
    let context = Ntlm::new();

    let error = read_negotiate(&context, &TEST_CHALLENGE_MESSAGE).unwrap_err();

    assert_eq!(error.error_type, ErrorKind::InvalidToken);
}

#[test]
fn read_negotiate_fails_in_wrong_state() {
    let context = context_waiting_for_authenticate();

    let error = read_negotiate(&context, &TEST_NEGOTIATE_MESSAGE).unwrap_err();

    assert_eq!(error.error_type, ErrorKind::OutOfSequence);
}

#[test]
fn write_challenge_lays_out_message() {
    let mut context = Ntlm::with_rng_and_clock(
        NtlmConfig {
            target_name: Some("NEWYEAR".into()),
            ..NtlmConfig::default()
        },
        Box::new(rand::rngs::OsRng),
        Box::new(FixedClock(TEST_TIMESTAMP)),
    );
    let negotiate = read_negotiate(&context, &TEST_NEGOTIATE_MESSAGE).unwrap();

    let mut message = Vec::new();
    let status = write_challenge(&mut context, negotiate, &mut message).unwrap();

    assert_eq!(status, SecurityStatus::ContinueNeeded);
    assert_eq!(context.state, NtlmState::Authenticate);

    assert_eq!(&message[..8], b"NTLMSSP\0");
    assert_eq!(message[8..12], 2u32.to_le_bytes());

    let flags = NegotiateFlags::from_bits_truncate(u32::from_le_bytes(message[20..24].try_into().unwrap()));
    assert!(flags.contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_TARGET_INFO));
    // not supported, so not echoed back
    assert!(!flags.contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_OEM));

    let challenge = context.challenge_message.as_ref().unwrap();
    assert_eq!(message[24..32], challenge.server_challenge);
    assert_eq!(message[32..40], [0x00; 8]);
    assert_eq!(message[48..56], context.config.version);

    let target_name = utils::string_to_utf16("NEWYEAR");
    assert_eq!(message[12..14], (target_name.len() as u16).to_le_bytes());
    assert_eq!(message[16..20], 56u32.to_le_bytes());
    assert_eq!(message[56..56 + target_name.len()], target_name);

    let target_info_offset = 56 + target_name.len();
    assert_eq!(message[44..48], (target_info_offset as u32).to_le_bytes());
    assert_eq!(message[target_info_offset..], challenge.target_info);
    assert_eq!(challenge.timestamp, Some(TEST_TIMESTAMP));
}

#[test]
fn read_authenticate_verifies_recorded_message() {
    let mut context = context_waiting_for_authenticate();

    let status = read_authenticate(&mut context, Some(&TEST_CREDENTIALS), None, &TEST_AUTHENTICATE_MESSAGE).unwrap();

    assert_eq!(status, SecurityStatus::Ok);
    assert_eq!(context.state, NtlmState::Final);
    assert_eq!(context.session_key.as_ref().unwrap().as_ref(), &TEST_SESSION_BASE_KEY);
    assert_eq!(context.send_signing_key.as_ref(), &TEST_SERVER_SIGNING_KEY);
    assert_eq!(context.recv_signing_key.as_ref(), &TEST_CLIENT_SIGNING_KEY);
    assert_eq!(
        context.send_sealing_key.clone().unwrap().process(b"sealed"),
        Rc4::new(&TEST_SERVER_SEALING_KEY).process(b"sealed")
    );
    assert_eq!(
        context.recv_sealing_key.clone().unwrap().process(b"sealed"),
        Rc4::new(&TEST_CLIENT_SEALING_KEY).process(b"sealed")
    );

    let identity = context.identity.as_ref().unwrap();
    assert_eq!(identity.user, utils::string_to_utf16(TEST_USER));
    assert_eq!(identity.domain, utils::string_to_utf16(TEST_DOMAIN));

    let authenticate = context.authenticate_message.as_ref().unwrap();
    let mic = authenticate.mic.as_ref().unwrap();
    assert_eq!(mic.offset, TEST_MIC_OFFSET);
    assert_eq!(mic.value, TEST_MIC);
    assert_eq!(authenticate.client_challenge, TEST_CLIENT_CHALLENGE);
}

#[test]
fn read_authenticate_rejects_altered_workstation() {
    let mut context = context_waiting_for_authenticate();
    let mut message = TEST_AUTHENTICATE_MESSAGE;
    message[TEST_WORKSTATION_OFFSET] ^= 0x01;

    let error = read_authenticate(&mut context, Some(&TEST_CREDENTIALS), None, &message).unwrap_err();

    assert_eq!(error.error_type, ErrorKind::MessageAltered);
    assert_untouched(&context);
}

#[test]
fn read_authenticate_rejects_wrong_password() {
    let mut context = context_waiting_for_authenticate();
    let credentials = AuthIdentityBuffers::new(
        utils::string_to_utf16(TEST_USER),
        utils::string_to_utf16(TEST_DOMAIN),
        utils::string_to_utf16("P4ss123?"),
    );

    let error = read_authenticate(&mut context, Some(&credentials), None, &TEST_AUTHENTICATE_MESSAGE).unwrap_err();

    assert_eq!(error.error_type, ErrorKind::MessageAltered);
    assert_untouched(&context);
}

#[test]
fn read_authenticate_requires_credentials() {
    let mut context = context_waiting_for_authenticate();

    let error = read_authenticate(&mut context, None, None, &TEST_AUTHENTICATE_MESSAGE).unwrap_err();

    assert_eq!(error.error_type, ErrorKind::NoCredentials);
    assert_untouched(&context);
}

#[test]
fn read_authenticate_rejects_empty_server_password_without_accounts() {
    let mut context = context_waiting_for_authenticate();
    let credentials = AuthIdentityBuffers::new(utils::string_to_utf16("Administrator"), Vec::new(), Vec::new());

    let error = read_authenticate(&mut context, Some(&credentials), None, &TEST_AUTHENTICATE_MESSAGE).unwrap_err();

    assert_eq!(error.error_type, ErrorKind::NoCredentials);
    assert_untouched(&context);
}

#[test]
fn read_authenticate_verifies_against_account_store() {
    let mut accounts = NtlmAccounts::new();
    accounts.insert(TEST_USER, Some(TEST_DOMAIN), NtlmHash::from_bytes(TEST_NT_HASH));
    let mut context = context_waiting_for_authenticate();
    context.config.accounts = Some(accounts);

    let status = read_authenticate(&mut context, None, None, &TEST_AUTHENTICATE_MESSAGE).unwrap();

    assert_eq!(status, SecurityStatus::Ok);
    assert_eq!(context.session_key.as_ref().unwrap().as_ref(), &TEST_SESSION_BASE_KEY);
    assert_eq!(context.identity.as_ref().unwrap().user, utils::string_to_utf16(TEST_USER));
}

#[test]
fn read_authenticate_falls_back_to_account_without_domain() {
    let mut accounts = NtlmAccounts::new();
    accounts.insert("username", None, NtlmHash::from_password(TEST_PASSWORD));
    let mut context = context_waiting_for_authenticate();
    context.config.accounts = Some(accounts);
    let credentials = AuthIdentityBuffers::new(Vec::new(), Vec::new(), Vec::new());

    let status = read_authenticate(&mut context, Some(&credentials), None, &TEST_AUTHENTICATE_MESSAGE).unwrap();

    assert_eq!(status, SecurityStatus::Ok);
}

#[test]
fn read_authenticate_denies_unknown_account() {
    let mut accounts = NtlmAccounts::new();
    accounts.insert(TEST_USER, Some("OtherDomain"), NtlmHash::from_bytes(TEST_NT_HASH));
    let mut context = context_waiting_for_authenticate();
    context.config.accounts = Some(accounts);

    let error = read_authenticate(&mut context, None, None, &TEST_AUTHENTICATE_MESSAGE).unwrap_err();

    assert_eq!(error.error_type, ErrorKind::LogonDenied);
    assert_untouched(&context);
}

#[test]
fn read_authenticate_keeps_bindings_of_rejected_message() {
    let mut context = context_waiting_for_authenticate();
    let bindings = ChannelBindings::from_application_data(b"tls-unique:rejected".to_vec());

    let error = read_authenticate(
        &mut context,
        Some(&TEST_CREDENTIALS),
        Some(bindings),
        &TEST_AUTHENTICATE_MESSAGE[..200],
    )
    .unwrap_err();

    assert_eq!(error.error_type, ErrorKind::InvalidToken);
    assert!(context.channel_bindings.is_none());
}

#[test]
fn read_authenticate_ignores_bindings_when_client_sent_none() {
    // the recorded client sent an all-zero channel bindings hash
    let mut context = context_waiting_for_authenticate();
    context.set_channel_bindings(ChannelBindings::from_application_data(b"tls-server-end-point:".to_vec()));

    let status = read_authenticate(&mut context, Some(&TEST_CREDENTIALS), None, &TEST_AUTHENTICATE_MESSAGE).unwrap();

    assert_eq!(status, SecurityStatus::Ok);
}

#[test]
fn read_authenticate_rejects_truncated_message() {
    let mut context = context_waiting_for_authenticate();

    let error = read_authenticate(
        &mut context,
        Some(&TEST_CREDENTIALS),
        None,
        &TEST_AUTHENTICATE_MESSAGE[..200],
    )
    .unwrap_err();

    assert_eq!(error.error_type, ErrorKind::InvalidToken);
    assert_untouched(&context);
}

#[test]
fn read_authenticate_fails_in_wrong_state() {
    let mut context = context_waiting_for_authenticate();
    context.state = NtlmState::Initial;

    let error = read_authenticate(&mut context, Some(&TEST_CREDENTIALS), None, &TEST_AUTHENTICATE_MESSAGE).unwrap_err();

    assert_eq!(error.error_type, ErrorKind::OutOfSequence);
}

mod tamper {
    use proptest::prelude::*;

    use super::*;

    const MIC_RANGE: std::ops::Range<usize> = TEST_MIC_OFFSET..TEST_MIC_OFFSET + 16;

    fn outside_mic() -> impl Strategy<Value = usize> {
        (0..TEST_AUTHENTICATE_MESSAGE.len()).prop_filter("the MIC itself", |index| !MIC_RANGE.contains(index))
    }

    proptest! {
        #[test]
        fn any_flipped_bit_is_detected(index in outside_mic(), bit in 0..8u8) {
            let mut context = context_waiting_for_authenticate();
            let mut message = TEST_AUTHENTICATE_MESSAGE;
            message[index] ^= 1 << bit;

            prop_assert!(read_authenticate(&mut context, Some(&TEST_CREDENTIALS), None, &message).is_err());
            assert_untouched(&context);
        }

        #[test]
        fn flipped_identity_or_response_is_altered(index in 88..TEST_NT_RESPONSE_OFFSET + 16, bit in 0..8u8) {
            let mut context = context_waiting_for_authenticate();
            let mut message = TEST_AUTHENTICATE_MESSAGE;
            message[index] ^= 1 << bit;

            let error = read_authenticate(&mut context, Some(&TEST_CREDENTIALS), None, &message).unwrap_err();

            prop_assert_eq!(error.error_type, ErrorKind::MessageAltered);
        }
    }
}
