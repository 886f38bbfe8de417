use crate::builders::FilledAcceptSecurityContext;
use crate::negotiate::NegotiateState;
use crate::ntlm::NTLM_SIGNATURE;
use crate::{
    AcceptSecurityContextResult, Error, ErrorKind, Negotiate, NegotiatedProtocol, Result, SecurityBuffer,
    SecurityBufferType, SspiImpl,
};

/// Performs one authentication step.
///
/// The first token decides the mechanism: an `NTLMSSP` message goes to NTLM, anything else to the configured
/// Kerberos mechanism.
#[instrument(ret, fields(protocol = negotiate.protocol_name()), skip_all)]
pub(crate) fn accept_security_context(
    negotiate: &mut Negotiate,
    builder: FilledAcceptSecurityContext<'_, <Negotiate as SspiImpl>::CredentialsHandle>,
) -> Result<AcceptSecurityContextResult> {
    match negotiate.state {
        NegotiateState::Initial => select_protocol(negotiate, &builder)?,
        NegotiateState::Final => {
            return Err(Error::new(
                ErrorKind::OutOfSequence,
                "the Negotiate security context is already established",
            ))
        }
        NegotiateState::NegoInit | NegotiateState::NegoResp => {}
    }

    let result = match &mut negotiate.protocol {
        NegotiatedProtocol::Kerberos(kerberos) => kerberos.accept_security_context_impl(builder)?,
        NegotiatedProtocol::Ntlm(ntlm) => ntlm.accept_security_context_impl(builder)?,
    };
    negotiate.advance(result.status);

    Ok(result)
}

fn select_protocol(
    negotiate: &mut Negotiate,
    builder: &FilledAcceptSecurityContext<'_, <Negotiate as SspiImpl>::CredentialsHandle>,
) -> Result<()> {
    let input = builder
        .input
        .as_deref()
        .ok_or_else(|| Error::new(ErrorKind::InvalidToken, "input buffers must be specified"))?;
    let input_token = SecurityBuffer::find_buffer(input, SecurityBufferType::Token)?;

    if input_token.buffer.starts_with(NTLM_SIGNATURE) {
        if !negotiate.can_fall_back_to_ntlm() {
            return Err(Error::new(
                ErrorKind::InvalidToken,
                "got an NTLM token but NTLM is disabled in package_list",
            ));
        }

        if !matches!(negotiate.protocol, NegotiatedProtocol::Ntlm(_)) {
            debug!("Negotiate: the initiator sent an NTLM token, select the NTLM");

            negotiate.protocol = negotiate.new_ntlm();
        }

        return Ok(());
    }

    if !negotiate.is_kerberos_enabled() {
        return Err(Error::new(
            ErrorKind::InvalidToken,
            "got a non-NTLM token but Kerberos is not usable",
        ));
    }

    if !matches!(negotiate.protocol, NegotiatedProtocol::Kerberos(_)) {
        match negotiate.protocol_config.new_instance()? {
            protocol @ NegotiatedProtocol::Kerberos(_) => negotiate.protocol = protocol,
            NegotiatedProtocol::Ntlm(_) => {
                return Err(Error::new(
                    ErrorKind::InvalidToken,
                    "got a non-NTLM token but no Kerberos mechanism is configured",
                ))
            }
        }
    }

    Ok(())
}
