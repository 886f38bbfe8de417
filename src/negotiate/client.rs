use crate::builders::FilledInitializeSecurityContext;
use crate::negotiate::NegotiateState;
use crate::{Error, ErrorKind, InitializeSecurityContextResult, Negotiate, NegotiatedProtocol, Result, SspiImpl};

/// Performs one authentication step.
///
/// The user should call this function until it returns `SecurityStatus::Ok`.
#[instrument(ret, fields(protocol = negotiate.protocol_name()), skip_all)]
pub(crate) fn initialize_security_context(
    negotiate: &mut Negotiate,
    builder: &mut FilledInitializeSecurityContext<'_, <Negotiate as SspiImpl>::CredentialsHandle>,
) -> Result<InitializeSecurityContextResult> {
    if negotiate.state == NegotiateState::Final {
        return Err(Error::new(
            ErrorKind::OutOfSequence,
            "the Negotiate security context is already established",
        ));
    }

    if negotiate.state == NegotiateState::Initial {
        if let NegotiatedProtocol::Kerberos(kerberos) = &mut negotiate.protocol {
            match kerberos.initialize_security_context_impl(builder) {
                Err(Error {
                    error_type: ErrorKind::NoCredentials,
                    ..
                }) if negotiate.can_fall_back_to_ntlm() => negotiate.fall_back_to_ntlm(),
                result => {
                    let result = result?;
                    negotiate.advance(result.status);

                    return Ok(result);
                }
            }
        }
    }

    let result = match &mut negotiate.protocol {
        NegotiatedProtocol::Kerberos(kerberos) => kerberos.initialize_security_context_impl(builder)?,
        NegotiatedProtocol::Ntlm(ntlm) => ntlm.initialize_security_context_impl(builder)?,
    };
    negotiate.advance(result.status);

    Ok(result)
}
