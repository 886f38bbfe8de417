//! Boundary of the Kerberos mechanism.
//!
//! This crate does not speak Kerberos itself. The embedding application provides a Kerberos security context
//! through [`KerberosMechanism`] and hands it to [`Negotiate`](crate::Negotiate) via a
//! [`ProtocolConfig`](crate::ProtocolConfig) that returns [`NegotiatedProtocol::Kerberos`].
//!
//! A mechanism that cannot find a ticket or a KDC for the user must fail its first
//! `initialize_security_context_impl` call with [`ErrorKind::NoCredentials`](crate::ErrorKind::NoCredentials):
//! this is the signal that makes Negotiate fall back to NTLM.
//!
//! [`NegotiatedProtocol::Kerberos`]: crate::NegotiatedProtocol::Kerberos

use std::fmt::Debug;
use std::sync::LazyLock;

use crate::{AuthIdentity, AuthIdentityBuffers, PackageCapabilities, PackageInfo, SecurityPackageType, Sspi, SspiImpl, PACKAGE_ID_NONE};

pub const PKG_NAME: &str = "Kerberos";

pub static PACKAGE_INFO: LazyLock<PackageInfo> = LazyLock::new(|| PackageInfo {
    capabilities: PackageCapabilities::empty(),
    version: 1,
    rpc_id: PACKAGE_ID_NONE,
    max_token_len: 0xbb80, // 48 000 bytes: default maximum token len in Windows
    name: SecurityPackageType::Kerberos,
    comment: String::from("Kerberos Security Package"),
});

/// A Kerberos security context usable behind Negotiate.
///
/// Implemented for every type that provides the security context capability over password-based credentials.
pub trait KerberosMechanism:
    Sspi + SspiImpl<CredentialsHandle = Option<AuthIdentityBuffers>, AuthenticationData = AuthIdentity> + Debug + Send
{
}

impl<T> KerberosMechanism for T where
    T: Sspi + SspiImpl<CredentialsHandle = Option<AuthIdentityBuffers>, AuthenticationData = AuthIdentity> + Debug + Send
{
}
