//! Builders for the SSPI calls that take many arguments.
//!
//! The arguments a call cannot run without are tracked in the builder's type parameters, each one either
//! [`Missing`] or [`Provided`], so `execute` only exists on the filled builder.

mod accept_sec_context;
mod acq_cred_handle;
mod init_sec_context;

use std::fmt;

pub use self::accept_sec_context::{
    AcceptSecurityContext, AcceptSecurityContextResult, EmptyAcceptSecurityContext, FilledAcceptSecurityContext,
};
pub use self::acq_cred_handle::{
    AcquireCredentialsHandle, AcquireCredentialsHandleResult, EmptyAcquireCredentialsHandle,
    FilledAcquireCredentialsHandle,
};
pub use self::init_sec_context::{
    EmptyInitializeSecurityContext, FilledInitializeSecurityContext, InitializeSecurityContext,
    InitializeSecurityContextResult,
};

/// State of one required builder argument.
pub trait ArgumentState: fmt::Debug {}

#[derive(Debug)]
pub struct Missing;
impl ArgumentState for Missing {}

#[derive(Debug)]
pub struct Provided;
impl ArgumentState for Provided {}
