mod rc4;

use hmac::{Hmac, Mac};
use md4::{Digest, Md4};
use md5::Md5;
pub use rc4::Rc4;

use crate::channel_bindings::ChannelBindings;
use crate::{Error, ErrorKind, Result};

pub const HASH_SIZE: usize = 16;

pub fn compute_md4(data: &[u8]) -> [u8; HASH_SIZE] {
    let mut context = Md4::new();
    let mut result = [0x00; HASH_SIZE];
    context.update(data);
    result.clone_from_slice(&context.finalize());

    result
}

pub fn compute_md5(data: &[u8]) -> [u8; HASH_SIZE] {
    let mut context = Md5::new();
    let mut result = [0x00; HASH_SIZE];
    context.update(data);
    result.clone_from_slice(&context.finalize());

    result
}

pub fn compute_hmac_md5(key: &[u8], input: &[u8]) -> Result<[u8; HASH_SIZE]> {
    let mut mac = Hmac::<Md5>::new_from_slice(key)
        .map_err(|e| Error::new(ErrorKind::InternalError, format!("failed to compute hmac md5: {}", e)))?;
    let mut result = [0x00; HASH_SIZE];
    mac.update(input);
    result.clone_from_slice(&mac.finalize().into_bytes());

    Ok(result)
}

/// MD5 over the flattened `gss_channel_bindings_struct`: every length is written right before its data.
pub fn compute_md5_channel_bindings_hash(channel_bindings: &ChannelBindings) -> [u8; HASH_SIZE] {
    let mut context = Md5::new();

    context.update(channel_bindings.initiator_addr_type.to_le_bytes());
    context.update((channel_bindings.initiator.len() as u32).to_le_bytes());
    context.update(&channel_bindings.initiator);

    context.update(channel_bindings.acceptor_addr_type.to_le_bytes());
    context.update((channel_bindings.acceptor.len() as u32).to_le_bytes());
    context.update(&channel_bindings.acceptor);

    context.update((channel_bindings.application_data.len() as u32).to_le_bytes());
    context.update(&channel_bindings.application_data);

    let mut result = [0x00; HASH_SIZE];
    result.clone_from_slice(&context.finalize());

    result
}
