//! The pluggable payload codec.
//!
//! The transport layer moves opaque bytes; it never interprets them. A
//! [`Codec`] turns application values into those bytes and back, and can be
//! swapped without touching any session or handoff logic. A codec is
//! expected to be total over its supported value domain, with `encode` and
//! `decode` mutually inverse.
//!
//! [`JsonCodec`] is the provided default, covering anything Serde
//! understands.

use anyhow::Result;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes and decodes values of type `T` for transfer.
pub trait Codec<T> {
	fn encode(&self, value: &T) -> Result<Bytes>;
	fn decode(&self, bytes: &[u8]) -> Result<T>;
}

/// JSON payload encoding via Serde.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<T> Codec<T> for JsonCodec
where
	T: Serialize + DeserializeOwned,
{
	fn encode(&self, value: &T) -> Result<Bytes> {
		Ok(serde_json::to_vec(value)?.into())
	}

	fn decode(&self, bytes: &[u8]) -> Result<T> {
		Ok(serde_json::from_slice(bytes)?)
	}
}
