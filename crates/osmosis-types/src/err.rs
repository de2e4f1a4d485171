//! Error taxonomy for boundary transfers.
//!
//! Two distinct failure families exist and must never be conflated:
//!
//! - [`TransportError`]: a handoff step failed. The counterpart could not
//!   allocate, returned a non-success status code, or the payload could not
//!   be encoded or decoded. These are recoverable and are never retried
//!   automatically.
//! - [`ProtocolError`]: the calling application misused the protocol. A
//!   handle was reused before receipt, an unknown or already-consumed handle
//!   was received, or a transfer exceeded the configured ceiling. These
//!   indicate a programming error in the application, not a transient
//!   condition.
//!
//! Both are surfaced through `anyhow::Result` at the public API and remain
//! downcastable, so callers see descriptive messages and only meet raw
//! status codes if they inspect the cause chain.

use std::fmt::Display;

use thiserror::Error;

/// A failure in one of the steps that move bytes across the boundary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
	#[error("failed to encode value for transfer")]
	Encode(#[source] anyhow::Error),
	#[error("failed to decode value received under handle {handle}")]
	Decode {
		handle: u32,
		#[source]
		source: anyhow::Error,
	},
	#[error("counterpart could not allocate {len} bytes for handle {handle}")]
	AllocFailed {
		handle: u32,
		len: u32,
	},
	#[error("boundary call `{call}` failed with status code {status}")]
	Boundary {
		call: &'static str,
		status: u32,
	},
	#[error("counterpart session is not ready to handle incoming data")]
	NotReady,
	#[error("boundary call `{call}` returned unknown status code {status}")]
	UnknownStatus {
		call: &'static str,
		status: u32,
	},
	#[error("guest aborted: {0}")]
	GuestAbort(String),
}

/// A violation of the handle lifecycle rules.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
	#[error("handle {0} has no pending value; handles are single use and must be issued by the sending side")]
	UnknownHandle(u32),
	#[error("handle {0} is already in use; ensure all data sent to this side is being received")]
	HandleInUse(u32),
	#[error("handle {0} was allocated but its transfer was never committed")]
	NotCommitted(u32),
	#[error("handle {0} was already committed; handles are single use")]
	AlreadyCommitted(u32),
	#[error("transfer of {len} bytes exceeds the configured limit of {max} bytes")]
	TransferTooLarge {
		len: u64,
		max: u64,
	},
	#[error("session is not bound to a counterpart module")]
	NotBound,
}

/// Extension trait to prefix an error with human readable context.
pub trait PrefixError<T> {
	/// Wrap the error value with additional context, produced lazily.
	fn prefix_err<C, F>(self, f: F) -> anyhow::Result<T>
	where
		C: Display + Send + Sync + 'static,
		F: FnOnce() -> C;
}

impl<T, E> PrefixError<T> for Result<T, E>
where
	E: Into<anyhow::Error>,
{
	fn prefix_err<C, F>(self, f: F) -> anyhow::Result<T>
	where
		C: Display + Send + Sync + 'static,
		F: FnOnce() -> C,
	{
		self.map_err(|e| e.into().context(f()))
	}
}

#[cfg(test)]
mod tests {

	use super::*;

	#[test]
	fn prefix_err_keeps_cause() {
		let res: Result<(), ProtocolError> = Err(ProtocolError::UnknownHandle(7));
		let err = res.prefix_err(|| "failed to receive value").unwrap_err();
		assert!(err.to_string().starts_with("failed to receive value"));
		match err.downcast_ref::<ProtocolError>() {
			Some(ProtocolError::UnknownHandle(7)) => {}
			other => panic!("unexpected cause: {other:?}"),
		}
	}

	#[test]
	fn transport_error_describes_status() {
		let err = TransportError::Boundary {
			call: "commit",
			status: 1,
		};
		assert_eq!(err.to_string(), "boundary call `commit` failed with status code 1");
	}
}
