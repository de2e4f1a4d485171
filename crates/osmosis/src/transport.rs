//! The guest-side transport state machine.
//!
//! [`Transport`] owns everything the guest needs to exchange values with the
//! host: the counter issuing handles for outgoing values, the inbox of
//! payloads the host has pushed in, and the capability to call the entries
//! the host registered on the module. It is an explicit struct rather than
//! ambient module state so that the lifecycle is visible in the type; the
//! thin ffi glue in [`crate::ffi`] holds the single instance the WASM export
//! model forces and routes the raw boundary entries through the methods
//! here.
//!
//! Outgoing values travel through [`HostCalls::deliver`] in one step, since
//! guest code cannot address host memory. Incoming values arrive through the
//! three-phase handoff: the host calls the module's alloc export (served by
//! [`Transport::reserve`]), writes into guest linear memory, then calls the
//! commit export (served by [`Transport::commit`]).

use anyhow::Result;
use bytes::Bytes;
use osmosis_types::abort;
use osmosis_types::codec::Codec;
use osmosis_types::err::{ProtocolError, TransportError};
use osmosis_types::handle::{GuestHandle, HandleCounter, HostHandle};
use osmosis_types::inbox::Inbox;
use osmosis_types::status::HostStatus;
pub use osmosis_types::DEFAULT_MAX_TRANSFER;

/// The entries the host registered for this module to call.
///
/// On a real WASM target this is backed by the module's imports; tests
/// substitute an in-process host.
pub trait HostCalls {
	/// Hand a finished payload to the host. Returns the host's raw status
	/// code.
	fn deliver(&mut self, handle: u32, bytes: &[u8]) -> u32;

	/// Report one word of a length-prefixed abort message.
	fn abort_report(&mut self, word: u32);
}

/// Guest-side session state: handle counter, inbox, and the host's callable
/// surface.
pub struct Transport<H: HostCalls> {
	host: H,
	inbox: Inbox,
	handles: HandleCounter,
	max_transfer: u32,
}

impl<H: HostCalls> Transport<H> {
	pub fn new(host: H) -> Self {
		Self {
			host,
			inbox: Inbox::new(),
			handles: HandleCounter::new(),
			max_transfer: DEFAULT_MAX_TRANSFER,
		}
	}

	/// Override the per-transfer ceiling enforced by [`Transport::reserve`].
	pub fn with_max_transfer(mut self, max_transfer: u32) -> Self {
		self.max_transfer = max_transfer;
		self
	}

	/// Encode a value and send it to the host.
	///
	/// Returns the handle naming the value on the host side. The handle must
	/// be carried to the host by the application, typically as an export's
	/// return value.
	pub fn send<T>(&mut self, codec: &impl Codec<T>, value: &T) -> Result<GuestHandle> {
		let bytes = codec.encode(value).map_err(TransportError::Encode)?;
		self.send_raw(&bytes)
	}

	/// Send already-encoded bytes to the host.
	pub fn send_raw(&mut self, bytes: &[u8]) -> Result<GuestHandle> {
		let handle = GuestHandle::from(self.handles.issue());
		let status = self.host.deliver(handle.into(), bytes);
		match HostStatus::interpret(status) {
			Some(HostStatus::Success) => Ok(handle),
			Some(HostStatus::Fault) => Err(TransportError::Boundary {
				call: "deliver",
				status,
			}
			.into()),
			Some(HostStatus::NotReady) => Err(TransportError::NotReady.into()),
			None => Err(TransportError::UnknownStatus {
				call: "deliver",
				status,
			}
			.into()),
		}
	}

	/// Receive and decode a value the host sent under `handle`.
	pub fn receive<T>(&mut self, codec: &impl Codec<T>, handle: HostHandle) -> Result<T> {
		let bytes = self.receive_raw(handle)?;
		codec.decode(&bytes).map_err(|source| {
			TransportError::Decode {
				handle: handle.into(),
				source,
			}
			.into()
		})
	}

	/// Receive the raw bytes the host sent under `handle`. Single use.
	pub fn receive_raw(&mut self, handle: HostHandle) -> Result<Bytes> {
		let bytes = self.inbox.claim(handle.into())?;
		Ok(bytes.into())
	}

	/// Boundary entry behind the module's alloc export.
	///
	/// Reserves `len` bytes for an incoming transfer and returns the buffer
	/// the host will write into. Fails on a handle collision or when `len`
	/// exceeds the configured ceiling; the ffi glue reports failure to the
	/// host as a null pointer.
	pub fn reserve(&mut self, handle: HostHandle, len: u32) -> Result<&mut Vec<u8>, ProtocolError> {
		if u64::from(len) > u64::from(self.max_transfer) {
			return Err(ProtocolError::TransferTooLarge {
				len: u64::from(len),
				max: u64::from(self.max_transfer),
			});
		}
		self.inbox.reserve(handle.into(), len)
	}

	/// Mutable view of a reserved, uncommitted transfer buffer.
	///
	/// This is the receiver-supplied write surface: on WASM the host reaches
	/// the same bytes directly through linear memory, while in-process hosts
	/// write through here.
	pub fn buffer_mut(&mut self, handle: HostHandle) -> Option<&mut Vec<u8>> {
		self.inbox.buffer_mut(handle.into())
	}

	/// Boundary entry behind the module's commit export. Marks a reserved
	/// transfer complete.
	pub fn commit(&mut self, handle: HostHandle) -> Result<(), ProtocolError> {
		self.inbox.commit(handle.into())
	}

	/// Stream an abort message to the host, length first, then one byte per
	/// call.
	pub fn report_abort(&mut self, message: &str) {
		let host = &mut self.host;
		abort::stream(message, |word| host.abort_report(word));
	}

	/// Number of host-sent values not yet received.
	pub fn pending(&self) -> usize {
		self.inbox.len()
	}
}
