//! The host-side session: state machine, handle bookkeeping, and the typed
//! `send`/`receive` surface.
//!
//! A session exists in one of two states. It starts `Uninitialized` when the
//! module is instantiated; boundary calls arriving from the guest in that
//! window are answered with the reserved not-ready status and leave no trace
//! in the inbox. [`Session::bind`] moves it to `Bound` exactly once, when
//! the module is ready; binding twice is a programming error and panics.
//!
//! Sending to the guest runs the three-phase buffer handoff against the
//! module's exports: allocate space in guest memory, write the encoded
//! bytes, commit. Receiving consumes an entry the guest pushed into the host
//! inbox through the registered `deliver` entry. Either way the handle
//! itself travels with the application, not with the protocol.

use anyhow::Result;
use bytes::Bytes;
use osmosis_types::abort::AbortReport;
use osmosis_types::codec::Codec;
use osmosis_types::err::{PrefixError, ProtocolError, TransportError};
use osmosis_types::handle::{GuestHandle, HandleCounter, HostHandle};
use osmosis_types::inbox::Inbox;
use osmosis_types::status::{GuestStatus, HostStatus};

/// The loaded guest module's callable surface, as the session needs it.
///
/// `osmosis_runtime::controller::Controller` backs this with a wasmtime
/// instance; tests substitute an in-process guest.
pub trait GuestLink {
	/// Call the module's alloc export. Returns the guest pointer, with zero
	/// signalling allocation failure.
	fn alloc(&mut self, handle: HostHandle, len: u32) -> Result<u32>;

	/// Write bytes into guest linear memory at `ptr`.
	fn write(&mut self, ptr: u32, bytes: &[u8]) -> Result<()>;

	/// Call the module's commit export. Returns the guest's raw status code.
	fn commit(&mut self, handle: HostHandle) -> Result<u32>;

	/// Call an arbitrary export that takes scalar handles and returns one.
	fn call(&mut self, name: &str, args: &[u32]) -> Result<u32>;

	/// Run the module's optional init export.
	fn init(&mut self) -> Result<()>;

	/// Borrow the session state living alongside the module.
	fn with_state<R>(&mut self, f: impl FnOnce(&mut SessionState) -> R) -> R;
}

/// State that only exists while the session is bound.
#[derive(Debug, Default)]
struct BoundState {
	inbox: Inbox,
	handles: HandleCounter,
}

#[derive(Debug)]
enum Phase {
	Uninitialized,
	Bound(BoundState),
}

/// Host-side session state, mutated only by calls arriving through the
/// boundary entries and by the owning [`Session`].
#[derive(Debug)]
pub struct SessionState {
	phase: Phase,
	abort: AbortReport,
	pending_abort: Option<String>,
}

impl Default for SessionState {
	fn default() -> Self {
		Self::new()
	}
}

impl SessionState {
	pub fn new() -> Self {
		Self {
			phase: Phase::Uninitialized,
			abort: AbortReport::new(),
			pending_abort: None,
		}
	}

	pub fn is_bound(&self) -> bool {
		matches!(self.phase, Phase::Bound(_))
	}

	/// Transition `Uninitialized` to `Bound`. Happens exactly once per
	/// module; a second bind is a programming error, not a recoverable
	/// condition.
	pub fn bind(&mut self) {
		match self.phase {
			Phase::Uninitialized => self.phase = Phase::Bound(BoundState::default()),
			Phase::Bound(_) => {
				panic!("session is already bound - exactly one session may exist per module")
			}
		}
	}

	/// Boundary entry behind the registered `deliver` import: store a
	/// payload the guest sent under its chosen handle.
	///
	/// `bytes` is `None` when the reported guest memory region was out of
	/// bounds. The returned status is all the guest ever sees; the details
	/// are logged here.
	pub fn deliver(&mut self, max_transfer: u32, handle: u32, bytes: Option<Vec<u8>>) -> HostStatus {
		let Phase::Bound(bound) = &mut self.phase else {
			tracing::warn!(handle, "deliver arrived before the session was bound");
			return HostStatus::NotReady;
		};
		let Some(bytes) = bytes else {
			tracing::error!(handle, "deliver reported an out of bounds payload region");
			return HostStatus::Fault;
		};
		if bytes.len() as u64 > u64::from(max_transfer) {
			let err = ProtocolError::TransferTooLarge {
				len: bytes.len() as u64,
				max: u64::from(max_transfer),
			};
			tracing::error!(handle, %err, "deliver rejected");
			return HostStatus::Fault;
		}
		match bound.inbox.insert_ready(handle, bytes) {
			Ok(()) => HostStatus::Success,
			Err(err) => {
				tracing::error!(handle, %err, "deliver violated the handle protocol");
				HostStatus::Fault
			}
		}
	}

	/// Boundary entry behind the registered `abort_report` import: buffer
	/// one word of a length-prefixed abort message.
	///
	/// Accepted even before binding, since a module may abort while it is
	/// still starting up; no inbox state is touched either way.
	pub fn report_abort(&mut self, word: u32) {
		if let Some(message) = self.abort.push(word) {
			tracing::error!(%message, "guest reported an abort across the boundary");
			self.pending_abort = Some(message);
		}
	}

	/// Take the most recently completed abort message, if any.
	pub fn take_abort(&mut self) -> Option<String> {
		self.pending_abort.take()
	}

	/// Issue the next host handle for an outgoing value.
	pub fn issue_handle(&mut self) -> Result<HostHandle, ProtocolError> {
		match &mut self.phase {
			Phase::Bound(bound) => Ok(HostHandle::from(bound.handles.issue())),
			Phase::Uninitialized => Err(ProtocolError::NotBound),
		}
	}

	/// Consume a pending guest-sent payload. Single use.
	pub fn claim(&mut self, handle: GuestHandle) -> Result<Vec<u8>, ProtocolError> {
		match &mut self.phase {
			Phase::Bound(bound) => bound.inbox.claim(handle.into()),
			Phase::Uninitialized => Err(ProtocolError::NotBound),
		}
	}

	/// Number of guest-sent values not yet received.
	pub fn pending(&self) -> usize {
		match &self.phase {
			Phase::Bound(bound) => bound.inbox.len(),
			Phase::Uninitialized => 0,
		}
	}
}

/// A bound guest module plus the typed transfer operations against it.
pub struct Session<L: GuestLink> {
	link: L,
}

impl<L: GuestLink> Session<L> {
	/// Wrap a freshly loaded module. The session starts `Uninitialized`;
	/// call [`Session::bind`] once the module is ready.
	pub fn new(link: L) -> Self {
		Self {
			link,
		}
	}

	/// Access the underlying module link.
	pub fn link(&mut self) -> &mut L {
		&mut self.link
	}

	/// Mark the module ready and run its optional init export. Panics if
	/// the session was already bound.
	pub fn bind(&mut self) -> Result<()> {
		self.link.with_state(SessionState::bind);
		self.link.init().prefix_err(|| "failed to run the module's init export")?;
		Ok(())
	}

	/// Encode a value and transfer it into the guest. Returns the handle
	/// the application must pass to the guest to name the value.
	pub fn send<T>(&mut self, codec: &impl Codec<T>, value: &T) -> Result<HostHandle> {
		let bytes = codec.encode(value).map_err(TransportError::Encode)?;
		self.send_raw(&bytes)
	}

	/// Transfer already-encoded bytes into the guest via the three-phase
	/// handoff. On allocation failure no write or commit is attempted.
	pub fn send_raw(&mut self, bytes: &[u8]) -> Result<HostHandle> {
		let len = u32::try_from(bytes.len()).map_err(|_| ProtocolError::TransferTooLarge {
			len: bytes.len() as u64,
			max: u64::from(u32::MAX),
		})?;
		let handle = self.link.with_state(SessionState::issue_handle)?;
		let ptr = match self.link.alloc(handle, len) {
			Ok(ptr) => ptr,
			Err(e) => return Err(self.trap_error("alloc", e)),
		};
		if ptr == 0 {
			return Err(match self.take_abort() {
				Some(message) => TransportError::GuestAbort(message).into(),
				None => TransportError::AllocFailed {
					handle: handle.into(),
					len,
				}
				.into(),
			});
		}
		if let Err(e) = self.link.write(ptr, bytes) {
			return Err(self.trap_error("write", e));
		}
		let status = match self.link.commit(handle) {
			Ok(status) => status,
			Err(e) => return Err(self.trap_error("commit", e)),
		};
		match GuestStatus::interpret(status) {
			Some(GuestStatus::Success) => Ok(handle),
			Some(GuestStatus::Abort) => Err(match self.take_abort() {
				Some(message) => TransportError::GuestAbort(message).into(),
				None => TransportError::Boundary {
					call: "commit",
					status,
				}
				.into(),
			}),
			None => Err(TransportError::UnknownStatus {
				call: "commit",
				status,
			}
			.into()),
		}
	}

	/// Receive and decode a value the guest sent under `handle`.
	pub fn receive<T>(&mut self, codec: &impl Codec<T>, handle: GuestHandle) -> Result<T> {
		let bytes = self.receive_raw(handle)?;
		codec.decode(&bytes).map_err(|source| {
			TransportError::Decode {
				handle: handle.into(),
				source,
			}
			.into()
		})
	}

	/// Receive the raw bytes the guest sent under `handle`. Single use.
	pub fn receive_raw(&mut self, handle: GuestHandle) -> Result<Bytes> {
		let bytes = self.link.with_state(|state| state.claim(handle))?;
		Ok(bytes.into())
	}

	/// Call a guest export whose signature is scalar handles in, one scalar
	/// handle out. If the guest aborts, the reconstructed abort message is
	/// raised here as a recoverable error.
	pub fn invoke(&mut self, name: &str, args: &[u32]) -> Result<u32> {
		match self.link.call(name, args) {
			Ok(value) => Ok(value),
			Err(e) => Err(self.trap_error(name, e)),
		}
	}

	fn take_abort(&mut self) -> Option<String> {
		self.link.with_state(SessionState::take_abort)
	}

	/// Convert a trapped guest call into the most useful error available:
	/// the reconstructed abort message when one arrived, otherwise the trap
	/// itself with the failing call named.
	fn trap_error(&mut self, call: &str, err: anyhow::Error) -> anyhow::Error {
		match self.take_abort() {
			Some(message) => anyhow::Error::new(TransportError::GuestAbort(message)),
			None => err.context(format!("boundary call `{call}` trapped")),
		}
	}
}
