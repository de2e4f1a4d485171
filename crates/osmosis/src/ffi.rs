//! WASM boundary glue: the module's exports, imports, and fault boundary.
//!
//! The export model gives boundary entry points no way to carry a session
//! argument, so this module holds the one [`Transport`] instance for the
//! module and routes the raw entries through it. All state handling lives in
//! [`Transport`]; this file only translates between scalars and method
//! calls, and makes sure nothing unwinds across the boundary.
//!
//! Layout of the boundary surface:
//!
//! - imports (registered by the host under the `osmosis` namespace):
//!   `deliver(handle, ptr, len) -> status` and `abort_report(word)`.
//! - exports: `__osmo_alloc(handle, len) -> ptr` and
//!   `__osmo_commit(handle) -> status`.

use std::cell::RefCell;
use std::panic::{self, catch_unwind, AssertUnwindSafe, UnwindSafe};

use anyhow::Result;
use osmosis_types::abort;
use osmosis_types::codec::Codec;
use osmosis_types::err::ProtocolError;
use osmosis_types::handle::{GuestHandle, HostHandle};
use osmosis_types::status::GuestStatus;

use crate::transport::{HostCalls, Transport};

mod imports {
	#[link(wasm_import_module = "osmosis")]
	extern "C" {
		pub fn deliver(handle: u32, ptr: u32, len: u32) -> u32;
		pub fn abort_report(word: u32);
	}
}

/// The host's callable surface, reached through the module's imports.
pub struct WasmHost;

impl HostCalls for WasmHost {
	fn deliver(&mut self, handle: u32, bytes: &[u8]) -> u32 {
		unsafe { imports::deliver(handle, bytes.as_ptr() as u32, bytes.len() as u32) }
	}

	fn abort_report(&mut self, word: u32) {
		unsafe { imports::abort_report(word) }
	}
}

thread_local! {
	static TRANSPORT: RefCell<Option<Transport<WasmHost>>> = const { RefCell::new(None) };
}

/// Bind the module's transport and install the abort reporter.
///
/// Must be called exactly once before any transfer, typically from the
/// module's `__osmo_init` export. Binding twice is a programming error and
/// panics. The installed panic hook streams the rendered panic message to
/// the host so an abort surfaces there as a recoverable error instead of an
/// opaque trap.
pub fn bind() {
	bind_transport(Transport::new(WasmHost));
}

/// Like [`bind`], with a custom ceiling for incoming transfers.
pub fn bind_with_max_transfer(max_transfer: u32) {
	bind_transport(Transport::new(WasmHost).with_max_transfer(max_transfer));
}

fn bind_transport(transport: Transport<WasmHost>) {
	TRANSPORT.with_borrow_mut(|slot| {
		assert!(
			slot.is_none(),
			"[osmosis] transport is already bound - bind() must be called exactly once per module"
		);
		panic::set_hook(Box::new(|info| {
			let mut host = WasmHost;
			abort::stream(&info.to_string(), |word| host.abort_report(word));
		}));
		*slot = Some(transport);
	});
}

fn with_transport<R>(f: impl FnOnce(&mut Transport<WasmHost>) -> Result<R>) -> Result<R> {
	TRANSPORT.with_borrow_mut(|slot| match slot.as_mut() {
		Some(transport) => f(transport),
		None => Err(ProtocolError::NotBound.into()),
	})
}

/// Encode a value and send it to the host. See [`Transport::send`].
pub fn send<T>(codec: &impl Codec<T>, value: &T) -> Result<GuestHandle> {
	with_transport(|transport| transport.send(codec, value))
}

/// Receive and decode a value the host sent. See [`Transport::receive`].
pub fn receive<T>(codec: &impl Codec<T>, handle: HostHandle) -> Result<T> {
	with_transport(|transport| transport.receive(codec, handle))
}

/// Send already-encoded bytes to the host.
pub fn send_raw(bytes: &[u8]) -> Result<GuestHandle> {
	with_transport(|transport| transport.send_raw(bytes))
}

/// Receive the raw bytes the host sent under `handle`.
pub fn receive_raw(handle: HostHandle) -> Result<bytes::Bytes> {
	with_transport(|transport| transport.receive_raw(handle))
}

/// Contain panics and reported errors at the boundary. Nothing may unwind
/// into the host's call frame; failures degrade to a status code after being
/// logged with context.
fn ffi_boundary<F>(call: &'static str, f: F) -> GuestStatus
where
	F: FnOnce() -> Result<()> + UnwindSafe,
{
	match catch_unwind(f) {
		Ok(Ok(())) => GuestStatus::Success,
		Ok(Err(e)) => {
			tracing::error!("boundary call {call} failed: {e:#}");
			GuestStatus::Abort
		}
		Err(_) => {
			tracing::error!("panic contained at the boundary in {call}");
			GuestStatus::Abort
		}
	}
}

/// The host calls this to open an incoming transfer: reserve `len` bytes for
/// the value it is about to write and return a pointer to the reserved
/// space. The null pointer signals failure to allocate.
#[no_mangle]
extern "C" fn __osmo_alloc(handle: u32, len: u32) -> u32 {
	let mut ptr = 0_u32;
	let _ = catch_unwind(AssertUnwindSafe(|| {
		TRANSPORT.with_borrow_mut(|slot| {
			let Some(transport) = slot.as_mut() else {
				tracing::error!("__osmo_alloc called before the transport was bound");
				return;
			};
			match transport.reserve(HostHandle::from(handle), len) {
				Ok(buf) => ptr = buf.as_mut_ptr() as u32,
				Err(e) => tracing::error!("__osmo_alloc for handle {handle} failed: {e}"),
			}
		});
	}));
	ptr
}

/// The host calls this once it has finished writing into space previously
/// returned by [`__osmo_alloc`], signalling that the bytes may be consumed.
#[no_mangle]
extern "C" fn __osmo_commit(handle: u32) -> u32 {
	let status = ffi_boundary("__osmo_commit", AssertUnwindSafe(|| {
		with_transport(|transport| Ok(transport.commit(HostHandle::from(handle))?))
	}));
	u32::from(status)
}
