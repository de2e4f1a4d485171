//! Handle namespaces and the counter that issues them.
//!
//! A handle is an opaque `u32` naming one pending value. Handles are unique
//! within the session that issued them and within the direction of travel:
//! host-issued and guest-issued handles live in separate namespaces and may
//! collide numerically without conflict. The newtypes below keep the two
//! namespaces apart in the type system; each crosses the boundary as a plain
//! `u32`.
//!
//! A handle is single use. It is created when a side calls `send` and
//! consumed when the other side calls `receive` with the matching value. The
//! protocol never transmits the handle itself; the application carries it,
//! typically as a guest function argument or return value.

use std::fmt;
use std::num::Wrapping;

/// A handle issued by the host for a value it sent to the guest.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostHandle(u32);

impl From<u32> for HostHandle {
	fn from(value: u32) -> Self {
		Self(value)
	}
}

impl From<HostHandle> for u32 {
	fn from(handle: HostHandle) -> Self {
		handle.0
	}
}

impl fmt::Display for HostHandle {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// A handle issued by the guest for a value it sent to the host.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GuestHandle(u32);

impl From<u32> for GuestHandle {
	fn from(value: u32) -> Self {
		Self(value)
	}
}

impl From<GuestHandle> for u32 {
	fn from(handle: GuestHandle) -> Self {
		handle.0
	}
}

impl fmt::Display for GuestHandle {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Issues handles for outgoing values.
///
/// The counter starts at zero and wraps after `u32::MAX`. Wrapping means a
/// very long lived session could in principle issue a handle that collides
/// with one still sitting unreceived in the counterpart's inbox; the inbox
/// rejects such an insert rather than overwriting, so the collision surfaces
/// as an error instead of silent data loss.
#[derive(Debug, Clone, Default)]
pub struct HandleCounter(Wrapping<u32>);

impl HandleCounter {
	pub const fn new() -> Self {
		Self(Wrapping(0))
	}

	/// Return the current handle and advance the counter by one, modulo
	/// `2^32`.
	pub fn issue(&mut self) -> u32 {
		let handle = self.0 .0;
		self.0 += 1;
		handle
	}
}
