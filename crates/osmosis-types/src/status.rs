//! Status codes returned by boundary calls.
//!
//! A status code reports whether the boundary call itself was handled, never
//! whether the operation it carried succeeded at the application level.
//! Application outcomes travel inside the transferred value (for example as a
//! serialized `Result`).
//!
//! The two sides of the boundary have independent code sets, because they
//! fail differently: the host has structured recoverable errors and a
//! session that may not be bound yet, while the guest can only abort. The
//! sets must never be conflated.
//!
//! The one exception to "status codes only" is allocation, which must return
//! a pointer for pragmatic reasons; there the null pointer represents
//! failure.

/// Status codes returned by boundary entries the host registers for the
/// guest to call.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStatus {
	/// The call was handled without an unexpected error.
	Success = 0,
	/// An unhandled fault occurred inside the host entry. The fault was
	/// contained and reported locally; it never unwinds into the guest.
	Fault = 1,
	/// The call arrived before the host session was bound to the module.
	NotReady = 2,
}

impl HostStatus {
	/// Interpret a raw scalar received across the boundary.
	pub fn interpret(value: u32) -> Option<Self> {
		match value {
			0 => Some(HostStatus::Success),
			1 => Some(HostStatus::Fault),
			2 => Some(HostStatus::NotReady),
			_ => None,
		}
	}
}

impl From<HostStatus> for u32 {
	fn from(status: HostStatus) -> Self {
		status as u32
	}
}

/// Status codes returned by the entry points the guest module exports.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestStatus {
	/// The call was handled without the guest aborting.
	Success = 0,
	/// The guest aborted while handling the call. The abort message, if any,
	/// arrives separately through the abort reporter channel.
	Abort = 1,
}

impl GuestStatus {
	/// Interpret a raw scalar received across the boundary.
	pub fn interpret(value: u32) -> Option<Self> {
		match value {
			0 => Some(GuestStatus::Success),
			1 => Some(GuestStatus::Abort),
			_ => None,
		}
	}
}

impl From<GuestStatus> for u32 {
	fn from(status: GuestStatus) -> Self {
		status as u32
	}
}
