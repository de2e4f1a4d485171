//! Shared protocol vocabulary for Osmosis.
//!
//! Osmosis moves structured values between a WASM guest module and the host
//! that loaded it, across a boundary that natively carries only scalar
//! integers. This crate holds everything both sides must agree on: handle
//! namespaces, per-side status codes, the pending inbox that buffers
//! serialized payloads between `send` and `receive`, the pluggable codec that
//! turns values into bytes, the abort-message reassembly buffer, and the
//! error taxonomy.
//!
//! Nothing in this crate touches a virtual machine. The host runtime
//! (`osmosis-runtime`) and the guest SDK (`osmosis`) both build their session
//! logic on top of these types.

pub mod abort;
pub mod codec;
pub mod err;
pub mod handle;
pub mod inbox;
pub mod status;

/// Default ceiling for a single transfer, in bytes. Both sides enforce the
/// same ceiling unless configured otherwise.
pub const DEFAULT_MAX_TRANSFER: u32 = 16 * 1024 * 1024;

pub use abort::AbortReport;
pub use codec::{Codec, JsonCodec};
pub use err::{PrefixError, ProtocolError, TransportError};
pub use handle::{GuestHandle, HandleCounter, HostHandle};
pub use inbox::Inbox;
pub use status::{GuestStatus, HostStatus};
