//! Guest-side SDK for Osmosis.
//!
//! Osmosis lets a WASM module and its host exchange structured values even
//! though the boundary between them only carries scalar integers. Each value
//! crosses as serialized bytes named by an opaque `u32` handle; the
//! application moves the handle itself, typically as an export argument or
//! return value.
//!
//! A module built on this crate keeps its real logic in ordinary typed Rust
//! and adds a thin export wrapper per entry point:
//!
//! ```ignore
//! use osmosis::{JsonCodec, GuestHandle, HostHandle};
//!
//! fn fridge_value(prices: HashMap<String, f64>, fridge: Vec<String>) -> Result<f64, String> {
//!     fridge.iter().map(|item| prices.get(item)).sum::<Option<f64>>()
//!         .ok_or_else(|| "An item in the fridge didn't have a price.".to_string())
//! }
//!
//! #[no_mangle]
//! extern "C" fn __osmo_init() {
//!     osmosis::bind();
//! }
//!
//! #[no_mangle]
//! extern "C" fn fridge_value_ffi(prices: u32, fridge: u32) -> u32 {
//!     let result = fridge_value(
//!         osmosis::receive(&JsonCodec, prices.into()).unwrap(),
//!         osmosis::receive(&JsonCodec, fridge.into()).unwrap(),
//!     );
//!     osmosis::send(&JsonCodec, &result).unwrap().into()
//! }
//! ```
//!
//! The host drives the module through `osmosis-runtime`, which registers the
//! imports this crate expects and performs the mirrored handoff on its side.

pub mod transport;

#[cfg(target_arch = "wasm32")]
pub mod ffi;

pub use osmosis_types::codec::{Codec, JsonCodec};
pub use osmosis_types::err::{ProtocolError, TransportError};
pub use osmosis_types::handle::{GuestHandle, HostHandle};
pub use transport::{HostCalls, Transport, DEFAULT_MAX_TRANSFER};

#[cfg(target_arch = "wasm32")]
pub use ffi::{bind, bind_with_max_transfer, receive, receive_raw, send, send_raw};
