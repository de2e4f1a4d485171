//! Host runtime for Osmosis.
//!
//! Loads a WASM guest module built against the `osmosis` guest SDK and
//! exchanges structured values with it over a handle-based protocol. The
//! boundary only carries scalar integers; values cross as serialized bytes
//! written into guest linear memory (host to guest, via the module's alloc
//! and commit exports) or copied out of it (guest to host, via the `deliver`
//! import this runtime registers). Opaque `u32` handles name the pending
//! values on either side; the application carries the handles, typically as
//! arguments of the guest exports it invokes.
//!
//! ```ignore
//! use osmosis_runtime::{Controller, OsmosisConfig, Session};
//! use osmosis_types::codec::JsonCodec;
//!
//! let controller = Controller::new(&wasm_bytes, OsmosisConfig::default())?;
//! let mut session = Session::new(controller);
//! session.bind()?;
//!
//! let prices = session.send(&JsonCodec, &prices_map)?;
//! let fridge = session.send(&JsonCodec, &fridge_list)?;
//! let result = session.invoke("fridge_value_ffi", &[prices.into(), fridge.into()])?;
//! let value: Result<f64, String> = session.receive(&JsonCodec, result.into())?;
//! ```

pub mod config;
pub mod controller;
pub mod host;
pub mod session;

pub use config::OsmosisConfig;
pub use controller::{Controller, StoreData};
pub use session::{GuestLink, Session, SessionState};
