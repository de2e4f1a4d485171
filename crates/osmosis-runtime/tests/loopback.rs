//! End to end protocol tests over an in-process loopback.
//!
//! The guest side here is the real `osmosis::Transport`, wired to the real
//! host `SessionState` through a fake module link instead of a compiled WASM
//! artifact. Pointers are simulated (the handoff buffer is reached through
//! the transport instead of linear memory), everything else is the genuine
//! protocol: handle issuing, the three-phase handoff, the one-shot deliver
//! path, status codes, and abort reporting.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use anyhow::Result;
use osmosis::{HostCalls, Transport};
use osmosis_runtime::session::{GuestLink, Session, SessionState};
use osmosis_types::codec::JsonCodec;
use osmosis_types::err::{ProtocolError, TransportError};
use osmosis_types::handle::{GuestHandle, HostHandle};
use osmosis_types::status::HostStatus;

const MAX_TRANSFER: u32 = 1024;

/// The host's registered entries, as the guest transport reaches them.
#[derive(Clone)]
struct HostEnd {
	state: Rc<RefCell<SessionState>>,
}

impl HostCalls for HostEnd {
	fn deliver(&mut self, handle: u32, bytes: &[u8]) -> u32 {
		self.state.borrow_mut().deliver(MAX_TRANSFER, handle, Some(bytes.to_vec())).into()
	}

	fn abort_report(&mut self, word: u32) {
		self.state.borrow_mut().report_abort(word);
	}
}

/// A fake module link driving a real guest transport.
struct LoopbackLink {
	state: Rc<RefCell<SessionState>>,
	guest: Transport<HostEnd>,
	writes: usize,
	commits: usize,
}

impl LoopbackLink {
	fn new() -> Self {
		let state = Rc::new(RefCell::new(SessionState::new()));
		let host_end = HostEnd {
			state: state.clone(),
		};
		Self {
			state,
			guest: Transport::new(host_end).with_max_transfer(MAX_TRANSFER),
			writes: 0,
			commits: 0,
		}
	}
}

impl GuestLink for LoopbackLink {
	fn alloc(&mut self, handle: HostHandle, len: u32) -> Result<u32> {
		// A null pointer reports allocation failure; otherwise hand back a
		// fake nonzero pointer the write step can map to the buffer.
		match self.guest.reserve(handle, len) {
			Ok(_) => Ok(u32::from(handle) + 1),
			Err(_) => Ok(0),
		}
	}

	fn write(&mut self, ptr: u32, bytes: &[u8]) -> Result<()> {
		self.writes += 1;
		let handle = HostHandle::from(ptr - 1);
		let buf = self
			.guest
			.buffer_mut(handle)
			.ok_or_else(|| anyhow::anyhow!("no reserved buffer behind pointer {ptr}"))?;
		buf.copy_from_slice(bytes);
		Ok(())
	}

	fn commit(&mut self, handle: HostHandle) -> Result<u32> {
		self.commits += 1;
		Ok(match self.guest.commit(handle) {
			Ok(()) => 0,
			Err(_) => 1,
		})
	}

	fn call(&mut self, name: &str, args: &[u32]) -> Result<u32> {
		match name {
			// Receives a float from the host and sends back its double.
			"double" => {
				let value: f64 = self.guest.receive(&JsonCodec, HostHandle::from(args[0]))?;
				Ok(self.guest.send(&JsonCodec, &(value * 2.0))?.into())
			}
			// Sums the prices of fridge items, as an application would.
			"fridge_value" => {
				let prices: HashMap<String, f64> =
					self.guest.receive(&JsonCodec, HostHandle::from(args[0]))?;
				let fridge: Vec<String> =
					self.guest.receive(&JsonCodec, HostHandle::from(args[1]))?;
				let result: Result<f64, String> = fridge
					.iter()
					.map(|item| prices.get(item).copied())
					.sum::<Option<f64>>()
					.ok_or_else(|| "An item in the fridge didn't have a price.".to_string());
				Ok(self.guest.send(&JsonCodec, &result)?.into())
			}
			// Aborts mid-call, streaming the message like a panic hook would
			// before the trap unwinds to the host.
			"explode" => {
				self.guest.report_abort("boom");
				Err(anyhow::anyhow!("wasm trap: unreachable instruction executed"))
			}
			_ => Err(anyhow::anyhow!("unknown export '{name}'")),
		}
	}

	fn init(&mut self) -> Result<()> {
		Ok(())
	}

	fn with_state<R>(&mut self, f: impl FnOnce(&mut SessionState) -> R) -> R {
		f(&mut self.state.borrow_mut())
	}
}

fn bound_session() -> Session<LoopbackLink> {
	let mut session = Session::new(LoopbackLink::new());
	session.bind().unwrap();
	session
}

#[test]
fn both_sides_default_to_the_same_transfer_ceiling() {
	let config = osmosis_runtime::OsmosisConfig::default();
	assert_eq!(config.max_transfer_bytes, osmosis::DEFAULT_MAX_TRANSFER);
}

#[test]
fn value_round_trips_host_to_guest_and_back() {
	let mut session = bound_session();
	let sent = session.send(&JsonCodec, &21.0_f64).unwrap();
	let returned = session.invoke("double", &[sent.into()]).unwrap();
	let doubled: f64 = session.receive(&JsonCodec, GuestHandle::from(returned)).unwrap();
	assert_eq!(doubled, 42.0);
}

#[test]
fn structured_values_survive_the_boundary() {
	let mut session = bound_session();
	let mut prices = HashMap::new();
	prices.insert("milk".to_string(), 1.5_f64);
	prices.insert("eggs".to_string(), 3.25_f64);
	let fridge = vec!["milk".to_string(), "eggs".to_string()];

	let prices_handle = session.send(&JsonCodec, &prices).unwrap();
	let fridge_handle = session.send(&JsonCodec, &fridge).unwrap();
	let result =
		session.invoke("fridge_value", &[prices_handle.into(), fridge_handle.into()]).unwrap();
	let value: Result<f64, String> =
		session.receive(&JsonCodec, GuestHandle::from(result)).unwrap();
	assert_eq!(value, Ok(4.75));
}

#[test]
fn application_errors_travel_inside_the_value() {
	let mut session = bound_session();
	let prices: HashMap<String, f64> = HashMap::new();
	let fridge = vec!["caviar".to_string()];

	let prices_handle = session.send(&JsonCodec, &prices).unwrap();
	let fridge_handle = session.send(&JsonCodec, &fridge).unwrap();
	let result =
		session.invoke("fridge_value", &[prices_handle.into(), fridge_handle.into()]).unwrap();
	let value: Result<f64, String> =
		session.receive(&JsonCodec, GuestHandle::from(result)).unwrap();
	assert_eq!(value, Err("An item in the fridge didn't have a price.".to_string()));
}

#[test]
fn receiving_the_same_handle_twice_fails() {
	let mut session = bound_session();
	let sent = session.send(&JsonCodec, &1.0_f64).unwrap();
	let returned = session.invoke("double", &[sent.into()]).unwrap();
	let handle = GuestHandle::from(returned);
	let _: f64 = session.receive(&JsonCodec, handle).unwrap();
	let err = session.receive::<f64>(&JsonCodec, handle).unwrap_err();
	match err.downcast_ref::<ProtocolError>() {
		Some(ProtocolError::UnknownHandle(_)) => {}
		other => panic!("unexpected error: {other:?}"),
	}
}

#[test]
fn allocation_failure_aborts_the_send_before_write_and_commit() {
	let mut session = bound_session();
	let oversized = "x".repeat(MAX_TRANSFER as usize);
	let err = session.send(&JsonCodec, &oversized).unwrap_err();
	match err.downcast_ref::<TransportError>() {
		Some(TransportError::AllocFailed {
			..
		}) => {}
		other => panic!("unexpected error: {other:?}"),
	}
	assert_eq!(session.link().writes, 0);
	assert_eq!(session.link().commits, 0);
}

#[test]
fn sending_before_bind_is_a_protocol_violation() {
	let mut session = Session::new(LoopbackLink::new());
	let err = session.send(&JsonCodec, &1.0_f64).unwrap_err();
	match err.downcast_ref::<ProtocolError>() {
		Some(ProtocolError::NotBound) => {}
		other => panic!("unexpected error: {other:?}"),
	}
}

#[test]
fn guest_send_before_bind_sees_not_ready_and_leaves_no_trace() {
	let mut session = Session::new(LoopbackLink::new());
	let err = session.link().guest.send(&JsonCodec, &"early".to_string()).unwrap_err();
	match err.downcast_ref::<TransportError>() {
		Some(TransportError::NotReady) => {}
		other => panic!("unexpected error: {other:?}"),
	}
	session.bind().unwrap();
	// The rejected transfer must not have registered anything in the inbox.
	let err = session.receive::<String>(&JsonCodec, GuestHandle::from(0)).unwrap_err();
	match err.downcast_ref::<ProtocolError>() {
		Some(ProtocolError::UnknownHandle(0)) => {}
		other => panic!("unexpected error: {other:?}"),
	}
}

#[test]
fn guest_abort_surfaces_as_recoverable_error_with_message() {
	let mut session = bound_session();
	let err = session.invoke("explode", &[]).unwrap_err();
	match err.downcast_ref::<TransportError>() {
		Some(TransportError::GuestAbort(message)) => assert_eq!(message, "boom"),
		other => panic!("unexpected error: {other:?}"),
	}
}

#[test]
fn redelivery_under_a_live_handle_is_rejected_and_first_value_kept() {
	let mut session = bound_session();
	let first = session.link().guest.send(&JsonCodec, &"first".to_string()).unwrap();
	// Replay the same handle directly, as a counterpart violating single
	// use would.
	let status = session.link().with_state(|state| {
		state.deliver(MAX_TRANSFER, first.into(), Some(b"\"second\"".to_vec()))
	});
	assert_eq!(status, HostStatus::Fault);
	let value: String = session.receive(&JsonCodec, first).unwrap();
	assert_eq!(value, "first");
}

#[test]
fn handles_advance_independently_per_direction() {
	let mut session = bound_session();
	let host_first = session.send(&JsonCodec, &1_u32).unwrap();
	let host_second = session.send(&JsonCodec, &2_u32).unwrap();
	let guest_first = session.link().guest.send(&JsonCodec, &3_u32).unwrap();
	// Both sides issue from zero; equal numbers in different namespaces
	// never conflict.
	assert_eq!(u32::from(host_first), 0);
	assert_eq!(u32::from(host_second), 1);
	assert_eq!(u32::from(guest_first), 0);
	let value: u32 = session.receive(&JsonCodec, guest_first).unwrap();
	assert_eq!(value, 3);
	let on_guest: u32 = session.link().guest.receive(&JsonCodec, host_first).unwrap();
	assert_eq!(on_guest, 1);
}
