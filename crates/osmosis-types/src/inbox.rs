//! The pending inbox: serialized payloads awaiting receipt.
//!
//! Each side of the boundary owns one inbox, keyed by the handle the sender
//! chose. A payload enters the inbox in one of two ways:
//!
//! - Through the three-phase buffer handoff: [`Inbox::reserve`] allocates a
//!   buffer the sender then fills, and [`Inbox::commit`] marks the bytes
//!   complete. Until commit, the entry is not readable.
//! - Directly, via [`Inbox::insert_ready`], when the sender hands over a
//!   finished byte sequence in one call.
//!
//! Either way the bytes are stored undecoded; decoding near the boundary
//! would widen the window in which a fault can occur there. Entries leave
//! the inbox exactly once, through [`Inbox::claim`]. Inserting under an
//! occupied handle is rejected so that a handle reused before receipt
//! surfaces as an error instead of a silent overwrite.

use std::collections::HashMap;

use crate::err::ProtocolError;

/// Byte filler for reserved buffers. Easy to recognise if part of the buffer
/// was never written by the sender.
const FILL: u8 = 0xA5;

#[derive(Debug)]
enum Slot {
	/// Space was reserved but the sender has not signalled completion.
	Allocated(Vec<u8>),
	/// The transfer is complete and the bytes may be claimed.
	Ready(Vec<u8>),
}

/// Pending serialized values, keyed by sender-chosen handle.
#[derive(Debug, Default)]
pub struct Inbox {
	slots: HashMap<u32, Slot>,
}

impl Inbox {
	pub fn new() -> Self {
		Self {
			slots: HashMap::new(),
		}
	}

	/// Number of pending entries, committed or not.
	pub fn len(&self) -> usize {
		self.slots.len()
	}

	pub fn is_empty(&self) -> bool {
		self.slots.is_empty()
	}

	/// Reserve `len` bytes for an incoming transfer under `handle`.
	///
	/// Returns the buffer the sender must fill. The buffer's backing storage
	/// does not move for as long as the entry stays in the inbox, so a
	/// pointer to it may be handed across the boundary.
	pub fn reserve(&mut self, handle: u32, len: u32) -> Result<&mut Vec<u8>, ProtocolError> {
		if self.slots.contains_key(&handle) {
			return Err(ProtocolError::HandleInUse(handle));
		}
		let slot = self.slots.entry(handle).or_insert(Slot::Allocated(vec![FILL; len as usize]));
		match slot {
			Slot::Allocated(buf) => Ok(buf),
			Slot::Ready(_) => unreachable!("freshly reserved slot cannot be ready"),
		}
	}

	/// Mutable view of a previously reserved, not yet committed buffer.
	pub fn buffer_mut(&mut self, handle: u32) -> Option<&mut Vec<u8>> {
		match self.slots.get_mut(&handle) {
			Some(Slot::Allocated(buf)) => Some(buf),
			_ => None,
		}
	}

	/// Mark a reserved transfer as complete, making it claimable.
	pub fn commit(&mut self, handle: u32) -> Result<(), ProtocolError> {
		match self.slots.get_mut(&handle) {
			None => Err(ProtocolError::UnknownHandle(handle)),
			Some(Slot::Ready(_)) => Err(ProtocolError::AlreadyCommitted(handle)),
			Some(slot) => {
				let Slot::Allocated(buf) = std::mem::replace(slot, Slot::Ready(Vec::new()))
				else {
					unreachable!()
				};
				*slot = Slot::Ready(buf);
				Ok(())
			}
		}
	}

	/// Insert a completed payload in one step.
	///
	/// Fails if the handle is occupied, leaving the existing entry intact.
	pub fn insert_ready(&mut self, handle: u32, bytes: Vec<u8>) -> Result<(), ProtocolError> {
		if self.slots.contains_key(&handle) {
			return Err(ProtocolError::HandleInUse(handle));
		}
		self.slots.insert(handle, Slot::Ready(bytes));
		Ok(())
	}

	/// Remove and return a committed payload. Single use: claiming the same
	/// handle twice fails the second claim.
	pub fn claim(&mut self, handle: u32) -> Result<Vec<u8>, ProtocolError> {
		match self.slots.get(&handle) {
			None => Err(ProtocolError::UnknownHandle(handle)),
			Some(Slot::Allocated(_)) => Err(ProtocolError::NotCommitted(handle)),
			Some(Slot::Ready(_)) => {
				let Some(Slot::Ready(bytes)) = self.slots.remove(&handle) else {
					unreachable!()
				};
				Ok(bytes)
			}
		}
	}
}

#[cfg(test)]
mod tests {

	use super::*;

	#[test]
	fn reserve_write_commit_claim() {
		let mut inbox = Inbox::new();
		let buf = inbox.reserve(3, 5).unwrap();
		buf.copy_from_slice(b"hello");
		inbox.commit(3).unwrap();
		assert_eq!(inbox.claim(3).unwrap(), b"hello");
		assert!(inbox.is_empty());
	}

	#[test]
	fn claim_is_single_use() {
		let mut inbox = Inbox::new();
		inbox.insert_ready(1, b"once".to_vec()).unwrap();
		inbox.claim(1).unwrap();
		match inbox.claim(1) {
			Err(ProtocolError::UnknownHandle(1)) => {}
			other => panic!("unexpected result: {other:?}"),
		}
	}

	#[test]
	fn claim_before_commit_is_distinct_error() {
		let mut inbox = Inbox::new();
		inbox.reserve(2, 4).unwrap();
		match inbox.claim(2) {
			Err(ProtocolError::NotCommitted(2)) => {}
			other => panic!("unexpected result: {other:?}"),
		}
		// The reservation stays in place; committing afterwards still works.
		inbox.commit(2).unwrap();
		assert_eq!(inbox.claim(2).unwrap().len(), 4);
	}

	#[test]
	fn double_insert_keeps_first_value() {
		let mut inbox = Inbox::new();
		inbox.insert_ready(9, b"first".to_vec()).unwrap();
		match inbox.insert_ready(9, b"second".to_vec()) {
			Err(ProtocolError::HandleInUse(9)) => {}
			other => panic!("unexpected result: {other:?}"),
		}
		assert_eq!(inbox.claim(9).unwrap(), b"first");
	}

	#[test]
	fn double_commit_is_rejected() {
		let mut inbox = Inbox::new();
		inbox.reserve(4, 1).unwrap();
		inbox.commit(4).unwrap();
		match inbox.commit(4) {
			Err(ProtocolError::AlreadyCommitted(4)) => {}
			other => panic!("unexpected result: {other:?}"),
		}
	}

	#[test]
	fn reserve_rejects_occupied_handle() {
		let mut inbox = Inbox::new();
		inbox.reserve(8, 2).unwrap();
		match inbox.reserve(8, 2) {
			Err(ProtocolError::HandleInUse(8)) => {}
			other => panic!("unexpected result: {other:?}"),
		}
	}
}
