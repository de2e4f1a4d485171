//! Reassembly of abort messages streamed across the boundary.
//!
//! When the guest aborts there is no structured error channel left; the
//! whole call stack is torn down. To keep the diagnostic from vanishing, the
//! aborting side streams its message through a dedicated reporting entry,
//! one scalar at a time: first the byte length of the message, then one byte
//! per call. The receiving side buffers the bytes here and, once the
//! declared length is reached, yields the complete message so it can be
//! raised as an ordinary recoverable error.

/// Stream `message` in the wire order [`AbortReport`] expects: the byte
/// length first, then one byte per call.
pub fn stream(message: &str, mut report: impl FnMut(u32)) {
	report(message.len() as u32);
	for byte in message.bytes() {
		report(u32::from(byte));
	}
}

/// Incremental buffer for one length-prefixed abort message.
#[derive(Debug, Default)]
pub enum AbortReport {
	/// No message in flight. The next word is a length prefix.
	#[default]
	Idle,
	/// A length prefix was seen; collecting that many message bytes.
	Collecting {
		remaining: usize,
		buf: Vec<u8>,
	},
}

impl AbortReport {
	pub fn new() -> Self {
		Self::Idle
	}

	/// Feed one reported word.
	///
	/// Returns the reconstructed message once all declared bytes arrived.
	/// Only the low byte of a message word is kept; the sender reports one
	/// byte per call.
	pub fn push(&mut self, word: u32) -> Option<String> {
		match self {
			AbortReport::Idle => {
				if word == 0 {
					return Some(String::new());
				}
				*self = AbortReport::Collecting {
					remaining: word as usize,
					buf: Vec::with_capacity(word as usize),
				};
				None
			}
			AbortReport::Collecting {
				remaining,
				buf,
			} => {
				buf.push(word as u8);
				*remaining -= 1;
				if *remaining == 0 {
					let bytes = std::mem::take(buf);
					*self = AbortReport::Idle;
					Some(String::from_utf8_lossy(&bytes).into_owned())
				} else {
					None
				}
			}
		}
	}
}
