//! Host function registration: the boundary entries the guest can call.
//!
//! Every entry registered here is a fault containment point. Whatever goes
//! wrong inside (a protocol violation, an out of bounds pointer, a panic) is
//! reported locally and degraded to a status code; nothing unwinds into the
//! guest's call frame and no inbox state is left half mutated, because the
//! insert is the last step of the wrapped work.

use std::panic::{catch_unwind, AssertUnwindSafe};

use anyhow::Result;
use osmosis_types::status::HostStatus;
use wasmtime::{Caller, Linker};

use crate::controller::StoreData;

/// Register the `osmosis` import namespace on the linker.
pub fn implement_host_functions(linker: &mut Linker<StoreData>) -> Result<()> {
	linker.func_wrap(
		"osmosis",
		"deliver",
		|mut caller: Caller<'_, StoreData>, handle: u32, ptr: u32, len: u32| -> u32 {
			let max_transfer = caller.data().config.max_transfer_bytes;
			let bytes = read_guest_memory(&mut caller, ptr, len);
			let status = catch_unwind(AssertUnwindSafe(|| {
				caller.data_mut().session.deliver(max_transfer, handle, bytes)
			}))
			.unwrap_or_else(|_| {
				tracing::error!(handle, "panic contained at the `deliver` boundary entry");
				HostStatus::Fault
			});
			status.into()
		},
	)?;

	linker.func_wrap(
		"osmosis",
		"abort_report",
		|mut caller: Caller<'_, StoreData>, word: u32| {
			let _ = catch_unwind(AssertUnwindSafe(|| {
				caller.data_mut().session.report_abort(word);
			}));
		},
	)?;

	Ok(())
}

/// Copy `len` bytes at `ptr` out of the guest's exported linear memory.
/// Returns `None` when the module has no usable memory export or the region
/// is out of bounds.
fn read_guest_memory(caller: &mut Caller<'_, StoreData>, ptr: u32, len: u32) -> Option<Vec<u8>> {
	let export = caller.data().config.memory_export.clone();
	let memory = caller.get_export(&export)?.into_memory()?;
	let data = memory.data(&caller);
	let start = ptr as usize;
	let end = start.checked_add(len as usize)?;
	data.get(start..end).map(<[u8]>::to_vec)
}
