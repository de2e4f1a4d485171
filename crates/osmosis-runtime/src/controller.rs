use anyhow::Result;
use osmosis_types::err::PrefixError;
use osmosis_types::handle::HostHandle;
use wasmtime::{Engine, Instance, Linker, Memory, Module, Store, Val};

use crate::config::OsmosisConfig;
use crate::host::implement_host_functions;
use crate::session::{GuestLink, SessionState};

pub struct StoreData {
	pub session: SessionState,
	pub config: OsmosisConfig,
}

/// Owns the wasmtime plumbing for one loaded guest module and exposes it as
/// a [`GuestLink`].
pub struct Controller {
	pub store: Store<StoreData>,
	pub instance: Instance,
	pub memory: Memory,
}

impl Controller {
	pub fn new(wasm: impl AsRef<[u8]>, config: OsmosisConfig) -> Result<Self> {
		let engine = Engine::default();
		let module =
			Module::new(&engine, wasm).prefix_err(|| "Failed to construct module from bytes")?;

		let mut linker: Linker<StoreData> = Linker::new(&engine);
		implement_host_functions(&mut linker)
			.prefix_err(|| "failed to implement host functions")?;

		let memory_export = config.memory_export.clone();
		let store_data = StoreData {
			session: SessionState::new(),
			config,
		};
		let mut store = Store::new(&engine, store_data);
		let instance = linker
			.instantiate(&mut store, &module)
			.prefix_err(|| "failed to instantiate WASM module")?;
		let memory = instance.get_memory(&mut store, &memory_export).ok_or_else(|| {
			anyhow::anyhow!("WASM module must export its linear memory as '{memory_export}'")
		})?;

		Ok(Self {
			store,
			instance,
			memory,
		})
	}
}

impl GuestLink for Controller {
	fn alloc(&mut self, handle: HostHandle, len: u32) -> Result<u32> {
		let alloc = self
			.instance
			.get_typed_func::<(u32, u32), u32>(&mut self.store, "__osmo_alloc")?;
		Ok(alloc.call(&mut self.store, (handle.into(), len))?)
	}

	fn write(&mut self, ptr: u32, bytes: &[u8]) -> Result<()> {
		let data = self.memory.data_mut(&mut self.store);
		let start = ptr as usize;
		let end = start
			.checked_add(bytes.len())
			.filter(|end| *end <= data.len())
			.ok_or_else(|| {
				anyhow::anyhow!("write of {} bytes at pointer {ptr} is out of bounds", bytes.len())
			})?;
		data[start..end].copy_from_slice(bytes);
		Ok(())
	}

	fn commit(&mut self, handle: HostHandle) -> Result<u32> {
		let commit =
			self.instance.get_typed_func::<u32, u32>(&mut self.store, "__osmo_commit")?;
		Ok(commit.call(&mut self.store, handle.into())?)
	}

	fn call(&mut self, name: &str, args: &[u32]) -> Result<u32> {
		let func = self
			.instance
			.get_func(&mut self.store, name)
			.ok_or_else(|| anyhow::anyhow!("WASM module does not export function '{name}'"))?;
		let params: Vec<Val> = args.iter().map(|&arg| Val::I32(arg as i32)).collect();
		let mut results = [Val::I32(0)];
		func.call(&mut self.store, &params, &mut results)?;
		match results[0] {
			Val::I32(value) => Ok(value as u32),
			_ => anyhow::bail!("function '{name}' did not return a handle"),
		}
	}

	fn init(&mut self) -> Result<()> {
		let init = self.instance.get_export(&mut self.store, "__osmo_init");
		if init.is_none() {
			return Ok(());
		}

		let init = self.instance.get_typed_func::<(), ()>(&mut self.store, "__osmo_init")?;
		init.call(&mut self.store, ())
	}

	fn with_state<R>(&mut self, f: impl FnOnce(&mut SessionState) -> R) -> R {
		f(&mut self.store.data_mut().session)
	}
}
