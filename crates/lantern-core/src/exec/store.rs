//! Instantiation — turning a decoded [`Module`] into runnable state.
//!
//! The store owns everything an instance needs at runtime: the function
//! space (imported functions first, then module-defined ones), the export
//! map, and linear memories with their data segments applied.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::binary::code::Instruction;
use crate::binary::module::{ExportDesc, ImportDesc, Module};
use crate::exec::trap::Trap;
use crate::types::{FuncType, ValType};

/// Size of one WASM page: 64 KiB.
pub const PAGE_SIZE: u32 = 65536;

/// A module-defined function: its signature, flattened locals, and body.
#[derive(Debug, Clone)]
pub struct InternalFunc {
    pub ty: FuncType,
    pub locals: Vec<ValType>,
    pub body: Vec<Instruction>,
}

/// An imported function: resolved against the host at call time.
#[derive(Debug, Clone)]
pub struct ExternalFunc {
    pub module: String,
    pub field: String,
    pub ty: FuncType,
}

/// An entry in the instance's function space.
#[derive(Debug, Clone)]
pub enum FuncInst {
    Internal(Box<InternalFunc>),
    External(ExternalFunc),
}

/// A linear memory instance.
#[derive(Debug, Default, Clone)]
pub struct MemoryInst {
    pub data: Vec<u8>,
    pub max: Option<u32>,
}

impl MemoryInst {
    /// Borrow `len` bytes starting at `addr`, bounds-checked.
    pub fn slice(&self, addr: usize, len: usize) -> Result<&[u8], Trap> {
        let end = addr
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(Trap::MemoryOutOfBounds { addr, len })?;
        Ok(&self.data[addr..end])
    }

    /// Read a little-endian u32 at `addr`, bounds-checked.
    pub fn read_u32(&self, addr: usize) -> Result<u32, Trap> {
        let b = self.slice(addr, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Write `bytes` starting at `addr`, bounds-checked.
    pub fn write_at(&mut self, addr: usize, bytes: &[u8]) -> Result<(), Trap> {
        let len = bytes.len();
        let end = addr
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(Trap::MemoryOutOfBounds { addr, len })?;
        self.data[addr..end].copy_from_slice(bytes);
        Ok(())
    }
}

/// Runnable instance state built from a decoded module.
#[derive(Debug, Default)]
pub struct Store {
    pub funcs: Vec<FuncInst>,
    pub memories: Vec<MemoryInst>,
    pub exports: BTreeMap<String, ExportDesc>,
}

impl Store {
    /// Instantiate a decoded module.
    pub fn new(module: Module) -> Result<Self, Trap> {
        let mut funcs = Vec::new();

        // Imported functions occupy the front of the function space.
        for import in &module.imports {
            let ImportDesc::Func(type_idx) = import.desc;
            let ty = lookup_type(&module.types, type_idx.0)?;
            funcs.push(FuncInst::External(ExternalFunc {
                module: import.module.clone(),
                field: import.field.clone(),
                ty,
            }));
        }

        for (body, type_idx) in module.code.iter().zip(&module.functions) {
            let ty = lookup_type(&module.types, type_idx.0)?;

            let mut locals = Vec::new();
            for decl in &body.locals {
                for _ in 0..decl.count {
                    locals.push(decl.ty);
                }
            }

            funcs.push(FuncInst::Internal(Box::new(InternalFunc {
                ty,
                locals,
                body: body.code.clone(),
            })));
        }

        let mut exports = BTreeMap::new();
        for export in &module.exports {
            exports.insert(export.name.clone(), export.desc);
        }

        let mut memories: Vec<MemoryInst> = module
            .memories
            .iter()
            .map(|mem| MemoryInst {
                data: vec![0; mem.limits.min as usize * PAGE_SIZE as usize],
                max: mem.limits.max,
            })
            .collect();

        for segment in &module.data {
            let memory = memories
                .get_mut(segment.memory.0 as usize)
                .ok_or(Trap::NoMemory)?;

            let oob = Trap::DataOutOfBounds {
                offset: segment.offset,
                len: segment.init.len(),
            };
            let start = usize::try_from(segment.offset).map_err(|_| oob.clone())?;
            let end = start
                .checked_add(segment.init.len())
                .filter(|&end| end <= memory.data.len())
                .ok_or(oob)?;
            memory.data[start..end].copy_from_slice(&segment.init);
        }

        Ok(Self {
            funcs,
            memories,
            exports,
        })
    }
}

fn lookup_type(types: &[FuncType], index: u32) -> Result<FuncType, Trap> {
    types
        .get(index as usize)
        .cloned()
        .ok_or(Trap::UnknownType { index })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::module::Module;
    use crate::types::FuncIdx;

    fn instantiate(fixture: &str) -> Result<Store, Trap> {
        let bytes = lantern_testdata::fixture_bytes(fixture);
        Store::new(Module::decode(&bytes).unwrap())
    }

    #[test]
    fn init_memory() {
        let store = instantiate("memory").unwrap();
        assert_eq!(store.memories.len(), 1);
        assert_eq!(store.memories[0].data.len(), 65536);
        assert_eq!(&store.memories[0].data[0..5], b"hello");
        assert_eq!(&store.memories[0].data[5..10], b"world");
    }

    #[test]
    fn hello_world_function_space() {
        let store = instantiate("hello_world").unwrap();

        // The import sits at index 0, the entry routine at index 1.
        assert_eq!(store.funcs.len(), 2);
        assert!(matches!(&store.funcs[0], FuncInst::External(ext)
            if ext.module == "wasi_snapshot_preview1" && ext.field == "fd_write"));
        assert!(matches!(&store.funcs[1], FuncInst::Internal(_)));

        assert_eq!(
            store.exports.get("_start"),
            Some(&ExportDesc::Func(FuncIdx(1)))
        );

        // Zero-initialized page with the greeting applied at offset 0.
        assert_eq!(&store.memories[0].data[0..14], b"Hello, World!\n");
        assert!(store.memories[0].data[14..32].iter().all(|&b| b == 0));
    }

    #[test]
    fn reject_oversized_data_segment() {
        let err = instantiate("data_overflow").unwrap_err();
        assert_eq!(
            err,
            Trap::DataOutOfBounds {
                offset: 65535,
                len: 2
            }
        );
    }

    #[test]
    fn memory_bounds_checks() {
        let mut mem = MemoryInst {
            data: vec![0; 8],
            max: None,
        };
        mem.write_at(4, &7u32.to_le_bytes()).unwrap();
        assert_eq!(mem.read_u32(4).unwrap(), 7);
        assert!(matches!(
            mem.read_u32(6),
            Err(Trap::MemoryOutOfBounds { addr: 6, len: 4 })
        ));
        assert!(matches!(
            mem.write_at(usize::MAX, &[1]),
            Err(Trap::MemoryOutOfBounds { .. })
        ));
        assert!(matches!(
            mem.slice(0, 9),
            Err(Trap::MemoryOutOfBounds { .. })
        ));
    }
}
