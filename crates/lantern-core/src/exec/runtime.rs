//! The interpreter — a stack machine over decoded function bodies.
//!
//! One [`Frame`] per activation; labels track enclosing `if` blocks. Host
//! imports are boxed closures keyed by module and field name, with WASI
//! dispatched specially when a shim is attached.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::Error;
use crate::binary::code::Instruction;
use crate::binary::module::{ExportDesc, Module};
use crate::exec::store::{ExternalFunc, FuncInst, InternalFunc, Store};
use crate::exec::trap::Trap;
use crate::exec::value::Value;
#[cfg(feature = "std")]
use crate::exec::wasi::WasiPreview1;
use crate::types::{NumType, ValType};

/// A host function: receives the store and the call arguments, returns an
/// optional result value.
pub type HostFunc = Box<dyn FnMut(&mut Store, Vec<Value>) -> Result<Option<Value>, Trap>>;

type ImportTable = BTreeMap<String, BTreeMap<String, HostFunc>>;

/// An enclosing structured block inside a frame.
struct BlockLabel {
    sp: usize,
    arity: usize,
}

/// One function activation.
struct Frame {
    pc: isize,
    sp: usize,
    insts: Vec<Instruction>,
    arity: usize,
    labels: Vec<BlockLabel>,
    locals: Vec<Value>,
}

/// A module instance plus everything needed to run it.
pub struct Runtime {
    pub store: Store,
    stack: Vec<Value>,
    frames: Vec<Frame>,
    imports: ImportTable,
    #[cfg(feature = "std")]
    wasi: Option<WasiPreview1>,
}

impl Runtime {
    /// Decode and instantiate a module with no host imports attached.
    pub fn instantiate(wasm: impl AsRef<[u8]>) -> Result<Self, Error> {
        let module = Module::decode(wasm.as_ref())?;
        let store = Store::new(module)?;
        Ok(Self {
            store,
            stack: Vec::new(),
            frames: Vec::new(),
            imports: BTreeMap::new(),
            #[cfg(feature = "std")]
            wasi: None,
        })
    }

    /// Decode and instantiate a module with the WASI shim attached.
    #[cfg(feature = "std")]
    pub fn instantiate_with_wasi(
        wasm: impl AsRef<[u8]>,
        wasi: WasiPreview1,
    ) -> Result<Self, Error> {
        let mut runtime = Self::instantiate(wasm)?;
        runtime.wasi = Some(wasi);
        Ok(runtime)
    }

    /// Mutable access to the attached WASI shim, if any.
    #[cfg(feature = "std")]
    pub fn wasi_mut(&mut self) -> Option<&mut WasiPreview1> {
        self.wasi.as_mut()
    }

    /// Register a host function for `module`.`field` imports.
    pub fn add_import(
        &mut self,
        module: impl Into<String>,
        field: impl Into<String>,
        func: impl FnMut(&mut Store, Vec<Value>) -> Result<Option<Value>, Trap> + 'static,
    ) {
        self.imports
            .entry(module.into())
            .or_default()
            .insert(field.into(), Box::new(func));
    }

    /// Invoke an exported function by name.
    pub fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Option<Value>, Trap> {
        let desc = *self
            .store
            .exports
            .get(name)
            .ok_or_else(|| Trap::ExportNotFound { name: name.into() })?;
        let ExportDesc::Func(idx) = desc else {
            return Err(Trap::ExportNotCallable { name: name.into() });
        };

        let func = self
            .store
            .funcs
            .get(idx.0 as usize)
            .cloned()
            .ok_or(Trap::UnknownFunction { index: idx.0 })?;

        for arg in args {
            self.stack.push(arg);
        }

        match func {
            FuncInst::Internal(func) => self.invoke_internal(&func),
            FuncInst::External(func) => self.invoke_external(&func),
        }
    }

    fn push_frame(&mut self, func: &InternalFunc) -> Result<(), Trap> {
        let bottom = self
            .stack
            .len()
            .checked_sub(func.ty.params.len())
            .ok_or(Trap::StackUnderflow)?;
        let mut locals = self.stack.split_off(bottom);

        for ty in &func.locals {
            match ty {
                ValType::Num(NumType::I32) => locals.push(Value::I32(0)),
                ValType::Num(NumType::I64) => locals.push(Value::I64(0)),
                _ => return Err(Trap::UnsupportedLocalType),
            }
        }

        self.frames.push(Frame {
            pc: -1,
            sp: self.stack.len(),
            insts: func.body.clone(),
            arity: func.ty.results.len(),
            labels: Vec::new(),
            locals,
        });

        Ok(())
    }

    fn invoke_internal(&mut self, func: &InternalFunc) -> Result<Option<Value>, Trap> {
        let arity = func.ty.results.len();

        self.push_frame(func)?;
        if let Err(trap) = self.execute() {
            self.cleanup();
            return Err(trap);
        }

        if arity > 0 {
            let value = self.stack.pop().ok_or(Trap::MissingReturnValue)?;
            return Ok(Some(value));
        }
        Ok(None)
    }

    fn invoke_external(&mut self, func: &ExternalFunc) -> Result<Option<Value>, Trap> {
        let bottom = self
            .stack
            .len()
            .checked_sub(func.ty.params.len())
            .ok_or(Trap::StackUnderflow)?;
        let args = self.stack.split_off(bottom);

        #[cfg(feature = "std")]
        if func.module == "wasi_snapshot_preview1"
            && let Some(wasi) = self.wasi.as_mut()
        {
            return wasi.invoke(&mut self.store, &func.field, args);
        }

        let host = self
            .imports
            .get_mut(&func.module)
            .and_then(|m| m.get_mut(&func.field))
            .ok_or_else(|| Trap::UnresolvedImport {
                module: func.module.clone(),
                field: func.field.clone(),
            })?;
        host(&mut self.store, args)
    }

    fn execute(&mut self) -> Result<(), Trap> {
        loop {
            let Some(frame) = self.frames.last_mut() else {
                break;
            };

            frame.pc += 1;

            let Some(inst) = frame.insts.get(frame.pc as usize) else {
                break;
            };

            match inst {
                Instruction::If(block_type) => {
                    let cond = pop_i32(&mut self.stack)?;
                    if cond == 0 {
                        // Skip the block: land on the matching `end`, which
                        // the next iteration steps past. No label to track.
                        frame.pc = matching_end(&frame.insts, frame.pc as usize)? as isize;
                    } else {
                        frame.labels.push(BlockLabel {
                            sp: self.stack.len(),
                            arity: block_type.arity(),
                        });
                    }
                }
                Instruction::End => match frame.labels.pop() {
                    Some(label) => unwind(&mut self.stack, label.sp, label.arity)?,
                    None => {
                        // End of the function body.
                        let frame = self.frames.pop().ok_or(Trap::StackUnderflow)?;
                        unwind(&mut self.stack, frame.sp, frame.arity)?;
                    }
                },
                Instruction::Return => {
                    let frame = self.frames.pop().ok_or(Trap::StackUnderflow)?;
                    unwind(&mut self.stack, frame.sp, frame.arity)?;
                }
                Instruction::Call(index) => {
                    let index = *index;
                    let func = self
                        .store
                        .funcs
                        .get(index as usize)
                        .cloned()
                        .ok_or(Trap::UnknownFunction { index })?;
                    match func {
                        FuncInst::Internal(func) => self.push_frame(&func)?,
                        FuncInst::External(func) => {
                            if let Some(value) = self.invoke_external(&func)? {
                                self.stack.push(value);
                            }
                        }
                    }
                }
                Instruction::LocalGet(index) => {
                    let value = *frame
                        .locals
                        .get(*index as usize)
                        .ok_or(Trap::UnknownLocal { index: *index })?;
                    self.stack.push(value);
                }
                Instruction::LocalSet(index) => {
                    let index = *index as usize;
                    let value = self.stack.pop().ok_or(Trap::StackUnderflow)?;
                    let slot = frame
                        .locals
                        .get_mut(index)
                        .ok_or(Trap::UnknownLocal { index: index as u32 })?;
                    *slot = value;
                }
                Instruction::I32Store(memarg) => {
                    let offset = memarg.offset as usize;
                    let value = pop_i32(&mut self.stack)?;
                    let addr = pop_i32(&mut self.stack)? as u32 as usize;
                    let memory = self.store.memories.first_mut().ok_or(Trap::NoMemory)?;
                    memory.write_at(addr + offset, &value.to_le_bytes())?;
                }
                Instruction::I32Const(value) => self.stack.push(Value::I32(*value)),
                Instruction::I32Add => {
                    let (left, right) = pop_pair(&mut self.stack)?;
                    self.stack.push(Value::I32(left.wrapping_add(right)));
                }
                Instruction::I32Sub => {
                    let (left, right) = pop_pair(&mut self.stack)?;
                    self.stack.push(Value::I32(left.wrapping_sub(right)));
                }
                Instruction::I32LtS => {
                    let (left, right) = pop_pair(&mut self.stack)?;
                    self.stack.push(Value::from(left < right));
                }
            }
        }
        Ok(())
    }

    fn cleanup(&mut self) {
        self.stack.clear();
        self.frames.clear();
    }
}

fn pop_i32(stack: &mut Vec<Value>) -> Result<i32, Trap> {
    stack.pop().ok_or(Trap::StackUnderflow)?.try_into()
}

/// Pop a binop's operands: right-hand side is on top.
fn pop_pair(stack: &mut Vec<Value>) -> Result<(i32, i32), Trap> {
    let right = pop_i32(stack)?;
    let left = pop_i32(stack)?;
    Ok((left, right))
}

/// Index of the `end` matching the block opened at `pc`.
fn matching_end(insts: &[Instruction], pc: usize) -> Result<usize, Trap> {
    let mut depth = 0;
    for (i, inst) in insts.iter().enumerate().skip(pc + 1) {
        match inst {
            Instruction::If(_) => depth += 1,
            Instruction::End if depth == 0 => return Ok(i),
            Instruction::End => depth -= 1,
            _ => {}
        }
    }
    Err(Trap::MissingEnd)
}

/// Drop everything above `sp`, preserving `arity` results from the top.
fn unwind(stack: &mut Vec<Value>, sp: usize, arity: usize) -> Result<(), Trap> {
    if arity > 0 {
        if stack.len() <= sp {
            return Err(Trap::MissingReturnValue);
        }
        let value = stack.pop().ok_or(Trap::MissingReturnValue)?;
        stack.truncate(sp);
        stack.push(value);
    } else {
        stack.truncate(sp);
    }
    Ok(())
}
