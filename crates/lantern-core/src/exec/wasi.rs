//! Minimal WASI preview 1 host — just enough to say hello.
//!
//! Implements `fd_write` over a small table of writers. Errnos are returned
//! to the guest as the call's i32 result, never as traps: a module that
//! ignores the result code keeps running, and a module that returns it
//! passes the host's verdict through unmodified.

use std::io::{self, Write};

use crate::exec::store::Store;
use crate::exec::trap::Trap;
use crate::exec::value::Value;

/// WASI errno: success.
pub const ERRNO_SUCCESS: i32 = 0;
/// WASI errno: bad file descriptor.
pub const ERRNO_BADF: i32 = 8;
/// WASI errno: I/O error.
pub const ERRNO_IO: i32 = 29;

/// A `wasi_snapshot_preview1` host with a file-descriptor table of writers.
///
/// Fds 1 and 2 default to the process's stdout and stderr; fd 0 has no
/// writer. Entries can be replaced (or removed) to capture or fail writes.
pub struct WasiPreview1 {
    fds: Vec<Option<Box<dyn Write>>>,
}

impl WasiPreview1 {
    pub fn new() -> Self {
        Self {
            fds: vec![
                None,
                Some(Box::new(io::stdout()) as Box<dyn Write>),
                Some(Box::new(io::stderr())),
            ],
        }
    }

    /// Replace the writer behind `fd`, growing the table if needed.
    pub fn set_fd(&mut self, fd: usize, writer: Box<dyn Write>) {
        if fd >= self.fds.len() {
            self.fds.resize_with(fd + 1, || None);
        }
        self.fds[fd] = Some(writer);
    }

    /// Remove the writer behind `fd`; subsequent writes to it fail with
    /// `EBADF`.
    pub fn close_fd(&mut self, fd: usize) {
        if let Some(entry) = self.fds.get_mut(fd) {
            *entry = None;
        }
    }

    pub(crate) fn invoke(
        &mut self,
        store: &mut Store,
        field: &str,
        args: Vec<Value>,
    ) -> Result<Option<Value>, Trap> {
        match field {
            "fd_write" => self.fd_write(store, args),
            _ => Err(Trap::UnsupportedWasi {
                field: field.to_string(),
            }),
        }
    }

    /// `fd_write(fd, iovs, iovs_len, nwritten_ptr) -> errno`
    ///
    /// Walks `iovs_len` (pointer, length) descriptors in linear memory and
    /// writes each referenced byte range to the fd's writer. Each range is
    /// written once — a short write is reported through `nwritten` but is
    /// not retried and does not fail the call.
    fn fd_write(&mut self, store: &mut Store, args: Vec<Value>) -> Result<Option<Value>, Trap> {
        if args.len() != 4 {
            return Err(Trap::TypeMismatch {
                expected: "(i32, i32, i32, i32)",
            });
        }
        let fd = i32::try_from(args[0])? as u32 as usize;
        let mut iovs = i32::try_from(args[1])? as u32 as usize;
        let iovs_len = i32::try_from(args[2])? as u32;
        let nwritten_ptr = i32::try_from(args[3])? as u32 as usize;

        let memory = store.memories.first_mut().ok_or(Trap::NoMemory)?;

        let Some(writer) = self.fds.get_mut(fd).and_then(|w| w.as_mut()) else {
            return Ok(Some(Value::I32(ERRNO_BADF)));
        };

        let mut nwritten: u32 = 0;
        for _ in 0..iovs_len {
            let start = memory.read_u32(iovs)? as usize;
            let len = memory.read_u32(iovs + 4)? as usize;
            iovs += 8;

            match writer.write(memory.slice(start, len)?) {
                Ok(n) => nwritten += n as u32,
                Err(_) => return Ok(Some(Value::I32(ERRNO_IO))),
            }
        }

        memory.write_at(nwritten_ptr, &nwritten.to_le_bytes())?;

        Ok(Some(Value::I32(ERRNO_SUCCESS)))
    }
}

impl Default for WasiPreview1 {
    fn default() -> Self {
        Self::new()
    }
}
