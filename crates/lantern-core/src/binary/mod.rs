//! WebAssembly binary format decoding.
//!
//! See [Spec §5](https://webassembly.github.io/spec/core/binary/index.html).

pub mod code;
pub mod module;
pub mod reader;
pub mod section;
