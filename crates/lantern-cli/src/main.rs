//! Lantern CLI — run a WASM module under the WASI shim, or inspect its
//! section layout.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use lantern_core::binary::module::Module;
use lantern_core::exec::runtime::Runtime;
use lantern_core::exec::value::Value;
use lantern_core::exec::wasi::WasiPreview1;

#[derive(Parser)]
#[command(name = "lantern", version, about = "A miniature WebAssembly interpreter")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Instantiate a module with the WASI shim and invoke an export.
    Run {
        /// Path to a `.wasm` binary.
        wasm: PathBuf,
        /// Name of the export to invoke.
        #[arg(long, default_value = "_start")]
        invoke: String,
        /// i32 arguments passed to the invoked function.
        args: Vec<i32>,
    },
    /// Decode a module and print a summary of its contents.
    Inspect {
        /// Path to a `.wasm` binary.
        wasm: PathBuf,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    env_logger::init();

    match Cli::parse().command {
        Command::Run { wasm, invoke, args } => run(&wasm, &invoke, args),
        Command::Inspect { wasm } => inspect(&wasm),
    }
}

fn run(path: &Path, invoke: &str, args: Vec<i32>) -> anyhow::Result<ExitCode> {
    let bytes = read(path)?;
    let mut runtime = Runtime::instantiate_with_wasi(&bytes, WasiPreview1::new())?;
    log::debug!("instantiated {} ({} bytes)", path.display(), bytes.len());

    let args = args.into_iter().map(Value::I32).collect();
    let result = runtime.call(invoke, args)?;
    log::debug!("`{invoke}` returned {result:?}");

    // The entry routine's i32 result doubles as the process exit code.
    if invoke == "_start" {
        if let Some(Value::I32(code)) = result {
            return Ok(ExitCode::from(code as u8));
        }
    } else if let Some(value) = result {
        println!("{value}");
    }
    Ok(ExitCode::SUCCESS)
}

fn inspect(path: &Path) -> anyhow::Result<ExitCode> {
    let bytes = read(path)?;
    let module = Module::decode(&bytes)?;

    println!("Decoded: {} ({} bytes)", path.display(), bytes.len());
    println!("  {:>10}  {}", "types", module.types.len());
    println!("  {:>10}  {}", "imports", module.imports.len());
    println!("  {:>10}  {}", "functions", module.functions.len());
    println!("  {:>10}  {}", "memories", module.memories.len());
    println!("  {:>10}  {}", "exports", module.exports.len());
    println!("  {:>10}  {}", "data", module.data.len());
    println!("  {:>10}  {}", "customs", module.customs.len());

    for import in &module.imports {
        println!("  import {}.{}", import.module, import.field);
    }
    for export in &module.exports {
        println!("  export {} ({:?})", export.name, export.desc);
    }

    Ok(ExitCode::SUCCESS)
}

fn read(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}
