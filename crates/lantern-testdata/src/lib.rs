//! WASM test fixtures assembled from WebAssembly text sources.
//!
//! Add `.wat` files to `fixtures/` and register them in [`fixture_wat`].
//! Use [`fixture_bytes`] to get the assembled binary in tests.

/// Names of every registered fixture.
pub const FIXTURES: &[&str] = &[
    "hello_world",
    "math",
    "call",
    "import",
    "fib",
    "clamp",
    "local_set",
    "i32_store",
    "i32_const",
    "memory",
    "data_overflow",
    "proc_exit",
];

/// Source text of a named fixture.
pub fn fixture_wat(name: &str) -> &'static str {
    match name {
        "hello_world" => include_str!("../fixtures/hello_world.wat"),
        "math" => include_str!("../fixtures/math.wat"),
        "call" => include_str!("../fixtures/call.wat"),
        "import" => include_str!("../fixtures/import.wat"),
        "fib" => include_str!("../fixtures/fib.wat"),
        "clamp" => include_str!("../fixtures/clamp.wat"),
        "local_set" => include_str!("../fixtures/local_set.wat"),
        "i32_store" => include_str!("../fixtures/i32_store.wat"),
        "i32_const" => include_str!("../fixtures/i32_const.wat"),
        "memory" => include_str!("../fixtures/memory.wat"),
        "data_overflow" => include_str!("../fixtures/data_overflow.wat"),
        "proc_exit" => include_str!("../fixtures/proc_exit.wat"),
        _ => panic!("unknown fixture '{name}'"),
    }
}

/// Assemble a named fixture to WASM bytes.
pub fn fixture_bytes(name: &str) -> Vec<u8> {
    wat::parse_str(fixture_wat(name))
        .unwrap_or_else(|e| panic!("failed to assemble fixture '{name}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_fixture_assembles() {
        for name in FIXTURES {
            let bytes = fixture_bytes(name);
            assert!(
                bytes.len() >= 8,
                "{name}.wasm too small: {} bytes",
                bytes.len()
            );
            assert_eq!(&bytes[..4], b"\0asm", "{name} is not a valid WASM binary");
        }
    }

    #[test]
    fn hello_world_carries_the_greeting() {
        let bytes = fixture_bytes("hello_world");
        let greeting = b"Hello, World!\n";
        assert!(
            bytes.windows(greeting.len()).any(|w| w == greeting),
            "greeting bytes missing from data segment"
        );
    }
}
