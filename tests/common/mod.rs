//! Shared helpers for integration tests.

use kiln::Runtime;

pub fn setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Skip guard for tests that need a working C toolchain.
pub fn toolchain_available(runtime: &Runtime) -> bool {
    if runtime.is_toolchain_available() {
        true
    } else {
        eprintln!("C toolchain not available, skipping");
        false
    }
}
