//! Process-wide tracing setup shared by the gateway binary and tests.

/// Initialize tracing for the process.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    tracing::init();
}

/// Subscriber construction (filter, JSON formatting).
pub mod tracing;
