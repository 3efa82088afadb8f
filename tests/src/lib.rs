//! Host-side scenario tests for the power controller.
//!
//! Everything runs against the portable core with a recording mock board
//! and a simulated millisecond tick, so the full protocol and life cycle
//! can be exercised deterministically on the host.

pub mod lifecycle_tests;
pub mod protocol_tests;
pub mod recovery_tests;
