//! Test support shared by the quizroom test binaries.
//!
//! Currently this is the idempotent logging bootstrap; integration test
//! fixtures live next to the tests that use them.

pub mod logging;
