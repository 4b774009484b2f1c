//! Integration test crate for the lnc workspace.
//!
//! All tests live under `tests/`; this library target exists so the crate
//! participates in the workspace build.
