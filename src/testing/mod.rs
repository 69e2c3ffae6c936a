// src/testing/mod.rs
//! Test doubles for the capture and export seams, shared by unit tests,
//! integration tests and benches.
pub mod mocks;
