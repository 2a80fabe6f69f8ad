//! In-crate tests for the CLI runtime.

mod support;
