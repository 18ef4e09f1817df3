#![doc = include_str!("../README.md")]

mod common;
pub use common::*;
// Public re-exports so downstream crates build messages with the same `prost`
// the bindings were generated against.
pub use prost;
pub use prost_types;
