//! Built-in DNS backends

pub mod memory;

pub use memory::{MemoryFactory, MemoryProvider};
