//! Document store backends.

pub mod lance;
pub mod memory;

pub use lance::LanceDbStore;
pub use memory::MemoryStore;
