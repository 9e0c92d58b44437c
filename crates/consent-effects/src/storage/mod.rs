//! Storage handlers

mod filesystem;
mod memory;

pub use filesystem::FilesystemStorageHandler;
pub use memory::MemoryStorageHandler;
