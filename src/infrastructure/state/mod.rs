//! Durable per-technique state on local disk.

pub mod filesystem;

pub use filesystem::FileSystemStateStore;
