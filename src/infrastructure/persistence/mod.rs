pub mod csv_codec;
pub mod file_store;
pub mod in_memory;

pub use file_store::FileArtifactStore;
pub use in_memory::InMemoryArtifactStore;
