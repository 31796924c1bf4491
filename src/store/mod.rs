pub mod base;
pub mod memory;
pub mod mongo;

pub use base::{RecordStore, WriteSummary};
pub use memory::MemoryStore;
pub use mongo::MongoStore;
