//! Session persistence for Deo.
//!
//! Key-value backends (`InMemoryStore`, `FileStore`) implement
//! `deo_core::KeyValueStore`; `SessionStore` layers the bounded session
//! collection on top of any of them.

pub mod file_backend;
pub mod in_memory;
pub mod sessions;

pub use file_backend::FileStore;
pub use in_memory::InMemoryStore;
pub use sessions::SessionStore;
