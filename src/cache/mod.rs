//! Node-local cache storage
//!
//! - `ByteView`: immutable value bytes
//! - `LocalStore`: key -> value map behind a single reader/writer lock

pub mod byteview;
pub mod store;

pub use byteview::ByteView;
pub use store::LocalStore;
