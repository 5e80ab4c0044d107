//! Repository layer: store traits and their implementations.

pub mod memory;
pub mod sea;
pub mod store;

pub use memory::InMemoryStore;
pub use sea::SeaStore;
pub use store::{IdentityStore, SessionStore};
