pub mod message;
pub mod service;
pub mod store;

pub use message::ChainMessage;
pub use service::ChainService;
pub use store::{InMemoryStateStore, StateStore};
