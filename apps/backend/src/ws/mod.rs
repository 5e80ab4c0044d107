pub mod hub;
pub mod protocol;
pub mod session;

pub use hub::WsRegistry;
pub use session::WsSession;
