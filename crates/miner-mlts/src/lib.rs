pub mod fernet;
pub mod identity;
pub mod nonce_window;
pub mod session_cache;
pub mod service;

pub use service::{elide, HandshakeRequest, MltsService};
