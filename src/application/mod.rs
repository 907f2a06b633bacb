pub mod error;
pub mod service;
pub mod session;

pub use error::*;
pub use service::*;
pub use session::*;
