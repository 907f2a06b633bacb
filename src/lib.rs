pub mod application;
pub mod domain;
pub mod io;
pub mod storage;

pub use application::{AccountService, AppError, Session};
pub use domain::*;
pub use storage::Repository;
