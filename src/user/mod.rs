//! User accounts: model, persistence, business rules and input validation.

mod model;
mod repository;
mod service;
pub mod validation;

pub use model::{NewUser, User};
pub use repository::{SqlUserRepository, UserRepository};
pub use service::UserService;
