pub mod errors;
pub mod factory;
pub mod remote;

pub use errors::AppError;
pub use factory::{AppFactory, AppPaths};
pub use remote::AppRemote;
