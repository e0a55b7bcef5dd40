pub mod config;
pub mod error;
pub mod filesystem;
pub mod project;
pub mod store;
pub mod visitor;

pub use config::*;
pub use error::*;
pub use filesystem::*;
pub use project::*;
pub use store::*;
pub use visitor::*;
