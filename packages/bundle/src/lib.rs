pub mod assets;
pub mod bundle;
pub mod resolver;

pub use assets::*;
pub use bundle::*;
pub use resolver::*;
