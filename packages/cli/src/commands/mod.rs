pub mod check;
pub mod render;
pub mod serve;

pub use check::{check, CheckArgs};
pub use render::{render, RenderArgs};
pub use serve::{serve, ServeArgs};
