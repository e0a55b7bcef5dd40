pub mod bootstrap;
pub mod builtins;
pub mod channel;
pub mod evaluator;
pub mod hooks;
pub mod loader;
pub mod methods;
pub mod overlay;
pub mod render;
pub mod scope;
pub mod session;
pub mod stub;
pub mod transformer;
pub mod value;
pub mod vdom;

#[cfg(test)]
mod tests_expressions;

#[cfg(test)]
mod tests_loader;

#[cfg(test)]
mod tests_render;

#[cfg(test)]
mod tests_router;

#[cfg(test)]
mod tests_session;

pub use bootstrap::{BootError, RuntimeCheck, RuntimeDependency};
pub use channel::{HostMessage, InboundMessage, Location};
pub use evaluator::{EvalError, EvalErrorKind, EvalResult, Evaluator};
pub use overlay::OverlayPanel;
pub use session::{Diagnostic, DiagnosticKind, PreviewSession, SessionContext};
pub use stub::MockStub;
pub use value::Value;
pub use vdom::{VNode, VirtualDomDocument};
