mod compiler;

pub use compiler::{compile_document, compile_vnodes, CompileError, DocumentOptions, BRIDGE_SCRIPT};

#[cfg(test)]
mod tests;
