//! Model modules whose converters are generated at build time.
pub mod domain;
pub mod wire;
