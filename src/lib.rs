//! Bidirectional conversion-function generator.
//!
//! Given a primary and a secondary record type, [`matcher::match_records`] pairs their
//! fields and classifies each pair, [`oneof`] folds groups of optional primary fields
//! into tagged unions of the secondary, and [`synth`] renders Rust source converting in
//! both directions. Schemas come from any [`SchemaProvider`]: JSON manifests
//! ([`manifest`]) or the crate's own source files ([`source`]).
pub mod cli;
pub mod error;
pub mod generator;
pub mod locator;
pub mod manifest;
pub mod matcher;
pub mod oneof;
pub mod render;
pub mod schema;
pub mod source;
pub mod synth;

pub use error::{Error, Result};
pub use generator::{Generated, Generator, GeneratorOptions, output_path};
pub use schema::{SchemaProvider, SchemaSet, TypeName};
