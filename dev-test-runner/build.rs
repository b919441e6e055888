//! Generates the domain <-> wire converters into OUT_DIR.
use std::path::PathBuf;

use convgen::source::SourceProvider;
use convgen::{Generator, GeneratorOptions, TypeName};

/// (record, method binding for the domain -> wire direction)
const PAIRS: &[(&str, Option<&str>)] = &[
    ("User", None),
    ("Point", Some("to_wire")),
    ("Tag", None),
    ("Account", None),
];

fn main() -> anyhow::Result<()> {
    let root = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR")?);
    let out_dir = PathBuf::from(std::env::var("OUT_DIR")?);
    println!("cargo:rerun-if-changed=src/domain.rs");
    println!("cargo:rerun-if-changed=src/wire.rs");

    for (name, method) in PAIRS {
        let provider = SourceProvider::new(&root);
        let options = GeneratorOptions {
            method: method.map(str::to_string),
            ..GeneratorOptions::default()
        };
        let generator = Generator::new(
            &provider,
            TypeName::new("crate::domain", *name),
            TypeName::new("crate::wire", *name),
            options,
        )?;
        let generated = generator.generate()?;
        let file = out_dir.join(format!("{}_convgen.rs", name.to_lowercase()));
        std::fs::write(&file, generated.source)?;
    }
    Ok(())
}
