use convgen::matcher::{MatchDescriptor, match_records};
use convgen::schema::{EnumDecl, Field, PackageSchema, Primitive, Record, TypeRef, UnionBranch, UnionDecl};
use convgen::source::SourceProvider;
use convgen::{Error, Generator, GeneratorOptions, SchemaSet, TypeName};

fn generate(name: &str, options: GeneratorOptions) -> String {
    let provider = SourceProvider::new(env!("CARGO_MANIFEST_DIR"));
    let generator = Generator::new(
        &provider,
        TypeName::new("crate::domain", name),
        TypeName::new("crate::wire", name),
        options,
    )
    .unwrap();
    generator.generate().unwrap().source
}

#[test]
fn output_is_byte_identical_across_runs() {
    let first = generate("User", GeneratorOptions::default());
    let second = generate("User", GeneratorOptions::default());
    assert_eq!(first, second);
    assert_eq!(first, include_str!(concat!(env!("OUT_DIR"), "/user_convgen.rs")));
}

#[test]
fn identical_schemas_match_directly_without_hooks() {
    let provider = SourceProvider::new(env!("CARGO_MANIFEST_DIR"));
    let report = match_records(
        &provider,
        &TypeName::new("crate::domain", "Tag"),
        &TypeName::new("crate::wire", "Tag"),
    )
    .unwrap();
    assert!(report.matches.iter().all(|m| m.descriptor == MatchDescriptor::Direct));
    assert!(!report.primary_mismatch() && !report.secondary_mismatch());
    assert!(!generate("Tag", GeneratorOptions::default()).contains("manual_"));
}

#[test]
fn extra_enum_constant_is_fatal() {
    let status = |pkg: &str| Field::new("status", TypeRef::named(pkg, "Status"));
    let set = SchemaSet::new()
        .with(
            PackageSchema::new("crate::domain")
                .with_record(Record::new("User", vec![status("crate::domain")]))
                .with_enum(EnumDecl::new("Status", ["Active", "Suspended", "Banned"])),
        )
        .with(
            PackageSchema::new("crate::wire")
                .with_record(Record::new("User", vec![status("crate::wire")]))
                .with_enum(EnumDecl::new("Status", ["Active", "Suspended"])),
        );
    let generator = Generator::new(
        &set,
        TypeName::new("crate::domain", "User"),
        TypeName::new("crate::wire", "User"),
        GeneratorOptions::default(),
    )
    .unwrap();
    let err = generator.generate().unwrap_err();
    assert!(matches!(err.root(), Error::EnumMismatch { constant, .. } if constant == "Banned"));
}

#[test]
fn n_branch_oneof_gets_pairwise_checks_and_n_arms() {
    let names = ["a", "b", "c", "d"];
    let set = SchemaSet::new()
        .with(PackageSchema::new("crate::domain").with_record(Record::new(
            "Msg",
            names
                .iter()
                .map(|n| Field::new(*n, TypeRef::pointer(TypeRef::Primitive(Primitive::String))))
                .collect(),
        )))
        .with(
            PackageSchema::new("crate::wire")
                .with_record(Record::new(
                    "Msg",
                    vec![Field::new("body", TypeRef::named("crate::wire", "Body"))],
                ))
                .with_union(UnionDecl::new(
                    "Body",
                    names
                        .iter()
                        .map(|n| UnionBranch::new(n.to_uppercase(), *n, TypeRef::Primitive(Primitive::String)))
                        .collect(),
                )),
        );
    let generator = Generator::new(
        &set,
        TypeName::new("crate::domain", "Msg"),
        TypeName::new("crate::wire", "Msg"),
        GeneratorOptions::default(),
    )
    .unwrap();
    let source = generator.generate().unwrap().source;

    // C(4, 2)
    assert_eq!(source.matches("must not coexist").count(), 6);
    let arms = source.lines().filter(|l| l.trim_start().starts_with("secpkg::Body::")).count();
    assert_eq!(arms, 4);
    // the union field is not optional and every variant is covered
    assert!(!source.contains("None => {}"));
    assert!(!source.contains("_ => {}"));
}
