//! Conversion synthesis: turns a [`MatchReport`] into Rust source implementing both
//! conversion directions.
//!
//! Output is a pure function of the report and the options. Namespace aliases come from
//! a counter owned by the [`Synthesizer`] instance, so independent invocations never
//! influence each other's output.
mod expr;

use std::collections::HashSet;

use crate::error::Result;
use crate::generator::GeneratorOptions;
use crate::matcher::{FieldMatch, MatchReport};
use crate::oneof::OneofGroup;
use crate::render::Renderer;
use crate::schema::TypeName;

use self::expr::Src;

/// Local alias of the secondary record's package.
pub const SECONDARY_ALIAS: &str = "secpkg";
/// Prefix of aliases for any further package, suffixed with a per-invocation counter.
pub const PACKAGE_ALIAS_PREFIX: &str = "pkg";

const ANYHOW_CONTEXT: &str = "anyhow::Context";

/// Deterministic names of the generated functions and the hooks they call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionNames {
    pub primary_type: String,
    pub secondary_type: String,
    pub forward: String,
    pub backward: String,
    pub forward_hook: String,
    pub backward_hook: String,
}

pub struct Synthesizer<'a> {
    report: &'a MatchReport,
    options: &'a GeneratorOptions,
    r: Renderer,
    counter: usize,
    names: ConversionNames,
}

/// Renders both conversion directions for `report`.
pub fn synthesize(report: &MatchReport, options: &GeneratorOptions) -> Result<String> {
    let mut synth = Synthesizer::new(report, options);
    synth.forward()?;
    synth.backward()?;
    Ok(synth.finish())
}

impl<'a> Synthesizer<'a> {
    pub fn new(report: &'a MatchReport, options: &'a GeneratorOptions) -> Self {
        let mut r = Renderer::new();
        r.header(format!("// Code generated by {}. DO NOT EDIT.", options.tool_name));
        let mut synth = Self {
            report,
            options,
            r,
            counter: 0,
            names: ConversionNames::default(),
        };

        let primary_type = ident(&report.primary.name);
        let secondary_type = synth.type_path(&report.secondary);
        let secunder = snake(&secondary_type.replace("::", "_"));
        let primunder = snake(&report.primary.name);
        let forward = format!("{primunder}_to_{secunder}");
        let backward = format!("{secunder}_to_{primunder}");
        synth.names = ConversionNames {
            forward_hook: format!("{}_{forward}", options.hook_prefix),
            backward_hook: format!("{}_{backward}", options.hook_prefix),
            primary_type,
            secondary_type,
            forward,
            backward,
        };
        synth
    }

    pub fn names(&self) -> &ConversionNames {
        &self.names
    }

    pub fn finish(self) -> String {
        self.r.finish()
    }

    // -------------------- primary -> secondary --------------------

    pub fn forward(&mut self) -> Result<()> {
        let names = self.names.clone();
        let report = self.report;
        let options = self.options;

        match &options.method {
            Some(method) => {
                self.r.l("impl $0 {", &[&names.primary_type]);
                self.r.l("/// Converts [`$0`] into [`$1`].", &[&names.primary_type, &names.secondary_type]);
                self.r.l("#[allow(unused_mut, unused_variables, clippy::all)]", &[]);
                self.r.l("pub fn $0(&self) -> anyhow::Result<$1> {", &[&ident(method), &names.secondary_type]);
                self.r.l("let x = self;", &[]);
            }
            None => {
                self.r.l("/// Converts [`$0`] into [`$1`].", &[&names.primary_type, &names.secondary_type]);
                self.r.l("#[allow(unused_mut, unused_variables, clippy::all)]", &[]);
                self.r.l(
                    "pub fn $0(x: Option<&$1>) -> anyhow::Result<Option<$2>> {",
                    &[&names.forward, &names.primary_type, &names.secondary_type],
                );
                self.nil_guard();
            }
        }
        self.r.n();
        self.r.l("let mut res = $0::default();", &[&names.secondary_type]);

        let mut done: HashSet<usize> = HashSet::new();
        for name in &report.primary_order {
            if let Some(m) = report.field_match(name) {
                if m.descriptor.is_match() {
                    self.forward_field(m)?;
                }
            } else if let Some(idx) = report.oneofs.iter().position(|g| g.contains_primary(name)) {
                // the whole group is emitted at the position of its first branch field
                if done.insert(idx) {
                    self.forward_oneof(&report.oneofs[idx])?;
                }
            }
        }

        if report.primary_mismatch() {
            self.hook_call(&names.forward_hook, &report.primary_unmatched, &names.primary_type, &names.secondary_type);
        }

        self.r.n();
        match &options.method {
            Some(_) => {
                self.r.l("Ok(res)", &[]);
                self.r.l("}", &[]);
                self.r.l("}", &[]);
            }
            None => {
                self.r.l("Ok(Some(res))", &[]);
                self.r.l("}", &[]);
            }
        }
        Ok(())
    }

    fn forward_field(&mut self, m: &FieldMatch) -> Result<()> {
        let ctx = format!("field {}", m.primary.name);
        let src = Src::place(format!("x.{}", ident(&m.primary.name)));
        let value = self.value(&src, &m.descriptor, &ctx, 0)?;

        self.r.n();
        self.r.l("// field $0", &[&m.primary.name]);
        self.r.l("res.$0 = $1;", &[&ident(&m.secondary.name), &value]);
        Ok(())
    }

    fn forward_oneof(&mut self, group: &OneofGroup) -> Result<()> {
        let union = self.type_path(&group.union);
        let target = ident(&group.secondary.name);
        let fields: Vec<&str> = group.branches.iter().map(|b| b.primary.name.as_str()).collect();

        self.r.n();
        self.r.l(
            "// fields $0 refer to branches of oneof $1",
            &[&fields.join(" | "), &group.secondary.name],
        );
        for (i, b1) in group.branches.iter().enumerate() {
            for b2 in &group.branches[i + 1..] {
                self.r.l(
                    "if x.$0.is_some() && x.$1.is_some() {",
                    &[&ident(&b1.primary.name), &ident(&b2.primary.name)],
                );
                self.r.l(
                    "anyhow::bail!(\"fields $0 and $1 refer to respective branches of oneof $2 and must not coexist\");",
                    &[&b1.primary.name, &b2.primary.name, &group.secondary.name],
                );
                self.r.l("}", &[]);
            }
        }

        for (i, b) in group.branches.iter().enumerate() {
            let ctx = format!("field {} into respective oneof branch", b.primary.name);
            let value = self.value(&Src::reference("v0"), &b.descriptor, &ctx, 1)?;
            let mut built = format!("{union}::{}({value})", ident(&b.variant));
            if group.optional {
                built = format!("Some({built})");
            }

            let opener = if i == 0 { "if let" } else { "} else if let" };
            self.r.l("$0 Some(v0) = &x.$1 {", &[&opener, &ident(&b.primary.name)]);
            self.r.l("res.$0 = $1;", &[&target, &built]);
        }
        self.r.l("}", &[]);
        Ok(())
    }

    // -------------------- secondary -> primary --------------------

    pub fn backward(&mut self) -> Result<()> {
        let names = self.names.clone();
        let report = self.report;

        self.r.n();
        self.r.l("/// Converts [`$0`] into [`$1`].", &[&names.secondary_type, &names.primary_type]);
        self.r.l("#[allow(unused_mut, unused_variables, clippy::all)]", &[]);
        self.r.l(
            "pub fn $0(x: Option<&$1>) -> anyhow::Result<Option<$2>> {",
            &[&names.backward, &names.secondary_type, &names.primary_type],
        );
        self.nil_guard();
        self.r.n();
        self.r.l("let mut res = $0::default();", &[&names.primary_type]);

        for name in &report.secondary_order {
            if let Some(m) = report.matches.iter().find(|m| &m.secondary.name == name) {
                if m.descriptor.is_match() {
                    self.backward_field(m)?;
                }
            } else if let Some(group) = report.oneofs.iter().find(|g| &g.secondary.name == name) {
                self.backward_oneof(group)?;
            }
        }

        if report.secondary_mismatch() {
            self.hook_call(&names.backward_hook, &report.secondary_unmatched, &names.secondary_type, &names.primary_type);
        }

        self.r.n();
        self.r.l("Ok(Some(res))", &[]);
        self.r.l("}", &[]);
        Ok(())
    }

    fn backward_field(&mut self, m: &FieldMatch) -> Result<()> {
        let descriptor = m.descriptor.reflect()?;
        let ctx = format!("field {}", m.secondary.name);
        let src = Src::place(format!("x.{}", ident(&m.secondary.name)));
        let value = self.value(&src, &descriptor, &ctx, 0)?;

        self.r.n();
        self.r.l("// field $0", &[&m.secondary.name]);
        self.r.l("res.$0 = $1;", &[&ident(&m.primary.name), &value]);
        Ok(())
    }

    fn backward_oneof(&mut self, group: &OneofGroup) -> Result<()> {
        let union = self.type_path(&group.union);

        self.r.n();
        self.r.l("// oneof $0", &[&group.secondary.name]);
        self.r.l("match &x.$0 {", &[&ident(&group.secondary.name)]);
        for b in &group.branches {
            let descriptor = b.descriptor.reflect()?;
            let ctx = format!("branch {} of oneof {}", b.variant, group.secondary.name);
            let value = self.value(&Src::reference("v0"), &descriptor, &ctx, 1)?;

            let mut pattern = format!("{union}::{}(v0)", ident(&b.variant));
            if group.optional {
                pattern = format!("Some({pattern})");
            }
            self.r.l("$0 => {", &[&pattern]);
            self.r.l("res.$0 = Some($1);", &[&ident(&b.primary.name), &value]);
            self.r.l("}", &[]);
        }
        if !group.is_exhaustive() {
            self.r.l("_ => {}", &[]);
        } else if group.optional {
            self.r.l("None => {}", &[]);
        }
        self.r.l("}", &[]);
        Ok(())
    }

    // -------------------- shared --------------------

    fn nil_guard(&mut self) {
        self.r.l("let Some(x) = x else {", &[]);
        self.r.l("return Ok(None);", &[]);
        self.r.l("};", &[]);
    }

    fn hook_call(&mut self, hook: &str, unmatched: &[String], src: &str, dst: &str) {
        self.r.n();
        self.r.l("// not converted automatically: $0", &[&unmatched.join(", ")]);
        self.r.l(
            "// fn $0(src: &$1, dst: &mut $2) -> anyhow::Result<()> is written by hand",
            &[&hook, &src, &dst],
        );
        self.r.l("$0(x, &mut res)?;", &[&hook]);
    }

    /// Path of a declaration as seen from the primary's package.
    pub(crate) fn type_path(&mut self, name: &TypeName) -> String {
        match self.package_alias(&name.package) {
            Some(alias) => format!("{alias}::{}", ident(&name.name)),
            None => ident(&name.name),
        }
    }

    fn package_alias(&mut self, package: &str) -> Option<String> {
        if package == self.report.primary.package {
            return None;
        }
        if let Some(alias) = self.r.alias_of(package) {
            return Some(alias.to_string());
        }
        let alias = if package == self.report.secondary.package {
            SECONDARY_ALIAS.to_string()
        } else {
            let alias = format!("{PACKAGE_ALIAS_PREFIX}{}", self.counter);
            self.counter += 1;
            alias
        };
        Some(self.r.import(package, &alias))
    }

    fn use_context(&mut self) {
        self.r.import_trait(ANYHOW_CONTEXT);
    }
}

// ————————————————————————————————————————————————————————————————————————————
// IDENTIFIERS
// ————————————————————————————————————————————————————————————————————————————

const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do",
    "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in",
    "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "static", "struct", "trait", "true", "try", "type", "typeof", "unsafe", "unsized",
    "use", "virtual", "where", "while", "yield",
];

/// Keywords that cannot be raw identifiers get the reserved `_` suffix instead.
const NON_RAW: &[&str] = &["self", "Self", "super", "crate"];

/// Identifier as it must be spelled in source.
pub fn ident(name: &str) -> String {
    if NON_RAW.contains(&name) {
        format!("{name}_")
    } else if KEYWORDS.contains(&name) {
        format!("r#{name}")
    } else {
        name.to_string()
    }
}

/// `UserDTO` -> `user_dto`, `secpkg_User` -> `secpkg_user`.
pub fn snake(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                let prev = chars[i - 1];
                let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
                if prev != '_' && (prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower)) {
                    out.push('_');
                }
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::match_records;
    use crate::matcher::tests::{domain_user, pair, prim, wire_user};
    use crate::schema::{
        Field, FunctionDecl, PackageSchema, Param, Primitive, Receiver, Record, SchemaSet, TypeRef,
        UnionBranch, UnionDecl,
    };

    fn render(set: &SchemaSet, options: &GeneratorOptions) -> String {
        let report = match_records(set, &domain_user(), &wire_user()).unwrap();
        synthesize(&report, options).unwrap()
    }

    fn users(domain: Vec<Field>, wire: Vec<Field>) -> SchemaSet {
        pair(
            PackageSchema::new("crate::domain").with_record(Record::new("User", domain)),
            PackageSchema::new("crate::wire").with_record(Record::new("User", wire)),
        )
    }

    #[test]
    fn renders_both_directions() {
        let set = users(
            vec![Field::new("id", prim(Primitive::I64)), Field::new("age", prim(Primitive::I32))],
            vec![Field::new("id", prim(Primitive::I64)), Field::new("age", prim(Primitive::I64))],
        );
        let expected = "\
// Code generated by convgen generate. DO NOT EDIT.

use crate::wire as secpkg;

/// Converts [`User`] into [`secpkg::User`].
#[allow(unused_mut, unused_variables, clippy::all)]
pub fn user_to_secpkg_user(x: Option<&User>) -> anyhow::Result<Option<secpkg::User>> {
    let Some(x) = x else {
        return Ok(None);
    };

    let mut res = secpkg::User::default();

    // field id
    res.id = x.id.clone();

    // field age
    res.age = x.age as i64;

    Ok(Some(res))
}

/// Converts [`secpkg::User`] into [`User`].
#[allow(unused_mut, unused_variables, clippy::all)]
pub fn secpkg_user_to_user(x: Option<&secpkg::User>) -> anyhow::Result<Option<User>> {
    let Some(x) = x else {
        return Ok(None);
    };

    let mut res = User::default();

    // field id
    res.id = x.id.clone();

    // field age
    res.age = x.age as i32;

    Ok(Some(res))
}
";
        assert_eq!(render(&set, &GeneratorOptions::default()), expected);
    }

    #[test]
    fn containers_bind_fresh_names_per_level() {
        let set = users(
            vec![
                Field::new("scores", TypeRef::mapping(prim(Primitive::String), prim(Primitive::I32))),
                Field::new("nickname", TypeRef::pointer(prim(Primitive::String))),
                Field::new("ratios", TypeRef::sequence(TypeRef::pointer(prim(Primitive::F32)))),
            ],
            vec![
                Field::new("scores", TypeRef::mapping(prim(Primitive::String), prim(Primitive::I64))),
                Field::new("nickname", prim(Primitive::String)),
                Field::new("ratios", TypeRef::sequence(TypeRef::pointer(prim(Primitive::F64)))),
            ],
        );
        let out = render(&set, &GeneratorOptions::default());
        assert!(out.contains("    res.scores = x.scores.iter().map(|(k0, v0)| -> anyhow::Result<_> {\n        Ok((k0.clone(), *v0 as i64))\n    }).collect::<anyhow::Result<_>>()?;\n"), "{out}");
        assert!(out.contains("    res.nickname = match &x.nickname {\n        Some(v0) => v0.clone(),\n        None => Default::default(),\n    };\n"), "{out}");
        assert!(out.contains("    res.nickname = Some(x.nickname.clone());\n"), "{out}");
        assert!(out.contains("Ok(match v0 {\n            Some(v1) => Some(*v1 as f64),\n            None => None,\n        })"), "{out}");
    }

    fn optional_string(name: &str) -> Field {
        Field::new(name, TypeRef::pointer(prim(Primitive::String)))
    }

    fn contact_set(domain: Vec<Field>) -> SchemaSet {
        users(
            domain,
            vec![
                Field::new("id", prim(Primitive::I64)),
                Field::new("contact", TypeRef::pointer(TypeRef::named("crate::wire::user", "Contact"))),
            ],
        )
        .with(PackageSchema::new("crate::wire::user").with_union(UnionDecl::new(
            "Contact",
            vec![
                UnionBranch::new("Email", "email", prim(Primitive::String)),
                UnionBranch::new("Phone", "phone", prim(Primitive::String)),
                UnionBranch::new("Fax", "fax", prim(Primitive::String)),
            ],
        )))
    }

    fn full_contact_set() -> SchemaSet {
        contact_set(vec![
            Field::new("id", prim(Primitive::I64)),
            optional_string("email"),
            optional_string("phone"),
            optional_string("fax"),
        ])
    }

    #[test]
    fn oneof_checks_every_pair_and_matches_every_branch() {
        let out = render(&full_contact_set(), &GeneratorOptions::default());

        assert!(out.contains("use crate::wire::user as pkg0;\n"));
        assert_eq!(out.matches("must not coexist").count(), 3);
        assert!(out.contains(
            "anyhow::bail!(\"fields email and phone refer to respective branches of oneof contact and must not coexist\");"
        ));
        assert!(out.contains("    if let Some(v0) = &x.email {\n        res.contact = Some(pkg0::Contact::Email(v0.clone()));\n"));
        assert!(out.contains("    } else if let Some(v0) = &x.fax {\n"));

        let arms = out.lines().filter(|l| l.trim_start().starts_with("Some(pkg0::Contact::")).count();
        assert_eq!(arms, 3);
        assert!(out.contains("        Some(pkg0::Contact::Phone(v0)) => {\n            res.phone = Some(v0.clone());\n        }\n"));
        assert!(out.contains("        None => {}\n"));
        assert!(!out.contains("_ => {}"));
        assert!(!out.contains("manual_"));
    }

    #[test]
    fn uncovered_variants_fall_through_and_call_the_hook() {
        let set = contact_set(vec![
            Field::new("id", prim(Primitive::I64)),
            optional_string("email"),
            optional_string("phone"),
        ]);
        let out = render(&set, &GeneratorOptions::default());
        assert!(out.contains("        _ => {}\n"));
        assert!(!out.contains("None => {}"));
        assert!(!out.contains("manual_user_to_secpkg_user"));
        assert!(out.contains("    // not converted automatically: contact::Fax\n"));
        assert!(out.contains("    manual_secpkg_user_to_user(x, &mut res)?;\n"));
    }

    #[test]
    fn unmatched_fields_call_hand_written_hooks() {
        let set = users(
            vec![Field::new("id", prim(Primitive::I64)), Field::new("legacy", prim(Primitive::String))],
            vec![Field::new("id", prim(Primitive::I64)), Field::new("region", prim(Primitive::String))],
        );
        let out = render(&set, &GeneratorOptions::default());
        assert!(out.contains("    // not converted automatically: legacy\n"));
        assert!(out.contains(
            "    // fn manual_user_to_secpkg_user(src: &User, dst: &mut secpkg::User) -> anyhow::Result<()> is written by hand\n"
        ));
        assert!(out.contains("    manual_user_to_secpkg_user(x, &mut res)?;\n"));
        assert!(out.contains("    manual_secpkg_user_to_user(x, &mut res)?;\n"));

        let options = GeneratorOptions { hook_prefix: "custom".into(), ..GeneratorOptions::default() };
        assert!(render(&set, &options).contains("custom_user_to_secpkg_user(x, &mut res)?;"));
    }

    #[test]
    fn method_binding_replaces_the_nil_guard() {
        let set = users(
            vec![Field::new("id", prim(Primitive::I64))],
            vec![Field::new("id", prim(Primitive::I64))],
        );
        let options = GeneratorOptions { method: Some("to_wire".into()), ..GeneratorOptions::default() };
        let out = render(&set, &options);
        assert!(out.contains(
            "impl User {\n    /// Converts [`User`] into [`secpkg::User`].\n    #[allow(unused_mut, unused_variables, clippy::all)]\n    pub fn to_wire(&self) -> anyhow::Result<secpkg::User> {\n        let x = self;\n"
        ), "{out}");
        assert!(out.contains("        Ok(res)\n    }\n}\n"));
        // the reverse direction stays a free function
        assert!(out.contains("pub fn secpkg_user_to_user(x: Option<&secpkg::User>)"));
        assert_eq!(out.matches("return Ok(None);").count(), 1);
    }

    #[test]
    fn fallible_conversions_import_context() {
        let mut domain = PackageSchema::new("crate::domain")
            .with_record(Record::new("User", vec![Field::new("address", TypeRef::named("crate::domain", "Address"))]))
            .with_record(Record::new("Address", vec![]));
        domain.functions = vec![
            FunctionDecl {
                name: "to_wire".into(),
                receiver: Some(Receiver { name: "Address".into(), by_ref: true }),
                param: None,
                output: TypeRef::named("crate::wire", "Address"),
                fallible: false,
            },
            FunctionDecl {
                name: "address_from_wire".into(),
                receiver: None,
                param: Some(Param { ty: TypeRef::named("crate::wire", "Address"), by_ref: true }),
                output: TypeRef::named("crate::domain", "Address"),
                fallible: true,
            },
        ];
        let set = pair(
            domain,
            PackageSchema::new("crate::wire")
                .with_record(Record::new("User", vec![Field::new("address", TypeRef::named("crate::wire", "Address"))]))
                .with_record(Record::new("Address", vec![])),
        );
        let out = render(&set, &GeneratorOptions::default());
        assert!(out.contains("use anyhow::Context as _;\nuse crate::wire as secpkg;\n"));
        assert!(out.contains("res.address = x.address.to_wire();\n"));
        assert!(out.contains("res.address = address_from_wire(&x.address).context(\"field address\")?;\n"));
    }

    #[test]
    fn output_is_deterministic() {
        let options = GeneratorOptions::default();
        assert_eq!(render(&full_contact_set(), &options), render(&full_contact_set(), &options));
    }

    #[test]
    fn same_package_types_render_bare() {
        let fields = vec![Field::new("id", prim(Primitive::I64))];
        let set = SchemaSet::new().with(
            PackageSchema::new("crate::domain")
                .with_record(Record::new("User", fields.clone()))
                .with_record(Record::new("UserDTO", fields)),
        );
        let report = match_records(&set, &domain_user(), &TypeName::new("crate::domain", "UserDTO")).unwrap();
        let options = GeneratorOptions::default();
        let synth = Synthesizer::new(&report, &options);
        assert_eq!(synth.names().forward, "user_to_user_dto");
        assert_eq!(synth.names().backward_hook, "manual_user_dto_to_user");

        let out = synthesize(&report, &options).unwrap();
        assert!(!out.contains("\nuse "));
        assert!(out.contains("let mut res = UserDTO::default();"));
    }

    #[test]
    fn identifiers() {
        assert_eq!(snake("UserDTO"), "user_dto");
        assert_eq!(snake("HTTPServer"), "http_server");
        assert_eq!(snake("secpkg_User"), "secpkg_user");
        assert_eq!(snake("Point3D"), "point3_d");
        assert_eq!(ident("type"), "r#type");
        assert_eq!(ident("gen"), "r#gen");
        assert_eq!(ident("self"), "self_");
        assert_eq!(ident("name"), "name");
    }
}
