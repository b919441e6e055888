//! Schema provider reading Rust source with `syn`.
//!
//! Package paths are module paths (`crate`, `crate::wire`, `crate::wire::user`). A module
//! is read from `src/<path>.rs` or `src/<path>/mod.rs` under the crate root the first time
//! one of its declarations is needed; inline `mod` blocks become packages of their own and
//! `include!("literal")` files are read as part of the including module.
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use syn::ext::IdentExt;

use crate::error::{Error, Result};
use crate::schema::{
    EnumDecl, Field, FunctionDecl, PackageSchema, Param, Primitive, Receiver, Record, SchemaProvider,
    TypeName, TypeRef, UnionBranch, UnionDecl,
};
use crate::synth::snake;

pub const CRATE_ROOT: &str = "crate";

#[derive(Debug)]
pub struct SourceProvider {
    root: PathBuf,
    cache: RefCell<HashMap<String, Arc<PackageSchema>>>,
}

impl SourceProvider {
    /// `root` is the directory holding `Cargo.toml` and `src/`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), cache: RefCell::new(HashMap::new()) }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Packages parsed so far, sorted.
    pub fn loaded(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.cache.borrow().keys().cloned().collect();
        paths.sort();
        paths
    }

    fn load(&self, path: &str) -> Result<()> {
        if self.cache.borrow().contains_key(path) {
            return Ok(());
        }
        if path != CRATE_ROOT && !path.starts_with("crate::") {
            return Err(Error::UnresolvedPackage(path.to_string()));
        }

        if let Some(file) = self.module_file(path) {
            let base = file.parent().map(Path::to_path_buf).unwrap_or_default();
            let items = read_items(&file)?;
            let mut pkgs = Vec::new();
            collect_module(path, items, &base, &mut pkgs)?;
            tracing::debug!(file = %file.display(), packages = pkgs.len(), "parsed module");

            let mut cache = self.cache.borrow_mut();
            for pkg in pkgs {
                cache.entry(pkg.path.clone()).or_insert_with(|| Arc::new(pkg));
            }
            return Ok(());
        }

        // maybe an inline module of its parent
        match path.rsplit_once("::") {
            Some((parent, _)) => match self.load(parent) {
                Err(Error::UnresolvedPackage(_)) => Err(Error::UnresolvedPackage(path.to_string())),
                other => other,
            },
            None => Err(Error::UnresolvedPackage(path.to_string())),
        }
    }

    fn module_file(&self, path: &str) -> Option<PathBuf> {
        let src = self.root.join("src");
        let segments: Vec<&str> = path.split("::").skip(1).collect();
        let candidates = if segments.is_empty() {
            vec![src.join("lib.rs"), src.join("main.rs")]
        } else {
            let rel: PathBuf = segments.iter().collect();
            vec![src.join(&rel).with_extension("rs"), src.join(&rel).join("mod.rs")]
        };
        candidates.into_iter().find(|c| c.is_file())
    }
}

impl SchemaProvider for SourceProvider {
    fn package(&self, path: &str) -> Result<Arc<PackageSchema>> {
        if let Some(pkg) = self.cache.borrow().get(path) {
            return Ok(Arc::clone(pkg));
        }
        self.load(path)?;
        self.cache
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::UnresolvedPackage(path.to_string()))
    }
}

/// Module path of a source file: `./src/domain.rs` is `crate::domain`, `src/lib.rs` is `crate`.
pub fn module_path_of(file: &Path) -> Result<String> {
    let rejected = |reason: &str| Error::LocatorRejected {
        locator: file.display().to_string(),
        reason: reason.to_string(),
    };

    let mut parts: Vec<String> = Vec::new();
    for component in file.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            _ => return Err(rejected("source files must be given relative to the crate root")),
        }
    }
    if parts.first().map(String::as_str) != Some("src") || parts.len() < 2 {
        return Err(rejected("source files must live under src/"));
    }
    let mut modules: Vec<String> = parts.split_off(1);
    let Some(last) = modules.pop() else {
        return Err(rejected("source files must live under src/"));
    };
    let Some(stem) = last.strip_suffix(".rs") else {
        return Err(rejected("not a .rs file"));
    };

    match (modules.is_empty(), stem) {
        (true, "lib" | "main") => {}
        (_, "mod") => {}
        _ => modules.push(stem.to_string()),
    }
    let mut path = String::from(CRATE_ROOT);
    for m in modules {
        path.push_str("::");
        path.push_str(&m);
    }
    Ok(path)
}

// ————————————————————————————————————————————————————————————————————————————
// PARSING
// ————————————————————————————————————————————————————————————————————————————

fn read_items(file: &Path) -> Result<Vec<syn::Item>> {
    let src = std::fs::read_to_string(file).map_err(|e| Error::io(file, e))?;
    let parsed = syn::parse_file(&src).map_err(|source| Error::Parse { path: file.to_path_buf(), source })?;
    Ok(parsed.items)
}

/// Splices `include!("literal")` items in place; other include forms are left out.
fn expand_includes(items: Vec<syn::Item>, base: &Path) -> Result<Vec<syn::Item>> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let syn::Item::Macro(m) = &item else {
            out.push(item);
            continue;
        };
        if !m.mac.path.is_ident("include") {
            out.push(item);
            continue;
        }
        match m.mac.parse_body::<syn::LitStr>() {
            Ok(lit) => {
                let file = base.join(lit.value());
                let included = read_items(&file)?;
                let dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
                out.extend(expand_includes(included, &dir)?);
            }
            Err(_) => tracing::debug!("skipping include! without a literal path"),
        }
    }
    Ok(out)
}

fn collect_module(module: &str, items: Vec<syn::Item>, base: &Path, out: &mut Vec<PackageSchema>) -> Result<()> {
    let items = expand_includes(items, base)?;
    let scope = Scope::new(module, &items);
    let mut pkg = PackageSchema::new(module);

    for item in &items {
        match item {
            syn::Item::Struct(s) => pkg.records.extend(scope.record(s)),
            syn::Item::Enum(e) => scope.enumeration(e, &mut pkg),
            syn::Item::Fn(f) => pkg.functions.extend(scope.free_function(&f.sig)),
            syn::Item::Impl(imp) => pkg.functions.extend(scope.methods(imp)),
            syn::Item::Mod(m) => {
                if let Some((_, content)) = &m.content {
                    let child = format!("{module}::{}", m.ident.unraw());
                    collect_module(&child, content.clone(), base, out)?;
                }
            }
            _ => {}
        }
    }

    out.push(pkg);
    Ok(())
}

/// Name resolution context of one module.
struct Scope {
    module: Vec<String>,
    uses: HashMap<String, Vec<String>>,
    children: HashSet<String>,
}

impl Scope {
    fn new(module: &str, items: &[syn::Item]) -> Self {
        let mut uses = HashMap::new();
        let mut children = HashSet::new();
        for item in items {
            match item {
                syn::Item::Use(u) => walk_use(&u.tree, &mut Vec::new(), &mut uses),
                syn::Item::Mod(m) => {
                    children.insert(m.ident.unraw().to_string());
                }
                _ => {}
            }
        }
        Self {
            module: module.split("::").map(str::to_string).collect(),
            uses,
            children,
        }
    }

    /// Resolves `crate`, `self`, `super` and child-module prefixes to an absolute path.
    fn normalize(&self, segs: &[String]) -> Vec<String> {
        match segs.first().map(String::as_str) {
            Some("crate") => segs.to_vec(),
            Some("self") => {
                let mut full = self.module.clone();
                full.extend_from_slice(&segs[1..]);
                full
            }
            Some("super") => {
                let mut full = self.module.clone();
                let mut rest = segs;
                while rest.first().map(String::as_str) == Some("super") {
                    full.pop();
                    rest = &rest[1..];
                }
                full.extend_from_slice(rest);
                full
            }
            Some(first) if self.children.contains(first) => {
                let mut full = self.module.clone();
                full.extend_from_slice(segs);
                full
            }
            _ => segs.to_vec(),
        }
    }

    fn type_name(&self, segs: &[String]) -> TypeName {
        let full = match segs.first() {
            Some(first) if self.uses.contains_key(first) => {
                let mut full = self.normalize(&self.uses[first]);
                full.extend_from_slice(&segs[1..]);
                full
            }
            Some(_) if segs.len() == 1 => {
                let mut full = self.module.clone();
                full.extend_from_slice(segs);
                full
            }
            _ => self.normalize(segs),
        };
        let (name, package) = full.split_last().map(|(n, p)| (n.clone(), p.join("::"))).unwrap_or_default();
        TypeName::new(package, name)
    }

    fn classify(&self, ty: &syn::Type) -> TypeRef {
        match ty {
            syn::Type::Paren(p) => self.classify(&p.elem),
            syn::Type::Group(g) => self.classify(&g.elem),
            syn::Type::Path(p) if p.qself.is_none() => self.classify_path(&p.path, ty),
            other => TypeRef::Unsupported(describe(other)),
        }
    }

    fn classify_path(&self, path: &syn::Path, ty: &syn::Type) -> TypeRef {
        let Some(last) = path.segments.last() else {
            return TypeRef::Unsupported(describe(ty));
        };
        let Some(args) = type_args(&last.arguments) else {
            return TypeRef::Unsupported(describe(ty));
        };
        let name = last.ident.unraw().to_string();

        match (name.as_str(), args.as_slice()) {
            ("Option", [inner]) => TypeRef::pointer(self.classify(inner)),
            ("Vec", [inner]) => TypeRef::sequence(self.classify(inner)),
            ("HashMap" | "BTreeMap" | "IndexMap", [key, value]) => {
                TypeRef::mapping(self.classify(key), self.classify(value))
            }
            (_, []) => {
                if let Some(p) = Primitive::from_ident(&name) {
                    if path.segments.len() == 1 || p == Primitive::String {
                        return TypeRef::Primitive(p);
                    }
                }
                let segs: Vec<String> = path.segments.iter().map(|s| s.ident.unraw().to_string()).collect();
                TypeRef::Named(self.type_name(&segs))
            }
            _ => TypeRef::Unsupported(describe(ty)),
        }
    }

    fn record(&self, s: &syn::ItemStruct) -> Option<Record> {
        if !s.generics.params.is_empty() {
            tracing::debug!(name = %s.ident, "skipping generic struct");
            return None;
        }
        let syn::Fields::Named(named) = &s.fields else {
            return None;
        };
        let fields = named
            .named
            .iter()
            .filter_map(|f| {
                let name = f.ident.as_ref()?.unraw().to_string();
                Some(Field {
                    name,
                    ty: self.classify(&f.ty),
                    exported: !matches!(f.vis, syn::Visibility::Inherited),
                })
            })
            .collect();
        Some(Record::new(s.ident.unraw().to_string(), fields))
    }

    /// Fieldless enums become enum declarations, single-payload enums tagged unions.
    fn enumeration(&self, e: &syn::ItemEnum, pkg: &mut PackageSchema) {
        if !e.generics.params.is_empty() {
            return;
        }
        let name = e.ident.unraw().to_string();

        if e.variants.iter().all(|v| matches!(v.fields, syn::Fields::Unit)) {
            pkg.enums.push(EnumDecl {
                name,
                underlying: repr(&e.attrs).unwrap_or(Primitive::Isize),
                constants: e.variants.iter().map(|v| v.ident.unraw().to_string()).collect(),
            });
            return;
        }

        let mut branches = Vec::with_capacity(e.variants.len());
        for v in &e.variants {
            let syn::Fields::Unnamed(unnamed) = &v.fields else {
                tracing::debug!(%name, "skipping enum with non-tuple variants");
                return;
            };
            let (Some(payload), 1) = (unnamed.unnamed.first(), unnamed.unnamed.len()) else {
                tracing::debug!(%name, "skipping enum with multi-field variants");
                return;
            };
            let variant = v.ident.unraw().to_string();
            branches.push(UnionBranch::new(variant.clone(), snake(&variant), self.classify(&payload.ty)));
        }
        pkg.unions.push(UnionDecl::new(name, branches));
    }

    fn free_function(&self, sig: &syn::Signature) -> Option<FunctionDecl> {
        if !sig.generics.params.is_empty() || sig.inputs.len() != 1 {
            return None;
        }
        let Some(syn::FnArg::Typed(arg)) = sig.inputs.first() else {
            return None;
        };
        let (ty, by_ref) = self.param(&arg.ty);
        let (output, fallible) = self.output(&sig.output)?;
        Some(FunctionDecl {
            name: sig.ident.unraw().to_string(),
            receiver: None,
            param: Some(Param { ty, by_ref }),
            output,
            fallible,
        })
    }

    /// Methods of inherent impls taking nothing but `self`.
    fn methods(&self, imp: &syn::ItemImpl) -> Vec<FunctionDecl> {
        if imp.trait_.is_some() || !imp.generics.params.is_empty() {
            return Vec::new();
        }
        let syn::Type::Path(self_ty) = imp.self_ty.as_ref() else {
            return Vec::new();
        };
        let Some(type_ident) = self_ty.path.get_ident() else {
            return Vec::new();
        };

        imp.items
            .iter()
            .filter_map(|item| {
                let syn::ImplItem::Fn(f) = item else {
                    return None;
                };
                let sig = &f.sig;
                if !sig.generics.params.is_empty() || sig.inputs.len() != 1 {
                    return None;
                }
                let Some(syn::FnArg::Receiver(recv)) = sig.inputs.first() else {
                    return None;
                };
                if recv.colon_token.is_some() || (recv.reference.is_some() && recv.mutability.is_some()) {
                    return None;
                }
                let (output, fallible) = self.output(&sig.output)?;
                Some(FunctionDecl {
                    name: sig.ident.unraw().to_string(),
                    receiver: Some(Receiver {
                        name: type_ident.unraw().to_string(),
                        by_ref: recv.reference.is_some(),
                    }),
                    param: None,
                    output,
                    fallible,
                })
            })
            .collect()
    }

    /// `&T` and `Option<&T>` are taken by reference.
    fn param(&self, ty: &syn::Type) -> (TypeRef, bool) {
        match ty {
            syn::Type::Reference(r) if r.mutability.is_none() => (self.classify(&r.elem), true),
            syn::Type::Path(p) => match option_of_ref(&p.path) {
                Some(inner) => (TypeRef::pointer(self.classify(inner)), true),
                None => (self.classify(ty), false),
            },
            _ => (self.classify(ty), false),
        }
    }

    /// Output type with any `Result` layer removed.
    fn output(&self, ret: &syn::ReturnType) -> Option<(TypeRef, bool)> {
        let syn::ReturnType::Type(_, ty) = ret else {
            return None;
        };
        if let syn::Type::Path(p) = ty.as_ref() {
            if let Some(last) = p.path.segments.last() {
                if last.ident == "Result" {
                    let ok = match type_args(&last.arguments) {
                        Some(args) => args.first().copied()?,
                        None => return None,
                    };
                    return Some((self.classify(ok), true));
                }
            }
        }
        Some((self.classify(ty), false))
    }
}

fn walk_use(tree: &syn::UseTree, prefix: &mut Vec<String>, out: &mut HashMap<String, Vec<String>>) {
    match tree {
        syn::UseTree::Path(p) => {
            prefix.push(p.ident.unraw().to_string());
            walk_use(&p.tree, prefix, out);
            prefix.pop();
        }
        syn::UseTree::Name(n) => {
            let name = n.ident.unraw().to_string();
            if name == "self" {
                if let Some(last) = prefix.last() {
                    out.insert(last.clone(), prefix.clone());
                }
            } else {
                let mut full = prefix.clone();
                full.push(name.clone());
                out.insert(name, full);
            }
        }
        syn::UseTree::Rename(r) => {
            let mut full = prefix.clone();
            if r.ident != "self" {
                full.push(r.ident.unraw().to_string());
            }
            out.insert(r.rename.unraw().to_string(), full);
        }
        syn::UseTree::Group(g) => {
            for t in &g.items {
                walk_use(t, prefix, out);
            }
        }
        syn::UseTree::Glob(_) => {}
    }
}

/// Type arguments of a path segment; `None` when anything else (lifetimes, consts) is there.
fn type_args(args: &syn::PathArguments) -> Option<Vec<&syn::Type>> {
    match args {
        syn::PathArguments::None => Some(Vec::new()),
        syn::PathArguments::AngleBracketed(a) => a
            .args
            .iter()
            .map(|arg| match arg {
                syn::GenericArgument::Type(t) => Some(t),
                _ => None,
            })
            .collect(),
        syn::PathArguments::Parenthesized(_) => None,
    }
}

fn option_of_ref(path: &syn::Path) -> Option<&syn::Type> {
    let last = path.segments.last()?;
    if last.ident != "Option" {
        return None;
    }
    let args = type_args(&last.arguments)?;
    let [inner] = args.as_slice() else {
        return None;
    };
    let inner: &syn::Type = inner;
    match inner {
        syn::Type::Reference(r) if r.mutability.is_none() => Some(r.elem.as_ref()),
        _ => None,
    }
}

fn repr(attrs: &[syn::Attribute]) -> Option<Primitive> {
    attrs
        .iter()
        .filter(|a| a.path().is_ident("repr"))
        .find_map(|a| a.parse_args::<syn::Ident>().ok())
        .and_then(|ident| Primitive::from_ident(&ident.to_string()))
}

/// Compact rendering of a type for diagnostics.
fn describe(ty: &syn::Type) -> String {
    match ty {
        syn::Type::Path(p) => p
            .path
            .segments
            .iter()
            .map(|s| {
                let mut out = s.ident.to_string();
                if let syn::PathArguments::AngleBracketed(a) = &s.arguments {
                    let args: Vec<String> = a
                        .args
                        .iter()
                        .map(|arg| match arg {
                            syn::GenericArgument::Type(t) => describe(t),
                            syn::GenericArgument::Lifetime(l) => format!("'{}", l.ident),
                            _ => "_".to_string(),
                        })
                        .collect();
                    out.push_str(&format!("<{}>", args.join(", ")));
                }
                out
            })
            .collect::<Vec<_>>()
            .join("::"),
        syn::Type::Reference(r) => {
            let m = if r.mutability.is_some() { "mut " } else { "" };
            format!("&{m}{}", describe(&r.elem))
        }
        syn::Type::Tuple(t) => format!("({})", t.elems.iter().map(describe).collect::<Vec<_>>().join(", ")),
        syn::Type::Slice(s) => format!("[{}]", describe(&s.elem)),
        syn::Type::Array(a) => format!("[{}; _]", describe(&a.elem)),
        syn::Type::Paren(p) => describe(&p.elem),
        syn::Type::Ptr(_) => "raw pointer".to_string(),
        syn::Type::BareFn(_) => "fn pointer".to_string(),
        syn::Type::TraitObject(_) => "trait object".to_string(),
        syn::Type::ImplTrait(_) => "impl trait".to_string(),
        _ => "type expression".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{GeneratorOptions, Generator};
    use crate::schema::Declaration;

    fn write(root: &Path, rel: &str, src: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, src).unwrap();
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "src/lib.rs", "pub mod domain;\npub mod wire;\n");
        write(
            root,
            "src/domain.rs",
            r#"
use std::collections::BTreeMap;
use crate::wire;

#[derive(Default)]
pub struct User {
    pub id: i64,
    pub r#type: String,
    email: Option<String>,
    pub phone: Option<String>,
    pub status: Status,
    pub scores: BTreeMap<String, i32>,
    pub address: Address,
    pub pos: (f64, f64),
}

#[repr(u8)]
pub enum Status { Active, Suspended }

pub struct Address { pub city: String }

impl Address {
    pub fn to_wire(&self) -> wire::Address { todo!() }
    pub fn rename(&mut self) -> Address { todo!() }
}

pub fn address_from_wire(src: &wire::Address) -> anyhow::Result<Address> { todo!() }
pub fn maybe(src: Option<&wire::Address>) -> Option<Address> { todo!() }
fn two(a: i32, b: i32) -> i32 { a + b }
"#,
        );
        write(
            root,
            "src/wire.rs",
            r#"
pub struct User {
    pub id: i64,
    pub contact: Option<user::Contact>,
    cache: Vec<u8>,
}

pub struct Address { pub city: String }

pub mod user {
    pub enum Contact {
        Email(String),
        PhoneNumber(super::Phone),
    }
}

include!("wire_extra.rs");
include!(concat!(env!("OUT_DIR"), "/generated.rs"));
"#,
        );
        write(root, "src/wire_extra.rs", "pub struct Phone { pub digits: String }\n");
        dir
    }

    #[test]
    fn module_paths_follow_the_file_layout() {
        assert_eq!(module_path_of(Path::new("./src/domain.rs")).unwrap(), "crate::domain");
        assert_eq!(module_path_of(Path::new("src/lib.rs")).unwrap(), "crate");
        assert_eq!(module_path_of(Path::new("src/api/mod.rs")).unwrap(), "crate::api");
        assert_eq!(module_path_of(Path::new("src/api/v1.rs")).unwrap(), "crate::api::v1");
        assert!(matches!(module_path_of(Path::new("lib/domain.rs")), Err(Error::LocatorRejected { .. })));
        assert!(matches!(module_path_of(Path::new("/abs/src/domain.rs")), Err(Error::LocatorRejected { .. })));
    }

    #[test]
    fn packages_load_lazily() {
        let dir = fixture();
        let provider = SourceProvider::new(dir.path());
        assert!(provider.loaded().is_empty());

        provider.package("crate::wire::user").unwrap();
        assert_eq!(provider.loaded(), ["crate::wire", "crate::wire::user"]);

        provider.package("crate::domain").unwrap();
        assert_eq!(provider.loaded().len(), 3);

        assert!(matches!(provider.package("crate::missing"), Err(Error::UnresolvedPackage(_))));
        assert!(matches!(provider.package("serde_json"), Err(Error::UnresolvedPackage(_))));
    }

    #[test]
    fn records_enums_and_functions_are_classified() {
        let dir = fixture();
        let provider = SourceProvider::new(dir.path());
        let domain = provider.package("crate::domain").unwrap();

        let user = &domain.records[0];
        let names: Vec<&str> = user.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["id", "type", "email", "phone", "status", "scores", "address", "pos"]);
        assert!(!user.field("email").unwrap().exported);
        assert_eq!(user.field("status").unwrap().ty, TypeRef::named("crate::domain", "Status"));
        assert_eq!(
            user.field("scores").unwrap().ty,
            TypeRef::mapping(TypeRef::Primitive(Primitive::String), TypeRef::Primitive(Primitive::I32))
        );
        assert_eq!(user.field("pos").unwrap().ty, TypeRef::Unsupported("(f64, f64)".into()));

        assert_eq!(domain.enums[0].underlying, Primitive::U8);
        assert_eq!(domain.enums[0].constants, ["Active", "Suspended"]);

        let names: Vec<&str> = domain.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["to_wire", "address_from_wire", "maybe"]);
        let to_wire = &domain.functions[0];
        assert_eq!(to_wire.receiver, Some(Receiver { name: "Address".into(), by_ref: true }));
        assert_eq!(to_wire.output, TypeRef::named("crate::wire", "Address"));
        let from_wire = &domain.functions[1];
        assert!(from_wire.fallible);
        assert_eq!(from_wire.output, TypeRef::named("crate::domain", "Address"));
        let maybe = &domain.functions[2];
        assert_eq!(
            maybe.param,
            Some(Param { ty: TypeRef::pointer(TypeRef::named("crate::wire", "Address")), by_ref: true })
        );
    }

    #[test]
    fn unions_resolve_through_inline_modules_and_includes() {
        let dir = fixture();
        let provider = SourceProvider::new(dir.path());

        let wire = provider.record(&TypeName::new("crate::wire", "User")).unwrap();
        assert_eq!(
            wire.field("contact").unwrap().ty,
            TypeRef::pointer(TypeRef::named("crate::wire::user", "Contact"))
        );

        let Declaration::Union(contact) = provider.declaration(&TypeName::new("crate::wire::user", "Contact")).unwrap() else {
            panic!("union expected");
        };
        assert_eq!(contact.branches[1].variant, "PhoneNumber");
        assert_eq!(contact.branches[1].field, "phone_number");
        assert_eq!(contact.branches[1].payload, TypeRef::named("crate::wire", "Phone"));
        assert!(provider.record(&TypeName::new("crate::wire", "Phone")).is_ok());
    }

    #[test]
    fn parse_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/lib.rs", "pub struct Broken {");
        let provider = SourceProvider::new(dir.path());
        let err = provider.package("crate").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert!(err.to_string().contains("lib.rs"), "{err}");
    }

    #[test]
    fn generates_from_source() {
        let dir = fixture();
        write(
            dir.path(),
            "src/point.rs",
            "pub struct Point { pub x: i32, pub y: i32 }\npub mod api { pub struct Point { pub x: i64, pub y: i32 } }\n",
        );
        let provider = SourceProvider::new(dir.path());
        let generator = Generator::new(
            &provider,
            TypeName::new("crate::point", "Point"),
            TypeName::new("crate::point::api", "Point"),
            GeneratorOptions::default(),
        )
        .unwrap();
        let generated = generator.generate().unwrap();
        assert!(generated.source.contains("use crate::point::api as secpkg;"));
        assert!(generated.source.contains("res.x = x.x as i64;"));
        assert!(generated.source.contains("pub fn secpkg_point_to_point("));
    }
}
