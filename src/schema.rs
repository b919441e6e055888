//! Language-agnostic description of record types, as seen by the matcher.
//!
//! Schemas are read-only snapshots. Named references are resolved lazily through a
//! [`SchemaProvider`], which tolerates forward and mutual references between packages.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Fully qualified declaration name: module path plus identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeName {
    pub package: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    I128,
    Isize,
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
    F32,
    F64,
    String,
}

/// Field type classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRef {
    Primitive(Primitive),
    Pointer(Box<TypeRef>),                             // Option<T>, None is "nil"
    Sequence(Box<TypeRef>),                            // Vec<T>
    Mapping { key: Box<TypeRef>, value: Box<TypeRef> }, // any map kind
    Named(TypeName),                                   // record, enum or union
    Unsupported(String),                               // kept for diagnostics, fatal when matched
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: TypeRef,
    #[serde(default = "exported_default")]
    pub exported: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    pub fields: Vec<Field>, // declaration order
}

/// Enumerated named scalar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDecl {
    pub name: String,
    #[serde(default = "underlying_default")]
    pub underlying: Primitive,
    pub constants: Vec<String>,
}

/// Tagged union: exactly one of the branches is present at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnionDecl {
    pub name: String,
    pub branches: Vec<UnionBranch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnionBranch {
    /// Variant identifier used to build and match the branch.
    pub variant: String,
    /// Branch identifier matched against primary field names.
    pub field: String,
    pub payload: TypeRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receiver {
    pub name: String,
    #[serde(default = "by_ref_default")]
    pub by_ref: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub ty: TypeRef,
    #[serde(default = "by_ref_default")]
    pub by_ref: bool,
}

/// Free function or method that may serve as a field conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    #[serde(default)]
    pub receiver: Option<Receiver>,
    #[serde(default)]
    pub param: Option<Param>,
    pub output: TypeRef,
    #[serde(default)]
    pub fallible: bool,
}

/// Everything a single package (module) declares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSchema {
    pub path: String,
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(default)]
    pub enums: Vec<EnumDecl>,
    #[serde(default)]
    pub unions: Vec<UnionDecl>,
    #[serde(default)]
    pub functions: Vec<FunctionDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Record(Record),
    Enum(EnumDecl),
    Union(UnionDecl),
}

fn exported_default() -> bool { true }
fn by_ref_default() -> bool { true }
fn underlying_default() -> Primitive { Primitive::Isize }

// ————————————————————————————————————————————————————————————————————————————
// PROVIDERS
// ————————————————————————————————————————————————————————————————————————————

/// Resolves package paths to schemas. Implementations must return declarations in
/// stable declaration order.
pub trait SchemaProvider {
    fn package(&self, path: &str) -> Result<Arc<PackageSchema>>;

    fn declaration(&self, name: &TypeName) -> Result<Declaration> {
        let pkg = self.package(&name.package)?;
        pkg.declaration(&name.name)
            .ok_or_else(|| Error::UnresolvedType(name.to_string()))
    }

    /// Like [`declaration`](Self::declaration), but a type the provider cannot see
    /// (`uuid::Uuid` from outside the crate, say) is `None` instead of an error.
    fn lookup(&self, name: &TypeName) -> Result<Option<Declaration>> {
        match self.declaration(name) {
            Ok(decl) => Ok(Some(decl)),
            Err(Error::UnresolvedPackage(_) | Error::UnresolvedType(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn record(&self, name: &TypeName) -> Result<Record> {
        match self.declaration(name)? {
            Declaration::Record(record) => Ok(record),
            _ => Err(Error::NotARecord(name.to_string())),
        }
    }
}

impl<P: SchemaProvider + ?Sized> SchemaProvider for &P {
    fn package(&self, path: &str) -> Result<Arc<PackageSchema>> {
        (**self).package(path)
    }
}

/// In-memory provider over a fixed set of packages.
#[derive(Debug, Clone, Default)]
pub struct SchemaSet {
    packages: IndexMap<String, Arc<PackageSchema>>,
}

impl SchemaSet {
    pub fn new() -> Self { Self::default() }

    /// Adds a package; a package already present under the same path is merged into.
    pub fn insert(&mut self, pkg: PackageSchema) {
        match self.packages.get_mut(&pkg.path) {
            Some(existing) => Arc::make_mut(existing).merge(pkg),
            None => {
                self.packages.insert(pkg.path.clone(), Arc::new(pkg));
            }
        }
    }

    pub fn with(mut self, pkg: PackageSchema) -> Self {
        self.insert(pkg);
        self
    }

    pub fn contains(&self, path: &str) -> bool {
        self.packages.contains_key(path)
    }

    pub fn len(&self) -> usize { self.packages.len() }
    pub fn is_empty(&self) -> bool { self.packages.is_empty() }
}

impl SchemaProvider for SchemaSet {
    fn package(&self, path: &str) -> Result<Arc<PackageSchema>> {
        self.packages
            .get(path)
            .cloned()
            .ok_or_else(|| Error::UnresolvedPackage(path.to_string()))
    }
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl TypeName {
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self { package: package.into(), name: name.into() }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.package, self.name)
    }
}

impl Primitive {
    pub fn from_ident(ident: &str) -> Option<Self> {
        let p = match ident {
            "bool" => Primitive::Bool,
            "char" => Primitive::Char,
            "i8" => Primitive::I8,
            "i16" => Primitive::I16,
            "i32" => Primitive::I32,
            "i64" => Primitive::I64,
            "i128" => Primitive::I128,
            "isize" => Primitive::Isize,
            "u8" => Primitive::U8,
            "u16" => Primitive::U16,
            "u32" => Primitive::U32,
            "u64" => Primitive::U64,
            "u128" => Primitive::U128,
            "usize" => Primitive::Usize,
            "f32" => Primitive::F32,
            "f64" => Primitive::F64,
            "String" => Primitive::String,
            _ => return None,
        };
        Some(p)
    }

    /// Source spelling of the primitive.
    pub fn as_str(self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::Char => "char",
            Primitive::I8 => "i8",
            Primitive::I16 => "i16",
            Primitive::I32 => "i32",
            Primitive::I64 => "i64",
            Primitive::I128 => "i128",
            Primitive::Isize => "isize",
            Primitive::U8 => "u8",
            Primitive::U16 => "u16",
            Primitive::U32 => "u32",
            Primitive::U64 => "u64",
            Primitive::U128 => "u128",
            Primitive::Usize => "usize",
            Primitive::F32 => "f32",
            Primitive::F64 => "f64",
            Primitive::String => "String",
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, Primitive::Bool | Primitive::Char | Primitive::String)
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TypeRef {
    pub fn named(package: impl Into<String>, name: impl Into<String>) -> Self {
        TypeRef::Named(TypeName::new(package, name))
    }

    pub fn pointer(inner: TypeRef) -> Self { TypeRef::Pointer(Box::new(inner)) }
    pub fn sequence(inner: TypeRef) -> Self { TypeRef::Sequence(Box::new(inner)) }
    pub fn mapping(key: TypeRef, value: TypeRef) -> Self {
        TypeRef::Mapping { key: Box::new(key), value: Box::new(value) }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, TypeRef::Pointer(_))
    }

    /// One level of `Option` removed.
    pub fn strip_pointer(&self) -> &TypeRef {
        match self {
            TypeRef::Pointer(inner) => inner,
            other => other,
        }
    }

    /// First unsupported component, if any.
    pub fn unsupported(&self) -> Option<&str> {
        match self {
            TypeRef::Unsupported(desc) => Some(desc),
            TypeRef::Pointer(inner) | TypeRef::Sequence(inner) => inner.unsupported(),
            TypeRef::Mapping { key, value } => key.unsupported().or_else(|| value.unsupported()),
            TypeRef::Primitive(_) | TypeRef::Named(_) => None,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Primitive(p) => write!(f, "{p}"),
            TypeRef::Pointer(inner) => write!(f, "Option<{inner}>"),
            TypeRef::Sequence(inner) => write!(f, "Vec<{inner}>"),
            TypeRef::Mapping { key, value } => write!(f, "Map<{key}, {value}>"),
            TypeRef::Named(name) => write!(f, "{name}"),
            TypeRef::Unsupported(desc) => write!(f, "{desc}"),
        }
    }
}

impl Field {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self { name: name.into(), ty, exported: true }
    }

    pub fn private(name: impl Into<String>, ty: TypeRef) -> Self {
        Self { name: name.into(), ty, exported: false }
    }
}

impl Record {
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self { name: name.into(), fields }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl EnumDecl {
    pub fn new<I, S>(name: impl Into<String>, constants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            underlying: underlying_default(),
            constants: constants.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_constant(&self, name: &str) -> bool {
        self.constants.iter().any(|c| c == name)
    }
}

impl UnionDecl {
    pub fn new(name: impl Into<String>, branches: Vec<UnionBranch>) -> Self {
        Self { name: name.into(), branches }
    }
}

impl UnionBranch {
    pub fn new(variant: impl Into<String>, field: impl Into<String>, payload: TypeRef) -> Self {
        Self { variant: variant.into(), field: field.into(), payload }
    }
}

impl PackageSchema {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), ..Self::default() }
    }

    pub fn declaration(&self, name: &str) -> Option<Declaration> {
        if let Some(r) = self.records.iter().find(|r| r.name == name) {
            return Some(Declaration::Record(r.clone()));
        }
        if let Some(e) = self.enums.iter().find(|e| e.name == name) {
            return Some(Declaration::Enum(e.clone()));
        }
        self.unions
            .iter()
            .find(|u| u.name == name)
            .map(|u| Declaration::Union(u.clone()))
    }

    /// Appends declarations of `other`, keeping existing ones first.
    pub fn merge(&mut self, other: PackageSchema) {
        self.records.extend(other.records);
        self.enums.extend(other.enums);
        self.unions.extend(other.unions);
        self.functions.extend(other.functions);
    }

    pub fn with_record(mut self, record: Record) -> Self {
        self.records.push(record);
        self
    }

    pub fn with_enum(mut self, decl: EnumDecl) -> Self {
        self.enums.push(decl);
        self
    }

    pub fn with_union(mut self, decl: UnionDecl) -> Self {
        self.unions.push(decl);
        self
    }

    pub fn with_function(mut self, decl: FunctionDecl) -> Self {
        self.functions.push(decl);
        self
    }
}
