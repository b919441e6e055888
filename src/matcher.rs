//! Field matching between a primary and a secondary record.
//!
//! Fields pair up by exact name only. Each pair gets a [`MatchDescriptor`] describing how a
//! value of the primary field becomes a value of the secondary one; the reverse direction
//! uses the [reflected](MatchDescriptor::reflect) descriptor. Primary fields without a
//! same-name counterpart are offered to the tagged-union resolver before being reported
//! as unmatched.
use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result, ResultExt};
use crate::oneof::{self, OneofGroup};
use crate::schema::{
    Declaration, EnumDecl, Field, FunctionDecl, Primitive, SchemaProvider, TypeName, TypeRef,
};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// How one field converts to its counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchDescriptor {
    NoMatch,
    /// Identical types, plain assignment.
    Direct,
    /// Named conversion function or method, one per direction.
    Conversion { forward: Converter, backward: Converter },
    /// Both sides are enums sharing constant names.
    EnumRemap { from: TypeName, to: TypeName, constants: Vec<String> },
    /// Numeric primitives converted with `as`.
    Castable { from: Primitive, to: Primitive },
    /// Pointer-aware descent into `Option`.
    Optional { nullable: Nullable, inner: Box<MatchDescriptor> },
    Slice { elem: Box<MatchDescriptor> },
    Map { key: Box<MatchDescriptor>, value: Box<MatchDescriptor> },
}

/// Which side of a conversion is an `Option`, relative to the conversion direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Nullable {
    Both,
    Source,
    Target,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Converter {
    pub call: Call,
    pub arg: ArgShape,
    /// Returns `Option<T>` rather than `T`.
    pub optional_output: bool,
    /// Returns `Result<_, _>`.
    pub fallible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Call {
    Function(TypeName),
    Method(String),
}

/// How the source value is handed to a converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgShape {
    Ref,         // &T
    Owned,       // T
    OptionRef,   // Option<&T>
    OptionOwned, // Option<T>
}

/// A primary field paired with the same-name secondary field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMatch {
    pub primary: Field,
    pub secondary: Field,
    pub descriptor: MatchDescriptor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchReport {
    pub primary: TypeName,
    pub secondary: TypeName,
    /// Primary declaration order.
    pub matches: Vec<FieldMatch>,
    pub oneofs: Vec<OneofGroup>,
    pub primary_unmatched: Vec<String>,
    pub secondary_unmatched: Vec<String>,
    /// Declaration order of the primary fields.
    #[serde(skip)]
    pub primary_order: Vec<String>,
    /// Declaration order of the exported secondary fields.
    #[serde(skip)]
    pub secondary_order: Vec<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// MATCHING
// ————————————————————————————————————————————————————————————————————————————

/// Computes the match report for a pair of records.
pub fn match_records<P>(provider: &P, primary: &TypeName, secondary: &TypeName) -> Result<MatchReport>
where
    P: SchemaProvider + ?Sized,
{
    let prim = provider.record(primary)?;
    let sec = provider.record(secondary)?;

    let sec_fields: Vec<&Field> = sec.fields.iter().filter(|f| f.exported).collect();
    let matcher = Matcher::new(provider, primary, secondary);

    let mut matches = Vec::new();
    let mut candidates = Vec::new();
    for pf in &prim.fields {
        match sec_fields.iter().find(|sf| sf.name == pf.name) {
            Some(sf) => {
                let descriptor = matcher
                    .classify(&pf.ty, &sf.ty)
                    .context_with(|| format!("field {}", pf.name))?;
                tracing::debug!(field = %pf.name, %descriptor, "matched field");
                matches.push(FieldMatch {
                    primary: pf.clone(),
                    secondary: (*sf).clone(),
                    descriptor,
                });
            }
            None => candidates.push(pf.clone()),
        }
    }

    let free: Vec<Field> = sec_fields
        .iter()
        .filter(|sf| !matches.iter().any(|m| m.secondary.name == sf.name))
        .map(|sf| (*sf).clone())
        .collect();
    let oneofs = oneof::resolve_oneofs(&matcher, &candidates, &free)?;

    let in_oneof: HashSet<&str> = oneofs
        .iter()
        .flat_map(|g| g.branches.iter().map(|b| b.primary.name.as_str()))
        .collect();
    let discriminants: HashSet<&str> = oneofs.iter().map(|g| g.secondary.name.as_str()).collect();
    let no_match = |name: &str, side: fn(&FieldMatch) -> &Field| {
        matches
            .iter()
            .any(|m| side(m).name == name && !m.descriptor.is_match())
    };

    let primary_unmatched: Vec<String> = prim
        .fields
        .iter()
        .filter(|f| {
            let paired = matches.iter().any(|m| m.primary.name == f.name);
            (!paired && !in_oneof.contains(f.name.as_str())) || no_match(&f.name, |m| &m.primary)
        })
        .map(|f| f.name.clone())
        .collect();

    let mut secondary_unmatched: Vec<String> = Vec::new();
    for sf in &sec_fields {
        let paired = matches.iter().any(|m| m.secondary.name == sf.name);
        if let Some(group) = oneofs.iter().find(|g| g.secondary.name == sf.name) {
            secondary_unmatched.extend(group.uncovered.iter().map(|v| format!("{}::{v}", sf.name)));
        } else if (!paired && !discriminants.contains(sf.name.as_str())) || no_match(&sf.name, |m| &m.secondary) {
            secondary_unmatched.push(sf.name.clone());
        }
    }

    Ok(MatchReport {
        primary: primary.clone(),
        secondary: secondary.clone(),
        matches,
        oneofs,
        primary_unmatched,
        secondary_unmatched,
        primary_order: prim.fields.iter().map(|f| f.name.clone()).collect(),
        secondary_order: sec_fields.iter().map(|f| f.name.clone()).collect(),
    })
}

/// Descriptor classification over a provider, for one record pair.
pub(crate) struct Matcher<'a, P: ?Sized> {
    pub(crate) provider: &'a P,
    /// Packages searched for conversion functions, in priority order.
    search: Vec<String>,
}

impl<'a, P: SchemaProvider + ?Sized> Matcher<'a, P> {
    pub(crate) fn new(provider: &'a P, primary: &TypeName, secondary: &TypeName) -> Self {
        let mut search = vec![primary.package.clone()];
        if secondary.package != primary.package {
            search.push(secondary.package.clone());
        }
        Self { provider, search }
    }

    pub(crate) fn classify(&self, p: &TypeRef, s: &TypeRef) -> Result<MatchDescriptor> {
        for ty in [p, s] {
            if let Some(desc) = ty.unsupported() {
                return Err(Error::Unsupported(desc.to_string()));
            }
        }
        if p == s {
            return Ok(MatchDescriptor::Direct);
        }

        let optional = |nullable, inner: MatchDescriptor| {
            if !inner.is_match() {
                return MatchDescriptor::NoMatch;
            }
            MatchDescriptor::Optional { nullable, inner: Box::new(inner) }
        };
        match (p, s) {
            (TypeRef::Pointer(a), TypeRef::Pointer(b)) => {
                return Ok(optional(Nullable::Both, self.classify(a, b)?));
            }
            (TypeRef::Pointer(a), b) => return Ok(optional(Nullable::Source, self.classify(a, b)?)),
            (a, TypeRef::Pointer(b)) => return Ok(optional(Nullable::Target, self.classify(a, b)?)),
            (TypeRef::Sequence(a), TypeRef::Sequence(b)) => {
                let elem = self.classify(a, b)?;
                if !elem.is_match() {
                    return Ok(MatchDescriptor::NoMatch);
                }
                return Ok(MatchDescriptor::Slice { elem: Box::new(elem) });
            }
            (
                TypeRef::Mapping { key: pk, value: pv },
                TypeRef::Mapping { key: sk, value: sv },
            ) => {
                let key = self.classify(pk, sk)?;
                let value = self.classify(pv, sv)?;
                if !key.is_match() || !value.is_match() {
                    return Ok(MatchDescriptor::NoMatch);
                }
                return Ok(MatchDescriptor::Map { key: Box::new(key), value: Box::new(value) });
            }
            _ => {}
        }

        let p_enum = self.enum_decl(p)?;
        let s_enum = self.enum_decl(s)?;
        if let (Some((pn, pe)), Some((sn, se))) = (&p_enum, &s_enum) {
            return enum_remap(pn, pe, sn, se);
        }

        if let Some(descriptor) = self.conversion(p, s)? {
            return Ok(descriptor);
        }

        match (&p_enum, &s_enum) {
            (Some((name, _)), _) => {
                return Err(Error::EnumCounterpart { enum_name: name.to_string(), other: s.to_string() });
            }
            (_, Some((name, _))) => {
                return Err(Error::EnumCounterpart { enum_name: name.to_string(), other: p.to_string() });
            }
            _ => {}
        }

        if let (TypeRef::Primitive(a), TypeRef::Primitive(b)) = (p, s) {
            if a.is_numeric() && b.is_numeric() {
                return Ok(MatchDescriptor::Castable { from: *a, to: *b });
            }
        }

        Ok(MatchDescriptor::NoMatch)
    }

    fn enum_decl(&self, ty: &TypeRef) -> Result<Option<(TypeName, EnumDecl)>> {
        let TypeRef::Named(name) = ty else {
            return Ok(None);
        };
        match self.provider.lookup(name)? {
            Some(Declaration::Enum(decl)) => Ok(Some((name.clone(), decl))),
            _ => Ok(None),
        }
    }

    /// Conversion functions must exist in both directions.
    fn conversion(&self, p: &TypeRef, s: &TypeRef) -> Result<Option<MatchDescriptor>> {
        let Some(forward) = self.find_converter(p, s)? else {
            return Ok(None);
        };
        let Some(backward) = self.find_converter(s, p)? else {
            tracing::debug!(from = %s, to = %p, "conversion exists in one direction only");
            return Ok(None);
        };
        Ok(Some(MatchDescriptor::Conversion { forward, backward }))
    }

    fn find_converter(&self, from: &TypeRef, to: &TypeRef) -> Result<Option<Converter>> {
        let mut packages: Vec<&str> = self.search.iter().map(String::as_str).collect();
        for ty in [from, to] {
            if let TypeRef::Named(name) = ty {
                if !packages.contains(&name.package.as_str()) {
                    packages.push(&name.package);
                }
            }
        }

        for pkg in packages {
            let schema = match self.provider.package(pkg) {
                Ok(schema) => schema,
                // packages of primary-only types may live outside what the provider knows
                Err(Error::UnresolvedPackage(_)) => continue,
                Err(err) => return Err(err),
            };
            if let Some(found) = schema.functions.iter().find_map(|f| converter_for(pkg, f, from, to)) {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }
}

fn enum_remap(pn: &TypeName, pe: &EnumDecl, sn: &TypeName, se: &EnumDecl) -> Result<MatchDescriptor> {
    for (from, to, src, dst) in [(pn, sn, pe, se), (sn, pn, se, pe)] {
        if let Some(missing) = src.constants.iter().find(|c| !dst.has_constant(c)) {
            return Err(Error::EnumMismatch {
                from: from.to_string(),
                to: to.to_string(),
                constant: missing.clone(),
            });
        }
    }
    Ok(MatchDescriptor::EnumRemap {
        from: pn.clone(),
        to: sn.clone(),
        constants: pe.constants.clone(),
    })
}

/// Checks whether `f` (declared in `pkg`) converts `from` into `to`.
fn converter_for(pkg: &str, f: &FunctionDecl, from: &TypeRef, to: &TypeRef) -> Option<Converter> {
    let optional_output = match &f.output {
        out if out == to => false,
        TypeRef::Pointer(inner) if **inner == *to => true,
        _ => return None,
    };

    let (call, arg) = match (&f.receiver, &f.param) {
        (Some(recv), None) => {
            if TypeRef::named(pkg, &recv.name) != *from {
                return None;
            }
            let arg = if recv.by_ref { ArgShape::Ref } else { ArgShape::Owned };
            (Call::Method(f.name.clone()), arg)
        }
        (None, Some(param)) => {
            let arg = match &param.ty {
                ty if ty == from => {
                    if param.by_ref { ArgShape::Ref } else { ArgShape::Owned }
                }
                TypeRef::Pointer(inner) if **inner == *from => {
                    if param.by_ref { ArgShape::OptionRef } else { ArgShape::OptionOwned }
                }
                _ => return None,
            };
            (Call::Function(TypeName::new(pkg, &f.name)), arg)
        }
        _ => return None,
    };

    Some(Converter { call, arg, optional_output, fallible: f.fallible })
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl MatchDescriptor {
    pub fn is_match(&self) -> bool {
        !matches!(self, MatchDescriptor::NoMatch)
    }

    /// Descriptor for the opposite conversion direction.
    pub fn reflect(&self) -> Result<MatchDescriptor> {
        let reflected = match self {
            MatchDescriptor::NoMatch => return Err(Error::Unreflectable(self.to_string())),
            MatchDescriptor::Direct => MatchDescriptor::Direct,
            MatchDescriptor::Conversion { forward, backward } => MatchDescriptor::Conversion {
                forward: backward.clone(),
                backward: forward.clone(),
            },
            MatchDescriptor::EnumRemap { from, to, constants } => MatchDescriptor::EnumRemap {
                from: to.clone(),
                to: from.clone(),
                constants: constants.clone(),
            },
            MatchDescriptor::Castable { from, to } => MatchDescriptor::Castable { from: *to, to: *from },
            MatchDescriptor::Optional { nullable, inner } => MatchDescriptor::Optional {
                nullable: nullable.reflect(),
                inner: Box::new(inner.reflect()?),
            },
            MatchDescriptor::Slice { elem } => MatchDescriptor::Slice { elem: Box::new(elem.reflect()?) },
            MatchDescriptor::Map { key, value } => MatchDescriptor::Map {
                key: Box::new(key.reflect()?),
                value: Box::new(value.reflect()?),
            },
        };
        Ok(reflected)
    }

    /// Whether generated code for this descriptor reports errors through `anyhow::Context`.
    pub fn needs_context(&self) -> bool {
        match self {
            MatchDescriptor::Conversion { forward, backward } => {
                forward.fallible || forward.optional_output || backward.fallible || backward.optional_output
            }
            MatchDescriptor::Optional { inner, .. } | MatchDescriptor::Slice { elem: inner } => inner.needs_context(),
            MatchDescriptor::Map { key, value } => key.needs_context() || value.needs_context(),
            _ => false,
        }
    }
}

impl fmt::Display for MatchDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchDescriptor::NoMatch => f.write_str("no match"),
            MatchDescriptor::Direct => f.write_str("direct"),
            MatchDescriptor::Conversion { forward, .. } => match &forward.call {
                Call::Function(name) => write!(f, "conversion via {name}"),
                Call::Method(name) => write!(f, "conversion via .{name}()"),
            },
            MatchDescriptor::EnumRemap { from, to, .. } => write!(f, "enum {} -> {}", from.name, to.name),
            MatchDescriptor::Castable { from, to } => write!(f, "cast {from} -> {to}"),
            MatchDescriptor::Optional { nullable, inner } => {
                let side = match nullable {
                    Nullable::Both => "both",
                    Nullable::Source => "source",
                    Nullable::Target => "target",
                };
                write!(f, "option[{side}]({inner})")
            }
            MatchDescriptor::Slice { elem } => write!(f, "slice({elem})"),
            MatchDescriptor::Map { key, value } => write!(f, "map({key}, {value})"),
        }
    }
}

impl Nullable {
    pub fn reflect(self) -> Self {
        match self {
            Nullable::Both => Nullable::Both,
            Nullable::Source => Nullable::Target,
            Nullable::Target => Nullable::Source,
        }
    }
}

impl MatchReport {
    /// Some primary field is not carried over automatically.
    pub fn primary_mismatch(&self) -> bool {
        !self.primary_unmatched.is_empty()
    }

    /// Some secondary field (or union variant) is not carried back automatically.
    pub fn secondary_mismatch(&self) -> bool {
        !self.secondary_unmatched.is_empty()
    }

    pub fn field_match(&self, primary_field: &str) -> Option<&FieldMatch> {
        self.matches.iter().find(|m| m.primary.name == primary_field)
    }
}
