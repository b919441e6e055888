//! Tagged-union ("oneof") resolution.
//!
//! A secondary field typed as a union may absorb several optional primary fields, one per
//! union branch, when the primary field name equals the branch identifier. At most one of
//! those primary fields may be set at runtime; the generated code enforces it.
use std::collections::HashSet;

use serde::Serialize;

use crate::error::{Result, ResultExt};
use crate::matcher::{MatchDescriptor, Matcher};
use crate::schema::{Declaration, Field, SchemaProvider, TypeName, TypeRef};

/// Fewer branches than this is not a union worth dispatching on.
pub const MIN_BRANCHES: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OneofGroup {
    /// Secondary field holding the union.
    pub secondary: Field,
    pub union: TypeName,
    /// The field is `Option<Union>` rather than the union itself.
    pub optional: bool,
    /// Primary declaration order.
    pub branches: Vec<OneofBranch>,
    /// Union variants no primary field maps to.
    pub uncovered: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OneofBranch {
    /// Optional primary field, `None` meaning "not this branch".
    pub primary: Field,
    pub variant: String,
    pub field: String,
    pub payload: TypeRef,
    /// Primary payload (the `Option` stripped) to branch payload.
    pub descriptor: MatchDescriptor,
}

/// Groups unpaired primary fields under unpaired secondary union fields.
pub(crate) fn resolve_oneofs<P>(
    matcher: &Matcher<'_, P>,
    primary: &[Field],
    secondary: &[Field],
) -> Result<Vec<OneofGroup>>
where
    P: SchemaProvider + ?Sized,
{
    let mut taken: HashSet<String> = HashSet::new();
    let mut groups = Vec::new();

    for sf in secondary {
        let (union_name, optional) = match &sf.ty {
            TypeRef::Named(name) => (name, false),
            TypeRef::Pointer(inner) => match inner.as_ref() {
                TypeRef::Named(name) => (name, true),
                _ => continue,
            },
            _ => continue,
        };
        let decl = match matcher
            .provider
            .lookup(union_name)
            .context_with(|| format!("field {}", sf.name))?
        {
            Some(Declaration::Union(decl)) => decl,
            _ => continue,
        };

        let mut branches = Vec::new();
        for pf in primary {
            if taken.contains(&pf.name) {
                continue;
            }
            let TypeRef::Pointer(inner) = &pf.ty else {
                continue;
            };
            let Some(branch) = decl.branches.iter().find(|b| b.field == pf.name) else {
                continue;
            };
            let descriptor = matcher
                .classify(inner, &branch.payload)
                .context_with(|| format!("branch {} of oneof {}", branch.variant, sf.name))?;
            if !descriptor.is_match() {
                tracing::debug!(field = %pf.name, oneof = %sf.name, "payload does not match branch");
                continue;
            }
            branches.push(OneofBranch {
                primary: pf.clone(),
                variant: branch.variant.clone(),
                field: branch.field.clone(),
                payload: branch.payload.clone(),
                descriptor,
            });
        }

        if branches.len() < MIN_BRANCHES {
            tracing::debug!(oneof = %sf.name, branches = branches.len(), "not enough branches for a oneof group");
            continue;
        }

        for b in &branches {
            taken.insert(b.primary.name.clone());
        }
        let uncovered = decl
            .branches
            .iter()
            .filter(|ub| !branches.iter().any(|b| b.variant == ub.variant))
            .map(|ub| ub.variant.clone())
            .collect();
        groups.push(OneofGroup {
            secondary: sf.clone(),
            union: union_name.clone(),
            optional,
            branches,
            uncovered,
        });
    }

    Ok(groups)
}

impl OneofGroup {
    /// Every variant of the union has a primary branch field.
    pub fn is_exhaustive(&self) -> bool {
        self.uncovered.is_empty()
    }

    pub fn contains_primary(&self, name: &str) -> bool {
        self.branches.iter().any(|b| b.primary.name == name)
    }
}
