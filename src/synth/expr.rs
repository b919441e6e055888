//! Value expressions: one descriptor applied to one source value.
use crate::error::{Error, Result};
use crate::matcher::{ArgShape, Call, Converter, MatchDescriptor, Nullable};

use super::{Synthesizer, ident};

/// Where the value being converted lives.
#[derive(Debug, Clone)]
pub(crate) enum Src {
    /// A field place such as `x.name`.
    Place(String),
    /// A binding holding `&T`, such as `v0` inside a closure or match arm.
    Ref(String),
}

impl Src {
    pub(crate) fn place(expr: impl Into<String>) -> Self {
        Src::Place(expr.into())
    }

    pub(crate) fn reference(binding: impl Into<String>) -> Self {
        Src::Ref(binding.into())
    }

    /// Receiver position: auto-ref makes both shapes work.
    fn expr(&self) -> &str {
        match self {
            Src::Place(e) | Src::Ref(e) => e,
        }
    }

    /// The value itself, for `Copy` uses (`as` casts, matches on enums).
    fn value(&self) -> String {
        match self {
            Src::Place(e) => e.clone(),
            Src::Ref(b) => format!("*{b}"),
        }
    }

    /// A shared reference to the value.
    fn borrow(&self) -> String {
        match self {
            Src::Place(e) => format!("&{e}"),
            Src::Ref(b) => b.clone(),
        }
    }
}

impl Synthesizer<'_> {
    /// Expression converting `src` per `descriptor`. `depth` numbers the bindings so nested
    /// closures and arms never shadow one another.
    pub(crate) fn value(
        &mut self,
        src: &Src,
        descriptor: &MatchDescriptor,
        ctx: &str,
        depth: usize,
    ) -> Result<String> {
        let out = match descriptor {
            MatchDescriptor::NoMatch => {
                return Err(Error::Unreflectable(format!("{ctx}: {descriptor}")));
            }
            MatchDescriptor::Direct => format!("{}.clone()", src.expr()),
            MatchDescriptor::Castable { to, .. } => format!("{} as {to}", src.value()),
            MatchDescriptor::EnumRemap { from, to, constants } => {
                let from = self.type_path(from);
                let to = self.type_path(to);
                let mut out = format!("match {} {{\n", src.value());
                for c in constants {
                    let c = ident(c);
                    out.push_str(&format!("{from}::{c} => {to}::{c},\n"));
                }
                out.push('}');
                out
            }
            MatchDescriptor::Conversion { forward, .. } => self.convert(src, forward, ctx),
            MatchDescriptor::Optional { nullable, inner } => {
                let v = format!("v{depth}");
                match nullable {
                    Nullable::Both => {
                        let inner = self.value(&Src::reference(&v), inner, ctx, depth + 1)?;
                        format!("match {} {{\nSome({v}) => Some({inner}),\nNone => None,\n}}", src.borrow())
                    }
                    Nullable::Source => {
                        let inner = self.value(&Src::reference(&v), inner, ctx, depth + 1)?;
                        format!("match {} {{\nSome({v}) => {inner},\nNone => Default::default(),\n}}", src.borrow())
                    }
                    Nullable::Target => format!("Some({})", self.value(src, inner, ctx, depth)?),
                }
            }
            MatchDescriptor::Slice { elem } => {
                let v = format!("v{depth}");
                let elem = self.value(&Src::reference(&v), elem, ctx, depth + 1)?;
                format!(
                    "{}.iter().map(|{v}| -> anyhow::Result<_> {{\nOk({elem})\n}}).collect::<anyhow::Result<_>>()?",
                    src.expr()
                )
            }
            MatchDescriptor::Map { key, value } => {
                let k = format!("k{depth}");
                let v = format!("v{depth}");
                let key = self.value(&Src::reference(&k), key, ctx, depth + 1)?;
                let value = self.value(&Src::reference(&v), value, ctx, depth + 1)?;
                format!(
                    "{}.iter().map(|({k}, {v})| -> anyhow::Result<_> {{\nOk(({key}, {value}))\n}}).collect::<anyhow::Result<_>>()?",
                    src.expr()
                )
            }
        };
        Ok(out)
    }

    fn convert(&mut self, src: &Src, conv: &Converter, ctx: &str) -> String {
        let owned = matches!(conv.arg, ArgShape::Owned | ArgShape::OptionOwned);
        let mut call = match &conv.call {
            Call::Method(name) if owned => format!("{}.clone().{}()", src.expr(), ident(name)),
            Call::Method(name) => format!("{}.{}()", src.expr(), ident(name)),
            Call::Function(name) => {
                let arg = match conv.arg {
                    ArgShape::Ref => src.borrow(),
                    ArgShape::Owned => format!("{}.clone()", src.expr()),
                    ArgShape::OptionRef => format!("Some({})", src.borrow()),
                    ArgShape::OptionOwned => format!("Some({}.clone())", src.expr()),
                };
                format!("{}({arg})", self.type_path(name))
            }
        };
        if conv.fallible {
            self.use_context();
            call.push_str(&format!(".context({ctx:?})?"));
        }
        if conv.optional_output {
            self.use_context();
            call.push_str(&format!(".context({:?})?", format!("{ctx}: conversion produced no value")));
        }
        call
    }
}
