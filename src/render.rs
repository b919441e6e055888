//! Structured source emission.
//!
//! Lines are fed through [`Renderer::l`] with positional `$0`..`$9` substitutions and
//! indented from their own brace balance, so callers never track indentation. Imports
//! are requested by namespace path with a local alias and rendered once, sorted, at the
//! top of the output.
use std::fmt::Display;

use indexmap::IndexMap;

const INDENT: &str = "    ";

#[derive(Debug, Default)]
pub struct Renderer {
    header: Vec<String>,
    imports: IndexMap<String, String>, // path -> alias, "_" for trait-only imports
    body: Vec<String>,
    indent: usize,
}

impl Renderer {
    pub fn new() -> Self { Self::default() }

    /// Comment line placed above the imports.
    pub fn header(&mut self, line: impl Into<String>) {
        self.header.push(line.into());
    }

    /// Requests `use <path> as <alias>;`. The first alias requested for a path wins and is returned.
    pub fn import(&mut self, path: &str, alias: &str) -> String {
        self.imports
            .entry(path.to_string())
            .or_insert_with(|| alias.to_string())
            .clone()
    }

    /// Requests `use <path> as _;`, bringing trait methods into scope.
    pub fn import_trait(&mut self, path: &str) {
        self.import(path, "_");
    }

    pub fn alias_of(&self, path: &str) -> Option<&str> {
        self.imports.get(path).map(String::as_str)
    }

    /// Substitutes `$0`..`$9` with `args`; `$$` is a literal dollar.
    pub fn s(template: &str, args: &[&dyn Display]) -> String {
        let mut out = String::with_capacity(template.len());
        let mut chars = template.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '$' {
                out.push(c);
                continue;
            }
            match chars.peek().copied() {
                Some('$') => {
                    chars.next();
                    out.push('$');
                }
                Some(d) if d.is_ascii_digit() => {
                    chars.next();
                    let idx = d as usize - '0' as usize;
                    match args.get(idx) {
                        Some(arg) => out.push_str(&arg.to_string()),
                        None => {
                            out.push('$');
                            out.push(d);
                        }
                    }
                }
                _ => out.push('$'),
            }
        }
        out
    }

    /// Emits one or more lines.
    pub fn l(&mut self, template: &str, args: &[&dyn Display]) {
        let text = Self::s(template, args);
        for line in text.lines() {
            self.line(line);
        }
    }

    /// Blank line; never doubled.
    pub fn n(&mut self) {
        if self.body.last().is_some_and(|l| !l.is_empty()) {
            self.body.push(String::new());
        }
    }

    fn line(&mut self, raw: &str) {
        let line = raw.trim();
        if line.is_empty() {
            self.n();
            return;
        }
        if line.starts_with(['}', ')', ']']) {
            self.indent = self.indent.saturating_sub(1);
        }
        self.body.push(format!("{}{line}", INDENT.repeat(self.indent)));
        if line.ends_with(['{', '(', '[']) {
            self.indent += 1;
        }
    }

    pub fn finish(mut self) -> String {
        while self.body.last().is_some_and(|l| l.is_empty()) {
            self.body.pop();
        }

        let mut out = String::new();
        for line in &self.header {
            out.push_str(line);
            out.push('\n');
        }
        if !self.header.is_empty() {
            out.push('\n');
        }

        let mut uses: Vec<String> = self
            .imports
            .iter()
            .map(|(path, alias)| format!("use {path} as {alias};"))
            .collect();
        uses.sort();
        for u in &uses {
            out.push_str(u);
            out.push('\n');
        }
        if !uses.is_empty() {
            out.push('\n');
        }

        for line in &self.body {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_substitution() {
        assert_eq!(Renderer::s("res.$0 = x.$1;", &[&"id", &"user_id"]), "res.id = x.user_id;");
        assert_eq!(Renderer::s("cost $$5 for $0, $7", &[&"one"]), "cost $5 for one, $7");
    }

    #[test]
    fn indentation_follows_braces() {
        let mut r = Renderer::new();
        r.l("fn f() {", &[]);
        r.l("let y = match x {\nSome(v) => v,\nNone => 0,\n};", &[]);
        r.l("items.iter().map(|v| -> anyhow::Result<_> {\nOk(v)\n}).collect::<anyhow::Result<_>>()?", &[]);
        r.l("}", &[]);
        assert_eq!(
            r.finish(),
            "fn f() {\n    let y = match x {\n        Some(v) => v,\n        None => 0,\n    };\n    items.iter().map(|v| -> anyhow::Result<_> {\n        Ok(v)\n    }).collect::<anyhow::Result<_>>()?\n}\n"
        );
    }

    #[test]
    fn imports_are_deduplicated_and_sorted() {
        let mut r = Renderer::new();
        r.header("// generated");
        assert_eq!(r.import("crate::wire", "secpkg"), "secpkg");
        assert_eq!(r.import("crate::wire", "pkg0"), "secpkg");
        r.import_trait("anyhow::Context");
        r.n();
        r.l("fn f() {}", &[]);
        r.n();
        r.n();
        assert_eq!(
            r.finish(),
            "// generated\n\nuse anyhow::Context as _;\nuse crate::wire as secpkg;\n\nfn f() {}\n"
        );
    }
}
