//! JSON package manifests: a schema provider fed from files instead of source code.
//!
//! A manifest holds either one package object or an array of them, in the shape of
//! [`PackageSchema`].
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::schema::{PackageSchema, SchemaSet};

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> std::result::Result<T, String> {
    let de = &mut serde_json::Deserializer::from_str(src);
    match serde_path_to_error::deserialize::<_, T>(de) {
        Ok(v) => Ok(v),
        Err(err) => {
            let path = err.path().to_string();
            Err(format!("at JSON path {path} → {}", err.into_inner()))
        }
    }
}

/// Parses one manifest document.
pub fn parse_manifest(path: &Path, src: &str) -> Result<Vec<PackageSchema>> {
    // untagged enums swallow the inner error path, so pick the shape up front
    let pkgs = if src.trim_start().starts_with('[') {
        from_str_with_path::<Vec<PackageSchema>>(src)
    } else {
        from_str_with_path::<PackageSchema>(src).map(|pkg| vec![pkg])
    };
    pkgs.map_err(|message| Error::Manifest { path: path.to_path_buf(), message })
}

/// Loads every manifest matched by the given paths or glob patterns.
pub fn load_manifests<I>(patterns: I) -> Result<SchemaSet>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut set = SchemaSet::new();
    for path in resolve_file_path_patterns(patterns)? {
        let src = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        let pkgs = parse_manifest(&path, &src)?;
        tracing::debug!(path = %path.display(), packages = pkgs.len(), "loaded schema manifest");
        for pkg in pkgs {
            set.insert(pkg);
        }
    }
    Ok(set)
}

/// Expands glob patterns; literal paths pass through untouched.
pub fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{' ))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let entries = glob::glob(pattern).map_err(|e| Error::Manifest {
                path: PathBuf::from(pattern),
                message: e.to_string(),
            })?;
            let before = out.len();
            for entry in entries {
                let p = entry.map_err(|e| Error::io(e.path().to_path_buf(), e.into_error()))?;
                out.push(p);
            }
            if out.len() == before {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                return Err(Error::Manifest {
                    path: PathBuf::from(pattern),
                    message: "glob pattern matched no files".into(),
                });
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{SchemaProvider, TypeName};

    #[test]
    fn single_and_multi_package_documents() {
        let one = parse_manifest(Path::new("one.json"), r#"{"path": "crate::a"}"#).unwrap();
        assert_eq!(one.len(), 1);

        let many = parse_manifest(
            Path::new("many.json"),
            r#"[{"path": "crate::a"}, {"path": "crate::b"}]"#,
        )
        .unwrap();
        assert_eq!(many.iter().map(|p| p.path.as_str()).collect::<Vec<_>>(), ["crate::a", "crate::b"]);
    }

    #[test]
    fn errors_carry_the_json_path() {
        let src = r#"{"path": "crate::a", "records": [{"name": "User", "fields": [{"name": "id", "ty": {"primitive": "int"}}]}]}"#;
        let err = parse_manifest(Path::new("bad.json"), src).unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("manifest bad.json: at JSON path records[0].fields[0].ty"), "{msg}");
    }

    #[test]
    fn glob_loads_all_manifests() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("domain.json"),
            r#"{"path": "crate::domain", "records": [{"name": "User", "fields": []}]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("wire.json"), r#"[{"path": "crate::wire"}]"#).unwrap();

        let pattern = format!("{}/*.json", dir.path().display());
        let set = load_manifests([pattern]).unwrap();
        assert!(set.contains("crate::wire"));
        assert!(set.record(&TypeName::new("crate::domain", "User")).is_ok());

        let empty = format!("{}/*.yaml", dir.path().display());
        assert!(matches!(load_manifests([empty]), Err(Error::Manifest { .. })));
    }
}
