//! One generation job: a (primary, secondary) record pair over a schema provider.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ResultExt};
use crate::matcher::{MatchReport, match_records};
use crate::schema::{SchemaProvider, TypeName};
use crate::synth::synthesize;

/// Knobs shared by every job of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorOptions {
    /// Emit the primary-to-secondary direction as a method of the primary type.
    pub method: Option<String>,
    /// Named in the generated header.
    pub tool_name: String,
    /// Prefix of the hand-written hook functions.
    pub hook_prefix: String,
    /// Appended to the primary file stem to name the output file.
    pub file_suffix: String,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            method: None,
            tool_name: "convgen generate".into(),
            hook_prefix: "manual".into(),
            file_suffix: "_convgen".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Generated {
    pub source: String,
    pub report: MatchReport,
}

pub struct Generator<P> {
    provider: P,
    primary: TypeName,
    secondary: TypeName,
    options: GeneratorOptions,
}

impl<P: SchemaProvider> Generator<P> {
    /// Both types must resolve to records before anything else happens.
    pub fn new(provider: P, primary: TypeName, secondary: TypeName, options: GeneratorOptions) -> Result<Self> {
        provider
            .record(&primary)
            .context_with(|| format!("primary type {primary}"))?;
        provider
            .record(&secondary)
            .context_with(|| format!("secondary type {secondary}"))?;
        Ok(Self { provider, primary, secondary, options })
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    pub fn report(&self) -> Result<MatchReport> {
        let report = match_records(&self.provider, &self.primary, &self.secondary)?;
        tracing::info!(
            primary = %report.primary,
            secondary = %report.secondary,
            matched = report.matches.iter().filter(|m| m.descriptor.is_match()).count(),
            oneofs = report.oneofs.len(),
            "matched records"
        );
        if report.primary_mismatch() {
            tracing::warn!(
                fields = %report.primary_unmatched.join(", "),
                "{} fields need a hand-written hook", report.primary.name
            );
        }
        if report.secondary_mismatch() {
            tracing::warn!(
                fields = %report.secondary_unmatched.join(", "),
                "{} fields need a hand-written hook", report.secondary.name
            );
        }
        Ok(report)
    }

    pub fn generate(&self) -> Result<Generated> {
        let report = self.report()?;
        let source = synthesize(&report, &self.options)?;
        tracing::debug!(bytes = source.len(), "synthesized converters");
        Ok(Generated { source, report })
    }
}

/// Sibling of the primary file: `src/domain.rs` becomes `src/domain_convgen.rs`.
pub fn output_path(primary_file: &Path, options: &GeneratorOptions) -> PathBuf {
    let stem = primary_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    primary_file.with_file_name(format!("{stem}{}.rs", options.file_suffix))
}
