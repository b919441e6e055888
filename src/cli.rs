//! Command line: generate | report | batch
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde::Deserialize;

use crate::generator::{Generated, Generator, GeneratorOptions, output_path};
use crate::locator::Locator;
use crate::manifest::{from_str_with_path, load_manifests};
use crate::matcher::MatchReport;
use crate::schema::{PackageSchema, SchemaProvider, SchemaSet, TypeName};
use crate::source::{SourceProvider, module_path_of};
use crate::synth::Synthesizer;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// generate bidirectional conversion functions between two structurally similar record types
#[derive(Parser, Debug)]
#[command(name = "convgen", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// generate converters for one primary/secondary pair
    Generate(GenerateCmd),
    /// print how the fields of two records match up
    Report(ReportCmd),
    /// run many generation jobs described in a JSON file
    Batch(BatchCmd),
}

#[derive(Args, Debug, Clone)]
struct SchemaSettings {
    /// JSON package manifests, literal paths or quoted glob patterns. Rust sources under
    /// --root are read when omitted.
    #[arg(long = "schema", num_args = 1..)]
    schema: Vec<String>,

    /// crate root holding src/ (source mode)
    #[arg(long, default_value = ".")]
    root: PathBuf,
}

#[derive(Args, Debug)]
struct GenerateCmd {
    /// primary type, `<package-location>:<TypeName>`; in source mode a `./src/...rs` file
    primary: String,

    /// secondary type, `<package-location>:<TypeName>`
    secondary: String,

    /// bind the primary-to-secondary conversion as a method with this name
    #[arg(short, long)]
    method: Option<String>,

    /// prefix of the hand-written hook functions
    #[arg(long, default_value = "manual")]
    hook_prefix: String,

    #[command(flatten)]
    schema: SchemaSettings,

    /// output .rs file (defaults to `<stem>_convgen.rs` next to the primary file)
    #[arg(short, long, conflicts_with = "stdout")]
    out: Option<PathBuf>,

    /// print the generated source instead of writing it
    #[arg(long)]
    stdout: bool,
}

#[derive(Args, Debug)]
struct ReportCmd {
    primary: String,
    secondary: String,

    #[command(flatten)]
    schema: SchemaSettings,

    /// print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct BatchCmd {
    /// JSON array of `{ "primary", "secondary", "method"?, "out"? }` jobs
    jobs: PathBuf,

    #[command(flatten)]
    schema: SchemaSettings,
}

#[derive(Debug, Clone, Deserialize)]
struct JobSpec {
    primary: String,
    secondary: String,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    out: Option<PathBuf>,
}

/// A resolved (primary, secondary) pair.
#[derive(Debug, Clone)]
struct Pair {
    primary: TypeName,
    secondary: TypeName,
    /// Source file of the primary, relative to the crate root.
    primary_file: Option<PathBuf>,
}

/// Where schemas come from for one job.
enum Provider {
    Manifests(Arc<SchemaSet>),
    Source(SourceProvider),
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Generate(cmd) => cmd.run(),
            Command::Report(cmd) => cmd.run(),
            Command::Batch(cmd) => cmd.run(),
        }
    }
}

impl GenerateCmd {
    fn run(&self) -> anyhow::Result<()> {
        let manifests = self.schema.manifests()?;
        let pair = self.schema.resolve(&self.primary, &self.secondary, manifests.is_some())?;
        let options = GeneratorOptions {
            method: self.method.clone(),
            hook_prefix: self.hook_prefix.clone(),
            ..GeneratorOptions::default()
        };

        let generated = generate(&self.schema, manifests, &pair, options.clone())?;
        if self.stdout {
            print!("{}", generated.source);
            return Ok(());
        }
        match self.schema.destination(&pair, self.out.as_deref(), &options) {
            Some(out) => write_output(&out, &generated.source),
            None => {
                print!("{}", generated.source);
                Ok(())
            }
        }
    }
}

impl ReportCmd {
    fn run(&self) -> anyhow::Result<()> {
        let manifests = self.schema.manifests()?;
        let pair = self.schema.resolve(&self.primary, &self.secondary, manifests.is_some())?;
        let provider = self.schema.provider(manifests);
        let generator = Generator::new(provider, pair.primary, pair.secondary, GeneratorOptions::default())?;
        let report = generator.report()?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print!("{}", render_report(&report, generator.options()));
        }
        Ok(())
    }
}

impl BatchCmd {
    fn run(&self) -> anyhow::Result<()> {
        let src = std::fs::read_to_string(&self.jobs)
            .with_context(|| format!("failed to read {}", self.jobs.display()))?;
        let jobs: Vec<JobSpec> = from_str_with_path(&src)
            .map_err(|message| anyhow::anyhow!("{}: {message}", self.jobs.display()))?;
        let manifests = self.schema.manifests()?;

        let outcomes: Vec<anyhow::Result<PathBuf>> = jobs
            .par_iter()
            .map(|job| self.run_job(job, manifests.clone()))
            .collect();

        let mut failed = 0;
        for (job, outcome) in jobs.iter().zip(&outcomes) {
            match outcome {
                Ok(path) => println!("{} {} -> {}", "ok".green().bold(), job.primary, path.display()),
                Err(err) => {
                    failed += 1;
                    println!("{} {}: {err:#}", "failed".red().bold(), job.primary);
                }
            }
        }
        if failed > 0 {
            anyhow::bail!("{failed} of {} jobs failed", jobs.len());
        }
        Ok(())
    }

    fn run_job(&self, job: &JobSpec, manifests: Option<Arc<SchemaSet>>) -> anyhow::Result<PathBuf> {
        let pair = self.schema.resolve(&job.primary, &job.secondary, manifests.is_some())?;
        let options = GeneratorOptions { method: job.method.clone(), ..GeneratorOptions::default() };
        let generated = generate(&self.schema, manifests, &pair, options.clone())?;
        let out = self
            .schema
            .destination(&pair, job.out.as_deref(), &options)
            .context("jobs without a primary source file need an explicit \"out\"")?;
        write_output(&out, &generated.source)?;
        Ok(out)
    }
}

impl SchemaSettings {
    fn manifests(&self) -> anyhow::Result<Option<Arc<SchemaSet>>> {
        if self.schema.is_empty() {
            return Ok(None);
        }
        let set = load_manifests(&self.schema).context("failed to load schema manifests")?;
        tracing::info!(packages = set.len(), "loaded schema manifests");
        Ok(Some(Arc::new(set)))
    }

    fn provider(&self, manifests: Option<Arc<SchemaSet>>) -> Provider {
        match manifests {
            Some(set) => Provider::Manifests(set),
            None => Provider::Source(SourceProvider::new(&self.root)),
        }
    }

    fn resolve(&self, primary: &str, secondary: &str, manifest_mode: bool) -> anyhow::Result<Pair> {
        let primary: Locator = primary.parse()?;
        let secondary: Locator = secondary.parse()?;

        if manifest_mode {
            return Ok(Pair {
                primary: TypeName::new(&primary.location, &primary.name),
                secondary: TypeName::new(&secondary.location, &secondary.name),
                primary_file: None,
            });
        }

        primary.require_local_file()?;
        let primary_file = PathBuf::from(&primary.location);
        let secondary_package = if secondary.location.ends_with(".rs") {
            module_path_of(Path::new(&secondary.location))?
        } else {
            secondary.location.clone()
        };
        Ok(Pair {
            primary: TypeName::new(module_path_of(&primary_file)?, &primary.name),
            secondary: TypeName::new(secondary_package, &secondary.name),
            primary_file: Some(primary_file),
        })
    }

    fn destination(&self, pair: &Pair, explicit: Option<&Path>, options: &GeneratorOptions) -> Option<PathBuf> {
        if let Some(out) = explicit {
            return Some(out.to_path_buf());
        }
        let file = pair.primary_file.as_ref()?;
        Some(output_path(&self.root.join(file), options))
    }
}

impl SchemaProvider for Provider {
    fn package(&self, path: &str) -> crate::Result<Arc<PackageSchema>> {
        match self {
            Provider::Manifests(set) => set.package(path),
            Provider::Source(source) => source.package(path),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn generate(
    settings: &SchemaSettings,
    manifests: Option<Arc<SchemaSet>>,
    pair: &Pair,
    options: GeneratorOptions,
) -> anyhow::Result<Generated> {
    let provider = settings.provider(manifests);
    let generator = Generator::new(provider, pair.primary.clone(), pair.secondary.clone(), options)
        .with_context(|| format!("cannot generate {} <-> {}", pair.primary, pair.secondary))?;
    let generated = generator
        .generate()
        .with_context(|| format!("cannot generate {} <-> {}", pair.primary, pair.secondary))?;
    Ok(generated)
}

fn write_output(out: &Path, source: &str) -> anyhow::Result<()> {
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(out, source).with_context(|| format!("failed to write {}", out.display()))?;
    tracing::info!(path = %out.display(), "wrote converters");
    Ok(())
}

fn render_report(report: &MatchReport, options: &GeneratorOptions) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} {} {}\n",
        report.primary.to_string().bold(),
        "<->".dimmed(),
        report.secondary.to_string().bold()
    ));

    for m in &report.matches {
        let desc = if m.descriptor.is_match() {
            m.descriptor.to_string().green()
        } else {
            m.descriptor.to_string().red()
        };
        out.push_str(&format!("  {:<20} {desc}\n", m.primary.name));
    }
    for group in &report.oneofs {
        let fields: Vec<&str> = group.branches.iter().map(|b| b.primary.name.as_str()).collect();
        let coverage = if group.is_exhaustive() { "exhaustive".green() } else { "partial".yellow() };
        out.push_str(&format!(
            "  {:<20} {} {} ({coverage})\n",
            group.secondary.name,
            "oneof".cyan(),
            fields.join(" | ")
        ));
    }

    let names = Synthesizer::new(report, options).names().clone();
    for (unmatched, hook) in [
        (&report.primary_unmatched, &names.forward_hook),
        (&report.secondary_unmatched, &names.backward_hook),
    ] {
        if !unmatched.is_empty() {
            out.push_str(&format!(
                "  {} {} {}\n",
                "unmatched".yellow().bold(),
                unmatched.join(", "),
                format!("(hook {hook})").dimmed()
            ));
        }
    }
    out
}
