use super::{
    build_catalog, colorize_outcome, json_pretty, manifest_path, write_atomic, CatalogArgs,
    EXIT_SUCCESS, EXIT_UNRESOLVED,
};
use crate::config::FerryConfig;
use clap::Args;
use ferry_core::{rewrite, ChangeLog, ChangeOutcome, RewriteOptions};
use ferry_schema::parse_manifest_file;
use std::fmt::Write as _;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct RewriteArgs {
    /// Compose manifest to rewrite [default: the bundle's docker-compose.yml,
    /// else ./docker-compose.yml].
    pub manifest: Option<PathBuf>,
    #[command(flatten)]
    pub catalog: CatalogArgs,
    /// Directory captured volume data is restored under.
    #[arg(long)]
    pub restore_root: Option<PathBuf>,
    /// Project prefix the captured containers were named with.
    #[arg(long)]
    pub prefix: Option<String>,
    /// Write the rewritten manifest here instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Write the change log as JSON.
    #[arg(long)]
    pub changelog: Option<PathBuf>,
    /// Exit with code 4 when any image stays unresolved.
    #[arg(long, default_value_t = false)]
    pub strict: bool,
}

pub fn run(args: &RewriteArgs, config: &FerryConfig, json: bool) -> Result<u8, String> {
    let manifest_file = manifest_path(args.manifest.as_deref(), args.catalog.bundle.as_deref());
    let manifest =
        parse_manifest_file(&manifest_file).map_err(|e| format!("manifest error: {e}"))?;
    let source = args.catalog.source(config)?;
    let catalog = build_catalog(&source, json)?;

    let options = RewriteOptions::new(config.restore_root(args.restore_root.as_deref()))
        .with_prefix(config.project_prefix(args.prefix.as_deref()))
        .with_policy(config.policy());
    let (output, log) = rewrite(&manifest, &catalog, &options).map_err(|e| e.to_string())?;
    let yaml = output
        .serialize()
        .map_err(|e| format!("manifest error: {e}"))?;

    if let Some(path) = &args.output {
        write_atomic(path, &yaml)?;
    }
    if let Some(path) = &args.changelog {
        let content = log.to_json().map_err(|e| e.to_string())?;
        write_atomic(path, &content)?;
    }

    let summary = log.summary();
    if json {
        let mut payload = serde_json::json!({
            "manifest": manifest_file,
            "output": args.output,
            "summary": summary,
            "changelog": log,
        });
        if args.output.is_none() {
            payload["rewritten"] = serde_json::Value::String(yaml);
        }
        println!("{}", json_pretty(&payload)?);
    } else if args.output.is_some() {
        print!("{}", report(&log));
    } else {
        print!("{yaml}");
        eprint!("{}", report(&log));
    }

    if args.strict && log.has_unresolved() {
        eprintln!(
            "error: unresolved images for: {}",
            summary.unresolved_services.join(", ")
        );
        return Ok(EXIT_UNRESOLVED);
    }
    Ok(EXIT_SUCCESS)
}

fn report(log: &ChangeLog) -> String {
    let mut out = String::new();
    for record in &log.records {
        let outcome = colorize_outcome(&record.outcome.to_string());
        let _ = match (record.outcome, &record.after) {
            (ChangeOutcome::Applied, Some(after)) => writeln!(
                out,
                "  {} {}: {} -> {after} [{outcome}: {}]",
                record.service,
                record.field,
                record.before,
                record.strategy.as_deref().unwrap_or("-")
            ),
            _ => writeln!(
                out,
                "  {} {}: {} [{outcome}: {}]",
                record.service,
                record.field,
                if record.before.is_empty() { "-" } else { &record.before },
                record.reason.as_deref().unwrap_or("-")
            ),
        };
    }
    let summary = log.summary();
    let _ = writeln!(
        out,
        "{} applied, {} not found, {} skipped",
        summary.applied, summary.not_found, summary.skipped
    );
    out
}
