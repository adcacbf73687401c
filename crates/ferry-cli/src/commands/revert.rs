use super::{json_pretty, write_atomic, DEFAULT_MANIFEST, EXIT_FAILURE, EXIT_SUCCESS};
use clap::Args;
use ferry_core::{revert, ChangeLog};
use ferry_schema::parse_manifest_file;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct RevertArgs {
    /// Rewritten manifest to restore.
    #[arg(default_value = DEFAULT_MANIFEST)]
    pub manifest: PathBuf,
    /// Change log written by `ferry rewrite --changelog`.
    #[arg(long)]
    pub changelog: PathBuf,
    /// Write the restored manifest here instead of replacing the input.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: &RevertArgs, json: bool) -> Result<u8, String> {
    let mut manifest =
        parse_manifest_file(&args.manifest).map_err(|e| format!("manifest error: {e}"))?;
    let log = ChangeLog::load(&args.changelog)
        .map_err(|e| format!("failed to load change log {}: {e}", args.changelog.display()))?;

    let report = revert(&mut manifest, &log).map_err(|e| e.to_string())?;
    let yaml = manifest
        .serialize()
        .map_err(|e| format!("manifest error: {e}"))?;
    let dest = args.output.as_ref().unwrap_or(&args.manifest);
    write_atomic(dest, &yaml)?;

    if json {
        let payload = serde_json::json!({
            "manifest": dest,
            "report": report,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        if !report.digest_matched {
            eprintln!("warning: manifest was modified after the rewrite");
        }
        for conflict in &report.conflicts {
            eprintln!(
                "warning: {} {} no longer holds '{}' (found {}); left as is",
                conflict.service,
                conflict.field,
                conflict.expected,
                conflict.found.as_deref().unwrap_or("nothing")
            );
        }
        println!(
            "reverted {} edits in {} ({} conflicts)",
            report.reverted,
            dest.display(),
            report.conflicts.len()
        );
    }

    if report.conflicts.is_empty() {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_FAILURE)
    }
}
