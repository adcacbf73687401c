use super::{build_catalog, colorize_outcome, json_pretty, CatalogArgs, EXIT_SUCCESS, EXIT_UNRESOLVED};
use crate::config::FerryConfig;
use clap::Args;
use ferry_core::{resolve, Outcome};

#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// Service the reference belongs to.
    pub service: String,
    /// Image reference as written in the manifest.
    pub image: String,
    #[command(flatten)]
    pub catalog: CatalogArgs,
    /// Project prefix the captured containers were named with.
    #[arg(long)]
    pub prefix: Option<String>,
}

pub fn run(args: &ResolveArgs, config: &FerryConfig, json: bool) -> Result<u8, String> {
    let source = args.catalog.source(config)?;
    let catalog = build_catalog(&source, json)?;
    let prefix = config.project_prefix(args.prefix.as_deref());
    let resolution = resolve(&args.service, &args.image, &catalog, prefix.as_deref());

    if json {
        let outcome = match &resolution.outcome {
            Outcome::Resolved {
                entry,
                strategy,
                ambiguous,
            } => serde_json::json!({
                "status": "resolved",
                "image": entry.id,
                "strategy": strategy,
                "ambiguous": ambiguous,
            }),
            Outcome::NotFound(reason) => serde_json::json!({
                "status": "not_found",
                "reason": reason.to_string(),
            }),
        };
        let payload = serde_json::json!({
            "service": resolution.service,
            "reference": resolution.reference,
            "prefix": prefix,
            "attempts": resolution.attempts,
            "outcome": outcome,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("{} '{}':", resolution.service, resolution.reference);
        for attempt in &resolution.attempts {
            match &attempt.skipped {
                Some(why) => println!("  {:<20} skipped ({why})", attempt.strategy.name()),
                None if attempt.candidates.is_empty() => {
                    println!("  {:<20} no candidates", attempt.strategy.name());
                }
                None => {
                    let ids: Vec<&str> = attempt.candidates.iter().map(|c| c.as_str()).collect();
                    println!("  {:<20} {}", attempt.strategy.name(), ids.join(", "));
                }
            }
        }
        match &resolution.outcome {
            Outcome::Resolved {
                entry,
                strategy,
                ambiguous,
            } => {
                let status = if *ambiguous { "ambiguous" } else { "resolved" };
                println!("{} -> {} via {strategy}", colorize_outcome(status), entry.id);
            }
            Outcome::NotFound(reason) => {
                println!("{}: {reason}", colorize_outcome("not_found"));
            }
        }
    }

    match resolution.outcome {
        Outcome::Resolved { .. } => Ok(EXIT_SUCCESS),
        Outcome::NotFound(_) => Ok(EXIT_UNRESOLVED),
    }
}
