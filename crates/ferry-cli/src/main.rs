mod commands;
mod config;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{
    resolve::ResolveArgs, revert::RevertArgs, rewrite::RewriteArgs, CatalogArgs,
    EXIT_CATALOG_ERROR, EXIT_FAILURE, EXIT_MANIFEST_ERROR,
};
use config::FerryConfig;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "ferry",
    version,
    about = "Rewrite compose manifests to run from captured offline artifacts"
)]
struct Cli {
    /// Config file (defaults to $FERRY_CONFIG, then ./ferry.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Rewrite image references and volume sources for offline use.
    Rewrite(RewriteArgs),
    /// Show how a single image reference resolves against the catalog.
    Resolve(ResolveArgs),
    /// List the offline images and volume captures in the catalog.
    Catalog(CatalogArgs),
    /// Undo a rewrite using its change log.
    Revert(RevertArgs),
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("FERRY_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let json_output = cli.json;
    let needs_config = matches!(
        cli.command,
        Commands::Rewrite(_) | Commands::Resolve(_) | Commands::Catalog(_)
    );
    let config = if needs_config {
        match FerryConfig::load_default(cli.config.as_deref()) {
            Ok(config) => config,
            Err(msg) => {
                eprintln!("error: {msg}");
                return ExitCode::from(EXIT_FAILURE);
            }
        }
    } else {
        FerryConfig::default()
    };

    let result = match &cli.command {
        Commands::Rewrite(args) => commands::rewrite::run(args, &config, json_output),
        Commands::Resolve(args) => commands::resolve::run(args, &config, json_output),
        Commands::Catalog(args) => commands::catalog::run(args, &config, json_output),
        Commands::Revert(args) => commands::revert::run(args, json_output),
        Commands::Completions { shell } => commands::completions::run::<Cli>(*shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("manifest error:") {
                EXIT_MANIFEST_ERROR
            } else if msg.starts_with("catalog error:") {
                EXIT_CATALOG_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
