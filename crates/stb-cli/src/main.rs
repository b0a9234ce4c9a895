use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "stb")]
#[command(about = "starbot operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> server -> local overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Match report utilities
    Report {
        #[command(subcommand)]
        cmd: ReportCmd,
    },

    /// Batch ledger utilities
    Ledger {
        #[command(subcommand)]
        cmd: LedgerCmd,
    },

    /// Roster sheet utilities
    Roster {
        #[command(subcommand)]
        cmd: RosterCmd,
    },
}

#[derive(Subcommand)]
enum ReportCmd {
    /// Run one report line through the parser. Exits non-zero when rejected.
    Check {
        /// The report exactly as it would be posted, e.g. "G2: Alice 1-0 Bob"
        text: String,
    },
}

#[derive(Subcommand)]
enum LedgerCmd {
    /// List every recorded batch and its team roles.
    List {
        /// Data directory holding the `batches` blob
        #[arg(long = "data-dir", default_value = "./data")]
        data_dir: String,
    },
}

#[derive(Subcommand)]
enum RosterCmd {
    /// Fetch the roster sheet and print the normalized roster.
    Preview {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Dev convenience; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = stb_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Report { cmd } => match cmd {
            ReportCmd::Check { text } => commands::report::check(&text)?,
        },

        Commands::Ledger { cmd } => match cmd {
            LedgerCmd::List { data_dir } => commands::ledger::list(&data_dir)?,
        },

        Commands::Roster { cmd } => match cmd {
            RosterCmd::Preview { config_paths } => {
                commands::roster::preview(&config_paths).await?
            }
        },
    }

    Ok(())
}
