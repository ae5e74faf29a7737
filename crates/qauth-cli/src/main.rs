//! CLI for qauth: two-factor secrets and a prize draw from a physical random source.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use qauth_core::CancelToken;

use commands::GlobalOpts;

#[derive(Parser)]
#[command(name = "qauth")]
#[command(about = "qauth: TOTP secrets and a prize draw backed by a quantum random source")]
#[command(version = qauth_core::VERSION)]
struct Cli {
    /// JSON configuration file. Flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Random source: quantum (instrument) or fallback (seed queue)
    #[arg(long, global = true, value_parser = ["quantum", "fallback"])]
    source: Option<String>,

    /// Secret store file
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Seed queue file used by the fallback source
    #[arg(long, global = true)]
    seeds: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue a new secret for an identity, replacing any previous one
    Secret {
        /// Email or other identity key
        identity: String,
    },

    /// Verify a six-digit code for an identity
    Verify { identity: String, code: String },

    /// Print the current code for an identity
    Code { identity: String },

    /// Verify a code, then play one draw for an identity
    Draw {
        identity: String,
        /// Current six-digit code from the authenticator app
        code: String,
        /// Four digits (0-7 with the quantum source, 0-9 with the fallback)
        guess: String,
    },

    /// Inspect or refill the fallback seed queue
    Seeds {
        #[command(subcommand)]
        action: SeedsAction,
    },

    /// Run the HTTP API server (needs QAUTH_SESSION_KEY)
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value = "8080")]
        port: u16,
    },
}

#[derive(Subcommand)]
enum SeedsAction {
    /// Show the queue path and how many secrets are left
    Status,

    /// Append one Base32 secret to the back of the queue
    Push { secret: String },

    /// Harvest secrets from the quantum path into the queue
    Fill {
        #[arg(long, default_value = "10")]
        count: usize,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let opts = GlobalOpts {
        config: cli.config,
        source: cli.source,
        store: cli.store,
        seeds: cli.seeds,
    };

    // First Ctrl+C cancels a running acquisition or server; a second one exits.
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        if handler_token.is_cancelled() {
            std::process::exit(130);
        }
        log::warn!("interrupt received, cancelling");
        handler_token.cancel();
    }) {
        log::warn!("could not install Ctrl+C handler: {e}");
    }

    match cli.command {
        Commands::Secret { identity } => commands::secret::run(&opts, &identity, cancel),
        Commands::Verify { identity, code } => commands::verify::run(&opts, &identity, &code),
        Commands::Code { identity } => commands::code::run(&opts, &identity),
        Commands::Draw {
            identity,
            code,
            guess,
        } => commands::draw::run(&opts, &identity, &code, &guess, cancel),
        Commands::Seeds { action } => match action {
            SeedsAction::Status => commands::seeds::status(&opts),
            SeedsAction::Push { secret } => commands::seeds::push(&opts, &secret),
            SeedsAction::Fill { count } => commands::seeds::fill(&opts, count, cancel),
        },
        Commands::Serve { host, port } => commands::serve::run(&opts, &host, port, cancel),
    }
}
