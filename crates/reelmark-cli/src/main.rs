use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};

use reelmark_core::config::AppConfig;
use reelmark_runtime::{DbHandle, NoticeKind, Runtime};

use commands::auth::AuthCommands;
use commands::browse::{DiscoverArgs, TrendingArgs};
use commands::config::ConfigCommands;
use commands::library::ListArgs;
use commands::profile::ProfileCommands;
use commands::KindArg;
use output::{Output, OutputFormat};

mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "reelmark")]
#[command(about = "Reelmark - keep a watchlist of movies and shows and track what you've seen")]
#[command(version)]
struct Cli {
    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign up, sign in and out
    Auth {
        #[command(subcommand)]
        cmd: AuthCommands,
    },
    /// Trending movies and shows
    Trending(TrendingArgs),
    /// Browse the catalog with filters
    Discover(DiscoverArgs),
    /// Movies coming to theaters
    Upcoming {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Search movies, shows and people
    Search {
        query: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Movie details
    Movie {
        id: u64,
        /// Also show user reviews
        #[arg(long, action = ArgAction::SetTrue)]
        reviews: bool,
    },
    /// Show details, with per-season progress
    Tv {
        id: u64,
        /// List the episodes of one season
        #[arg(long)]
        season: Option<u32>,
    },
    /// Person details and credits
    Person { id: u64 },
    /// Genre ids usable with `discover --genre`
    Genres {
        #[arg(value_enum)]
        kind: KindArg,
    },
    /// Your watchlist, one page at a time
    List(ListArgs),
    /// Add a movie or show to your watchlist
    Add {
        #[arg(value_enum)]
        kind: KindArg,
        /// TMDB id
        id: u64,
    },
    /// Remove watchlist entries
    Remove {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Toggle a movie's seen flag
    Seen { id: String },
    /// Toggle one episode of a show
    Episode { id: String, season: u32, episode: u32 },
    /// Mark a whole season seen (or unseen)
    Season {
        id: String,
        season: u32,
        #[arg(long, action = ArgAction::SetTrue)]
        unseen: bool,
    },
    /// View or edit your profile
    Profile {
        #[command(subcommand)]
        cmd: ProfileCommands,
    },
    /// Show or edit configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

/// The failure was already shown to the user as a notice.
#[derive(Debug, thiserror::Error)]
#[error("command failed")]
struct AlreadyReported;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let output = Output::new(cli.output, cli.quiet);

    match run(cli, &output).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.downcast_ref::<AlreadyReported>().is_none() {
                output.error(format!("{e:#}"));
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, output: &Output) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let log_dir = config.logging.file.then(AppConfig::log_dir);
    let _guard =
        logging::init_logging(&config.logging.level, cli.verbose, cli.quiet, log_dir.as_deref())?;

    if let Commands::Config { cmd } = cli.command {
        return commands::config::run(cmd, config, output);
    }

    let db = DbHandle::open(&AppConfig::ensure_db_path()?)?;
    let runtime = Runtime::with_config(config, db);
    let result = dispatch(cli.command, &runtime, output).await;

    let notices = runtime.notices().drain();
    let reported = notices.iter().any(|n| n.kind == NoticeKind::Error);
    output.notices(notices);
    match result {
        Err(e) if reported => {
            tracing::debug!(error = %e, "Command failed");
            Err(AlreadyReported.into())
        }
        other => other,
    }
}

async fn dispatch(command: Commands, runtime: &Runtime, output: &Output) -> anyhow::Result<()> {
    use commands::{auth, browse, library, profile, progress};

    match command {
        Commands::Auth { cmd } => auth::run(cmd, runtime, output).await,
        Commands::Trending(args) => browse::trending(args, runtime, output).await,
        Commands::Discover(args) => browse::discover(args, runtime, output).await,
        Commands::Upcoming { page } => browse::upcoming(page, runtime, output).await,
        Commands::Search { query, page } => browse::search(&query, page, runtime, output).await,
        Commands::Movie { id, reviews } => browse::movie(id, reviews, runtime, output).await,
        Commands::Tv { id, season } => browse::tv(id, season, runtime, output).await,
        Commands::Person { id } => browse::person(id, runtime, output).await,
        Commands::Genres { kind } => browse::genres(kind, runtime, output).await,
        Commands::List(args) => library::list(args, runtime, output).await,
        Commands::Add { kind, id } => library::add(kind, id, runtime, output).await,
        Commands::Remove { ids } => library::remove(&ids, runtime, output).await,
        Commands::Seen { id } => progress::seen(&id, runtime, output).await,
        Commands::Episode {
            id,
            season,
            episode,
        } => progress::episode(&id, season, episode, runtime, output).await,
        Commands::Season { id, season, unseen } => {
            progress::season(&id, season, !unseen, runtime, output).await
        }
        Commands::Profile { cmd } => profile::run(cmd, runtime, output).await,
        Commands::Config { .. } => Ok(()),
    }
}
