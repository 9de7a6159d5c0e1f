use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "fastquest", version, about = "FastQuest CLI")]
struct Cli {
    /// User id (defaults to `user.id` from config)
    #[arg(long, global = true)]
    user: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fasting session control
    Fast {
        #[command(subcommand)]
        action: commands::fast::FastAction,
    },
    /// Points, level, streak and history
    Progress {
        #[command(subcommand)]
        action: commands::progress::ProgressAction,
    },
    /// Achievement board
    Achievements {
        #[command(subcommand)]
        action: commands::achievements::AchievementsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Rank all local users by FastPoints
    Leaderboard {
        /// Number of entries to show
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Print a shareable summary of the last completed fast
    Share,
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries JSON.
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("FASTQUEST_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let user = cli.user;
    let result = match cli.command {
        Commands::Fast { action } => commands::fast::run(user, action),
        Commands::Progress { action } => commands::progress::run(user, action),
        Commands::Achievements { action } => commands::achievements::run(user, action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Leaderboard { limit } => commands::social::leaderboard(limit),
        Commands::Share => commands::social::share(user),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
