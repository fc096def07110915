use clap::Parser;
use tracing_subscriber::EnvFilter;

use kharcha::cli::{self, Cli, Commands, InboxCommands, RulesCommands};
use kharcha::settings::load_settings;

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("kharcha={log_level},warn")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&load_settings().log_level);

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Notify {
            source,
            key,
            title,
            timestamp,
            text,
        } => cli::notify::run(&source, &key, &title, timestamp, &text),
        Commands::Listen => cli::listen::run(),
        Commands::Inbox { command } => match command {
            InboxCommands::Load { file, source } => cli::inbox::load(&file, &source),
        },
        Commands::Sync { full, source } => cli::sync::run(full, &source),
        Commands::Rules { command } => match command {
            RulesCommands::Add {
                keyword,
                category,
                priority,
            } => cli::rules::add(&keyword, &category, priority),
            RulesCommands::List => cli::rules::list(),
            RulesCommands::Delete { id } => cli::rules::delete(id),
        },
        Commands::Categories => cli::categories::list(),
        Commands::Add {
            amount,
            title,
            category,
            income,
            note,
        } => cli::add::run(&amount, &title, &category, income, &note),
        Commands::List { limit } => cli::list::run(limit),
        Commands::Export { output } => cli::export::run(&output),
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
