mod cli;

use chrono::Utc;
use clap::Parser;
use cli::{Cli, Commands};

use circlelog::config::Config;
use circlelog::entry::encode_text;
use circlelog::local::ReadOrder;
use circlelog::search::SearchRequest;
use circlelog::{Logbook, api, observability};

type AnyError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    observability::init_tracing("info");

    let cli = Cli::parse();
    let config = match cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Serve(args) => api::run(config, args.address).await?,
        Commands::Search(args) => {
            let logbook = Logbook::from_config(&config)?;
            let start = match args.since {
                Some(since) => Some(Utc::now() - chrono::Duration::from_std(since.as_duration())?),
                None => None,
            };
            let request = SearchRequest::builder()
                .category(args.category)
                .term(args.term)
                .maybe_start(start)
                .maybe_max_entries(args.limit)
                .merge_duplicates(args.merge)
                .build();
            print_entries(&logbook.search(&request).await);
        }
        Commands::Tail(args) => {
            let logbook = Logbook::from_config(&config)?;
            let entries =
                logbook.read_local(args.category, args.limit, None, ReadOrder::Chronological);
            print_entries(&entries);
        }
        Commands::Reset(args) => {
            let logbook = Logbook::from_config(&config)?;
            let retained = logbook.reset_local(args.category, args.retain);
            println!("{} record(s) retained in {}", retained.len(), args.category);
        }
        Commands::ShowConfig => print!("{}", config.to_toml()?),
    }

    Ok(())
}

fn print_entries(entries: &[circlelog::LogEntry]) {
    for entry in entries {
        println!("{}", encode_text(entry));
    }
}
