use std::sync::Arc;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use club_teams::blobs::MemoryBlobStore;
use club_teams::config::Config;
use club_teams::display::{print_teams, write_teams_to_file};
use club_teams::parser::load_roster;
use club_teams::service::{Actor, ClubService, NewPlayer};
use club_teams::store::Store;
use club_teams::web;

const USAGE: &str = "Usage:\n  club-teams web [port]\n  club-teams balance <roster.csv> [team_size]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("web") => {
            if let Some(port) = args.get(2) {
                config.port = port
                    .parse()
                    .with_context(|| format!("Invalid port: {}", port))?;
            }
            println!("Access the site at http://localhost:{}", config.port);
            web::start_server(config).await?;
        }
        Some("balance") => {
            let csv_path = match args.get(2) {
                Some(path) => path,
                None => bail!("{}", USAGE),
            };
            if let Some(size) = args.get(3) {
                config.team_size = size
                    .parse()
                    .with_context(|| format!("Invalid team size: {}", size))?;
                if config.team_size == 0 {
                    bail!("Team size must be at least 1");
                }
            }
            run_balance(&config, csv_path)?;
        }
        _ => bail!("{}", USAGE),
    }

    Ok(())
}

/// Balances a roster CSV once, without touching the club's data file.
fn run_balance(config: &Config, csv_path: &str) -> anyhow::Result<()> {
    println!("Loading roster from {}...", csv_path);
    let entries = load_roster(csv_path)?;
    println!("Loaded {} players (repeated names merged)", entries.len());

    let service = ClubService::new(
        Arc::new(Store::in_memory()),
        Arc::new(MemoryBlobStore::new()),
        config.team_size,
        config.strategy,
        config.balance_seed,
    );
    let actor = Actor::admin("cli");

    for entry in entries {
        let absent = entry.absent;
        let player = service.add_player(
            &actor,
            NewPlayer {
                first: entry.first,
                last: entry.last,
                skill: entry.skill,
            },
            None,
        )?;
        if absent {
            service.set_absent(&actor, &player.id, true)?;
        }
    }

    service.generate_teams(&actor)?;
    let view = service.teams();
    print_teams(&view);

    write_teams_to_file(&view, "teams.txt")?;
    println!("\nTeams saved to teams.txt");

    Ok(())
}
