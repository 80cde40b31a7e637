// ═══════════════════════════════════════════════════════════════════════
// Runner — CLI entry point for submitting routes and running simulations
// ═══════════════════════════════════════════════════════════════════════

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;
use turf_engine::types::{Coordinate, UserId};
use turf_engine::{geojson, EngineConfig};
use turf_ledger::{run_session, ConquestService, Discrepancy, Ledger, User};
use turf_walkers::{build, offset, Walker, WalkerKind};

/// Default map centre.
const MADRID: Coordinate = Coordinate::new(40.4168, -3.7038);

const DEMO_USERS: [(&str, &str); 5] = [
    ("runner_pro", "Carlos Martínez"),
    ("maria_runner", "María González"),
    ("juancho_run", "Juan Pérez"),
    ("ana_fitness", "Ana López"),
    ("pedro_trail", "Pedro Sánchez"),
];

#[derive(Parser)]
#[command(name = "turf-runner", about = "Territory conquest from recorded routes")]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, default_value = "turf.db")]
    db: PathBuf,
    /// JSON file with engine settings; missing fields keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log every conquest and merge step
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the demo users
    Seed,
    /// Submit one recorded route for a user
    Submit {
        /// Username of the walker
        #[arg(short, long)]
        user: String,
        /// JSON file holding [[lat, lng], ...]
        #[arg(short, long)]
        route: PathBuf,
        #[arg(short, long, default_value = "route")]
        name: String,
        /// Corridor half-width in metres for this route only
        #[arg(long)]
        half_width: Option<f64>,
    },
    /// Let synthetic walkers fight over the map
    Simulate {
        #[arg(short, long, default_value_t = 42)]
        seed: u64,
        #[arg(short, long, default_value_t = 4)]
        walkers: u32,
        #[arg(short, long, default_value_t = 10)]
        rounds: u32,
        #[arg(long, value_enum, default_value_t = Strategy::Mixed)]
        walker: Strategy,
    },
    /// Show users ranked by claimed area
    Leaderboard,
    /// Print territories as a GeoJSON FeatureCollection
    Territories {
        /// Only this username's territories
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Verify stored totals and cached areas against the territory rows
    Check,
}

#[derive(Clone, Copy, ValueEnum)]
enum Strategy {
    Random,
    Raider,
    Mixed,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;
    let ledger = Ledger::open(&cli.db).with_context(|| format!("opening {}", cli.db.display()))?;

    match cli.command {
        Commands::Seed => cmd_seed(&ledger),
        Commands::Submit { user, route, name, half_width } => {
            cmd_submit(ledger, config, &user, &route, &name, half_width)
        }
        Commands::Simulate { seed, walkers, rounds, walker } => {
            cmd_simulate(ledger, config, seed, walkers, rounds, walker)
        }
        Commands::Leaderboard => cmd_leaderboard(&ledger),
        Commands::Territories { user } => cmd_territories(&ledger, user.as_deref()),
        Commands::Check => cmd_check(&ledger, &config),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(p) => {
            let text = std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", p.display()))?
        }
        None => EngineConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn find_user(ledger: &Ledger, username: &str) -> Result<User> {
    ledger.user_by_username(username)?
        .with_context(|| format!("no user named {username:?}, run `seed` first"))
}

fn cmd_seed(ledger: &Ledger) -> Result<()> {
    for (username, name) in DEMO_USERS {
        match ledger.user_by_username(username)? {
            Some(existing) => println!("- User already exists: {} (@{})", existing.name, existing.username),
            None => {
                let user = ledger.create_user(username, name)?;
                println!("+ Created user: {} (@{}) {}", user.name, user.username, user.color);
            }
        }
    }
    Ok(())
}

fn cmd_submit(
    ledger: Ledger,
    config: EngineConfig,
    username: &str,
    route_path: &Path,
    name: &str,
    half_width: Option<f64>,
) -> Result<()> {
    let user = find_user(&ledger, username)?;
    let text = std::fs::read_to_string(route_path)
        .with_context(|| format!("reading {}", route_path.display()))?;
    let coordinates: Vec<Coordinate> = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a [[lat, lng], ...] list", route_path.display()))?;
    if coordinates.is_empty() {
        bail!("route {} has no coordinates", route_path.display());
    }

    let service = ConquestService::new(ledger, config)?;
    let receipt = service.submit_route(user.id, name, coordinates, half_width)?;
    let summary = match &receipt.resolution {
        Ok(r) => json!({
            "route": receipt.route_id.0,
            "outcome": r.outcome,
            "created": r.created_territory.as_ref().map(|t| json!({ "id": t.id.0, "area": t.area })),
            "deleted": r.deleted_territory_ids.iter().map(|id| id.0).collect::<Vec<_>>(),
            "conquests": r.conquests,
            "totals": r.affected_user_totals.iter()
                .map(|(u, a)| (u.0.to_string(), json!(a)))
                .collect::<serde_json::Map<String, serde_json::Value>>(),
            "warnings": r.warnings,
        }),
        Err(e) => json!({ "route": receipt.route_id.0, "rejected": e.to_string() }),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn cmd_simulate(
    ledger: Ledger,
    config: EngineConfig,
    seed: u64,
    count: u32,
    rounds: u32,
    strategy: Strategy,
) -> Result<()> {
    println!("=== Simulation: {count} walkers, {rounds} rounds, seed={seed} ===\n");

    let projection = config.projection();
    let mut walkers: Vec<Box<dyn Walker>> = Vec::new();
    for i in 0..count {
        let username = format!("walker_{seed}_{i}");
        let user = match ledger.user_by_username(&username)? {
            Some(u) => u,
            None => ledger.create_user(&username, &format!("Walker {i}"))?,
        };
        let kind = match strategy {
            Strategy::Random => WalkerKind::Random,
            Strategy::Raider => WalkerKind::Raider,
            Strategy::Mixed if i % 2 == 0 => WalkerKind::Random,
            Strategy::Mixed => WalkerKind::Raider,
        };
        // homes spaced evenly on a 500 m circle around the map centre
        let angle = std::f64::consts::TAU * i as f64 / count.max(1) as f64;
        let home = offset(&projection, MADRID, 500.0 * angle.cos(), 500.0 * angle.sin());
        walkers.push(build(kind, user.id, home, seed.wrapping_add(i as u64)));
    }

    let service = ConquestService::new(ledger, config)?;
    let report = run_session(&service, &mut walkers, rounds)?;
    info!(claims = report.claims, rejected = report.rejected, "simulation finished");

    println!("Submissions: {} ({} claims, {} too short, {} rejected, {} warnings)",
        report.submissions, report.claims, report.no_claims, report.rejected, report.warnings);
    println!("Area conquered from rivals: {:.1} m²\n", report.area_conquered);
    print_standings(&report.standings);
    Ok(())
}

fn cmd_leaderboard(ledger: &Ledger) -> Result<()> {
    let standings = ledger.leaderboard()?;
    if standings.is_empty() {
        println!("No users found. Run `seed` first.");
        return Ok(());
    }
    print_standings(&standings);
    Ok(())
}

fn print_standings(standings: &[turf_ledger::Standing]) {
    println!("=== Leaderboard ===\n");
    println!("{:>4} {:<20} {:>14} {:>12}", "Rank", "User", "Area (m²)", "Territories");
    println!("{}", "-".repeat(53));
    for s in standings {
        println!("{:>4} {:<20} {:>14.1} {:>12}", s.rank, s.username, s.total_area, s.territories);
    }
}

fn cmd_territories(ledger: &Ledger, username: Option<&str>) -> Result<()> {
    let territories = match username {
        Some(name) => ledger.territories_for_user(find_user(ledger, name)?.id)?,
        None => ledger.territories()?,
    };
    let users = ledger.users()?;
    let color_of = |owner: UserId| users.iter().find(|u| u.id == owner).map(|u| u.color.clone());

    let features: Vec<serde_json::Value> = territories.iter()
        .map(|t| geojson::feature(&t.geometry, json!({
            "id": t.id.0,
            "userId": t.owner.0,
            "routeId": t.route_id.0,
            "area": t.area,
            "color": color_of(t.owner),
        })))
        .collect();
    let collection = json!({ "type": "FeatureCollection", "features": features });
    println!("{}", serde_json::to_string_pretty(&collection)?);
    Ok(())
}

fn cmd_check(ledger: &Ledger, config: &EngineConfig) -> Result<()> {
    let found = ledger.verify_aggregates(config)?;
    if found.is_empty() {
        println!("All totals and cached areas agree with the territory rows.");
        return Ok(());
    }
    for d in &found {
        match d {
            Discrepancy::Total { user, stored, derived } => {
                println!("{user}: stored total {stored:.3} m², territories sum to {derived:.3} m²");
            }
            Discrepancy::CachedArea { territory, stored, derived } => {
                println!("{territory}: cached area {stored:.3} m², geometry measures {derived:.3} m²");
            }
        }
    }
    bail!("{} discrepancies found", found.len())
}
