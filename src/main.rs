#![allow(dead_code)]

use std::path::Path;
use std::process::exit;

use clap::{Args, Parser, Subcommand};
use log::{error, info};

use batch::RunContext;
use col::HashSet;
use config::PoolConfig;
use error::{ConfigError, ImportError};
use grouping::MatchTier;
use location::LocationTable;
use network::{NodeIdx, RoadNetwork};
use serialization::input::{
    import_network, import_network_csv, read_congestion, read_locations, read_trips,
    resolve_congestion,
};
use serialization::output::{export_legs_csv, export_members_csv, export_outcome};

mod batch;
mod col;
mod config;
mod error;
mod grouping;
mod indexer;
mod location;
mod network;
mod primitives;
mod routing;
mod serialization;
mod shortest_path;
mod stats;
#[cfg(test)]
mod test;
mod timeline;
mod trip;

#[derive(Parser, Debug)]
#[command(
    version,
    author,
    about = "Forms shared-vehicle groups from trip requests, sequences their routes and times the trips"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone, Debug)]
enum Commands {
    #[command(about = "Form groups, route them and simulate their timelines")]
    Run(RunArgs),

    #[command(about = "Form groups only and write the membership table")]
    Group(GroupArgs),
}

#[derive(Args, Clone, Debug)]
struct InputArgs {
    #[arg(short = 't', long, default_value = "trips.csv", help = "The trip request table.")]
    trips_path: String,

    #[arg(
        short = 'l',
        long,
        default_value = "locations.csv",
        help = "The table of regions and anchors."
    )]
    locations_path: String,

    #[arg(
        short = 'n',
        long,
        default_value = "network.sqlite3",
        help = "The road network with tables node(id, x, y) and edge(u, v, length)."
    )]
    network_path: String,

    #[arg(
        long,
        requires = "edges_csv",
        help = "Read road nodes from this CSV file (id,x,y) instead of the SQLite network."
    )]
    nodes_csv: Option<String>,

    #[arg(long, requires = "nodes_csv", help = "Road edges as CSV (u,v,length).")]
    edges_csv: Option<String>,

    #[arg(long, help = "A CSV file with a single column `node` listing congested nodes.")]
    congestion_path: Option<String>,
}

#[derive(Args, Clone, Debug)]
struct PoolArgs {
    #[arg(short = 'k', long, default_value_t = 4, help = "Maximum number of riders per vehicle.")]
    capacity: usize,

    #[arg(long, default_value_t = 60.0)]
    speed_mph: f64,

    #[arg(long, default_value_t = 0.01, help = "Probability of a random incident per leg.")]
    delay_probability: f64,

    #[arg(long, default_value_t = 5.0)]
    delay_minutes: f64,

    #[arg(long, default_value_t = 5.0)]
    congestion_delay_minutes: f64,

    #[arg(
        long,
        default_value_t = 30.0,
        help = "Trips match in time if their departures differ by at most this many minutes."
    )]
    time_window_minutes: f64,

    #[arg(long, default_value_t = 2.0)]
    stop_dwell_minutes: f64,

    #[arg(
        long,
        default_value_t = 8,
        help = "Groups with at most this many stops besides the anchor are routed by exhaustive search."
    )]
    exact_search_limit: usize,

    #[arg(
        long,
        default_value = "origin+departure+destination,origin+departure,window",
        help = "Match tiers from most to least specific."
    )]
    tiers: String,
}

impl PoolArgs {
    fn to_config(&self) -> Result<PoolConfig, ConfigError> {
        let config = PoolConfig {
            capacity: self.capacity,
            speed_mph: self.speed_mph,
            delay_probability: self.delay_probability,
            delay_minutes: self.delay_minutes,
            congestion_delay_minutes: self.congestion_delay_minutes,
            time_window_minutes: self.time_window_minutes,
            stop_dwell_minutes: self.stop_dwell_minutes,
            exact_search_limit: self.exact_search_limit,
            tiers: MatchTier::parse_list(&self.tiers)?,
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Args, Clone, Debug)]
struct RunArgs {
    #[clap(flatten)]
    input: InputArgs,

    #[clap(flatten)]
    pool: PoolArgs,

    #[arg(long, default_value_t = 0, help = "Seed for the incident delays.")]
    seed: u64,

    #[arg(
        short = 'o',
        long,
        default_value = "avpool-result.sqlite3",
        help = "The file to write groups, routes and timed legs to."
    )]
    out_filename: String,

    #[arg(long, help = "Additionally write the timed legs to this CSV file.")]
    legs_csv: Option<String>,
}

#[derive(Args, Clone, Debug)]
struct GroupArgs {
    #[clap(flatten)]
    input: InputArgs,

    #[clap(flatten)]
    pool: PoolArgs,

    #[arg(
        short = 'o',
        long,
        default_value = "avpool-groups.csv",
        help = "The file to write the group membership to."
    )]
    out_filename: String,
}

fn load_network(args: &InputArgs) -> Result<RoadNetwork, ImportError> {
    match (&args.nodes_csv, &args.edges_csv) {
        (Some(nodes_path), Some(edges_path)) => import_network_csv(nodes_path, edges_path),
        _ => import_network(&args.network_path),
    }
}

fn load_inputs(args: &InputArgs) -> (RoadNetwork, LocationTable) {
    let network = load_network(args).unwrap_or_else(|it| {
        error!("Could not import road network:\n{:#?}", it);
        exit(1);
    });
    info!(
        "Road network: {} nodes, {} edges",
        network.num_nodes(),
        network.num_edges()
    );
    let locations = read_locations(&args.locations_path)
        .and_then(|it| LocationTable::create(&it, &network))
        .unwrap_or_else(|it| {
            error!("Could not import locations:\n{:#?}", it);
            exit(1);
        });
    info!(
        "{} regions, {} anchors",
        locations.num_regions(),
        locations.num_anchors()
    );
    (network, locations)
}

fn config_or_exit(args: &PoolArgs) -> PoolConfig {
    args.to_config().unwrap_or_else(|it| {
        error!("Invalid configuration: {}", it);
        exit(1);
    })
}

fn context_or_exit<'a>(
    network: &'a RoadNetwork,
    locations: &'a LocationTable,
    config: &'a PoolConfig,
    congestion: HashSet<NodeIdx>,
) -> RunContext<'a> {
    RunContext::new(network, locations, config, congestion).unwrap_or_else(|it| {
        error!("Invalid configuration: {}", it);
        exit(1);
    })
}

fn main_run(args: &RunArgs) {
    for out_filename in std::iter::once(&args.out_filename).chain(&args.legs_csv) {
        if Path::new(out_filename).exists() {
            error!("Output file already exists: {}", out_filename);
            exit(1);
        }
    }
    let config = config_or_exit(&args.pool);
    let (network, locations) = load_inputs(&args.input);
    let congestion = match &args.input.congestion_path {
        Some(path) => {
            let ext_ids = read_congestion(path).unwrap_or_else(|it| {
                error!("Could not import congestion nodes:\n{:#?}", it);
                exit(1);
            });
            resolve_congestion(&network, &ext_ids)
        }
        None => col::set_new(),
    };
    let trips = read_trips(&args.input.trips_path).unwrap_or_else(|it| {
        error!("Could not import trip requests:\n{:#?}", it);
        exit(1);
    });

    let context = context_or_exit(&network, &locations, &config, congestion);
    let outcome = context.run(&trips, args.seed);

    export_outcome(&outcome, &network, &args.out_filename).unwrap_or_else(|it| {
        error!("Could not export results: {}", it);
        exit(1);
    });
    if let Some(legs_csv) = &args.legs_csv {
        export_legs_csv(&outcome.legs, &network, legs_csv).unwrap_or_else(|it| {
            error!("Could not write legs: {}", it);
            exit(1);
        });
    }
}

fn main_group(args: &GroupArgs) {
    if Path::new(&args.out_filename).exists() {
        error!("Output file already exists: {}", args.out_filename);
        exit(1);
    }
    let config = config_or_exit(&args.pool);
    let (network, locations) = load_inputs(&args.input);
    let trips = read_trips(&args.input.trips_path).unwrap_or_else(|it| {
        error!("Could not import trip requests:\n{:#?}", it);
        exit(1);
    });

    let context = context_or_exit(&network, &locations, &config, col::set_new());
    let (requests, exclusions) = context.resolve_requests(&trips);
    let groups = context.form_groups(requests);
    info!(
        "Formed {} groups, skipped {} requests",
        groups.len(),
        exclusions.len()
    );
    export_members_csv(&groups, &args.out_filename).unwrap_or_else(|it| {
        error!("Could not write group membership: {}", it);
        exit(1);
    });
}

fn main() {
    env_logger::builder().parse_env("LOG").init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => main_run(&args),
        Commands::Group(args) => main_group(&args),
    }
}
