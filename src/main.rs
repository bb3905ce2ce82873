#![allow(dead_code)]

use std::path::PathBuf;
use std::process::exit;

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{error, info};

use access::AccessEgress;
use events::DebugListeners;
use network::{ExtStopId, TransitNetwork};
use request::{Profile, RaptorRequest};
use serialization::timetable::{read_transfers_csv, read_trips_csv};
use slack::DefaultSlackSource;
use test::random_samples;

mod access;
mod col;
mod composite;
mod cost;
mod direction;
mod events;
mod heuristic;
mod network;
mod path;
mod primitives;
mod request;
mod route;
mod serialization;
mod slack;
mod state;
mod test;
mod timetable;
mod worker;

#[derive(Parser, Debug)]
#[command(
    version,
    author,
    about = "Round-based engine for computing Pareto-optimal public transit journeys"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone, Debug)]
enum Commands {
    #[command(about = "Route one query over a CSV timetable")]
    Query(QueryArgs),

    #[command(about = "Run random queries over a generated network")]
    RunRandom(RunRandomArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ProfileArg {
    Standard,
    BestTime,
    MinDuration,
    MultiCriteria,
}

impl From<ProfileArg> for Profile {
    fn from(value: ProfileArg) -> Self {
        match value {
            ProfileArg::Standard => Profile::Standard,
            ProfileArg::BestTime => Profile::BestTime,
            ProfileArg::MinDuration => Profile::MinTravelDuration,
            ProfileArg::MultiCriteria => Profile::MultiCriteria,
        }
    }
}

#[derive(Args, Clone, Debug)]
struct QueryArgs {
    #[arg(short, long, default_value = "stop_times.csv")]
    timetable_path: PathBuf,

    #[arg(long, help = "Optional transfers file (from_stop,to_stop,duration).")]
    transfers_path: Option<PathBuf>,

    #[arg(long, help = "Origin stop id.")]
    from: u32,

    #[arg(long, help = "Destination stop id.")]
    to: u32,

    #[arg(
        short,
        long,
        help = "Earliest departure, HH:MM:SS. One of --depart/--arrive is required."
    )]
    depart: Option<String>,

    #[arg(short, long, help = "Latest arrival, HH:MM:SS.")]
    arrive: Option<String>,

    #[arg(short, long, help = "Search window in minutes.")]
    window: Option<i32>,

    #[arg(long, value_enum, default_value = "standard")]
    profile: ProfileArg,

    #[arg(long, default_value_t = 12)]
    max_rounds: usize,

    #[arg(long, help = "Enable destination pruning.")]
    pruning: bool,

    #[arg(long, default_value_t = 120, help = "Access/egress walk seconds.")]
    walk_seconds: i32,

    #[arg(long, default_value_t = 30)]
    board_slack: i32,

    #[arg(long, default_value_t = 10)]
    alight_slack: i32,

    #[arg(long, default_value_t = 60)]
    transfer_slack: i32,
}

fn parse_clock(value: &Option<String>, name: &str) -> Option<primitives::Time> {
    value.as_ref().map(|text| {
        primitives::parse_time(text).unwrap_or_else(|e| {
            error!("Bad --{name}: {e}");
            exit(1);
        })
    })
}

fn main_query(args: &QueryArgs) {
    let trips = read_trips_csv(&args.timetable_path).unwrap_or_else(|e| {
        error!("Could not read timetable:\n{:#?}", e);
        exit(1);
    });
    let transfers = match &args.transfers_path {
        Some(path) => read_transfers_csv(path).unwrap_or_else(|e| {
            error!("Could not read transfers:\n{:#?}", e);
            exit(1);
        }),
        None => Vec::new(),
    };
    let (net, idx) = TransitNetwork::create(trips, vec![], transfers).unwrap_or_else(|e| {
        error!("Invalid timetable:\n{:#?}", e);
        exit(1);
    });

    let stop = |ext: u32, side: &str| {
        *idx.get(&ExtStopId(ext)).unwrap_or_else(|| {
            error!("Unknown {side} stop {ext}");
            exit(1);
        })
    };
    let access = vec![AccessEgress::new(stop(args.from, "origin"), args.walk_seconds)];
    let egress = vec![AccessEgress::new(stop(args.to, "destination"), args.walk_seconds)];

    let mut request = RaptorRequest::new(access, egress);
    request.profile = args.profile.into();
    request.earliest_departure = parse_clock(&args.depart, "depart");
    request.latest_arrival = parse_clock(&args.arrive, "arrive");
    request.search_window = args.window.map(|m| m * 60);
    request.max_rounds = args.max_rounds;
    request.destination_pruning = args.pruning;

    let slack = DefaultSlackSource::uniform(args.board_slack, args.alight_slack, args.transfer_slack);
    let started = std::time::Instant::now();
    let result = route::route(&net, &slack, &request, None, DebugListeners::default())
        .unwrap_or_else(|e| {
            error!("Routing failed: {e}");
            exit(1);
        });
    info!("Search took {:?}", started.elapsed());

    if !result.is_destination_reached() {
        println!("No journey found.");
        return;
    }
    for path in result.extract_paths() {
        println!("{path}");
    }
}

#[derive(Args, Clone, Debug)]
struct RunRandomArgs {
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    #[arg(short, long, default_value_t = 100)]
    queries: usize,
}

fn main() {
    env_logger::builder().parse_env("LOG").init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Query(args) => main_query(&args),
        Commands::RunRandom(args) => random_samples::run(args.seed, args.queries),
    }
}
