//! FlatKV Routing Inspector
//!
//! Shows which shard each key maps to for a given server list.

use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use flatkv::registry::ServerGroup;
use flatkv::{ServerRegistry, ShardRouter, WeightWalk};
use tracing_subscriber::{fmt, EnvFilter};

/// FlatKV routing inspector
#[derive(Parser, Debug)]
#[command(name = "flatkv-route")]
#[command(about = "Show how keys are routed across weighted FlatKV shards")]
#[command(version)]
struct Args {
    /// Server entry host:port[:weight[:group]] (repeatable)
    #[arg(short, long = "server", required = true)]
    servers: Vec<String>,

    /// Group to route against (falls back to the default group)
    #[arg(short, long)]
    group: Option<String>,

    /// Boundary rule of the weighted walk
    #[arg(short, long, value_enum, default_value = "proportional")]
    walk: Walk,

    /// Route N synthetic keys and print the distribution
    #[arg(long, value_name = "N")]
    sample: Option<usize>,

    /// Keys to route
    keys: Vec<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Walk {
    Proportional,
    Inclusive,
}

impl From<Walk> for WeightWalk {
    fn from(walk: Walk) -> Self {
        match walk {
            Walk::Proportional => WeightWalk::Proportional,
            Walk::Inclusive => WeightWalk::Inclusive,
        }
    }
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,flatkv=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let registry = ServerRegistry::new();
    let added = registry.add_servers(&args.servers);
    if added == 0 {
        tracing::error!("No valid server entries given");
        return ExitCode::FAILURE;
    }
    tracing::info!("Registered {} of {} server entries", added, args.servers.len());

    let group = registry.bind(args.group.as_deref());
    let router = ShardRouter::with_walk(group, args.walk.into());
    print_group(router.group());

    for key in &args.keys {
        match router.select_index(key) {
            Ok(index) => println!("{}\t{}\t{}", key, index, router.group().endpoints()[index]),
            Err(e) => {
                tracing::error!("Cannot route {:?}: {}", key, e);
                return ExitCode::FAILURE;
            }
        }
    }

    if let Some(samples) = args.sample {
        if let Err(e) = print_distribution(&router, samples) {
            tracing::error!("Sampling failed: {}", e);
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}

fn print_group(group: &ServerGroup) {
    println!(
        "# group {} ({} endpoints, total weight {})",
        group.name().unwrap_or("<none>"),
        group.len(),
        group.total_weight()
    );
}

fn print_distribution(router: &ShardRouter, samples: usize) -> flatkv::Result<()> {
    let group = router.group();
    let mut counts = vec![0usize; group.len()];
    for i in 0..samples {
        counts[router.select_index(&format!("sample:{}", i))?] += 1;
    }

    println!("# index\tendpoint\tweight\texpected\tobserved");
    for (index, endpoint) in group.endpoints().iter().enumerate() {
        let expected = f64::from(endpoint.weight) / group.total_weight() as f64;
        let observed = counts[index] as f64 / samples.max(1) as f64;
        println!(
            "{}\t{}\t{}\t{:.4}\t{:.4}",
            index, endpoint, endpoint.weight, expected, observed
        );
    }
    Ok(())
}
