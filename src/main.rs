use anyhow::Result;
use clap::Parser;
use log::{debug, info};

use snow_sim::simulation::{SimConfig, SimWorld};

#[derive(Parser)]
#[command(name = "snow_sim")]
#[command(about = "Snow-storm traffic simulation with plows and tow trucks")]
struct Cli {
    /// Number of simulation ticks to run
    #[arg(long, default_value = "1000")]
    ticks: u32,

    /// Time delta per tick in seconds
    #[arg(long, default_value = "0.1")]
    delta: f32,

    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Seconds between car spawns
    #[arg(long, value_parser = parse_positive_secs)]
    spawn_interval: Option<f32>,

    /// Do not send plows to the deepest road automatically
    #[arg(long)]
    no_auto_plow: bool,

    /// Print the summary and map after every simulated second
    #[arg(long)]
    map: bool,
}

fn parse_positive_secs(value: &str) -> Result<f32, String> {
    let secs: f32 = value
        .parse()
        .map_err(|_| format!("`{}` is not a number of seconds", value))?;
    if secs > 0.0 && secs.is_finite() {
        Ok(secs)
    } else {
        Err(format!("must be greater than zero, got {}", secs))
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    run_headless(&cli)
}

/// Run the simulation in the terminal
fn run_headless(cli: &Cli) -> Result<()> {
    info!("Running snow simulation in headless mode...");
    info!("Ticks: {}, Delta: {}s", cli.ticks, cli.delta);

    let mut config = SimConfig::default();
    if let Some(spawn_interval) = cli.spawn_interval {
        config.spawn_interval = spawn_interval;
    }

    let network = SimWorld::build_test_network()?;
    let mut world = match cli.seed {
        Some(seed) => SimWorld::new_with_seed(network, config, seed)?,
        None => SimWorld::new(network, config)?,
    };

    // Calculate how many ticks equal 1 second of simulation time
    let ticks_per_second = (1.0 / cli.delta).ceil().max(1.0) as u32;

    println!("Initial state:");
    world.print_summary();
    world.draw_map();
    println!();

    let mut tick = 0;
    while tick < cli.ticks {
        let ticks_to_run = ticks_per_second.min(cli.ticks - tick);
        for _ in 0..ticks_to_run {
            tick += 1;
            world.tick(cli.delta);
        }

        if !cli.no_auto_plow {
            auto_plow(&mut world);
        }

        if cli.map {
            println!(
                "--- After tick {} ({:.1}s simulated time) ---",
                tick,
                tick as f32 * cli.delta
            );
            world.print_summary();
            world.draw_map();
            println!();
        }
    }

    println!("=== Final State ===");
    world.print_summary();
    world.draw_map();

    world.stats().log_summary();
    Ok(())
}

/// Send a plow to the snowiest road once it shows visible snow
fn auto_plow(world: &mut SimWorld) {
    let Some(segment) = world.deepest_segment() else {
        return;
    };
    if segment.accumulation < world.config.tiers.light {
        return;
    }
    let segment_id = segment.id;
    if let Some(plow) = world.dispatch_plow(segment_id) {
        debug!("Auto-plow {:?} sent to {:?}", plow.0, segment_id);
    }
}
