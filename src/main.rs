use std::io::BufRead;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use assocnet::prelude::*;
use assocnet::prng::Prng;

/// Everything the demos can be tuned with, loadable from a JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct DemoConfig {
    topology: TopologyParams,
    temporal: TemporalParams,
    topology_network: Option<NetworkConfig>,
    temporal_network: Option<NetworkConfig>,
    simulation: SimulationConfig,
    seed: u64,
}

fn main() {
    tracing_subscriber::fmt::init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if args
        .iter()
        .any(|a| a == "--help" || a == "-h" || a == "help")
    {
        print_help();
        return;
    }

    let cfg = match take_flag(&mut args, "--config") {
        Some(path) => match load_config(Path::new(&path)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Could not read config {path}: {e}");
                std::process::exit(2);
            }
        },
        None => DemoConfig::default(),
    };

    match args.first().map(String::as_str) {
        None | Some("topology") => run_topology_demo(&cfg),
        Some("temporal") => run_temporal_demo(&cfg),
        Some("drive") => run_driver(&cfg),
        Some("print-config") => match serde_json::to_string_pretty(&cfg) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("{e}"),
        },
        Some(other) => {
            eprintln!("Unknown command: {other}");
            print_help();
            std::process::exit(2);
        }
    }
}

fn print_help() {
    println!("assocnet (incremental associative-memory network)");
    println!("usage:");
    println!("  cargo run                         sparse topology demo");
    println!("  cargo run -- temporal             temporal-difference conditioning demo");
    println!("  cargo run -- drive                read protocol lines from stdin, Ctrl-C to stop");
    println!("  cargo run -- print-config         dump the effective configuration as JSON");
    println!("  cargo run -- <cmd> --config FILE  load tunables from a JSON file");
}

fn take_flag(args: &mut Vec<String>, flag: &str) -> Option<String> {
    let idx = args.iter().position(|a| a == flag)?;
    args.remove(idx);
    if idx < args.len() {
        Some(args.remove(idx))
    } else {
        None
    }
}

fn load_config(path: &Path) -> Result<DemoConfig, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn run_topology_demo(cfg: &DemoConfig) {
    // Three recurring scenes. Objects within a scene co-occur and should bind;
    // a scene switch lets the old bindings fade.
    let scenes: [&[&str]; 3] = [
        &["cam kitchen", "cam kettle", "mic whistle"],
        &["cam street", "cam car", "mic horn"],
        &["cam park", "cam dog", "mic bark"],
    ];

    let network_cfg = cfg.topology_network.unwrap_or_else(NetworkConfig::topology);
    let mut net = Network::new(TopologyPolicy::new(cfg.topology), network_cfg);
    let mut rng = Prng::new(cfg.seed.max(1));

    for t in 0..900 {
        let scene = scenes[(t / 150) % scenes.len()];
        for key in scene {
            // Occasionally miss an object (tests recall through associations).
            if rng.next_f64_01() < 0.85 {
                net.ingest(key.to_string(), rng.gen_range_f64(0.9, 1.0));
            }
        }
        net.step();

        if t % 50 == 0 {
            let diag = net.diagnostics();
            println!(
                "t={t:4} units={:3} assocs={:3} generated={} removed={} mean_act={:.3} mean_|w|={:.4}",
                diag.unit_count,
                diag.association_count,
                diag.generated_last_cycle,
                diag.removed_last_cycle,
                diag.mean_activation,
                diag.mean_abs_weight,
            );
        }
    }

    let adapter = NetworkAdapter::new(&net);
    for view in adapter.cohort("mic") {
        println!("{} {:?}", view.key, view.fields);
    }
    if let Err(e) = net.verify() {
        warn!("invariant violated: {e}");
    }
}

fn run_temporal_demo(cfg: &DemoConfig) {
    // Classic conditioning: a cue followed two cycles later by an outcome.
    let network_cfg = cfg.temporal_network.unwrap_or_else(NetworkConfig::temporal);
    let mut net: Network<String, _> = Network::new(TemporalPolicy::new(cfg.temporal), network_cfg);
    let cue = "bell".to_string();
    let outcome = "food".to_string();

    for trial in 0..40 {
        net.ingest(cue.clone(), 1.0);
        net.step();
        net.step();
        net.ingest(outcome.clone(), 1.0);
        net.step();
        for _ in 0..5 {
            net.step();
        }

        if trial % 5 == 0 {
            let weight = match (net.get_unit(&cue), net.get_unit(&outcome)) {
                (Some(c), Some(o)) => net
                    .association_between(c.id, o.id)
                    .map(|a| a.weight())
                    .unwrap_or(0.0),
                _ => 0.0,
            };
            println!(
                "trial={trial:3} units={} {cue}->{outcome} weight={weight:+.4}",
                net.unit_count()
            );
        }
    }
}

fn run_driver(cfg: &DemoConfig) {
    let network_cfg = cfg.topology_network.unwrap_or_else(NetworkConfig::topology);
    let network = Network::new(TopologyPolicy::new(cfg.topology), network_cfg);
    let mut sim = Simulation::new(network, cfg.simulation);

    let inbox = sim.inbox();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            // Rejected commands are already logged by the inbox.
            if let Err(InputError::Closed) = inbox.submit_line(&line) {
                break;
            }
        }
    });

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Could not start runtime: {e}");
            std::process::exit(1);
        }
    };
    info!(cycle_time_ms = cfg.simulation.cycle_time_ms, "driver started");
    let cycles = runtime.block_on(sim.run_until(async {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("Ctrl-C handler unavailable; running until killed");
            std::future::pending::<()>().await;
        }
    }));

    let diag = sim.network().read().diagnostics();
    println!(
        "cycles={cycles} units={} assocs={}",
        diag.unit_count, diag.association_count
    );
}
