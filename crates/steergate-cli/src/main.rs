//! `steergate-cli` – command line front end for the gating engine
//!
//! ```text
//! steergate [--config PATH] init              write a default config file
//! steergate [--config PATH] profile           print the active vehicle profile
//! steergate [--config PATH] replay FILE|-     replay a JSONL frame log
//! ```
//!
//! The config file defaults to `./steergate.toml`; see [`config`] for the
//! fields and their `STEERGATE_*` environment overrides.

mod config;
mod replay;

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

use colored::Colorize;
use steergate_kernel::{Gateway, VehicleProfile};
use tracing::info;

use crate::replay::Outcome;

fn main() -> ExitCode {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG selects the filter (default "warn" so replay output stays
    // readable); STEERGATE_LOG_FORMAT=json emits newline-delimited JSON.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    if std::env::var("STEERGATE_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(io::stderr)
            .compact()
            .init();
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<ExitCode, String> {
    let mut config_path = config::config_path();
    let mut rest = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = iter.next().ok_or("--config needs a path")?;
                config_path = PathBuf::from(path);
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(ExitCode::SUCCESS);
            }
            _ => rest.push(arg.as_str()),
        }
    }

    match rest.as_slice() {
        ["init"] => {
            config::save_to(&config::Config::default(), &config_path)?;
            println!(
                "  {} Config saved to {}",
                "✓".green().bold(),
                config_path.display().to_string().bold()
            );
            Ok(ExitCode::SUCCESS)
        }
        ["profile"] => {
            let cfg = config::load_or_default(&config_path)?;
            print_profile(VehicleProfile::for_generation(cfg.generation));
            Ok(ExitCode::SUCCESS)
        }
        ["replay", source] => {
            let cfg = config::load_or_default(&config_path)?;
            info!(generation = %cfg.generation, relay_grace_ms = cfg.relay_grace_ms, "starting replay");
            let mut gateway = Gateway::with_relay_grace(cfg.generation, cfg.relay_grace_us());

            let summary = if *source == "-" {
                replay::run(&mut gateway, io::stdin().lock(), print_outcome)?
            } else {
                let file = File::open(source).map_err(|e| format!("Failed to open {source}: {e}"))?;
                replay::run(&mut gateway, BufReader::new(file), print_outcome)?
            };

            println!();
            println!(
                "  {} accepted, {} rejected, {} skipped, {} lag reports",
                summary.accepted.to_string().green().bold(),
                summary.rejected.to_string().red().bold(),
                summary.skipped.to_string().yellow().bold(),
                summary.lagging.to_string().yellow().bold()
            );
            let t = gateway.telemetry();
            println!(
                "  final: controls_allowed={} moving={} gas={} brake={} relay_malfunction={}",
                t.controls_allowed(),
                t.vehicle_moving(),
                t.gas_pressed(),
                t.brake_pressed(),
                t.relay_malfunction()
            );
            Ok(ExitCode::SUCCESS)
        }
        _ => {
            print_usage();
            Ok(ExitCode::from(2))
        }
    }
}

fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Received { frame, forward } => {
            let fwd = forward.map_or_else(|| "drop".to_string(), |b| b.to_string());
            println!(
                "  {} {:>6} 0x{:03X} → {}",
                "RX ok ".green(),
                frame.bus,
                frame.address,
                fwd
            );
        }
        Outcome::RxRejected { frame, error } => {
            println!("  {} {:>6} 0x{:03X} {}", "RX bad".red(), frame.bus, frame.address, error);
        }
        Outcome::Admitted { frame } => {
            println!("  {} {:>6} 0x{:03X}", "TX ok ".green(), frame.bus, frame.address);
        }
        Outcome::Refused { frame, error } => {
            println!("  {} {:>6} 0x{:03X} {}", "TX no ".red(), frame.bus, frame.address, error);
        }
        Outcome::Skipped { line, reason } => {
            println!("  {} line {}: {}", "skip  ".yellow(), line, reason.dimmed());
        }
        Outcome::Lagging { t_us, addresses } => {
            let list = addresses
                .iter()
                .map(|(bus, address)| format!("{bus} 0x{address:03X}"))
                .collect::<Vec<_>>()
                .join(", ");
            println!("  {} at {}us: {}", "lag   ".yellow().bold(), t_us, list);
        }
    }
}

fn print_profile(profile: &VehicleProfile) {
    let l = &profile.limits;
    println!("  {} {}", "Profile".bold(), profile.generation.to_string().cyan());
    println!(
        "  steer: max {} up {} down {} rt {} / {}us, driver allowance {} x{}",
        l.max_steer,
        l.max_rate_up,
        l.max_rate_down,
        l.max_rt_delta,
        l.max_rt_interval_us,
        l.driver_torque_allowance,
        l.driver_torque_factor
    );
    println!("  {}", "tx allow-list:".bold());
    for b in profile.tx {
        println!("    {:>6} 0x{:03X} len {} {:?}", b.bus, b.address, b.len, b.role);
    }
    println!("  {}", "watched:".bold());
    for w in profile.watches {
        println!("    {:>6} 0x{:03X} every {}us", w.bus, w.address, w.expected_timestep_us);
    }
}

fn print_usage() {
    println!();
    println!("  {} {}", "steergate".bold(), format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    println!("  Steering-assist safety gateway");
    println!();
    println!("  Usage: steergate [--config PATH] <init | profile | replay FILE|->");
    println!();
}
