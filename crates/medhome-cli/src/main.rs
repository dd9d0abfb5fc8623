//! CLI for medhome, a home vitals station.

mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "medhome")]
#[command(about = "medhome: heart rate, SpO2, weight and blood pressure, delivered")]
#[command(version = medhome_core::VERSION)]
struct Cli {
    /// Device profile (TOML). Defaults apply to anything it leaves out.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Endpoint overrides shared by the commands that transmit.
#[derive(Args, Debug, Clone, Default)]
pub struct EndpointArgs {
    /// Collection endpoint base URL (e.g. http://127.0.0.1:8000)
    #[arg(long)]
    endpoint: Option<String>,

    /// Payload schema: legacy or v1
    #[arg(long)]
    schema: Option<String>,
}

/// Targets for the simulated sensors.
#[derive(Args, Debug, Clone)]
pub struct SimArgs {
    /// Simulated heart rate (BPM)
    #[arg(long, default_value = "72")]
    hr: f64,

    /// Simulated SpO2 (%)
    #[arg(long, default_value = "97")]
    spo2: f64,

    /// Simulated weight
    #[arg(long, default_value = "70.0")]
    weight: f64,

    /// Uniform noise amplitude added to raw counts
    #[arg(long, default_value = "0", value_parser = parse_noise)]
    noise: f64,
}

fn parse_noise(s: &str) -> Result<f64, String> {
    let noise: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if noise.is_finite() && noise >= 0.0 {
        Ok(noise)
    } else {
        Err(format!("noise must be a finite, non-negative number (got {s})"))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the station loop with simulated peripherals and scripted button presses
    Run {
        /// Measurement cycles to run (0 = until Ctrl+C)
        #[arg(long, default_value = "1")]
        cycles: usize,

        /// Skip WiFi association and run in degraded mode
        #[arg(long)]
        offline: bool,

        #[command(flatten)]
        endpoint: EndpointArgs,

        #[command(flatten)]
        sim: SimArgs,
    },

    /// Take one measurement immediately, without waiting for the button
    Measure {
        /// Print the payload instead of transmitting it
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        endpoint: EndpointArgs,

        #[command(flatten)]
        sim: SimArgs,
    },

    /// Send one manually entered record to the endpoint (single attempt)
    Submit {
        #[arg(long)]
        hr: i32,

        #[arg(long)]
        spo2: i32,

        #[arg(long)]
        weight: f64,

        #[arg(long)]
        systolic: i32,

        #[arg(long)]
        diastolic: i32,

        /// Device serial (defaults to the profile's)
        #[arg(long)]
        serial: Option<String>,

        #[command(flatten)]
        endpoint: EndpointArgs,
    },

    /// Print the effective device profile as TOML
    Profile,

    /// Start the HTTP collection server
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8000")]
        port: u16,

        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Run {
            cycles,
            offline,
            endpoint,
            sim,
        } => commands::run::run(config, &endpoint, &sim, cycles, offline),
        Commands::Measure {
            dry_run,
            endpoint,
            sim,
        } => commands::measure::run(config, &endpoint, &sim, dry_run),
        Commands::Submit {
            hr,
            spo2,
            weight,
            systolic,
            diastolic,
            serial,
            endpoint,
        } => commands::submit::run(
            config,
            &endpoint,
            commands::submit::ManualReading {
                serial,
                hr,
                spo2,
                weight,
                systolic,
                diastolic,
            },
        ),
        Commands::Profile => commands::profile::run(config),
        Commands::Serve { port, host } => commands::serve::run(&host, port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_noise_rejects_non_finite() {
        assert_eq!(parse_noise("2.5"), Ok(2.5));
        assert_eq!(parse_noise("0"), Ok(0.0));
        assert!(parse_noise("nan").is_err());
        assert!(parse_noise("inf").is_err());
        assert!(parse_noise("-1").is_err());
        assert!(parse_noise("loud").is_err());
    }

    #[test]
    fn test_cli_rejects_nan_noise() {
        assert!(Cli::try_parse_from(["medhome", "measure", "--noise", "nan"]).is_err());
        assert!(Cli::try_parse_from(["medhome", "measure", "--noise", "3"]).is_ok());
    }
}
