// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use loopdeck::catalog::SampleCatalog;
use loopdeck::clock::SystemClock;
use loopdeck::config::Loopdeck;
use loopdeck::playback::simulated::{LoggingPort, MetadataDecoder};
use loopdeck::session::SessionController;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A procedural percussion and loop engine."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs a session against the system clock, logging what would be played.
    Run {
        /// The path to the session config.
        config: PathBuf,
        /// How long to run for.
        #[arg(short, long, default_value_t = 10)]
        seconds: u64,
        /// Loops to enable, e.g. rhythm or melody. May be repeated.
        #[arg(short, long = "loop")]
        loops: Vec<String>,
        /// Enables the drum beat. The beat plays by default when no loop is given.
        #[arg(short, long)]
        beat: bool,
    },
    /// Prints the drum grids generated for a number of cycles.
    Plan {
        /// The path to the session config.
        config: PathBuf,
        /// The number of cycles to generate.
        #[arg(short, long, default_value_t = 4)]
        cycles: u64,
        /// Seeds the generator, overriding the config.
        #[arg(short, long)]
        seed: Option<u64>,
    },
    /// Prints a summary of the sample catalog.
    Catalog {
        /// The path to the session config.
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            seconds,
            loops,
            beat,
        } => {
            let config = Loopdeck::deserialize(&config)?;
            let catalog: Arc<dyn SampleCatalog> = Arc::new(config.catalog());
            let session = SessionController::new(
                config.session_options()?,
                catalog,
                Arc::new(SystemClock::new()),
                Arc::new(LoggingPort::new()),
                MetadataDecoder::new(),
            );

            for key in loops.iter() {
                session.toggle_loop(key)?;
            }
            if beat || loops.is_empty() {
                session.toggle_beat();
            }

            info!(
                seconds,
                tempo = session.tempo(),
                bars = session.effective_bars(),
                "Session running"
            );
            tokio::time::sleep(Duration::from_secs(seconds)).await;
            session.stop();
        }
        Commands::Plan {
            config,
            cycles,
            seed,
        } => {
            let config = Loopdeck::deserialize(&config)?;
            let mut options = config.session_options()?;
            options.seed = seed.or(options.seed);

            let clock = options.musical_clock();
            let mut generator = options.pattern_generator();
            for cycle in 0..cycles {
                let grids =
                    generator.next_cycle(cycle, &options.instruments, options.randomness, &clock);
                println!("Cycle {}:", cycle + 1);
                print!("{}", grids);
            }
        }
        Commands::Catalog { config } => {
            let config = Loopdeck::deserialize(&config)?;
            println!("{}", config.catalog().summary());
        }
    }

    Ok(())
}
