use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use mmc_queue::logging::init_logging;
use mmc_queue::output::render_table;
use mmc_queue::{
    create_timestamped_output_dir, run_study, run_study_into_dir, Scenario, StudyConfig,
    StudyResult,
};

#[derive(Debug, Parser)]
#[command(name = "mmc-sweep")]
#[command(about = "Steady-state M/M/c queue metrics over deterministic parameter sweeps")]
struct Cli {
    /// JSON study configuration; defaults to ./config.json when present
    #[arg(long)]
    config: Option<PathBuf>,

    /// Built-in study used when no configuration file is found
    #[arg(long, value_enum, default_value = "combined")]
    scenario: Scenario,

    #[arg(long, default_value = "output-mmc-queue")]
    outdir: PathBuf,

    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print the tables without writing CSV/JSON artifacts
    #[arg(long, default_value_t = false)]
    no_files: bool,
}

fn main() {
    if let Err(error) = try_main() {
        eprintln!("mmc-sweep failed: {error:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = load_config(cli.config.as_deref(), cli.scenario)?;

    let study = if cli.no_files {
        run_study(&config).context("study failed")?
    } else {
        let output_dir = create_timestamped_output_dir(&cli.outdir).with_context(|| {
            format!("failed to create output directory under {}", cli.outdir.display())
        })?;
        run_study_into_dir(&config, &output_dir).context("study failed")?
    };

    print_study(&study);
    Ok(())
}

fn load_config(path: Option<&Path>, scenario: Scenario) -> Result<StudyConfig> {
    if let Some(path) = path {
        return StudyConfig::from_json_file(path)
            .with_context(|| format!("failed to load config: {}", path.display()));
    }

    let cwd_config = PathBuf::from("config.json");
    if cwd_config.exists() {
        return StudyConfig::from_json_file(&cwd_config)
            .with_context(|| format!("failed to load config: {}", cwd_config.display()));
    }

    Ok(scenario.config())
}

fn print_study(study: &StudyResult) {
    for (idx, outcome) in study.sweeps.iter().enumerate() {
        println!("Sweep {idx}: {}", outcome.spec.axis().name());
        print!("{}", render_table(&outcome.records));

        match outcome.transition {
            Some(transition) => println!(
                "Stable from {} = {} (unstable at {})",
                outcome.spec.axis().name(),
                transition.first_stable_value,
                transition.last_unstable_value
            ),
            None => println!("No unstable-to-stable transition in this sweep"),
        }
        println!();
    }

    if let Some(output_dir) = &study.output_dir {
        println!("Output directory: {}", output_dir.display());
    }
}
