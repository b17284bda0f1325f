use std::path::Path;

mod check;
mod show;
mod terminal;

use anyhow::Context;
use check::Check;
use clap::ArgAction;
use placement::{BuildReport, FeatureId, Model, ModelFile, SubsystemId};
use show::Show;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);
        self.command.run()
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false)
            .with_writer(std::io::stderr);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Load a model file and report refused placements, cycles and unplaced
    /// features
    Check(Check),

    /// Show the placement of one feature
    Show(Show),
}

impl Command {
    fn run(self) -> anyhow::Result<()> {
        match self {
            Self::Check(command) => command.run()?,
            Self::Show(command) => command.run()?,
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

fn load(file: &Path) -> anyhow::Result<BuildReport> {
    let model_file =
        ModelFile::load(file).with_context(|| format!("loading {}", file.display()))?;
    model_file
        .build()
        .with_context(|| format!("building {}", file.display()))
}

/// The path of a subsystem, or its id if it has gone.
fn path_name(model: &Model, id: impl Into<SubsystemId>) -> String {
    let id = id.into();
    model
        .path_of(id)
        .map_or_else(|| id.to_string(), |path| path.to_string())
}

/// Every feature in the model, sorted by path.
fn features_by_path(model: &Model) -> Vec<(String, FeatureId)> {
    let mut features: Vec<_> = model
        .features()
        .map(|feature| (path_name(model, feature), feature))
        .collect();
    features.sort();
    features
}
