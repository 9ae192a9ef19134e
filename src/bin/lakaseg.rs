//! CLI front end: `training` and `inferenz` subcommands (§6).

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use lakaseg::{InferenceConfig, InferenceMethod, TrainingConfig};

#[derive(Parser)]
#[command(name = "lakaseg", about = "Binary foreground/background segmentation via randomized forests + MRF smoothing")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train a forest from paired training/label images.
    Training(TrainingArgs),
    /// Run inference on a single image against a trained forest.
    Inferenz(InferenzArgs),
}

#[derive(Args)]
struct TrainingArgs {
    /// Training image(s).
    #[arg(short = 'i', num_args = 1.., required = true)]
    images: Vec<PathBuf>,
    /// Label image(s), one per training image.
    #[arg(short = 'l', num_args = 1.., required = true)]
    labels: Vec<PathBuf>,
    /// Output forest file.
    #[arg(short = 'f', required = true)]
    forest: PathBuf,
    #[arg(short = 'd', default_value_t = 8)]
    depth: u16,
    #[arg(short = 'p', default_value_t = 200)]
    tries: u32,
    #[arg(short = 't', default_value_t = 20)]
    forest_size: u16,
    #[arg(short = 'w', default_value_t = 4)]
    radius: u32,
    #[arg(short = 'o', default_value_t = 1)]
    threads: usize,
}

#[derive(Args)]
struct InferenzArgs {
    /// Input image to segment.
    #[arg(short = 'i', required = true)]
    image: PathBuf,
    /// Forest file to load.
    #[arg(short = 'f', required = true)]
    forest: PathBuf,
    /// Output label image.
    #[arg(short = 'l', required = true)]
    output: PathBuf,
    #[arg(short = 'e', default_value_t = 10.0)]
    pairwise_energy: f64,
    #[arg(short = 'm', default_value = "maxflow")]
    method: String,
    /// Optional unary-probability visualization.
    #[arg(long)]
    intermediate: Option<PathBuf>,
    /// Optional ground-truth label image; when given, writes ergebnisse.txt.
    #[arg(long)]
    ground_truth: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Training(args) => run_training(args),
        Command::Inferenz(args) => run_inferenz(args),
    }
}

fn run_training(args: TrainingArgs) -> anyhow::Result<()> {
    let config = TrainingConfig {
        forest_size: args.forest_size,
        max_tree_depth: args.depth,
        testobject_tries: args.tries,
        window_radius: args.radius,
        thread_count: args.threads,
        seed: None,
    };
    lakaseg::train(&args.images, &args.labels, &args.forest, &config)
        .context("training failed")?;
    Ok(())
}

fn run_inferenz(args: InferenzArgs) -> anyhow::Result<()> {
    let method: InferenceMethod = args
        .method
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))
        .context("invalid inference method")?;
    let config = InferenceConfig {
        pairwise_energy: args.pairwise_energy,
        method,
    };
    lakaseg::infer(
        &args.image,
        &args.forest,
        &args.output,
        &config,
        args.intermediate.as_deref(),
        args.ground_truth.as_deref(),
    )
    .context("inference failed")?;
    Ok(())
}
