//! MAD-GAN command line interface
//!
//! Main entry point providing:
//! - Training on a Gaussian mixture or an image folder
//! - Sample generation from a checkpoint
//! - The KL diagnostic over two sample files
//! - Writing a default configuration file

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tch::Tensor;
use tracing::{info, warn, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

use madgan::{
    data::{samples_to_tensor, DataLoader, ImageFolder},
    model::MadGan,
    training::{generator_noise, read_values_csv, write_generator_samples, Trainer},
    utils::{
        ensure_config_exists, kl_divergence, load_checkpoint, load_checkpoint_meta,
        resolve_checkpoint, value_range, Config, DatasetKind, RunDirectory,
    },
};

/// Multi-agent diverse GANs
#[derive(Parser)]
#[command(name = "madgan")]
#[command(version = "0.1.0")]
#[command(about = "Train several generators against one (k + 1)-way discriminator")]
struct Cli {
    /// Path to a TOML or JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a MAD-GAN
    Train(TrainArgs),

    /// Write per-generator samples from a checkpoint
    Generate {
        /// Checkpoint directory, or a run directory holding checkpoints
        #[arg(long)]
        checkpoint: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "generated")]
        output: PathBuf,

        /// Samples per generator
        #[arg(short, long, default_value = "64")]
        num_samples: i64,
    },

    /// KL divergence between two one-column sample files
    Kl {
        /// Real samples (CSV with header)
        #[arg(long)]
        real: PathBuf,

        /// Generated samples (CSV with header)
        #[arg(long)]
        generated: PathBuf,

        /// Lower end of the histogram domain (default: floor of the real minimum)
        #[arg(long, allow_hyphen_values = true)]
        min: Option<f64>,

        /// Upper end of the histogram domain (default: ceil of the real maximum)
        #[arg(long)]
        max: Option<f64>,

        /// Histogram bin width
        #[arg(long, default_value = "0.1")]
        bin_size: f64,
    },

    /// Initialize default configuration file
    Init {
        /// Output configuration file path
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
}

/// Overrides of the configuration file
#[derive(Args, Debug, Default)]
struct TrainArgs {
    /// Dataset: gmm or images (mnist)
    #[arg(long, value_parser = parse_dataset)]
    dataset: Option<DatasetKind>,

    /// Number of epochs
    #[arg(long)]
    epochs: Option<usize>,

    /// Train on the GPU (1) or the CPU (0)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1))]
    gpu: Option<u8>,

    /// CUDA device index
    #[arg(long)]
    gpu_add: Option<usize>,

    /// Channels of the training images
    #[arg(long)]
    num_channels: Option<i64>,

    /// Side length images are resized to
    #[arg(long)]
    image_size: Option<i64>,

    /// Negative slope of the LeakyReLU activations
    #[arg(long)]
    leaky_slope: Option<f64>,

    /// Parent directory of the image class directories
    #[arg(long)]
    dataroot: Option<String>,

    /// Length of the generator noise vector
    #[arg(long)]
    n_z: Option<i64>,

    /// Batch size (divisible by the number of generators)
    #[arg(long)]
    batch_size: Option<usize>,

    /// Number of generators
    #[arg(long)]
    num_generators: Option<usize>,

    /// Use the decomposed DEGAN losses
    #[arg(long)]
    degan: bool,

    /// Share all generator layers except the output layer
    #[arg(long)]
    sharing: bool,

    /// Generator learning rate
    #[arg(long)]
    lrg: Option<f64>,

    /// Discriminator learning rate
    #[arg(long)]
    lrd: Option<f64>,

    /// Adam beta1
    #[arg(long)]
    bt1: Option<f64>,

    /// Adam beta2
    #[arg(long)]
    bt2: Option<f64>,

    /// Instance noise decay interval in iterations
    #[arg(long)]
    ni: Option<usize>,

    /// Instance noise decay factor
    #[arg(long)]
    ndf: Option<f64>,

    /// Initial instance noise standard deviation
    #[arg(long)]
    nd: Option<f64>,

    /// Parent directory of the results directory
    #[arg(long)]
    out_dir: Option<String>,

    /// Resume from a checkpoint (or a run directory)
    #[arg(long)]
    resume: Option<PathBuf>,
}

impl TrainArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(v) = self.dataset {
            config.data.dataset = v;
        }
        if let Some(v) = self.epochs {
            config.training.epochs = v;
        }
        if let Some(v) = self.gpu {
            config.training.gpu = v == 1;
        }
        if let Some(v) = self.gpu_add {
            config.training.gpu_index = v;
        }
        if let Some(v) = self.num_channels {
            config.data.num_channels = v;
        }
        if let Some(v) = self.image_size {
            config.data.image_size = v;
        }
        if let Some(v) = self.leaky_slope {
            config.model.leaky_slope = v;
        }
        if let Some(v) = &self.dataroot {
            config.data.dataroot = v.clone();
        }
        if let Some(v) = self.n_z {
            config.model.n_z = v;
        }
        if let Some(v) = self.batch_size {
            config.data.batch_size = v;
        }
        if let Some(v) = self.num_generators {
            config.model.num_generators = v;
        }
        if self.degan {
            config.training.degan = true;
        }
        if self.sharing {
            config.model.sharing = true;
        }
        if let Some(v) = self.lrg {
            config.training.lrg = v;
        }
        if let Some(v) = self.lrd {
            config.training.lrd = v;
        }
        if let Some(v) = self.bt1 {
            config.training.beta1 = v;
        }
        if let Some(v) = self.bt2 {
            config.training.beta2 = v;
        }
        if let Some(v) = self.ni {
            config.training.noise.interval = v;
        }
        if let Some(v) = self.ndf {
            config.training.noise.decay_factor = v;
        }
        if let Some(v) = self.nd {
            config.training.noise.std = v;
        }
        if let Some(v) = &self.out_dir {
            config.training.out_dir = v.clone();
        }
    }
}

fn parse_dataset(s: &str) -> std::result::Result<DatasetKind, String> {
    match s.to_lowercase().as_str() {
        "gmm" => Ok(DatasetKind::Gmm),
        "images" | "mnist" => Ok(DatasetKind::Images),
        _ => Err(format!("unknown dataset '{}', expected gmm or images", s)),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = parse_level(&cli.verbosity);

    match cli.command {
        Commands::Train(args) => train(cli.config.as_deref(), &args, level),
        Commands::Generate {
            checkpoint,
            output,
            num_samples,
        } => {
            init_logging(level, None)?;
            generate(&checkpoint, &output, num_samples)
        }
        Commands::Kl {
            real,
            generated,
            min,
            max,
            bin_size,
        } => {
            init_logging(level, None)?;
            kl(&real, &generated, min, max, bin_size)
        }
        Commands::Init { output } => {
            init_logging(level, None)?;
            init_config(&output)
        }
    }
}

fn parse_level(verbosity: &str) -> Level {
    match verbosity.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Log to stdout and, when given, append to a file without colors
fn init_logging(level: Level, log_file: Option<&Path>) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(LevelFilter::from_level(level))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(Config::default()),
    }
}

/// Train a MAD-GAN
fn train(config_path: Option<&Path>, args: &TrainArgs, level: Level) -> Result<()> {
    // A resumed run continues with its stored configuration
    let resume = match &args.resume {
        Some(path) => {
            let checkpoint = resolve_checkpoint(path)
                .with_context(|| format!("No checkpoint found in {}", path.display()))?;
            let meta = load_checkpoint_meta(&checkpoint)?;
            Some((checkpoint, meta))
        }
        None => None,
    };

    let mut config = match &resume {
        Some((_, meta)) => meta.config.clone(),
        None => load_config(config_path)?,
    };
    args.apply(&mut config);
    config.validate().context("Invalid training configuration")?;

    let run = match &resume {
        Some((checkpoint, _)) => {
            let root = checkpoint
                .parent()
                .and_then(Path::parent)
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(&config.training.out_dir).join(config.run_name()));
            RunDirectory::open(root)?
        }
        None => RunDirectory::create(&config.training.out_dir, &config.run_name())?,
    };

    init_logging(level, Some(&run.log_file()))?;
    for warning in config.warnings() {
        warn!("{}", warning);
    }
    info!("Results directory: {}", run.root().display());
    config.save(run.root().join("config.toml"))?;

    let device = config.get_device();
    info!("Using device: {:?}", device);

    let data = load_dataset(&config)?;
    info!("Training samples: {:?}", data.size());
    let mut data_loader = DataLoader::new(data, config.data.batch_size, true, false, device);

    let mut model = MadGan::new(config.model_config(), device)?;
    let mut trainer = Trainer::new(config.clone(), device);

    if let Some((checkpoint, _)) = &resume {
        let (meta, metrics) = load_checkpoint(&mut model, checkpoint)?;
        trainer.resume(meta.epoch, meta.iteration, metrics);
    }

    let metrics = trainer.train(&model, &mut data_loader, &run)?;
    info!(
        "Training complete. Final D_loss: {:.4}, G_loss: {:.4}",
        metrics.latest_d_loss().unwrap_or(0.0),
        metrics.latest_g_loss().unwrap_or(0.0)
    );
    if let Some(kl) = metrics.latest_kl() {
        info!("Final KL divergence: {:.4}", kl);
    }

    Ok(())
}

/// Real samples stacked along the first dimension
fn load_dataset(config: &Config) -> Result<Tensor> {
    match config.data.dataset {
        DatasetKind::Gmm => {
            let mut rng = rand::thread_rng();
            let samples = config.data.gmm.sample(config.data.gmm_samples, &mut rng)?;
            info!(
                "Drew {} samples from a mixture of {} Gaussians",
                samples.len(),
                config.data.gmm.components.len()
            );
            Ok(samples_to_tensor(&samples))
        }
        DatasetKind::Images => {
            let folder = ImageFolder::new(
                &config.data.dataroot,
                config.data.image_size,
                config.data.num_channels,
            )?;
            info!("Loading {} images from {}", folder.len(), folder.root().display());
            Ok(folder.load_all()?)
        }
    }
}

/// Write per-generator samples from a checkpoint
fn generate(checkpoint: &Path, output: &Path, num_samples: i64) -> Result<()> {
    if num_samples <= 0 {
        bail!("num_samples must be > 0, got {}", num_samples);
    }

    let checkpoint = resolve_checkpoint(checkpoint)
        .with_context(|| format!("No checkpoint found in {}", checkpoint.display()))?;
    let meta = load_checkpoint_meta(&checkpoint)?;
    let device = meta.config.get_device();

    let mut model = MadGan::new(meta.config.model_config(), device)?;
    load_checkpoint(&mut model, &checkpoint)?;

    std::fs::create_dir_all(output)?;
    let noise = generator_noise(
        num_samples,
        model.n_z(),
        meta.config.training.noise_distribution,
        device,
    );
    let written = write_generator_samples(&model, &noise, output, "generated")?;
    for path in &written {
        info!("Saved {}", path.display());
    }

    Ok(())
}

/// KL divergence between two sample files
fn kl(
    real: &Path,
    generated: &Path,
    min: Option<f64>,
    max: Option<f64>,
    bin_size: f64,
) -> Result<()> {
    let real_values = read_values_csv(real)
        .with_context(|| format!("Failed to read {}", real.display()))?;
    let generated_values = read_values_csv(generated)
        .with_context(|| format!("Failed to read {}", generated.display()))?;

    let (lo, hi) = match (min, max, value_range(&real_values)) {
        (Some(lo), Some(hi), _) => (lo, hi),
        (lo, hi, Some((data_lo, data_hi))) => (lo.unwrap_or(data_lo), hi.unwrap_or(data_hi)),
        (_, _, None) => bail!("Cannot infer a histogram domain from {}", real.display()),
    };

    let divergence = kl_divergence(&real_values, &generated_values, lo, hi, bin_size)?;
    info!(
        "KL divergence over [{}, {}] with bin size {}: {:.6}",
        lo, hi, bin_size, divergence
    );
    println!("{}", divergence);

    Ok(())
}

/// Initialize default configuration file
fn init_config(output: &Path) -> Result<()> {
    if output.exists() {
        info!("Configuration already exists at {}", output.display());
    }
    ensure_config_exists(output)
        .with_context(|| format!("Failed to initialize {}", output.display()))?;
    info!("Configuration at {}", output.display());
    Ok(())
}
