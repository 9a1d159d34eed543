//! Training loop implementation for MAD-GAN
//!
//! Every iteration updates the discriminator once and then all generators
//! once. The generators share one batch of noise, and their outputs are
//! concatenated generator by generator, so fake sample `i` was produced by
//! generator `i / m`.

use indicatif::{ProgressBar, ProgressStyle};
use tch::{nn, Device, Tensor};
use tracing::{debug, info, warn};

use super::labels::{fake_labels, labels_for};
use super::losses::LossMode;
use super::metrics::{EMATracker, TrainingMetrics};
use super::noise::{generator_noise, InstanceNoise, InstanceNoiseConfig, NoiseDistribution};
use super::samples::{tensor_values, write_generator_samples};
use crate::data::DataLoader;
use crate::error::{MadGanError, Result};
use crate::model::{MadGan, SampleKind};
use crate::utils::{
    kl_divergence, save_checkpoint, value_range, Config, DatasetKind, RunDirectory,
};

/// Training configuration
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Number of training epochs
    pub epochs: usize,
    /// Learning rate for the generators
    pub lrg: f64,
    /// Learning rate for the discriminator
    pub lrd: f64,
    /// Adam beta1 (both optimizers)
    pub beta1: f64,
    /// Adam beta2 (both optimizers)
    pub beta2: f64,
    /// Loss routing
    pub loss_mode: LossMode,
    /// Instance noise schedule
    pub noise: InstanceNoiseConfig,
    /// Distribution of the generator input noise
    pub noise_distribution: NoiseDistribution,
    /// Log and write samples every N iterations
    pub check_interval: usize,
    /// Save checkpoint every N epochs (0 = only at the end)
    pub checkpoint_every: usize,
    /// Rows of the fixed noise batch, i.e. samples per generator
    pub samples_per_generator: i64,
    /// Bin size of the KL diagnostic
    pub kl_bin_size: f64,
    /// Histogram domain of the KL diagnostic; `None` uses the data range
    pub kl_domain: Option<(f64, f64)>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 30,
            lrg: 1e-4,
            lrd: 1e-4,
            beta1: 0.5,
            beta2: 0.999,
            loss_mode: LossMode::CrossEntropy,
            noise: InstanceNoiseConfig::default(),
            noise_distribution: NoiseDistribution::Uniform,
            check_interval: 500,
            checkpoint_every: 5,
            samples_per_generator: 64,
            kl_bin_size: 0.1,
            kl_domain: None,
        }
    }
}

impl TrainingConfig {
    pub fn from_config(config: &Config) -> Self {
        let t = &config.training;
        let kl_domain = match config.data.dataset {
            DatasetKind::Gmm => Some(config.data.gmm.support(4.0)),
            DatasetKind::Images => None,
        };

        Self {
            epochs: t.epochs,
            lrg: t.lrg,
            lrd: t.lrd,
            beta1: t.beta1,
            beta2: t.beta2,
            loss_mode: config.loss_mode(),
            noise: t.noise,
            noise_distribution: t.noise_distribution,
            check_interval: t.check_interval.max(1),
            checkpoint_every: t.checkpoint_every,
            samples_per_generator: t.samples_per_generator,
            kl_bin_size: t.kl_bin_size,
            kl_domain,
        }
    }
}

/// Losses of one training iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepLosses {
    pub d_loss: f64,
    pub g_loss: f64,
}

/// MAD-GAN trainer
pub struct Trainer {
    config: TrainingConfig,
    run_config: Config,
    device: Device,
    metrics: TrainingMetrics,
    noise: InstanceNoise,
    iters: usize,
    start_epoch: usize,
}

impl Trainer {
    /// Create a new trainer
    ///
    /// `run_config` is stored in every checkpoint so a run can be rebuilt.
    pub fn new(run_config: Config, device: Device) -> Self {
        let config = TrainingConfig::from_config(&run_config);
        Self::with_config(config, run_config, device)
    }

    pub fn with_config(config: TrainingConfig, run_config: Config, device: Device) -> Self {
        Self {
            noise: InstanceNoise::new(config.noise),
            config,
            run_config,
            device,
            metrics: TrainingMetrics::new(),
            iters: 0,
            start_epoch: 0,
        }
    }

    /// Continue from a checkpoint taken after `epoch` completed epochs
    pub fn resume(&mut self, epoch: usize, iteration: usize, metrics: TrainingMetrics) {
        self.start_epoch = epoch;
        self.iters = iteration;
        self.metrics = metrics;
        self.noise = InstanceNoise::new(self.config.noise);
        self.noise.fast_forward(iteration);
        info!(
            "Resuming at epoch {} (iteration {}, noise std {})",
            epoch,
            iteration,
            self.noise.std()
        );
    }

    /// Train the model
    ///
    /// # Arguments
    ///
    /// * `model` - MAD-GAN model to train
    /// * `data_loader` - DataLoader providing real batches
    /// * `run` - Results directory receiving samples, checkpoints and losses
    ///
    /// # Returns
    ///
    /// Training metrics
    pub fn train(
        &mut self,
        model: &MadGan,
        data_loader: &mut DataLoader,
        run: &RunDirectory,
    ) -> Result<&TrainingMetrics> {
        let k = model.num_generators();
        let batch_size = data_loader.batch_size();
        if batch_size % k != 0 {
            return Err(MadGanError::InvalidConfig(format!(
                "batch size {} is not divisible by the number of generators {}",
                batch_size, k
            )));
        }

        let expected = model.config().sample.shape();
        if data_loader.sample_shape() != expected {
            return Err(MadGanError::InvalidInput(format!(
                "data samples have shape {:?}, the model expects {:?}",
                data_loader.sample_shape(),
                expected
            )));
        }

        let mut gen_opt =
            model.gen_optimizer(self.config.lrg, self.config.beta1, self.config.beta2)?;
        let mut disc_opt =
            model.disc_optimizer(self.config.lrd, self.config.beta1, self.config.beta2)?;

        let fixed_noise = generator_noise(
            self.config.samples_per_generator,
            model.n_z(),
            self.config.noise_distribution,
            self.device,
        );

        let kl_reference = match model.config().sample {
            SampleKind::Vector { .. } => {
                let real = tensor_values(data_loader.data())?;
                let domain = self
                    .config
                    .kl_domain
                    .or_else(|| value_range(&real))
                    .unwrap_or((0.0, 1.0));
                Some((real, domain))
            }
            SampleKind::Image { .. } => None,
        };

        let num_batches = data_loader.num_batches();
        let epochs = self.config.epochs;

        info!(
            "Starting training for {} epochs, {} batches per epoch, {} generators",
            epochs, num_batches, k
        );

        let mut last_losses = None;
        let mut last_written = None;

        for epoch in self.start_epoch..epochs {
            let mut epoch_d_loss = 0.0;
            let mut epoch_g_loss = 0.0;
            let mut batch_count = 0usize;
            let mut d_ema = EMATracker::new(0.1);
            let mut g_ema = EMATracker::new(0.1);

            let pb = ProgressBar::new(num_batches as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("##-"),
            );

            for (batch_idx, real) in data_loader.iter().enumerate() {
                pb.inc(1);

                let iters = self.iters;
                let step = self.train_step(
                    model,
                    &real,
                    batch_size as i64,
                    &mut gen_opt,
                    &mut disc_opt,
                )?;
                let Some(losses) = step else {
                    continue;
                };

                epoch_d_loss += losses.d_loss;
                epoch_g_loss += losses.g_loss;
                batch_count += 1;

                d_ema.update(losses.d_loss);
                g_ema.update(losses.g_loss);
                pb.set_message(format!("D: {:.4}, G: {:.4}", d_ema.value(), g_ema.value()));

                last_losses = Some((epoch, batch_idx, losses));
                if iters % self.config.check_interval == 0 {
                    self.report(epoch, batch_idx, num_batches, losses);
                    self.write_samples(model, &fixed_noise, run, kl_reference.as_ref(), iters)?;
                    last_written = Some(iters);
                }
            }

            pb.finish_with_message("done");

            if batch_count == 0 {
                warn!("Epoch {} had no batch of size {}", epoch, batch_size);
            } else {
                let avg_d_loss = epoch_d_loss / batch_count as f64;
                let avg_g_loss = epoch_g_loss / batch_count as f64;
                self.metrics.record_epoch(avg_d_loss, avg_g_loss);
                info!(
                    "Epoch {}/{}: D_loss={:.4}, G_loss={:.4}",
                    epoch + 1,
                    epochs,
                    avg_d_loss,
                    avg_g_loss
                );
            }

            let every = self.config.checkpoint_every;
            if (every > 0 && (epoch + 1) % every == 0) || epoch + 1 == epochs {
                save_checkpoint(
                    model,
                    &self.metrics,
                    &self.run_config,
                    epoch + 1,
                    run.checkpoints_dir(),
                )?;
            }
        }

        // Samples of the final state, unless the last iteration was a check
        if let Some((epoch, batch_idx, losses)) = last_losses {
            let iters = self.iters - 1;
            if last_written != Some(iters) {
                self.report(epoch, batch_idx, num_batches, losses);
                self.write_samples(model, &fixed_noise, run, kl_reference.as_ref(), iters)?;
            }
        }

        self.metrics.save_csv(run.losses_file())?;
        info!("Finished training after {} iterations", self.iters);

        Ok(&self.metrics)
    }

    fn report(&self, epoch: usize, batch_idx: usize, num_batches: usize, losses: StepLosses) {
        info!(
            "Iters: {}; Epo: {}/{}; Btch: {}/{}; D_Err: {:.4}; G_Err: {:.4};",
            self.iters - 1,
            epoch,
            self.config.epochs,
            batch_idx,
            num_batches,
            losses.d_loss,
            losses.g_loss
        );
    }

    /// Write fixed-noise samples tagged with `iters` and, for 1-D data, log
    /// the KL diagnostic against the real samples
    fn write_samples(
        &mut self,
        model: &MadGan,
        fixed_noise: &Tensor,
        run: &RunDirectory,
        kl_reference: Option<&(Vec<f64>, (f64, f64))>,
        iters: usize,
    ) -> Result<()> {
        write_generator_samples(model, fixed_noise, run.results_dir(), &iters.to_string())?;

        if let Some((real, (min, max))) = kl_reference {
            let generated = tensor_values(&model.generate_from_noise(fixed_noise))?;
            let kl = kl_divergence(real, &generated, *min, *max, self.config.kl_bin_size)?;
            info!("KL divergence: {:.4}", kl);
            self.metrics.record_kl(iters, kl);
        }
        Ok(())
    }

    /// One discriminator update followed by one generator update
    ///
    /// Returns `None` (and does not count the iteration) when `real` does not
    /// hold exactly `batch_size` samples.
    pub fn train_step(
        &mut self,
        model: &MadGan,
        real: &Tensor,
        batch_size: i64,
        gen_opt: &mut nn::Optimizer,
        disc_opt: &mut nn::Optimizer,
    ) -> Result<Option<StepLosses>> {
        if real.size()[0] != batch_size {
            debug!(
                "Skipping batch of {} samples (expected {})",
                real.size()[0],
                batch_size
            );
            return Ok(None);
        }

        let k = model.num_generators();
        let m = batch_size / k as i64;

        let real_labels = labels_for(k, -1, batch_size, self.device)?;
        let gen_labels = fake_labels(k, m, self.device)?;

        let z = generator_noise(m, model.n_z(), self.config.noise_distribution, self.device);
        let fake = model.generator.forward_t(&z, true);
        let x_noise = self.noise.sample_like(&fake);
        self.noise.step(self.iters);

        let d_loss = self.discriminator_step(
            model,
            real,
            &fake,
            &x_noise,
            &real_labels,
            &gen_labels,
            disc_opt,
        );
        let g_loss = self.generator_step(model, &fake, &x_noise, &real_labels, gen_opt);

        let losses = StepLosses {
            d_loss: d_loss.double_value(&[]),
            g_loss: g_loss.double_value(&[]),
        };
        self.metrics.record_iteration(losses.d_loss, losses.g_loss);
        self.iters += 1;

        Ok(Some(losses))
    }

    /// Update the discriminator on real samples and detached noisy fakes
    #[allow(clippy::too_many_arguments)]
    fn discriminator_step(
        &self,
        model: &MadGan,
        real: &Tensor,
        fake: &Tensor,
        x_noise: &Tensor,
        real_labels: &Tensor,
        gen_labels: &Tensor,
        disc_opt: &mut nn::Optimizer,
    ) -> Tensor {
        let real_logits = model.discriminator.forward_t(real, true);
        let fake_logits = model
            .discriminator
            .forward_t(&(fake.detach() + x_noise), true);
        let d_loss = self.config.loss_mode.discriminator_loss(
            &real_logits,
            &fake_logits,
            real_labels,
            gen_labels,
        );

        disc_opt.zero_grad();
        d_loss.backward();
        disc_opt.step();
        d_loss
    }

    /// Update all generators so their noisy fakes are classified as real
    fn generator_step(
        &self,
        model: &MadGan,
        fake: &Tensor,
        x_noise: &Tensor,
        real_labels: &Tensor,
        gen_opt: &mut nn::Optimizer,
    ) -> Tensor {
        let fake_logits = model.discriminator.forward_t(&(fake + x_noise), true);
        let g_loss = self.config.loss_mode.generator_loss(&fake_logits, real_labels);

        gen_opt.zero_grad();
        g_loss.backward();
        gen_opt.step();
        g_loss
    }

    /// Get training metrics
    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }

    /// Get configuration
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Completed iterations
    pub fn iterations(&self) -> usize {
        self.iters
    }

    /// Current instance noise standard deviation
    pub fn noise_std(&self) -> f64 {
        self.noise.std()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelConfig;
    use tch::Kind;
    use tempfile::TempDir;

    fn tiny_run_config() -> Config {
        let mut config = Config::default();
        config.data.batch_size = 6;
        config.data.gmm_samples = 30;
        config.model.n_z = 4;
        config.model.hidden_dim = 8;
        config.model.num_generators = 3;
        config.training.epochs = 2;
        config.training.check_interval = 2;
        config.training.checkpoint_every = 1;
        config.training.samples_per_generator = 10;
        config.training.gpu = false;
        config
    }

    fn tiny_model(config: &Config) -> MadGan {
        MadGan::new(config.model_config(), Device::Cpu).unwrap()
    }

    fn snapshot(vs: &nn::VarStore) -> Vec<(String, Tensor)> {
        let mut vars: Vec<_> = vs
            .variables()
            .into_iter()
            .map(|(name, t)| (name, t.detach().copy()))
            .collect();
        vars.sort_by(|a, b| a.0.cmp(&b.0));
        vars
    }

    fn changed(vs: &nn::VarStore, before: &[(String, Tensor)]) -> Vec<String> {
        let current = vs.variables();
        before
            .iter()
            .filter(|(name, old)| !current[name].equal(old))
            .map(|(name, _)| name.clone())
            .collect()
    }

    #[test]
    fn test_training_config_from_config() {
        let mut config = Config::default();
        config.training.degan = true;
        config.training.lrg = 2e-4;

        let training = TrainingConfig::from_config(&config);
        assert_eq!(training.loss_mode, LossMode::Degan);
        assert_eq!(training.lrg, 2e-4);
        assert_eq!(training.kl_domain, Some((-2.0, 114.0)));

        config.data.dataset = DatasetKind::Images;
        assert_eq!(TrainingConfig::from_config(&config).kl_domain, None);
    }

    #[test]
    fn test_train_step_skips_mismatched_batch() {
        let config = tiny_run_config();
        let model = tiny_model(&config);
        let mut trainer = Trainer::new(config, Device::Cpu);
        let mut gen_opt = model.gen_optimizer(1e-4, 0.5, 0.999).unwrap();
        let mut disc_opt = model.disc_optimizer(1e-4, 0.5, 0.999).unwrap();

        let short = Tensor::rand([4, 1], (Kind::Float, Device::Cpu));
        let result = trainer
            .train_step(&model, &short, 6, &mut gen_opt, &mut disc_opt)
            .unwrap();
        assert!(result.is_none());
        assert_eq!(trainer.iterations(), 0);

        let full = Tensor::rand([6, 1], (Kind::Float, Device::Cpu));
        let losses = trainer
            .train_step(&model, &full, 6, &mut gen_opt, &mut disc_opt)
            .unwrap()
            .unwrap();
        assert!(losses.d_loss.is_finite());
        assert!(losses.g_loss.is_finite());
        assert_eq!(trainer.iterations(), 1);
        assert_eq!(trainer.metrics().num_iterations(), 1);
    }

    #[test]
    fn test_discriminator_update_leaves_generators_untouched() {
        let config = tiny_run_config();
        let model = tiny_model(&config);
        let trainer = Trainer::new(config, Device::Cpu);
        let mut gen_opt = model.gen_optimizer(1e-2, 0.5, 0.999).unwrap();
        let mut disc_opt = model.disc_optimizer(1e-2, 0.5, 0.999).unwrap();

        let real = Tensor::rand([6, 1], (Kind::Float, Device::Cpu)) * 100.0;
        let real_labels = labels_for(3, -1, 6, Device::Cpu).unwrap();
        let gen_labels = fake_labels(3, 2, Device::Cpu).unwrap();
        let z = generator_noise(2, 4, NoiseDistribution::Uniform, Device::Cpu);
        let fake = model.generator.forward_t(&z, true);
        let x_noise = fake.zeros_like();

        let gen_before = snapshot(&model.gen_vs);
        let disc_before = snapshot(&model.disc_vs);
        trainer.discriminator_step(
            &model,
            &real,
            &fake,
            &x_noise,
            &real_labels,
            &gen_labels,
            &mut disc_opt,
        );
        assert!(changed(&model.gen_vs, &gen_before).is_empty());
        assert!(!changed(&model.disc_vs, &disc_before).is_empty());

        let disc_before = snapshot(&model.disc_vs);
        trainer.generator_step(&model, &fake, &x_noise, &real_labels, &mut gen_opt);
        assert!(!changed(&model.gen_vs, &gen_before).is_empty());
        assert!(changed(&model.disc_vs, &disc_before).is_empty());
    }

    #[test]
    fn test_train_step_updates_both_networks() {
        let config = tiny_run_config();
        let model = tiny_model(&config);
        let mut trainer = Trainer::new(config, Device::Cpu);
        let mut gen_opt = model.gen_optimizer(1e-2, 0.5, 0.999).unwrap();
        let mut disc_opt = model.disc_optimizer(1e-2, 0.5, 0.999).unwrap();

        let gen_before = snapshot(&model.gen_vs);
        let disc_before = snapshot(&model.disc_vs);
        let real = Tensor::rand([6, 1], (Kind::Float, Device::Cpu)) * 100.0;
        trainer
            .train_step(&model, &real, 6, &mut gen_opt, &mut disc_opt)
            .unwrap()
            .unwrap();

        assert!(!changed(&model.gen_vs, &gen_before).is_empty());
        assert!(!changed(&model.disc_vs, &disc_before).is_empty());
    }

    #[test]
    fn test_degan_step_produces_finite_losses() {
        let mut config = tiny_run_config();
        config.training.degan = true;
        let model = tiny_model(&config);
        let mut trainer = Trainer::new(config, Device::Cpu);
        let mut gen_opt = model.gen_optimizer(1e-4, 0.5, 0.999).unwrap();
        let mut disc_opt = model.disc_optimizer(1e-4, 0.5, 0.999).unwrap();

        let real = Tensor::rand([6, 1], (Kind::Float, Device::Cpu)) * 100.0;
        let losses = trainer
            .train_step(&model, &real, 6, &mut gen_opt, &mut disc_opt)
            .unwrap()
            .unwrap();
        assert!(losses.d_loss.is_finite());
        assert!(losses.g_loss < 1e-6);
    }

    #[test]
    fn test_instance_noise_decays_during_training() {
        let mut config = tiny_run_config();
        config.training.noise.std = 1.0;
        config.training.noise.decay_factor = 0.5;
        config.training.noise.interval = 1;
        let model = tiny_model(&config);
        let mut trainer = Trainer::new(config, Device::Cpu);
        let mut gen_opt = model.gen_optimizer(1e-4, 0.5, 0.999).unwrap();
        let mut disc_opt = model.disc_optimizer(1e-4, 0.5, 0.999).unwrap();

        let real = Tensor::rand([6, 1], (Kind::Float, Device::Cpu));
        for _ in 0..3 {
            trainer
                .train_step(&model, &real, 6, &mut gen_opt, &mut disc_opt)
                .unwrap();
        }
        assert!((trainer.noise_std() - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_full_training_run_writes_outputs() {
        let out = TempDir::new().unwrap();
        let config = tiny_run_config();
        let model = tiny_model(&config);
        let run = RunDirectory::create(out.path(), &config.run_name()).unwrap();

        // 30 samples in batches of 6 plus a trailing batch of 4
        let data = Tensor::rand([34, 1], (Kind::Float, Device::Cpu)) * 100.0;
        let mut loader = DataLoader::new(data, 6, true, false, Device::Cpu);

        let mut trainer = Trainer::new(config, Device::Cpu);
        let metrics = trainer.train(&model, &mut loader, &run).unwrap().clone();

        assert_eq!(metrics.num_iterations(), 10);
        assert_eq!(metrics.num_epochs(), 2);
        assert!(!metrics.kl_divergences.is_empty());

        assert!(run.losses_file().is_file());
        assert!(run.results_dir().join("0_G0.csv").is_file());
        assert!(run.results_dir().join("9_G2.csv").is_file());
        assert!(run.checkpoints_dir().join("checkpoint_epoch_0001").is_dir());
        assert!(run.checkpoints_dir().join("checkpoint_epoch_0002").is_dir());
    }

    #[test]
    fn test_resume_skips_completed_epochs() {
        let out = TempDir::new().unwrap();
        let config = tiny_run_config();
        let model = tiny_model(&config);
        let run = RunDirectory::create(out.path(), "resumed").unwrap();

        let data = Tensor::rand([30, 1], (Kind::Float, Device::Cpu));
        let mut loader = DataLoader::new(data, 6, false, false, Device::Cpu);

        let mut previous = TrainingMetrics::new();
        for _ in 0..5 {
            previous.record_iteration(1.0, 1.0);
        }

        let mut trainer = Trainer::new(config, Device::Cpu);
        trainer.resume(1, 5, previous);
        let metrics = trainer.train(&model, &mut loader, &run).unwrap();

        assert_eq!(metrics.num_iterations(), 10);
        assert_eq!(trainer.iterations(), 10);
        assert!(!run.checkpoints_dir().join("checkpoint_epoch_0001").exists());
        assert!(run.checkpoints_dir().join("checkpoint_epoch_0002").is_dir());
    }

    #[test]
    fn test_batch_not_divisible_by_generators() {
        let out = TempDir::new().unwrap();
        let config = tiny_run_config();
        let model = MadGan::new(
            ModelConfig {
                num_generators: 4,
                ..config.model_config()
            },
            Device::Cpu,
        )
        .unwrap();
        let run = RunDirectory::create(out.path(), "bad").unwrap();
        let data = Tensor::rand([12, 1], (Kind::Float, Device::Cpu));
        let mut loader = DataLoader::new(data, 6, false, false, Device::Cpu);

        let mut trainer = Trainer::new(config, Device::Cpu);
        assert!(trainer.train(&model, &mut loader, &run).is_err());
    }

    #[test]
    fn test_sample_shape_mismatch_is_rejected() {
        let out = TempDir::new().unwrap();
        let config = tiny_run_config();
        let model = tiny_model(&config);
        let run = RunDirectory::create(out.path(), "shape").unwrap();

        // Two features per sample against a 1-D model
        let data = Tensor::rand([12, 2], (Kind::Float, Device::Cpu));
        let mut loader = DataLoader::new(data, 6, false, false, Device::Cpu);

        let mut trainer = Trainer::new(config, Device::Cpu);
        assert!(matches!(
            trainer.train(&model, &mut loader, &run),
            Err(MadGanError::InvalidInput(_))
        ));
        assert_eq!(trainer.iterations(), 0);
    }
}
