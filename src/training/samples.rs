//! Per-generator sample output
//!
//! Image generators are written as PNG grids, vector generators as one-column
//! CSV files. Either way each generator gets its own file so mode coverage
//! can be compared generator by generator.

use std::path::{Path, PathBuf};

use tch::{Device, Tensor};

use crate::error::{MadGanError, Result};
use crate::model::{MadGan, SampleKind};
use crate::utils::save_grid;

/// Generate from `noise` and write one file per generator into `dir`
///
/// Files are named `{tag}_G{g}.png` or `{tag}_G{g}.csv`.
pub fn write_generator_samples(
    model: &MadGan,
    noise: &Tensor,
    dir: impl AsRef<Path>,
    tag: &str,
) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();

    let mut written = Vec::with_capacity(model.num_generators());
    for g in 0..model.num_generators() {
        let chunk = tch::no_grad(|| model.generator.forward_one(g, noise, false))
            .to_device(Device::Cpu);
        let path = match model.config().sample {
            SampleKind::Image { .. } => {
                let path = dir.join(format!("{}_G{}.png", tag, g));
                save_grid(&chunk, &path, 8)?;
                path
            }
            SampleKind::Vector { .. } => {
                let path = dir.join(format!("{}_G{}.csv", tag, g));
                write_values_csv(&tensor_values(&chunk)?, &path)?;
                path
            }
        };
        written.push(path);
    }

    Ok(written)
}

/// Flatten a tensor into f64 values
pub fn tensor_values(samples: &Tensor) -> Result<Vec<f64>> {
    let flat = samples
        .to_device(Device::Cpu)
        .to_kind(tch::Kind::Double)
        .reshape([-1]);
    Ok(Vec::<f64>::try_from(&flat)?)
}

/// Write values as a single `value` column
pub fn write_values_csv(values: &[f64], path: impl AsRef<Path>) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["value"])?;
    for v in values {
        writer.write_record([v.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Read the first column of a CSV file with a header row
pub fn read_values_csv(path: impl AsRef<Path>) -> Result<Vec<f64>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut values = Vec::new();
    for result in reader.records() {
        let record = result?;
        let value = record
            .get(0)
            .ok_or_else(|| MadGanError::InvalidInput("empty CSV row".to_string()))?;
        values.push(value.trim().parse()?);
    }
    Ok(values)
}
