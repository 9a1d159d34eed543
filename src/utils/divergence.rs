//! Histogram-based KL divergence for 1-D samples
//!
//! A training diagnostic only: it compares how the generated samples cover
//! the modes of the real data.

use ndarray::Array1;

use crate::error::{MadGanError, Result};

/// Equal-width histogram over `[min, max]`
///
/// Values outside the range are ignored; `max` itself lands in the last bin.
pub fn histogram(values: &[f64], bins: usize, min: f64, max: f64) -> Array1<f64> {
    let mut counts = Array1::<f64>::zeros(bins);
    if bins == 0 || max <= min {
        return counts;
    }

    let width = (max - min) / bins as f64;
    for &v in values {
        if !(min..=max).contains(&v) {
            continue;
        }
        let idx = (((v - min) / width) as usize).min(bins - 1);
        counts[idx] += 1.0;
    }
    counts
}

/// Upper bound on histogram bins
pub const MAX_BINS: usize = 10_000_000;

/// Number of bins for a domain and bin size
///
/// At most [`MAX_BINS`].
pub fn num_bins(min: f64, max: f64, bin_size: f64) -> Result<usize> {
    if !(bin_size > 0.0) {
        return Err(MadGanError::InvalidInput(format!(
            "bin_size has to be positive, got {}",
            bin_size
        )));
    }
    if !(max > min) {
        return Err(MadGanError::InvalidInput(format!(
            "empty domain [{}, {})",
            min, max
        )));
    }
    let bins = ((max - min) / bin_size).round();
    if !bins.is_finite() || bins > MAX_BINS as f64 {
        return Err(MadGanError::InvalidInput(format!(
            "bin_size {} splits [{}, {}) into too many bins (max {})",
            bin_size, min, max, MAX_BINS
        )));
    }
    Ok((bins as usize).max(1))
}

/// Integer-aligned `[floor(min), ceil(max)]` of the values
///
/// `None` for empty input, non-finite values or a single repeated value.
pub fn value_range(values: &[f64]) -> Option<(f64, f64)> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (lo, hi) = (min.floor(), max.ceil());
    if lo.is_finite() && hi.is_finite() && hi > lo {
        Some((lo, hi))
    } else {
        None
    }
}

/// Per-bin cross entropy minus self entropy, `r * ln(r / p)`
///
/// Both histograms are normalized by their own sample counts. Bins with no
/// real mass contribute zero; real mass in a bin without generated samples
/// contributes infinity.
pub fn kl_divergence_bins(
    real: &[f64],
    generated: &[f64],
    min: f64,
    max: f64,
    bin_size: f64,
) -> Result<Array1<f64>> {
    if real.is_empty() || generated.is_empty() {
        return Err(MadGanError::InvalidInput(
            "KL divergence needs non-empty real and generated samples".to_string(),
        ));
    }

    let bins = num_bins(min, max, bin_size)?;
    let real_bins = histogram(real, bins, min, max) / real.len() as f64;
    let pred_bins = histogram(generated, bins, min, max) / generated.len() as f64;

    Ok(ndarray::Zip::from(&real_bins)
        .and(&pred_bins)
        .map_collect(|&r, &p| if r > 0.0 { r * (r / p).ln() } else { 0.0 }))
}

/// Total KL divergence over all bins
pub fn kl_divergence(
    real: &[f64],
    generated: &[f64],
    min: f64,
    max: f64,
    bin_size: f64,
) -> Result<f64> {
    Ok(kl_divergence_bins(real, generated, min, max, bin_size)?.sum())
}
