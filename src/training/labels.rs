//! Class labels for the (k + 1)-way discriminator
//!
//! Generators are addressed by index `0..k`. Real data uses address `-1`
//! on the wire and class index `k` inside the discriminator.

use tch::{Device, Kind, Tensor};

use crate::error::{MadGanError, Result};

/// Address of a sample origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorAddress {
    /// Sample drawn from the dataset
    Real,
    /// Sample produced by generator `g`
    Generator(usize),
}

impl GeneratorAddress {
    /// Validate a raw address against `[-1, num_generators - 1]`
    pub fn from_raw(address: i64, num_generators: usize) -> Result<Self> {
        let max_address = num_generators as i64 - 1;
        match address {
            -1 => Ok(Self::Real),
            a if (0..=max_address).contains(&a) => Ok(Self::Generator(a as usize)),
            _ => Err(MadGanError::InvalidGeneratorAddress {
                address,
                max_address,
            }),
        }
    }

    /// Class index used by the discriminator output
    pub fn class_index(&self, num_generators: usize) -> i64 {
        match self {
            Self::Real => num_generators as i64,
            Self::Generator(g) => *g as i64,
        }
    }
}

/// Constant label vector for a batch from a single origin
///
/// `gen_address` must be in `[-1, num_generators - 1]`; `-1` yields the
/// "real" class `num_generators`.
pub fn labels_for(
    num_generators: usize,
    gen_address: i64,
    batch_size: i64,
    device: Device,
) -> Result<Tensor> {
    let address = GeneratorAddress::from_raw(gen_address, num_generators)?;
    Ok(Tensor::full(
        [batch_size],
        address.class_index(num_generators),
        (Kind::Int64, device),
    ))
}

/// Labels for a fake batch laid out generator by generator
pub fn fake_labels(num_generators: usize, per_generator: i64, device: Device) -> Result<Tensor> {
    let parts = (0..num_generators as i64)
        .map(|g| labels_for(num_generators, g, per_generator, device))
        .collect::<Result<Vec<_>>>()?;
    Ok(Tensor::cat(&parts, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_vec(t: &Tensor) -> Vec<i64> {
        Vec::<i64>::try_from(t).unwrap()
    }

    #[test]
    fn test_real_labels_use_last_class() {
        let labels = labels_for(3, -1, 5, Device::Cpu).unwrap();
        assert_eq!(labels.size(), vec![5]);
        assert_eq!(labels.kind(), Kind::Int64);
        assert_eq!(to_vec(&labels), vec![3; 5]);
    }

    #[test]
    fn test_generator_labels_are_constant() {
        let labels = labels_for(4, 2, 7, Device::Cpu).unwrap();
        assert_eq!(to_vec(&labels), vec![2; 7]);
    }

    #[test]
    fn test_rejects_out_of_range_addresses() {
        assert!(labels_for(3, -2, 4, Device::Cpu).is_err());
        assert!(labels_for(3, 3, 4, Device::Cpu).is_err());
        assert!(labels_for(1, 1, 4, Device::Cpu).is_err());

        let err = GeneratorAddress::from_raw(5, 3).unwrap_err();
        assert!(err.to_string().contains("[-1,2]"));
    }

    #[test]
    fn test_fake_labels_are_grouped_by_generator() {
        let labels = fake_labels(3, 2, Device::Cpu).unwrap();
        assert_eq!(to_vec(&labels), vec![0, 0, 1, 1, 2, 2]);
    }

    #[test]
    fn test_class_index() {
        assert_eq!(GeneratorAddress::Real.class_index(5), 5);
        assert_eq!(GeneratorAddress::Generator(0).class_index(5), 0);
        assert_eq!(GeneratorAddress::from_raw(-1, 2).unwrap(), GeneratorAddress::Real);
    }
}
