//! DCGAN-style weight initialization

use serde::{Deserialize, Serialize};
use tch::nn::VarStore;

/// Normal init for conv weights and batchnorm scales, constant batchnorm bias
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightInit {
    pub conv_mean: f64,
    pub conv_std: f64,
    pub bn_mean: f64,
    pub bn_std: f64,
    pub bn_bias: f64,
}

impl Default for WeightInit {
    fn default() -> Self {
        Self {
            conv_mean: 0.0,
            conv_std: 0.02,
            bn_mean: 1.0,
            bn_std: 0.02,
            bn_bias: 0.0,
        }
    }
}

impl WeightInit {
    /// Re-initialize every conv / batchnorm parameter of `vs`
    ///
    /// Layers are recognized by name: `conv*` and `bn*`. Returns the number
    /// of tensors touched.
    pub fn apply(&self, vs: &VarStore) -> usize {
        let mut touched = 0;
        tch::no_grad(|| {
            for (name, mut var) in vs.variables() {
                let mut parts = name.rsplit('.');
                let param = parts.next().unwrap_or_default();
                let layer = parts.next().unwrap_or_default();

                if layer.starts_with("conv") && param == "weight" {
                    let _ = var.normal_(self.conv_mean, self.conv_std);
                    touched += 1;
                } else if layer.starts_with("bn") {
                    match param {
                        "weight" => {
                            let _ = var.normal_(self.bn_mean, self.bn_std);
                            touched += 1;
                        }
                        "bias" => {
                            let _ = var.fill_(self.bn_bias);
                            touched += 1;
                        }
                        _ => {}
                    }
                }
            }
        });
        touched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{nn, Device, Kind};

    #[test]
    fn test_init_touches_conv_and_bn_only() {
        let vs = VarStore::new(Device::Cpu);
        let root = vs.root();
        let _conv = nn::conv2d(&root / "conv1", 1, 8, 3, Default::default());
        let _bn = nn::batch_norm2d(&root / "bn1", 8, Default::default());
        let _fc = nn::linear(&root / "fc", 4, 4, Default::default());

        let touched = WeightInit::default().apply(&vs);
        // conv weight, bn weight, bn bias
        assert_eq!(touched, 3);

        let vars = vs.variables();
        let bn_bias = &vars["bn1.bias"];
        assert_eq!(bn_bias.abs().sum(Kind::Float).double_value(&[]), 0.0);

        let bn_weight_mean = vars["bn1.weight"].mean(Kind::Float).double_value(&[]);
        assert!((bn_weight_mean - 1.0).abs() < 0.1);
    }
}
