//! Configuration for the denoising pyramid.

use serde::{Deserialize, Serialize};

use crate::error::{DepurarError, Result};

/// Residual unit variant used throughout a pyramid.
///
/// A closed tag rather than open polymorphism: the two variants differ
/// in structure and in the channel expansion they apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitKind {
    /// Single 3×3 conv + norm + relu per unit, expansion 1.
    Plain,
    /// 1×1 / 3×3 / 1×1 bottleneck with shortcut, expansion 4.
    Bottleneck,
}

impl UnitKind {
    /// Multiplier from a unit's nominal width to its true output
    /// channel count.
    #[must_use]
    pub fn expansion(self) -> usize {
        match self {
            UnitKind::Plain => 1,
            UnitKind::Bottleneck => 4,
        }
    }
}

/// Per-scale configuration of the denoising encoder-decoder.
///
/// The forward (downsampling) pyramid has one entry per scale in
/// `fwd_channels`/`fwd_blocks`. The backward (upsampling) pyramid has
/// exactly one entry fewer in `back_channels`/`back_blocks`: the
/// deepest forward output seeds the upsampling pass directly instead of
/// getting its own backward stage. A single-scale pyramid therefore has
/// empty backward arrays and degenerates to a plain residual stack.
///
/// # Example
///
/// ```
/// use depurar::denoise::{PyramidConfig, UnitKind};
///
/// let config = PyramidConfig {
///     input_size: (224, 224),
///     unit: UnitKind::Bottleneck,
///     fwd_channels: vec![32, 64, 128],
///     fwd_blocks: vec![2, 3, 3],
///     back_channels: vec![64, 32],
///     back_blocks: vec![2, 2],
/// };
/// assert!(config.validate().is_ok());
/// assert_eq!(config.scales(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PyramidConfig {
    /// Input spatial size (height, width).
    pub input_size: (usize, usize),
    /// Residual unit variant for every stage.
    pub unit: UnitKind,
    /// Nominal output width per forward scale.
    pub fwd_channels: Vec<usize>,
    /// Number of residual units per forward scale.
    pub fwd_blocks: Vec<usize>,
    /// Nominal output width per backward scale (length `scales - 1`).
    pub back_channels: Vec<usize>,
    /// Number of residual units per backward scale (length `scales - 1`).
    pub back_blocks: Vec<usize>,
}

impl PyramidConfig {
    /// Number of resolution scales in the pyramid.
    #[must_use]
    pub fn scales(&self) -> usize {
        self.fwd_blocks.len()
    }

    /// Check the cross-array invariants.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the parallel arrays disagree
    /// in length, when the backward pyramid is not exactly one level
    /// shorter than the forward pyramid, or when any count, width or
    /// input dimension is zero.
    pub fn validate(&self) -> Result<()> {
        let scales = self.scales();

        if scales == 0 {
            return Err(DepurarError::InvalidHyperparameter {
                param: "fwd_blocks".to_string(),
                value: "[]".to_string(),
                constraint: "at least one forward scale".to_string(),
            });
        }

        if self.fwd_channels.len() != scales {
            return Err(DepurarError::DimensionMismatch {
                expected: format!("{scales} forward channel entries"),
                actual: self.fwd_channels.len().to_string(),
            });
        }

        if self.back_channels.len() != scales - 1 || self.back_blocks.len() != scales - 1 {
            return Err(DepurarError::MismatchedPyramid {
                forward_len: scales,
                backward_len: self.back_channels.len().max(self.back_blocks.len()),
            });
        }

        let (h, w) = self.input_size;
        if h == 0 || w == 0 {
            return Err(DepurarError::InvalidHyperparameter {
                param: "input_size".to_string(),
                value: format!("({h}, {w})"),
                constraint: "nonzero height and width".to_string(),
            });
        }

        for (name, values) in [
            ("fwd_channels", &self.fwd_channels),
            ("fwd_blocks", &self.fwd_blocks),
            ("back_channels", &self.back_channels),
            ("back_blocks", &self.back_blocks),
        ] {
            if values.iter().any(|&v| v == 0) {
                return Err(DepurarError::InvalidHyperparameter {
                    param: name.to_string(),
                    value: format!("{values:?}"),
                    constraint: "all entries nonzero".to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> PyramidConfig {
        PyramidConfig {
            input_size: (32, 32),
            unit: UnitKind::Bottleneck,
            fwd_channels: vec![4, 8],
            fwd_blocks: vec![1, 1],
            back_channels: vec![4],
            back_blocks: vec![1],
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_expansion_per_kind() {
        assert_eq!(UnitKind::Plain.expansion(), 1);
        assert_eq!(UnitKind::Bottleneck.expansion(), 4);
    }

    #[test]
    fn test_empty_forward_rejected() {
        let mut config = valid_config();
        config.fwd_blocks.clear();
        config.fwd_channels.clear();
        config.back_channels.clear();
        config.back_blocks.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backward_length_mismatch_rejected() {
        let mut config = valid_config();
        config.back_channels = vec![4, 8];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pyramid"));
    }

    #[test]
    fn test_zero_channel_rejected() {
        let mut config = valid_config();
        config.fwd_channels[0] = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_input_size_rejected() {
        let mut config = valid_config();
        config.input_size = (0, 32);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_single_scale_is_valid() {
        let config = PyramidConfig {
            input_size: (16, 16),
            unit: UnitKind::Plain,
            fwd_channels: vec![8],
            fwd_blocks: vec![2],
            back_channels: vec![],
            back_blocks: vec![],
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.scales(), 1);
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = valid_config();
        let json = serde_json::to_string(&config).expect("serialize");
        let back: PyramidConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(config, back);
    }
}
