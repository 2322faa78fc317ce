//! Training-time composition of clean, control and defended passes.

use crate::autograd::{no_grad, Tensor};

use super::classifier::DefendedClassifier;
use super::loss::MultiLevelLoss;

/// Outputs of the optional control pass (adversarial input, defense
/// off).
#[derive(Debug)]
pub struct ControlOutput {
    /// Final logits of the control pass.
    pub logits: Tensor,
    /// Per-level control-vs-clean losses.
    pub losses: Vec<Tensor>,
}

/// Outputs of one composed evaluation.
///
/// `control` is `Some` exactly when the control pass was requested —
/// the struct rendering of the 3-tuple / 5-tuple return.
#[derive(Debug)]
pub struct PipelineOutput {
    /// Final logits of the clean pass.
    pub clean_logits: Tensor,
    /// Final logits of the defended adversarial pass.
    pub defended_logits: Tensor,
    /// Per-level defended-vs-clean losses.
    pub losses: Vec<Tensor>,
    /// Control pass results, when requested.
    pub control: Option<ControlOutput>,
}

/// Orchestrates up to three forward passes through one shared
/// [`DefendedClassifier`]:
///
/// 1. the clean input, defense off — the reference path;
/// 2. optionally the adversarial input, defense off — the control
///    condition, measuring model behavior without the defense;
/// 3. the adversarial input, defense on.
///
/// Each defended (and optionally control) output level is compared
/// against the matching clean level with a [`MultiLevelLoss`].
///
/// The passes share the classifier's weights and run sequentially; the
/// only order-sensitive state between them is the batch-norm running
/// statistics updated in training mode.
#[derive(Debug)]
pub struct TrainingPipeline {
    net: DefendedClassifier,
    loss: MultiLevelLoss,
}

impl TrainingPipeline {
    /// Compose a classifier and a loss into a pipeline.
    #[must_use]
    pub fn new(net: DefendedClassifier, loss: MultiLevelLoss) -> Self {
        Self { net, loss }
    }

    /// The wrapped classifier.
    #[must_use]
    pub fn net(&self) -> &DefendedClassifier {
        &self.net
    }

    /// Mutable access to the wrapped classifier (mode switching).
    pub fn net_mut(&mut self) -> &mut DefendedClassifier {
        &mut self.net
    }

    /// Run the composed evaluation.
    ///
    /// # Arguments
    ///
    /// * `clean` - The unperturbed input batch
    /// * `adversarial` - The perturbed input batch
    /// * `requires_control` - Whether to run the control pass
    /// * `train` - In training mode the control branch stays attached
    ///   to gradient tracking; otherwise it is built under `no_grad`
    ///   and its outputs are detached from creation
    #[must_use]
    pub fn forward(
        &self,
        clean: &Tensor,
        adversarial: &Tensor,
        requires_control: bool,
        train: bool,
    ) -> PipelineOutput {
        let clean_outputs = self.net.forward(clean, false);

        let control = if requires_control {
            let (outputs, losses) = if train {
                let outputs = self.net.forward(adversarial, false);
                let losses = self.loss.forward(&outputs, &clean_outputs);
                (outputs, losses)
            } else {
                no_grad(|| {
                    let outputs = self.net.forward(adversarial, false);
                    let losses = self.loss.forward(&outputs, &clean_outputs);
                    (outputs, losses)
                })
            };
            Some(ControlOutput {
                logits: outputs[2].clone(),
                losses,
            })
        } else {
            None
        };

        let defended_outputs = self.net.forward(adversarial, true);
        let losses = self.loss.forward(&defended_outputs, &clean_outputs);

        PipelineOutput {
            clean_logits: clean_outputs[2].clone(),
            defended_logits: defended_outputs[2].clone(),
            losses,
            control,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defense::{Backbone, DefenseConfig};
    use crate::denoise::PassThrough;
    use crate::nn::{Conv2d, Module};

    struct TinyBackbone {
        conv: Conv2d,
    }

    impl Backbone for TinyBackbone {
        fn features(&self, input: &Tensor) -> Tensor {
            self.conv.forward(input)
        }

        fn feature_channels(&self) -> usize {
            4
        }
    }

    fn pipeline(noise: f32) -> TrainingPipeline {
        let backbone = TinyBackbone {
            conv: Conv2d::with_options(3, 4, (3, 3), (2, 2), (1, 1), false, Some(13)),
        };
        let net = DefendedClassifier::new(
            Box::new(backbone),
            Box::new(PassThrough::new()),
            5,
            DefenseConfig { shrink: 1.0, noise },
            Some(13),
        );
        let loss = MultiLevelLoss::with_options(2.0, 0.0, false).expect("valid");
        TrainingPipeline::new(net, loss)
    }

    fn batch(fill: f32) -> Tensor {
        let data = vec![fill; 2 * 3 * 6 * 6];
        Tensor::new(&data, &[2, 3, 6, 6])
    }

    #[test]
    fn test_without_control() {
        let p = pipeline(0.0);
        let out = p.forward(&batch(0.2), &batch(0.3), false, true);

        assert!(out.control.is_none());
        assert_eq!(out.clean_logits.shape(), &[2, 5]);
        assert_eq!(out.defended_logits.shape(), &[2, 5]);
        assert_eq!(out.losses.len(), 3);
    }

    #[test]
    fn test_with_control() {
        let p = pipeline(0.0);
        let out = p.forward(&batch(0.2), &batch(0.3), true, true);

        let control = out.control.expect("control pass requested");
        assert_eq!(control.logits.shape(), &[2, 5]);
        assert_eq!(control.losses.len(), 3);
    }

    #[test]
    fn test_identical_inputs_zero_loss() {
        // PassThrough purifier, shrink 1, no noise: the defended pass of
        // the same batch must match the clean pass exactly.
        let p = pipeline(0.0);
        let out = p.forward(&batch(0.4), &batch(0.4), true, true);

        for loss in &out.losses {
            assert_eq!(loss.item(), 0.0);
        }
        for loss in &out.control.expect("control").losses {
            assert_eq!(loss.item(), 0.0);
        }
    }

    #[test]
    fn test_perturbed_input_positive_loss() {
        let p = pipeline(0.0);
        let out = p.forward(&batch(0.0), &batch(1.0), false, true);
        assert!(out.losses[0].item() > 0.0);
    }

    #[test]
    fn test_eval_mode_control_detached() {
        let p = pipeline(0.0);
        let out = p.forward(&batch(0.1), &batch(0.2), true, false);

        let control = out.control.expect("control pass requested");
        assert!(!control.logits.requires_grad_enabled());
        assert!(control.logits.is_leaf());
        for loss in &control.losses {
            assert!(!loss.requires_grad_enabled());
        }
    }
}
