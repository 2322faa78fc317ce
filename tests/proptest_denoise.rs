//! Property tests for the denoising pyramid and the fidelity loss.

use proptest::prelude::*;

use depurar::autograd::Tensor;
use depurar::defense::FidelityLoss;
use depurar::denoise::{Denoiser, PyramidConfig, UnitKind};
use depurar::nn::Module;

fn config_for(h: usize, w: usize, scales: usize) -> PyramidConfig {
    PyramidConfig {
        input_size: (h, w),
        unit: UnitKind::Plain,
        fwd_channels: vec![2; scales],
        fwd_blocks: vec![1; scales],
        back_channels: vec![2; scales.saturating_sub(1)],
        back_blocks: vec![1; scales.saturating_sub(1)],
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Output shape equals input shape for any valid size and depth,
    /// odd sizes included.
    #[test]
    fn denoiser_preserves_shape(h in 4_usize..24, w in 4_usize..24, scales in 1_usize..4) {
        let denoiser = Denoiser::new(&config_for(h, w, scales), Some(5))
            .expect("generated config is valid");
        let x = Tensor::zeros(&[1, 3, h, w]);
        let y = denoiser.forward(&x);
        prop_assert_eq!(y.shape(), x.shape());
    }

    /// The mined element count is exactly floor(numel * fraction) and
    /// monotone in the fraction.
    #[test]
    fn mined_count_is_floor_and_monotone(
        numel in 1_usize..10_000,
        f1 in 0.01_f32..1.0,
        f2 in 0.01_f32..1.0,
    ) {
        let (lo, hi) = if f1 <= f2 { (f1, f2) } else { (f2, f1) };
        let loss_lo = FidelityLoss::with_options(2.0, lo, false).expect("valid");
        let loss_hi = FidelityLoss::with_options(2.0, hi, false).expect("valid");

        prop_assert_eq!(loss_lo.mined_count(numel), (numel as f32 * lo) as usize);
        prop_assert!(loss_lo.mined_count(numel) <= loss_hi.mined_count(numel));
    }

    /// The loss of a tensor against itself is identically zero,
    /// whatever the exponent.
    #[test]
    fn self_loss_is_zero(values in proptest::collection::vec(-10.0_f32..10.0, 1..64), n in 1_u8..4) {
        let loss = FidelityLoss::new(f32::from(n)).expect("valid");
        let x = Tensor::from_slice(&values);
        let y = Tensor::from_slice(&values);
        prop_assert_eq!(loss.forward(&x, &y).item(), 0.0);
    }
}
