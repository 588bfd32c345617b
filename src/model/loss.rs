/// The distance objective.
///
/// Per sample, `d` is the squared Euclidean distance between prediction and
/// target in normalized coordinates (no square root is taken). The penalty
/// has two regimes around `d = 0.025`:
///
/// - `d < 0.025` (strictly): `0.2 * d`, a shallow slope that lets the
///   optimizer settle precisely onto the target;
/// - otherwise: `5 * d + 1`, a steep slope that makes any miss expensive.
///
/// The jump at the threshold (0.005 below it, 1.125 at it) and the strict
/// `<` are part of the trained behavior; keep both.
use burn::prelude::*;

/// Squared-distance threshold separating the two penalty regimes.
pub const NEAR_THRESHOLD: f64 = 0.025;
const NEAR_SLOPE: f64 = 0.2;
const FAR_SLOPE: f64 = 5.0;
const FAR_OFFSET: f64 = 1.0;

/// A sample whose penalty is under this counts as "correct" in reports.
/// Reporting only; gradients never see it.
pub const CORRECT_PENALTY: f32 = 1.0;

#[derive(Clone, Debug, Default)]
pub struct DistanceLoss;

impl DistanceLoss {
    pub fn new() -> Self {
        Self
    }

    /// Per-sample penalties; `output` and `target` are `(batch, 2)`,
    /// the result is `[batch]`. A shape mismatch is a caller bug.
    pub fn penalties<B: Backend>(
        &self,
        output: Tensor<B, 2>,
        target: Tensor<B, 2>,
    ) -> Tensor<B, 1> {
        assert_eq!(
            output.dims(),
            target.dims(),
            "output and target batches must have identical shapes"
        );

        let diff = output - target;
        let distance: Tensor<B, 1> = (diff.clone() * diff).sum_dim(1).squeeze(1);
        apply_regimes(distance)
    }

    /// Mean penalty over the batch.
    pub fn forward<B: Backend>(&self, output: Tensor<B, 2>, target: Tensor<B, 2>) -> Tensor<B, 1> {
        self.penalties(output, target).mean()
    }
}

fn apply_regimes<B: Backend>(distance: Tensor<B, 1>) -> Tensor<B, 1> {
    let near = distance.clone().mul_scalar(NEAR_SLOPE);
    let far = distance.clone().mul_scalar(FAR_SLOPE).add_scalar(FAR_OFFSET);
    far.mask_where(distance.lower_elem(NEAR_THRESHOLD), near)
}

/// How many penalties fall under [`CORRECT_PENALTY`].
pub fn correct_count(penalties: &[f32]) -> usize {
    penalties.iter().filter(|&&p| p < CORRECT_PENALTY).count()
}
