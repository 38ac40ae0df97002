//! Normalizing operators and the rotation pretext task.

use super::map_image;
use crate::{
    common::*,
    context::GeneratorContext,
    ndimage,
    operator::Operator,
    value::DataRecord,
};

/// Standardize each image by its own statistics, mapped back into 0 to 255.
#[derive(Debug, Clone, Default)]
pub struct SamplewiseStandardize;

impl Operator for SamplewiseStandardize {
    fn execute(
        &self,
        record: DataRecord,
        _rng: &mut StdRng,
        _ctx: &GeneratorContext,
    ) -> Result<DataRecord> {
        map_image(record, |image| Ok(ndimage::standardize(&image)))
    }
}

/// Convert to gray levels, keeping the channel count.
#[derive(Debug, Clone, Default)]
pub struct ToGrayScale;

impl Operator for ToGrayScale {
    fn execute(
        &self,
        record: DataRecord,
        _rng: &mut StdRng,
        _ctx: &GeneratorContext,
    ) -> Result<DataRecord> {
        map_image(record, |image| {
            let dim = image.dim();
            let gray = ndimage::to_grayscale(&image)?;
            let output = gray
                .insert_axis(Axis(2))
                .broadcast(dim)
                .ok_or_else(|| format_err!("cannot broadcast gray levels to {:?}", dim))?
                .to_owned();
            Ok(output)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomBinarizeInit {
    pub threshold_min: R64,
    pub threshold_max: R64,
}

impl Default for RandomBinarizeInit {
    fn default() -> Self {
        Self {
            threshold_min: r64(128.0 - 32.0),
            threshold_max: r64(128.0 + 32.0),
        }
    }
}

impl RandomBinarizeInit {
    pub fn build(self) -> Result<RandomBinarize> {
        let Self {
            threshold_min,
            threshold_max,
        } = self;

        ensure!(
            threshold_min > 0.0 && threshold_max < 255.0,
            "thresholds must be in range (0, 255)"
        );
        ensure!(
            threshold_min < threshold_max,
            "threshold_min must be less than threshold_max"
        );

        Ok(RandomBinarize {
            threshold_min: threshold_min.raw(),
            threshold_max: threshold_max.raw(),
        })
    }
}

/// Binarize with a random threshold, or the middle threshold without augmentation.
#[derive(Debug, Clone)]
pub struct RandomBinarize {
    threshold_min: f64,
    threshold_max: f64,
}

impl Operator for RandomBinarize {
    fn execute(
        &self,
        record: DataRecord,
        rng: &mut StdRng,
        ctx: &GeneratorContext,
    ) -> Result<DataRecord> {
        let threshold = if ctx.data_augmentation() {
            rng.gen_range(self.threshold_min..=self.threshold_max)
        } else {
            (self.threshold_min + self.threshold_max) / 2.0
        };
        map_image(record, |image| Ok(ndimage::binarize(&image, threshold)))
    }
}

/// Rotate by a random multiple of 90 degrees and label the sample with the
/// one-hot rotation index.
///
/// Input labels must be scalar zeros. Runs regardless of the augmentation flag.
#[derive(Debug, Clone, Default)]
pub struct RotationsLearning;

impl Operator for RotationsLearning {
    fn execute(
        &self,
        record: DataRecord,
        rng: &mut StdRng,
        _ctx: &GeneratorContext,
    ) -> Result<DataRecord> {
        let DataRecord { x, y, w } = record;
        let label = y.as_ref().and_then(|y| y.to_scalar());
        ensure!(
            label == Some(0.0),
            "rotations learning expects zero labels, but get {:?}",
            y
        );

        let k = rng.gen_range(0..4);
        let image = ndimage::rot90(&x.into_image()?, k);
        let mut onehot = Array1::<f32>::zeros(4);
        onehot[k] = 1.0;

        Ok(DataRecord {
            x: image.into(),
            y: Some(onehot.into()),
            w,
        })
    }
}
