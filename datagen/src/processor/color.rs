//! Color, filtering and noise augmentations.

use super::map_image;
use crate::{
    common::*,
    context::GeneratorContext,
    ndimage,
    operator::{check_probability, Operator},
    value::{DataRecord, Value},
};

// blur

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomBlurInit {
    pub probability: R64,
    /// The Gaussian sigma is drawn from `[0, radius)`.
    pub radius: R64,
}

impl Default for RandomBlurInit {
    fn default() -> Self {
        Self {
            probability: r64(1.0),
            radius: r64(0.75),
        }
    }
}

impl RandomBlurInit {
    pub fn build(self) -> Result<RandomBlur> {
        let Self {
            probability,
            radius,
        } = self;
        ensure!(radius >= 0.0, "radius must be non-negative");

        Ok(RandomBlur {
            probability: check_probability(probability)?,
            radius: radius.raw(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RandomBlur {
    probability: f64,
    radius: f64,
}

impl Operator for RandomBlur {
    fn execute(
        &self,
        record: DataRecord,
        rng: &mut StdRng,
        ctx: &GeneratorContext,
    ) -> Result<DataRecord> {
        if !ctx.should_augment(rng, self.probability) {
            return Ok(record);
        }
        let sigma = self.radius * rng.gen::<f64>();
        map_image(record, |image| ndimage::gaussian_blur(&image, sigma))
    }
}

// unsharp mask

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomUnsharpMaskInit {
    pub probability: R64,
    pub sigma: R64,
    pub min_alpha: R64,
    pub max_alpha: R64,
}

impl Default for RandomUnsharpMaskInit {
    fn default() -> Self {
        Self {
            probability: r64(1.0),
            sigma: r64(0.5),
            min_alpha: r64(1.0),
            max_alpha: r64(2.0),
        }
    }
}

impl RandomUnsharpMaskInit {
    pub fn build(self) -> Result<RandomUnsharpMask> {
        let Self {
            probability,
            sigma,
            min_alpha,
            max_alpha,
        } = self;
        ensure!(sigma >= 0.0, "sigma must be non-negative");
        ensure!(
            min_alpha <= max_alpha,
            "min_alpha must not exceed max_alpha"
        );

        Ok(RandomUnsharpMask {
            probability: check_probability(probability)?,
            sigma: sigma.raw(),
            min_alpha: min_alpha.raw(),
            max_alpha: max_alpha.raw(),
        })
    }
}

/// Sharpen with a random strength.
#[derive(Debug, Clone)]
pub struct RandomUnsharpMask {
    probability: f64,
    sigma: f64,
    min_alpha: f64,
    max_alpha: f64,
}

impl Operator for RandomUnsharpMask {
    fn execute(
        &self,
        record: DataRecord,
        rng: &mut StdRng,
        ctx: &GeneratorContext,
    ) -> Result<DataRecord> {
        if !ctx.should_augment(rng, self.probability) {
            return Ok(record);
        }
        let alpha = rng.gen_range(self.min_alpha..=self.max_alpha);
        map_image(record, |image| ndimage::unsharp_mask(&image, self.sigma, alpha))
    }
}

// median

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomMedianInit {
    pub probability: R64,
    /// Candidate window sizes, each odd.
    pub sizes: Vec<usize>,
}

impl Default for RandomMedianInit {
    fn default() -> Self {
        Self {
            probability: r64(1.0),
            sizes: vec![3],
        }
    }
}

impl RandomMedianInit {
    pub fn build(self) -> Result<RandomMedian> {
        let Self { probability, sizes } = self;
        ensure!(!sizes.is_empty(), "sizes must not be empty");
        ensure!(
            sizes.iter().all(|size| size % 2 == 1),
            "median window sizes must be odd, but get {:?}",
            sizes
        );

        Ok(RandomMedian {
            probability: check_probability(probability)?,
            sizes,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RandomMedian {
    probability: f64,
    sizes: Vec<usize>,
}

impl Operator for RandomMedian {
    fn execute(
        &self,
        record: DataRecord,
        rng: &mut StdRng,
        ctx: &GeneratorContext,
    ) -> Result<DataRecord> {
        if !ctx.should_augment(rng, self.probability) {
            return Ok(record);
        }
        let size = self.sizes[rng.gen_range(0..self.sizes.len())];
        map_image(record, |image| ndimage::median(&image, size))
    }
}

// noise

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct GaussianNoiseInit {
    pub probability: R64,
    /// The noise standard deviation.
    pub scale: R64,
}

impl Default for GaussianNoiseInit {
    fn default() -> Self {
        Self {
            probability: r64(1.0),
            scale: r64(5.0),
        }
    }
}

impl GaussianNoiseInit {
    pub fn build(self) -> Result<GaussianNoise> {
        let Self { probability, scale } = self;
        ensure!(scale >= 0.0, "scale must be non-negative");

        Ok(GaussianNoise {
            probability: check_probability(probability)?,
            scale: scale.raw(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct GaussianNoise {
    probability: f64,
    scale: f64,
}

impl Operator for GaussianNoise {
    fn execute(
        &self,
        record: DataRecord,
        rng: &mut StdRng,
        ctx: &GeneratorContext,
    ) -> Result<DataRecord> {
        if !ctx.should_augment(rng, self.probability) {
            return Ok(record);
        }
        map_image(record, |image| {
            ndimage::gaussian_noise(&image, rng, self.scale)
        })
    }
}

// brightness

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomBrightnessInit {
    pub probability: R64,
    /// The offset is drawn from `[-shift, shift]`.
    pub shift: R64,
}

impl Default for RandomBrightnessInit {
    fn default() -> Self {
        Self {
            probability: r64(1.0),
            shift: r64(32.0),
        }
    }
}

impl RandomBrightnessInit {
    pub fn build(self) -> Result<RandomBrightness> {
        let Self { probability, shift } = self;
        ensure!(shift >= 0.0, "shift must be non-negative");

        Ok(RandomBrightness {
            probability: check_probability(probability)?,
            shift: shift.raw(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RandomBrightness {
    probability: f64,
    shift: f64,
}

impl Operator for RandomBrightness {
    fn execute(
        &self,
        record: DataRecord,
        rng: &mut StdRng,
        ctx: &GeneratorContext,
    ) -> Result<DataRecord> {
        if !ctx.should_augment(rng, self.probability) {
            return Ok(record);
        }
        let beta = rng.gen_range(-self.shift..=self.shift);
        map_image(record, |image| Ok(ndimage::brightness(&image, beta)))
    }
}

// contrast and saturation

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomContrastInit {
    pub probability: R64,
    /// The factor is drawn from `[1 - var, 1 + var]`.
    pub var: R64,
}

impl Default for RandomContrastInit {
    fn default() -> Self {
        Self {
            probability: r64(1.0),
            var: r64(0.25),
        }
    }
}

impl RandomContrastInit {
    pub fn build(self) -> Result<RandomContrast> {
        let Self { probability, var } = self;
        ensure!(
            (0.0..=1.0).contains(&var.raw()),
            "var must be in range [0, 1], but get {}",
            var
        );

        Ok(RandomContrast {
            probability: check_probability(probability)?,
            var: var.raw(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RandomContrast {
    probability: f64,
    var: f64,
}

impl Operator for RandomContrast {
    fn execute(
        &self,
        record: DataRecord,
        rng: &mut StdRng,
        ctx: &GeneratorContext,
    ) -> Result<DataRecord> {
        if !ctx.should_augment(rng, self.probability) {
            return Ok(record);
        }
        let alpha = rng.gen_range((1.0 - self.var)..=(1.0 + self.var));
        map_image(record, |image| Ok(ndimage::contrast(&image, alpha)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomSaturationInit {
    pub probability: R64,
    /// The factor is drawn from `[1 - var, 1 + var]`.
    pub var: R64,
}

impl Default for RandomSaturationInit {
    fn default() -> Self {
        Self {
            probability: r64(1.0),
            var: r64(0.5),
        }
    }
}

impl RandomSaturationInit {
    pub fn build(self) -> Result<RandomSaturation> {
        let Self { probability, var } = self;
        ensure!(
            (0.0..=1.0).contains(&var.raw()),
            "var must be in range [0, 1], but get {}",
            var
        );

        Ok(RandomSaturation {
            probability: check_probability(probability)?,
            var: var.raw(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RandomSaturation {
    probability: f64,
    var: f64,
}

impl Operator for RandomSaturation {
    fn execute(
        &self,
        record: DataRecord,
        rng: &mut StdRng,
        ctx: &GeneratorContext,
    ) -> Result<DataRecord> {
        if !ctx.should_augment(rng, self.probability) {
            return Ok(record);
        }
        let alpha = rng.gen_range((1.0 - self.var)..=(1.0 + self.var));
        map_image(record, |image| ndimage::saturation(&image, alpha))
    }
}

// hue

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomHueInit {
    pub probability: R64,
    /// Per-channel scales are drawn from `[1 - var, 1 + var]`.
    pub var: R64,
    /// Per-channel offsets are drawn from `[-shift, shift]`.
    pub shift: R64,
}

impl Default for RandomHueInit {
    fn default() -> Self {
        Self {
            probability: r64(1.0),
            var: r64(1.0 / 16.0),
            shift: r64(8.0),
        }
    }
}

impl RandomHueInit {
    pub fn build(self) -> Result<RandomHue> {
        let Self {
            probability,
            var,
            shift,
        } = self;
        ensure!(
            (0.0..1.0).contains(&var.raw()),
            "var must be in range [0, 1), but get {}",
            var
        );
        ensure!(shift >= 0.0, "shift must be non-negative");

        Ok(RandomHue {
            probability: check_probability(probability)?,
            var: var.raw(),
            shift: shift.raw(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RandomHue {
    probability: f64,
    var: f64,
    shift: f64,
}

impl Operator for RandomHue {
    fn execute(
        &self,
        record: DataRecord,
        rng: &mut StdRng,
        ctx: &GeneratorContext,
    ) -> Result<DataRecord> {
        if !ctx.should_augment(rng, self.probability) {
            return Ok(record);
        }
        let mut draw = |radius: f64, center: f64| -> [f64; 3] {
            [(); 3].map(|_| rng.gen_range((center - radius)..=(center + radius)))
        };
        let alpha = draw(self.var, 1.0);
        let beta = draw(self.shift, 0.0);
        map_image(record, |image| ndimage::hue_lite(&image, alpha, beta))
    }
}

// composition

/// Apply a group of augmentors in a random order.
#[derive(Debug, Clone)]
pub struct RandomAugmentors {
    augmentors: Vec<Arc<dyn Operator>>,
    probability: f64,
    clip_rgb: bool,
}

impl RandomAugmentors {
    /// Values are clamped into the 0 to 255 range afterwards if `clip_rgb` is set.
    pub fn new(
        augmentors: Vec<Arc<dyn Operator>>,
        probability: R64,
        clip_rgb: bool,
    ) -> Result<Self> {
        Ok(Self {
            augmentors,
            probability: check_probability(probability)?,
            clip_rgb,
        })
    }

    /// The color augmentors, each gated by `probability`.
    pub fn color(probability: R64) -> Result<Self> {
        let augmentors: Vec<Arc<dyn Operator>> = vec![
            Arc::new(
                RandomBlurInit {
                    probability,
                    ..Default::default()
                }
                .build()?,
            ),
            Arc::new(
                RandomUnsharpMaskInit {
                    probability,
                    ..Default::default()
                }
                .build()?,
            ),
            Arc::new(
                GaussianNoiseInit {
                    probability,
                    ..Default::default()
                }
                .build()?,
            ),
            Arc::new(
                RandomSaturationInit {
                    probability,
                    ..Default::default()
                }
                .build()?,
            ),
            Arc::new(
                RandomBrightnessInit {
                    probability,
                    ..Default::default()
                }
                .build()?,
            ),
            Arc::new(
                RandomContrastInit {
                    probability,
                    ..Default::default()
                }
                .build()?,
            ),
            Arc::new(
                RandomHueInit {
                    probability,
                    ..Default::default()
                }
                .build()?,
            ),
        ];

        Self::new(augmentors, r64(1.0), true)
    }

    pub fn len(&self) -> usize {
        self.augmentors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.augmentors.is_empty()
    }
}

fn clip_rgb(value: &mut Value) {
    match value {
        Value::Array(array) => array.mapv_inplace(|val| val.clamp(0.0, 255.0)),
        Value::List(values) => values.iter_mut().for_each(clip_rgb),
        Value::Path(_) | Value::Objects(_) => {}
    }
}

impl Operator for RandomAugmentors {
    fn execute(
        &self,
        record: DataRecord,
        rng: &mut StdRng,
        ctx: &GeneratorContext,
    ) -> Result<DataRecord> {
        if !ctx.should_augment(rng, self.probability) {
            return Ok(record);
        }

        let mut order: Vec<usize> = (0..self.augmentors.len()).collect();
        order.shuffle(rng);

        let mut record = order.into_iter().try_fold(record, |record, index| {
            let augmentor = &self.augmentors[index];
            augmentor
                .execute(record, rng, ctx)
                .with_context(|| format!("augmentor '{}' failed", augmentor.name()))
        })?;

        if self.clip_rgb {
            clip_rgb(&mut record.x);
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_record() -> DataRecord {
        DataRecord::new(Array3::from_elem((8, 8, 3), 128.0f32))
    }

    #[test]
    fn color_augmentors_stay_in_range() {
        let ctx = GeneratorContext::standalone(true);
        let op = RandomAugmentors::color(r64(1.0)).unwrap();
        assert_eq!(op.len(), 7);

        (0..10).for_each(|seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let output = op.execute(gray_record(), &mut rng, &ctx).unwrap();
            let x = output.x.into_image().unwrap();
            assert_eq!(x.dim(), (8, 8, 3));
            assert!(x.iter().all(|&val| (0.0..=255.0).contains(&val)));
        });
    }

    #[test]
    fn color_augmentors_are_deterministic() {
        let ctx = GeneratorContext::standalone(true);
        let op = RandomAugmentors::color(r64(0.5)).unwrap();

        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            op.execute(gray_record(), &mut rng, &ctx).unwrap()
        };
        assert_eq!(run(7), run(7));
    }

    #[test]
    fn brightness_shift_bounds() {
        let ctx = GeneratorContext::standalone(true);
        let op = RandomBrightnessInit {
            probability: r64(1.0),
            shift: r64(10.0),
        }
        .build()
        .unwrap();

        let mut rng = StdRng::seed_from_u64(5);
        let output = op.execute(gray_record(), &mut rng, &ctx).unwrap();
        let x = output.x.into_image().unwrap();
        let first = x[[0, 0, 0]];
        assert!((118.0..=138.0).contains(&first));
        assert!(x.iter().all(|&val| val == first));
    }

    #[test]
    fn invalid_parameters() {
        assert!(RandomMedianInit {
            probability: r64(1.0),
            sizes: vec![2],
        }
        .build()
        .is_err());
        assert!(RandomUnsharpMaskInit {
            min_alpha: r64(3.0),
            ..Default::default()
        }
        .build()
        .is_err());
        assert!(RandomHueInit {
            probability: r64(1.5),
            ..Default::default()
        }
        .build()
        .is_err());
    }
}
