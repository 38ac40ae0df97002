//! Geometric operators. The ones moving pixels also remap object boxes.

use super::{map_objects, ratio_rect, unit_rect};
use crate::{
    common::*,
    context::GeneratorContext,
    ndimage::{self, PaddingMode},
    operator::{check_probability, Operator},
    value::DataRecord,
};
use bbox::Transform;

// resize

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResizeInit {
    pub height: usize,
    pub width: usize,
    /// Keep the aspect ratio and pad the rest with `same` or `zero` padding.
    #[serde(default)]
    pub padding: Option<PaddingMode>,
}

impl ResizeInit {
    pub fn build(self) -> Result<Resize> {
        let Self {
            height,
            width,
            padding,
        } = self;

        ensure!(
            height > 0 && width > 0,
            "the resize target {}x{} must be positive",
            height,
            width
        );
        ensure!(
            matches!(padding, None | Some(PaddingMode::Same | PaddingMode::Zero)),
            "resize padding must be 'same' or 'zero', but get {:?}",
            padding
        );

        Ok(Resize {
            height,
            width,
            padding,
        })
    }
}

/// Resize the image, optionally keeping the aspect ratio.
#[derive(Debug, Clone)]
pub struct Resize {
    height: usize,
    width: usize,
    padding: Option<PaddingMode>,
}

impl Operator for Resize {
    fn execute(
        &self,
        record: DataRecord,
        rng: &mut StdRng,
        _ctx: &GeneratorContext,
    ) -> Result<DataRecord> {
        let Self {
            height,
            width,
            padding,
        } = *self;
        let DataRecord { x, y, w } = record;
        let image = x.into_image()?;

        let (image, y) = match padding {
            None => (ndimage::resize(&image, height, width)?, y),
            Some(mode) => {
                let (orig_h, orig_w, _) = image.dim();
                let [top, left, resized_h, resized_w] =
                    ndimage::letterbox_layout([orig_h, orig_w], [height, width]);
                let content = ratio_rect([top, left, resized_h, resized_w], [height, width]);
                let transform = Transform::from_rects(&unit_rect(), &content);

                let image = ndimage::resize_letterbox(&image, height, width, mode, rng)?;
                let y = map_objects(y, |objects| objects.transform(&transform));
                (image, y)
            }
        };

        Ok(DataRecord {
            x: image.into(),
            y,
            w,
        })
    }
}

// padding

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomPaddingInit {
    pub probability: R64,
    /// The padded size is `ceil(size × (1 + padding_rate))`.
    pub padding_rate: R64,
}

impl Default for RandomPaddingInit {
    fn default() -> Self {
        Self {
            probability: r64(1.0),
            padding_rate: r64(0.25),
        }
    }
}

impl RandomPaddingInit {
    pub fn build(self) -> Result<RandomPadding> {
        let Self {
            probability,
            padding_rate,
        } = self;
        ensure!(padding_rate >= 0.0, "padding_rate must be non-negative");

        Ok(RandomPadding {
            probability: check_probability(probability)?,
            padding_rate: padding_rate.raw(),
        })
    }
}

/// Pad to a fixed larger size with a randomly chosen padding mode.
#[derive(Debug, Clone)]
pub struct RandomPadding {
    probability: f64,
    padding_rate: f64,
}

impl Operator for RandomPadding {
    fn execute(
        &self,
        record: DataRecord,
        rng: &mut StdRng,
        ctx: &GeneratorContext,
    ) -> Result<DataRecord> {
        if !ctx.should_augment(rng, self.probability) {
            return Ok(record);
        }

        let DataRecord { x, y, w } = record;
        let image = x.into_image()?;
        let (orig_h, orig_w, _) = image.dim();

        let mode = PaddingMode::ALL[rng.gen_range(0..PaddingMode::ALL.len())];
        let padded_h = (orig_h as f64 * (1.0 + self.padding_rate)).ceil() as usize;
        let padded_w = (orig_w as f64 * (1.0 + self.padding_rate)).ceil() as usize;
        let image = ndimage::pad(&image, padded_h, padded_w, mode, rng)?;

        let top = (padded_h - orig_h) / 2;
        let left = (padded_w - orig_w) / 2;
        let content = ratio_rect([top, left, orig_h, orig_w], [padded_h, padded_w]);
        let transform = Transform::from_rects(&unit_rect(), &content);
        let y = map_objects(y, |objects| objects.transform(&transform));

        Ok(DataRecord {
            x: image.into(),
            y,
            w,
        })
    }
}

// rotation

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomRotateInit {
    pub probability: R64,
    /// The angle is drawn uniformly from `[-degrees, degrees]`.
    pub degrees: R64,
}

impl Default for RandomRotateInit {
    fn default() -> Self {
        Self {
            probability: r64(1.0),
            degrees: r64(15.0),
        }
    }
}

impl RandomRotateInit {
    pub fn build(self) -> Result<RandomRotate> {
        let Self {
            probability,
            degrees,
        } = self;
        ensure!(degrees >= 0.0, "degrees must be non-negative");

        Ok(RandomRotate {
            probability: check_probability(probability)?,
            degrees: degrees.raw(),
        })
    }
}

/// Rotate by a small random angle about the center.
#[derive(Debug, Clone)]
pub struct RandomRotate {
    probability: f64,
    degrees: f64,
}

impl Operator for RandomRotate {
    fn execute(
        &self,
        record: DataRecord,
        rng: &mut StdRng,
        ctx: &GeneratorContext,
    ) -> Result<DataRecord> {
        if !ctx.should_augment(rng, self.probability) {
            return Ok(record);
        }

        let DataRecord { x, y, w } = record;
        let image = x.into_image()?;
        let angle = rng.gen_range(-self.degrees..=self.degrees);

        Ok(DataRecord {
            x: ndimage::rotate(&image, angle)?.into(),
            y,
            w,
        })
    }
}

// crop

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomCropInit {
    pub probability: R64,
    /// The crop scale is drawn from `[1 - crop_rate, 1]`.
    pub crop_rate: R64,
    /// The probability to distort the aspect ratio.
    pub aspect_prob: R64,
    pub aspect_ratios: Vec<R64>,
}

impl Default for RandomCropInit {
    fn default() -> Self {
        Self {
            probability: r64(1.0),
            crop_rate: r64(0.4),
            aspect_prob: r64(0.5),
            aspect_ratios: vec![r64(3.0 / 4.0), r64(4.0 / 3.0)],
        }
    }
}

impl RandomCropInit {
    pub fn build(self) -> Result<RandomCrop> {
        let Self {
            probability,
            crop_rate,
            aspect_prob,
            aspect_ratios,
        } = self;

        ensure!(
            (0.0..1.0).contains(&crop_rate.raw()),
            "crop_rate must be in range [0, 1), but get {}",
            crop_rate
        );
        ensure!(
            (0.0..=1.0).contains(&aspect_prob.raw()),
            "aspect_prob must be in range [0, 1], but get {}",
            aspect_prob
        );
        ensure!(!aspect_ratios.is_empty(), "aspect_ratios must not be empty");
        ensure!(
            aspect_ratios.iter().all(|&ratio| ratio > 0.0),
            "aspect_ratios must be positive"
        );

        Ok(RandomCrop {
            probability: check_probability(probability)?,
            crop_rate: crop_rate.raw(),
            aspect_prob: aspect_prob.raw(),
            aspect_ratios: aspect_ratios.into_iter().map(R64::raw).collect(),
        })
    }
}

/// Crop a random region. Boxes are clipped to the region and empty ones dropped.
#[derive(Debug, Clone)]
pub struct RandomCrop {
    probability: f64,
    crop_rate: f64,
    aspect_prob: f64,
    aspect_ratios: Vec<f64>,
}

impl Operator for RandomCrop {
    fn execute(
        &self,
        record: DataRecord,
        rng: &mut StdRng,
        ctx: &GeneratorContext,
    ) -> Result<DataRecord> {
        if !ctx.should_augment(rng, self.probability) {
            return Ok(record);
        }

        let DataRecord { x, y, w } = record;
        let image = x.into_image()?;
        let (orig_h, orig_w, _) = image.dim();

        let scale = rng.gen_range((1.0 - self.crop_rate)..=1.0);
        let aspect = if rng.gen::<f64>() <= self.aspect_prob {
            self.aspect_ratios[rng.gen_range(0..self.aspect_ratios.len())].sqrt()
        } else {
            1.0
        };
        let crop_w = ((orig_w as f64 * scale * aspect).floor() as usize).clamp(1, orig_w);
        let crop_h = ((orig_h as f64 * scale / aspect).floor() as usize).clamp(1, orig_h);
        let left = rng.gen_range(0..=(orig_w - crop_w));
        let top = rng.gen_range(0..=(orig_h - crop_h));

        let image = ndimage::crop(&image, top, left, crop_h, crop_w)?;
        let region = ratio_rect([top, left, crop_h, crop_w], [orig_h, orig_w]);
        let transform = Transform::from_rects(&region, &unit_rect());
        let y = map_objects(y, |objects| objects.transform(&transform));

        Ok(DataRecord {
            x: image.into(),
            y,
            w,
        })
    }
}

// flips and quarter turns

/// Mirror left-to-right.
#[derive(Debug, Clone)]
pub struct RandomFlipLR {
    probability: f64,
}

impl RandomFlipLR {
    pub fn new(probability: R64) -> Result<Self> {
        Ok(Self {
            probability: check_probability(probability)?,
        })
    }
}

impl Operator for RandomFlipLR {
    fn execute(
        &self,
        record: DataRecord,
        rng: &mut StdRng,
        ctx: &GeneratorContext,
    ) -> Result<DataRecord> {
        if !ctx.should_augment(rng, self.probability) {
            return Ok(record);
        }

        let DataRecord { x, y, w } = record;
        let image = ndimage::flip_lr(&x.into_image()?);
        let y = map_objects(y, |objects| objects.flip_lr());

        Ok(DataRecord {
            x: image.into(),
            y,
            w,
        })
    }
}

/// Mirror top-to-bottom.
#[derive(Debug, Clone)]
pub struct RandomFlipTB {
    probability: f64,
}

impl RandomFlipTB {
    pub fn new(probability: R64) -> Result<Self> {
        Ok(Self {
            probability: check_probability(probability)?,
        })
    }
}

impl Operator for RandomFlipTB {
    fn execute(
        &self,
        record: DataRecord,
        rng: &mut StdRng,
        ctx: &GeneratorContext,
    ) -> Result<DataRecord> {
        if !ctx.should_augment(rng, self.probability) {
            return Ok(record);
        }

        let DataRecord { x, y, w } = record;
        let image = ndimage::flip_tb(&x.into_image()?);
        let y = map_objects(y, |objects| objects.flip_tb());

        Ok(DataRecord {
            x: image.into(),
            y,
            w,
        })
    }
}

/// Rotate counter-clockwise by 0, 90, 180 or 270 degrees.
#[derive(Debug, Clone)]
pub struct RandomRotate90 {
    probability: f64,
}

impl RandomRotate90 {
    pub fn new(probability: R64) -> Result<Self> {
        Ok(Self {
            probability: check_probability(probability)?,
        })
    }
}

impl Operator for RandomRotate90 {
    fn execute(
        &self,
        record: DataRecord,
        rng: &mut StdRng,
        ctx: &GeneratorContext,
    ) -> Result<DataRecord> {
        if !ctx.should_augment(rng, self.probability) {
            return Ok(record);
        }

        let DataRecord { x, y, w } = record;
        let k = rng.gen_range(0..4);
        let image = ndimage::rot90(&x.into_image()?, k);
        let y = map_objects(y, |objects| objects.rot90(k));

        Ok(DataRecord {
            x: image.into(),
            y,
            w,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use approx::assert_abs_diff_eq;
    use bbox::{prelude::*, TLBR};
    use label::{Label, ObjectsAnnotation};

    fn objects(ltrb: [f64; 4]) -> Value {
        Value::Objects(ObjectsAnnotation::new(vec![Label {
            rect: TLBR::try_from_ltrb(ltrb).unwrap(),
            class: 0,
        }]))
    }

    fn assert_ltrb(value: &Value, expect: [f64; 4]) {
        let objects = value.as_objects().unwrap();
        objects.objects[0]
            .rect
            .ltrb()
            .iter()
            .zip(expect.iter())
            .for_each(|(&lhs, &rhs)| assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-9));
    }

    #[test]
    fn flip_lr_remaps_boxes() {
        let ctx = GeneratorContext::standalone(true);
        let mut rng = StdRng::seed_from_u64(0);
        let op = RandomFlipLR::new(r64(1.0)).unwrap();

        let record = DataRecord::new(Array3::<f32>::zeros((4, 4, 3))).with_y(objects([0.1, 0.1, 0.5, 0.5]));
        let output = op.execute(record, &mut rng, &ctx).unwrap();
        assert_ltrb(output.y.as_ref().unwrap(), [0.5, 0.1, 0.9, 0.5]);
    }

    #[test]
    fn disabled_augmentation_is_identity() {
        let ctx = GeneratorContext::standalone(false);
        let mut rng = StdRng::seed_from_u64(0);
        let op = RandomFlipTB::new(r64(1.0)).unwrap();

        let image = Array3::from_shape_fn((3, 2, 1), |(y, x, _)| (y * 2 + x) as f32);
        let record = DataRecord::new(image.clone());
        let output = op.execute(record, &mut rng, &ctx).unwrap();
        assert_eq!(output.x, Value::from(image));
    }

    #[test]
    fn padding_keeps_boxes_on_content() {
        let ctx = GeneratorContext::standalone(true);
        let mut rng = StdRng::seed_from_u64(3);
        let op = RandomPaddingInit {
            probability: r64(1.0),
            padding_rate: r64(1.0),
        }
        .build()
        .unwrap();

        let record = DataRecord::new(Array3::<f32>::zeros((4, 4, 3))).with_y(objects([0.0, 0.0, 1.0, 1.0]));
        let output = op.execute(record, &mut rng, &ctx).unwrap();
        assert_eq!(output.x.as_array().unwrap().shape(), &[8, 8, 3]);
        assert_ltrb(output.y.as_ref().unwrap(), [0.25, 0.25, 0.75, 0.75]);
    }

    #[test]
    fn crop_keeps_size_bounds() {
        let ctx = GeneratorContext::standalone(true);
        let op = RandomCropInit::default().build().unwrap();

        (0..20).for_each(|seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let record = DataRecord::new(Array3::<f32>::zeros((20, 30, 3)))
                .with_y(objects([0.0, 0.0, 1.0, 1.0]));
            let output = op.execute(record, &mut rng, &ctx).unwrap();
            let shape = output.x.as_array().unwrap().shape().to_vec();
            assert!(shape[0] >= 1 && shape[0] <= 20);
            assert!(shape[1] >= 1 && shape[1] <= 30);

            // a full-image box always covers the crop
            assert_ltrb(output.y.as_ref().unwrap(), [0.0, 0.0, 1.0, 1.0]);
        });
    }

    #[test]
    fn letterbox_resize_remaps_boxes() {
        let ctx = GeneratorContext::standalone(false);
        let mut rng = StdRng::seed_from_u64(0);
        let op = ResizeInit {
            height: 8,
            width: 8,
            padding: Some(PaddingMode::Zero),
        }
        .build()
        .unwrap();

        let record = DataRecord::new(Array3::<f32>::ones((2, 4, 3))).with_y(objects([0.0, 0.0, 1.0, 1.0]));
        let output = op.execute(record, &mut rng, &ctx).unwrap();
        assert_eq!(output.x.as_array().unwrap().shape(), &[8, 8, 3]);
        assert_ltrb(output.y.as_ref().unwrap(), [0.0, 0.25, 1.0, 0.75]);

        assert!(ResizeInit {
            height: 8,
            width: 8,
            padding: Some(PaddingMode::Reflect),
        }
        .build()
        .is_err());
    }

    #[test]
    fn rotate90_keeps_box_consistent() {
        let ctx = GeneratorContext::standalone(true);
        let op = RandomRotate90::new(r64(1.0)).unwrap();

        (0..8).for_each(|seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            // a single lit pixel inside the box
            let mut image = Array3::<f32>::zeros((4, 6, 1));
            image[[1, 4, 0]] = 1.0;
            let record = DataRecord::new(image).with_y(objects([4.0 / 6.0, 0.25, 5.0 / 6.0, 0.5]));

            let output = op.execute(record, &mut rng, &ctx).unwrap();
            let image = output.x.into_image().unwrap();
            let (height, width, _) = image.dim();
            let rect = &output.y.as_ref().unwrap().as_objects().unwrap().objects[0].rect;
            let [t, l, b, r] = rect.tlbr();

            let ((y, x, _), _) = image
                .indexed_iter()
                .find(|(_, val)| **val == 1.0)
                .unwrap();
            let (cy, cx) = ((y as f64 + 0.5) / height as f64, (x as f64 + 0.5) / width as f64);
            assert!(t < cy && cy < b && l < cx && cx < r);
        });
    }
}
