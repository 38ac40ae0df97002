//! Random erasing, on the whole image or within each object.

use crate::{
    common::*,
    context::GeneratorContext,
    operator::{check_probability, Operator},
    value::{DataRecord, Value},
};
use bbox::{prelude::*, TLBR};
use label::ObjectsAnnotation;
use ndarray::ArrayViewMut3;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomErasingInit {
    pub probability: R64,
    /// The lower bound of the erased area relative to the image area.
    pub scale_low: R64,
    /// The upper bound of the erased area relative to the image area.
    pub scale_high: R64,
    /// The lower bound of the erased aspect ratio.
    pub rate_1: R64,
    /// The upper bound of the erased aspect ratio.
    pub rate_2: R64,
    /// Erase within each object box instead of the whole image.
    pub object_aware: bool,
    /// The per-object erasing probability in object-aware mode.
    pub object_aware_prob: R64,
    pub max_tries: usize,
}

impl Default for RandomErasingInit {
    fn default() -> Self {
        Self {
            probability: r64(1.0),
            scale_low: r64(0.02),
            scale_high: r64(0.4),
            rate_1: r64(1.0 / 3.0),
            rate_2: r64(3.0),
            object_aware: false,
            object_aware_prob: r64(0.5),
            max_tries: 30,
        }
    }
}

impl RandomErasingInit {
    pub fn build(self) -> Result<RandomErasing> {
        let Self {
            probability,
            scale_low,
            scale_high,
            rate_1,
            rate_2,
            object_aware,
            object_aware_prob,
            max_tries,
        } = self;

        ensure!(
            scale_low > 0.0 && scale_low <= scale_high,
            "expect 0 < scale_low <= scale_high, but get {} and {}",
            scale_low,
            scale_high
        );
        ensure!(
            rate_1 > 0.0 && rate_1 <= rate_2,
            "expect 0 < rate_1 <= rate_2, but get {} and {}",
            rate_1,
            rate_2
        );
        ensure!(
            (0.0..=1.0).contains(&object_aware_prob.raw()),
            "object_aware_prob must be in range [0, 1]"
        );
        ensure!(max_tries > 0, "max_tries must be positive");

        Ok(RandomErasing {
            probability: check_probability(probability)?,
            scale: (scale_low.raw(), scale_high.raw()),
            log_rate: (rate_1.raw().ln(), rate_2.raw().ln()),
            object_aware,
            object_aware_prob: object_aware_prob.raw(),
            max_tries,
        })
    }
}

/// Fill a random rectangle with a random color.
///
/// A candidate is rejected if it covers a corner or the center of an object
/// box, or a quarter or more of its area. The image is left untouched when
/// every try is rejected.
#[derive(Debug, Clone)]
pub struct RandomErasing {
    scale: (f64, f64),
    log_rate: (f64, f64),
    probability: f64,
    object_aware: bool,
    object_aware_prob: f64,
    max_tries: usize,
}

impl RandomErasing {
    fn erase_random<R>(&self, mut image: ArrayViewMut3<f32>, rng: &mut R, boxes: &[TLBR<f64>])
    where
        R: Rng + ?Sized,
    {
        let (height, width, channels) = image.dim();
        let (scale_low, scale_high) = self.scale;
        let (log_rate_low, log_rate_high) = self.log_rate;

        for _ in 0..self.max_tries {
            let area = (height * width) as f64 * rng.gen_range(scale_low..=scale_high);
            let rate = rng.gen_range(log_rate_low..=log_rate_high).exp();
            let ew = (area / rate).sqrt() as usize;
            let eh = (area * rate).sqrt() as usize;
            if ew == 0 || eh == 0 || ew >= width || eh >= height {
                continue;
            }
            let ex = rng.gen_range(0..(width - ew));
            let ey = rng.gen_range(0..(height - eh));

            let erased = TLBR::from_tlhw([ey as f64, ex as f64, eh as f64, ew as f64]);
            let covers_key_point = boxes.iter().any(|rect| {
                rect.key_points()
                    .iter()
                    .any(|&[y, x]| erased.contains_point(y, x))
            });
            if covers_key_point {
                continue;
            }
            let covers_area = boxes
                .iter()
                .any(|rect| erased.intersection_area_with(rect) >= rect.area() * 0.25);
            if covers_area {
                continue;
            }

            let color: Vec<f32> = (0..channels)
                .map(|_| rng.gen_range(0..255) as f32)
                .collect();
            image
                .slice_mut(s![ey..(ey + eh), ex..(ex + ew), ..])
                .lanes_mut(Axis(2))
                .into_iter()
                .for_each(|mut pixel| {
                    pixel
                        .iter_mut()
                        .zip(&color)
                        .for_each(|(value, &fill)| *value = fill)
                });
            return;
        }
    }

    fn erase_objects<R>(
        &self,
        image: &mut Array3<f32>,
        rng: &mut R,
        objects: &ObjectsAnnotation,
    ) where
        R: Rng + ?Sized,
    {
        let (height, width, _) = image.dim();
        let boxes = objects.pixel_rects(height, width);
        let intersections = ObjectsAnnotation::intersection_matrix(&boxes);

        for (index, rect) in boxes.iter().enumerate() {
            if rect.h() <= 1.0 || rect.w() <= 1.0 {
                warn!(
                    "skip a degenerate box {:?} in '{}'",
                    rect.tlbr(),
                    objects
                        .path
                        .as_deref()
                        .map(|path| path.display().to_string())
                        .unwrap_or_default()
                );
                continue;
            }
            if rng.gen::<f64>() > self.object_aware_prob {
                continue;
            }

            let [t, l, b, r] = rect.tlbr();
            let (t, l) = (t.max(0.0) as usize, l.max(0.0) as usize);
            let (b, r) = ((b as usize).min(height), (r as usize).min(width));
            if b <= t || r <= l {
                continue;
            }

            let inner_boxes: Vec<TLBR<f64>> = izip!(&boxes, &intersections[index])
                .filter(|(_, intersects)| **intersects)
                .map(|(other, _)| {
                    let [ot, ol, ob, or] = other.tlbr();
                    TLBR::from_tlbr([
                        ot - t as f64,
                        ol - l as f64,
                        ob - t as f64,
                        or - l as f64,
                    ])
                })
                .collect();

            let region = image.slice_mut(s![t..b, l..r, ..]);
            self.erase_random(region, rng, &inner_boxes);
        }
    }
}

impl Operator for RandomErasing {
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
        let mut image = x.into_image()?;
        let objects = y.as_ref().and_then(Value::as_objects);

        if self.object_aware {
            let objects = objects.ok_or_else(|| {
                format_err!("object-aware erasing requires an objects annotation label")
            })?;
            self.erase_objects(&mut image, rng, objects);
        } else {
            let (height, width, _) = image.dim();
            let boxes = objects
                .map(|objects| objects.pixel_rects(height, width))
                .unwrap_or_default();
            self.erase_random(image.view_mut(), rng, &boxes);
        }

        Ok(DataRecord {
            x: image.into(),
            y,
            w,
        })
    }
}
