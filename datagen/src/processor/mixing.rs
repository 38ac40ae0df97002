//! Per-sample mixup with a random partner from the dataset.

use crate::{
    common::*,
    context::GeneratorContext,
    dataset::categorical,
    ndimage,
    operator::{check_probability, Operator},
    value::{DataRecord, Value},
};

/// Loads the partner input into the shape of the current input.
pub type PartnerLoaderFn = Arc<dyn Fn(&Value, (usize, usize, usize)) -> Result<Array3<f32>> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct MixupInit {
    pub probability: R64,
    pub alpha: R64,
    pub beta: R64,
    /// One-hot encode the partner label into this many classes.
    pub num_classes: Option<usize>,
}

impl Default for MixupInit {
    fn default() -> Self {
        Self {
            probability: r64(1.0),
            alpha: r64(0.2),
            beta: r64(0.2),
            num_classes: None,
        }
    }
}

impl MixupInit {
    pub fn build(self) -> Result<Mixup> {
        let Self {
            probability,
            alpha,
            beta,
            num_classes,
        } = self;

        ensure!(
            num_classes.map(|num| num > 0).unwrap_or(true),
            "num_classes must be positive"
        );
        let distribution = Beta::new(alpha.raw(), beta.raw())
            .with_context(|| format!("invalid beta parameters ({}, {})", alpha, beta))?;

        Ok(Mixup {
            probability: check_probability(probability)?,
            distribution,
            num_classes,
            loader: Arc::new(load_partner),
        })
    }
}

fn load_partner(value: &Value, shape: (usize, usize, usize)) -> Result<Array3<f32>> {
    let (height, width, channels) = shape;
    let image = match value {
        Value::Path(path) => ndimage::load(path, channels == 1)?,
        Value::Array(array) => array
            .view()
            .into_dimensionality::<Ix3>()
            .with_context(|| "a partner image must have 3 dimensions")?
            .to_owned(),
        other => bail!("cannot load a mixup partner from {}", other.kind()),
    };

    if image.dim().0 == height && image.dim().1 == width {
        Ok(image)
    } else {
        ndimage::resize(&image, height, width)
    }
}

/// Blend each sample with a random dataset sample, inputs and labels alike.
///
/// The labels must be arrays, i.e. one-hot encoded already, unless
/// `num_classes` is set to one-hot the partner's class id.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct Mixup {
    probability: f64,
    distribution: Beta<f64>,
    num_classes: Option<usize>,
    #[derivative(Debug = "ignore")]
    loader: PartnerLoaderFn,
}

impl Mixup {
    /// Replace the partner loader, which by default decodes paths and resizes.
    pub fn with_loader<F>(mut self, loader: F) -> Self
    where
        F: 'static + Fn(&Value, (usize, usize, usize)) -> Result<Array3<f32>> + Send + Sync,
    {
        self.loader = Arc::new(loader);
        self
    }

    fn partner_label(&self, label: Option<Value>) -> Result<ArrayD<f32>> {
        let label = label.ok_or_else(|| format_err!("the mixup partner has no label"))?;

        match self.num_classes {
            Some(num_classes) => {
                let class = label
                    .to_scalar()
                    .ok_or_else(|| format_err!("expect a class id label for one-hot encoding"))?;
                let class = categorical(class)?;
                ensure!(
                    class < num_classes,
                    "class id {} is out of range for {} classes",
                    class,
                    num_classes
                );
                let mut onehot = Array1::<f32>::zeros(num_classes);
                onehot[class] = 1.0;
                Ok(onehot.into_dyn())
            }
            None => label.into_array(),
        }
    }
}

impl Operator for Mixup {
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
        let y = y.ok_or_else(|| format_err!("mixup requires labels"))?;
        ensure!(
            ctx.sample_count() > 0,
            "mixup requires a dataset to draw partners from"
        );

        let partner_index = rng.gen_range(0..ctx.sample_count());
        let partner = ctx.dataset().pick(partner_index);

        let x1 = x.into_image()?;
        let x2 = (self.loader)(&partner.x, x1.dim())?;
        ensure!(
            x1.dim() == x2.dim(),
            "mixup input shapes differ: {:?} and {:?}",
            x1.dim(),
            x2.dim()
        );

        let y1 = y.into_array()?;
        let y2 = self.partner_label(partner.y)?;
        ensure!(
            y1.shape() == y2.shape(),
            "mixup label shapes differ: {:?} and {:?}",
            y1.shape(),
            y2.shape()
        );

        let ratio = self.distribution.sample(rng);
        assert!(
            (0.0..=1.0).contains(&ratio),
            "mixup ratio {} is out of range",
            ratio
        );
        let ratio = ratio as f32;

        let x = x1 * ratio + x2 * (1.0 - ratio);
        let y = y1 * ratio + y2 * (1.0 - ratio);

        Ok(DataRecord {
            x: x.into(),
            y: Some(y.into()),
            w,
        })
    }
}
