//! Image loading.

use crate::{
    cache::ImageCache,
    common::*,
    context::GeneratorContext,
    ndimage,
    operator::Operator,
    value::{DataRecord, Value},
};

/// Decode image paths into arrays.
///
/// Inputs that are arrays already pass through after a channel check: one
/// channel in grayscale mode, three otherwise.
#[derive(Debug, Clone, Default)]
pub struct LoadImage {
    grayscale: bool,
    cache: Option<Arc<ImageCache>>,
}

impl LoadImage {
    pub fn new(grayscale: bool) -> Self {
        Self {
            grayscale,
            cache: None,
        }
    }

    /// Share decoded images through `cache`.
    pub fn with_cache(mut self, cache: Arc<ImageCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    fn load(&self, path: &Path) -> Result<Array3<f32>> {
        match &self.cache {
            Some(cache) => Ok(cache.get_or_load(path, self.grayscale)?.as_ref().clone()),
            None => ndimage::load(path, self.grayscale),
        }
    }

    fn load_value(&self, value: Value) -> Result<Value> {
        let image = match value {
            Value::Path(path) => self.load(&path)?,
            Value::Array(array) => array
                .into_dimensionality::<Ix3>()
                .with_context(|| "an input image must have 3 dimensions")?,
            Value::List(values) => {
                let values = values
                    .into_iter()
                    .map(|value| self.load_value(value))
                    .collect::<Result<_>>()?;
                return Ok(Value::List(values));
            }
            Value::Objects(_) => bail!("cannot load an image from an objects annotation"),
        };

        let channels = image.dim().2;
        let expect = if self.grayscale { 1 } else { 3 };
        ensure!(
            channels == expect,
            "expect {} channels, but get {}",
            expect,
            channels
        );
        Ok(image.into())
    }
}

impl Operator for LoadImage {
    fn execute(
        &self,
        record: DataRecord,
        _rng: &mut StdRng,
        _ctx: &GeneratorContext,
    ) -> Result<DataRecord> {
        let DataRecord { x, y, w } = record;
        Ok(DataRecord {
            x: self.load_value(x)?,
            y,
            w,
        })
    }
}
