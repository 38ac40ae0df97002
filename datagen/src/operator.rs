//! The operator abstraction and the user-function operators.

use crate::{
    common::*,
    context::GeneratorContext,
    value::{DataRecord, Value},
};

/// One step of the per-sample pipeline.
///
/// Operators receive an owned deep copy of the sample, so mutating it never
/// touches the dataset. Randomness must come from `rng` only.
pub trait Operator: Debug + Send + Sync {
    /// The name used as the profiling key.
    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        let path = full.split('<').next().unwrap_or(full);
        path.rsplit("::").next().unwrap_or(path)
    }

    fn execute(
        &self,
        record: DataRecord,
        rng: &mut StdRng,
        ctx: &GeneratorContext,
    ) -> Result<DataRecord>;
}

pub(crate) fn check_probability(probability: R64) -> Result<f64> {
    ensure!(
        probability > 0.0 && probability <= 1.0,
        "probability must be in range (0, 1], but get {}",
        probability
    );
    Ok(probability.raw())
}

pub type ArrayFn = Arc<dyn Fn(ArrayD<f32>) -> Result<ArrayD<f32>> + Send + Sync>;
pub type RecordFn =
    Arc<dyn Fn(DataRecord, &mut StdRng, &GeneratorContext) -> Result<DataRecord> + Send + Sync>;

fn apply_array_fn(func: &ArrayFn, array: ArrayD<f32>, batch_axis: bool) -> Result<ArrayD<f32>> {
    if batch_axis {
        let output = func(array.insert_axis(Axis(0)))?;
        ensure!(
            output.ndim() > 0 && output.shape()[0] == 1,
            "the function must keep the batch axis of size 1, but get shape {:?}",
            output.shape()
        );
        Ok(output.index_axis_move(Axis(0), 0))
    } else {
        func(array)
    }
}

fn apply_to_value(func: &ArrayFn, value: Value, batch_axis: bool) -> Result<Value> {
    match value {
        Value::Array(array) => Ok(Value::Array(apply_array_fn(func, array, batch_axis)?)),
        Value::List(values) => Ok(Value::List(
            values
                .into_iter()
                .map(|value| apply_to_value(func, value, batch_axis))
                .collect::<Result<_>>()?,
        )),
        other => bail!("cannot apply an array function to {}", other.kind()),
    }
}

/// Apply a function to the input arrays.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct ProcessInput {
    #[derivative(Debug = "ignore")]
    func: ArrayFn,
    batch_axis: bool,
}

impl ProcessInput {
    pub fn new<F>(func: F) -> Self
    where
        F: 'static + Fn(ArrayD<f32>) -> Result<ArrayD<f32>> + Send + Sync,
    {
        Self {
            func: Arc::new(func),
            batch_axis: false,
        }
    }

    /// Pass arrays to the function with a leading batch axis of size 1.
    pub fn with_batch_axis(mut self) -> Self {
        self.batch_axis = true;
        self
    }
}

impl Operator for ProcessInput {
    fn execute(
        &self,
        record: DataRecord,
        _rng: &mut StdRng,
        _ctx: &GeneratorContext,
    ) -> Result<DataRecord> {
        let DataRecord { x, y, w } = record;
        let x = apply_to_value(&self.func, x, self.batch_axis)?;
        Ok(DataRecord { x, y, w })
    }
}

/// Apply a function to the label arrays, if the sample has a label.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct ProcessOutput {
    #[derivative(Debug = "ignore")]
    func: ArrayFn,
    batch_axis: bool,
}

impl ProcessOutput {
    pub fn new<F>(func: F) -> Self
    where
        F: 'static + Fn(ArrayD<f32>) -> Result<ArrayD<f32>> + Send + Sync,
    {
        Self {
            func: Arc::new(func),
            batch_axis: false,
        }
    }

    pub fn with_batch_axis(mut self) -> Self {
        self.batch_axis = true;
        self
    }
}

impl Operator for ProcessOutput {
    fn execute(
        &self,
        record: DataRecord,
        _rng: &mut StdRng,
        _ctx: &GeneratorContext,
    ) -> Result<DataRecord> {
        let DataRecord { x, y, w } = record;
        let y = y
            .map(|y| apply_to_value(&self.func, y, self.batch_axis))
            .transpose()?;
        Ok(DataRecord { x, y, w })
    }
}

/// Run a user closure on every sample.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct CustomOperator {
    name: String,
    #[derivative(Debug = "ignore")]
    process: RecordFn,
}

impl CustomOperator {
    pub fn new<F>(name: impl Into<String>, process: F) -> Self
    where
        F: 'static
            + Fn(DataRecord, &mut StdRng, &GeneratorContext) -> Result<DataRecord>
            + Send
            + Sync,
    {
        Self {
            name: name.into(),
            process: Arc::new(process),
        }
    }
}

impl Operator for CustomOperator {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(
        &self,
        record: DataRecord,
        rng: &mut StdRng,
        ctx: &GeneratorContext,
    ) -> Result<DataRecord> {
        (self.process)(record, rng, ctx)
    }
}

/// Run a user closure on a sample when the augmentation gate passes.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct CustomAugmentation {
    name: String,
    probability: f64,
    #[derivative(Debug = "ignore")]
    process: RecordFn,
}

impl CustomAugmentation {
    pub fn new<F>(name: impl Into<String>, probability: R64, process: F) -> Result<Self>
    where
        F: 'static
            + Fn(DataRecord, &mut StdRng, &GeneratorContext) -> Result<DataRecord>
            + Send
            + Sync,
    {
        Ok(Self {
            name: name.into(),
            probability: check_probability(probability)?,
            process: Arc::new(process),
        })
    }
}

impl Operator for CustomAugmentation {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(
        &self,
        record: DataRecord,
        rng: &mut StdRng,
        ctx: &GeneratorContext,
    ) -> Result<DataRecord> {
        if ctx.should_augment(rng, self.probability) {
            (self.process)(record, rng, ctx)
        } else {
            Ok(record)
        }
    }
}
