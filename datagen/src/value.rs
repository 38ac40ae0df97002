//! Per-sample values, dataset columns and the per-sample working record.

use crate::common::*;
use label::ObjectsAnnotation;

/// A value of one sample.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A raw array. Images are `height × width × channels` in RGB order, valued 0 to 255.
    Array(ArrayD<f32>),
    /// An image file reference, decoded by the `LoadImage` operator.
    Path(PathBuf),
    /// An object detection annotation.
    Objects(ObjectsAnnotation),
    /// One value per input or output in multi-input and multi-output mode.
    List(Vec<Value>),
}

impl Value {
    pub fn scalar(value: f32) -> Self {
        Self::Array(ArrayD::from_elem(IxDyn(&[]), value))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Array(_) => "array",
            Self::Path(_) => "path",
            Self::Objects(_) => "objects",
            Self::List(_) => "list",
        }
    }

    pub fn as_array(&self) -> Option<&ArrayD<f32>> {
        match self {
            Self::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_objects(&self) -> Option<&ObjectsAnnotation> {
        match self {
            Self::Objects(objects) => Some(objects),
            _ => None,
        }
    }

    pub fn as_objects_mut(&mut self) -> Option<&mut ObjectsAnnotation> {
        match self {
            Self::Objects(objects) => Some(objects),
            _ => None,
        }
    }

    pub fn into_array(self) -> Result<ArrayD<f32>> {
        match self {
            Self::Array(array) => Ok(array),
            other => bail!("expect an array, but get {}", other.kind()),
        }
    }

    /// Take the value as an `height × width × channels` image.
    pub fn into_image(self) -> Result<Array3<f32>> {
        let array = self.into_array()?;
        let shape = array.shape().to_vec();
        array
            .into_dimensionality::<Ix3>()
            .with_context(|| format!("expect a 3 dimensional image, but get shape {:?}", shape))
    }

    /// The single element of a scalar-like array, i.e. of shape `[]` or `[1]`.
    pub fn to_scalar(&self) -> Option<f32> {
        let array = self.as_array()?;
        if array.len() == 1 && array.ndim() <= 1 {
            array.iter().next().copied()
        } else {
            None
        }
    }
}

impl From<ArrayD<f32>> for Value {
    fn from(from: ArrayD<f32>) -> Self {
        Self::Array(from)
    }
}

impl From<Array1<f32>> for Value {
    fn from(from: Array1<f32>) -> Self {
        Self::Array(from.into_dyn())
    }
}

impl From<Array3<f32>> for Value {
    fn from(from: Array3<f32>) -> Self {
        Self::Array(from.into_dyn())
    }
}

impl From<f32> for Value {
    fn from(from: f32) -> Self {
        Self::scalar(from)
    }
}

impl From<PathBuf> for Value {
    fn from(from: PathBuf) -> Self {
        Self::Path(from)
    }
}

impl From<&Path> for Value {
    fn from(from: &Path) -> Self {
        Self::Path(from.to_owned())
    }
}

impl From<ObjectsAnnotation> for Value {
    fn from(from: ObjectsAnnotation) -> Self {
        Self::Objects(from)
    }
}

/// A dataset column, either one collection or one collection per model input/output.
///
/// The variant is fixed when the dataset is built and decides whether batches
/// are stacked per position.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Single(Vec<Value>),
    Multiple(Vec<Vec<Value>>),
}

impl Column {
    pub fn single<V>(values: impl IntoIterator<Item = V>) -> Self
    where
        V: Into<Value>,
    {
        Self::Single(values.into_iter().map(Into::into).collect())
    }

    pub fn multiple<V, C>(columns: impl IntoIterator<Item = C>) -> Self
    where
        C: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Multiple(
            columns
                .into_iter()
                .map(|column| column.into_iter().map(Into::into).collect())
                .collect(),
        )
    }

    /// The number of samples.
    pub fn len(&self) -> usize {
        match self {
            Self::Single(values) => values.len(),
            Self::Multiple(columns) => columns.first().map(Vec::len).unwrap_or(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_multiple(&self) -> bool {
        matches!(self, Self::Multiple(_))
    }

    /// Deep-copy the sample at `index`.
    ///
    /// A multiple column produces a [Value::List] with one entry per sub-collection.
    pub fn pick(&self, index: usize) -> Value {
        match self {
            Self::Single(values) => values[index].clone(),
            Self::Multiple(columns) => {
                Value::List(columns.iter().map(|values| values[index].clone()).collect())
            }
        }
    }

    pub(crate) fn check(&self, name: &str) -> Result<()> {
        if let Self::Multiple(columns) = self {
            ensure!(
                !columns.is_empty(),
                "the multiple column '{}' has no sub-collections",
                name
            );
            let len = columns[0].len();
            ensure!(
                columns.iter().all(|values| values.len() == len),
                "sub-collections of the column '{}' differ in length: {:?}",
                name,
                columns.iter().map(Vec::len).collect::<Vec<_>>()
            );
        }
        Ok(())
    }
}

/// The per-sample working triple passed along the operator chain.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRecord {
    pub x: Value,
    pub y: Option<Value>,
    pub w: Option<f32>,
}

impl DataRecord {
    pub fn new(x: impl Into<Value>) -> Self {
        Self {
            x: x.into(),
            y: None,
            w: None,
        }
    }

    pub fn with_y(mut self, y: impl Into<Value>) -> Self {
        self.y = Some(y.into());
        self
    }

    pub fn with_w(mut self, w: f32) -> Self {
        self.w = Some(w);
        self
    }
}
