//! The dataset the generator samples from.

use crate::{
    common::*,
    value::{Column, DataRecord, Value},
};

pub type ClassFn = Arc<dyn Fn(&Value) -> Result<usize> + Send + Sync>;

/// The policy mapping labels to class ids, used by balanced sampling.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub enum LabelClasses {
    /// Integer-valued scalars are class ids, other scalars are thresholded
    /// at 0.5 and vectors are reduced by argmax.
    Auto,
    /// Scalars holding non-negative integer class ids.
    Categorical,
    /// Scalars `>= threshold` are class 1, others class 0.
    Threshold(f32),
    /// The index of the largest entry of a vector label.
    Argmax,
    Custom(#[derivative(Debug = "ignore")] ClassFn),
}

impl Default for LabelClasses {
    fn default() -> Self {
        Self::Auto
    }
}

impl LabelClasses {
    pub fn custom<F>(f: F) -> Self
    where
        F: 'static + Fn(&Value) -> Result<usize> + Send + Sync,
    {
        Self::Custom(Arc::new(f))
    }

    /// Compute the class id of every label in the column.
    pub fn classify(&self, labels: &Column) -> Result<Vec<usize>> {
        let values = match labels {
            Column::Single(values) => values,
            Column::Multiple(_) => bail!("class ids require a single output column"),
        };

        match self {
            Self::Custom(f) => values.iter().map(|value| f(value)).collect(),
            Self::Categorical => values.iter().map(|value| categorical(scalar(value)?)).collect(),
            Self::Threshold(threshold) => values
                .iter()
                .map(|value| Ok(threshold_class(scalar(value)?, *threshold)))
                .collect(),
            Self::Argmax => values.iter().map(argmax).collect(),
            Self::Auto => {
                let scalars: Option<Vec<f32>> = values.iter().map(Value::to_scalar).collect();

                match scalars {
                    Some(scalars) => {
                        let is_categorical = scalars
                            .iter()
                            .all(|&val| val >= 0.0 && val.fract() == 0.0);

                        if is_categorical {
                            scalars.into_iter().map(categorical).collect()
                        } else {
                            Ok(scalars
                                .into_iter()
                                .map(|val| threshold_class(val, 0.5))
                                .collect())
                        }
                    }
                    None => values.iter().map(argmax).collect(),
                }
            }
        }
    }
}

fn scalar(value: &Value) -> Result<f32> {
    value
        .to_scalar()
        .ok_or_else(|| format_err!("expect a scalar label, but get {:?}", value))
}

pub(crate) fn categorical(value: f32) -> Result<usize> {
    ensure!(
        value >= 0.0 && value.fract() == 0.0,
        "class id must be a non-negative integer, but get {}",
        value
    );
    Ok(value as usize)
}

fn threshold_class(value: f32, threshold: f32) -> usize {
    if value >= threshold {
        1
    } else {
        0
    }
}

fn argmax(value: &Value) -> Result<usize> {
    let array = match value {
        Value::Array(array) if array.ndim() == 1 && !array.is_empty() => array,
        _ => bail!("expect a non-empty vector label, but get {:?}", value),
    };

    // the first maximum wins on ties
    let (index, _) = array.iter().enumerate().fold(
        (0, f32::NEG_INFINITY),
        |(max_index, max_val), (index, &val)| {
            if val > max_val {
                (index, val)
            } else {
                (max_index, max_val)
            }
        },
    );
    Ok(index)
}

/// The inputs, the optional labels and the optional sample weights.
#[derive(Debug, Clone, Getters)]
pub struct Dataset {
    #[getset(get = "pub")]
    x: Column,
    #[getset(get = "pub")]
    y: Option<Column>,
    #[getset(get = "pub")]
    weights: Option<Vec<f32>>,
    #[getset(get = "pub")]
    label_classes: LabelClasses,
}

impl Dataset {
    pub fn new(x: Column) -> Self {
        Self {
            x,
            y: None,
            weights: None,
            label_classes: LabelClasses::Auto,
        }
    }

    pub fn with_labels(mut self, y: Column) -> Self {
        self.y = Some(y);
        self
    }

    pub fn with_weights(mut self, weights: Vec<f32>) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn with_label_classes(mut self, label_classes: LabelClasses) -> Self {
        self.label_classes = label_classes;
        self
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Deep-copy the sample at `index`.
    pub fn pick(&self, index: usize) -> DataRecord {
        DataRecord {
            x: self.x.pick(index),
            y: self.y.as_ref().map(|y| y.pick(index)),
            w: self.weights.as_ref().map(|weights| weights[index]),
        }
    }

    /// The class id of every sample.
    pub fn classes(&self) -> Result<Vec<usize>> {
        let y = self
            .y
            .as_ref()
            .ok_or_else(|| format_err!("class ids require labels"))?;
        self.label_classes.classify(y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_classes() {
        let integer = Column::single(vec![0.0f32, 2.0, 1.0]);
        assert_eq!(LabelClasses::Auto.classify(&integer).unwrap(), vec![0, 2, 1]);

        let continuous = Column::single(vec![0.2f32, 0.5, 0.9, 0.49]);
        assert_eq!(
            LabelClasses::Auto.classify(&continuous).unwrap(),
            vec![0, 1, 1, 0]
        );

        let one_hot = Column::single(vec![
            Array1::from(vec![0.1f32, 0.7, 0.2]),
            Array1::from(vec![0.5f32, 0.5, 0.0]),
        ]);
        assert_eq!(LabelClasses::Auto.classify(&one_hot).unwrap(), vec![1, 0]);
    }

    #[test]
    fn explicit_classes() {
        let labels = Column::single(vec![0.0f32, 3.0, 0.7]);
        assert_eq!(
            LabelClasses::Threshold(0.6).classify(&labels).unwrap(),
            vec![0, 1, 1]
        );
        assert!(LabelClasses::Categorical.classify(&labels).is_err());

        let custom = LabelClasses::custom(|value| Ok(value.to_scalar().unwrap_or(0.0) as usize % 2));
        assert_eq!(custom.classify(&labels).unwrap(), vec![0, 1, 0]);
    }

    #[test]
    fn dataset_pick_deep_copy() {
        let dataset = Dataset::new(Column::single(vec![1.0f32, 2.0]))
            .with_labels(Column::single(vec![0.0f32, 1.0]))
            .with_weights(vec![0.5, 2.0]);

        let mut record = dataset.pick(1);
        assert_eq!(record.w, Some(2.0));
        record.x = Value::scalar(10.0);
        assert_eq!(dataset.pick(1).x, Value::scalar(2.0));
    }
}
