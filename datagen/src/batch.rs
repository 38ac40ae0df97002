//! Batch assembly from processed samples.

use crate::{
    common::*,
    value::{DataRecord, Value},
};

/// The values of one input or output position across a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchData {
    /// Arrays of identical shape stacked along a new leading axis.
    Array(ArrayD<f32>),
    /// Values that cannot be stacked, such as objects annotations.
    Values(Vec<Value>),
}

impl BatchData {
    /// Stack the values if they are arrays of one shape, or keep them as they are.
    pub fn from_values(values: Vec<Value>) -> Result<Self> {
        let arrays: Option<Vec<&ArrayD<f32>>> = values.iter().map(Value::as_array).collect();
        let arrays = match arrays {
            Some(arrays) if !arrays.is_empty() => arrays,
            _ => return Ok(Self::Values(values)),
        };

        let same_shape = arrays
            .iter()
            .map(|array| array.shape())
            .all_equal();
        if !same_shape {
            return Ok(Self::Values(values));
        }

        let views: Vec<_> = arrays.iter().map(|array| array.view()).collect();
        let stacked = ndarray::stack(Axis(0), &views)?;
        Ok(Self::Array(stacked))
    }

    pub fn as_array(&self) -> Option<&ArrayD<f32>> {
        match self {
            Self::Array(array) => Some(array),
            Self::Values(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Array(array) => array.shape()[0],
            Self::Values(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Batch data of a single input or output, or one per position.
#[derive(Debug, Clone, PartialEq)]
pub enum Stacked {
    Single(BatchData),
    Multiple(Vec<BatchData>),
}

impl Stacked {
    fn from_values(values: Vec<Value>, multiple: bool) -> Result<Self> {
        if !multiple {
            return Ok(Self::Single(BatchData::from_values(values)?));
        }

        let lists: Vec<Vec<Value>> = values
            .into_iter()
            .map(|value| match value {
                Value::List(list) => Ok(list),
                other => bail!("expect a list in multiple mode, but get {}", other.kind()),
            })
            .collect::<Result<_>>()?;

        let positions = lists.first().map(Vec::len).unwrap_or(0);
        ensure!(
            lists.iter().all(|list| list.len() == positions),
            "samples have different numbers of positions"
        );

        let mut columns: Vec<Vec<Value>> = (0..positions)
            .map(|_| Vec::with_capacity(lists.len()))
            .collect();
        lists.into_iter().for_each(|list| {
            izip!(&mut columns, list).for_each(|(column, value)| column.push(value));
        });

        let data = columns
            .into_iter()
            .map(BatchData::from_values)
            .collect::<Result<_>>()?;
        Ok(Self::Multiple(data))
    }

    /// All batch data in position order.
    pub fn parts(&self) -> Vec<&BatchData> {
        match self {
            Self::Single(data) => vec![data],
            Self::Multiple(data) => data.iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single(data) => data.len(),
            Self::Multiple(data) => data.first().map(BatchData::len).unwrap_or(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One batch of inputs with optional labels and weights.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub x: Stacked,
    pub y: Option<Stacked>,
    pub w: Option<Array1<f32>>,
}

impl Batch {
    /// 1 for inputs only, 2 with labels and 3 with labels and weights.
    pub fn arity(&self) -> usize {
        match (&self.y, &self.w) {
            (None, None) => 1,
            (Some(_), None) => 2,
            (_, Some(_)) => 3,
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub(crate) fn assemble(
    records: Vec<DataRecord>,
    multiple_input: bool,
    multiple_output: bool,
) -> Result<Batch> {
    let (xs, ys, ws) = records
        .into_iter()
        .map(|DataRecord { x, y, w }| (x, y, w))
        .unzip_n_vec();

    let x = Stacked::from_values(xs, multiple_input)?;

    let y = if ys.iter().all(Option::is_none) {
        None
    } else {
        let ys: Vec<Value> = ys
            .into_iter()
            .collect::<Option<_>>()
            .ok_or_else(|| format_err!("labels are missing in part of the batch"))?;
        Some(Stacked::from_values(ys, multiple_output)?)
    };

    let w = if ws.iter().all(Option::is_none) {
        None
    } else {
        let ws: Vec<f32> = ws
            .into_iter()
            .collect::<Option<_>>()
            .ok_or_else(|| format_err!("weights are missing in part of the batch"))?;
        Some(Array1::from(ws))
    };

    ensure!(
        y.is_some() || w.is_none(),
        "weights without labels cannot form a batch"
    );

    Ok(Batch { x, y, w })
}

#[cfg(test)]
mod tests {
    use super::*;
    use label::ObjectsAnnotation;

    #[test]
    fn assemble_stacks_arrays() {
        let records = (0..3)
            .map(|index| {
                DataRecord::new(Array3::from_elem((2, 2, 1), index as f32))
                    .with_y(index as f32)
                    .with_w(0.5)
            })
            .collect();
        let batch = assemble(records, false, false).unwrap();

        assert_eq!(batch.arity(), 3);
        assert_eq!(batch.len(), 3);
        let x = match &batch.x {
            Stacked::Single(BatchData::Array(x)) => x,
            other => panic!("unexpected batch input {:?}", other),
        };
        assert_eq!(x.shape(), &[3, 2, 2, 1]);
        assert_eq!(x[[2, 1, 1, 0]], 2.0);
        assert_eq!(batch.w, Some(Array1::from(vec![0.5, 0.5, 0.5])));
    }

    #[test]
    fn assemble_keeps_annotations_unstacked() {
        let records = (0..2)
            .map(|_| {
                DataRecord::new(Array3::<f32>::zeros((2, 2, 3)))
                    .with_y(ObjectsAnnotation::new(vec![]))
            })
            .collect();
        let batch = assemble(records, false, false).unwrap();
        assert_eq!(batch.arity(), 2);
        match batch.y {
            Some(Stacked::Single(BatchData::Values(values))) => assert_eq!(values.len(), 2),
            other => panic!("unexpected batch labels {:?}", other),
        }
    }

    #[test]
    fn assemble_multiple_inputs() {
        let records = (0..4)
            .map(|index| {
                DataRecord::new(Value::List(vec![
                    Value::scalar(index as f32),
                    Array1::from(vec![index as f32; 2]).into(),
                ]))
            })
            .collect();
        let batch = assemble(records, true, false).unwrap();

        assert_eq!(batch.arity(), 1);
        let parts = batch.x.parts();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].as_array().unwrap().shape(), &[4]);
        assert_eq!(parts[1].as_array().unwrap().shape(), &[4, 2]);
    }

    #[test]
    fn mismatched_shapes_are_not_stacked() {
        let data = BatchData::from_values(vec![
            Array1::from(vec![1.0f32]).into(),
            Array1::from(vec![1.0f32, 2.0]).into(),
        ])
        .unwrap();
        assert!(matches!(data, BatchData::Values(ref values) if values.len() == 2));
    }
}
