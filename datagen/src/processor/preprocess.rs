//! Model input normalizations for channels-last arrays.

use crate::{common::*, operator::ProcessInput};

const BGR_MEAN: [f32; 3] = [103.939, 116.779, 123.68];

/// Reorder RGB to BGR and subtract the per-channel mean pixel.
pub fn preprocess_input_mean(array: ArrayD<f32>) -> Result<ArrayD<f32>> {
    let last_axis = array
        .ndim()
        .checked_sub(1)
        .ok_or_else(|| format_err!("cannot preprocess a 0-dimensional array"))?;
    ensure!(
        array.shape()[last_axis] == 3,
        "expect 3 channels on the last axis, but get shape {:?}",
        array.shape()
    );

    let mut output = array;
    output.invert_axis(Axis(last_axis));
    let mut output = output.as_standard_layout().into_owned();
    output
        .lanes_mut(Axis(last_axis))
        .into_iter()
        .for_each(|mut pixel| {
            pixel
                .iter_mut()
                .zip(BGR_MEAN)
                .for_each(|(value, mean)| *value -= mean)
        });
    Ok(output)
}

/// Map 0 to 255 into -1 to 1.
pub fn preprocess_input_abs1(array: ArrayD<f32>) -> Result<ArrayD<f32>> {
    Ok(array / 127.5 - 1.0)
}

/// The inverse of [preprocess_input_abs1].
pub fn unpreprocess_input_abs1(array: ArrayD<f32>) -> Result<ArrayD<f32>> {
    Ok((array + 1.0) * 127.5)
}

/// The normalization applied by [ProcessInput::preprocess].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreprocessKind {
    Mean,
    Abs1,
    UnAbs1,
}

impl ProcessInput {
    pub fn preprocess(kind: PreprocessKind) -> Self {
        match kind {
            PreprocessKind::Mean => Self::new(preprocess_input_mean),
            PreprocessKind::Abs1 => Self::new(preprocess_input_abs1),
            PreprocessKind::UnAbs1 => Self::new(unpreprocess_input_abs1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn mean_preprocess_reverses_channels() {
        let array = Array3::from_shape_vec((1, 1, 3), vec![10.0f32, 20.0, 30.0])
            .unwrap()
            .into_dyn();
        let output = preprocess_input_mean(array).unwrap();
        let expect = [30.0 - 103.939, 20.0 - 116.779, 10.0 - 123.68];
        izip!(output.iter(), expect).for_each(|(&lhs, rhs)| {
            assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-4);
        });

        let array = ArrayD::<f32>::zeros(IxDyn(&[2, 2, 4]));
        assert!(preprocess_input_mean(array).is_err());
    }

    #[test]
    fn abs1_inverse() {
        let array = Array1::from(vec![0.0f32, 127.5, 255.0]).into_dyn();
        let forward = preprocess_input_abs1(array.clone()).unwrap();
        assert_eq!(forward.into_raw_vec(), vec![-1.0, 0.0, 1.0]);
        let backward = unpreprocess_input_abs1(preprocess_input_abs1(array.clone()).unwrap()).unwrap();
        izip!(backward.iter(), array.iter()).for_each(|(&lhs, &rhs)| {
            assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-4);
        });
    }
}
