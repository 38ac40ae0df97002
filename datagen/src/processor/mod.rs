//! The built-in operators.

pub mod color;
pub mod erasing;
pub mod geometric;
pub mod load;
pub mod misc;
pub mod mixing;
pub mod preprocess;

pub use color::*;
pub use erasing::*;
pub use geometric::*;
pub use load::*;
pub use misc::*;
pub use mixing::*;
pub use preprocess::*;

use crate::{
    common::*,
    value::{DataRecord, Value},
};
use bbox::{prelude::*, TLBR};
use label::ObjectsAnnotation;

/// Apply `f` to the label if it is an objects annotation.
pub(crate) fn map_objects<F>(y: Option<Value>, f: F) -> Option<Value>
where
    F: FnOnce(&ObjectsAnnotation) -> ObjectsAnnotation,
{
    match y {
        Some(Value::Objects(objects)) => Some(Value::Objects(f(&objects))),
        other => other,
    }
}

/// The whole image in ratio units.
pub(crate) fn unit_rect() -> TLBR<f64> {
    TLBR::from_tlbr([0.0, 0.0, 1.0, 1.0])
}

/// A pixel region of an image of size `hw`, in ratio units.
pub(crate) fn ratio_rect(tlhw: [usize; 4], hw: [usize; 2]) -> TLBR<f64> {
    let [t, l, h, w] = tlhw;
    let [height, width] = hw;
    let (height, width) = (height as f64, width as f64);
    TLBR::from_tlhw([
        t as f64 / height,
        l as f64 / width,
        h as f64 / height,
        w as f64 / width,
    ])
}

/// Run `f` on the input image of the record.
pub(crate) fn map_image<F>(record: DataRecord, f: F) -> Result<DataRecord>
where
    F: FnOnce(Array3<f32>) -> Result<Array3<f32>>,
{
    let DataRecord { x, y, w } = record;
    let image = f(x.into_image()?)?;
    Ok(DataRecord {
        x: image.into(),
        y,
        w,
    })
}
