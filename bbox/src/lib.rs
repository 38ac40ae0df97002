//! Safe bounding box types and the geometric remapping used by image augmentations.

mod common;

pub use transform::*;
mod transform;

pub use rect::*;
pub mod rect;

pub use tlbr::*;
pub mod tlbr;

pub use hw::*;
pub mod hw;

pub mod prelude {
    pub use crate::rect::{Rect, RectFloat, RectNum};
}
