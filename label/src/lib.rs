//! Labeled boxes and object detection annotations.

use bbox::{Rect, RectFloat, RectNum, Transform, HW, TLBR};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label<R, C>
where
    R: Rect,
{
    pub rect: R,
    pub class: C,
}

/// A box in ratio units labeled with a class id.
pub type RatioLabel = Label<TLBR<f64>, usize>;

/// The annotation of one image for object detection.
///
/// Boxes are stored in ratio units, i.e. within `[0, 1]` relative to the image
/// height and width, so they survive resizing untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectsAnnotation {
    /// The image file the annotation belongs to, if known.
    pub path: Option<PathBuf>,
    pub objects: Vec<RatioLabel>,
}

impl ObjectsAnnotation {
    pub fn new(objects: Vec<RatioLabel>) -> Self {
        Self {
            path: None,
            objects,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn rects(&self) -> impl Iterator<Item = &TLBR<f64>> + '_ {
        self.objects.iter().map(|label| &label.rect)
    }

    pub fn classes(&self) -> impl Iterator<Item = usize> + '_ {
        self.objects.iter().map(|label| label.class)
    }

    /// Boxes scaled to an image of `height` × `width` pixels and rounded.
    pub fn pixel_rects(&self, height: usize, width: usize) -> Vec<TLBR<f64>> {
        let scale = Transform::from_sizes_exact(
            &unit_size(),
            &HW::from_hw([height as f64, width as f64]),
        );
        self.rects()
            .map(|rect| {
                let [t, l, b, r] = (&scale * rect).tlbr();
                TLBR::from_tlbr([t.round(), l.round(), b.round(), r.round()])
            })
            .collect()
    }

    pub fn flip_lr(&self) -> Self {
        self.map_rects(|rect| Some(rect.flip_lr(&unit_size())))
    }

    pub fn flip_tb(&self) -> Self {
        self.map_rects(|rect| Some(rect.flip_tb(&unit_size())))
    }

    /// Follow the image rotated counter-clockwise by `k` quarter turns.
    pub fn rot90(&self, k: usize) -> Self {
        self.map_rects(|rect| Some(rect.rot90(k, &unit_size())))
    }

    /// Apply a transform in ratio units, then clip to the image.
    ///
    /// Objects left with no area inside the image are dropped.
    pub fn transform(&self, transform: &Transform<f64>) -> Self {
        self.map_rects(|rect| (transform * rect).clip(&unit_size()))
    }

    /// Pairwise intersection flags. The diagonal is always `false`.
    pub fn intersection_matrix(rects: &[TLBR<f64>]) -> Vec<Vec<bool>> {
        rects
            .iter()
            .enumerate()
            .map(|(i, lhs)| {
                rects
                    .iter()
                    .enumerate()
                    .map(|(j, rhs)| i != j && lhs.intersect_with(rhs).is_some())
                    .collect()
            })
            .collect()
    }

    fn map_rects<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&TLBR<f64>) -> Option<TLBR<f64>>,
    {
        let objects = self
            .objects
            .iter()
            .filter_map(|label| {
                Some(Label {
                    rect: f(&label.rect)?,
                    class: label.class,
                })
            })
            .collect();

        Self {
            path: self.path.clone(),
            objects,
        }
    }
}

fn unit_size() -> HW<f64> {
    HW::from_hw([1.0, 1.0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn annotation(ltrb: [f64; 4]) -> ObjectsAnnotation {
        ObjectsAnnotation::new(vec![Label {
            rect: TLBR::try_from_ltrb(ltrb).unwrap(),
            class: 3,
        }])
    }

    #[test]
    fn annotation_flip_lr() {
        let flipped = annotation([0.1, 0.1, 0.5, 0.5]).flip_lr();
        let ltrb = flipped.objects[0].rect.ltrb();
        let expect = [0.5, 0.1, 0.9, 0.5];
        ltrb.iter()
            .zip(expect.iter())
            .for_each(|(&lhs, &rhs)| assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-9));
        assert_eq!(flipped.objects[0].class, 3);
    }

    #[test]
    fn annotation_transform_drops_outside_objects() {
        let mut anno = annotation([0.0, 0.0, 0.25, 0.25]);
        anno.objects.push(Label {
            rect: TLBR::try_from_ltrb([0.5, 0.5, 1.0, 1.0]).unwrap(),
            class: 1,
        });

        // crop the lower right quarter
        let crop = Transform::from_rects(
            &TLBR::from_tlbr([0.5, 0.5, 1.0, 1.0]),
            &TLBR::from_tlbr([0.0, 0.0, 1.0, 1.0]),
        );
        let cropped = anno.transform(&crop);

        assert_eq!(cropped.len(), 1);
        assert_eq!(cropped.objects[0].class, 1);
        assert_eq!(cropped.objects[0].rect.ltrb(), [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn annotation_pixel_rects_and_intersections() {
        let mut anno = annotation([0.1, 0.1, 0.5, 0.5]);
        anno.objects.push(Label {
            rect: TLBR::try_from_ltrb([0.4, 0.4, 0.9, 0.9]).unwrap(),
            class: 0,
        });
        anno.objects.push(Label {
            rect: TLBR::try_from_ltrb([0.0, 0.8, 0.2, 1.0]).unwrap(),
            class: 0,
        });

        let rects = anno.pixel_rects(10, 20);
        assert_eq!(rects[0].ltrb(), [2.0, 1.0, 10.0, 5.0]);

        let matrix = ObjectsAnnotation::intersection_matrix(&rects);
        assert_eq!(
            matrix,
            vec![
                vec![false, true, false],
                vec![true, false, false],
                vec![false, false, false],
            ]
        );
    }
}
