use super::{Rect, HW};
use crate::{common::*, Transform};

/// Bounding box in TLBR format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TLBR<T> {
    pub(crate) t: T,
    pub(crate) l: T,
    pub(crate) b: T,
    pub(crate) r: T,
}

impl<T> TLBR<T>
where
    T: Copy + Num,
{
    pub fn transform(&self, transform: &Transform<T>) -> Self {
        TLBR {
            t: self.t * transform.sy + transform.ty,
            l: self.l * transform.sx + transform.tx,
            b: self.b * transform.sy + transform.ty,
            r: self.r * transform.sx + transform.tx,
        }
    }
}

impl<T> TLBR<T>
where
    T: Copy + Num + PartialOrd,
{
    /// Mirror the box left-to-right within an image of `size`.
    ///
    /// The horizontal extent is swapped and complemented.
    pub fn flip_lr(&self, size: &HW<T>) -> Self {
        let w = size.w();
        TLBR {
            t: self.t,
            l: w - self.r,
            b: self.b,
            r: w - self.l,
        }
    }

    /// Mirror the box top-to-bottom within an image of `size`.
    pub fn flip_tb(&self, size: &HW<T>) -> Self {
        let h = size.h();
        TLBR {
            t: h - self.b,
            l: self.l,
            b: h - self.t,
            r: self.r,
        }
    }

    /// Rotate the box counter-clockwise by `k` quarter turns.
    ///
    /// `size` is the image size before rotation. For odd `k` the rotated
    /// image has its height and width swapped.
    pub fn rot90(&self, k: usize, size: &HW<T>) -> Self {
        let (h, w) = (size.h(), size.w());
        let Self { t, l, b, r } = *self;

        match k % 4 {
            0 => Self { t, l, b, r },
            1 => Self {
                t: w - r,
                l: t,
                b: w - l,
                r: b,
            },
            2 => Self {
                t: h - b,
                l: w - r,
                b: h - t,
                r: w - l,
            },
            _ => Self {
                t: l,
                l: h - b,
                b: r,
                r: h - t,
            },
        }
    }

    /// Clamp the box into an image of `size`.
    ///
    /// Returns `None` if nothing of the box remains within the image.
    pub fn clip(&self, size: &HW<T>) -> Option<Self> {
        let zero = T::zero();
        let clamp = |val: T, max: T| {
            if val < zero {
                zero
            } else if val > max {
                max
            } else {
                val
            }
        };

        let t = clamp(self.t, size.h());
        let b = clamp(self.b, size.h());
        let l = clamp(self.l, size.w());
        let r = clamp(self.r, size.w());

        (b > t && r > l).then(|| Self { t, l, b, r })
    }
}

impl<T> Rect for TLBR<T>
where
    T: Copy + Num + PartialOrd,
{
    type Type = T;

    fn t(&self) -> Self::Type {
        self.t
    }

    fn l(&self) -> Self::Type {
        self.l
    }

    fn b(&self) -> Self::Type {
        self.b
    }

    fn r(&self) -> Self::Type {
        self.r
    }

    fn h(&self) -> Self::Type {
        self.b - self.t
    }

    fn w(&self) -> Self::Type {
        self.r - self.l
    }

    fn try_from_tlbr(tlbr: [Self::Type; 4]) -> Result<Self> {
        let [t, l, b, r] = tlbr;
        ensure!(b >= t && r >= l, "b >= t and r >= l must hold");

        Ok(Self { t, l, b, r })
    }

    fn try_from_tlhw(tlhw: [Self::Type; 4]) -> Result<Self> {
        let [t, l, h, w] = tlhw;
        let b = t + h;
        let r = l + w;
        Self::try_from_tlbr([t, l, b, r])
    }
}
