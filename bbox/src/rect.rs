use super::TLBR;
use crate::common::*;

/// The generic rectangle.
pub trait Rect {
    type Type;

    fn t(&self) -> Self::Type;
    fn l(&self) -> Self::Type;
    fn b(&self) -> Self::Type;
    fn r(&self) -> Self::Type;
    fn h(&self) -> Self::Type;
    fn w(&self) -> Self::Type;

    fn try_from_tlbr(tlbr: [Self::Type; 4]) -> Result<Self>
    where
        Self: Sized;

    fn try_from_tlhw(tlhw: [Self::Type; 4]) -> Result<Self>
    where
        Self: Sized;
}

pub trait RectNum: Rect
where
    Self::Type: Num + PartialOrd,
{
    fn from_tlbr(tlbr: [Self::Type; 4]) -> Self
    where
        Self: Sized,
    {
        Self::try_from_tlbr(tlbr).unwrap()
    }

    fn from_tlhw(tlhw: [Self::Type; 4]) -> Self
    where
        Self: Sized,
    {
        Self::try_from_tlhw(tlhw).unwrap()
    }

    /// Build from the `[left, top, right, bottom]` (x1, y1, x2, y2) ordering.
    fn try_from_ltrb(ltrb: [Self::Type; 4]) -> Result<Self>
    where
        Self: Sized,
    {
        let [l, t, r, b] = ltrb;
        Self::try_from_tlbr([t, l, b, r])
    }

    fn tlbr(&self) -> [Self::Type; 4] {
        [self.t(), self.l(), self.b(), self.r()]
    }

    /// The `[left, top, right, bottom]` (x1, y1, x2, y2) ordering.
    fn ltrb(&self) -> [Self::Type; 4] {
        [self.l(), self.t(), self.r(), self.b()]
    }

    fn tlhw(&self) -> [Self::Type; 4] {
        [self.t(), self.l(), self.h(), self.w()]
    }

    fn hw(&self) -> [Self::Type; 2] {
        [self.h(), self.w()]
    }

    fn area(&self) -> <Self::Type as Mul<Self::Type>>::Output
    where
        Self::Type: Mul<Self::Type>,
    {
        self.h() * self.w()
    }

    /// Check if the point `(y, x)` lies within the rectangle, borders included.
    fn contains_point(&self, y: Self::Type, x: Self::Type) -> bool {
        self.t() <= y && y <= self.b() && self.l() <= x && x <= self.r()
    }
}

pub trait RectFloat: RectNum
where
    Self::Type: Float,
{
    fn intersect_with<R>(&self, other: &R) -> Option<TLBR<Self::Type>>
    where
        R: Rect<Type = Self::Type>,
    {
        let t = self.t().max(other.t());
        let l = self.l().max(other.l());
        let b = self.b().min(other.b());
        let r = self.r().min(other.r());
        (b > t && r > l).then(|| TLBR::from_tlbr([t, l, b, r]))
    }

    fn intersection_area_with<R>(&self, other: &R) -> Self::Type
    where
        R: Rect<Type = Self::Type>,
    {
        self.intersect_with(other)
            .map(|rect| rect.area())
            .unwrap_or_else(Self::Type::zero)
    }

    /// The four corners and the center point in `(y, x)` order.
    fn key_points(&self) -> [[Self::Type; 2]; 5] {
        let two = Self::Type::one() + Self::Type::one();
        let cy = (self.t() + self.b()) / two;
        let cx = (self.l() + self.r()) / two;
        [
            [self.t(), self.l()],
            [self.b(), self.r()],
            [self.b(), self.l()],
            [self.t(), self.r()],
            [cy, cx],
        ]
    }
}

impl<T> RectNum for T
where
    T: Rect,
    T::Type: Num + PartialOrd,
{
}

impl<T> RectFloat for T
where
    T: Rect,
    T::Type: Float,
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn rect_intersection() {
        let lhs = TLBR::from_tlbr([0.0, 0.0, 2.0, 2.0]);
        let rhs = TLBR::from_tlbr([1.0, 1.0, 3.0, 4.0]);
        assert_eq!(
            lhs.intersect_with(&rhs),
            Some(TLBR::from_tlbr([1.0, 1.0, 2.0, 2.0]))
        );
        assert_abs_diff_eq!(lhs.intersection_area_with(&rhs), 1.0);

        let far = TLBR::from_tlbr([5.0, 5.0, 6.0, 6.0]);
        assert_eq!(lhs.intersect_with(&far), None);
        assert_abs_diff_eq!(lhs.intersection_area_with(&far), 0.0);
    }

    #[test]
    fn rect_ltrb_ordering() {
        let rect = TLBR::try_from_ltrb([0.1, 0.2, 0.5, 0.6]).unwrap();
        assert_eq!(rect.tlbr(), [0.2, 0.1, 0.6, 0.5]);
        assert_eq!(rect.ltrb(), [0.1, 0.2, 0.5, 0.6]);
        assert!(TLBR::try_from_ltrb([0.5, 0.2, 0.1, 0.6]).is_err());
    }

    #[test]
    fn rect_key_points_and_area() {
        let rect = TLBR::from_tlbr([0.0, 2.0, 4.0, 6.0]);
        assert_eq!(rect.key_points()[4], [2.0, 4.0]);
        assert!(rect.contains_point(4.0, 2.0));
        assert_abs_diff_eq!(rect.area(), 16.0);
        assert_eq!(TLBR::from_tlbr([1, 1, 3, 4]).area(), 6);
    }
}
