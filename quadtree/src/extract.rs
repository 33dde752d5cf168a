use common::scalar::Scalar;
use common::shapes::{Aabb, Vec2};

/// How a point tree reads a position out of a payload.
pub trait Locate<T, F: Scalar> {
    fn position(&self, value: &T) -> Vec2<F>;
}

/// How a box tree reads a bounding box out of a payload.
pub trait Extent<T, F: Scalar> {
    fn bounds(&self, value: &T) -> Aabb<F>;
}

/// Payloads that expose their own position.
pub trait Positioned<F: Scalar> {
    fn position(&self) -> Vec2<F>;
}

/// Payloads that expose their own bounding box.
pub trait Bounded<F: Scalar> {
    fn bounds(&self) -> Aabb<F>;
}

/// Default extractor: defer to the payload's [`Positioned`] impl.
#[derive(Clone, Copy, Debug, Default)]
pub struct SelfPosition;

impl<T: Positioned<F>, F: Scalar> Locate<T, F> for SelfPosition {
    #[inline]
    fn position(&self, value: &T) -> Vec2<F> {
        value.position()
    }
}

/// Default extractor: defer to the payload's [`Bounded`] impl.
#[derive(Clone, Copy, Debug, Default)]
pub struct SelfExtent;

impl<T: Bounded<F>, F: Scalar> Extent<T, F> for SelfExtent {
    #[inline]
    fn bounds(&self, value: &T) -> Aabb<F> {
        value.bounds()
    }
}

/// Adapter turning a closure into a position extractor.
#[derive(Clone, Copy, Debug)]
pub struct LocateFn<G>(pub G);

impl<T, F: Scalar, G: Fn(&T) -> Vec2<F>> Locate<T, F> for LocateFn<G> {
    #[inline]
    fn position(&self, value: &T) -> Vec2<F> {
        (self.0)(value)
    }
}

/// Adapter turning a closure into a bounding-box extractor.
#[derive(Clone, Copy, Debug)]
pub struct ExtentFn<G>(pub G);

impl<T, F: Scalar, G: Fn(&T) -> Aabb<F>> Extent<T, F> for ExtentFn<G> {
    #[inline]
    fn bounds(&self, value: &T) -> Aabb<F> {
        (self.0)(value)
    }
}

impl<F: Scalar> Positioned<F> for Vec2<F> {
    #[inline]
    fn position(&self) -> Vec2<F> {
        *self
    }
}

impl<F: Scalar> Bounded<F> for Aabb<F> {
    #[inline]
    fn bounds(&self) -> Aabb<F> {
        *self
    }
}
