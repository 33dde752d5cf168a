use rand::Rng;

use crate::scalar::{Scalar, WideScalar};

/// A point or offset in the plane.
///
/// The derived ordering is lexicographic: first by `x`, then by `y`.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Vec2<F> {
    pub x: F,
    pub y: F,
}

impl<F> Vec2<F> {
    pub fn new(x: F, y: F) -> Self {
        Self { x, y }
    }
}

impl<F: Scalar> std::ops::Add for Vec2<F> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl<F: Scalar> std::ops::Sub for Vec2<F> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Axis-aligned bounding box stored as a center and half-extents.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Aabb<F> {
    pub center: Vec2<F>,
    pub half: Vec2<F>,
}

impl<F: Scalar> Aabb<F> {
    pub fn new(center: Vec2<F>, half: Vec2<F>) -> Self {
        Self { center, half }
    }

    pub fn left(&self) -> F {
        self.center.x - self.half.x
    }

    pub fn right(&self) -> F {
        self.center.x + self.half.x
    }

    pub fn top(&self) -> F {
        self.center.y - self.half.y
    }

    pub fn bottom(&self) -> F {
        self.center.y + self.half.y
    }

    pub fn nw_corner(&self) -> Vec2<F> {
        Vec2::new(self.left(), self.top())
    }

    pub fn ne_corner(&self) -> Vec2<F> {
        Vec2::new(self.right(), self.top())
    }

    pub fn sw_corner(&self) -> Vec2<F> {
        Vec2::new(self.left(), self.bottom())
    }

    pub fn se_corner(&self) -> Vec2<F> {
        Vec2::new(self.right(), self.bottom())
    }

    /// Closed containment: boundary points are inside.
    pub fn contains_point(&self, p: Vec2<F>) -> bool {
        p.x >= self.left() && p.x <= self.right() && p.y >= self.top() && p.y <= self.bottom()
    }

    /// Whether `other` lies entirely inside this box, boundary included.
    pub fn contains_aabb(&self, other: &Aabb<F>) -> bool {
        other.left() >= self.left()
            && other.right() <= self.right()
            && other.top() >= self.top()
            && other.bottom() <= self.bottom()
    }

    /// Overlap test; touching boundaries count as intersecting.
    pub fn intersects(&self, other: &Aabb<F>) -> bool {
        (self.center.x - other.center.x).abs() <= self.half.x + other.half.x
            && (self.center.y - other.center.y).abs() <= self.half.y + other.half.y
    }

    /// Quadrant index for a point: `(south << 1) | east`, with points on
    /// the center lines classified north/west (strict comparison).
    pub fn quadrant_of(&self, p: Vec2<F>) -> usize {
        let east = p.x > self.center.x;
        let south = p.y > self.center.y;
        ((south as usize) << 1) | east as usize
    }

    /// Child sub-box for a quadrant index produced by [`Self::quadrant_of`].
    pub fn quadrant(&self, q: usize) -> Aabb<F> {
        let hx = self.half.x * F::one_half();
        let hy = self.half.y * F::one_half();
        let cx = if q & 1 != 0 {
            self.center.x + hx
        } else {
            self.center.x - hx
        };
        let cy = if q & 2 != 0 {
            self.center.y + hy
        } else {
            self.center.y - hy
        };
        Aabb::new(Vec2::new(cx, cy), Vec2::new(hx, hy))
    }
}

impl Aabb<f32> {
    pub fn random_point_inside<R: Rng>(&self, rng: &mut R) -> Vec2<f32> {
        Vec2::new(
            rng.gen_range(self.left()..=self.right()),
            rng.gen_range(self.top()..=self.bottom()),
        )
    }
}

impl Aabb<f64> {
    pub fn random_point_inside<R: Rng>(&self, rng: &mut R) -> Vec2<f64> {
        Vec2::new(
            rng.gen_range(self.left()..=self.right()),
            rng.gen_range(self.top()..=self.bottom()),
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Circle<F> {
    pub center: Vec2<F>,
    pub radius: F,
}

impl<F: Scalar> Circle<F> {
    pub fn new(center: Vec2<F>, radius: F) -> Self {
        Self { center, radius }
    }

    pub fn contains_point(&self, p: Vec2<F>) -> bool {
        let d = self.center - p;
        F::is_within(d.x, d.y, self.radius)
    }

    /// Minkowski-shrunk distance test: clamp the center's offset to the
    /// box, then compare the remainder against the radius.
    pub fn intersects_aabb(&self, b: &Aabb<F>) -> bool {
        let dx = ((self.center.x - b.center.x).abs() - b.half.x).max_zero();
        let dy = ((self.center.y - b.center.y).abs() - b.half.y).max_zero();
        F::is_within(dx, dy, self.radius)
    }

    pub fn intersects_circle(&self, other: &Circle<F>) -> bool {
        let d = self.center - other.center;
        F::is_within(d.x, d.y, self.radius + other.radius)
    }

    pub fn intersects_line(&self, line: &Line<F>) -> bool {
        line.intersects_circle(self)
    }

    /// Whether the whole disc fits inside the box.
    pub fn within_aabb(&self, b: &Aabb<F>) -> bool {
        let bounding = Aabb::new(self.center, Vec2::new(self.radius, self.radius));
        b.contains_aabb(&bounding)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Line<F> {
    pub a: Vec2<F>,
    pub b: Vec2<F>,
}

fn cross2<F: Scalar>(u: Vec2<F>, v: Vec2<F>) -> F::Wide {
    u.x.wide_mul(v.y) - u.y.wide_mul(v.x)
}

fn dot2<F: Scalar>(u: Vec2<F>, v: Vec2<F>) -> F::Wide {
    u.x.wide_mul(v.x) + u.y.wide_mul(v.y)
}

impl<F: Scalar> Line<F> {
    pub fn new(a: Vec2<F>, b: Vec2<F>) -> Self {
        Self { a, b }
    }

    /// Segment-segment intersection by widened cross-product orientation
    /// tests, with the collinear case handled explicitly.
    pub fn intersects_line(&self, other: &Line<F>) -> bool {
        let zero = F::zero().widen();
        let d1 = cross2::<F>(other.b - other.a, self.a - other.a);
        let d2 = cross2::<F>(other.b - other.a, self.b - other.a);
        let d3 = cross2::<F>(self.b - self.a, other.a - self.a);
        let d4 = cross2::<F>(self.b - self.a, other.b - self.a);
        if ((d1 > zero && d2 < zero) || (d1 < zero && d2 > zero))
            && ((d3 > zero && d4 < zero) || (d3 < zero && d4 > zero))
        {
            return true;
        }
        (d1 == zero && on_segment(other, self.a))
            || (d2 == zero && on_segment(other, self.b))
            || (d3 == zero && on_segment(self, other.a))
            || (d4 == zero && on_segment(self, other.b))
    }

    /// Substitutes the parametric segment into the circle equation and
    /// checks whether the root interval overlaps the segment, entirely in
    /// widened arithmetic.
    pub fn intersects_circle(&self, circle: &Circle<F>) -> bool {
        let zero = F::zero().widen();
        let r = self.b - self.a;
        let f = self.a - circle.center;
        let a = dot2::<F>(r, r);
        let b = dot2::<F>(r, f);
        let c = dot2::<F>(f, f) - circle.radius.wide_mul(circle.radius);
        let disc = b * b - a * c;
        if disc < zero {
            return false;
        }
        // Roots of a t^2 + 2 b t + c, scaled by a: t* = -b +- sqrt(disc).
        // The segment is hit when [t1, t2] overlaps [0, a].
        let d = disc.sqrt();
        let t1 = zero - b - d;
        let t2 = zero - b + d;
        t2 >= zero && t1 <= a
    }

    /// Whether both endpoints (and therefore the segment) lie inside
    /// the box.
    pub fn within_aabb(&self, b: &Aabb<F>) -> bool {
        b.contains_point(self.a) && b.contains_point(self.b)
    }
}

fn on_segment<F: Scalar>(seg: &Line<F>, p: Vec2<F>) -> bool {
    let (min_x, max_x) = if seg.a.x <= seg.b.x {
        (seg.a.x, seg.b.x)
    } else {
        (seg.b.x, seg.a.x)
    };
    let (min_y, max_y) = if seg.a.y <= seg.b.y {
        (seg.a.y, seg.b.y)
    } else {
        (seg.b.y, seg.a.y)
    };
    p.x >= min_x && p.x <= max_x && p.y >= min_y && p.y <= max_y
}

/// Query shape matching everything; traverses the whole tree.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueryAll;

/// A region queries can be run against. Implement this to query the
/// trees with custom shapes.
pub trait QueryShape<F: Scalar> {
    fn intersects_aabb(&self, aabb: &Aabb<F>) -> bool;
    fn contains_point(&self, p: Vec2<F>) -> bool;
}

impl<F: Scalar> QueryShape<F> for Aabb<F> {
    fn intersects_aabb(&self, aabb: &Aabb<F>) -> bool {
        self.intersects(aabb)
    }

    fn contains_point(&self, p: Vec2<F>) -> bool {
        self.contains_point(p)
    }
}

impl<F: Scalar> QueryShape<F> for Circle<F> {
    fn intersects_aabb(&self, aabb: &Aabb<F>) -> bool {
        self.intersects_aabb(aabb)
    }

    fn contains_point(&self, p: Vec2<F>) -> bool {
        self.contains_point(p)
    }
}

impl<F: Scalar> QueryShape<F> for Line<F> {
    fn intersects_aabb(&self, aabb: &Aabb<F>) -> bool {
        if aabb.contains_point(self.a) || aabb.contains_point(self.b) {
            return true;
        }
        let edges = [
            Line::new(aabb.nw_corner(), aabb.ne_corner()),
            Line::new(aabb.ne_corner(), aabb.se_corner()),
            Line::new(aabb.se_corner(), aabb.sw_corner()),
            Line::new(aabb.sw_corner(), aabb.nw_corner()),
        ];
        edges.iter().any(|edge| self.intersects_line(edge))
    }

    /// A point is "contained" when it lies on the segment.
    fn contains_point(&self, p: Vec2<F>) -> bool {
        cross2::<F>(self.b - self.a, p - self.a) == F::zero().widen() && on_segment(self, p)
    }
}

impl<F: Scalar> QueryShape<F> for QueryAll {
    fn intersects_aabb(&self, _aabb: &Aabb<F>) -> bool {
        true
    }

    fn contains_point(&self, _p: Vec2<F>) -> bool {
        true
    }
}
