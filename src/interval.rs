//! Closed interval arithmetic over `f32`, with explicit NaN handling.
//!
//! An [`Interval`] is a closed pair `(lower, upper)` with `lower <= upper`
//! unless both are NaN (the "undefined" interval). Transcendental
//! functions use monotone-branch analysis where it is cheap and falls
//! back to a conservative bounding envelope otherwise — spec.md's
//! Non-goals explicitly exempt exact transcendental interval arithmetic.

use std::f32::consts::PI;

use crate::opcode::Opcode;

/// A closed interval `[lower, upper]` of `f32`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    /// Lower bound.
    pub lower: f32,
    /// Upper bound.
    pub upper: f32,
}

impl Interval {
    /// The undefined interval: both endpoints NaN.
    pub const NAN: Self = Self {
        lower: f32::NAN,
        upper: f32::NAN,
    };

    /// Build an interval. In debug builds, asserts `lower <= upper` unless
    /// both are NaN — callers are expected to maintain this invariant
    /// (spec.md §3).
    #[must_use]
    pub fn new(lower: f32, upper: f32) -> Self {
        debug_assert!(
            lower <= upper || (lower.is_nan() && upper.is_nan()),
            "interval endpoints out of order: [{lower}, {upper}]"
        );
        Self { lower, upper }
    }

    /// A degenerate interval containing exactly one point.
    #[must_use]
    pub const fn point(v: f32) -> Self {
        Self { lower: v, upper: v }
    }

    /// `true` if either endpoint is NaN (the whole interval is undefined).
    #[must_use]
    pub fn is_nan(self) -> bool {
        self.lower.is_nan() || self.upper.is_nan()
    }

    /// `true` if `v` lies within `[lower, upper]`.
    #[must_use]
    pub fn contains(self, v: f32) -> bool {
        !self.is_nan() && v >= self.lower && v <= self.upper
    }

    /// The interval's width (`upper - lower`); NaN if undefined.
    #[must_use]
    pub fn width(self) -> f32 {
        self.upper - self.lower
    }

    #[must_use]
    pub(crate) fn add(self, other: Self) -> Self {
        if self.is_nan() || other.is_nan() {
            return Self::NAN;
        }
        Self::new(self.lower + other.lower, self.upper + other.upper)
    }

    #[must_use]
    pub(crate) fn sub(self, other: Self) -> Self {
        if self.is_nan() || other.is_nan() {
            return Self::NAN;
        }
        Self::new(self.lower - other.upper, self.upper - other.lower)
    }

    #[must_use]
    pub(crate) fn neg(self) -> Self {
        if self.is_nan() {
            return Self::NAN;
        }
        Self::new(-self.upper, -self.lower)
    }

    #[must_use]
    pub(crate) fn mul(self, other: Self) -> Self {
        if self.is_nan() || other.is_nan() {
            return Self::NAN;
        }
        let candidates = [
            self.lower * other.lower,
            self.lower * other.upper,
            self.upper * other.lower,
            self.upper * other.upper,
        ];
        let lo = candidates.into_iter().fold(f32::INFINITY, f32::min);
        let hi = candidates.into_iter().fold(f32::NEG_INFINITY, f32::max);
        Self::new(lo, hi)
    }

    #[must_use]
    pub(crate) fn div(self, other: Self) -> Self {
        if self.is_nan() || other.is_nan() {
            return Self::NAN;
        }
        // Divisor straddles zero: quotient is unbounded in both directions.
        if other.lower <= 0.0 && other.upper >= 0.0 {
            return Self::new(f32::NEG_INFINITY, f32::INFINITY);
        }
        self.mul(Self::new(1.0 / other.upper, 1.0 / other.lower))
    }

    #[must_use]
    pub(crate) fn min(self, other: Self) -> Self {
        if self.is_nan() || other.is_nan() {
            return Self::NAN;
        }
        Self::new(self.lower.min(other.lower), self.upper.min(other.upper))
    }

    #[must_use]
    pub(crate) fn max(self, other: Self) -> Self {
        if self.is_nan() || other.is_nan() {
            return Self::NAN;
        }
        Self::new(self.lower.max(other.lower), self.upper.max(other.upper))
    }

    #[must_use]
    pub(crate) fn abs(self) -> Self {
        if self.is_nan() {
            return Self::NAN;
        }
        if self.lower >= 0.0 {
            return self;
        }
        if self.upper <= 0.0 {
            return Self::new(-self.upper, -self.lower);
        }
        Self::new(0.0, self.lower.abs().max(self.upper.abs()))
    }

    #[must_use]
    pub(crate) fn square(self) -> Self {
        self.mul(self)
    }

    /// `sqrt(a)`: undefined if `a.upper < 0`; otherwise the lower bound is
    /// clamped to 0 before taking the root, per spec.md §4.1.
    #[must_use]
    pub(crate) fn sqrt(self) -> Self {
        if self.is_nan() || self.upper < 0.0 {
            return Self::NAN;
        }
        Self::new(self.lower.max(0.0).sqrt(), self.upper.sqrt())
    }

    #[must_use]
    pub(crate) fn exp(self) -> Self {
        if self.is_nan() {
            return Self::NAN;
        }
        Self::new(self.lower.exp(), self.upper.exp())
    }

    /// `sin(a)`, accounting for extrema at `pi/2 + 2*pi*k` and `-pi/2 +
    /// 2*pi*k` that may lie strictly inside the interval.
    #[must_use]
    pub(crate) fn sin(self) -> Self {
        periodic_extrema(self, PI / 2.0, -PI / 2.0, f32::sin)
    }

    /// `cos(a) = sin(a + pi/2)` reframed directly in terms of its own
    /// extrema (`0 + 2*pi*k` for the max, `pi + 2*pi*k` for the min).
    #[must_use]
    pub(crate) fn cos(self) -> Self {
        periodic_extrema(self, 0.0, PI, f32::cos)
    }

    /// `tan(a)`: unbounded through any pole `pi/2 + pi*k`.
    #[must_use]
    pub(crate) fn tan(self) -> Self {
        if self.is_nan() {
            return Self::NAN;
        }
        if has_point_congruent_to(self.lower, self.upper, PI / 2.0, PI) {
            return Self::new(f32::NEG_INFINITY, f32::INFINITY);
        }
        Self::new(self.lower.tan(), self.upper.tan())
    }

    /// `asin(a)`, domain `[-1, 1]`, monotone increasing.
    #[must_use]
    pub(crate) fn asin(self) -> Self {
        match clamp_to_domain(self, -1.0, 1.0) {
            Some(c) => Self::new(c.lower.asin(), c.upper.asin()),
            None => Self::NAN,
        }
    }

    /// `acos(a)`, domain `[-1, 1]`, monotone decreasing.
    #[must_use]
    pub(crate) fn acos(self) -> Self {
        match clamp_to_domain(self, -1.0, 1.0) {
            Some(c) => Self::new(c.upper.acos(), c.lower.acos()),
            None => Self::NAN,
        }
    }

    /// `atan(a)`, monotone increasing over the whole real line.
    #[must_use]
    pub(crate) fn atan(self) -> Self {
        if self.is_nan() {
            return Self::NAN;
        }
        Self::new(self.lower.atan(), self.upper.atan())
    }

    /// `atan2(a, b)`: conservative. If `b`'s interval straddles zero the
    /// branch cut may be crossed, so the full range `[-pi, pi]` is
    /// returned; otherwise `b` keeps a fixed sign and corner sampling is
    /// sound because `atan2` varies continuously and monotonically in
    /// each argument over that region.
    #[must_use]
    pub(crate) fn atan2(self, other: Self) -> Self {
        if self.is_nan() || other.is_nan() {
            return Self::NAN;
        }
        if other.lower <= 0.0 && other.upper >= 0.0 {
            return Self::new(-PI, PI);
        }
        let corners = [
            self.lower.atan2(other.lower),
            self.lower.atan2(other.upper),
            self.upper.atan2(other.lower),
            self.upper.atan2(other.upper),
        ];
        let lo = corners.into_iter().fold(f32::INFINITY, f32::min);
        let hi = corners.into_iter().fold(f32::NEG_INFINITY, f32::max);
        Self::new(lo, hi)
    }

    /// `a ^ b`, where `b` must degenerate to a constant (spec.md §4.1).
    ///
    /// # Errors
    /// Returns [`crate::error::EvalError::InvalidOperand`] if `b` is not a
    /// point interval.
    pub(crate) fn pow(self, exponent: Self) -> Result<Self, crate::error::EvalError> {
        if exponent.lower != exponent.upper {
            return Err(crate::error::EvalError::InvalidOperand {
                op: Opcode::Pow,
                reason: "interval exponent of POW must degenerate to a constant",
            });
        }
        if self.is_nan() {
            return Ok(Self::NAN);
        }
        let p = exponent.lower;
        if p == p.trunc() && (0.0..=64.0).contains(&p) {
            #[allow(
                clippy::cast_possible_truncation,
                reason = "p was just checked to be an integer in [0, 64]"
            )]
            let n = p as i32;
            if n % 2 == 0 {
                let lo_p = self.lower.abs().powi(n);
                let hi_p = self.upper.abs().powi(n);
                let lo = if self.lower <= 0.0 && self.upper >= 0.0 {
                    0.0
                } else {
                    lo_p.min(hi_p)
                };
                return Ok(Self::new(lo, lo_p.max(hi_p)));
            }
            return Ok(Self::new(self.lower.powi(n), self.upper.powi(n)));
        }
        if self.lower < 0.0 {
            return Ok(Self::NAN);
        }
        Ok(Self::new(self.lower.powf(p), self.upper.powf(p)))
    }

    /// The `n`-th root of `a`, where `n` must degenerate to a constant,
    /// mirroring [`Interval::pow`]'s contract.
    ///
    /// # Errors
    /// Returns [`crate::error::EvalError::InvalidOperand`] if `n` is not a
    /// point interval.
    pub(crate) fn nth_root(self, n: Self) -> Result<Self, crate::error::EvalError> {
        if n.lower != n.upper {
            return Err(crate::error::EvalError::InvalidOperand {
                op: Opcode::NthRoot,
                reason: "interval root degree of NTH_ROOT must degenerate to a constant",
            });
        }
        if self.is_nan() || n.lower == 0.0 {
            return Ok(Self::NAN);
        }
        let degree = n.lower;
        #[allow(
            clippy::cast_possible_truncation,
            reason = "root degrees are small integers in practice"
        )]
        let is_even = (degree as i64) % 2 == 0;
        if is_even && self.upper < 0.0 {
            return Ok(Self::NAN);
        }
        let root = |v: f32| -> f32 {
            if v < 0.0 {
                -(-v).powf(1.0 / degree)
            } else {
                v.powf(1.0 / degree)
            }
        };
        if is_even {
            Ok(Self::new(self.lower.max(0.0).powf(1.0 / degree), root(self.upper)))
        } else {
            Ok(Self::new(root(self.lower), root(self.upper)))
        }
    }

    /// Coarse envelope `(0, b.upper)`, unconditionally — a known,
    /// documented unsoundness (spec.md §9 Open Questions): it ignores the
    /// sign of `a` and of `b.lower`. Do not "fix" without upstream
    /// guidance; downstream pruning tolerates the slack.
    #[must_use]
    pub(crate) fn rem_euclid_envelope(self, other: Self) -> Self {
        if self.is_nan() || other.is_nan() {
            return Self::NAN;
        }
        Self::new(0.0, other.upper)
    }

    /// `a` unless one of its endpoints is NaN, in which case `b`.
    #[must_use]
    pub(crate) fn nanfill(self, other: Self) -> Self {
        if self.is_nan() { other } else { self }
    }
}

/// `true` if some `target + k * period` (integer `k`) lies in `[lo, hi]`.
fn has_point_congruent_to(lo: f32, hi: f32, target: f32, period: f32) -> bool {
    if !lo.is_finite() || !hi.is_finite() || period <= 0.0 {
        return true;
    }
    if hi - lo >= period {
        return true;
    }
    let k_min = ((lo - target) / period).ceil();
    let k_max = ((hi - target) / period).floor();
    k_min <= k_max
}

/// Shared implementation for `sin`/`cos`: evaluate at both endpoints, then
/// widen to include `+1`/`-1` if a congruent extremum point falls strictly
/// inside the interval.
fn periodic_extrema(
    a: Interval,
    max_at: f32,
    min_at: f32,
    f: fn(f32) -> f32,
) -> Interval {
    if a.is_nan() {
        return Interval::NAN;
    }
    if !a.lower.is_finite() || !a.upper.is_finite() || a.upper - a.lower >= 2.0 * PI {
        return Interval::new(-1.0, 1.0);
    }
    let mut lo = f(a.lower).min(f(a.upper));
    let mut hi = f(a.lower).max(f(a.upper));
    if has_point_congruent_to(a.lower, a.upper, max_at, 2.0 * PI) {
        hi = 1.0;
    }
    if has_point_congruent_to(a.lower, a.upper, min_at, 2.0 * PI) {
        lo = -1.0;
    }
    Interval::new(lo, hi)
}

/// Intersect `a` with `[domain_lo, domain_hi]`; `None` if disjoint.
fn clamp_to_domain(a: Interval, domain_lo: f32, domain_hi: f32) -> Option<Interval> {
    if a.is_nan() || a.upper < domain_lo || a.lower > domain_hi {
        return None;
    }
    Some(Interval::new(
        a.lower.max(domain_lo),
        a.upper.min(domain_hi),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_sub_mul_are_standard() {
        let a = Interval::new(-1.0, 2.0);
        let b = Interval::new(3.0, 4.0);
        assert_eq!(a.add(b), Interval::new(2.0, 6.0));
        assert_eq!(a.sub(b), Interval::new(-5.0, -1.0));
        assert_eq!(a.mul(b), Interval::new(-4.0, 8.0));
    }

    #[test]
    fn div_straddling_zero_is_unbounded() {
        let a = Interval::new(1.0, 2.0);
        let b = Interval::new(-1.0, 1.0);
        let r = a.div(b);
        assert_eq!(r.lower, f32::NEG_INFINITY);
        assert_eq!(r.upper, f32::INFINITY);
    }

    #[test]
    fn sqrt_of_partly_negative_clamps_lower() {
        let a = Interval::new(-4.0, 9.0);
        let r = a.sqrt();
        assert_eq!(r.lower, 0.0);
        assert_eq!(r.upper, 3.0);
    }

    #[test]
    fn sqrt_entirely_negative_is_nan() {
        let a = Interval::new(-4.0, -1.0);
        assert!(a.sqrt().is_nan());
    }

    #[test]
    fn sin_full_period_is_unit_interval() {
        let a = Interval::new(0.0, 10.0);
        let r = a.sin();
        assert_eq!(r, Interval::new(-1.0, 1.0));
    }

    #[test]
    fn sin_small_range_is_tight() {
        let a = Interval::new(0.0, 0.1);
        let r = a.sin();
        assert!(r.lower >= -0.01 && r.upper <= 0.11);
    }

    #[test]
    fn nanfill_substitutes_on_nan() {
        let a = Interval::NAN;
        let b = Interval::new(1.0, 2.0);
        assert_eq!(a.nanfill(b), b);
        let c = Interval::new(0.0, 1.0);
        assert_eq!(c.nanfill(b), c);
    }

    #[test]
    fn pow_requires_constant_exponent() {
        let a = Interval::new(1.0, 2.0);
        let bad_exp = Interval::new(1.0, 3.0);
        assert!(a.pow(bad_exp).is_err());
        assert!(a.pow(Interval::point(2.0)).is_ok());
    }

    #[test]
    fn mod_envelope_matches_spec() {
        let a = Interval::new(-5.0, 5.0);
        let b = Interval::new(-3.0, 3.0);
        assert_eq!(a.rem_euclid_envelope(b), Interval::new(0.0, 3.0));
    }

    #[test]
    fn soundness_spot_check_sphere() {
        // eval_point(x,y,z) in eval_interval(box) for the sphere distance
        // sqrt(x^2+y^2+z^2) - 1 evaluated directly on intervals.
        let x = Interval::new(-1.0, 1.0);
        let y = Interval::new(-1.0, 1.0);
        let z = Interval::new(-1.0, 1.0);
        let r = x.square().add(y.square()).add(z.square()).sqrt().sub(Interval::point(1.0));
        assert!(r.lower <= -1.0 + 1e-6);
        assert!(r.upper >= 3.0_f32.sqrt() - 1.0 - 1e-6);
    }
}
