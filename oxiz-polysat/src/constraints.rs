//! Signed constraints over modular polynomials.
//!
//! Two atom kinds cover everything this layer reasons about: unsigned
//! less-or-equal and unsigned multiplication overflow. Richer relations are
//! reduced to signed ULE atoms by the usual identities:
//!
//! - `p = 0`       as  `p <= 0`
//! - `p < q`       as  `~(q <= p)`
//! - `p <=s q`     as  `p + 2^(N-1) <= q + 2^(N-1)`
//! - `parity(p) >= k`  as  `2^(N-k) * p = 0`

use num_bigint::BigUint;
use num_traits::Zero;
use oxiz_modpoly::{word, Poly};
use std::fmt;
use std::ops::Not;

use crate::assignment::Assignment;
use crate::types::{ConstraintId, PVar};

/// An unsigned atom, before the sign is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Atom {
    /// `lhs <= rhs` over unsigned machine words.
    Ule {
        /// Left-hand side.
        lhs: Poly,
        /// Right-hand side.
        rhs: Poly,
    },
    /// `p * q` wraps around `2^N`.
    UmulOvfl {
        /// First factor.
        p: Poly,
        /// Second factor.
        q: Poly,
    },
}

impl Atom {
    /// The bit width of the atom's operands.
    #[must_use]
    pub fn width(&self) -> u32 {
        match self {
            Atom::Ule { lhs, .. } => lhs.width(),
            Atom::UmulOvfl { p, .. } => p.width(),
        }
    }
}

/// An atom together with a sign: positive asserts the atom, negative
/// asserts its complement.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SignedConstraint {
    atom: Atom,
    positive: bool,
}

impl SignedConstraint {
    /// `lhs <= rhs`.
    #[must_use]
    pub fn ule(lhs: Poly, rhs: Poly) -> Self {
        debug_assert_eq!(lhs.width(), rhs.width());
        Self {
            atom: Atom::Ule { lhs, rhs },
            positive: true,
        }
    }

    /// `lhs < rhs`, encoded as `~(rhs <= lhs)`.
    #[must_use]
    pub fn ult(lhs: Poly, rhs: Poly) -> Self {
        !Self::ule(rhs, lhs)
    }

    /// `lhs >= rhs`.
    #[must_use]
    pub fn uge(lhs: Poly, rhs: Poly) -> Self {
        Self::ule(rhs, lhs)
    }

    /// `lhs > rhs`.
    #[must_use]
    pub fn ugt(lhs: Poly, rhs: Poly) -> Self {
        !Self::ule(lhs, rhs)
    }

    /// `p = 0`, encoded as `p <= 0`.
    #[must_use]
    pub fn eq(p: Poly) -> Self {
        let w = p.width();
        Self::ule(p, Poly::zero(w))
    }

    /// `p = q`, encoded as `p - q = 0`.
    #[must_use]
    pub fn eq_pair(p: Poly, q: Poly) -> Self {
        Self::eq(&p - &q)
    }

    /// `p != 0`.
    #[must_use]
    pub fn diseq(p: Poly) -> Self {
        !Self::eq(p)
    }

    /// Signed `lhs <= rhs` via the top-bit offset reduction.
    #[must_use]
    pub fn sle(lhs: Poly, rhs: Poly) -> Self {
        let w = lhs.width();
        let offset = Poly::constant(w, BigUint::from(1u32) << (w - 1));
        Self::ule(&lhs + &offset, &rhs + &offset)
    }

    /// `p * q` overflows `2^N`.
    #[must_use]
    pub fn umul_ovfl(p: Poly, q: Poly) -> Self {
        debug_assert_eq!(p.width(), q.width());
        Self {
            atom: Atom::UmulOvfl { p, q },
            positive: true,
        }
    }

    /// `parity(p) >= k` for `0 <= k <= N`, encoded as `2^(N-k) * p = 0`.
    #[must_use]
    pub fn parity_at_least(p: Poly, k: u32) -> Self {
        let w = p.width();
        debug_assert!(k <= w);
        let shift = BigUint::from(1u32) << (w - k);
        Self::eq(p.mul_val(&word::reduce(shift, w)))
    }

    /// `parity(p) <= k` for `0 <= k < N`.
    #[must_use]
    pub fn parity_at_most(p: Poly, k: u32) -> Self {
        debug_assert!(k < p.width());
        !Self::parity_at_least(p, k + 1)
    }

    /// `p` is even.
    #[must_use]
    pub fn even(p: Poly) -> Self {
        Self::parity_at_least(p, 1)
    }

    /// `p` is odd.
    #[must_use]
    pub fn odd(p: Poly) -> Self {
        !Self::even(p)
    }

    /// The constraint that is always true.
    #[must_use]
    pub fn tt(width: u32) -> Self {
        Self::ule(Poly::zero(width), Poly::zero(width))
    }

    /// The constraint that is always false.
    #[must_use]
    pub fn ff(width: u32) -> Self {
        !Self::tt(width)
    }

    /// The underlying atom.
    #[must_use]
    pub fn atom(&self) -> &Atom {
        &self.atom
    }

    /// Whether the atom is asserted (rather than refuted).
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.positive
    }

    /// Whether the atom is refuted.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        !self.positive
    }

    /// Whether the atom is an unsigned inequality.
    #[must_use]
    pub fn is_ule(&self) -> bool {
        matches!(self.atom, Atom::Ule { .. })
    }

    /// Whether the atom is a multiplication-overflow predicate.
    #[must_use]
    pub fn is_umul_ovfl(&self) -> bool {
        matches!(self.atom, Atom::UmulOvfl { .. })
    }

    /// The two sides of a ULE atom.
    #[must_use]
    pub fn as_ule(&self) -> Option<(&Poly, &Poly)> {
        match &self.atom {
            Atom::Ule { lhs, rhs } => Some((lhs, rhs)),
            Atom::UmulOvfl { .. } => None,
        }
    }

    /// The two factors of an overflow atom.
    #[must_use]
    pub fn as_umul_ovfl(&self) -> Option<(&Poly, &Poly)> {
        match &self.atom {
            Atom::UmulOvfl { p, q } => Some((p, q)),
            Atom::Ule { .. } => None,
        }
    }

    /// The bit width of the constraint's operands.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.atom.width()
    }

    /// Evaluate under the current partial assignment: `None` if some
    /// operand cannot be evaluated yet.
    #[must_use]
    pub fn weak_eval(&self, asn: &Assignment) -> Option<bool> {
        let atom_val = match &self.atom {
            Atom::Ule { lhs, rhs } => {
                let l = asn.try_eval(lhs)?;
                let r = asn.try_eval(rhs)?;
                l <= r
            }
            Atom::UmulOvfl { p, q } => {
                let pv = asn.try_eval(p)?;
                let qv = asn.try_eval(q)?;
                pv * qv > word::max_value(self.width())
            }
        };
        Some(atom_val == self.positive)
    }
}

impl Not for SignedConstraint {
    type Output = SignedConstraint;

    fn not(self) -> SignedConstraint {
        SignedConstraint {
            atom: self.atom,
            positive: !self.positive,
        }
    }
}

impl fmt::Debug for SignedConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for SignedConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            write!(f, "~(")?;
        }
        match &self.atom {
            Atom::Ule { lhs, rhs } => write!(f, "{lhs} <= {rhs}")?,
            Atom::UmulOvfl { p, q } => write!(f, "ovfl({p}, {q})")?,
        }
        if self.is_negative() {
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// A falsified or asserted ULE constraint viewed in canonical inequality
/// form: a negated `p <= q` reads as the strict `q < p`.
#[derive(Debug, Clone)]
pub struct Inequality {
    /// The registered constraint this view was built from.
    pub id: ConstraintId,
    /// Smaller side.
    pub lhs: Poly,
    /// Larger side.
    pub rhs: Poly,
    /// Whether the relation is strict.
    pub strict: bool,
}

impl Inequality {
    /// Build the canonical view of a signed ULE constraint. Returns `None`
    /// for overflow atoms.
    #[must_use]
    pub fn from_ule(id: ConstraintId, sc: &SignedConstraint) -> Option<Self> {
        let (lhs, rhs) = sc.as_ule()?;
        Some(if sc.is_positive() {
            Self {
                id,
                lhs: lhs.clone(),
                rhs: rhs.clone(),
                strict: false,
            }
        } else {
            Self {
                id,
                lhs: rhs.clone(),
                rhs: lhs.clone(),
                strict: true,
            }
        })
    }

    /// The bit width of the inequality's sides.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.lhs.width()
    }

    /// Matches `lhs ~ v` with the right side exactly the variable `v`.
    #[must_use]
    pub fn is_l_v(&self, v: PVar) -> bool {
        self.rhs.as_var() == Some(v) && self.lhs.degree(v) == 0
    }

    /// Matches `v ~ rhs` with the left side exactly the variable `v`.
    #[must_use]
    pub fn is_g_v(&self, v: PVar) -> bool {
        self.lhs.as_var() == Some(v) && self.rhs.degree(v) == 0
    }

    /// Matches `x*Y ~ x*Z` for the pivot variable `x`; returns `(Y, Z)`.
    #[must_use]
    pub fn is_xy_l_xz(&self, x: PVar) -> Option<(Poly, Poly)> {
        let y = factor_out_var(&self.lhs, x)?;
        let z = factor_out_var(&self.rhs, x)?;
        Some((y, z))
    }

    /// Matches `X*y ~ X*Z` for the pivot variable `y`; returns `(X, Z)`.
    #[must_use]
    pub fn is_cy_l_cz(&self, y: PVar) -> Option<(Poly, Poly)> {
        let x = factor_out_var(&self.lhs, y)?;
        let z = self.rhs.try_div(&x)?;
        if z.degree(y) != 0 {
            return None;
        }
        Some((x, z))
    }

    /// Matches `Y*X ~ z*X` for the pivot variable `z`; returns `(X, Y)`.
    #[must_use]
    pub fn is_yc_l_zc(&self, z: PVar) -> Option<(Poly, Poly)> {
        let x = factor_out_var(&self.rhs, z)?;
        if self.lhs.degree(z) != 0 {
            return None;
        }
        let y = self.lhs.try_div(&x)?;
        Some((x, y))
    }

    /// Matches `Y ~ A*x` for the pivot `x`; returns `(A, Y)`.
    #[must_use]
    pub fn is_y_l_ax(&self, x: PVar) -> Option<(Poly, Poly)> {
        if self.lhs.degree(x) != 0 {
            return None;
        }
        let a = factor_out_var(&self.rhs, x)?;
        Some((a, self.lhs.clone()))
    }

    /// Matches `A*x ~ Y` for the pivot `x`; returns `(A, Y)`.
    #[must_use]
    pub fn is_ax_l_y(&self, x: PVar) -> Option<(Poly, Poly)> {
        if self.rhs.degree(x) != 0 {
            return None;
        }
        let a = factor_out_var(&self.lhs, x)?;
        Some((a, self.rhs.clone()))
    }

    /// Matches `A*x + B <= Y` with `Y` currently evaluating to zero, the
    /// inequality shape used for "A*x + B = 0" reasoning; returns
    /// `(A, B, Y)`.
    #[must_use]
    pub fn is_axb_eq_0(&self, x: PVar, asn: &Assignment) -> Option<(Poly, Poly, Poly)> {
        if self.strict || self.lhs.degree(x) != 1 {
            return None;
        }
        if !asn.try_eval(&self.rhs)?.is_zero() {
            return None;
        }
        let (a, b) = self.lhs.factor(x);
        if a.degree(x) != 0 {
            return None;
        }
        Some((a, b, self.rhs.clone()))
    }

    /// Matches `Y < A*x + B` with `Y` currently evaluating to zero, the
    /// shape of a falsified "A*x + B = 0"; returns `(A, B, Y)`.
    #[must_use]
    pub fn is_axb_diseq_0(&self, x: PVar, asn: &Assignment) -> Option<(Poly, Poly, Poly)> {
        if !self.strict || self.rhs.degree(x) != 1 {
            return None;
        }
        if !asn.try_eval(&self.lhs)?.is_zero() {
            return None;
        }
        let (a, b) = self.rhs.factor(x);
        if a.degree(x) != 0 {
            return None;
        }
        Some((a, b, self.lhs.clone()))
    }
}

/// If `p = q * v` exactly (with `q` free of `v`), returns `q`.
fn factor_out_var(p: &Poly, v: PVar) -> Option<Poly> {
    if p.degree(v) != 1 {
        return None;
    }
    let (q, r) = p.factor(v);
    if !r.is_zero() || q.degree(v) != 0 {
        return None;
    }
    Some(q)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(v: u64) -> BigUint {
        BigUint::from(v)
    }

    fn asn(pairs: &[(PVar, u64)]) -> Assignment {
        let mut a = Assignment::new();
        for (v, val) in pairs {
            a.push(*v, b(*val), 8);
        }
        a
    }

    #[test]
    fn test_ule_weak_eval() {
        let x = Poly::var(8, 0);
        let c = SignedConstraint::ule(x.clone(), Poly::val_u64(8, 5));
        assert_eq!(c.weak_eval(&asn(&[(0, 3)])), Some(true));
        assert_eq!(c.weak_eval(&asn(&[(0, 6)])), Some(false));
        assert_eq!(c.weak_eval(&asn(&[])), None);
        assert_eq!((!c).weak_eval(&asn(&[(0, 6)])), Some(true));
    }

    #[test]
    fn test_ult_uge() {
        let x = Poly::var(8, 0);
        let c = SignedConstraint::ult(x.clone(), Poly::val_u64(8, 5));
        assert_eq!(c.weak_eval(&asn(&[(0, 4)])), Some(true));
        assert_eq!(c.weak_eval(&asn(&[(0, 5)])), Some(false));

        let c = SignedConstraint::uge(x.clone(), Poly::val_u64(8, 5));
        assert_eq!(c.weak_eval(&asn(&[(0, 5)])), Some(true));
        assert_eq!(c.weak_eval(&asn(&[(0, 4)])), Some(false));
    }

    #[test]
    fn test_eq_diseq() {
        let x = Poly::var(8, 0);
        let c = SignedConstraint::eq_pair(x.clone(), Poly::val_u64(8, 7));
        assert_eq!(c.weak_eval(&asn(&[(0, 7)])), Some(true));
        assert_eq!(c.weak_eval(&asn(&[(0, 8)])), Some(false));
        let d = SignedConstraint::diseq(&x - 7u64);
        assert_eq!(d.weak_eval(&asn(&[(0, 8)])), Some(true));
    }

    #[test]
    fn test_sle_sign_flip() {
        let x = Poly::var(8, 0);
        // -1 <=s 0 holds, but 255 <= 0 does not hold unsigned
        let c = SignedConstraint::sle(x.clone(), Poly::zero(8));
        assert_eq!(c.weak_eval(&asn(&[(0, 255)])), Some(true));
        assert_eq!(c.weak_eval(&asn(&[(0, 1)])), Some(false));
    }

    #[test]
    fn test_umul_ovfl() {
        let x = Poly::var(8, 0);
        let c = SignedConstraint::umul_ovfl(x.clone(), Poly::val_u64(8, 3));
        assert_eq!(c.weak_eval(&asn(&[(0, 86)])), Some(true)); // 258 > 255
        assert_eq!(c.weak_eval(&asn(&[(0, 85)])), Some(false)); // 255
    }

    #[test]
    fn test_parity_constraints() {
        let x = Poly::var(8, 0);
        let c = SignedConstraint::parity_at_least(x.clone(), 3);
        assert_eq!(c.weak_eval(&asn(&[(0, 8)])), Some(true));
        assert_eq!(c.weak_eval(&asn(&[(0, 4)])), Some(false));
        assert_eq!(c.weak_eval(&asn(&[(0, 0)])), Some(true));

        let c = SignedConstraint::parity_at_most(x.clone(), 2);
        assert_eq!(c.weak_eval(&asn(&[(0, 4)])), Some(true));
        assert_eq!(c.weak_eval(&asn(&[(0, 8)])), Some(false));

        assert_eq!(
            SignedConstraint::even(x.clone()).weak_eval(&asn(&[(0, 6)])),
            Some(true)
        );
        assert_eq!(
            SignedConstraint::odd(x.clone()).weak_eval(&asn(&[(0, 6)])),
            Some(false)
        );
    }

    #[test]
    fn test_tt_ff() {
        assert_eq!(
            SignedConstraint::tt(8).weak_eval(&Assignment::new()),
            Some(true)
        );
        assert_eq!(
            SignedConstraint::ff(8).weak_eval(&Assignment::new()),
            Some(false)
        );
    }

    #[test]
    fn test_inequality_from_negative_ule() {
        let x = Poly::var(8, 0);
        let c = !SignedConstraint::ule(x.clone(), Poly::val_u64(8, 5));
        let i = Inequality::from_ule(ConstraintId(0), &c).unwrap();
        // ~(x <= 5) reads as 5 < x
        assert!(i.strict);
        assert_eq!(i.lhs, Poly::val_u64(8, 5));
        assert_eq!(i.rhs, x);
    }

    #[test]
    fn test_recognizers() {
        let w = 8;
        let x = Poly::var(w, 0);
        let y = Poly::var(w, 1);
        let z = Poly::var(w, 2);

        // y*x <= z*x pivoting on x
        let c = SignedConstraint::ule(&y * &x, &z * &x);
        let i = Inequality::from_ule(ConstraintId(0), &c).unwrap();
        let (fy, fz) = i.is_xy_l_xz(0).unwrap();
        assert_eq!(fy, y);
        assert_eq!(fz, z);
        assert!(i.is_xy_l_xz(1).is_none());

        // 3*y <= 3*z pivoting on y: X = 3, Z = z
        let c = SignedConstraint::ule(&y * 3u64, &z * 3u64);
        let i = Inequality::from_ule(ConstraintId(1), &c).unwrap();
        let (cx, cz) = i.is_cy_l_cz(1).unwrap();
        assert_eq!(cx, Poly::val_u64(w, 3));
        assert_eq!(cz, z);

        // y <= 5*x pivoting on x
        let c = SignedConstraint::ule(y.clone(), &x * 5u64);
        let i = Inequality::from_ule(ConstraintId(2), &c).unwrap();
        let (a, fy) = i.is_y_l_ax(0).unwrap();
        assert_eq!(a, Poly::val_u64(w, 5));
        assert_eq!(fy, y);

        // z <= x  /  x <= z as variable bounds
        let c = SignedConstraint::ule(z.clone(), x.clone());
        let i = Inequality::from_ule(ConstraintId(3), &c).unwrap();
        assert!(i.is_l_v(0));
        assert!(!i.is_g_v(0));
    }

    #[test]
    fn test_is_axb_eq_0() {
        let w = 8;
        let x = Poly::var(w, 0);
        let y = Poly::var(w, 1);
        let p = &(&x * 3u64) + 7u64;
        let c = SignedConstraint::ule(p, y.clone());
        let i = Inequality::from_ule(ConstraintId(0), &c).unwrap();

        let a = asn(&[(1, 0)]);
        let (ca, cb, cy) = i.is_axb_eq_0(0, &a).unwrap();
        assert_eq!(ca, Poly::val_u64(w, 3));
        assert_eq!(cb, Poly::val_u64(w, 7));
        assert_eq!(cy, y);

        // y != 0 blocks the match
        let a = asn(&[(1, 1)]);
        assert!(i.is_axb_eq_0(0, &a).is_none());
    }
}
