//! Forbidden-interval derivation from falsified constraints.
//!
//! Given a constraint and a target variable, [`ForbiddenIntervals`] tries to
//! derive a range of values the variable cannot take without violating the
//! constraint under the current assignment of the remaining variables. The
//! technique follows "Solving bitvectors with MCSAT: explanations from bits
//! and pieces" (Graham-Lengrand, Jovanovic, Dutertre).
//!
//! Both sides of an inequality are decomposed as `a*v + e` with `a` a known
//! word value and `e` evaluable under the current assignment; an ordered
//! battery of structural patterns then produces the interval. Each pattern
//! is a pure function returning `Option`; the first success wins, and side
//! conditions are only committed to the output record on success.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use oxiz_modpoly::{word, Poly};
use smallvec::SmallVec;
use std::cmp::Ordering;
use tracing::debug;

use crate::constraints::SignedConstraint;
use crate::core::Core;
use crate::interval::{Endpoint, EvalInterval};
use crate::types::{Dependency, PVar};

/// Result of a successful match: either a genuine forbidden interval for
/// `coeff * v`, or the disequality-linear escape for constraints with two
/// distinct non-zero coefficients, which cannot be captured as one interval
/// and is handed to the caller as a different lemma shape.
#[derive(Debug, Clone)]
pub enum FiKind {
    /// Forbidden interval over `coeff * v`.
    Interval(EvalInterval),
    /// `a1*v + b1 <= a2*v + b2` with `a1 != a2`, both non-zero.
    DiseqLinear {
        /// Coefficient of `v` on the smaller side.
        a1: BigUint,
        /// Evaluated remainder on the smaller side.
        b1: BigUint,
        /// Coefficient of `v` on the larger side.
        a2: BigUint,
        /// Evaluated remainder on the larger side.
        b2: BigUint,
    },
}

/// Output of a successful forbidden-interval match. Consumed immediately by
/// the caller to build a learned clause; nothing here is long-lived.
#[derive(Debug, Clone)]
pub struct FiRecord {
    /// The matched interval or diseq-linear escape.
    pub kind: FiKind,
    /// Conditions that must hold for the interval to be valid, re-checked
    /// by the caller against the model.
    pub side_cond: Vec<SignedConstraint>,
    /// The originating constraint.
    pub src: Option<SignedConstraint>,
    /// Justification dependencies accumulated by the caller.
    pub deps: Vec<Dependency>,
    /// Effective multiplier applied to the target variable: the interval
    /// constrains `coeff * v`.
    pub coeff: BigUint,
    /// Bit width of the reasoning, for sub-word use by the caller.
    pub bit_width: u32,
}

impl FiRecord {
    /// The interval, when the match produced one.
    #[must_use]
    pub fn interval(&self) -> Option<&EvalInterval> {
        match &self.kind {
            FiKind::Interval(iv) => Some(iv),
            FiKind::DiseqLinear { .. } => None,
        }
    }

    /// Order records by concrete lower endpoint, for the caller's
    /// interval-union sweep. Records without a proper interval sort first.
    #[must_use]
    pub fn cmp_by_lo(&self, other: &FiRecord) -> Ordering {
        let zero = BigUint::zero();
        let lo = |r: &FiRecord| {
            r.interval()
                .and_then(EvalInterval::lo_val)
                .cloned()
                .unwrap_or_else(|| zero.clone())
        };
        lo(self).cmp(&lo(other))
    }
}

/// Linear decomposition of one side of a constraint with respect to the
/// target variable: `p = a*v + e` with `eval(e) = b`.
#[derive(Debug, Clone)]
pub struct Decomp {
    /// Concrete coefficient of the target variable.
    pub a: BigUint,
    /// Symbolic remainder, free of the target variable.
    pub e: Poly,
    /// Value of the remainder under the current assignment.
    pub b: BigUint,
    /// Equality pinning a symbolic coefficient to its evaluated value, when
    /// one was needed.
    pub cond: Option<SignedConstraint>,
}

/// A matched pattern before packaging: interval-or-escape, coefficient, and
/// the pattern's own side conditions.
struct Match {
    name: &'static str,
    kind: FiKind,
    coeff: BigUint,
    side: SmallVec<[SignedConstraint; 2]>,
}

/// The forbidden-interval pattern matcher.
pub struct ForbiddenIntervals<'a> {
    core: &'a Core,
}

impl<'a> ForbiddenIntervals<'a> {
    /// Create a matcher reading the given core's assignment and config.
    #[must_use]
    pub fn new(core: &'a Core) -> Self {
        Self { core }
    }

    /// Derive a forbidden interval for `v` from constraint `c`.
    ///
    /// Returns `None` when no pattern applies; that is the normal "try the
    /// next strategy" outcome, never an error.
    #[must_use]
    pub fn get_interval(&self, c: &SignedConstraint, v: PVar) -> Option<FiRecord> {
        let bit_width = self.core.size(v);
        if c.is_ule() {
            self.get_interval_ule(c, v, bit_width)
        } else {
            self.get_interval_umul_ovfl(c, v, bit_width)
        }
    }

    /// Decompose `p` as `a*v + e` with `a` a concrete word value and `e`
    /// evaluable under the current assignment.
    ///
    /// When the coefficient polynomial is not constant but evaluates under
    /// the assignment, the equality between the symbolic coefficient and
    /// its value is emitted as a side condition. Degree two or higher in
    /// `v`, or an unevaluable remainder, fail silently.
    #[must_use]
    pub fn linear_decompose(&self, v: PVar, p: &Poly) -> Option<Decomp> {
        let (q, e) = match p.degree(v) {
            0 => (Poly::zero(p.width()), p.clone()),
            1 => p.factor(v),
            _ => return None,
        };
        let (a, cond) = match q.val() {
            Some(a) => (a, None),
            None => {
                let r = self.core.subst(&q);
                let a = r.val()?;
                (a.clone(), Some(SignedConstraint::eq_pair(q, r)))
            }
        };
        let b = self.core.try_eval(&e)?;
        Some(Decomp { a, e, b, cond })
    }

    fn get_interval_ule(&self, c: &SignedConstraint, v: PVar, w: u32) -> Option<FiRecord> {
        let (lhs, rhs) = c.as_ule()?;
        let d1 = self.linear_decompose(v, lhs);
        let d2 = self.linear_decompose(v, rhs);

        if self.core.config().enable_experimental {
            if let (Some(d1), None) = (&d1, &d2) {
                if let Some(m) = match_non_zero(c, d1, rhs, w) {
                    return Some(self.commit(c, w, Vec::new(), m));
                }
            }
            if let (None, Some(d2)) = (&d1, &d2) {
                if let Some(m) = match_non_max(c, lhs, d2, w) {
                    return Some(self.commit(c, w, Vec::new(), m));
                }
            }
        }

        let d1 = d1?;
        let d2 = d2?;
        if d1.a.is_zero() && d2.a.is_zero() {
            return None;
        }

        let mut base_side = Vec::new();
        base_side.extend(d1.cond.clone());
        base_side.extend(d2.cond.clone());

        let m = match_zero(c, &d1, &d2, w)
            .or_else(|| match_max(c, &d1, &d2, w))
            .or_else(|| match_linear1(c, &d1, &d2, w))
            .or_else(|| match_linear2(c, &d1, &d2, w))
            .or_else(|| match_linear3(c, &d1, &d2, w))
            .or_else(|| match_linear4(c, &d1, &d2, w))?;

        Some(self.commit(c, w, base_side, m))
    }

    /// Package a successful match into the output record. Side conditions
    /// collected during decomposition and matching are only committed here,
    /// so a failed match leaves nothing behind.
    fn commit(
        &self,
        c: &SignedConstraint,
        w: u32,
        mut side: Vec<SignedConstraint>,
        m: Match,
    ) -> FiRecord {
        debug!(target: "polysat", pattern = m.name, constraint = %c, "forbidden interval");
        side.extend(m.side);
        FiRecord {
            kind: m.kind,
            side_cond: side,
            src: Some(c.clone()),
            deps: Vec::new(),
            coeff: m.coeff,
            bit_width: w,
        }
    }

    fn get_interval_umul_ovfl(&self, c: &SignedConstraint, v: PVar, w: u32) -> Option<FiRecord> {
        let (p, q) = c.as_umul_ovfl()?;
        let mut d1 = self.linear_decompose(v, p);
        let mut d2 = self.linear_decompose(v, q);
        let bound = word::max_value(w);

        if d2.is_some() && d1.is_none() {
            std::mem::swap(&mut d1, &mut d2);
        }
        if let (Some(d), None) = (&d1, &d2) {
            // Ovfl(v, q) with q not evaluable: v in {0, 1} can never
            // overflow, whatever q turns out to be.
            if c.is_positive() && d.a.is_one() && d.b.is_zero() {
                let side = d.cond.clone().into_iter().collect();
                let iv = EvalInterval::proper(const_ep(w, 0u32.into()), const_ep(w, 2u32.into()));
                return Some(self.record_ovfl(c, w, side, iv));
            }
        }

        let (d1, d2) = (d1?, d2?);
        let (d1, d2) = if d2.a.is_one() && d1.a.is_zero() {
            (d2, d1)
        } else {
            (d1, d2)
        };
        if !d1.a.is_one() || !d2.a.is_zero() || !d1.b.is_zero() {
            return None;
        }

        let mut side: Vec<SignedConstraint> = Vec::new();
        side.extend(d1.cond);
        side.extend(d2.cond.clone());
        let budget = BigUint::from(self.core.config().ovfl_budget);

        if c.is_positive() {
            if d2.b <= BigUint::one() {
                side.push(SignedConstraint::ule(d2.e, Poly::one(w)));
                return Some(FiRecord {
                    kind: FiKind::Interval(EvalInterval::full()),
                    side_cond: side,
                    src: Some(c.clone()),
                    deps: Vec::new(),
                    coeff: BigUint::one(),
                    bit_width: w,
                });
            }
            // A := (2^N - 1) div b2; the largest B with A*B < 2^N is
            // (2^N + A - 1) div A - 1 = (bound + A) div A - 1.
            let a = &bound / &d2.b;
            let b = (&bound + &a) / &a - BigUint::one();
            if a >= budget && b >= budget {
                return None;
            }
            let hi = &a + BigUint::one();
            side.push(SignedConstraint::ule(d2.e, Poly::constant(w, b)));
            let iv = EvalInterval::proper(const_ep(w, BigUint::zero()), const_ep(w, hi));
            Some(self.record_ovfl(c, w, side, iv))
        } else {
            if d2.b <= BigUint::one() {
                return None;
            }
            // A := (2^N - 1) div b2 + 1; the smallest B with A*B >= 2^N.
            let a = &bound / &d2.b + BigUint::one();
            let b = (&bound + &a) / &a;
            if a >= budget && b >= budget {
                return None;
            }
            side.push(SignedConstraint::ule(Poly::constant(w, d2.b.clone()), d2.e));
            let iv = EvalInterval::proper(const_ep(w, a), const_ep(w, BigUint::zero()));
            Some(self.record_ovfl(c, w, side, iv))
        }
    }

    fn record_ovfl(
        &self,
        c: &SignedConstraint,
        w: u32,
        side: Vec<SignedConstraint>,
        iv: EvalInterval,
    ) -> FiRecord {
        debug!(target: "polysat", constraint = %c, interval = %iv, "overflow interval");
        FiRecord {
            kind: FiKind::Interval(iv),
            side_cond: side,
            src: Some(c.clone()),
            deps: Vec::new(),
            coeff: BigUint::one(),
            bit_width: w,
        }
    }
}

/// A constant endpoint: symbolic and concrete halves coincide.
fn const_ep(w: u32, v: BigUint) -> Endpoint {
    Endpoint::new(Poly::constant(w, v.clone()), v)
}

/// Push the equality (or disequality) between a symbolic boundary
/// expression and the constant it currently evaluates to. Nothing is needed
/// when the expression already is that constant.
fn push_eq(is_zero: bool, p: Poly, side: &mut SmallVec<[SignedConstraint; 2]>) {
    debug_assert!(!p.is_val() || p.is_zero() == is_zero);
    if p.is_val() {
        return;
    }
    if is_zero {
        side.push(SignedConstraint::eq(p));
    } else {
        side.push(SignedConstraint::diseq(p));
    }
}

/// When the effective coefficient is not one, the symbolic remainders must
/// be pinned to their evaluated values for the interval to be valid.
fn add_non_unit_side_conds(
    coeff: &BigUint,
    d1: &Decomp,
    d2: &Decomp,
    w: u32,
    side: &mut SmallVec<[SignedConstraint; 2]>,
) {
    if coeff.is_one() {
        return;
    }
    if !d1.e.is_val() {
        side.push(SignedConstraint::eq_pair(
            d1.e.clone(),
            Poly::constant(w, d1.b.clone()),
        ));
    }
    if !d2.e.is_val() {
        side.push(SignedConstraint::eq_pair(
            d2.e.clone(),
            Poly::constant(w, d2.b.clone()),
        ));
    }
}

/// Normalize endpoints into an interval: the trivial cases collapse to
/// full/empty, a coefficient above `2^(N-1)` is negated (reversing the
/// interval), and a negated source constraint swaps the orientation.
fn to_interval(
    c: &SignedConstraint,
    is_trivial: bool,
    coeff: BigUint,
    lo: Endpoint,
    hi: Endpoint,
    w: u32,
) -> (EvalInterval, BigUint) {
    if is_trivial {
        return (
            if c.is_positive() {
                EvalInterval::empty()
            } else {
                EvalInterval::full()
            },
            coeff,
        );
    }
    let half = BigUint::one() << (w - 1);
    let (lo, hi, coeff) = if coeff > half {
        (hi.one_minus(), lo.one_minus(), word::neg(&coeff, w))
    } else {
        (lo, hi, coeff)
    };
    let iv = if c.is_positive() {
        EvalInterval::proper(lo, hi)
    } else {
        EvalInterval::proper(hi, lo)
    };
    (iv, coeff)
}

/// `a*v + b <= 0` (or its negation) with `a` odd: the equation has the
/// unique solution `-b * a^-1`, so exactly one unit-width interval is
/// forbidden (or everything but it).
fn match_zero(c: &SignedConstraint, d1: &Decomp, d2: &Decomp, w: u32) -> Option<Match> {
    if !d1.a.bit(0) || !d2.a.is_zero() || !d2.b.is_zero() {
        return None;
    }
    let a1_inv = word::inverse(&d1.a, w)?;
    let lo_val = word::mul(&word::neg(&d1.b, w), &a1_inv, w);
    let lo_expr = (-&d1.e).mul_val(&a1_inv);
    let hi_val = word::add(&lo_val, &BigUint::one(), w);
    let hi_expr = &lo_expr + 1u64;
    let (lo, hi) = (
        Endpoint::new(lo_expr, lo_val),
        Endpoint::new(hi_expr, hi_val),
    );
    // the interval for a*v + b > 0 is [n, n+1); for <= 0 the complement
    let (lo, hi) = if c.is_positive() { (hi, lo) } else { (lo, hi) };
    let mut side = SmallVec::new();
    // rhs = 0 is a precondition: a^-1 can only be applied to equations
    if !d2.e.is_val() {
        side.push(SignedConstraint::eq(d2.e.clone()));
    }
    Some(Match {
        name: "match_zero",
        kind: FiKind::Interval(EvalInterval::proper(lo, hi)),
        coeff: BigUint::one(),
        side,
    })
}

/// `-1 <= a*v + b` (or its negation) with `a` odd, anchored at the top of
/// the domain: solution `(-1 - b) * a^-1`.
fn match_max(c: &SignedConstraint, d1: &Decomp, d2: &Decomp, w: u32) -> Option<Match> {
    let maxv = word::max_value(w);
    if !d1.a.is_zero() || d1.b != maxv || !d2.a.bit(0) {
        return None;
    }
    let a2_inv = word::inverse(&d2.a, w)?;
    let lo_val = word::mul(&word::sub(&maxv, &d2.b, w), &a2_inv, w);
    let lo_expr = (&Poly::constant(w, maxv.clone()) - &d2.e).mul_val(&a2_inv);
    let hi_val = word::add(&lo_val, &BigUint::one(), w);
    let hi_expr = &lo_expr + 1u64;
    let (lo, hi) = (
        Endpoint::new(lo_expr, lo_val),
        Endpoint::new(hi_expr, hi_val),
    );
    // the interval for -1 > a*v + b is [n, n+1); for -1 <= the complement
    let (lo, hi) = if c.is_positive() { (hi, lo) } else { (lo, hi) };
    let mut side = SmallVec::new();
    // lhs = -1 is a precondition, as in match_zero
    if !d1.e.is_val() {
        side.push(SignedConstraint::eq_pair(d1.e.clone(), Poly::constant(w, maxv)));
    }
    Some(Match {
        name: "match_max",
        kind: FiKind::Interval(EvalInterval::proper(lo, hi)),
        coeff: BigUint::one(),
        side,
    })
}

/// `e1 + a1*v <= e2` with the right side free of `v`.
/// Trivial (empty/full) exactly when `e2 = -1`.
fn match_linear1(c: &SignedConstraint, d1: &Decomp, d2: &Decomp, w: u32) -> Option<Match> {
    if !d2.a.is_zero() || d1.a.is_zero() {
        return None;
    }
    let is_trivial = word::add(&d2.b, &BigUint::one(), w).is_zero();
    let mut side = SmallVec::new();
    push_eq(is_trivial, &d2.e + 1u64, &mut side);
    let lo = Endpoint::new(
        &(&d2.e - &d1.e) + 1u64,
        word::add(&word::sub(&d2.b, &d1.b, w), &BigUint::one(), w),
    );
    let hi = Endpoint::new(-&d1.e, word::neg(&d1.b, w));
    let (iv, coeff) = to_interval(c, is_trivial, d1.a.clone(), lo, hi, w);
    add_non_unit_side_conds(&coeff, d1, d2, w, &mut side);
    Some(Match {
        name: "match_linear1",
        kind: FiKind::Interval(iv),
        coeff,
        side,
    })
}

/// `e1 <= e2 + a2*v` with the left side free of `v`.
/// Trivial exactly when `e1 = 0`.
fn match_linear2(c: &SignedConstraint, d1: &Decomp, d2: &Decomp, w: u32) -> Option<Match> {
    if !d1.a.is_zero() || d2.a.is_zero() {
        return None;
    }
    let is_trivial = d1.b.is_zero();
    let mut side = SmallVec::new();
    push_eq(is_trivial, d1.e.clone(), &mut side);
    let lo = Endpoint::new(-&d2.e, word::neg(&d2.b, w));
    let hi = Endpoint::new(&d1.e - &d2.e, word::sub(&d1.b, &d2.b, w));
    let (iv, coeff) = to_interval(c, is_trivial, d2.a.clone(), lo, hi, w);
    add_non_unit_side_conds(&coeff, d1, d2, w, &mut side);
    Some(Match {
        name: "match_linear2",
        kind: FiKind::Interval(iv),
        coeff,
        side,
    })
}

/// `e1 + a*v <= e2 + a*v` with the same non-zero coefficient on both
/// sides: the variable's own term cancels structurally.
/// Trivial exactly when `e1 = e2`.
fn match_linear3(c: &SignedConstraint, d1: &Decomp, d2: &Decomp, w: u32) -> Option<Match> {
    if d1.a != d2.a || d1.a.is_zero() {
        return None;
    }
    let is_trivial = d1.b == d2.b;
    let mut side = SmallVec::new();
    push_eq(is_trivial, &d1.e - &d2.e, &mut side);
    let lo = Endpoint::new(-&d2.e, word::neg(&d2.b, w));
    let hi = Endpoint::new(-&d1.e, word::neg(&d1.b, w));
    let (iv, coeff) = to_interval(c, is_trivial, d1.a.clone(), lo, hi, w);
    add_non_unit_side_conds(&coeff, d1, d2, w, &mut side);
    Some(Match {
        name: "match_linear3",
        kind: FiKind::Interval(iv),
        coeff,
        side,
    })
}

/// Distinct non-zero coefficients on both sides: no single interval
/// captures the constraint, so the decomposed pieces are handed out as the
/// disequality-linear lemma shape. A negated constraint swaps the sides.
fn match_linear4(c: &SignedConstraint, d1: &Decomp, d2: &Decomp, w: u32) -> Option<Match> {
    if d1.a == d2.a || d1.a.is_zero() || d2.a.is_zero() {
        return None;
    }
    let kind = if c.is_positive() {
        FiKind::DiseqLinear {
            a1: d1.a.clone(),
            b1: d1.b.clone(),
            a2: d2.a.clone(),
            b2: d2.b.clone(),
        }
    } else {
        FiKind::DiseqLinear {
            a1: d2.a.clone(),
            b1: d2.b.clone(),
            a2: d1.a.clone(),
            b2: d1.b.clone(),
        }
    };
    let mut side = SmallVec::new();
    if !d1.e.is_val() {
        side.push(SignedConstraint::eq_pair(
            d1.e.clone(),
            Poly::constant(w, d1.b.clone()),
        ));
    }
    if !d2.e.is_val() {
        side.push(SignedConstraint::eq_pair(
            d2.e.clone(),
            Poly::constant(w, d2.b.clone()),
        ));
    }
    Some(Match {
        name: "match_linear4",
        kind,
        coeff: BigUint::one(),
        side,
    })
}

/// `a*v - k > q` with the right side not decomposable: a one-sided lower
/// bound anchored at the solution of the left side.
fn match_non_zero(c: &SignedConstraint, d1: &Decomp, q: &Poly, w: u32) -> Option<Match> {
    if c.is_positive() {
        return None;
    }
    if d1.a.is_one() {
        // v - k > q: forbidden [k, k + q + 1), at least [k, k + 1)
        let lo_val = word::neg(&d1.b, w);
        let lo_expr = -&d1.e;
        let hi_val = word::add(&lo_val, &BigUint::one(), w);
        let hi_expr = &(&lo_expr + q) + 1u64;
        let iv = EvalInterval::proper(
            Endpoint::new(lo_expr, lo_val),
            Endpoint::new(hi_expr, hi_val),
        );
        return Some(Match {
            name: "match_non_zero",
            kind: FiKind::Interval(iv),
            coeff: BigUint::one(),
            side: SmallVec::new(),
        });
    }
    if d1.a.bit(0) {
        let inv = word::inverse(&d1.a, w)?;
        let lo_val = word::mul(&word::neg(&d1.b, w), &inv, w);
        let lo_expr = (-&d1.e).mul_val(&inv);
        let hi_val = word::add(&lo_val, &BigUint::one(), w);
        let hi_expr = &lo_expr + 1u64;
        let iv = EvalInterval::proper(
            Endpoint::new(lo_expr, lo_val),
            Endpoint::new(hi_expr, hi_val),
        );
        return Some(Match {
            name: "match_non_zero",
            kind: FiKind::Interval(iv),
            coeff: BigUint::one(),
            side: SmallVec::new(),
        });
    }
    None
}

/// `p > a*v + k` with the left side not decomposable: a one-sided upper
/// bound anchored below the top of the domain.
fn match_non_max(c: &SignedConstraint, p: &Poly, d2: &Decomp, w: u32) -> Option<Match> {
    if c.is_positive() {
        return None;
    }
    if d2.a.is_one() {
        // p > v + k: forbidden [p - k, -k), at least [-1 - k, -k)
        let hi_val = word::neg(&d2.b, w);
        let hi_expr = -&d2.e;
        let lo_val = word::sub(&hi_val, &BigUint::one(), w);
        let lo_expr = p - &d2.e;
        let iv = EvalInterval::proper(
            Endpoint::new(lo_expr, lo_val),
            Endpoint::new(hi_expr, hi_val),
        );
        return Some(Match {
            name: "match_non_max",
            kind: FiKind::Interval(iv),
            coeff: BigUint::one(),
            side: SmallVec::new(),
        });
    }
    if d2.a.bit(0) {
        let inv = word::inverse(&d2.a, w)?;
        let maxv = word::max_value(w);
        let lo_val = word::mul(&word::sub(&maxv, &d2.b, w), &inv, w);
        let lo_expr = (&Poly::constant(w, maxv) - &d2.e).mul_val(&inv);
        let hi_val = word::add(&lo_val, &BigUint::one(), w);
        let hi_expr = &lo_expr + 1u64;
        let iv = EvalInterval::proper(
            Endpoint::new(lo_expr, lo_val),
            Endpoint::new(hi_expr, hi_val),
        );
        return Some(Match {
            name: "match_non_max",
            kind: FiKind::Interval(iv),
            coeff: BigUint::one(),
            side: SmallVec::new(),
        });
    }
    None
}
