//! Half-open intervals over machine words with symbolic endpoints.
//!
//! An interval is either `Full`, `Empty`, or a proper `[lo, hi)` range that
//! may wrap around `2^N`. The two degenerate cases carry an explicit tag:
//! equal endpoints cannot distinguish "everything" from "nothing", so
//! endpoint equality alone is never used to decide between them.
//!
//! Endpoints pair a symbolic polynomial with its concrete value under the
//! assignment current at match time. The symbolic half is what clause
//! learning later re-evaluates; keeping the two in one product type stops
//! them from drifting apart.

use num_bigint::BigUint;
use oxiz_modpoly::{word, Poly};
use std::fmt;

/// A symbolic interval endpoint together with its evaluated value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Symbolic endpoint expression, used to reconstruct explanations.
    pub expr: Poly,
    /// Concrete value of `expr` under the assignment at match time.
    pub value: BigUint,
}

impl Endpoint {
    /// Create an endpoint from a symbolic expression and its value.
    #[must_use]
    pub fn new(expr: Poly, value: BigUint) -> Self {
        let value = word::reduce(value, expr.width());
        Self { expr, value }
    }

    /// The endpoint `1 - self`, symbolically and concretely.
    #[must_use]
    pub fn one_minus(&self) -> Self {
        let w = self.expr.width();
        Endpoint {
            expr: &Poly::one(w) - &self.expr,
            value: word::sub(&BigUint::from(1u32), &self.value, w),
        }
    }
}

/// Interval of forbidden word values: full, empty, or half-open `[lo, hi)`
/// with wrap-around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalInterval {
    /// Every value of the domain.
    Full,
    /// No value.
    Empty,
    /// The half-open range `[lo, hi)`, wrapping at `2^N`.
    Proper {
        /// Inclusive lower endpoint.
        lo: Endpoint,
        /// Exclusive upper endpoint.
        hi: Endpoint,
    },
}

impl EvalInterval {
    /// The interval covering the whole domain.
    #[must_use]
    pub fn full() -> Self {
        EvalInterval::Full
    }

    /// The empty interval.
    #[must_use]
    pub fn empty() -> Self {
        EvalInterval::Empty
    }

    /// A proper half-open interval from symbolic/concrete endpoint pairs.
    #[must_use]
    pub fn proper(lo: Endpoint, hi: Endpoint) -> Self {
        debug_assert_eq!(lo.expr.width(), hi.expr.width());
        EvalInterval::Proper { lo, hi }
    }

    /// Whether the interval is tagged full.
    #[must_use]
    pub fn is_full(&self) -> bool {
        matches!(self, EvalInterval::Full)
    }

    /// Whether the interval is tagged empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, EvalInterval::Empty)
    }

    /// Whether the interval is a proper range.
    #[must_use]
    pub fn is_proper(&self) -> bool {
        matches!(self, EvalInterval::Proper { .. })
    }

    /// Whether the interval denotes no values under the current evaluation:
    /// tagged empty, or proper with coinciding endpoint values.
    #[must_use]
    pub fn is_currently_empty(&self) -> bool {
        match self {
            EvalInterval::Empty => true,
            EvalInterval::Full => false,
            EvalInterval::Proper { lo, hi } => lo.value == hi.value,
        }
    }

    /// The lower endpoint of a proper interval.
    #[must_use]
    pub fn lo(&self) -> Option<&Endpoint> {
        match self {
            EvalInterval::Proper { lo, .. } => Some(lo),
            _ => None,
        }
    }

    /// The upper endpoint of a proper interval.
    #[must_use]
    pub fn hi(&self) -> Option<&Endpoint> {
        match self {
            EvalInterval::Proper { hi, .. } => Some(hi),
            _ => None,
        }
    }

    /// Concrete lower endpoint value, if proper.
    #[must_use]
    pub fn lo_val(&self) -> Option<&BigUint> {
        self.lo().map(|e| &e.value)
    }

    /// Concrete upper endpoint value, if proper.
    #[must_use]
    pub fn hi_val(&self) -> Option<&BigUint> {
        self.hi().map(|e| &e.value)
    }

    /// Whether `v` lies in the interval, reading `[lo, hi)` with
    /// wrap-around; a proper interval with coinciding endpoints contains
    /// nothing.
    #[must_use]
    pub fn contains(&self, v: &BigUint) -> bool {
        match self {
            EvalInterval::Full => true,
            EvalInterval::Empty => false,
            EvalInterval::Proper { lo, hi } => {
                let (l, h) = (&lo.value, &hi.value);
                match l.cmp(h) {
                    std::cmp::Ordering::Less => l <= v && v < h,
                    std::cmp::Ordering::Greater => v >= l || v < h,
                    std::cmp::Ordering::Equal => false,
                }
            }
        }
    }

    /// The image of the interval under negation of its variable:
    /// `y in [lo, hi)` iff `-y in [1 - hi, 1 - lo)`.
    ///
    /// Applying the transform twice returns the original interval, which is
    /// what makes it usable for normalizing large coefficients.
    #[must_use]
    pub fn negated(&self) -> EvalInterval {
        match self {
            EvalInterval::Full => EvalInterval::Full,
            EvalInterval::Empty => EvalInterval::Empty,
            EvalInterval::Proper { lo, hi } => EvalInterval::Proper {
                lo: hi.one_minus(),
                hi: lo.one_minus(),
            },
        }
    }
}

impl fmt::Display for EvalInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalInterval::Full => write!(f, "[..]"),
            EvalInterval::Empty => write!(f, "[]"),
            EvalInterval::Proper { lo, hi } => {
                write!(f, "[{}; {}[ = [{}; {}[", lo.expr, hi.expr, lo.value, hi.value)
            }
        }
    }
}
