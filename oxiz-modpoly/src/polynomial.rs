//! Multivariate polynomials with coefficients in `Z/2^N`.
//!
//! A [`Poly`] is a canonical sum of terms, each a [`Monomial`] (sorted
//! variable powers) times a non-zero coefficient reduced modulo `2^N`.
//! Terms are kept in graded-lexicographic order, largest first, so equal
//! polynomials have identical representations.

use crate::word;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// Variable identifier for polynomials.
pub type Var = u32;

/// Null variable constant (indicates no variable).
pub const NULL_VAR: Var = u32::MAX;

/// Power of a variable (variable, exponent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarPower {
    /// The variable identifier.
    pub var: Var,
    /// The exponent of the variable.
    pub power: u32,
}

impl VarPower {
    /// Create a new variable power.
    #[inline]
    pub fn new(var: Var, power: u32) -> Self {
        Self { var, power }
    }
}

/// A monomial is a product of variables with exponents, represented as a
/// sorted list of (variable, power) pairs. The unit monomial (1) is the
/// empty list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Monomial {
    vars: SmallVec<[VarPower; 4]>,
    total_degree: u32,
}

impl Monomial {
    /// Create the unit monomial (1).
    #[inline]
    pub fn unit() -> Self {
        Self {
            vars: SmallVec::new(),
            total_degree: 0,
        }
    }

    /// Create a monomial from a single variable with power 1.
    #[inline]
    pub fn from_var(var: Var) -> Self {
        Self::from_var_power(var, 1)
    }

    /// Create a monomial from a single variable with a given power.
    pub fn from_var_power(var: Var, power: u32) -> Self {
        if power == 0 {
            return Self::unit();
        }
        let mut vars = SmallVec::new();
        vars.push(VarPower::new(var, power));
        Self {
            total_degree: power,
            vars,
        }
    }

    /// Returns true if this is the unit monomial.
    #[inline]
    pub fn is_unit(&self) -> bool {
        self.vars.is_empty()
    }

    /// Returns the total degree of the monomial.
    #[inline]
    pub fn total_degree(&self) -> u32 {
        self.total_degree
    }

    /// Returns the variable-power pairs.
    #[inline]
    pub fn vars(&self) -> &[VarPower] {
        &self.vars
    }

    /// Returns the degree of a specific variable in this monomial.
    pub fn degree(&self, var: Var) -> u32 {
        self.vars
            .iter()
            .find(|vp| vp.var == var)
            .map(|vp| vp.power)
            .unwrap_or(0)
    }

    /// Multiply two monomials.
    pub fn mul(&self, other: &Monomial) -> Monomial {
        if self.is_unit() {
            return other.clone();
        }
        if other.is_unit() {
            return self.clone();
        }

        let mut vars: SmallVec<[VarPower; 4]> = SmallVec::new();
        let mut i = 0;
        let mut j = 0;
        while i < self.vars.len() && j < other.vars.len() {
            match self.vars[i].var.cmp(&other.vars[j].var) {
                Ordering::Less => {
                    vars.push(self.vars[i]);
                    i += 1;
                }
                Ordering::Greater => {
                    vars.push(other.vars[j]);
                    j += 1;
                }
                Ordering::Equal => {
                    vars.push(VarPower::new(
                        self.vars[i].var,
                        self.vars[i].power + other.vars[j].power,
                    ));
                    i += 1;
                    j += 1;
                }
            }
        }
        vars.extend_from_slice(&self.vars[i..]);
        vars.extend_from_slice(&other.vars[j..]);

        Monomial {
            total_degree: self.total_degree + other.total_degree,
            vars,
        }
    }

    /// Check if `other` divides `self`. Returns the quotient if it does.
    pub fn div(&self, other: &Monomial) -> Option<Monomial> {
        if other.is_unit() {
            return Some(self.clone());
        }

        let mut vars: SmallVec<[VarPower; 4]> = SmallVec::new();
        let mut j = 0;
        for vp in &self.vars {
            if j < other.vars.len() && other.vars[j].var == vp.var {
                if vp.power < other.vars[j].power {
                    return None;
                }
                let new_power = vp.power - other.vars[j].power;
                if new_power > 0 {
                    vars.push(VarPower::new(vp.var, new_power));
                }
                j += 1;
            } else if j < other.vars.len() && other.vars[j].var < vp.var {
                return None;
            } else {
                vars.push(*vp);
            }
        }
        if j < other.vars.len() {
            return None;
        }

        let total_degree = vars.iter().map(|vp| vp.power).sum();
        Some(Monomial { vars, total_degree })
    }

    /// Graded lexicographic comparison (total degree first, then lex).
    pub fn grlex_cmp(&self, other: &Monomial) -> Ordering {
        match self.total_degree.cmp(&other.total_degree) {
            Ordering::Equal => {
                let mut i = 0;
                let mut j = 0;
                while i < self.vars.len() && j < other.vars.len() {
                    match self.vars[i].var.cmp(&other.vars[j].var) {
                        Ordering::Less => return Ordering::Greater,
                        Ordering::Greater => return Ordering::Less,
                        Ordering::Equal => {
                            match self.vars[i].power.cmp(&other.vars[j].power) {
                                Ordering::Equal => {
                                    i += 1;
                                    j += 1;
                                }
                                ord => return ord,
                            }
                        }
                    }
                }
                if i < self.vars.len() {
                    Ordering::Greater
                } else if j < other.vars.len() {
                    Ordering::Less
                } else {
                    Ordering::Equal
                }
            }
            ord => ord,
        }
    }
}

/// One term of a polynomial: a monomial times a non-zero coefficient.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Term {
    /// The monomial part.
    pub mono: Monomial,
    /// The coefficient, reduced into `[1, 2^N)`.
    pub coeff: BigUint,
}

/// A polynomial over `Z/2^N` in canonical form: terms sorted by graded-lex
/// order (largest first), coefficients non-zero and reduced.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Poly {
    width: u32,
    terms: Vec<Term>,
}

impl Poly {
    /// The zero polynomial of the given bit width.
    #[inline]
    pub fn zero(width: u32) -> Self {
        Self {
            width,
            terms: Vec::new(),
        }
    }

    /// The constant one.
    #[inline]
    pub fn one(width: u32) -> Self {
        Self::val_u64(width, 1)
    }

    /// A constant polynomial. The value is reduced modulo `2^width`.
    pub fn constant(width: u32, v: BigUint) -> Self {
        let v = word::reduce(v, width);
        if v.is_zero() {
            return Self::zero(width);
        }
        Self {
            width,
            terms: vec![Term {
                mono: Monomial::unit(),
                coeff: v,
            }],
        }
    }

    /// A constant polynomial from a `u64`.
    #[inline]
    pub fn val_u64(width: u32, v: u64) -> Self {
        Self::constant(width, BigUint::from(v))
    }

    /// The polynomial consisting of a single variable.
    pub fn var(width: u32, v: Var) -> Self {
        Self {
            width,
            terms: vec![Term {
                mono: Monomial::from_var(v),
                coeff: BigUint::one(),
            }],
        }
    }

    /// Build a polynomial from raw (monomial, coefficient) pairs; combines
    /// duplicates and drops zero coefficients.
    pub fn from_terms(width: u32, terms: impl IntoIterator<Item = (Monomial, BigUint)>) -> Self {
        let mut acc: FxHashMap<Monomial, BigUint> = FxHashMap::default();
        for (mono, coeff) in terms {
            let c = word::reduce(coeff, width);
            if c.is_zero() {
                continue;
            }
            let entry = acc.entry(mono).or_insert_with(BigUint::zero);
            *entry = word::add(entry, &c, width);
        }
        let mut terms: Vec<Term> = acc
            .into_iter()
            .filter(|(_, c)| !c.is_zero())
            .map(|(mono, coeff)| Term { mono, coeff })
            .collect();
        terms.sort_by(|a, b| b.mono.grlex_cmp(&a.mono));
        Self { width, terms }
    }

    /// The bit width this polynomial is defined over.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// The terms in canonical order.
    #[inline]
    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// True for the zero polynomial.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// True if the polynomial is a constant (including zero).
    pub fn is_val(&self) -> bool {
        self.terms.len() <= 1 && self.terms.iter().all(|t| t.mono.is_unit())
    }

    /// The constant value, if this polynomial is a constant.
    pub fn val(&self) -> Option<BigUint> {
        if self.terms.is_empty() {
            return Some(BigUint::zero());
        }
        if self.terms.len() == 1 && self.terms[0].mono.is_unit() {
            return Some(self.terms[0].coeff.clone());
        }
        None
    }

    /// True for the constant one.
    pub fn is_one(&self) -> bool {
        self.val().is_some_and(|v| v.is_one())
    }

    /// True for the constant `2^N - 1` (all bits set).
    pub fn is_max(&self) -> bool {
        self.val().is_some_and(|v| v == word::max_value(self.width))
    }

    /// True if the polynomial is a bare variable.
    pub fn is_var(&self) -> bool {
        self.as_var().is_some()
    }

    /// The variable, if this polynomial is a bare variable.
    pub fn as_var(&self) -> Option<Var> {
        if self.terms.len() != 1 {
            return None;
        }
        let t = &self.terms[0];
        if t.coeff.is_one() && t.mono.vars().len() == 1 && t.mono.vars()[0].power == 1 {
            Some(t.mono.vars()[0].var)
        } else {
            None
        }
    }

    /// True if the polynomial has at most one term.
    #[inline]
    pub fn is_monomial(&self) -> bool {
        self.terms.len() <= 1
    }

    /// Coefficient of the leading (graded-lex largest) term; 0 for zero.
    pub fn leading_coefficient(&self) -> BigUint {
        self.terms
            .first()
            .map(|t| t.coeff.clone())
            .unwrap_or_else(BigUint::zero)
    }

    /// Maximum degree of `var` over all terms.
    pub fn degree(&self, var: Var) -> u32 {
        self.terms
            .iter()
            .map(|t| t.mono.degree(var))
            .max()
            .unwrap_or(0)
    }

    /// All variables occurring in the polynomial, ascending, deduplicated.
    pub fn free_vars(&self) -> Vec<Var> {
        let mut vars: Vec<Var> = self
            .terms
            .iter()
            .flat_map(|t| t.mono.vars().iter().map(|vp| vp.var))
            .collect();
        vars.sort_unstable();
        vars.dedup();
        vars
    }

    /// Factor out one power of `var`: returns `(q, r)` with
    /// `self = q * var + r`.
    ///
    /// Every term containing `var` contributes to `q` (divided once by
    /// `var`); the remaining terms form `r`, which has degree 0 in `var`.
    pub fn factor(&self, var: Var) -> (Poly, Poly) {
        let v_mono = Monomial::from_var(var);
        let mut q = Vec::new();
        let mut r = Vec::new();
        for t in &self.terms {
            match t.mono.div(&v_mono) {
                Some(m) => q.push((m, t.coeff.clone())),
                None => r.push((t.mono.clone(), t.coeff.clone())),
            }
        }
        (
            Poly::from_terms(self.width, q),
            Poly::from_terms(self.width, r),
        )
    }

    /// Evaluate under a (total for this polynomial) assignment. Returns
    /// `None` if any occurring variable is unassigned.
    pub fn eval(&self, assignment: &FxHashMap<Var, BigUint>) -> Option<BigUint> {
        let mut acc = BigUint::zero();
        for t in &self.terms {
            let mut term_val = t.coeff.clone();
            for vp in t.mono.vars() {
                let v = assignment.get(&vp.var)?;
                term_val = word::mul(&term_val, &word::reduce(v.pow(vp.power), self.width), self.width);
            }
            acc = word::add(&acc, &term_val, self.width);
        }
        Some(acc)
    }

    /// Substitute assigned variables, leaving the rest symbolic.
    pub fn subst(&self, assignment: &FxHashMap<Var, BigUint>) -> Poly {
        let mut out: Vec<(Monomial, BigUint)> = Vec::with_capacity(self.terms.len());
        for t in &self.terms {
            let mut coeff = t.coeff.clone();
            let mut residual: SmallVec<[VarPower; 4]> = SmallVec::new();
            for vp in t.mono.vars() {
                match assignment.get(&vp.var) {
                    Some(v) => {
                        coeff =
                            word::mul(&coeff, &word::reduce(v.pow(vp.power), self.width), self.width);
                    }
                    None => residual.push(*vp),
                }
            }
            let total_degree = residual.iter().map(|vp| vp.power).sum();
            out.push((
                Monomial {
                    vars: residual,
                    total_degree,
                },
                coeff,
            ));
        }
        Poly::from_terms(self.width, out)
    }

    /// Exact division by a single-term polynomial, if possible.
    ///
    /// The divisor coefficient `2^k * d` (with `d` odd) divides a term
    /// coefficient `c` iff `c` has at least `k` trailing zeros; the monomial
    /// part must divide term-wise. Multi-term divisors are not supported and
    /// return `None`.
    pub fn try_div(&self, divisor: &Poly) -> Option<Poly> {
        debug_assert_eq!(self.width, divisor.width);
        if divisor.is_zero() {
            return None;
        }
        if divisor.is_one() {
            return Some(self.clone());
        }
        if divisor.terms.len() != 1 {
            return None;
        }
        let d = &divisor.terms[0];
        let k = d.coeff.trailing_zeros().unwrap_or(0);
        let odd = &d.coeff >> k;
        let odd_inv = word::inverse(&odd, self.width)?;
        let mut out = Vec::with_capacity(self.terms.len());
        for t in &self.terms {
            let mono = t.mono.div(&d.mono)?;
            if t.coeff.trailing_zeros().unwrap_or(0) < k {
                return None;
            }
            let coeff = word::mul(&(&t.coeff >> k), &odd_inv, self.width);
            out.push((mono, coeff));
        }
        Some(Poly::from_terms(self.width, out))
    }

    /// Multiply by a constant.
    pub fn mul_val(&self, c: &BigUint) -> Poly {
        Poly::from_terms(
            self.width,
            self.terms
                .iter()
                .map(|t| (t.mono.clone(), word::mul(&t.coeff, c, self.width))),
        )
    }

    fn add_impl(&self, other: &Poly, negate_other: bool) -> Poly {
        debug_assert_eq!(self.width, other.width);
        let lhs = self.terms.iter().map(|t| (t.mono.clone(), t.coeff.clone()));
        let rhs = other.terms.iter().map(|t| {
            let c = if negate_other {
                word::neg(&t.coeff, self.width)
            } else {
                t.coeff.clone()
            };
            (t.mono.clone(), c)
        });
        Poly::from_terms(self.width, lhs.chain(rhs))
    }
}

impl Neg for &Poly {
    type Output = Poly;

    fn neg(self) -> Poly {
        Poly::from_terms(
            self.width,
            self.terms
                .iter()
                .map(|t| (t.mono.clone(), word::neg(&t.coeff, self.width))),
        )
    }
}

impl Neg for Poly {
    type Output = Poly;

    fn neg(self) -> Poly {
        -&self
    }
}

impl Add<&Poly> for &Poly {
    type Output = Poly;

    fn add(self, rhs: &Poly) -> Poly {
        self.add_impl(rhs, false)
    }
}

impl Add for Poly {
    type Output = Poly;

    fn add(self, rhs: Poly) -> Poly {
        &self + &rhs
    }
}

impl Sub<&Poly> for &Poly {
    type Output = Poly;

    fn sub(self, rhs: &Poly) -> Poly {
        self.add_impl(rhs, true)
    }
}

impl Sub for Poly {
    type Output = Poly;

    fn sub(self, rhs: Poly) -> Poly {
        &self - &rhs
    }
}

impl Mul<&Poly> for &Poly {
    type Output = Poly;

    fn mul(self, rhs: &Poly) -> Poly {
        debug_assert_eq!(self.width, rhs.width);
        let mut out = Vec::with_capacity(self.terms.len() * rhs.terms.len());
        for a in &self.terms {
            for b in &rhs.terms {
                out.push((
                    a.mono.mul(&b.mono),
                    word::mul(&a.coeff, &b.coeff, self.width),
                ));
            }
        }
        Poly::from_terms(self.width, out)
    }
}

impl Mul for Poly {
    type Output = Poly;

    fn mul(self, rhs: Poly) -> Poly {
        &self * &rhs
    }
}

impl Add<u64> for &Poly {
    type Output = Poly;

    fn add(self, rhs: u64) -> Poly {
        self + &Poly::val_u64(self.width, rhs)
    }
}

impl Sub<u64> for &Poly {
    type Output = Poly;

    fn sub(self, rhs: u64) -> Poly {
        self - &Poly::val_u64(self.width, rhs)
    }
}

impl Mul<u64> for &Poly {
    type Output = Poly;

    fn mul(self, rhs: u64) -> Poly {
        self.mul_val(&BigUint::from(rhs))
    }
}

impl fmt::Debug for Poly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Poly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0");
        }
        for (i, t) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            if t.mono.is_unit() {
                write!(f, "{}", t.coeff)?;
                continue;
            }
            if !t.coeff.is_one() {
                write!(f, "{}*", t.coeff)?;
            }
            for (j, vp) in t.mono.vars().iter().enumerate() {
                if j > 0 {
                    write!(f, "*")?;
                }
                if vp.power == 1 {
                    write!(f, "v{}", vp.var)?;
                } else {
                    write!(f, "v{}^{}", vp.var, vp.power)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(v: u64) -> BigUint {
        BigUint::from(v)
    }

    #[test]
    fn test_constant_normalization() {
        let p = Poly::val_u64(8, 256);
        assert!(p.is_zero());
        let q = Poly::val_u64(8, 300);
        assert_eq!(q.val(), Some(b(44)));
    }

    #[test]
    fn test_add_cancels() {
        let x = Poly::var(8, 0);
        let p = &(&x * 3u64) + 7u64;
        let q = &(-&x) * 3u64;
        let r = &p + &q;
        assert_eq!(r.val(), Some(b(7)));
    }

    #[test]
    fn test_mul_reduces_mod_width() {
        let x = Poly::var(4, 0);
        // 8 * 2 * x = 16x = 0 mod 16
        let p = &(&x * 8u64) * 2u64;
        assert!(p.is_zero());
    }

    #[test]
    fn test_degree_and_factor() {
        let w = 8;
        let x = Poly::var(w, 0);
        let y = Poly::var(w, 1);
        // p = 3xy + 2x + 5
        let p = &(&(&(&x * &y) * 3u64) + &(&x * 2u64)) + 5u64;
        assert_eq!(p.degree(0), 1);
        assert_eq!(p.degree(1), 1);
        assert_eq!(p.degree(2), 0);

        let (q, r) = p.factor(0);
        // q = 3y + 2, r = 5
        assert_eq!(q, &(&y * 3u64) + 2u64);
        assert_eq!(r, Poly::val_u64(w, 5));
        assert_eq!(&(&q * &x) + &r, p);
    }

    #[test]
    fn test_factor_square() {
        let w = 8;
        let x = Poly::var(w, 0);
        let p = &x * &x;
        let (q, r) = p.factor(0);
        assert_eq!(q, x);
        assert!(r.is_zero());
    }

    #[test]
    fn test_eval() {
        let w = 8;
        let x = Poly::var(w, 0);
        let y = Poly::var(w, 1);
        let p = &(&(&x * &y) + &(&x * 2u64)) + 1u64;
        let mut asn = FxHashMap::default();
        asn.insert(0u32, b(10));
        assert!(p.eval(&asn).is_none());
        asn.insert(1u32, b(20));
        // 10*20 + 2*10 + 1 = 221
        assert_eq!(p.eval(&asn), Some(b(221)));
    }

    #[test]
    fn test_subst_partial() {
        let w = 8;
        let x = Poly::var(w, 0);
        let y = Poly::var(w, 1);
        let p = &(&x * &y) + &(&y * 7u64);
        let mut asn = FxHashMap::default();
        asn.insert(0u32, b(3));
        // x := 3  =>  3y + 7y = 10y
        let q = p.subst(&asn);
        assert_eq!(q, &y * 10u64);
    }

    #[test]
    fn test_try_div_constant() {
        let w = 8;
        let x = Poly::var(w, 0);
        // 6x + 10 divided by 2 => 3x + 5
        let p = &(&x * 6u64) + 10u64;
        let q = p.try_div(&Poly::val_u64(w, 2)).unwrap();
        assert_eq!(q, &(&x * 3u64) + 5u64);
        assert_eq!(&q * 2u64, p);

        // odd coefficient cannot be halved
        let p = &(&x * 6u64) + 5u64;
        assert!(p.try_div(&Poly::val_u64(w, 2)).is_none());
    }

    #[test]
    fn test_try_div_monomial() {
        let w = 8;
        let x = Poly::var(w, 0);
        let y = Poly::var(w, 1);
        // (3xy + 6x) / 3x = y + 2
        let p = &(&(&x * &y) * 3u64) + &(&x * 6u64);
        let q = p.try_div(&(&x * 3u64)).unwrap();
        assert_eq!(q, &y + 2u64);

        // y is not a factor
        assert!(p.try_div(&y).is_none());
    }

    #[test]
    fn test_try_div_odd_inverse() {
        let w = 8;
        let x = Poly::var(w, 0);
        // (3x) / 3 = x via inverse of 3 mod 256
        let p = &x * 3u64;
        assert_eq!(p.try_div(&Poly::val_u64(w, 3)).unwrap(), x);
    }

    #[test]
    fn test_as_var() {
        let x = Poly::var(8, 5);
        assert_eq!(x.as_var(), Some(5));
        assert!((&x * 2u64).as_var().is_none());
        assert!(Poly::val_u64(8, 1).as_var().is_none());
    }

    #[test]
    fn test_is_max() {
        assert!(Poly::val_u64(8, 255).is_max());
        assert!(!Poly::val_u64(8, 254).is_max());
    }

    #[test]
    fn test_leading_coefficient() {
        let w = 8;
        let x = Poly::var(w, 0);
        let y = Poly::var(w, 1);
        let p = &(&(&x * &y) * 4u64) + &(&x * 3u64);
        assert_eq!(p.leading_coefficient(), b(4));
        assert_eq!(Poly::zero(w).leading_coefficient(), b(0));
    }

    #[test]
    fn test_display() {
        let w = 8;
        let x = Poly::var(w, 0);
        let p = &(&x * 3u64) + 7u64;
        assert_eq!(format!("{p}"), "3*v0 + 7");
    }
}
