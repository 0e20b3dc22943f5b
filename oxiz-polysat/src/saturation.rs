//! Saturation: auxiliary inference rules over the unsat core.
//!
//! Where the forbidden-interval matcher explains a conflict through one
//! constraint, saturation combines the falsified constraint with other
//! members of the unsat core or with currently assigned constraints to
//! either propagate a new literal or record a redundant learned clause.
//! Every rule follows the same shape: match the falsified inequality
//! against a required syntactic form, search for a complementary
//! constraint, assemble the explanation set, attempt the propagation.
//! Rules are independent; a failed rule leaves no state behind.
//!
//! The enabled battery: equality inference, the three overflow-monotonicity
//! rules, multiplication-by-bound chaining, parity propagation with
//! correction lemmas, the multiplication bound/unit/odd rules, and
//! transitivity. The bilinear-form utilities for product bound tightening
//! are kept with the rule set; the tightening rule itself is still being
//! validated upstream and is not part of the battery.

use num_bigint::{BigInt, BigUint};
use num_traits::{One, Signed, Zero};
use oxiz_modpoly::{word, Poly};
use smallvec::{smallvec, SmallVec};
use tracing::debug;

use crate::constraints::{Inequality, SignedConstraint};
use crate::core::Core;
use crate::types::{ConstraintId, PVar};

/// The bilinear form `a*x*y + b*x + c*y + d` over symmetric (signed)
/// representatives modulo `2^N`. Exists transiently during a single
/// inference attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bilinear {
    /// Coefficient of `x*y`.
    pub a: BigInt,
    /// Coefficient of `x`.
    pub b: BigInt,
    /// Coefficient of `y`.
    pub c: BigInt,
    /// Constant term.
    pub d: BigInt,
}

impl Bilinear {
    /// Evaluate at the point `(x, y)`.
    #[must_use]
    pub fn eval(&self, x: &BigInt, y: &BigInt) -> BigInt {
        &self.a * x * y + &self.b * x + &self.c * y + &self.d
    }

    /// Shift the constant term.
    #[must_use]
    pub fn offset(&self, d: i64) -> Bilinear {
        Bilinear {
            a: self.a.clone(),
            b: self.b.clone(),
            c: self.c.clone(),
            d: &self.d + d,
        }
    }
}

impl std::ops::Neg for &Bilinear {
    type Output = Bilinear;

    fn neg(self) -> Bilinear {
        Bilinear {
            a: -&self.a,
            b: -&self.b,
            c: -&self.c,
            d: -&self.d,
        }
    }
}

impl std::ops::Sub<&Bilinear> for &Bilinear {
    type Output = Bilinear;

    fn sub(self, other: &Bilinear) -> Bilinear {
        Bilinear {
            a: &self.a - &other.a,
            b: &self.b - &other.b,
            c: &self.c - &other.c,
            d: &self.d - &other.d,
        }
    }
}

/// The symmetric representative of `x` in `(-M/2, M/2]`.
fn round(m: &BigInt, x: &BigUint) -> BigInt {
    let xi = BigInt::from(x.clone());
    let half = m >> 1usize;
    if xi > half {
        xi - m
    } else {
        xi
    }
}

fn div_floor(a: &BigInt, b: &BigInt) -> BigInt {
    let q = a / b;
    let r = a % b;
    if !r.is_zero() && r.is_negative() != b.is_negative() {
        q - 1
    } else {
        q
    }
}

fn div_ceil(a: &BigInt, b: &BigInt) -> BigInt {
    let q = a / b;
    let r = a % b;
    if !r.is_zero() && r.is_negative() == b.is_negative() {
        q + 1
    } else {
        q
    }
}

fn ineq(strict: bool, lhs: Poly, rhs: Poly) -> SignedConstraint {
    if strict {
        SignedConstraint::ult(lhs, rhs)
    } else {
        SignedConstraint::ule(lhs, rhs)
    }
}

/// The saturation engine, borrowing the core for the duration of one
/// inference run.
pub struct Saturation<'a> {
    core: &'a mut Core,
}

impl<'a> Saturation<'a> {
    /// Create an engine over the given core.
    pub fn new(core: &'a mut Core) -> Self {
        Self { core }
    }

    /// Run the rule battery for `v` against every member of the unsat
    /// core. Returns whether anything was propagated or learned.
    pub fn saturate(&mut self, v: PVar) -> bool {
        let ids: SmallVec<[ConstraintId; 8]> = self.core.unsat_core().iter().copied().collect();
        let mut any = false;
        for id in ids {
            if self.saturate_constraint(v, id) {
                any = true;
            }
        }
        any
    }

    /// Run the rule battery for `v` against one constraint.
    pub fn saturate_constraint(&mut self, v: PVar, id: ConstraintId) -> bool {
        let sc = self.core.effective_constraint(id);
        if sc.weak_eval(self.core.assignment()) == Some(true) {
            return false;
        }
        let Some(i) = Inequality::from_ule(id, &sc) else {
            return false;
        };
        if self.core.size(v) != i.width() {
            return false;
        }
        self.try_inequality(v, &i)
    }

    fn try_inequality(&mut self, v: PVar, i: &Inequality) -> bool {
        let mut any = false;
        if self.try_infer_equality(v, i) {
            any = true;
        }
        if self.try_ugt_x(v, i) {
            any = true;
        }
        if self.try_ugt_y(v, i) {
            any = true;
        }
        if self.try_ugt_z(v, i) {
            any = true;
        }
        if self.try_y_l_ax_and_x_l_z(v, i) {
            any = true;
        }
        if self.try_mul_bounds(v, i) {
            any = true;
        }
        if self.try_mul_eq_1(v, i) {
            any = true;
        }
        if self.try_mul_odd(v, i) {
            any = true;
        }
        if self.try_parity(v, i) {
            any = true;
        }
        if self.try_parity_diseq(v, i) {
            any = true;
        }
        if self.try_transitivity(v, i) {
            any = true;
        }
        any
    }

    /// Attempt a propagation with its explanation set: the premises must be
    /// registered constraints, the explain literals currently-false side
    /// conditions. A propagation whose clause is already satisfied (some
    /// explain literal holds) is skipped.
    fn propagate_rule(
        &mut self,
        rule: &'static str,
        premises: SmallVec<[ConstraintId; 4]>,
        explain: Vec<SignedConstraint>,
        conclusion: SignedConstraint,
    ) -> bool {
        if explain.iter().any(|sc| self.core.is_forced_true(sc)) {
            return false;
        }
        debug!(target: "polysat", rule, conclusion = %conclusion, "saturation");
        self.core.propagate(conclusion, premises, explain)
    }

    fn add_lemma_rule(
        &mut self,
        rule: &'static str,
        premises: SmallVec<[ConstraintId; 4]>,
        literals: Vec<SignedConstraint>,
    ) -> bool {
        self.core.add_lemma(rule, premises, literals, false)
    }

    fn is_forced_eq(&self, p: &Poly, val: &BigUint) -> bool {
        self.core.try_eval(p).as_ref() == Some(val)
    }

    fn is_non_overflow(&self, a: &Poly, b: &Poly) -> bool {
        let bound = word::modulus(a.width());
        match (self.core.try_eval(a), self.core.try_eval(b)) {
            (Some(av), Some(bv)) => av * bv < bound,
            _ => false,
        }
    }

    /// Collect the assigned constraints as inequality views, skipping `me`.
    fn assigned_inequalities(&self, me: ConstraintId) -> Vec<Inequality> {
        self.core
            .assigned_constraints()
            .iter()
            .filter(|&&id| id != me)
            .filter_map(|&id| Inequality::from_ule(id, &self.core.effective_constraint(id)))
            .collect()
    }

    /// Collect the unsat core as inequality views, skipping `me`.
    fn core_inequalities(&self, me: ConstraintId) -> Vec<Inequality> {
        self.core
            .unsat_core()
            .iter()
            .filter(|&&id| id != me)
            .filter_map(|&id| Inequality::from_ule(id, &self.core.effective_constraint(id)))
            .collect()
    }

    /// `p <= q, q <= p => p = q`, matching the mirror inequality in the
    /// unsat core.
    fn try_infer_equality(&mut self, x: PVar, i: &Inequality) -> bool {
        if i.strict {
            return false;
        }
        if i.lhs.degree(x) == 0 && i.rhs.degree(x) == 0 {
            return false;
        }
        let found = self.core.unsat_core().iter().copied().find(|&id| {
            if id == i.id {
                return false;
            }
            let sc = self.core.effective_constraint(id);
            sc.is_positive()
                && sc
                    .as_ule()
                    .is_some_and(|(l, r)| *l == i.rhs && *r == i.lhs)
        });
        let Some(id) = found else {
            return false;
        };
        self.propagate_rule(
            "p <= q & q <= p => p = q",
            smallvec![id, i.id],
            vec![],
            SignedConstraint::eq_pair(i.lhs.clone(), i.rhs.clone()),
        )
    }

    /// `[x] y*x < z*x  ==>  ovfl(x,y) \/ y < z` and the non-strict variant
    /// with the extra `x = 0` escape.
    fn try_ugt_x(&mut self, v: PVar, i: &Inequality) -> bool {
        let x = self.core.var(v);
        let Some((y, z)) = i.is_xy_l_xz(v) else {
            return false;
        };
        let ovfl = SignedConstraint::umul_ovfl(x.clone(), y.clone());
        if i.strict {
            self.add_lemma_rule(
                "yx < zx => ovfl(x,y) or y < z",
                smallvec![i.id],
                vec![ovfl, SignedConstraint::ult(y, z)],
            )
        } else {
            self.add_lemma_rule(
                "yx <= zx => ovfl(x,y) or y <= z or x = 0",
                smallvec![i.id],
                vec![ovfl, SignedConstraint::eq(x), SignedConstraint::ule(y, z)],
            )
        }
    }

    /// `[y] z' <= y /\ y*X <= z*X  ==>  ovfl(X,y) \/ z'*X <= z*X`.
    fn try_ugt_y(&mut self, v: PVar, i: &Inequality) -> bool {
        let y = self.core.var(v);
        let Some((x, z)) = i.is_cy_l_cz(v) else {
            return false;
        };
        let candidates = self.assigned_inequalities(i.id);
        let Some(j) = candidates
            .into_iter()
            .find(|j| j.width() == i.width() && j.is_l_v(v))
        else {
            return false;
        };
        let z_prime = j.lhs.clone();
        let strict = i.strict || j.strict;
        self.add_lemma_rule(
            "z' <= y & yx <= zx => ovfl(x,y) or z'x <= zx",
            smallvec![i.id, j.id],
            vec![
                SignedConstraint::umul_ovfl(x.clone(), y),
                ineq(strict, &z_prime * &x, &z * &x),
            ],
        )
    }

    /// `[z] z <= y' /\ y*X <= z*X  ==>  ovfl(X,y') \/ y*X <= y'*X`.
    fn try_ugt_z(&mut self, v: PVar, i: &Inequality) -> bool {
        let Some((x, y)) = i.is_yc_l_zc(v) else {
            return false;
        };
        let candidates = self.assigned_inequalities(i.id);
        let Some(j) = candidates
            .into_iter()
            .find(|j| j.width() == i.width() && j.is_g_v(v))
        else {
            return false;
        };
        let y_prime = j.rhs.clone();
        let strict = i.strict || j.strict;
        self.add_lemma_rule(
            "z <= y' & yx <= zx => ovfl(x,y') or yx <= y'x",
            smallvec![i.id, j.id],
            vec![
                SignedConstraint::umul_ovfl(x.clone(), y_prime.clone()),
                ineq(strict, &y * &x, &y_prime * &x),
            ],
        )
    }

    /// `[x] y <= a*x /\ x <= z  ==>  ovfl(a,z) \/ y <= a*z` in the
    /// non-overflowing case.
    fn try_y_l_ax_and_x_l_z(&mut self, v: PVar, i: &Inequality) -> bool {
        let Some((a, y)) = i.is_y_l_ax(v) else {
            return false;
        };
        if a.is_one() {
            return false;
        }
        let candidates = self.assigned_inequalities(i.id);
        for j in candidates {
            if j.width() != i.width() || !j.is_g_v(v) {
                continue;
            }
            let z = j.rhs.clone();
            if !self.is_non_overflow(&a, &z) {
                continue;
            }
            let strict = i.strict || j.strict;
            if self.add_lemma_rule(
                "y <= ax & x <= z => ovfl(a,z) or y <= az",
                smallvec![i.id, j.id],
                vec![
                    SignedConstraint::umul_ovfl(a.clone(), z.clone()),
                    ineq(strict, y.clone(), &a * &z),
                ],
            ) {
                return true;
            }
        }
        false
    }

    /// `[x] a*x + b = 0 /\ b = 0  =>  a = 0 \/ x = 0 \/ ovfl(a, x)`, with
    /// tighter bounds when `a` or `x` is known to be bounded by a constant.
    fn try_mul_bounds(&mut self, v: PVar, i: &Inequality) -> bool {
        let x = self.core.var(v);
        let w = i.width();
        let Some((a, b, y)) = i.is_axb_eq_0(v, self.core.assignment()) else {
            return false;
        };
        if a.is_val() || !self.is_forced_eq(&b, &BigUint::zero()) {
            return false;
        }
        let x_eq_0 = SignedConstraint::eq(x.clone());
        let a_eq_0 = SignedConstraint::eq(a.clone());
        if !self.core.is_forced_false(&x_eq_0) || !self.core.is_forced_false(&a_eq_0) {
            return false;
        }
        let base_explain = vec![
            !SignedConstraint::eq(b.clone()),
            !SignedConstraint::eq(y.clone()),
            x_eq_0,
            a_eq_0,
        ];

        let minus_a = -&a;
        let minus_x = -&x;
        let candidates = self.assigned_inequalities(i.id);
        for j in candidates {
            if j.width() != w {
                continue;
            }
            let Some(k) = j.rhs.val() else {
                continue;
            };
            let mut k_val = k;
            if j.strict {
                if k_val.is_zero() {
                    continue;
                }
                k_val -= 1u32;
            }
            if k_val <= BigUint::one() {
                continue;
            }
            let target = if j.lhs == a || j.lhs == minus_a {
                &x
            } else if j.lhs == x || j.lhs == minus_x {
                &a
            } else {
                continue;
            };
            let bound = (word::modulus(w) + &k_val - BigUint::one()) / &k_val;
            let bound = Poly::constant(w, bound);
            for conclusion in [
                SignedConstraint::uge(target.clone(), bound.clone()),
                SignedConstraint::uge(-target, bound.clone()),
            ] {
                if self.propagate_rule(
                    "ax = 0 & y <= k => y >= 2^N/k",
                    smallvec![i.id, j.id],
                    base_explain.clone(),
                    conclusion,
                ) {
                    return true;
                }
            }
        }

        for (p, q) in [
            (a.clone(), x.clone()),
            (a.clone(), minus_x.clone()),
            (minus_a.clone(), x.clone()),
            (minus_a, minus_x),
        ] {
            if self.propagate_rule(
                "ax = 0 => a = 0 or x = 0 or ovfl(a,x)",
                smallvec![i.id],
                base_explain.clone(),
                SignedConstraint::umul_ovfl(p, q),
            ) {
                return true;
            }
        }
        false
    }

    /// `x*a = 1 /\ ~ovfl(a,x)  =>  x = 1` (and symmetrically `a = 1`).
    fn try_mul_eq_1(&mut self, v: PVar, i: &Inequality) -> bool {
        let x = self.core.var(v);
        let w = i.width();
        let Some((a, b, y)) = i.is_axb_eq_0(v, self.core.assignment()) else {
            return false;
        };
        if !self.is_forced_eq(&b, &word::max_value(w)) {
            return false;
        }
        if !self.is_non_overflow(&a, &x) {
            return false;
        }
        let explain = vec![
            !SignedConstraint::eq(&b + 1u64),
            !SignedConstraint::eq(y.clone()),
            SignedConstraint::umul_ovfl(a.clone(), x.clone()),
        ];
        if self.propagate_rule(
            "ax - 1 = 0 & ~ovfl(a,x) => x = 1",
            smallvec![i.id],
            explain.clone(),
            SignedConstraint::eq(&x - 1u64),
        ) {
            return true;
        }
        self.propagate_rule(
            "ax - 1 = 0 & ~ovfl(a,x) => a = 1",
            smallvec![i.id],
            explain,
            SignedConstraint::eq(&a - 1u64),
        )
    }

    /// `a*x = 0  =>  a = 0 \/ even(x)` (and with `x != 0`, `even(a)`).
    fn try_mul_odd(&mut self, v: PVar, i: &Inequality) -> bool {
        let x = self.core.var(v);
        let Some((a, b, y)) = i.is_axb_eq_0(v, self.core.assignment()) else {
            return false;
        };
        if !self.is_forced_eq(&b, &BigUint::zero()) {
            return false;
        }
        let a_eq_0 = SignedConstraint::eq(a.clone());
        if !self.core.is_forced_false(&a_eq_0) {
            return false;
        }
        let explain = vec![
            !SignedConstraint::eq(y.clone()),
            !SignedConstraint::eq(b.clone()),
            a_eq_0,
        ];
        if self.propagate_rule(
            "ax = 0 => a = 0 or even(x)",
            smallvec![i.id],
            explain.clone(),
            SignedConstraint::even(x.clone()),
        ) {
            return true;
        }
        let x_eq_0 = SignedConstraint::eq(x.clone());
        if !self.core.is_forced_false(&x_eq_0) {
            return false;
        }
        let mut explain = explain;
        explain.push(x_eq_0);
        self.propagate_rule(
            "ax = 0 => a = 0 or x = 0 or even(a)",
            smallvec![i.id],
            explain,
            SignedConstraint::even(a),
        )
    }

    /// Minimum number of guaranteed trailing zero bits of `p`, with the
    /// supporting constraints appended to `explain`.
    ///
    /// For a value, the exact parity; for an evaluable polynomial, the
    /// parity of its value; otherwise the minimum over monomials of the
    /// coefficient parity plus the variables' parities. A stronger bound
    /// forced by an assigned parity constraint overrides the structural
    /// one.
    fn min_parity_into(&self, p: &Poly, explain: &mut Vec<SignedConstraint>) -> u32 {
        let w = p.width();
        if let Some(v) = p.val() {
            return word::parity(&v, w);
        }
        if let Some(v) = self.core.try_eval(p) {
            let k = word::parity(&v, w);
            if k > 0 {
                explain.push(SignedConstraint::parity_at_least(p.clone(), k));
            }
            return k;
        }
        let base = explain.len();
        let mut min = 0;
        if p.as_var().is_none() {
            min = w;
            for t in p.terms() {
                let mut sum = word::parity(&t.coeff, w);
                for vp in t.mono.vars() {
                    let var_parity = self.min_parity_into(&Poly::var(w, vp.var), explain);
                    sum = sum.saturating_add(vp.power.saturating_mul(var_parity));
                }
                min = min.min(sum);
            }
        }
        for j in ((min + 1)..=w).rev() {
            let sc = SignedConstraint::parity_at_least(p.clone(), j);
            if self.core.is_forced_true(&sc) {
                explain.truncate(base);
                explain.push(sc);
                return j;
            }
        }
        min
    }

    /// Maximum possible parity of `p`; dual of [`Self::min_parity_into`].
    /// The structural bound only applies to single monomials, since sums
    /// can gain parity through carries.
    fn max_parity_into(&self, p: &Poly, explain: &mut Vec<SignedConstraint>) -> u32 {
        let w = p.width();
        if let Some(v) = p.val() {
            return word::parity(&v, w);
        }
        if let Some(v) = self.core.try_eval(p) {
            let k = word::parity(&v, w);
            if k != w {
                explain.push(SignedConstraint::parity_at_most(p.clone(), k));
            }
            return k;
        }
        let base = explain.len();
        let mut max = w;
        if p.as_var().is_none() && p.is_monomial() && !p.is_zero() {
            let t = &p.terms()[0];
            let mut sum = word::parity(&t.coeff, w);
            for vp in t.mono.vars() {
                let var_parity = self.max_parity_into(&Poly::var(w, vp.var), explain);
                sum = sum.saturating_add(vp.power.saturating_mul(var_parity));
            }
            max = sum.min(w);
        }
        for j in 0..max {
            let sc = SignedConstraint::parity_at_most(p.clone(), j);
            if self.core.is_forced_true(&sc) {
                explain.truncate(base);
                explain.push(sc);
                return j;
            }
        }
        max
    }

    /// Minimum guaranteed parity of `p` with its explanation.
    #[must_use]
    pub fn min_parity(&self, p: &Poly) -> (u32, Vec<SignedConstraint>) {
        let mut explain = Vec::new();
        let k = self.min_parity_into(p, &mut explain);
        (k, explain)
    }

    /// Maximum possible parity of `p` with its explanation.
    #[must_use]
    pub fn max_parity(&self, p: &Poly) -> (u32, Vec<SignedConstraint>) {
        let mut explain = Vec::new();
        let k = self.max_parity_into(p, &mut explain);
        (k, explain)
    }

    fn parity_explain(
        not_y: &SignedConstraint,
        sets: &[&[SignedConstraint]],
    ) -> Vec<SignedConstraint> {
        let mut out = vec![not_y.clone()];
        for set in sets {
            out.extend(set.iter().cloned().map(|c| !c));
        }
        out
    }

    /// Parity propagation over `a*x + b = 0`: relate the parities of `a`,
    /// `x` and `b`, and emit a correction lemma when the tracked bounds of
    /// one of them became contradictory.
    fn try_parity(&mut self, v: PVar, i: &Inequality) -> bool {
        let x = self.core.var(v);
        let w = i.width();
        let Some((a, b, y)) = i.is_axb_eq_0(v, self.core.assignment()) else {
            return false;
        };
        // x = y / y = x shapes propagate values directly; no lemma needed
        if a.is_max() && b.is_var() {
            return false;
        }
        if a.is_one() && (-&b).is_var() {
            return false;
        }
        if a.is_one() {
            return false;
        }
        if a.is_val() && b.is_zero() {
            return false;
        }

        let (min_x, al_x) = self.min_parity(&x);
        let (max_x, am_x) = self.max_parity(&x);
        let (min_b, al_b) = self.min_parity(&b);
        let (max_b, am_b) = self.max_parity(&b);
        let (min_a, al_a) = self.min_parity(&a);
        let (max_a, am_a) = self.max_parity(&a);
        let not_y = !SignedConstraint::eq(y.clone());

        let mut failed = false;
        let mut corrected = false;
        for (min_p, max_p, at_least, at_most) in [
            (min_x, max_x, &al_x, &am_x),
            (min_b, max_b, &al_b, &am_b),
            (min_a, max_a, &al_a, &am_a),
        ] {
            if min_p > max_p {
                failed = true;
                if self.propagate_rule(
                    "min_parity(p) > max_parity(p) correction",
                    smallvec![i.id],
                    Self::parity_explain(&not_y, &[at_least, at_most]),
                    SignedConstraint::ff(w),
                ) {
                    corrected = true;
                }
            }
        }
        if failed {
            return corrected;
        }

        if min_x >= w || min_a >= w {
            return false;
        }

        if !b.is_val() && max_b > max_a.saturating_add(max_x) {
            return self.propagate_rule(
                "ax + b = 0 => parity(b) <= parity(a) + parity(x)",
                smallvec![i.id],
                Self::parity_explain(&not_y, &[&am_a, &am_x]),
                SignedConstraint::parity_at_most(b.clone(), max_x + max_a),
            );
        }
        if !b.is_val() && min_x > min_b {
            return self.propagate_rule(
                "ax + b = 0 => parity(b) >= parity(x)",
                smallvec![i.id],
                Self::parity_explain(&not_y, &[&al_x]),
                SignedConstraint::parity_at_least(b.clone(), min_x),
            );
        }
        if !b.is_val() && min_a > min_b {
            return self.propagate_rule(
                "ax + b = 0 => parity(b) >= parity(a)",
                smallvec![i.id],
                Self::parity_explain(&not_y, &[&al_a]),
                SignedConstraint::parity_at_least(b.clone(), min_a),
            );
        }
        if !b.is_val() && min_x > 0 && min_a > 0 && min_x + min_a > min_b && w > min_b {
            return self.propagate_rule(
                "ax + b = 0 => parity(b) >= parity(a) + parity(x)",
                smallvec![i.id],
                Self::parity_explain(&not_y, &[&al_a, &al_x]),
                SignedConstraint::parity_at_least(b.clone(), (min_a + min_x).min(w)),
            );
        }
        if !a.is_val() && max_x <= min_b && min_a < min_b - max_x {
            return self.propagate_rule(
                "ax + b = 0 => parity(a) >= parity(b) - parity(x)",
                smallvec![i.id],
                Self::parity_explain(&not_y, &[&am_x, &al_b]),
                SignedConstraint::parity_at_least(a.clone(), min_b - max_x),
            );
        }
        if max_a <= min_b && min_x < min_b - max_a {
            return self.propagate_rule(
                "ax + b = 0 => parity(x) >= parity(b) - parity(a)",
                smallvec![i.id],
                Self::parity_explain(&not_y, &[&am_a, &al_b]),
                SignedConstraint::parity_at_least(x.clone(), min_b - max_a),
            );
        }
        if max_b < w && !a.is_val() && min_x > 0 && min_x <= max_b && max_a > max_b - min_x {
            return self.propagate_rule(
                "ax + b = 0 => parity(a) <= parity(b) - parity(x)",
                smallvec![i.id],
                Self::parity_explain(&not_y, &[&al_x, &am_b]),
                SignedConstraint::parity_at_most(a.clone(), max_b - min_x),
            );
        }
        if max_b < w && min_a > 0 && min_a <= max_b && max_x > max_b - min_a {
            return self.propagate_rule(
                "ax + b = 0 => parity(x) <= parity(b) - parity(a)",
                smallvec![i.id],
                Self::parity_explain(&not_y, &[&al_a, &am_b]),
                SignedConstraint::parity_at_most(x.clone(), max_b - min_a),
            );
        }
        false
    }

    /// Parity consequences of a falsified equation `a*x + b != 0`:
    /// `2^k*x + b != 0 & b = 0` bounds `parity(x)` below `N - k`, and
    /// `parity(a) + parity(x) >= N` forces `b != 0`.
    fn try_parity_diseq(&mut self, v: PVar, i: &Inequality) -> bool {
        let x = self.core.var(v);
        let w = i.width();
        let Some((a, b, y)) = i.is_axb_diseq_0(v, self.core.assignment()) else {
            return false;
        };
        if self.is_forced_eq(&b, &BigUint::zero()) && !a.is_zero() {
            let coeff = a.leading_coefficient();
            if coeff.bit(0) {
                return false;
            }
            let k = word::parity(&coeff, w);
            if self.propagate_rule(
                "2^k*ax != 0 => parity(x) < N - k",
                smallvec![i.id],
                vec![
                    !SignedConstraint::eq(y.clone()),
                    !SignedConstraint::eq(b.clone()),
                ],
                !SignedConstraint::parity_at_least(x.clone(), w - k),
            ) {
                return true;
            }
        }
        if let Some(av) = a.val() {
            let k = word::parity(&av, w);
            let (p_x, al_x) = self.min_parity(&x);
            if k + p_x >= w {
                let mut explain = vec![!SignedConstraint::eq(y.clone())];
                explain.extend(al_x.into_iter().map(|c| !c));
                if self.propagate_rule(
                    "ax + b != 0 & parity(ax) >= N => b != 0",
                    smallvec![i.id],
                    explain,
                    SignedConstraint::diseq(b),
                ) {
                    return true;
                }
            }
        }
        false
    }

    /// `q <= b*x /\ a*x <= p` with `a = b = 1` chains into `q <= p`,
    /// tightened by one when either hop is strict.
    fn try_transitivity(&mut self, v: PVar, i: &Inequality) -> bool {
        let Some((a, p)) = i.is_ax_l_y(v) else {
            return false;
        };
        if !self.is_forced_eq(&a, &BigUint::one()) {
            return false;
        }
        let candidates = self.core_inequalities(i.id);
        for j in candidates {
            if j.width() != i.width() {
                continue;
            }
            let Some((bq, q)) = j.is_y_l_ax(v) else {
                continue;
            };
            if !self.is_forced_eq(&bq, &BigUint::one()) {
                continue;
            }
            let conclusion = if i.strict || j.strict {
                if p.is_val() {
                    SignedConstraint::ule(q, &p - 1u64)
                } else {
                    SignedConstraint::ult(q, p.clone())
                }
            } else {
                SignedConstraint::ule(q, p.clone())
            };
            let explain = vec![
                !SignedConstraint::eq(&a - 1u64),
                !SignedConstraint::eq(&bq - 1u64),
            ];
            if self.propagate_rule(
                "q < x & x <= p => q < p",
                smallvec![i.id, j.id],
                explain,
                conclusion,
            ) {
                return true;
            }
        }
        false
    }

    /// Tightest upper bound `x <= k` among the assigned constraints, with
    /// the constraint providing it.
    #[must_use]
    pub fn has_upper_bound(&self, x: PVar) -> Option<(BigUint, ConstraintId)> {
        let w = self.core.size(x);
        let mut best: Option<(BigUint, ConstraintId)> = None;
        for &id in self.core.assigned_constraints() {
            let sc = self.core.effective_constraint(id);
            let Some(j) = Inequality::from_ule(id, &sc) else {
                continue;
            };
            if j.width() != w || !j.is_g_v(x) {
                continue;
            }
            let Some(mut k) = j.rhs.val() else {
                continue;
            };
            if j.strict {
                if k.is_zero() {
                    continue;
                }
                k -= 1u32;
            }
            if best.as_ref().map_or(true, |(b, _)| k < *b) {
                best = Some((k, id));
            }
        }
        best
    }

    /// Tightest lower bound `k <= x` among the assigned constraints.
    #[must_use]
    pub fn has_lower_bound(&self, x: PVar) -> Option<(BigUint, ConstraintId)> {
        let w = self.core.size(x);
        let maxv = word::max_value(w);
        let mut best: Option<(BigUint, ConstraintId)> = None;
        for &id in self.core.assigned_constraints() {
            let sc = self.core.effective_constraint(id);
            let Some(j) = Inequality::from_ule(id, &sc) else {
                continue;
            };
            if j.width() != w || !j.is_l_v(x) {
                continue;
            }
            let Some(mut k) = j.lhs.val() else {
                continue;
            };
            if j.strict {
                if k == maxv {
                    continue;
                }
                k += 1u32;
            }
            if best.as_ref().map_or(true, |(b, _)| k > *b) {
                best = Some((k, id));
            }
        }
        best
    }

    /// Evaluate `p` under the current assignment and take the symmetric
    /// representative.
    #[must_use]
    pub fn eval_round(&self, p: &Poly) -> Option<BigInt> {
        let m = BigInt::from(word::modulus(p.width()));
        self.core.try_eval(p).map(|v| round(&m, &v))
    }

    /// Write `q = a*y + b` with `a`, `b` symmetric representatives. When
    /// `y` is `None`, the top variable of `q` is chosen and reported back.
    #[must_use]
    pub fn extract_linear_form(
        &self,
        q: &Poly,
        y: &mut Option<PVar>,
    ) -> Option<(BigInt, BigInt)> {
        let m = BigInt::from(word::modulus(q.width()));
        if let Some(v) = q.val() {
            return Some((BigInt::zero(), round(&m, &v)));
        }
        let yv = match *y {
            Some(yv) => yv,
            None => {
                let vars = q.free_vars();
                let top = *vars.last()?;
                *y = Some(top);
                top
            }
        };
        match q.degree(yv) {
            0 => Some((BigInt::zero(), self.eval_round(q)?)),
            1 => {
                let (a1, b1) = q.factor(yv);
                Some((self.eval_round(&a1)?, self.eval_round(&b1)?))
            }
            _ => None,
        }
    }

    /// Write `p = a*x*y + b*x + c*y + d` for the given pivot `x`. When `y`
    /// is `None`, a second variable is chosen from `p` and reported back.
    #[must_use]
    pub fn extract_bilinear_form(
        &self,
        x: PVar,
        p: &Poly,
        y: &mut Option<PVar>,
    ) -> Option<Bilinear> {
        match p.degree(x) {
            0 => {
                let d = self.eval_round(p)?;
                Some(Bilinear {
                    a: BigInt::zero(),
                    b: BigInt::zero(),
                    c: BigInt::zero(),
                    d,
                })
            }
            1 => {
                let (q, r) = p.factor(x);
                let (a, b) = self.extract_linear_form(&q, y)?;
                if a.is_zero() {
                    return Some(Bilinear {
                        a,
                        b,
                        c: BigInt::zero(),
                        d: self.eval_round(&r)?,
                    });
                }
                let yv = (*y)?;
                match r.degree(yv) {
                    0 => Some(Bilinear {
                        a,
                        b,
                        c: BigInt::zero(),
                        d: self.eval_round(&r)?,
                    }),
                    1 => {
                        let (u, rest) = r.factor(yv);
                        Some(Bilinear {
                            a,
                            b,
                            c: self.eval_round(&u)?,
                            d: self.eval_round(&rest)?,
                        })
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

/// Tighten a lower bound for `y` from `b(x, y) >= 0` holding for all
/// `x` in `[x_min, x_max]`. Returns false when the coefficient signs do
/// not pin down which endpoint of the `x` range is binding.
#[must_use]
pub fn update_min(
    y_min: &mut BigInt,
    x_min: &BigInt,
    x_max: &BigInt,
    b: &Bilinear,
) -> bool {
    if b.a.is_zero() && b.c.is_zero() {
        return true;
    }
    let x_bound = if !b.a.is_negative() && !b.b.is_negative() {
        x_min
    } else if !b.a.is_positive() && !b.b.is_positive() {
        x_max
    } else {
        return false;
    };
    // (a*x_bound + c)*y >= -d - b*x_bound
    let coeff = &b.a * x_bound + &b.c;
    if !coeff.is_positive() {
        return true;
    }
    let y1 = div_ceil(&(-&b.d - &b.b * x_bound), &coeff);
    if y1 > *y_min {
        *y_min = y1;
    }
    true
}

/// Tighten an upper bound for `y` from `b(x, y) >= 0`; dual of
/// [`update_min`].
#[must_use]
pub fn update_max(
    y_max: &mut BigInt,
    x_min: &BigInt,
    x_max: &BigInt,
    b: &Bilinear,
) -> bool {
    if b.a.is_zero() && b.c.is_zero() {
        return true;
    }
    let x_bound = if !b.a.is_negative() && !b.b.is_negative() {
        x_min
    } else if !b.a.is_positive() && !b.b.is_positive() {
        x_max
    } else {
        return false;
    };
    let coeff = &b.a * x_bound + &b.c;
    if !coeff.is_negative() {
        return true;
    }
    let y1 = div_floor(&(-&b.d - &b.b * x_bound), &coeff);
    if y1 < *y_max {
        *y_max = y1;
    }
    true
}
