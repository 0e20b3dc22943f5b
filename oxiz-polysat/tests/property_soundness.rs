//! Property-based tests for the forbidden-interval matcher.
//!
//! The central soundness statement: a value outside the returned interval
//! (with all side conditions holding) satisfies the original constraint.
//! For the fully-concrete inequality shapes generated here the intervals
//! are in fact exact, so the test checks equivalence, which subsumes
//! soundness. Also covered: negation symmetry, the involution of the
//! coefficient-normalization transform, and the decomposition round-trip.

use num_bigint::BigUint;
use oxiz_modpoly::{word, Poly};
use oxiz_polysat::{Core, Endpoint, EvalInterval, FiKind, ForbiddenIntervals, SignedConstraint};
use proptest::prelude::*;

fn b(v: u64) -> BigUint {
    BigUint::from(v)
}

/// Strategy for the widths the reasoning must stay exact at.
fn width_strategy() -> impl Strategy<Value = u32> {
    prop_oneof![Just(4u32), Just(8u32), Just(16u32)]
}

/// An inequality `a1*v + b1 <= a2*v + b2` with concrete coefficients,
/// possibly negated.
#[derive(Debug, Clone)]
struct UleCase {
    width: u32,
    a1: u64,
    b1: u64,
    a2: u64,
    b2: u64,
    positive: bool,
}

fn ule_case() -> impl Strategy<Value = UleCase> {
    (width_strategy(), any::<[u64; 4]>(), any::<bool>()).prop_map(
        |(width, [a1, b1, a2, b2], positive)| {
            let m = 1u64 << width;
            UleCase {
                width,
                a1: a1 % m,
                b1: b1 % m,
                a2: a2 % m,
                b2: b2 % m,
                positive,
            }
        },
    )
}

fn build_constraint(case: &UleCase, x: &Poly) -> SignedConstraint {
    let lhs = &(x * case.a1) + case.b1;
    let rhs = &(x * case.a2) + case.b2;
    let c = SignedConstraint::ule(lhs, rhs);
    if case.positive {
        c
    } else {
        !c
    }
}

/// Every value for small widths; a coprime stride through the domain for
/// 16-bit so the check stays fast.
fn domain(m: u64) -> impl Iterator<Item = u64> {
    let step = if m > 4096 { 13 } else { 1 };
    (0..m).step_by(step as usize)
}

/// Truth of the constraint with `v := val`, computed independently of the
/// matcher.
fn constraint_true(case: &UleCase, val: u64) -> bool {
    let m = 1u64 << case.width;
    let lhs = (case.a1.wrapping_mul(val) + case.b1) % m;
    let rhs = (case.a2.wrapping_mul(val) + case.b2) % m;
    (lhs <= rhs) == case.positive
}

fn forbidden(rec_coeff: &BigUint, iv: &EvalInterval, val: u64, width: u32) -> bool {
    let m = 1u64 << width;
    let coeff = rec_coeff.to_u64_digits().first().copied().unwrap_or(0);
    iv.contains(&b(coeff.wrapping_mul(val) % m))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// For every value of the variable, membership in the forbidden
    /// interval coincides with falsifying the constraint. (Outside the
    /// interval the constraint holds, which is the soundness direction.)
    #[test]
    fn soundness_of_ule_intervals(case in ule_case()) {
        let mut core = Core::new();
        let v = core.add_var(case.width).unwrap();
        let x = core.var(v);
        let c = build_constraint(&case, &x);

        let fi = ForbiddenIntervals::new(&core);
        if let Some(rec) = fi.get_interval(&c, v) {
            prop_assert!(rec.side_cond.is_empty());
            if let FiKind::Interval(iv) = &rec.kind {
                let m = 1u64 << case.width;
                for val in domain(m) {
                    prop_assert_eq!(
                        forbidden(&rec.coeff, iv, val, case.width),
                        !constraint_true(&case, val),
                        "width {} a1 {} b1 {} a2 {} b2 {} pos {} val {}",
                        case.width, case.a1, case.b1, case.a2, case.b2,
                        case.positive, val
                    );
                }
            }
        }
    }

    /// Matching `c` and `~c` yields complementary forbidden sets.
    #[test]
    fn negation_symmetry(case in ule_case()) {
        let mut core = Core::new();
        let v = core.add_var(case.width).unwrap();
        let x = core.var(v);
        let c = build_constraint(&case, &x);

        let fi = ForbiddenIntervals::new(&core);
        let pos = fi.get_interval(&c, v);
        let neg = fi.get_interval(&!c, v);
        if let (Some(p), Some(n)) = (pos, neg) {
            if let (FiKind::Interval(ivp), FiKind::Interval(ivn)) = (&p.kind, &n.kind) {
                let m = 1u64 << case.width;
                for val in domain(m) {
                    prop_assert_ne!(
                        forbidden(&p.coeff, ivp, val, case.width),
                        forbidden(&n.coeff, ivn, val, case.width),
                        "val {}", val
                    );
                }
            }
        }
    }

    /// The negation transform on proper intervals is an involution.
    #[test]
    fn normalization_involution(
        width in width_strategy(),
        lo in any::<u64>(),
        hi in any::<u64>(),
    ) {
        let m = 1u64 << width;
        let (lo, hi) = (lo % m, hi % m);
        let iv = EvalInterval::proper(
            Endpoint::new(Poly::val_u64(width, lo), b(lo)),
            Endpoint::new(Poly::val_u64(width, hi), b(hi)),
        );
        prop_assert_eq!(iv.negated().negated(), iv);
    }

    /// The negation transform mirrors containment: `v` is in the interval
    /// iff `-v` is in the negated interval.
    #[test]
    fn normalization_mirrors_containment(
        width in width_strategy(),
        lo in any::<u64>(),
        hi in any::<u64>(),
        val in any::<u64>(),
    ) {
        let m = 1u64 << width;
        let (lo, hi, val) = (lo % m, hi % m, val % m);
        let iv = EvalInterval::proper(
            Endpoint::new(Poly::val_u64(width, lo), b(lo)),
            Endpoint::new(Poly::val_u64(width, hi), b(hi)),
        );
        let neg_val = (m - val) % m;
        prop_assert_eq!(iv.contains(&b(val)), iv.negated().contains(&b(neg_val)));
    }

    /// Decomposition round-trip: when `decompose` succeeds on a polynomial
    /// of degree <= 1 in `x`, then `a*t + b` agrees with the polynomial at
    /// every point `t`.
    #[test]
    fn decomposition_round_trip(
        width in width_strategy(),
        a in any::<u64>(),
        e in any::<u64>(),
        samples in proptest::collection::vec(any::<u64>(), 4),
    ) {
        let mut core = Core::new();
        let v = core.add_var(width).unwrap();
        let x = core.var(v);
        let m = 1u64 << width;
        let p = &(&x * (a % m)) + (e % m);

        let fi = ForbiddenIntervals::new(&core);
        let d = fi.linear_decompose(v, &p).unwrap();
        prop_assert_eq!(&d.a, &b(a % m));
        prop_assert_eq!(&d.b, &b(e % m));
        for t in samples {
            let t = t % m;
            let direct = (a % m).wrapping_mul(t).wrapping_add(e % m) % m;
            let recomposed = word::add(&word::mul(&d.a, &b(t), width), &d.b, width);
            prop_assert_eq!(&recomposed, &b(direct));
        }
    }

    /// Overflow-predicate intervals only ever exclude genuinely violating
    /// values (soundness; the interval may under-approximate).
    #[test]
    fn overflow_interval_subset(
        width in width_strategy(),
        factor in any::<u64>(),
        positive in any::<bool>(),
    ) {
        let mut core = Core::new();
        let v = core.add_var(width).unwrap();
        let x = core.var(v);
        let m = 1u64 << width;
        let factor = factor % m;
        let c = SignedConstraint::umul_ovfl(x, Poly::val_u64(width, factor));
        let c = if positive { c } else { !c };

        let fi = ForbiddenIntervals::new(&core);
        if let Some(rec) = fi.get_interval(&c, v) {
            if let FiKind::Interval(iv) = &rec.kind {
                let side_ok = rec
                    .side_cond
                    .iter()
                    .all(|sc| sc.weak_eval(core.assignment()) == Some(true));
                if side_ok {
                    for val in domain(m) {
                        if iv.contains(&b(val)) {
                            let overflows = (val as u128) * (factor as u128) >= m as u128;
                            prop_assert_eq!(
                                overflows,
                                !positive,
                                "forbidden value {} does not violate", val
                            );
                        }
                    }
                }
            }
        }
    }
}
