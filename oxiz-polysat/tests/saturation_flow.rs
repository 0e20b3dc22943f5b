//! End-to-end saturation runs: register constraints, assign, mark the
//! unsat core, run the rule battery, and validate the recorded
//! propagations and lemmas against the model.

use num_bigint::BigUint;
use oxiz_modpoly::Poly;
use oxiz_polysat::{Core, Dependency, Saturation, SignedConstraint};

fn b(v: u64) -> BigUint {
    BigUint::from(v)
}

fn install(core: &mut Core, sc: SignedConstraint, in_core: bool) {
    let id = core.register_constraint(sc, Dependency(0));
    core.assign_constraint(id, true);
    if in_core {
        core.mark_falsified(id);
    }
}

#[test]
fn test_full_battery_on_core() {
    // Conflict state: x = 5, y = 3, with x <= y and y <= x both asserted.
    // Saturating over the whole core infers the equality.
    let mut core = Core::new();
    let vx = core.add_var(8).unwrap();
    let vy = core.add_var(8).unwrap();
    let (x, y) = (core.var(vx), core.var(vy));
    core.assign(vx, b(5)).unwrap();
    core.assign(vy, b(3)).unwrap();
    install(&mut core, SignedConstraint::ule(x.clone(), y.clone()), true);
    install(&mut core, SignedConstraint::ule(y.clone(), x.clone()), true);

    let mut sat = Saturation::new(&mut core);
    assert!(sat.saturate(vx));
    assert!(core
        .propagations()
        .iter()
        .any(|p| p.conclusion == SignedConstraint::eq_pair(x.clone(), y.clone())
            || p.conclusion == SignedConstraint::eq_pair(y.clone(), x.clone())));
}

#[test]
fn test_saturate_skips_satisfied_members() {
    // A constraint that evaluates true under the assignment contributes
    // nothing even when listed in the core.
    let mut core = Core::new();
    let vx = core.add_var(8).unwrap();
    let x = core.var(vx);
    core.assign(vx, b(1)).unwrap();
    install(&mut core, SignedConstraint::ule(x.clone(), Poly::val_u64(8, 5)), true);

    let mut sat = Saturation::new(&mut core);
    assert!(!sat.saturate(vx));
    assert!(core.propagations().is_empty());
    assert!(core.lemmas().is_empty());
}

#[test]
fn test_overflow_monotonicity_lemma_is_valid() {
    // y*x <= z*x falsified at x=2, y=10, z=7. The learned clause
    // ovfl(x,y) \/ y <= z \/ x = 0 must hold in every model where the
    // premise holds; spot-check a few models.
    let mut core = Core::new();
    let vx = core.add_var(8).unwrap();
    let vy = core.add_var(8).unwrap();
    let vz = core.add_var(8).unwrap();
    let (x, y, z) = (core.var(vx), core.var(vy), core.var(vz));
    core.assign(vx, b(2)).unwrap();
    core.assign(vy, b(10)).unwrap();
    core.assign(vz, b(7)).unwrap();
    install(&mut core, SignedConstraint::ule(&y * &x, &z * &x), true);

    let mut sat = Saturation::new(&mut core);
    assert!(sat.saturate(vx));
    let lemma = &core.lemmas()[0];

    for (xv, yv, zv) in [(1u64, 5u64, 9u64), (0, 9, 1), (32, 16, 2), (3, 100, 90)] {
        let premise = (yv * xv) % 256 <= (zv * xv) % 256;
        if !premise {
            continue;
        }
        let mut model = Core::new();
        let mx = model.add_var(8).unwrap();
        let my = model.add_var(8).unwrap();
        let mz = model.add_var(8).unwrap();
        model.assign(mx, b(xv)).unwrap();
        model.assign(my, b(yv)).unwrap();
        model.assign(mz, b(zv)).unwrap();
        // variables line up: vx = mx, vy = my, vz = mz
        let holds = lemma
            .literals
            .iter()
            .any(|lit| lit.weak_eval(model.assignment()) == Some(true));
        assert!(holds, "lemma fails at ({xv}, {yv}, {zv})");
    }
}

#[test]
fn test_propagation_explanations_are_currently_false() {
    // The explanation set of any recorded propagation must consist of
    // literals that are false (or at least not true) under the assignment
    // the propagation was derived from.
    let mut core = Core::new();
    let vx = core.add_var(8).unwrap();
    let vu = core.add_var(8).unwrap();
    let (x, u) = (core.var(vx), core.var(vu));
    core.assign(vx, b(4)).unwrap();
    core.assign(vu, b(6)).unwrap();
    install(&mut core, SignedConstraint::eq(&u * &x), true);

    let mut sat = Saturation::new(&mut core);
    assert!(sat.saturate(vx));
    for prop in core.propagations() {
        for lit in &prop.explain {
            assert_ne!(lit.weak_eval(core.assignment()), Some(true), "{lit}");
        }
    }
}

#[test]
fn test_parity_chain() {
    // 16x + y = 0 with x = 4: parity(16x) = 6, so parity(y) is pinned
    // from above by the first parity rule.
    let mut core = Core::new();
    let vx = core.add_var(8).unwrap();
    let vy = core.add_var(8).unwrap();
    let (x, y) = (core.var(vx), core.var(vy));
    core.assign(vx, b(4)).unwrap();
    install(&mut core, SignedConstraint::eq(&(&x * 16u64) + &y), true);

    let mut sat = Saturation::new(&mut core);
    assert!(sat.saturate(vx));
    let prop = &core.propagations()[0];
    assert_eq!(
        prop.conclusion,
        SignedConstraint::parity_at_most(y.clone(), 6)
    );
    // the conclusion holds in the completing model y = -64 = 192
    let mut model = Core::new();
    let mx = model.add_var(8).unwrap();
    let my = model.add_var(8).unwrap();
    model.assign(mx, b(4)).unwrap();
    model.assign(my, b(192)).unwrap();
    let x2 = model.var(mx);
    let y2 = model.var(my);
    assert_eq!(
        SignedConstraint::eq(&(&x2 * 16u64) + &y2).weak_eval(model.assignment()),
        Some(true)
    );
    assert_eq!(
        SignedConstraint::parity_at_most(y2, 6).weak_eval(model.assignment()),
        Some(true)
    );
}

#[test]
fn test_saturate_ignores_width_mismatch() {
    let mut core = Core::new();
    let v8 = core.add_var(8).unwrap();
    let v16 = core.add_var(16).unwrap();
    let x16 = core.var(v16);
    core.assign(v16, b(500)).unwrap();
    install(
        &mut core,
        SignedConstraint::ule(x16.clone(), Poly::val_u64(16, 5)),
        true,
    );
    let mut sat = Saturation::new(&mut core);
    // saturating the 8-bit variable against a 16-bit constraint is a no-op
    assert!(!sat.saturate(v8));
}
