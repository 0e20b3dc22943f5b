//! Partial variable assignment with stack discipline.
//!
//! The assignment grows and shrinks with the search: `push` on decision or
//! propagation, `pop` on backtracking. Substitution and evaluation read the
//! current snapshot; nothing here is shared across threads.

use num_bigint::BigUint;
use oxiz_modpoly::{word, Poly};
use rustc_hash::FxHashMap;

use crate::types::PVar;

/// Ordered partial assignment from variables to word values.
#[derive(Debug, Default, Clone)]
pub struct Assignment {
    pairs: Vec<(PVar, BigUint)>,
    values: FxHashMap<PVar, BigUint>,
}

impl Assignment {
    /// Create an empty assignment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `var := value` (reduced modulo `2^width`). The variable must
    /// not already be assigned.
    pub fn push(&mut self, var: PVar, value: BigUint, width: u32) {
        debug_assert!(!self.contains(var));
        let value = word::reduce(value, width);
        self.pairs.push((var, value.clone()));
        self.values.insert(var, value);
    }

    /// Undo the most recent assignment.
    pub fn pop(&mut self) {
        if let Some((var, _)) = self.pairs.pop() {
            self.values.remove(&var);
        }
    }

    /// Whether `var` is currently assigned.
    #[must_use]
    pub fn contains(&self, var: PVar) -> bool {
        self.values.contains_key(&var)
    }

    /// The value of `var`, if assigned.
    #[must_use]
    pub fn value(&self, var: PVar) -> Option<&BigUint> {
        self.values.get(&var)
    }

    /// Number of assigned variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether no variable is assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// The assignment in push order.
    #[must_use]
    pub fn pairs(&self) -> &[(PVar, BigUint)] {
        &self.pairs
    }

    /// Substitute all assigned variables into `p`.
    #[must_use]
    pub fn apply_to(&self, p: &Poly) -> Poly {
        p.subst(&self.values)
    }

    /// Fully evaluate `p` under the current assignment, if every variable
    /// of `p` is assigned.
    #[must_use]
    pub fn try_eval(&self, p: &Poly) -> Option<BigUint> {
        p.eval(&self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxiz_modpoly::Poly;

    fn b(v: u64) -> BigUint {
        BigUint::from(v)
    }

    #[test]
    fn test_push_pop() {
        let mut a = Assignment::new();
        a.push(0, b(5), 8);
        a.push(1, b(300), 8);
        assert_eq!(a.value(1), Some(&b(44)));
        a.pop();
        assert!(!a.contains(1));
        assert!(a.contains(0));
    }

    #[test]
    fn test_try_eval_partial() {
        let mut a = Assignment::new();
        let x = Poly::var(8, 0);
        let y = Poly::var(8, 1);
        let p = &(&x * 3u64) + &y;
        a.push(0, b(2), 8);
        assert!(a.try_eval(&p).is_none());
        a.push(1, b(4), 8);
        assert_eq!(a.try_eval(&p), Some(b(10)));
    }

    #[test]
    fn test_apply_to() {
        let mut a = Assignment::new();
        let x = Poly::var(8, 0);
        let y = Poly::var(8, 1);
        let p = &(&x * &y) + 1u64;
        a.push(0, b(3), 8);
        assert_eq!(a.apply_to(&p), &(&y * 3u64) + 1u64);
    }
}
