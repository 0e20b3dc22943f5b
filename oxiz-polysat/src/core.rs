//! The narrow surface the conflict engines share with the enclosing solver.
//!
//! [`Core`] owns what both engines need to read: declared variables with
//! their widths, the current partial assignment, registered constraints
//! with their boolean values and justification handles, the unsat core, and
//! the list of currently assigned constraints. Propagations and learned
//! lemmas are recorded here for the embedding search loop to drain.

use num_bigint::BigUint;
use oxiz_modpoly::Poly;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::debug;

use crate::assignment::Assignment;
use crate::config::Config;
use crate::constraints::{Atom, SignedConstraint};
use crate::types::{ConstraintId, Dependency, PVar, PolysatError};

/// A registered constraint with its solver-assigned truth value.
#[derive(Debug, Clone)]
struct ConstraintInfo {
    sc: SignedConstraint,
    dep: Dependency,
    value: Option<bool>,
}

/// A literal propagated by one of the engines, with its justification.
#[derive(Debug, Clone)]
pub struct Propagation {
    /// The newly implied literal.
    pub conclusion: SignedConstraint,
    /// Registered constraints the conclusion depends on.
    pub premises: SmallVec<[ConstraintId; 4]>,
    /// Additional currently-false side literals of the justifying clause.
    pub explain: Vec<SignedConstraint>,
}

/// A learned clause `/\ premises -> \/ literals`.
#[derive(Debug, Clone)]
pub struct Lemma {
    /// Rule name, for tracing and statistics.
    pub name: &'static str,
    /// Registered constraints assumed by the clause.
    pub premises: SmallVec<[ConstraintId; 4]>,
    /// Guaranteed literals of the clause.
    pub literals: Vec<SignedConstraint>,
    /// Whether the clause is redundant (deletable by the clause database).
    pub redundant: bool,
}

/// Variable registry, assignment, constraint values, and propagation sink.
#[derive(Debug, Default)]
pub struct Core {
    config: Config,
    var_width: Vec<u32>,
    assignment: Assignment,
    infos: Vec<ConstraintInfo>,
    atom_index: FxHashMap<Atom, ConstraintId>,
    unsat_core: Vec<ConstraintId>,
    assigned: Vec<ConstraintId>,
    propagations: Vec<Propagation>,
    lemmas: Vec<Lemma>,
}

impl Core {
    /// Create a core with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a core with an explicit configuration.
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Declare a fresh variable of the given bit width.
    pub fn add_var(&mut self, width: u32) -> Result<PVar, PolysatError> {
        if width == 0 {
            return Err(PolysatError::ZeroWidth);
        }
        let v = self.var_width.len() as PVar;
        self.var_width.push(width);
        Ok(v)
    }

    /// Bit width of a declared variable.
    #[must_use]
    pub fn size(&self, v: PVar) -> u32 {
        self.var_width[v as usize]
    }

    /// The polynomial consisting of variable `v`.
    #[must_use]
    pub fn var(&self, v: PVar) -> Poly {
        Poly::var(self.size(v), v)
    }

    /// Assign `v := value` (reduced modulo its width).
    pub fn assign(&mut self, v: PVar, value: BigUint) -> Result<(), PolysatError> {
        let Some(&width) = self.var_width.get(v as usize) else {
            return Err(PolysatError::UnknownVar(v));
        };
        self.assignment.push(v, value, width);
        Ok(())
    }

    /// Undo the most recent variable assignment.
    pub fn pop_assignment(&mut self) {
        self.assignment.pop();
    }

    /// The current partial assignment.
    #[must_use]
    pub fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    /// Evaluate `p` fully under the current assignment, if possible.
    #[must_use]
    pub fn try_eval(&self, p: &Poly) -> Option<BigUint> {
        self.assignment.try_eval(p)
    }

    /// Substitute assigned variables into `p`.
    #[must_use]
    pub fn subst(&self, p: &Poly) -> Poly {
        self.assignment.apply_to(p)
    }

    /// Register a constraint with its justification handle. Constraints
    /// with the same atom share one id; the first registration wins.
    pub fn register_constraint(&mut self, sc: SignedConstraint, dep: Dependency) -> ConstraintId {
        if let Some(&id) = self.atom_index.get(sc.atom()) {
            return id;
        }
        let id = ConstraintId(self.infos.len() as u32);
        self.atom_index.insert(sc.atom().clone(), id);
        self.infos.push(ConstraintInfo {
            sc,
            dep,
            value: None,
        });
        id
    }

    /// The constraint registered under `id`.
    #[must_use]
    pub fn get_constraint(&self, id: ConstraintId) -> &SignedConstraint {
        &self.infos[id.index()].sc
    }

    /// The justification handle supplied at registration.
    #[must_use]
    pub fn dependency(&self, id: ConstraintId) -> Dependency {
        self.infos[id.index()].dep
    }

    /// The constraint in its assigned polarity: the registered constraint
    /// when assigned true (or not yet assigned), its negation when false.
    #[must_use]
    pub fn effective_constraint(&self, id: ConstraintId) -> SignedConstraint {
        let info = &self.infos[id.index()];
        match info.value {
            Some(false) => !info.sc.clone(),
            _ => info.sc.clone(),
        }
    }

    /// Record the truth value the search assigned to constraint `id` and
    /// append it to the assigned-constraint list.
    pub fn assign_constraint(&mut self, id: ConstraintId, value: bool) {
        self.infos[id.index()].value = Some(value);
        self.assigned.push(id);
    }

    /// Add `id` to the unsat core (the jointly falsified constraints the
    /// engines are asked to explain).
    pub fn mark_falsified(&mut self, id: ConstraintId) {
        self.unsat_core.push(id);
    }

    /// The unsat core in discovery order.
    #[must_use]
    pub fn unsat_core(&self) -> &[ConstraintId] {
        &self.unsat_core
    }

    /// All constraints currently assigned a value, in assignment order.
    #[must_use]
    pub fn assigned_constraints(&self) -> &[ConstraintId] {
        &self.assigned
    }

    /// Boolean value of `sc` under the search's constraint assignment,
    /// adjusting for sign if the atom was registered with the opposite
    /// polarity.
    #[must_use]
    pub fn bvalue(&self, sc: &SignedConstraint) -> Option<bool> {
        let id = self.atom_index.get(sc.atom())?;
        let info = &self.infos[id.index()];
        let v = info.value?;
        Some(if sc.is_positive() == info.sc.is_positive() {
            v
        } else {
            !v
        })
    }

    /// Truth value of constraint `id` under the current assignment.
    #[must_use]
    pub fn weak_eval(&self, id: ConstraintId) -> Option<bool> {
        self.get_constraint(id).weak_eval(&self.assignment)
    }

    /// Whether `sc` holds, either by the search's boolean assignment or by
    /// evaluation under the current variable assignment.
    #[must_use]
    pub fn is_forced_true(&self, sc: &SignedConstraint) -> bool {
        self.bvalue(sc) == Some(true) || sc.weak_eval(&self.assignment) == Some(true)
    }

    /// Dual of [`Core::is_forced_true`].
    #[must_use]
    pub fn is_forced_false(&self, sc: &SignedConstraint) -> bool {
        self.bvalue(sc) == Some(false) || sc.weak_eval(&self.assignment) == Some(false)
    }

    /// Attempt to propagate `conclusion` justified by `premises` plus the
    /// currently-false side literals `explain`. Returns whether the literal
    /// was newly added.
    pub fn propagate(
        &mut self,
        conclusion: SignedConstraint,
        premises: SmallVec<[ConstraintId; 4]>,
        explain: Vec<SignedConstraint>,
    ) -> bool {
        if self.bvalue(&conclusion) == Some(true) {
            return false;
        }
        if self.propagations.iter().any(|p| p.conclusion == conclusion) {
            return false;
        }
        debug!(target: "polysat", conclusion = %conclusion, "propagate");
        self.propagations.push(Propagation {
            conclusion,
            premises,
            explain,
        });
        true
    }

    /// Record a learned clause. Returns whether it was new.
    pub fn add_lemma(
        &mut self,
        name: &'static str,
        premises: SmallVec<[ConstraintId; 4]>,
        literals: Vec<SignedConstraint>,
        redundant: bool,
    ) -> bool {
        if self
            .lemmas
            .iter()
            .any(|l| l.literals == literals && l.premises == premises)
        {
            return false;
        }
        debug!(target: "polysat", rule = name, "lemma");
        self.lemmas.push(Lemma {
            name,
            premises,
            literals,
            redundant,
        });
        true
    }

    /// Propagations recorded so far.
    #[must_use]
    pub fn propagations(&self) -> &[Propagation] {
        &self.propagations
    }

    /// Lemmas recorded so far.
    #[must_use]
    pub fn lemmas(&self) -> &[Lemma] {
        &self.lemmas
    }
}
