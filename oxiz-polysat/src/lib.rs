//! OxiZ PolySAT - Word-Level Conflict Explanation for Bit-Vectors
//!
//! Conflict-driven reasoning over bit-vector constraints: given a partial
//! assignment that falsifies an unsigned inequality or a multiplication
//! overflow predicate, derive a *forbidden interval* - a provably excluded
//! range of values for one variable - from which the enclosing solver builds
//! a learned clause explaining the conflict.
//!
//! # Components
//!
//! - **interval**: half-open intervals over machine words with symbolic
//!   endpoints, including the negation-normalization transform
//! - **fi**: the forbidden-interval pattern matcher (linear decomposition
//!   plus an ordered battery of structural patterns)
//! - **saturation**: auxiliary inference rules over the unsat core
//!   (equality inference, overflow monotonicity, parity propagation,
//!   multiplication bounds, transitivity)
//! - **core**: the narrow solver-facing surface (variables, assignment,
//!   constraint values, propagation sink)
//!
//! Every "cannot proceed" outcome (unmatched pattern, non-linear term,
//! unevaluable sub-expression) is an `Option`/`bool` return, never an error:
//! it simply means the caller should try the next strategy.
//!
//! # References
//!
//! - "Solving bitvectors with MCSAT: explanations from bits and pieces"
//!   (Graham-Lengrand, Jovanovic, Dutertre)
//! - Z3's `sat/smt/polysat` module

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod assignment;
pub mod config;
pub mod constraints;
pub mod core;
pub mod fi;
pub mod interval;
pub mod saturation;
pub mod types;

pub use assignment::Assignment;
pub use config::Config;
pub use constraints::{Atom, Inequality, SignedConstraint};
pub use core::{Core, Lemma, Propagation};
pub use fi::{Decomp, FiKind, FiRecord, ForbiddenIntervals};
pub use interval::{Endpoint, EvalInterval};
pub use saturation::{Bilinear, Saturation};
pub use types::{ConstraintId, Dependency, PVar, PolysatError};
