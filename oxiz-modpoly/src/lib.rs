//! OxiZ ModPoly - Polynomials over Fixed-Width Machine Words
//!
//! This crate provides multivariate polynomial arithmetic modulo `2^N` for
//! word-level bit-vector reasoning. Every polynomial is tagged with a bit
//! width `N`; coefficients live in `Z/2^N` and all ring operations reduce
//! modulo `2^N`.
//!
//! The operations exposed here are exactly the ones word-level conflict
//! analysis needs:
//! - degree in a variable and factoring out a single variable,
//! - evaluation and substitution under a partial assignment,
//! - multiplicative inverses of odd values modulo `2^N`,
//! - parity (guaranteed trailing zero bits).
//!
//! # Examples
//!
//! ```
//! use oxiz_modpoly::Poly;
//!
//! // p = 3*x + 7 over 8-bit words
//! let x = Poly::var(8, 0);
//! let p = &(&x * 3u64) + 7u64;
//! assert_eq!(p.degree(0), 1);
//!
//! let (q, r) = p.factor(0);
//! assert_eq!(q, Poly::val_u64(8, 3));
//! assert_eq!(r, Poly::val_u64(8, 7));
//! ```
//!
//! References:
//! - "Solving bitvectors with MCSAT: explanations from bits and pieces"
//!   (Graham-Lengrand, Jovanovic, Dutertre)
//! - Z3's `math/dd` polynomial layer

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod polynomial;
pub mod word;

pub use polynomial::{Monomial, Poly, Var, VarPower, NULL_VAR};
