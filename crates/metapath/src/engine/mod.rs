//! Evaluation engine: runtime contexts and errors, the evaluator and the
//! built-in function library.

pub mod evaluator;
pub mod functions;
pub mod runtime;
