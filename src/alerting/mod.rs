//! Client-side alert evaluation
//!
//! Alert rules live on the server; the client checks them against the
//! latest energy reading and notifies at most once per rule per session.

mod evaluator;

pub use evaluator::{AlertEvaluator, TriggeredAlert};
