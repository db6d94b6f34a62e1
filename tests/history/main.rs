#[path = "../common/mod.rs"]
mod common;

mod invariant_tests;
mod propagation_tests;
mod scenario_tests;
