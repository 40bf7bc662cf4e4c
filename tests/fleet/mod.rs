//! Fleet reconciliation scenarios driven by a scripted provider.

mod bdd_steps;
mod scenarios;
mod test_helpers;
