// trustmem integration tests — one binary, one submodule per area.
//
// All scenarios run through the public `Engine` surface with deterministic
// collaborators from `support`.

mod support;

mod classifier_swap;
mod e2e;
mod learning;
mod ledger_flow;
mod persistence;
