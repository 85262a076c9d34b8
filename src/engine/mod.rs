pub mod ledger;
pub mod query;
pub mod registry;
pub mod state_machine;
