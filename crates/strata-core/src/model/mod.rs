pub mod ledger;
pub mod script;
pub mod state;

pub use ledger::LedgerEntry;
pub use script::{validate_identifier, MigrationScript};
pub use state::ScriptState;
