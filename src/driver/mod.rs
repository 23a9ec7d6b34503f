//! The per-request work unit and everything it talks to.

pub mod checks;
pub mod iteration;
pub mod probe;
pub mod script;

pub use checks::{check_response, has_burned_status, CheckLimits, CheckOutcome};
pub use iteration::*;
pub use probe::*;
pub use script::*;
