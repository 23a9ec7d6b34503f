pub mod profile;
pub mod stage;
pub mod threshold;

pub use profile::*;
pub use stage::*;
pub use threshold::*;
