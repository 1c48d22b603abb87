//! CLI command implementations

mod info;
mod run;

pub use info::info;
pub use run::run;
