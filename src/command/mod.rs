mod check_registry;
mod run;

pub use check_registry::check_registry;
pub use run::run;
