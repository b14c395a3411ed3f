//! CLI command implementations

mod cast;
mod check;
mod config;
mod list;

pub use cast::{cast, CastArgs};
pub use check::check;
pub use config::{config, ConfigArgs};
pub use list::{list_devices, ListArgs};

use castkit_core::CastError;

/// Print the suggestion attached to a core error, if any
fn print_hint(err: &CastError) {
    if let Some(hint) = err.user_hint() {
        eprintln!("Hint: {}", hint);
    }
}
