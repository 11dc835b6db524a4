//! CLI command implementations.

mod config;
mod design;
mod prompt;

pub use config::{config_init, config_show};
pub use design::{design, DesignOptions};
pub use prompt::{prompt_clear, prompt_show};
