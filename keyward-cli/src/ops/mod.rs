pub mod auth;
pub mod output;
pub mod prompt;
pub mod reset;
pub mod ui;
pub mod users;

pub use output::OutputFormat;
