mod demo;
mod root;

pub use demo::DemoCommand;
pub use root::{Cli, Commands};
