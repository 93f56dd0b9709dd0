pub mod operator_console;

pub use operator_console::*;
