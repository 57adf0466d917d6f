pub mod builtin;
pub mod config;
pub mod lexer;
pub mod macros;
pub mod parser;
pub mod pipeline;
pub mod quotes;
pub mod reader;
pub mod redirect;
pub mod session;
pub mod shell;

pub use session::Session;
pub use shell::Shell;
