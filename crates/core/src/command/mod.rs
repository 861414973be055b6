//! Command-line construction for the external encoder.

mod builder;
mod error;

pub use builder::{
    escape_arg, parse_option_args, render_options, unescape_arg, CommandBuilder, CommandLine,
};
pub use error::CommandError;
