//! # embedmod
//!
//! Command-line front end for `embedmod-core`. The binary in `main.rs` only
//! sets up logging and dispatches to [`cli::execute`].

pub mod cli;
