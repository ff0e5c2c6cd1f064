//! # cldf
//!
//! Command-line front end for the CLDF archive engine. The binary in
//! `main.rs` only sets up logging and hands the parsed arguments to
//! [`cli::execute`].

pub mod cli;
