// TODO: Re-enable and fix
// #![warn(clippy::pedantic)]

// #![warn(clippy::nursery)]
// #![warn(clippy::cargo)]
#![warn(clippy::complexity)]
#![warn(clippy::correctness)]
#![warn(clippy::perf)]
#![warn(clippy::style)]
#![warn(clippy::suspicious)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
// #![warn(clippy::todo)]
// #![warn(clippy::unimplemented)]
// #![warn(clippy::dbg_macro)]
// #![warn(clippy::unreachable)]
// #![warn(clippy::panic)]

// #![warn(clippy::unwrap_used)]
// #![warn(clippy::expect_used)]

//! Readers and writers for the output of TRANSURANUS fuel-performance runs.
//!
//! The run manifest (`.pli`) points at three direct-access result files
//! (`.mic`, `.mac`, `.sta`), which [`formats::da`] decodes into arrays and time axes.
//! Plot requests for the external plotting executables are stored in `.inp` files
//! ([`formats::inp`]), and the `.plt`/`.dat` pair those executables produce is turned
//! back into curves by [`formats::plot`].

pub mod formats;

pub mod file;
pub mod plotter;
