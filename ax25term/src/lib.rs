#![doc = include_str!("../README.md")]

pub mod commands;
pub mod config;
pub mod error;
pub mod session;
pub mod terminal;
pub mod tnc;

#[cfg(test)]
mod test_util;

// Protocol definitions a front end needs to drive a session
pub use ax25core::address::{Callsign, DigiPath};
pub use ax25core::link::{FrmrPolicy, LinkConfig, LinkState};
