//! Race coordination and result assembly.
//!
//! This module provides:
//! - RaceCoordinator, which runs the pipeline against the deadline timer
//! - The result assembler that maps the winning path to a terminal result

mod assembler;
mod race;


pub use assembler::{
    assemble, completed_message, expired_message, rejection_message, Assembled, RaceWinner,
};
pub use race::{RaceCoordinator, RunHandle};
