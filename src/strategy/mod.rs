//! Disassembly strategies

use std::fmt;

use clap::ValueEnum;

use crate::{DecodedProgram, RawImage};

/// Available disassembly strategies.
#[derive(Copy, Clone, ValueEnum, Debug, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Recursive traversal (control flow analysis); the authoritative mode
    #[default]
    Recursive,
    /// Linear sweep; an unsound contrast baseline
    Linear,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Recursive => write!(f, "Recursive traversal"),
            Strategy::Linear => write!(f, "Linear sweep"),
        }
    }
}

impl Strategy {
    /// Run the selected strategy over `image`.
    ///
    /// Never fails: malformed input degrades to a partial program with
    /// diagnostics attached.
    pub fn run(&self, image: &RawImage) -> DecodedProgram {
        match self {
            Strategy::Recursive => recursive::run(image),
            Strategy::Linear => linear::run(image),
        }
    }

    /// Return all available strategies
    pub fn all() -> &'static [Strategy] {
        &[Strategy::Recursive, Strategy::Linear]
    }
}

pub mod linear;
pub mod recursive;
