//! Probing, filter graph construction and the mix itself

pub mod filter;
pub mod probe;
pub mod synth;
