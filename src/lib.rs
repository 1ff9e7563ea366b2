//! Snow Simulation Library
//!
//! A road network under a winter storm: cars drive between termini while snow
//! piles up, and plows and tow trucks are sent out from a depot to keep
//! traffic moving.

pub mod simulation;
