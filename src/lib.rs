#[macro_use]
extern crate tracing;

pub mod backend;
pub mod cli;
pub mod geometry;
pub mod gpu;
pub mod logical;
pub mod manager;
pub mod monitor;
pub mod scale;
