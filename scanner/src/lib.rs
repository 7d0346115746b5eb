// Mesh capture and texture projection core of the AR scanner. The `scanner`
// binary drives it against a simulated platform.

pub mod config;
pub mod controller;
pub mod frame;
pub mod geometry;
pub mod projector;
pub mod registry;
pub mod schedule;
pub mod session;
pub mod sim;
pub mod subsystem;

#[cfg(test)]
mod testing;

pub use base;
