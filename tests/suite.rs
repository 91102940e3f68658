//! End-to-end checks that drive the player through mocked voice and node seams.

mod common;
mod integration;
mod unit;
