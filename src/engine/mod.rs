// src/engine/mod.rs

//! Pure quiz logic. Nothing in here performs I/O; clocks and RNGs are passed in.

pub mod analytics;
pub mod lifecycle;
pub mod randomize;
pub mod scoring;
