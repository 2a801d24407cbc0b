// src/net/mod.rs

pub mod frame;

pub use frame::{read_frame, write_frame};
