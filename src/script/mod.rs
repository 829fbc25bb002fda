//! Scripted command input for the program under test.

pub mod builder;
