#![doc = include_str!("../README.md")]

pub mod toml_file;
