//! # Formats Module
//!
//! Binary container formats understood by the shipped runtimes.
//!
//! File I/O is not done here: these are pure byte transformations.

pub mod image;

pub use image::{ImageHeader, ImageManifest, ModuleImage};
