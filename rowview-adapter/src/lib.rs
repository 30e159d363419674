//! Adapter utilities for the `rowview` crate.
//!
//! The `rowview` crate is UI-agnostic and never performs I/O. This crate provides small,
//! framework-neutral helpers commonly needed by hosts:
//!
//! - A [`Controller`] that executes the viewer's fetch requests against a row source, either
//!   immediately or held back and resolved in any order
//! - Seek box parsing ([`parse_seek_input`])
//! - Header activation turning into re-sorts backed by a fresh source
//! - [`ListSurface`], a headless scroll container with variable row heights
//!
//! This crate is intentionally framework-agnostic (no ratatui/egui bindings).
#![forbid(unsafe_code)]

#[macro_use]
mod macros;

mod controller;
mod fenwick;
mod input;
mod list_surface;


pub use controller::{Controller, Dispatch};
pub use input::{SeekParseError, parse_seek_input};
pub use list_surface::{DEFAULT_ROW_HEIGHT, ListSurface, MeasureFn};
