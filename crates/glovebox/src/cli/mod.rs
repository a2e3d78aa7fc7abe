//! # CLI Layer
//!
//! This module is **one possible UI client** for glovebox, not the
//! application itself. It is the only place that knows about terminal I/O,
//! exit codes and output formatting.
//!
//! ## Naked Execution
//!
//! Running `glovebox` with no arguments lists the vehicles.
//!
//! ## Launch Tasks
//!
//! Before any vehicle or document command runs, the launch sequence
//! (layout move, legacy import, rebuild from sidecars) is given a chance.
//! Whatever it did is printed first. Choosing a storage folder with
//! `glovebox storage set` runs the same sequence right away.
//!
//! ## Logging
//!
//! Library logs go to stderr through `tracing-subscriber`. The level comes
//! from `GLOVEBOX_LOG` (an `EnvFilter` directive such as `gloveboxapp=debug`),
//! else `-v` for debug, else warnings only.

mod commands;
mod render;
mod setup;

pub use commands::run;
