//! # Glovebox CLI
//!
//! The binary is intentionally thin: the CLI lives in `src/cli/`, while this
//! file only invokes `cli::run()` and handles process termination.
//!
//! ## Workspace Structure
//!
//! - `crates/gloveboxapp/`: the UI-agnostic library (storage, database,
//!   sidecars, legacy migration, repository, commands)
//! - `crates/glovebox/`: this CLI, one possible client of the library
//!
//! ## Layering
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (crates/glovebox/src/cli/)                       │
//! │  - clap argument parsing, logging setup (setup.rs)          │
//! │  - context wiring and dispatch (commands.rs)                │
//! │  - terminal rendering with console styles (render.rs)       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (crates/gloveboxapp/src/api.rs)                  │
//! │  - dispatches to command modules                            │
//! │  - returns structured `CmdResult` values                    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Command Layer + Repository (crates/gloveboxapp/src/)       │
//! │  - business logic and data access                           │
//! │  - no knowledge of stdout/stderr or process exits           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything from `api.rs` inward is UI agnostic. The CLI layer owns
//! argument parsing, context initialization, dispatch, error handling and
//! rendering.

mod cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
