//! # lnc-compile
//!
//! The lowering half of the lnc pipeline.
//!
//! ```text
//! resolved LN ──amm──► AMM text ──aga──► AGA text ──agc──► AGC bytes
//!                  ▲                                   │
//!                  └────────── pipeline (BFS router) ──┘
//! ```
//!
//! - [`amm`] — the AMM emitter: inlining, conditional tables, lowering
//! - [`aga`] — the AGA emitter: memory layout, closure extraction, the
//!   statement dependency graph
//! - [`agc`] — the binary writer for the packed graph-code container
//! - [`pipeline`] — converter registry and shortest-path stage routing
//! - [`compile`] — the entry points the CLI drives

pub mod aga;
pub mod agc;
pub mod amm;
pub mod compile;
pub mod pipeline;

pub use aga::emit_aga;
pub use agc::{ascii_word, builtin_event_id, write_agc, MAGIC};
pub use amm::emit_amm;
pub use compile::{compile_path, compile_text, write_artifact};
pub use pipeline::{Artifact, Converter, Pipeline};
