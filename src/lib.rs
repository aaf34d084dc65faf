//! Purpose: Library crate behind the `roxstage` CLI and embedding build tools.
//! Exports: `api` (lifecycle runner, Rox activation gate, cleanup, collaborators), `notice`.
//! Role: Stage a filtered `rox.yml` for one build step and guarantee its removal.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
//! Invariants: Activation is a returned value, never a mutation of caller options.
pub mod api;
mod core;
pub mod notice;
