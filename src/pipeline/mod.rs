//! Pipeline stages for literature-review generation.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the transport or PDF engine can be swapped without touching the
//! others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ request ──▶ sse ──▶ assemble
//! (paths)   (pdfium)    (HTTP)     (wire)   (snapshots)
//! ```
//!
//! 1. [`input`]    — read user-selected files into [`input::UploadedDocument`]s
//! 2. [`extract`]  — per-page text via pdfium on `spawn_blocking`, cleaned by
//!    [`sanitize`], truncated to the per-document budget and wrapped in
//!    delimiters; bad files become diagnostics
//! 3. [`request`]  — build the two-message chat request and open one
//!    streaming completion; the only stage with network I/O
//! 4. [`sse`]      — decode the `text/event-stream` body into fragments
//! 5. [`assemble`] — append fragments to the growing review and emit a
//!    snapshot after each one

pub mod assemble;
pub mod extract;
pub mod input;
pub mod request;
pub mod sanitize;
pub mod sse;
