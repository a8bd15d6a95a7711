// ─── Jarsmith Core ───
// Artifact pipeline for building Minecraft jars.
//
// Architecture:
//   core/
//     cache/      — Content store, cache keys, single-flight table
//     downloader/ — Conditional, hash-verified fetches with retry
//     version/    — Version catalog + per-version metadata
//     assets/     — Asset index + bounded-parallel object downloads
//     jar/        — Merge client/server jars, split them back by provenance
//     state/      — Engine configuration
//     pipeline    — Caller-facing Engine

pub mod assets;
pub mod cache;
pub mod digest;
pub mod downloader;
pub mod error;
pub mod http;
pub mod jar;
pub mod pipeline;
pub mod state;
pub mod version;
