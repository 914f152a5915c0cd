//! # facetgen
//!
//! A build-time generator that turns a tree of Solidity contract sources and
//! their compiled ABI artifacts into one generated registry source file.
//!
//! ## Architecture
//!
//! - **fsutil**: Path walking, content hashing, and read helpers
//! - **solidity**: Regex-based surface extraction from raw contract source
//! - **abi**: ABI method extraction with canonical signatures and selectors
//! - **scan**: Contract discovery, categorization, and variant pairing
//! - **metadata**: Per-contract metadata assembly with inheritance walking
//! - **roles**: Role and resolver-key constant table scanning
//! - **cache**: Content-hash-keyed persistent metadata cache (JSON document)
//! - **generate**: Registry generator and formatter seams
//! - **pipeline**: Stage sequencing, statistics, warnings, idempotent write
//! - **config**: Roots, patterns, and toggles for one invocation
//! - **logger**: Per-run logger value threaded through the pipeline

pub mod abi;
pub mod cache;
pub mod cli;
pub mod config;
pub mod fsutil;
pub mod generate;
pub mod logger;
pub mod metadata;
pub mod pipeline;
pub mod roles;
pub mod scan;
pub mod solidity;
