//! # dexray
//!
//! A batch decompiler/disassembler for JVM and Android bytecode containers.
//!
//! ## Architecture
//!
//! - **detect**: Input type detection by magic number, JAR/APK disambiguation
//! - **bytes**: Bounds-checked reading of untrusted byte buffers
//! - **meta**: Read-only class metadata shared across workers
//! - **dex**: DEX class-list parsing
//! - **class**: JVM class-file parsing
//! - **arena**: Per-task bump arenas, bulk-freed at task end
//! - **render**: The render seam and the built-in skeleton renderer
//! - **task**: Units of work (source or assembly render of one class)
//! - **pool**: Fixed-size worker pool with drain-on-shutdown semantics
//! - **progress**: Event-channel progress aggregation and display
//! - **output**: Per-class output path derivation and writing
//! - **walk**: Per-format container walkers feeding the pool
//! - **engine**: Container-level analysis entry points
//! - **dump**: javap/dexdump-style metadata printing

pub mod arena;
pub mod bytes;
pub mod class;
pub mod cli;
pub mod detect;
pub mod dex;
pub mod dump;
pub mod engine;
pub mod meta;
pub mod output;
pub mod pool;
pub mod progress;
pub mod render;
pub mod task;
pub mod walk;
