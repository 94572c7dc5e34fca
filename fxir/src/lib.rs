//! In-memory control-flow-graph IR consumed by the region interface
//! inference engine (`fxcore`).
//!
//! The crate models one compilation unit the way a debug-enabled, largely
//! unoptimized front end emits it: functions made of labeled basic blocks,
//! instructions operating on SSA values and addressable storage locations
//! (stack slots and globals), and a deduplicating registry of source-level
//! type descriptors recovered from debug metadata.
//!
//! Nothing in here performs analysis; this crate is the accessor layer.
//! Everything a consumer may not rely on being present (source lines, type
//! descriptors, variable names) is exposed as nullable through the
//! [`debug::DebugInfo`] oracle so analyses can fail open.

pub mod block;
pub mod builder;
pub mod consts;
pub mod debug;
pub mod instr;
pub mod module;
pub mod storage;
pub mod types;
pub mod utils;
