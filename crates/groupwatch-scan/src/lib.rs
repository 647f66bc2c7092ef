//! GroupWatch scan engine
//!
//! Provides:
//! - `Resolver`, turning a name or numeric id into an `Identity`
//! - `AllyCache`, a per-process store of watch-list group allies
//! - `Intersector`, matching memberships against the watch list and its allies
//! - `Scanner`, the person and group traversals producing a `ScanReport`

pub mod ally_cache;
pub mod intersect;
pub mod orchestrator;
pub mod report;
pub mod resolver;

pub use ally_cache::*;
pub use intersect::*;
pub use orchestrator::*;
pub use report::*;
pub use resolver::*;
