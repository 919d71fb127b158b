//! # dbward workspace
//!
//! Root package of the dbward workspace. It carries the cross-crate
//! integration tests and benches; applications depend on the [`dbward`]
//! crate directly.

pub use dbward::{
    BackupPipeline, PipelineContext, RestorePipeline, check_engines, plan_retention,
};
