//! Benchmarks for the per-stage hot paths.

mod estimator;
mod mixer;
mod router;
mod timeline;

pub use estimator::bench_estimator;
pub use mixer::bench_mixer;
pub use router::bench_router;
pub use timeline::bench_timeline;
