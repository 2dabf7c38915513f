pub mod pipeline;
pub mod readiness;
pub mod timing;

pub use pipeline::AdmissionPipeline;
pub use readiness::ReadinessGate;
pub use timing::PipelineTiming;
