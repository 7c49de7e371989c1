mod launcher;
mod plan;
mod runtime;
mod types;

pub use launcher::{launcher_update_needed, select_launcher};
pub use plan::resolve_platform_plan;
pub use runtime::{runtime_requirement, select_runtime};
pub use types::{PlatformPlan, PlatformTarget, ResolveError, RuntimeChange, RuntimeRequirement};

#[cfg(test)]
mod tests;
