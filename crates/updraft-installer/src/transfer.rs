use std::path::PathBuf;

use updraft_core::{ArtifactCatalog, ContentSource, Task, TransferError};

/// Everything one differential transfer needs.
pub struct TransferPlan<'a> {
    pub local: &'a ArtifactCatalog,
    pub remote: &'a ArtifactCatalog,
    pub local_source: &'a dyn ContentSource,
    pub remote_source: &'a dyn ContentSource,
    pub destination: PathBuf,
    /// Bytes fetched outside this transfer (runtime, launcher) that still
    /// count towards the planned total.
    pub extra_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub reused: Vec<String>,
    pub fetched: Vec<String>,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Completed(TransferSummary),
    /// The task was cancelled at a node boundary; the destination holds partial state.
    Cancelled,
}

impl TransferPlan<'_> {
    pub fn total_bytes(&self) -> u64 {
        self.remote.total_file_bytes() + self.extra_bytes
    }
}

/// Materializes every node of the remote catalog below the destination,
/// reusing installed files whose content is unchanged.
pub fn transfer_release(
    plan: &TransferPlan<'_>,
    task: &Task,
) -> Result<TransferOutcome, TransferError> {
    let total = plan.total_bytes().max(1) as f64;
    let mut summary = TransferSummary::default();
    let mut done = 0_u64;

    for node in plan.remote.nodes() {
        if !task.is_active() {
            tracing::info!(node = node.name(), "transfer cancelled");
            return Ok(TransferOutcome::Cancelled);
        }

        let reusable = plan
            .local
            .node(node.name())
            .is_some_and(|local| local.content_equals(node));
        if reusable {
            match node.materialize_at(plan.local_source, &plan.destination, &task.silent()) {
                Ok(_) => {
                    summary.reused.push(node.name().to_string());
                    done += node.length();
                    task.set_progress(done as f64 / total);
                    continue;
                }
                Err(err) => tracing::debug!(
                    node = node.name(),
                    "local copy failed, fetching remotely: {err}"
                ),
            }
        }

        let lo = done as f64 / total;
        let hi = (done + node.length()) as f64 / total;
        match node.materialize_at(plan.remote_source, &plan.destination, &task.sub_task(lo, hi)) {
            Ok(_) => {}
            Err(TransferError::Cancelled) => return Ok(TransferOutcome::Cancelled),
            Err(err) => {
                return Err(TransferError::NodeFailed {
                    site: plan.remote_source.describe(),
                    artifact: node.name().to_string(),
                    destination: plan.destination.clone(),
                    source: Box::new(err),
                });
            }
        }
        summary.fetched.push(node.name().to_string());
        summary.bytes += node.length();
        done += node.length();
        task.set_progress(done as f64 / total);
    }

    Ok(TransferOutcome::Completed(summary))
}
