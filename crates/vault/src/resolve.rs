//! # Attachment Resolver
//!
//! Attachments reference their parent by part index, and a parent may itself
//! be an attachment listed later in the snapshot. Resolution is a bounded
//! fixed-point loop: each pass places every pending attachment whose parent
//! was already placed *before the pass started*, so a chain of depth D takes
//! exactly D passes regardless of record order.
//!
//! The loop stops when nothing is pending, a pass places nothing, or the
//! pass limit is hit. Whatever is left (dangling parents, cycles, parentless
//! records, descendants of rejected parts) is reported, never fatal.

use crate::error::Result;
use crate::snapshot::{PartIndex, PartRecord};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Result of one resolver run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveOutcome {
    /// Passes executed, including a final pass that placed nothing
    pub passes: usize,
    /// Attached parts, in attach order
    pub attached: Vec<PartIndex>,
    /// Parts whose parent never became available
    pub unresolved: Vec<PartIndex>,
    /// Parts whose parent was available but placement failed
    pub rejected: Vec<PartIndex>,
}

impl ResolveOutcome {
    /// Every pending attachment was placed
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty() && self.rejected.is_empty()
    }
}

/// Run the fixed-point loop.
///
/// `resolved` is seeded with the indices that are placed up front (root,
/// magazine, tray items). `place` attaches one record whose parent is
/// known to be resolved; an error moves the record to `rejected`.
pub fn resolve_attachments<F>(
    mut pending: Vec<&PartRecord>,
    mut resolved: BTreeSet<PartIndex>,
    max_passes: usize,
    mut place: F,
) -> ResolveOutcome
where
    F: FnMut(&PartRecord) -> Result<()>,
{
    let mut outcome = ResolveOutcome::default();

    while !pending.is_empty() && outcome.passes < max_passes {
        outcome.passes += 1;
        let ready_before_pass = resolved.clone();
        let mut progressed = false;

        pending.retain(|record| {
            let Some(parent) = record.attached_to else {
                return true;
            };
            if !ready_before_pass.contains(&parent) {
                return true;
            }

            progressed = true;
            match place(*record) {
                Ok(()) => {
                    resolved.insert(record.index);
                    outcome.attached.push(record.index);
                }
                Err(e) => {
                    warn!(index = record.index, parent, error = %e, "Rejected attachment");
                    outcome.rejected.push(record.index);
                }
            }
            false
        });

        debug!(
            pass = outcome.passes,
            remaining = pending.len(),
            "Attachment resolve pass"
        );
        if !progressed {
            break;
        }
    }

    if !pending.is_empty() {
        outcome.unresolved = pending.iter().map(|r| r.index).collect();
        warn!(
            unresolved = ?outcome.unresolved,
            passes = outcome.passes,
            "Attachments left unresolved"
        );
    }
    outcome
}
