//! Run model: the target tables and the constraints deferred out of their definitions

mod constraints;
mod targets;

pub use constraints::{ConstraintKind, ConstraintRecord, ConstraintStore};
pub use targets::{old_name, swap_name, TargetTables, OLD_SUFFIX, SWAP_SUFFIX};
