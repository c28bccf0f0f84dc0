//! Replacing containers with copies that run a newer image
//!
//! [recreate] handles ordinary containers. Our own container goes through
//! [recreate_self], which keeps this process alive until its replacement is
//! running.

mod plan;
mod recreate;
mod self_update;

pub use plan::{bind_target, RecreationPlan};
pub use recreate::recreate;
pub use self_update::{recreate_self, OLD_NAME_SUFFIX};
