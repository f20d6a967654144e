//! Resolution of the Docker context, container and data volume a session
//! targets.

pub mod clock;
pub mod context;
pub mod labels;
pub mod lookup;
pub mod naming;
pub mod options;
mod orchestrator;
pub mod volume;
pub mod workspace;

pub use clock::{Clock, FixedClock, SystemClock};
pub use context::{ContextDiscovery, ContextSelection};
pub use labels::{ContainerLabelState, LabelReader};
pub use lookup::{ContainerLookup, ContainerMatch};
pub use naming::NameReservation;
pub use options::{SessionCommandOptions, SessionMode};
pub use orchestrator::{ResolvedTarget, TargetResolver};
pub use volume::{DataVolumeResolver, VolumeResolution, VolumeSource};
