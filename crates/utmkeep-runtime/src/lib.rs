//! utmkeep-runtime: the attribution tracker service.
//! Wires capture, storage and replay into the public operations a host page
//! calls, plus the page-ready gate and client-side navigation replay.

pub mod clock;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod navigation;
pub mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::HookError;
pub use lifecycle::{DocumentReadiness, ReadyGate};
pub use navigation::{NavigationEvent, NavigationHub, NavigationKind, SpaReplay};
pub use tracker::{AttributionTracker, InitOutcome};

pub use utmkeep_core as model;
pub use utmkeep_dom as dom;
pub use utmkeep_storage as storage;
