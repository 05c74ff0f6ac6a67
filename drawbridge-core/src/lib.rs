//! # Drawbridge Core
//!
//! Core state machinery for the collaborative diagram workstation:
//! the authoritative scene store, element normalization and arrow-binding
//! geometry, the WebSocket wire protocol, the broadcast bus, and the
//! request/response correlator that bridges blocking HTTP calls to
//! out-of-band editor responses.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              drawbridge-core                 │
//! ├──────────────────────────────────────────────┤
//! │  Scene Store     │  Normalizer / Resolver    │
//! │  - Z-ordered set │  - defaults, ids          │
//! │  - snapshots     │  - edge attachment        │
//! ├──────────────────────────────────────────────┤
//! │  Broadcast Bus   │  Correlator               │
//! │  - peer fan-out  │  - pending requests       │
//! │  - echo exclude  │  - deadlines, fan-in      │
//! └──────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod binding;
pub mod bus;
pub mod correlate;
pub mod element;
pub mod error;
pub mod normalize;
pub mod protocol;
pub mod query;
pub mod store;

pub use binding::{resolve_batch, BINDING_GAP};
pub use bus::{BroadcastBus, PeerId};
pub use correlate::{CorrelateError, Correlator, RequestKind, Waiter};
pub use element::{Binding, Element, ElementType, EndpointRef};
pub use error::{CoreError, CoreResult};
pub use normalize::{normalize, normalize_value, ElementDraft, NormalizedElement};
pub use protocol::{ClientFrame, SceneData, ServerFrame, ViewportCommand};
pub use query::ElementFilter;
pub use store::{SceneStore, Snapshot, SnapshotMeta};

/// Core crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
