#![forbid(unsafe_code)]

//! Panel hosting for paneldeck.
//!
//! - [`registry`]: panel type manifests and factories, capability and plugin
//!   gating.
//! - [`module`]: the panel module trait, containers and built-in modules.
//! - [`host`]: the Panel Host Controller (mount, bindings, metadata, events).
//! - [`context`]: the shared context store.
//! - [`events`]: panel event envelopes and the outbound sink seam.
//! - [`server`]: inbound server message routing.
//! - [`single_flight`]: last-request-wins assignment.
//! - [`testing`]: recording doubles.

pub mod context;
pub mod events;
pub mod host;
pub mod module;
pub mod registry;
pub mod server;
pub mod single_flight;
pub mod subscription;
pub mod testing;

pub use context::{ACTIVE_PANEL_KEY, ContextStore};
pub use events::{
    LifecycleState, NullSink, OutboundMessage, OutboundSink, PanelBindingEvent, PanelEvent,
    PanelLifecycleEvent, SessionFilter,
};
pub use host::{
    BindingChange, BindingObserver, HostError, InitialBinding, MountRequest, MountStatus,
    PanelHostController, PanelMetadata, PlaceholderReason, placeholder_message,
};
pub use module::{
    EmptyPanel, MountOptions, PanelContainer, PanelError, PanelFactory, PanelHostHandle,
    PanelModule, PlaceholderPanel, factory,
};
pub use registry::{
    Availability, EMPTY_PANEL_TYPE, PanelManifest, PanelRegistry, SessionScope, SharedRegistry,
};
pub use server::{SESSION_LIST_KEY, ServerMessageHandler, ServerOutcome, SessionSummary};
pub use single_flight::{InputSessionTarget, SingleFlight};
pub use subscription::{Subscribers, Subscription};
