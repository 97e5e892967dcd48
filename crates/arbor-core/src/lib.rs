// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! arbor-core: app tree assembly for server-described component UIs.
//!
//! A server payload (component metadata, a layout tree, and dependencies)
//! becomes a fully bound component tree: implementations resolved once per
//! class, triggers routed to dependencies, interactivity decided, server
//! functions bound, and frontend expressions compiled. After publication,
//! prop writes go through a per-session scheduler that coalesces them into
//! one flush per frame.
#![forbid(unsafe_code)]

/// Input/output classification of components across all dependencies.
pub mod classify;
/// Frontend-function compiler and its sandboxed expression interpreter.
pub mod frontend;
/// Server function binding and the remote-procedure port.
pub mod server;

mod app;
mod frames;
mod loader;
mod observable;
mod payload;
mod policy;
mod router;
mod scheduler;
mod status;
mod store;
mod tree;

// Re-exports for stable public API
/// Session facade and its collaborators.
pub use app::{assemble_app, App, DispatchError, Services, ValueAccessor};
pub use classify::IoSets;
/// Tokio-backed frame port.
pub use frames::TokioFramePort;
pub use frontend::{compile, try_compile, CompileError, EvalError, FrontendFn};
/// Component implementation loading and caching.
pub use loader::{
    ComponentLoader, ExampleComponents, LoadError, LoadResult, LoadedModule, ModuleHandle,
    ModuleSource, ResolvedComponent, ResolvedEntry, Variant,
};
/// Observable cells.
pub use observable::Observable;
/// Server payload model.
pub use payload::{
    AppPayload, ComponentId, ComponentMeta, Dependency, LayoutNode, Props, Target, ROOT_KIND,
};
/// Interactivity policy.
pub use policy::{decide, explicit_override, looks_empty};
/// Trigger routing.
pub use router::{TargetMap, TriggerRoute};
/// Batched prop updates.
pub use scheduler::{UpdateScheduler, UpdateTransaction};
pub use server::{RemoteClient, RemoteInvocationError, ServerFn, ServerFunctions};
/// Loading-status tracking.
pub use status::{ComponentStatus, LoadingStatus, Stage, StatusSnapshot, StatusUpdate};
/// Live instance index.
pub use store::PropStore;
/// Tree assembly output and well-known prop names.
pub use tree::{
    AssembleError, ComponentNode, ATTACHED_EVENTS_PROP, EXAMPLE_NAMES_PROP, INTERACTIVE_PROP,
    SERVER_FNS_PROP, VALUE_PROP,
};
