// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tree assembly: layout + metadata + routing → fully bound component tree.
//!
//! Each node is processed depth-first in pre-order:
//! 1. bind the implementation from the loader cache (a load failure degrades
//!    the node to an unresolved implementation);
//! 2. composites get their example sub-component map;
//! 3. `attached_events` lists the node's triggers in registration order;
//! 4. `interactive` comes from the interactivity policy;
//! 5. server functions named in `server_fns` are bound to the remote client;
//! 6. the node's props are registered in the instance index;
//! 7. children are assembled concurrently and awaited together.

use crate::classify::IoSets;
use crate::loader::{ComponentLoader, ExampleComponents, ResolvedComponent};
use crate::payload::{ComponentId, ComponentMeta, LayoutNode};
use crate::policy;
use crate::router::TargetMap;
use crate::server::{self, RemoteClient, ServerFunctions};
use crate::status::LoadingStatus;
use crate::store::PropStore;
use arbor_app_core::frame_port::FrameError;
use arbor_app_core::options::AppOptions;
use futures_util::future::{join_all, BoxFuture, FutureExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Prop carrying the trigger names attached to a component.
pub const ATTACHED_EVENTS_PROP: &str = "attached_events";
/// Prop carrying the interactivity decision.
pub const INTERACTIVE_PROP: &str = "interactive";
/// Prop listing example component type names of a composite.
pub const EXAMPLE_NAMES_PROP: &str = "components";
/// Prop listing server function names.
pub const SERVER_FNS_PROP: &str = "server_fns";
/// Prop holding a component's value.
pub const VALUE_PROP: &str = "value";

/// Failure to assemble or run an app session.
#[derive(Debug, Error, PartialEq)]
pub enum AssembleError {
    /// The layout references an id with no component metadata.
    #[error("layout references unknown component {0}")]
    MissingComponent(ComponentId),
    /// No frame port could be set up for the update scheduler.
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// One assembled component and its subtree.
#[derive(Debug, Clone)]
pub struct ComponentNode {
    /// Component id.
    pub id: ComponentId,
    /// Semantic kind.
    pub kind: String,
    /// Implementation class id.
    pub class_id: String,
    /// Resolved implementation, `None` when it failed to load.
    pub component: Option<Arc<ResolvedComponent>>,
    /// Example sub-components, composites only.
    pub component_map: Option<ExampleComponents>,
    /// Trigger names in registration order.
    pub attached_events: Vec<String>,
    /// Whether the component accepts user input.
    pub interactive: bool,
    /// Remote-callable functions bound to this component.
    pub server: ServerFunctions,
    /// Children in layout order.
    pub children: Vec<ComponentNode>,
}

impl ComponentNode {
    /// Depth-first pre-order search for `id`.
    pub fn find(&self, id: ComponentId) -> Option<&Self> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    /// Visit every node depth-first in pre-order with its depth.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Self, usize)) {
        self.walk_at(0, f);
    }

    fn walk_at<'a>(&'a self, depth: usize, f: &mut impl FnMut(&'a Self, usize)) {
        f(self, depth);
        for child in &self.children {
            child.walk_at(depth + 1, f);
        }
    }

    /// Number of nodes in this subtree.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(Self::len).sum::<usize>()
    }

    /// Always false; a subtree holds at least its own node.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Everything the assembler reads while walking the layout.
pub(crate) struct Assembler<'a> {
    pub components: &'a HashMap<ComponentId, ComponentMeta>,
    pub all: &'a [ComponentMeta],
    pub loader: &'a ComponentLoader,
    pub targets: &'a TargetMap,
    pub io: &'a IoSets,
    pub remote: &'a Arc<dyn RemoteClient>,
    pub store: &'a PropStore,
    pub status: &'a LoadingStatus,
    pub options: &'a AppOptions,
}

impl<'a> Assembler<'a> {
    pub fn assemble(
        &'a self,
        layout: &'a LayoutNode,
    ) -> BoxFuture<'a, Result<ComponentNode, AssembleError>> {
        async move {
            let meta = self
                .components
                .get(&layout.id)
                .ok_or(AssembleError::MissingComponent(layout.id))?;
            let mut props = meta.props.clone();

            let example_names = if self.options.is_composite(&meta.kind) {
                Some(example_names(props.get(EXAMPLE_NAMES_PROP)))
            } else {
                None
            };
            let entry = self
                .loader
                .resolve(&meta.kind, meta.class_id(), self.all, example_names.as_deref())
                .await;
            let component = match entry.component {
                Ok(component) => Some(component),
                Err(err) => {
                    self.status.load_failed(meta.id, err.to_string());
                    None
                }
            };

            let attached_events: Vec<String> = self
                .targets
                .triggers(meta.id)
                .into_iter()
                .map(str::to_owned)
                .collect();
            if self.targets.contains(meta.id) {
                props.insert(
                    ATTACHED_EVENTS_PROP.into(),
                    Value::from(attached_events.clone()),
                );
            }

            let interactive = policy::decide(
                meta.id,
                policy::explicit_override(props.get(INTERACTIVE_PROP)),
                props.get(VALUE_PROP),
                self.io,
            );
            props.insert(INTERACTIVE_PROP.into(), Value::Bool(interactive));

            let server = server::bind(
                meta.id,
                &server::declared_names(props.get(SERVER_FNS_PROP)),
                self.remote,
            );

            self.store.register(meta.id, props);

            let children = join_all(layout.children().iter().map(|c| self.assemble(c)))
                .await
                .into_iter()
                .collect::<Result<Vec<_>, _>>()?;

            Ok(ComponentNode {
                id: meta.id,
                kind: meta.kind.clone(),
                class_id: meta.class_id().to_owned(),
                component,
                component_map: entry.example_components,
                attached_events,
                interactive,
                server,
                children,
            })
        }
        .boxed()
    }
}

fn example_names(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}
