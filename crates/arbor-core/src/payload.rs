// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Server-supplied app description: component metadata, layout, dependencies.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Server-assigned component identifier.
pub type ComponentId = u32;

/// Open attribute mapping carried by every component.
pub type Props = Map<String, Value>;

/// Kind and class id used for the synthetic root container.
pub const ROOT_KIND: &str = "column";

/// Metadata for one component instance as delivered by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentMeta {
    /// Unique, server-assigned identifier.
    pub id: ComponentId,
    /// Semantic kind (e.g. `"column"`, `"dataset"`, `"textbox"`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Initial attribute values.
    #[serde(default)]
    pub props: Props,
    /// Key for implementation-cache lookups; several ids may share one class.
    #[serde(default)]
    pub component_class_id: String,
}

impl ComponentMeta {
    /// Build component metadata; the class id defaults to the kind.
    pub fn new(id: ComponentId, kind: impl Into<String>, props: Props) -> Self {
        let kind = kind.into();
        Self {
            id,
            component_class_id: kind.clone(),
            kind,
            props,
        }
    }

    /// Override the implementation class id.
    pub fn with_class(mut self, class_id: impl Into<String>) -> Self {
        self.component_class_id = class_id.into();
        self
    }

    /// Class id used for cache lookups (falls back to the kind when blank).
    pub fn class_id(&self) -> &str {
        if self.component_class_id.is_empty() {
            &self.kind
        } else {
            &self.component_class_id
        }
    }

    /// The implicit container wrapping the whole layout.
    pub fn synthetic_root(id: ComponentId, fill_height: bool) -> Self {
        let mut props = Props::new();
        props.insert("interactive".into(), Value::Bool(false));
        props.insert(
            "scale".into(),
            if fill_height { Value::from(1) } else { Value::Null },
        );
        Self::new(id, ROOT_KIND, props)
    }
}

/// Structural node of the layout tree; carries no props.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutNode {
    /// Id of the component at this position.
    pub id: ComponentId,
    /// Ordered children, absent for leaves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<LayoutNode>>,
}

impl LayoutNode {
    /// A leaf node.
    pub fn leaf(id: ComponentId) -> Self {
        Self { id, children: None }
    }

    /// A node with ordered children.
    pub fn branch(id: ComponentId, children: Vec<LayoutNode>) -> Self {
        Self {
            id,
            children: Some(children),
        }
    }

    /// Children in declaration order (empty for leaves).
    pub fn children(&self) -> &[LayoutNode] {
        self.children.as_deref().unwrap_or_default()
    }
}

/// `(component id, trigger name)` pair that fires a dependency.
pub type Target = (ComponentId, String);

/// One registered server/client interaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    /// Components whose values are read.
    #[serde(default)]
    pub inputs: Vec<ComponentId>,
    /// Components whose values are written.
    #[serde(default)]
    pub outputs: Vec<ComponentId>,
    /// Components/events that trigger this dependency.
    #[serde(default)]
    pub targets: Vec<Target>,
    /// Author-supplied client-side expression.
    #[serde(default)]
    pub js: Option<String>,
    /// Whether a remote procedure also executes.
    #[serde(default)]
    pub backend_fn: bool,
}

/// Complete app description for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppPayload {
    /// Every component in the app (the synthetic root excluded).
    pub components: Vec<ComponentMeta>,
    /// Layout root.
    pub layout: LayoutNode,
    /// Dependencies in declaration order; the position is the fn index.
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn deserializes_server_shape() {
        let raw = r#"{
            "components": [
                {"id": 1, "type": "textbox", "props": {"value": ""}, "component_class_id": "tb"},
                {"id": 2, "type": "button"}
            ],
            "layout": {"id": 0, "children": [{"id": 1}, {"id": 2}]},
            "dependencies": [
                {"targets": [[2, "click"]], "inputs": [1], "outputs": [1], "js": "(x) => x", "backend_fn": false}
            ]
        }"#;
        let payload: AppPayload = serde_json::from_str(raw).unwrap();
        assert_eq!(payload.components[0].class_id(), "tb");
        assert_eq!(payload.components[1].class_id(), "button");
        assert_eq!(payload.layout.children().len(), 2);
        assert!(payload.layout.children()[0].children().is_empty());
        assert_eq!(payload.dependencies[0].targets[0], (2, "click".to_owned()));
    }

    #[test]
    fn synthetic_root_is_non_interactive_column() {
        let root = ComponentMeta::synthetic_root(7, true);
        assert_eq!(root.kind, ROOT_KIND);
        assert_eq!(root.props["interactive"], Value::Bool(false));
        assert_eq!(root.props["scale"], Value::from(1));
    }
}
