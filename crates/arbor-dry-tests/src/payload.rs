// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! App payload builders and a static value accessor.

use arbor_core::{
    AppPayload, ComponentId, ComponentMeta, Dependency, LayoutNode, Props, ValueAccessor,
};
use async_trait::async_trait;
use serde_json::Value;

/// Builder for [`AppPayload`] instances in tests.
///
/// # Example
///
/// ```
/// use arbor_core::LayoutNode;
/// use arbor_dry_tests::PayloadBuilder;
/// use serde_json::json;
///
/// let payload = PayloadBuilder::new()
///     .component(1, "textbox", json!({"value": ""}))
///     .layout(LayoutNode::branch(0, vec![LayoutNode::leaf(1)]))
///     .build();
///
/// assert_eq!(payload.components.len(), 1);
/// assert_eq!(payload.layout.id, 0);
/// ```
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    components: Vec<ComponentMeta>,
    layout: LayoutNode,
    dependencies: Vec<Dependency>,
}

impl Default for PayloadBuilder {
    fn default() -> Self {
        Self {
            components: Vec::new(),
            layout: LayoutNode::leaf(0),
            dependencies: Vec::new(),
        }
    }
}

impl PayloadBuilder {
    /// Empty payload whose layout is a bare root `0`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component whose class id equals its kind. `props` must be a JSON object.
    pub fn component(self, id: ComponentId, kind: &str, props: Value) -> Self {
        self.component_with_class(id, kind, kind, props)
    }

    /// Add a component with an explicit class id.
    pub fn component_with_class(
        mut self,
        id: ComponentId,
        kind: &str,
        class_id: &str,
        props: Value,
    ) -> Self {
        let props = match props {
            Value::Object(map) => map,
            _ => Props::new(),
        };
        self.components
            .push(ComponentMeta::new(id, kind, props).with_class(class_id));
        self
    }

    /// Set the layout tree.
    pub fn layout(mut self, layout: LayoutNode) -> Self {
        self.layout = layout;
        self
    }

    /// Append a dependency; its position is its fn index.
    pub fn dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Build the payload.
    pub fn build(self) -> AppPayload {
        AppPayload {
            components: self.components,
            layout: self.layout,
            dependencies: self.dependencies,
        }
    }
}

/// Builder for [`Dependency`] values.
#[derive(Debug, Clone, Default)]
pub struct DependencyBuilder {
    dependency: Dependency,
}

impl DependencyBuilder {
    /// Dependency with no inputs, outputs, or targets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Components read by the dependency.
    pub fn inputs(mut self, ids: &[ComponentId]) -> Self {
        self.dependency.inputs = ids.to_vec();
        self
    }

    /// Components written by the dependency.
    pub fn outputs(mut self, ids: &[ComponentId]) -> Self {
        self.dependency.outputs = ids.to_vec();
        self
    }

    /// Add a `(component, trigger)` target.
    pub fn trigger(mut self, id: ComponentId, trigger: &str) -> Self {
        self.dependency.targets.push((id, trigger.to_owned()));
        self
    }

    /// Frontend expression source.
    pub fn js(mut self, source: &str) -> Self {
        self.dependency.js = Some(source.to_owned());
        self
    }

    /// Mark the dependency as running a backend function.
    pub fn backend(mut self) -> Self {
        self.dependency.backend_fn = true;
        self
    }

    /// Build the dependency.
    pub fn build(self) -> Dependency {
        self.dependency
    }
}

/// [`ValueAccessor`] that always reports the same value.
#[derive(Debug, Clone)]
pub struct StaticValue(pub Value);

#[async_trait]
impl ValueAccessor for StaticValue {
    async fn get_value(&self) -> Value {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dependency_builder_collects_targets_in_order() {
        let dep = DependencyBuilder::new()
            .inputs(&[1])
            .outputs(&[2, 3])
            .trigger(1, "change")
            .trigger(4, "click")
            .backend()
            .build();
        assert_eq!(dep.targets, vec![(1, "change".to_owned()), (4, "click".to_owned())]);
        assert!(dep.backend_fn);
        assert!(dep.js.is_none());
    }

    #[test]
    fn class_ids_default_to_kind() {
        let payload = PayloadBuilder::new()
            .component(1, "image", json!({}))
            .component_with_class(2, "image", "image-v2", json!(null))
            .build();
        assert_eq!(payload.components[0].class_id(), "image");
        assert_eq!(payload.components[1].class_id(), "image-v2");
        assert!(payload.components[1].props.is_empty());
    }
}
