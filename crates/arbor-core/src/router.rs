// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Routing table from `(component, trigger)` to the dependencies it fires.
//!
//! Built once at startup in dependency-declaration order. Trigger order per
//! component is first-registration order, and each dependency index appears at
//! most once per `(component, trigger)` pair.

use crate::payload::{ComponentId, Dependency, Target};
use std::collections::HashMap;

/// Dependencies fired by one trigger on one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerRoute {
    /// Trigger (event) name, e.g. `"click"`.
    pub trigger: String,
    /// Dependency indices in first-seen order, without duplicates.
    pub fn_indices: Vec<usize>,
}

/// Component id → trigger → ordered, de-duplicated dependency indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetMap {
    routes: HashMap<ComponentId, Vec<TriggerRoute>>,
}

impl TargetMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the map from dependencies; each position is its fn index.
    pub fn from_dependencies(dependencies: &[Dependency]) -> Self {
        let mut map = Self::new();
        for (fn_index, dep) in dependencies.iter().enumerate() {
            map.register(&dep.targets, fn_index);
        }
        map
    }

    /// Route every `(component, trigger)` in `targets` to `fn_index`.
    ///
    /// Mutates and returns the shared map.
    pub fn register(&mut self, targets: &[Target], fn_index: usize) -> &mut Self {
        for (id, trigger) in targets {
            let routes = self.routes.entry(*id).or_default();
            match routes.iter_mut().find(|r| r.trigger == *trigger) {
                Some(route) => {
                    if !route.fn_indices.contains(&fn_index) {
                        route.fn_indices.push(fn_index);
                    }
                }
                None => routes.push(TriggerRoute {
                    trigger: trigger.clone(),
                    fn_indices: vec![fn_index],
                }),
            }
        }
        self
    }

    /// Whether any trigger is registered for `id`.
    pub fn contains(&self, id: ComponentId) -> bool {
        self.routes.contains_key(&id)
    }

    /// Trigger names registered on `id`, in registration order.
    pub fn triggers(&self, id: ComponentId) -> Vec<&str> {
        self.routes
            .get(&id)
            .map(|routes| routes.iter().map(|r| r.trigger.as_str()).collect())
            .unwrap_or_default()
    }

    /// Dependency indices fired by `trigger` on `id`.
    pub fn fn_indices(&self, id: ComponentId, trigger: &str) -> &[usize] {
        self.routes
            .get(&id)
            .and_then(|routes| routes.iter().find(|r| r.trigger == trigger))
            .map(|r| r.fn_indices.as_slice())
            .unwrap_or_default()
    }

    /// Every `(component, routes)` pair, sorted by component id.
    pub fn entries(&self) -> Vec<(ComponentId, &[TriggerRoute])> {
        let mut out: Vec<_> = self
            .routes
            .iter()
            .map(|(id, routes)| (*id, routes.as_slice()))
            .collect();
        out.sort_by_key(|(id, _)| *id);
        out
    }
}
