// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Global input/output membership across all dependencies.

use crate::payload::{ComponentId, Dependency};
use std::collections::HashSet;

/// Components that are an input or an output of at least one dependency.
///
/// A component may be both (input of one dependency, output of another).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IoSets {
    /// Ids read by some dependency.
    pub inputs: HashSet<ComponentId>,
    /// Ids written by some dependency.
    pub outputs: HashSet<ComponentId>,
}

impl IoSets {
    /// Accumulate every dependency.
    pub fn from_dependencies(dependencies: &[Dependency]) -> Self {
        let mut sets = Self::default();
        for dep in dependencies {
            sets.classify(dep);
        }
        sets
    }

    /// Add `dependency`'s inputs and outputs to the sets.
    pub fn classify(&mut self, dependency: &Dependency) -> &mut Self {
        self.inputs.extend(dependency.inputs.iter().copied());
        self.outputs.extend(dependency.outputs.iter().copied());
        self
    }

    /// Whether `id` is read by any dependency.
    pub fn is_input(&self, id: ComponentId) -> bool {
        self.inputs.contains(&id)
    }

    /// Whether `id` is written by any dependency.
    pub fn is_output(&self, id: ComponentId) -> bool {
        self.outputs.contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_is_global_across_dependencies() {
        let deps = vec![
            Dependency {
                inputs: vec![1, 2],
                outputs: vec![3],
                ..Dependency::default()
            },
            Dependency {
                inputs: vec![3],
                outputs: vec![4, 1],
                ..Dependency::default()
            },
        ];
        let sets = IoSets::from_dependencies(&deps);
        assert!(sets.is_input(3) && sets.is_output(3));
        assert!(sets.is_input(1) && sets.is_output(1));
        assert!(sets.is_input(2) && !sets.is_output(2));
        assert!(!sets.is_input(4) && sets.is_output(4));
        assert!(!sets.is_input(9) && !sets.is_output(9));
    }
}
