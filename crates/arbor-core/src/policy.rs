// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Interactivity decision for a single component.

use crate::classify::IoSets;
use crate::payload::ComponentId;
use serde_json::Value;

/// Decide whether `id` accepts user input.
///
/// Priority: an explicit override wins; otherwise the component is interactive
/// when it feeds a dependency, or when nothing writes to it and its value looks
/// like an empty default. Numeric zero counts as empty, so an output-free
/// component holding `0` is treated as editable.
pub fn decide(
    id: ComponentId,
    explicit: Option<bool>,
    value: Option<&Value>,
    io: &IoSets,
) -> bool {
    match explicit {
        Some(flag) => flag,
        None => io.is_input(id) || (!io.is_output(id) && looks_empty(value)),
    }
}

/// `[]`, `""`, `0`, `false`, `null`, or absent.
pub fn looks_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f == 0.0),
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(_)) => false,
    }
}

/// Read the explicit `interactive` override from props (`true`/`false` only).
pub fn explicit_override(value: Option<&Value>) -> Option<bool> {
    value.and_then(Value::as_bool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn sets(inputs: &[ComponentId], outputs: &[ComponentId]) -> IoSets {
        IoSets {
            inputs: inputs.iter().copied().collect(),
            outputs: outputs.iter().copied().collect(),
        }
    }

    #[test]
    fn zero_valued_input_is_interactive() {
        assert!(decide(1, None, Some(&json!(0)), &sets(&[1], &[])));
    }

    #[test]
    fn output_is_not_interactive_even_when_empty() {
        assert!(!decide(1, None, Some(&json!(0)), &sets(&[], &[1])));
        assert!(!decide(1, None, None, &sets(&[], &[1])));
    }

    #[test]
    fn unrelated_component_depends_on_emptiness() {
        let io = sets(&[], &[]);
        assert!(decide(1, None, Some(&json!("")), &io));
        assert!(decide(1, None, Some(&json!([])), &io));
        assert!(decide(1, None, Some(&json!(0.0)), &io));
        assert!(!decide(1, None, Some(&json!("hello")), &io));
        assert!(!decide(1, None, Some(&json!([1])), &io));
        assert!(!decide(1, None, Some(&json!({})), &io));
        assert!(!decide(1, None, Some(&json!(3)), &io));
    }

    #[test]
    fn only_booleans_count_as_explicit() {
        assert_eq!(explicit_override(Some(&json!(true))), Some(true));
        assert_eq!(explicit_override(Some(&json!(null))), None);
        assert_eq!(explicit_override(Some(&json!("yes"))), None);
        assert_eq!(explicit_override(None), None);
    }

    fn any_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i32>().prop_map(Value::from),
            ".{0,4}".prop_map(Value::from),
        ]
    }

    proptest! {
        #[test]
        fn explicit_override_always_wins(
            flag in any::<bool>(),
            value in any_value(),
            is_in in any::<bool>(),
            is_out in any::<bool>(),
        ) {
            let io = IoSets {
                inputs: is_in.then_some(5).into_iter().collect(),
                outputs: is_out.then_some(5).into_iter().collect(),
            };
            prop_assert_eq!(decide(5, Some(flag), Some(&value), &io), flag);
        }
    }
}
