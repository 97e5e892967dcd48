// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Remote client fake that records calls and replays scripted results.

use arbor_core::{ComponentId, RemoteClient, RemoteInvocationError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One recorded server-function call.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeCall {
    /// Component the function is bound to.
    pub component_id: ComponentId,
    /// Function name.
    pub function_name: String,
    /// Arguments as sent.
    pub args: Value,
}

/// [`RemoteClient`] fake.
///
/// `invoke` echoes its arguments unless a reply or failure was scripted for
/// the function name. `predict` returns the scripted outputs for the
/// dependency, or its inputs unchanged.
#[derive(Clone, Default)]
pub struct RecordingRemote {
    inner: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    invocations: Vec<InvokeCall>,
    predictions: Vec<(usize, Vec<Value>)>,
    replies: HashMap<String, Result<Value, RemoteInvocationError>>,
    outputs: HashMap<usize, Result<Vec<Value>, RemoteInvocationError>>,
}

impl RecordingRemote {
    /// Fake with nothing scripted.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make `function_name` answer with `reply`.
    pub fn reply(&self, function_name: &str, reply: Result<Value, RemoteInvocationError>) -> &Self {
        self.lock().replies.insert(function_name.to_owned(), reply);
        self
    }

    /// Make dependency `fn_index` produce `outputs`.
    pub fn outputs(
        &self,
        fn_index: usize,
        outputs: Result<Vec<Value>, RemoteInvocationError>,
    ) -> &Self {
        self.lock().outputs.insert(fn_index, outputs);
        self
    }

    /// Server-function calls so far.
    pub fn invocations(&self) -> Vec<InvokeCall> {
        self.lock().invocations.clone()
    }

    /// Backend runs so far, as `(fn_index, inputs)`.
    pub fn predictions(&self) -> Vec<(usize, Vec<Value>)> {
        self.lock().predictions.clone()
    }
}

#[async_trait]
impl RemoteClient for RecordingRemote {
    async fn invoke(
        &self,
        component_id: ComponentId,
        function_name: &str,
        args: Value,
    ) -> Result<Value, RemoteInvocationError> {
        let mut state = self.lock();
        state.invocations.push(InvokeCall {
            component_id,
            function_name: function_name.to_owned(),
            args: args.clone(),
        });
        state
            .replies
            .get(function_name)
            .cloned()
            .unwrap_or(Ok(args))
    }

    async fn predict(
        &self,
        fn_index: usize,
        inputs: Vec<Value>,
    ) -> Result<Vec<Value>, RemoteInvocationError> {
        let mut state = self.lock();
        state.predictions.push((fn_index, inputs.clone()));
        state.outputs.get(&fn_index).cloned().unwrap_or(Ok(inputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn scripted_replies_override_the_echo() {
        let remote = RecordingRemote::new();
        remote.reply("fail", Err(RemoteInvocationError::Transport("down".into())));
        assert_eq!(remote.invoke(1, "echo", json!(3)).await, Ok(json!(3)));
        assert!(remote.invoke(1, "fail", Value::Null).await.is_err());
        assert_eq!(remote.invocations().len(), 2);

        remote.outputs(0, Ok(vec![json!("done")]));
        assert_eq!(remote.predict(0, vec![json!(1)]).await, Ok(vec![json!("done")]));
        assert_eq!(remote.predict(1, vec![json!(1)]).await, Ok(vec![json!(1)]));
        assert_eq!(remote.predictions()[0], (0, vec![json!(1)]));
    }
}
