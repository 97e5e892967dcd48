// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Remote-procedure port and the server functions bound onto components.

use crate::payload::ComponentId;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Failure of a remote call. Never retried.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RemoteInvocationError {
    /// The request never produced a response (connection, framing).
    #[error("transport error: {0}")]
    Transport(String),
    /// The remote side ran the call and reported an error.
    #[error("remote error: {0}")]
    Application(String),
}

/// External remote-procedure client.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Call `function_name` declared by `component_id` with `args`.
    async fn invoke(
        &self,
        component_id: ComponentId,
        function_name: &str,
        args: Value,
    ) -> Result<Value, RemoteInvocationError>;

    /// Run the backend half of dependency `fn_index` on `inputs`, returning output values.
    async fn predict(
        &self,
        fn_index: usize,
        inputs: Vec<Value>,
    ) -> Result<Vec<Value>, RemoteInvocationError>;
}

/// A remote-callable function bound to one component.
#[derive(Clone)]
pub struct ServerFn {
    component_id: ComponentId,
    name: String,
    remote: Arc<dyn RemoteClient>,
}

impl ServerFn {
    /// Function name as declared by the component.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Forward a call to the remote client.
    ///
    /// A single positional argument is sent unwrapped; zero or several are sent
    /// as an array.
    pub async fn call(&self, mut args: Vec<Value>) -> Result<Value, RemoteInvocationError> {
        let payload = if args.len() == 1 {
            args.remove(0)
        } else {
            Value::Array(args)
        };
        self.remote
            .invoke(self.component_id, &self.name, payload)
            .await
    }
}

impl fmt::Debug for ServerFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerFn")
            .field("component_id", &self.component_id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Server functions of one component, by name.
pub type ServerFunctions = BTreeMap<String, ServerFn>;

/// Bind each of `fn_names` on component `id` to `remote`.
pub fn bind(
    id: ComponentId,
    fn_names: &[String],
    remote: &Arc<dyn RemoteClient>,
) -> ServerFunctions {
    fn_names
        .iter()
        .map(|name| {
            (
                name.clone(),
                ServerFn {
                    component_id: id,
                    name: name.clone(),
                    remote: Arc::clone(remote),
                },
            )
        })
        .collect()
}

/// Function names declared in a component's `server_fns` prop.
pub fn declared_names(value: Option<&Value>) -> Vec<String> {
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
