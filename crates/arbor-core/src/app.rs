// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The app session facade: one payload, one assembled tree, one scheduler.

use crate::classify::IoSets;
use crate::frames::TokioFramePort;
use crate::frontend::{self, EvalError, FrontendFn};
use crate::loader::{ComponentLoader, ModuleSource};
use crate::observable::Observable;
use crate::payload::{AppPayload, ComponentId, ComponentMeta, Dependency, LayoutNode, Props};
use crate::router::TargetMap;
use crate::scheduler::{UpdateScheduler, UpdateTransaction};
use crate::server::{RemoteClient, RemoteInvocationError};
use crate::status::{LoadingStatus, Stage, StatusUpdate};
use crate::store::PropStore;
use crate::tree::{AssembleError, Assembler, ComponentNode, VALUE_PROP};
use arbor_app_core::frame_port::FramePort;
use arbor_app_core::options::AppOptions;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

/// Live value reader exposed by a rendered instance.
#[async_trait]
pub trait ValueAccessor: Send + Sync {
    /// Current value as the instance sees it.
    async fn get_value(&self) -> Value;
}

/// Failure while running the dependencies fired by a trigger.
#[derive(Debug, Error, PartialEq)]
pub enum DispatchError {
    /// The frontend function rejected.
    #[error("dependency {fn_index}: frontend function failed: {source}")]
    Frontend {
        /// Dependency index.
        fn_index: usize,
        /// Underlying evaluation error.
        source: EvalError,
    },
    /// The backend call failed.
    #[error("dependency {fn_index}: backend call failed: {source}")]
    Remote {
        /// Dependency index.
        fn_index: usize,
        /// Underlying remote error.
        source: RemoteInvocationError,
    },
}

/// External collaborators of one session.
#[derive(Clone)]
pub struct Services {
    /// Root URL handed to the module source.
    pub root_url: String,
    /// Where component implementations come from.
    pub modules: Arc<dyn ModuleSource>,
    /// Remote-procedure client for server functions and backend runs.
    pub remote: Arc<dyn RemoteClient>,
    /// "Run before next paint" primitive used by the update scheduler.
    pub frames: Arc<dyn FramePort>,
}

struct Inner {
    components: HashMap<ComponentId, ComponentMeta>,
    all: Vec<ComponentMeta>,
    layout: LayoutNode,
    dependencies: Vec<Dependency>,
    frontend_fns: Vec<Option<FrontendFn>>,
    targets: TargetMap,
    io: IoSets,
    loader: ComponentLoader,
    remote: Arc<dyn RemoteClient>,
    store: Arc<PropStore>,
    scheduler: UpdateScheduler,
    status: LoadingStatus,
    tree: Observable<Option<Arc<ComponentNode>>>,
    assembled: OnceCell<Arc<ComponentNode>>,
    instances: Mutex<HashMap<ComponentId, Arc<dyn ValueAccessor>>>,
    options: AppOptions,
}

/// One app session. Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct App {
    inner: Arc<Inner>,
}

/// Build a session on the current tokio runtime, assemble it, and publish the tree.
pub async fn assemble_app(
    payload: AppPayload,
    root_url: impl Into<String>,
    modules: Arc<dyn ModuleSource>,
    remote: Arc<dyn RemoteClient>,
    options: AppOptions,
) -> Result<App, AssembleError> {
    let frames = TokioFramePort::current(Duration::from_millis(options.frame_interval_ms))?;
    let app = App::new(
        payload,
        Services {
            root_url: root_url.into(),
            modules,
            remote,
            frames: Arc::new(frames),
        },
        options,
    );
    app.assemble().await?;
    Ok(app)
}

impl App {
    /// Prepare a session: synthetic root, routing, I/O sets, compiled frontend functions.
    ///
    /// Nothing is loaded or published until [`App::assemble`].
    pub fn new(payload: AppPayload, services: Services, options: AppOptions) -> Self {
        let AppPayload {
            components,
            layout,
            dependencies,
        } = payload;

        let root = ComponentMeta::synthetic_root(layout.id, options.fill_height);
        let all: Vec<ComponentMeta> = std::iter::once(root)
            .chain(components.into_iter().filter(|c| c.id != layout.id))
            .collect();
        let by_id = all.iter().map(|c| (c.id, c.clone())).collect();

        let targets = TargetMap::from_dependencies(&dependencies);
        let io = IoSets::from_dependencies(&dependencies);
        let status = LoadingStatus::new();
        let frontend_fns = dependencies
            .iter()
            .enumerate()
            .map(|(fn_index, dep)| {
                status.register(fn_index, &dep.outputs);
                match frontend::try_compile(
                    dep.js.as_deref(),
                    dep.backend_fn,
                    dep.inputs.len(),
                    dep.outputs.len(),
                ) {
                    Ok(compiled) => compiled,
                    Err(err) => {
                        warn!(fn_index, error = %err, "frontend function failed to compile");
                        None
                    }
                }
            })
            .collect();

        let store = Arc::new(PropStore::new());
        let scheduler = UpdateScheduler::new(Arc::clone(&store), services.frames);
        Self {
            inner: Arc::new(Inner {
                components: by_id,
                all,
                layout,
                dependencies,
                frontend_fns,
                targets,
                io,
                loader: ComponentLoader::new(services.modules, services.root_url),
                remote: services.remote,
                store,
                scheduler,
                status,
                tree: Observable::new(None),
                assembled: OnceCell::new(),
                instances: Mutex::new(HashMap::new()),
                options,
            }),
        }
    }

    /// Preload every implementation, assemble the tree, then publish it once.
    ///
    /// A session is assembled at most once. Concurrent callers join the walk
    /// in flight; later calls return the published tree. A failed walk
    /// publishes nothing and may be retried.
    #[instrument(skip_all, fields(root = self.inner.layout.id))]
    pub async fn assemble(&self) -> Result<Arc<ComponentNode>, AssembleError> {
        self.inner
            .assembled
            .get_or_try_init(|| self.assemble_and_publish())
            .await
            .map(Arc::clone)
    }

    async fn assemble_and_publish(&self) -> Result<Arc<ComponentNode>, AssembleError> {
        let inner = &*self.inner;
        inner.loader.preload_all(&inner.all).await;
        let root = Assembler {
            components: &inner.components,
            all: &inner.all,
            loader: &inner.loader,
            targets: &inner.targets,
            io: &inner.io,
            remote: &inner.remote,
            store: &inner.store,
            status: &inner.status,
            options: &inner.options,
        }
        .assemble(&inner.layout)
        .await?;
        let root = Arc::new(root);
        info!(nodes = root.len(), "component tree published");
        inner.tree.set(Some(Arc::clone(&root)));
        Ok(root)
    }

    /// The tree: `None` until fully assembled, then the complete tree.
    pub fn tree(&self) -> &Observable<Option<Arc<ComponentNode>>> {
        &self.inner.tree
    }

    /// Routing table built from the dependencies.
    pub fn target_map(&self) -> &TargetMap {
        &self.inner.targets
    }

    /// Dependencies in declaration order.
    pub fn dependencies(&self) -> &[Dependency] {
        &self.inner.dependencies
    }

    /// Compiled frontend function of dependency `fn_index`, if any.
    pub fn frontend_fn(&self, fn_index: usize) -> Option<&FrontendFn> {
        self.inner.frontend_fns.get(fn_index).and_then(Option::as_ref)
    }

    /// Options this session was built with.
    pub fn options(&self) -> &AppOptions {
        &self.inner.options
    }

    /// Queue a batch of prop writes for the next flush.
    pub fn submit_update(&self, batch: Vec<UpdateTransaction>) {
        self.inner.scheduler.submit(batch);
    }

    /// The session's update scheduler.
    pub fn scheduler(&self) -> &UpdateScheduler {
        &self.inner.scheduler
    }

    /// Whether a flush is waiting for the next frame.
    pub fn flush_pending(&self) -> &Observable<bool> {
        self.inner.scheduler.flush_pending()
    }

    /// Per-dependency and per-component loading status.
    pub fn loading_status(&self) -> &LoadingStatus {
        &self.inner.status
    }

    /// Current props of component `id`.
    pub fn props(&self, id: ComponentId) -> Option<Props> {
        self.inner.store.props(id)
    }

    /// Register the live instance rendered for `id`.
    pub fn attach_instance(&self, id: ComponentId, accessor: Arc<dyn ValueAccessor>) {
        self.inner
            .instances
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, accessor);
    }

    /// Forget the live instance of `id`.
    pub fn detach_instance(&self, id: ComponentId) {
        self.inner
            .instances
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }

    /// Live value of `id`: the instance's accessor if attached, else the stored `value` prop.
    pub async fn read_value(&self, id: ComponentId) -> Option<Value> {
        let accessor = self
            .inner
            .instances
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned();
        match accessor {
            Some(accessor) => Some(accessor.get_value().await),
            None => self.inner.store.get(id, VALUE_PROP),
        }
    }

    /// Run every dependency `trigger` on `id` fires, in routing order.
    ///
    /// Returns how many dependencies ran. Stops at the first failure.
    #[instrument(skip(self))]
    pub async fn dispatch(&self, id: ComponentId, trigger: &str) -> Result<usize, DispatchError> {
        let fn_indices = self.inner.targets.fn_indices(id, trigger).to_vec();
        for &fn_index in &fn_indices {
            self.run_dependency(fn_index).await?;
        }
        Ok(fn_indices.len())
    }

    async fn run_dependency(&self, fn_index: usize) -> Result<(), DispatchError> {
        let Some(dep) = self.inner.dependencies.get(fn_index) else {
            return Ok(());
        };
        let frontend = self.frontend_fn(fn_index);
        if frontend.is_none() && !dep.backend_fn {
            return Ok(());
        }

        let mut values = Vec::with_capacity(dep.inputs.len());
        for input in &dep.inputs {
            values.push(self.read_value(*input).await.unwrap_or(Value::Null));
        }

        if let Some(frontend) = frontend {
            match frontend.call(values).await {
                Ok(Value::Array(items)) => values = items,
                Ok(other) => values = vec![other],
                Err(source) => {
                    self.inner.status.update(
                        StatusUpdate::new(fn_index, Stage::Error).with_message(source.to_string()),
                    );
                    return Err(DispatchError::Frontend { fn_index, source });
                }
            }
        }

        if dep.backend_fn {
            self.inner
                .status
                .update(StatusUpdate::new(fn_index, Stage::Pending));
            match self.inner.remote.predict(fn_index, values).await {
                Ok(outputs) => {
                    self.inner
                        .status
                        .update(StatusUpdate::new(fn_index, Stage::Complete));
                    values = outputs;
                }
                Err(source) => {
                    self.inner.status.update(
                        StatusUpdate::new(fn_index, Stage::Error).with_message(source.to_string()),
                    );
                    return Err(DispatchError::Remote { fn_index, source });
                }
            }
        }

        let batch: Vec<UpdateTransaction> = dep
            .outputs
            .iter()
            .zip(values)
            .map(|(id, value)| UpdateTransaction::new(*id, VALUE_PROP, value))
            .collect();
        debug!(fn_index, writes = batch.len(), "dependency produced outputs");
        if !batch.is_empty() {
            self.submit_update(batch);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::loader::{LoadError, LoadedModule, Variant};
    use arbor_app_core::frame_port::{FrameError, FrameTask};
    use serde_json::json;

    struct Source;

    #[async_trait]
    impl ModuleSource for Source {
        async fn fetch_module(
            &self,
            _root_url: &str,
            type_name: &str,
            _class_id: &str,
            _variant: Variant,
        ) -> Result<LoadedModule, LoadError> {
            Ok(LoadedModule {
                implementation: Arc::new(()),
                resolved_type_name: type_name.to_owned(),
            })
        }
    }

    struct Echo;

    #[async_trait]
    impl RemoteClient for Echo {
        async fn invoke(
            &self,
            _component_id: ComponentId,
            _function_name: &str,
            args: Value,
        ) -> Result<Value, RemoteInvocationError> {
            Ok(args)
        }

        async fn predict(
            &self,
            _fn_index: usize,
            inputs: Vec<Value>,
        ) -> Result<Vec<Value>, RemoteInvocationError> {
            Ok(inputs)
        }
    }

    struct Inline;

    impl FramePort for Inline {
        fn request_frame(&self, task: FrameTask) -> Result<(), FrameError> {
            task();
            Ok(())
        }
    }

    struct Fixed(Value);

    #[async_trait]
    impl ValueAccessor for Fixed {
        async fn get_value(&self) -> Value {
            self.0.clone()
        }
    }

    fn app(payload: AppPayload, options: AppOptions) -> App {
        App::new(
            payload,
            Services {
                root_url: "mem://".into(),
                modules: Arc::new(Source),
                remote: Arc::new(Echo),
                frames: Arc::new(Inline),
            },
            options,
        )
    }

    fn payload() -> AppPayload {
        serde_json::from_value(json!({
            "components": [
                {"id": 1, "type": "textbox", "props": {"value": "hi"}},
                {"id": 2, "type": "textbox", "props": {"value": ""}}
            ],
            "layout": {"id": 0, "children": [{"id": 1}, {"id": 2}]},
            "dependencies": [
                {"inputs": [1], "outputs": [2], "targets": [[1, "submit"]],
                 "js": "(s) => s.toUpperCase()"}
            ]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn tree_is_unpublished_until_assembled() {
        let app = app(payload(), AppOptions::default());
        assert!(app.tree().get().is_none());
        let tree = app.assemble().await.unwrap();
        assert_eq!(tree.kind, "column");
        assert_eq!(tree.children.len(), 2);
        let again = app.assemble().await.unwrap();
        assert!(Arc::ptr_eq(&tree, &again));
    }

    #[tokio::test]
    async fn synthetic_root_honours_fill_height() {
        let options = AppOptions {
            fill_height: true,
            ..AppOptions::default()
        };
        let app = app(payload(), options);
        app.assemble().await.unwrap();
        let root = app.props(0).unwrap();
        assert_eq!(root["scale"], json!(1));
        assert_eq!(root["interactive"], json!(false));
    }

    #[tokio::test]
    async fn read_value_prefers_the_attached_instance() {
        let app = app(payload(), AppOptions::default());
        app.assemble().await.unwrap();
        assert_eq!(app.read_value(1).await, Some(json!("hi")));
        app.attach_instance(1, Arc::new(Fixed(json!("live"))));
        assert_eq!(app.read_value(1).await, Some(json!("live")));
        app.detach_instance(1);
        assert_eq!(app.read_value(1).await, Some(json!("hi")));
        assert_eq!(app.read_value(99).await, None);
    }

    #[tokio::test]
    async fn dispatch_runs_the_frontend_function_and_writes_outputs() {
        let app = app(payload(), AppOptions::default());
        app.assemble().await.unwrap();
        assert_eq!(app.dispatch(1, "submit").await, Ok(1));
        assert_eq!(app.read_value(2).await, Some(json!("HI")));
        assert_eq!(app.dispatch(1, "blur").await, Ok(0));
    }

    #[test]
    fn malformed_frontend_source_leaves_no_function() {
        let mut payload = payload();
        payload.dependencies[0].js = Some("(s) =>".into());
        let app = app(payload, AppOptions::default());
        assert!(app.frontend_fn(0).is_none());
    }
}
