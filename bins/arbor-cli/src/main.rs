// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Arbor CLI
//!
//! Assembles an app payload against an on-disk module root and prints the
//! resulting component tree and trigger routing table.

use anyhow::{Context, Result};
use arbor_app_core::config::ConfigService;
use arbor_app_core::options::AppOptions;
use arbor_core::{
    assemble_app, AppPayload, ComponentId, ComponentNode, RemoteClient, RemoteInvocationError,
};
use arbor_fs::{FsConfigStore, FsModuleSource};
use async_trait::async_trait;
use clap::Parser;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Command to execute
    #[clap(subcommand)]
    cmd: Option<Command>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Assemble a payload and print its tree
    Inspect {
        /// Payload JSON with `components`, `layout`, and `dependencies`
        payload: PathBuf,
        /// Module root directory
        #[clap(long)]
        modules: PathBuf,
        /// Let the root column fill the viewport height
        #[clap(long)]
        fill_height: bool,
        /// Log module loads and flushes
        #[clap(short, long)]
        verbose: bool,
    },
    /// Show (and optionally update) persisted options
    Options {
        /// Persist `fill_height`
        #[clap(long)]
        fill_height: Option<bool>,
        /// Persist the flush delay in milliseconds
        #[clap(long)]
        frame_interval_ms: Option<u64>,
    },
}

/// Remote client for offline inspection; every call fails.
struct NoRemote;

#[async_trait]
impl RemoteClient for NoRemote {
    async fn invoke(
        &self,
        _component_id: ComponentId,
        function_name: &str,
        _args: Value,
    ) -> Result<Value, RemoteInvocationError> {
        Err(RemoteInvocationError::Transport(format!(
            "no remote while inspecting (called `{function_name}`)"
        )))
    }

    async fn predict(
        &self,
        fn_index: usize,
        _inputs: Vec<Value>,
    ) -> Result<Vec<Value>, RemoteInvocationError> {
        Err(RemoteInvocationError::Transport(format!(
            "no remote while inspecting (dependency {fn_index})"
        )))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.cmd {
        Some(Command::Inspect {
            payload,
            modules,
            fill_height,
            verbose,
        }) => {
            init_tracing(verbose)?;
            inspect(payload, modules, fill_height).await?;
        }
        Some(Command::Options {
            fill_height,
            frame_interval_ms,
        }) => {
            init_tracing(false)?;
            options(fill_height, frame_interval_ms)?;
        }
        None => {
            println!("Arbor CLI. Use --help for usage.");
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")
}

fn load_options() -> AppOptions {
    match FsConfigStore::new().and_then(|store| ConfigService::new(store).load_options()) {
        Ok(options) => options,
        Err(err) => {
            warn!(error = %err, "could not load options, using defaults");
            AppOptions::default()
        }
    }
}

async fn inspect(payload: PathBuf, modules: PathBuf, fill_height: bool) -> Result<()> {
    let raw = std::fs::read(&payload)
        .with_context(|| format!("reading payload {}", payload.display()))?;
    let payload: AppPayload = serde_json::from_slice(&raw).context("parsing payload")?;

    let mut options = load_options();
    options.fill_height |= fill_height;

    let root = modules
        .to_str()
        .context("module root must be valid UTF-8")?
        .to_owned();
    let app = assemble_app(
        payload,
        root,
        Arc::new(FsModuleSource::new()),
        Arc::new(NoRemote),
        options,
    )
    .await?;
    let tree = app
        .tree()
        .get()
        .context("tree was not published after assembly")?;

    println!("tree:");
    let mut lines = Vec::new();
    tree.walk(&mut |node, depth| lines.push(describe(node, depth)));
    for line in lines {
        println!("{line}");
    }

    println!("targets:");
    for (id, routes) in app.target_map().entries() {
        for route in routes {
            println!("  {id}.{} -> {:?}", route.trigger, route.fn_indices);
        }
    }

    for (fn_index, dep) in app.dependencies().iter().enumerate() {
        if dep.js.is_some() && app.frontend_fn(fn_index).is_none() {
            println!("dependency {fn_index}: frontend function did not compile");
        }
    }
    Ok(())
}

fn describe(node: &ComponentNode, depth: usize) -> String {
    let indent = "  ".repeat(depth + 1);
    let class = if node.component.is_some() {
        node.class_id.clone()
    } else {
        format!("{} (unresolved)", node.class_id)
    };
    let mode = if node.interactive { "interactive" } else { "static" };
    let events = if node.attached_events.is_empty() {
        String::new()
    } else {
        format!(" [{}]", node.attached_events.join(", "))
    };
    format!("{indent}{} {} {class} {mode}{events}", node.id, node.kind)
}

fn options(fill_height: Option<bool>, frame_interval_ms: Option<u64>) -> Result<()> {
    let service = ConfigService::new(FsConfigStore::new()?);
    let mut options = service.load_options()?;
    if fill_height.is_some() || frame_interval_ms.is_some() {
        if let Some(fill_height) = fill_height {
            options.fill_height = fill_height;
        }
        if let Some(ms) = frame_interval_ms {
            options.frame_interval_ms = ms;
        }
        service.save_options(&options)?;
    }
    println!("{}", serde_json::to_string_pretty(&options)?);
    Ok(())
}
