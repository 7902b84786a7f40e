//! C11: Async Agent Manager (§4.11) — background workers distinct from the
//! interactive [`crate::session::Session`] surface. Each worker owns a
//! private task queue and reuses [`AgentLoop`] for the actual turn; it
//! never streams to a client, so it drives turns through [`NullSink`].
//!
//! A worker-task-loop shape: an `mpsc` command channel drained by a
//! spawned `tokio::task`, state published through a shared lock other
//! callers can poll without touching the channel.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;

use crate::agent::{AgentConfig, AgentInstance, AgentLoop, GenerationParams, TurnDeps};
use crate::channel::{ChannelRouter, NullSink};
use crate::error::{Result, RuntimeError};
use crate::model::{Message, ModelProvider};
use crate::tools::ToolRegistry;

/// A background agent's lifecycle state (§4.11: "{IDLE, BUSY, SLEEPING,
/// STOPPED}").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Busy,
    Sleeping,
    Stopped,
}

struct WorkerShared {
    state: RwLock<WorkerState>,
    wake_events: RwLock<HashSet<String>>,
}

enum Command {
    Task(String),
    Event { name: String },
    Wake,
    Sleep { wake_events: Vec<String> },
    Stop,
}

/// A handle to one background worker. Cloning the `Arc` is how callers
/// share it; the worker itself lives on a spawned task.
pub struct AsyncAgentHandle {
    pub id: String,
    shared: Arc<WorkerShared>,
    tx: mpsc::UnboundedSender<Command>,
    cancel_flag: Arc<AtomicBool>,
}

impl AsyncAgentHandle {
    pub fn state(&self) -> WorkerState {
        *self.shared.state.read().expect("worker state lock poisoned")
    }

    /// Transition STOPPED -> IDLE, allowing queued/future tasks to run
    /// (§4.11: "start").
    pub fn start(&self) {
        let mut state = self.shared.state.write().expect("worker state lock poisoned");
        if *state == WorkerState::Stopped {
            *state = WorkerState::Idle;
        }
    }

    /// Stop the worker; cooperative, like `Session::stop` (§4.11: "stop").
    pub fn stop(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
        *self.shared.state.write().expect("worker state lock poisoned") = WorkerState::Stopped;
    }

    /// Put the worker to sleep until `wake` or a matching wake event
    /// arrives (§4.11: "sleep(duration? wake-events?)"). Duration-based
    /// wake is a caller responsibility here — callers schedule their own
    /// timer and call `wake` when it fires, since this crate does not own
    /// a scheduler.
    pub fn sleep(&self, wake_events: Vec<String>) {
        let _ = self.tx.send(Command::Sleep { wake_events });
    }

    pub fn wake(&self) {
        let _ = self.tx.send(Command::Wake);
    }

    /// Enqueue a task prompt; ignored by the worker if sleeping or stopped
    /// (§4.11: "while SLEEPING it ignores tasks").
    pub fn send_task(&self, prompt: impl Into<String>) {
        let _ = self.tx.send(Command::Task(prompt.into()));
    }

    fn notify_event(&self, name: &str) {
        let _ = self.tx.send(Command::Event { name: name.to_string() });
    }
}

impl Drop for AsyncAgentHandle {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Stop);
    }
}

async fn run_worker(
    id: String,
    shared: Arc<WorkerShared>,
    mut rx: mpsc::UnboundedReceiver<Command>,
    mut instance: AgentInstance,
    provider: Arc<dyn ModelProvider>,
    cancel_flag: Arc<AtomicBool>,
) {
    let router = ChannelRouter::new(format!("async:{id}"));
    while let Some(command) = rx.recv().await {
        match command {
            Command::Stop => {
                *shared.state.write().expect("worker state lock poisoned") = WorkerState::Stopped;
                break;
            }
            Command::Sleep { wake_events } => {
                *shared.wake_events.write().expect("wake-events lock poisoned") = wake_events.into_iter().collect();
                *shared.state.write().expect("worker state lock poisoned") = WorkerState::Sleeping;
            }
            Command::Wake => {
                shared.wake_events.write().expect("wake-events lock poisoned").clear();
                let mut state = shared.state.write().expect("worker state lock poisoned");
                if *state == WorkerState::Sleeping {
                    *state = WorkerState::Idle;
                }
            }
            Command::Event { name } => {
                let is_sleeping = *shared.state.read().expect("worker state lock poisoned") == WorkerState::Sleeping;
                if is_sleeping && shared.wake_events.read().expect("wake-events lock poisoned").contains(&name) {
                    shared.wake_events.write().expect("wake-events lock poisoned").clear();
                    *shared.state.write().expect("worker state lock poisoned") = WorkerState::Idle;
                }
            }
            Command::Task(prompt) => {
                let current = *shared.state.read().expect("worker state lock poisoned");
                if current == WorkerState::Sleeping || current == WorkerState::Stopped {
                    continue;
                }
                *shared.state.write().expect("worker state lock poisoned") = WorkerState::Busy;
                cancel_flag.store(false, Ordering::SeqCst);

                instance.context.push(Message::user(prompt));
                let tool_view = instance.tool_view.clone();
                let generation = instance.generation_params(&GenerationParams::default());
                let model = instance.config.model.clone();
                let deps = TurnDeps {
                    provider: provider.as_ref(),
                    tool_view: &tool_view,
                    router: &router,
                    sink: &NullSink,
                    agent_id: &id,
                    session_id: "async",
                    model: &model,
                    generation,
                    response_schema: None,
                    continuation_depth: None,
                    cancel_flag: &cancel_flag,
                };
                AgentLoop::run_turn(&mut instance.context, deps).await;

                let mut state = shared.state.write().expect("worker state lock poisoned");
                if *state == WorkerState::Busy {
                    *state = WorkerState::Idle;
                }
            }
        }
    }
}

/// Registry of background workers (§4.11).
pub struct AsyncAgentManager {
    tool_registry: Arc<ToolRegistry>,
    provider: Arc<dyn ModelProvider>,
    workers: RwLock<HashMap<String, Arc<AsyncAgentHandle>>>,
}

impl AsyncAgentManager {
    pub fn new(tool_registry: Arc<ToolRegistry>, provider: Arc<dyn ModelProvider>) -> Self {
        Self { tool_registry, provider, workers: RwLock::new(HashMap::new()) }
    }

    /// Create a background worker, STOPPED until `start` is called
    /// (§4.11: "create" then "start" are distinct operations).
    pub fn create_agent(&self, config: AgentConfig) -> Arc<AsyncAgentHandle> {
        let id = config.id.clone();
        let instance = AgentInstance::new(config, &self.tool_registry);
        let shared = Arc::new(WorkerShared {
            state: RwLock::new(WorkerState::Stopped),
            wake_events: RwLock::new(HashSet::new()),
        });
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel_flag = Arc::new(AtomicBool::new(false));

        tokio::spawn(run_worker(id.clone(), shared.clone(), rx, instance, self.provider.clone(), cancel_flag.clone()));

        let handle = Arc::new(AsyncAgentHandle { id: id.clone(), shared, tx, cancel_flag });
        self.workers.write().expect("worker registry lock poisoned").insert(id, handle.clone());
        handle
    }

    pub fn find(&self, id: &str) -> Result<Arc<AsyncAgentHandle>> {
        self.workers
            .read()
            .expect("worker registry lock poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| RuntimeError::AgentNotFound(id.to_string()))
    }

    pub fn remove(&self, id: &str) -> bool {
        self.workers.write().expect("worker registry lock poisoned").remove(id).is_some()
    }

    /// Fan an event out to every worker's queue (§4.11: "broadcastEvent(event,
    /// data)"); a sleeping worker wakes only if the event matches its
    /// registered wake list.
    pub fn broadcast_event(&self, event: &str) {
        let workers = self.workers.read().expect("worker registry lock poisoned");
        for worker in workers.values() {
            worker.notify_event(event);
        }
    }

    /// A snapshot of every worker's state, for `async.getAgentStates`.
    pub fn states(&self) -> Vec<(String, WorkerState)> {
        let workers = self.workers.read().expect("worker registry lock poisoned");
        let mut out: Vec<(String, WorkerState)> = workers.iter().map(|(id, h)| (id.clone(), h.state())).collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}
