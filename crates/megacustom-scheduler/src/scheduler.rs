//! Task scheduler
//!
//! Maintains the durable task list and a timer loop that dispatches due
//! tasks to registered runners. Executions run on their own tokio task so a
//! slow sync never blocks the tick; the `is_running` flag guards against
//! re-dispatch while one is in flight.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use megacustom_core::error::{Error, Result};
use megacustom_core::events::{Event, EventBus};

use crate::task::{ScheduledTask, TaskKind};

/// Lower bound for the check interval
const MIN_CHECK_INTERVAL_SECS: u64 = 10;

/// Executes one kind of scheduled task
///
/// `run` receives the task's target name (mapping, profile, or ruleset) and
/// returns a human-readable status line on success or an error on failure.
#[async_trait::async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, target_name: &str) -> Result<String>;
}

/// On-disk shape of `scheduler.json`
#[derive(Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SchedulerFile {
    next_task_id: u64,
    check_interval: u64,
    tasks: Vec<ScheduledTask>,
}

impl Default for SchedulerFile {
    fn default() -> Self {
        Self {
            next_task_id: 1,
            check_interval: 60,
            tasks: Vec::new(),
        }
    }
}

struct SchedulerState {
    tasks: Vec<ScheduledTask>,
    next_task_id: u64,
    check_interval_secs: u64,
    shutdown: bool,
}

/// Timer-driven dispatcher over the durable task list
pub struct TaskScheduler {
    path: PathBuf,
    state: Mutex<SchedulerState>,
    runners: Mutex<HashMap<TaskKind, Arc<dyn TaskRunner>>>,
    events: EventBus,
    wake: Notify,
}

impl TaskScheduler {
    /// Load (or initialise) the scheduler backed by `path`
    pub fn new(path: impl Into<PathBuf>, events: EventBus) -> Self {
        let path = path.into();
        let file = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<SchedulerFile>(&content) {
                Ok(file) => file,
                Err(e) => {
                    warn!(error = %e, "Scheduler file is malformed, starting fresh");
                    SchedulerFile::default()
                }
            },
            Err(_) => {
                debug!("No scheduler config found, starting fresh");
                SchedulerFile::default()
            }
        };
        info!(tasks = file.tasks.len(), "Loaded scheduled tasks");
        Self {
            path,
            state: Mutex::new(SchedulerState {
                tasks: file.tasks,
                next_task_id: file.next_task_id,
                check_interval_secs: file.check_interval.max(MIN_CHECK_INTERVAL_SECS),
                shutdown: false,
            }),
            runners: Mutex::new(HashMap::new()),
            events,
            wake: Notify::new(),
        }
    }

    /// Default location under the application config directory
    pub fn default_path() -> PathBuf {
        megacustom_core::config::config_dir().join("scheduler.json")
    }

    /// Register the runner that executes tasks of `kind`
    pub fn register_runner(&self, kind: TaskKind, runner: Arc<dyn TaskRunner>) {
        self.runners.lock().unwrap().insert(kind, runner);
    }

    // --- Task management ---

    /// Add a task; a missing `next_run` defaults to one minute from now
    pub fn add_task(&self, mut task: ScheduledTask) -> Result<u64> {
        let id = {
            let mut state = self.state.lock().unwrap();
            let id = state.next_task_id;
            state.next_task_id += 1;
            task.id = id;
            if task.next_run.is_none() {
                task.next_run = Some(Utc::now() + chrono::Duration::seconds(60));
            }
            info!(task = %task.name, id, "Added scheduled task");
            state.tasks.push(task);
            id
        };
        self.save()?;
        self.events.publish(Event::ScheduledTasksChanged);
        Ok(id)
    }

    pub fn remove_task(&self, id: u64) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            let before = state.tasks.len();
            state.tasks.retain(|t| t.id != id);
            if state.tasks.len() == before {
                return Err(Error::not_found(format!("task {id}")));
            }
        }
        self.save()?;
        self.events.publish(Event::ScheduledTasksChanged);
        Ok(())
    }

    pub fn update_task(&self, task: ScheduledTask) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            let slot = state
                .tasks
                .iter_mut()
                .find(|t| t.id == task.id)
                .ok_or_else(|| Error::not_found(format!("task {}", task.id)))?;
            *slot = task;
        }
        self.save()?;
        self.events.publish(Event::ScheduledTasksChanged);
        Ok(())
    }

    pub fn set_task_enabled(&self, id: u64, enabled: bool) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            let task = state
                .tasks
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| Error::not_found(format!("task {id}")))?;
            task.enabled = enabled;
        }
        self.save()?;
        self.events.publish(Event::ScheduledTasksChanged);
        Ok(())
    }

    pub fn task(&self, id: u64) -> Option<ScheduledTask> {
        self.state
            .lock()
            .unwrap()
            .tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
    }

    pub fn tasks(&self) -> Vec<ScheduledTask> {
        self.state.lock().unwrap().tasks.clone()
    }

    pub fn set_check_interval(&self, seconds: u64) {
        self.state.lock().unwrap().check_interval_secs =
            seconds.max(MIN_CHECK_INTERVAL_SECS);
        let _ = self.save();
        self.wake.notify_one();
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.state.lock().unwrap().check_interval_secs)
    }

    // --- Execution ---

    /// Run one task immediately, regardless of its schedule
    pub async fn run_task_now(self: &Arc<Self>, id: u64) -> Result<()> {
        let claimed = self.claim_task(id)?;
        self.execute(claimed).await;
        Ok(())
    }

    /// Dispatch every due task; returns how many were started
    ///
    /// The timer loop calls this on each tick. Executions are spawned, not
    /// awaited.
    pub fn dispatch_due(self: &Arc<Self>) -> usize {
        let now = Utc::now();
        let due: Vec<ScheduledTask> = {
            let mut state = self.state.lock().unwrap();
            let mut due = Vec::new();
            for task in state.tasks.iter_mut() {
                if task.is_due(now) {
                    task.is_running = true;
                    due.push(task.clone());
                }
            }
            due
        };

        let count = due.len();
        for task in due {
            let scheduler = Arc::clone(self);
            tokio::spawn(async move {
                scheduler.execute(task).await;
            });
        }
        count
    }

    /// Timer loop; returns when [`shutdown`](Self::shutdown) is called
    pub async fn run(self: Arc<Self>) {
        info!(interval = ?self.check_interval(), "Task scheduler starting");
        loop {
            let interval = self.check_interval();
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if self.state.lock().unwrap().shutdown {
                        break;
                    }
                    let started = self.dispatch_due();
                    if started > 0 {
                        debug!(started, "Dispatched due tasks");
                    }
                }
                _ = self.wake.notified() => {
                    if self.state.lock().unwrap().shutdown {
                        break;
                    }
                }
            }
        }
        info!("Task scheduler stopped");
    }

    /// Spawn the timer loop on the current runtime
    pub fn spawn(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(scheduler.run())
    }

    pub fn shutdown(&self) {
        self.state.lock().unwrap().shutdown = true;
        self.wake.notify_one();
    }

    fn claim_task(&self, id: u64) -> Result<ScheduledTask> {
        let mut state = self.state.lock().unwrap();
        let task = state
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::not_found(format!("task {id}")))?;
        if task.is_running {
            return Err(Error::validation(format!("Task {id} is already running")));
        }
        task.is_running = true;
        Ok(task.clone())
    }

    async fn execute(&self, task: ScheduledTask) {
        info!(task = %task.name, kind = ?task.kind, "Executing scheduled task");
        self.events.publish(Event::ScheduledTaskStarted {
            id: task.id,
            name: task.name.clone(),
        });

        let runner = self.runners.lock().unwrap().get(&task.kind).cloned();
        let (ok, status) = match runner {
            Some(runner) => match runner.run(&task.target_name).await {
                Ok(status) => (true, status),
                Err(e) => (false, e.to_string()),
            },
            None => (
                false,
                format!("No runner registered for {:?}", task.kind),
            ),
        };

        {
            let mut state = self.state.lock().unwrap();
            if let Some(slot) = state.tasks.iter_mut().find(|t| t.id == task.id) {
                slot.record_run(ok, status.clone(), Utc::now());
            }
        }
        if let Err(e) = self.save() {
            warn!(error = %e, "Failed to persist scheduler state");
        }

        self.events.publish(Event::ScheduledTaskCompleted {
            id: task.id,
            name: task.name.clone(),
            ok,
            status,
        });
    }

    fn save(&self) -> Result<()> {
        let file = {
            let state = self.state.lock().unwrap();
            SchedulerFile {
                next_task_id: state.next_task_id,
                check_interval: state.check_interval_secs,
                tasks: state.tasks.clone(),
            }
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::io("creating config directory", &e))?;
        }
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::internal(format!("serializing scheduler state: {e}")))?;
        std::fs::write(&self.path, json).map_err(|e| Error::io("writing scheduler state", &e))
    }
}
