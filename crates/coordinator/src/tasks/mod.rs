//! Task plugins
//!
//! A task is started and stopped by matched trigger points (`start_task` /
//! `stop_task`). Plugins are registered explicitly by id in a `TaskRegistry`;
//! the `TaskSet` holds the instances a run actually uses.

mod heartbeat;

use std::collections::{BTreeMap, HashMap};

use contracts::{BootBlueprint, ContractError, TaskConfig};
use tracing::{debug, info, warn};

use crate::handle::CoreHandle;

pub use heartbeat::{HeartbeatTask, HEARTBEAT_TASK};

/// Task plugin contract
///
/// All calls happen on the coordinator task, one at a time.
pub trait TaskPlugin: Send {
    /// Called once before the run starts
    fn init(&mut self, core: CoreHandle, task_id: &str) -> Result<(), ContractError>;

    /// `point` matched and names this task in `start_task`
    fn start(&mut self, point: &str, config: &TaskConfig);

    /// `point` matched and names this task in `stop_task`
    fn stop(&mut self, point: &str, config: &TaskConfig);

    /// A timer scheduled through the `CoreHandle` fired
    fn on_timer(&mut self, _timer_id: u64) {}

    /// Run is over; release everything
    fn finish(&mut self) {}
}

pub type TaskFactory = Box<dyn Fn() -> Box<dyn TaskPlugin> + Send + Sync>;

/// Task id → factory
#[derive(Default)]
pub struct TaskRegistry {
    factories: HashMap<String, TaskFactory>,
}

impl TaskRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in tasks (`heartbeat`)
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(HEARTBEAT_TASK, || Box::new(HeartbeatTask::new()));
        registry
    }

    pub fn register<F>(&mut self, id: &str, factory: F)
    where
        F: Fn() -> Box<dyn TaskPlugin> + Send + Sync + 'static,
    {
        self.factories.insert(id.to_string(), Box::new(factory));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    pub fn create(&self, id: &str) -> Option<Box<dyn TaskPlugin>> {
        self.factories.get(id).map(|factory| factory())
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}

struct TaskEntry {
    plugin: Box<dyn TaskPlugin>,
    config: TaskConfig,
    running: bool,
}

/// The task instances of one run
#[derive(Default)]
pub struct TaskSet {
    tasks: BTreeMap<String, TaskEntry>,
}

impl TaskSet {
    /// Every task referenced by the blueprint, created and initialized
    ///
    /// # Errors
    /// `UnknownTask` when a `[[tasks]]` entry or a trigger's `start_task` /
    /// `stop_task` names an id the registry does not know.
    pub fn build<F>(
        blueprint: &BootBlueprint,
        registry: &TaskRegistry,
        mut core_for: F,
    ) -> Result<Self, ContractError>
    where
        F: FnMut(&str) -> CoreHandle,
    {
        let mut referenced: Vec<(String, String)> = blueprint
            .tasks
            .iter()
            .map(|t| (t.id.clone(), "tasks".to_string()))
            .collect();
        for trigger in &blueprint.triggers {
            for task in [&trigger.start_task, &trigger.stop_task].into_iter().flatten() {
                referenced.push((task.clone(), format!("trigger '{}'", trigger.id)));
            }
        }

        let mut set = Self::default();
        for (task_id, referenced_by) in referenced {
            if set.tasks.contains_key(&task_id) {
                continue;
            }
            let mut plugin = registry
                .create(&task_id)
                .ok_or_else(|| ContractError::unknown_task(&task_id, &referenced_by))?;
            let config = blueprint.task(&task_id).cloned().unwrap_or_else(|| TaskConfig {
                id: task_id.clone(),
                ..TaskConfig::default()
            });
            plugin.init(core_for(&task_id), &task_id)?;
            debug!(task = %task_id, "task initialized");
            set.tasks.insert(
                task_id,
                TaskEntry {
                    plugin,
                    config,
                    running: false,
                },
            );
        }
        Ok(set)
    }

    /// Start `task` unless it is already running
    pub fn start(&mut self, task: &str, point: &str) -> bool {
        let Some(entry) = self.tasks.get_mut(task) else {
            warn!(task, "start requested for unknown task");
            return false;
        };
        if entry.running {
            debug!(task, point, "task already running");
            return false;
        }
        info!(task = %entry.config.display_name(), point, "starting task");
        entry.plugin.start(point, &entry.config);
        entry.running = true;
        true
    }

    /// Stop `task` if it is running
    pub fn stop(&mut self, task: &str, point: &str) -> bool {
        let Some(entry) = self.tasks.get_mut(task) else {
            warn!(task, "stop requested for unknown task");
            return false;
        };
        if !entry.running {
            debug!(task, point, "task not running");
            return false;
        }
        info!(task = %entry.config.display_name(), point, "stopping task");
        entry.plugin.stop(point, &entry.config);
        entry.running = false;
        true
    }

    pub fn on_timer(&mut self, task: &str, timer_id: u64) {
        match self.tasks.get_mut(task) {
            Some(entry) => entry.plugin.on_timer(timer_id),
            None => debug!(task, timer_id, "timer for unknown task"),
        }
    }

    /// `finish()` every task, running or not
    pub fn finish_all(&mut self) {
        for (id, entry) in self.tasks.iter_mut() {
            debug!(task = %id, "finishing task");
            entry.plugin.finish();
            entry.running = false;
        }
    }

    pub fn is_running(&self, task: &str) -> bool {
        self.tasks.get(task).is_some_and(|e| e.running)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
