//! Scheduled tasks and the runner that resolves task aliases.
//!
//! Every task has a canonical name, which is always an alias of itself. The `tasks` list in the
//! config file adds more aliases: the first entry of each list names the task and the rest are
//! aliases for it.

use crate::ledger::Workbook;
use crate::notify::Notifier;
use crate::Result;
use anyhow::Context;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use tracing::{debug, error, info, warn};

/// What tasks act on.
pub struct Services {
    pub workbook: Workbook,
    pub notifier: Notifier,
    /// The date the task runs on, in local time.
    pub today: NaiveDate,
}

/// A unit of scheduled work.
#[async_trait::async_trait]
pub trait Task: Send + Sync {
    /// The canonical name.
    fn name(&self) -> &'static str;

    async fn run(&self, services: &mut Services) -> Result<()>;
}

struct RotateMonth;

#[async_trait::async_trait]
impl Task for RotateMonth {
    fn name(&self) -> &'static str {
        "rotate_month"
    }

    async fn run(&self, services: &mut Services) -> Result<()> {
        if let Some(rotation) = services.workbook.rotate_month(services.today).await? {
            debug!("{rotation:?}");
        }
        Ok(())
    }
}

struct ResetStatus;

#[async_trait::async_trait]
impl Task for ResetStatus {
    fn name(&self) -> &'static str {
        "reset_status"
    }

    async fn run(&self, services: &mut Services) -> Result<()> {
        let ws = services.workbook.current().await?;
        let count = services.workbook.reset_status(&ws.title).await?;
        info!("Reset {count} statuses in {}", ws.title);
        Ok(())
    }
}

struct PoolOpen;

#[async_trait::async_trait]
impl Task for PoolOpen {
    fn name(&self) -> &'static str {
        "pool_open"
    }

    async fn run(&self, services: &mut Services) -> Result<()> {
        services.notifier.pool_open(&mut services.workbook).await
    }
}

struct PoolReminder;

#[async_trait::async_trait]
impl Task for PoolReminder {
    fn name(&self) -> &'static str {
        "pool_reminder"
    }

    async fn run(&self, services: &mut Services) -> Result<()> {
        services
            .notifier
            .pool_reminder(&mut services.workbook)
            .await
            .map(|_| ())
    }
}

struct PoolClosed;

#[async_trait::async_trait]
impl Task for PoolClosed {
    fn name(&self) -> &'static str {
        "pool_closed"
    }

    async fn run(&self, services: &mut Services) -> Result<()> {
        services.notifier.pool_closed(&mut services.workbook).await
    }
}

/// Maps aliases to tasks.
pub struct Registry {
    tasks: HashMap<&'static str, Box<dyn Task>>,
    aliases: HashMap<String, &'static str>,
}

impl Registry {
    /// A registry of the built-in tasks, with the aliases from the config file's `tasks` list.
    pub fn new(alias_lists: &[Vec<String>]) -> Self {
        let builtins: Vec<Box<dyn Task>> = vec![
            Box::new(RotateMonth),
            Box::new(ResetStatus),
            Box::new(PoolOpen),
            Box::new(PoolReminder),
            Box::new(PoolClosed),
        ];
        let mut registry = Self {
            tasks: HashMap::new(),
            aliases: HashMap::new(),
        };
        for task in builtins {
            registry.aliases.insert(task.name().to_string(), task.name());
            registry.tasks.insert(task.name(), task);
        }

        for aliases in alias_lists {
            let Some(canonical) = aliases.first() else {
                continue;
            };
            let Some(name) = registry.tasks.get(canonical.trim()).map(|t| t.name()) else {
                warn!("Ignoring aliases for '{canonical}', there is no task by that name");
                continue;
            };
            for alias in &aliases[1..] {
                registry.aliases.insert(alias.trim().to_string(), name);
            }
        }
        registry
    }

    /// The task that `alias` names.
    pub fn resolve(&self, alias: &str) -> Result<&dyn Task> {
        self.aliases
            .get(alias.trim())
            .and_then(|name| self.tasks.get(name))
            .map(|task| task.as_ref())
            .ok_or_else(|| crate::error::not_found(format!("There is no task named '{alias}'")))
    }

    /// The canonical task names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.tasks.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Resolves `alias` and runs the task. Failures are logged and reported in the outcome.
    pub async fn run(&self, alias: &str, services: &mut Services) -> TaskOutcome {
        let task = match self.resolve(alias) {
            Ok(task) => task,
            Err(e) => {
                warn!("{e}");
                return TaskOutcome::not_found(alias);
            }
        };
        info!("Running task {}", task.name());
        match task
            .run(services)
            .await
            .with_context(|| format!("Task {} failed", task.name()))
        {
            Ok(()) => TaskOutcome::completed(task.name()),
            Err(e) => {
                error!("{e:#}");
                TaskOutcome::failed(task.name())
            }
        }
    }
}

/// The message and success flag reported after running a task.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct TaskOutcome {
    pub message: String,
    pub success: bool,
}

impl TaskOutcome {
    fn completed(name: &str) -> Self {
        Self {
            message: format!("Task `{name}` completed successfully!"),
            success: true,
        }
    }

    fn failed(name: &str) -> Self {
        Self {
            message: format!("Task `{name}` failed!"),
            success: false,
        }
    }

    fn not_found(alias: &str) -> Self {
        Self {
            message: format!("Task `{alias}` could not be found!"),
            success: false,
        }
    }
}

impl Display for TaskOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Webhook;
    use crate::error::{error_type, ErrorType};
    use crate::model::CellRef;
    use crate::test::TestEnv;

    fn aliases() -> Vec<Vec<String>> {
        [
            vec!["rotate_month", "update", "rotate"],
            vec!["pool_open", "open"],
            vec!["make_tea", "tea"],
        ]
        .iter()
        .map(|list| list.iter().map(|s| s.to_string()).collect())
        .collect()
    }

    fn services(env: &TestEnv, today: NaiveDate) -> Services {
        Services {
            workbook: env.workbook(),
            // Nothing listens here, so notifying tasks fail
            notifier: Notifier::with_webhook(
                Webhook::new("http://127.0.0.1:9/hook"),
                &env.config(),
            ),
            today,
        }
    }

    #[test]
    fn test_resolve_aliases() {
        let registry = Registry::new(&aliases());
        assert_eq!("rotate_month", registry.resolve("update").unwrap().name());
        assert_eq!("rotate_month", registry.resolve("rotate_month").unwrap().name());
        assert_eq!("pool_open", registry.resolve("open").unwrap().name());
        assert_eq!("pool_closed", registry.resolve("pool_closed").unwrap().name());

        let e = registry.resolve("tea").err().unwrap();
        assert_eq!(Some(ErrorType::NotFound), error_type(&e));
        assert_eq!(5, registry.names().len());
    }

    #[tokio::test]
    async fn test_run_outcomes() {
        let env = TestEnv::new().await;
        let registry = Registry::new(&aliases());
        let today = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();

        let outcome = registry.run("update", &mut services(&env, today)).await;
        assert_eq!(
            TaskOutcome {
                message: "Task `rotate_month` completed successfully!".to_string(),
                success: true,
            },
            outcome
        );
        assert_eq!(vec!["November", "October"], env.get_state().titles());

        let outcome = registry.run("open", &mut services(&env, today)).await;
        assert_eq!("Task `pool_open` failed!", outcome.message);
        assert!(!outcome.success);

        let outcome = registry.run("dance", &mut services(&env, today)).await;
        assert_eq!("Task `dance` could not be found!", outcome.to_string());
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn test_reset_status_task() {
        let env = TestEnv::new().await;
        let registry = Registry::new(&[]);
        let today = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();

        let outcome = registry.run("reset_status", &mut services(&env, today)).await;
        assert!(outcome.success);
        let state = env.get_state();
        assert_eq!(Some("Awaiting"), state.cell("October", CellRef::new(6, 3)));
        assert_eq!(Some("Paid"), state.cell("September", CellRef::new(6, 3)));
    }
}
