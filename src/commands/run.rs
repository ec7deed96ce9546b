use super::{workbook, Out};
use crate::api::Mode;
use crate::notify::Notifier;
use crate::tasks::{Registry, Services, TaskOutcome};
use crate::{Config, Result};
use chrono::Local;

/// Runs the task named by `alias`. A failing task does not make this an error: the outcome says
/// whether the task succeeded.
pub async fn run(config: &Config, mode: Mode, alias: &str) -> Result<Out<TaskOutcome>> {
    let registry = Registry::new(config.tasks());
    let mut services = Services {
        workbook: workbook(config, mode).await?,
        notifier: Notifier::new(config),
        today: Local::now().date_naive(),
    };
    let outcome = registry.run(alias, &mut services).await;
    Ok(Out::new(outcome.message.clone(), outcome))
}
