//! Pool announcements posted to the Discord webhook.

use crate::api::{Embed, Webhook, WebhookMessage, BLUE, GREEN, RED};
use crate::ledger::{Summary, Workbook};
use crate::model::{Payee, Status};
use crate::{Config, Result};
use tracing::info;

/// Builds pool announcements from the current worksheet and posts them.
#[derive(Debug, Clone)]
pub struct Notifier {
    webhook: Webhook,
    mention: String,
    pool: String,
    thumbnail: String,
}

impl Notifier {
    pub fn new(config: &Config) -> Self {
        Self::with_webhook(Webhook::new(&config.discord().webhook), config)
    }

    pub fn with_webhook(webhook: Webhook, config: &Config) -> Self {
        Self {
            webhook,
            mention: config.discord().mention(),
            pool: config.paypal().pool.clone(),
            thumbnail: config.paypal().thumbnail.clone(),
        }
    }

    /// Announces that the pool for the current month is open.
    pub async fn pool_open(&self, workbook: &mut Workbook) -> Result<()> {
        let summary = current_summary(workbook).await?;
        self.webhook.post(&self.open_message(&summary)).await?;
        info!("Posted the pool open announcement");
        Ok(())
    }

    /// Reminds payees to pay, unless everyone has. Returns whether a reminder was posted.
    pub async fn pool_reminder(&self, workbook: &mut Workbook) -> Result<bool> {
        let summary = current_summary(workbook).await?;
        if summary.fully_paid {
            info!("Everyone has paid, skipping the reminder");
            return Ok(false);
        }
        self.webhook.post(&self.reminder_message(&summary)).await?;
        info!("Posted the pool reminder");
        Ok(true)
    }

    /// Announces that the pool has closed, listing anyone who has not paid.
    pub async fn pool_closed(&self, workbook: &mut Workbook) -> Result<()> {
        let ws = workbook.current().await?;
        let summary = workbook.summary(&ws.title).await?;
        let payees = workbook.payees(&ws.title).await?;
        self.webhook
            .post(&self.closed_message(&summary, &payees))
            .await?;
        info!("Posted the pool closed announcement");
        Ok(())
    }

    fn message(&self, embed: Embed) -> WebhookMessage {
        WebhookMessage {
            content: self.mention.clone(),
            embeds: vec![embed.url(&self.pool).thumbnail(&self.thumbnail)],
        }
    }

    fn open_message(&self, summary: &Summary) -> WebhookMessage {
        self.message(
            Embed::new(
                "The payment pool is open",
                format!(
                    "This month's server costs are in. Please pay {} into the pool by {}.",
                    summary.cost, summary.payment_date
                ),
                BLUE,
            )
            .field("Cost per payee", &summary.cost, true)
            .field("Payment date", &summary.payment_date, true),
        )
    }

    fn reminder_message(&self, summary: &Summary) -> WebhookMessage {
        self.message(
            Embed::new(
                "Payment reminder",
                format!(
                    "The pool is still open. If you have not paid yet, please pay {} by {}.",
                    summary.cost, summary.payment_date
                ),
                BLUE,
            )
            .field("Cost per payee", &summary.cost, true)
            .field("Payment date", &summary.payment_date, true),
        )
    }

    fn closed_message(&self, summary: &Summary, payees: &[Payee]) -> WebhookMessage {
        let awaiting: Vec<&str> = payees
            .iter()
            .filter(|p| p.status == Status::Awaiting)
            .map(|p| p.name.as_str())
            .collect();
        let embed = if summary.fully_paid || awaiting.is_empty() {
            Embed::new(
                "The payment pool is closed",
                "Everyone has paid this month, thank you!",
                GREEN,
            )
        } else {
            Embed::new(
                "The payment pool is closed",
                "The pool has closed but not everyone has paid. Please pay as soon as you can.",
                RED,
            )
            .field("Awaiting payment", awaiting.join("\n"), false)
        };
        self.message(embed)
    }
}

async fn current_summary(workbook: &mut Workbook) -> Result<Summary> {
    let ws = workbook.current().await?;
    workbook.summary(&ws.title).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TestLedger;
    use crate::test::TestEnv;
    use mockito::Matcher;
    use serde_json::json;

    fn summary(fully_paid: bool) -> Summary {
        Summary {
            cost: "£3.00".to_string(),
            payment_date: "05/10/2026".to_string(),
            fully_paid,
            payee_count: 3,
        }
    }

    #[tokio::test]
    async fn test_open_message() {
        let env = TestEnv::new().await;
        let notifier = Notifier::new(&env.config());
        let message = notifier.open_message(&summary(false));
        assert_eq!("<@&811001122334455669>", message.content);
        let embed = &message.embeds[0];
        assert_eq!(Some("https://paypal.me/pools/c/halogen"), embed.url.as_deref());
        assert_eq!(
            "https://example.com/pp.png",
            embed.thumbnail.as_ref().unwrap().url
        );
        assert!(embed.description.contains("£3.00"));
        assert!(embed.description.contains("05/10/2026"));
    }

    #[tokio::test]
    async fn test_closed_message_lists_awaiting() {
        let env = TestEnv::new().await;
        let notifier = Notifier::new(&env.config());
        let mut workbook = env.workbook();
        let payees = workbook.payees("October").await.unwrap();

        let message = notifier.closed_message(&summary(false), &payees);
        let embed = &message.embeds[0];
        assert_eq!(RED, embed.color);
        assert_eq!("Charlie", embed.fields[0].value);

        let message = notifier.closed_message(&summary(true), &payees);
        assert_eq!(GREEN, message.embeds[0].color);
        assert!(message.embeds[0].fields.is_empty());
    }

    #[tokio::test]
    async fn test_pool_reminder() {
        let env = TestEnv::new().await;
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_body(Matcher::PartialJson(json!({
                "embeds": [{ "title": "Payment reminder" }]
            })))
            .with_status(204)
            .expect(1)
            .create_async()
            .await;
        let notifier = Notifier::with_webhook(
            Webhook::new(format!("{}/hook", server.url())),
            &env.config(),
        );

        // October is not fully paid
        let mut workbook = env.workbook();
        assert!(notifier.pool_reminder(&mut workbook).await.unwrap());

        // September is, so once it is the only worksheet no reminder is sent
        let september = TestLedger::default()
            .snapshot()
            .cells("September")
            .unwrap()
            .to_vec();
        env.set_state(TestLedger::new(vec![("September".to_string(), september)]).snapshot());
        let mut workbook = env.workbook();
        assert!(!notifier.pool_reminder(&mut workbook).await.unwrap());

        mock.assert_async().await;
    }
}
