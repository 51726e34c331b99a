//! Singer notification collaborator
//!
//! The queue core tells singers about position changes ("you're up", "you're
//! on deck") through this seam. Delivery transport (push service, email) is
//! external; the contract is fire-and-forget: a notification may fail
//! silently (no registered endpoint, transport blip) and queue operations
//! never block on it or observe its outcome.

use async_trait::async_trait;
use tracing::info;

/// Fire-and-forget notification sink
///
/// Implementations must swallow their own failures; callers have no
/// result to observe.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification to one user
    ///
    /// `url` is the link a click should open; `tag` lets the transport
    /// collapse successive notifications of the same kind.
    async fn notify(&self, user_id: &str, title: &str, body: &str, url: &str, tag: &str);
}

/// Default notifier: logs the notification instead of delivering it
///
/// Stands in wherever no delivery transport is wired up, keeping the
/// notification call sites exercised in every deployment.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, user_id: &str, title: &str, body: &str, url: &str, tag: &str) {
        info!(user_id, title, body, url, tag, "notification (log only)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_does_not_panic() {
        let notifier = LogNotifier;
        notifier
            .notify("singer-1", "You're up!", "Grab the mic", "/queue", "queue-turn")
            .await;
    }
}
