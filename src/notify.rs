//! 运行结束/暂停通知
//!
//! WebhookNotifier 以 UTF-8 正文 POST 到目标地址，在 tokio 任务中发送，不阻塞控制循环；
//! 失败只记录日志。

use std::time::Duration;

use tokio::runtime::Handle;

pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// 未配置通知目标时使用
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, message: &str) {
        tracing::debug!(message = %message, "notification dropped (no target)");
    }
}

pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    handle: Option<Handle>,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            handle: Handle::try_current().ok(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, message: &str) {
        let Some(handle) = self.handle.as_ref() else {
            tracing::warn!(url = %self.url, "no async runtime, notification skipped");
            return;
        };
        let client = self.client.clone();
        let url = self.url.clone();
        let body = message.as_bytes().to_vec();
        handle.spawn(async move {
            match client.post(&url).body(body).send().await {
                Ok(resp) if resp.status().is_success() => {
                    tracing::info!(url = %url, "notification delivered");
                }
                Ok(resp) => {
                    tracing::warn!(url = %url, status = %resp.status(), "notification rejected");
                }
                Err(e) => tracing::warn!(url = %url, error = %e, "notification failed"),
            }
        });
    }
}

/// 有目标时构造 WebhookNotifier，否则 NullNotifier
pub fn from_target(target: Option<&str>, timeout_secs: u64) -> Box<dyn Notifier> {
    match target.map(str::trim).filter(|t| !t.is_empty()) {
        Some(url) => match WebhookNotifier::new(url, timeout_secs) {
            Ok(notifier) => Box::new(notifier),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "webhook client unavailable, notifications disabled");
                Box::new(NullNotifier)
            }
        },
        None => Box::new(NullNotifier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_target_is_null() {
        let notifier = from_target(Some("  "), 5);
        notifier.notify("Plot completed");
        let notifier = from_target(None, 5);
        notifier.notify("Plot completed");
    }

    #[tokio::test]
    async fn test_webhook_failure_is_swallowed() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/unreachable", 1).unwrap();
        assert_eq!(notifier.url(), "http://127.0.0.1:9/unreachable");
        notifier.notify("Plot paused: change pen");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
