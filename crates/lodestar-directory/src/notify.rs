//! Change notification seam.

use async_trait::async_trait;

/// Collaborator signalled after every successful create, update, or
/// delete. Delivery mechanics (websockets, polling) live behind this
/// trait; the services only fire the hook.
#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    /// Signals every connected client that the directory changed.
    async fn notify_all_clients(&self);
}

/// Notifier that drops every signal, for tests and embedded use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl ChangeNotifier for NoopNotifier {
    async fn notify_all_clients(&self) {}
}
