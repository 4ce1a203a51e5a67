//! Toast notifications.
//!
//! DESIGN
//! ======
//! A [`Notifier`] publishes [`ToastEvent`]s on a broadcast channel; the
//! console spawns one printer task that subscribes. Publishing never blocks
//! and never fails the caller: with no subscriber the toast is dropped.

use std::time::Duration;

use tokio::sync::broadcast;
use tracing::trace;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
    Plain,
}

impl NotificationKind {
    /// Display time when the caller does not override it. Errors stay longest.
    #[must_use]
    pub fn default_duration(self) -> Duration {
        let millis = match self {
            Self::Success | Self::Info | Self::Plain => 4000,
            Self::Error => 6000,
            Self::Warning => 5000,
        };
        Duration::from_millis(millis)
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Success => "ok",
            Self::Error => "erro",
            Self::Warning => "aviso",
            Self::Info => "info",
            Self::Plain => "-",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub kind: NotificationKind,
    pub message: String,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToastEvent {
    Show(Toast),
    Clear,
}

#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<ToastEvent>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ToastEvent> {
        self.tx.subscribe()
    }

    fn publish(&self, event: ToastEvent) {
        if self.tx.send(event).is_err() {
            trace!("toast dropped: no listeners");
        }
    }

    pub fn notify(&self, kind: NotificationKind, message: impl Into<String>) {
        self.publish(ToastEvent::Show(Toast { kind, message: message.into(), duration: kind.default_duration() }));
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notify(NotificationKind::Success, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(NotificationKind::Error, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.notify(NotificationKind::Warning, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.notify(NotificationKind::Info, message);
    }

    pub fn show(&self, message: impl Into<String>) {
        self.notify(NotificationKind::Plain, message);
    }

    /// Dismiss every visible toast.
    pub fn clear(&self) {
        self.publish(ToastEvent::Clear);
    }

    // =========================================================================
    // CANNED MESSAGES
    // =========================================================================

    pub fn success_save(&self, entity: &str) {
        self.success(format!("{entity} salvo com sucesso!"));
    }

    pub fn success_update(&self, entity: &str) {
        self.success(format!("{entity} atualizado com sucesso!"));
    }

    pub fn success_delete(&self, entity: &str) {
        self.success(format!("{entity} excluído com sucesso!"));
    }

    pub fn error_save(&self, entity: &str) {
        self.error(format!("Erro ao salvar {}. Tente novamente.", entity.to_lowercase()));
    }

    pub fn error_update(&self, entity: &str) {
        self.error(format!("Erro ao atualizar {}. Tente novamente.", entity.to_lowercase()));
    }

    pub fn error_delete(&self, entity: &str) {
        self.error(format!("Erro ao excluir {}. Tente novamente.", entity.to_lowercase()));
    }

    pub fn error_load(&self, entity: &str) {
        self.error(format!("Erro ao carregar {}. Verifique sua conexão.", entity.to_lowercase()));
    }

    pub fn error_validation(&self) {
        self.warning("Por favor, verifique os campos obrigatórios.");
    }

    pub fn error_auth(&self) {
        self.error("Erro de autenticação. Faça login novamente.");
    }

    pub fn info_loading(&self, message: Option<&str>) {
        self.info(message.unwrap_or("Processando..."));
    }
}

#[cfg(test)]
#[path = "notify_test.rs"]
mod tests;
