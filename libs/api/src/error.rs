/// Ошибка control-plane (admin endpoint).
///
/// Категория определяет, что вызывающий может сделать:
/// `Conflict` при создании fixture — это норма, `Unavailable` — fail fast.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdminError {
    /// Endpoint недоступен или вернул 5xx.
    #[error("admin endpoint unavailable: {0}")]
    Unavailable(String),

    /// Ресурс уже существует (HTTP 409).
    #[error("{0} already exists")]
    Conflict(String),

    /// Ресурс не найден (HTTP 404).
    #[error("{0} not found")]
    NotFound(String),

    /// Любой другой не-2xx ответ.
    #[error("admin rejected request (HTTP {status}): {reason}")]
    Rejected { status: u16, reason: String },

    /// 2xx, но тело не разбирается.
    #[error("bad admin response: {0}")]
    Decode(String),
}

/// Ошибка data-plane (producer / consumer / connection).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    #[error("connect {url}: {detail}")]
    Connect { url: String, detail: String },

    #[error("create producer for '{topic}': {detail}")]
    Producer { topic: String, detail: String },

    #[error("send to '{topic}': {detail}")]
    Send { topic: String, detail: String },

    #[error("subscribe '{subscription}' on '{topic}': {detail}")]
    Subscribe {
        topic: String,
        subscription: String,
        detail: String,
    },

    #[error("receive from '{topic}': {detail}")]
    Receive { topic: String, detail: String },

    #[error("close {what} on '{topic}': {detail}")]
    Close {
        what: &'static str,
        topic: String,
        detail: String,
    },
}

/// Ошибка разбора имени topic'а / namespace.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid name '{name}': {reason}")]
pub struct NameError {
    pub name: String,
    pub reason: &'static str,
}

impl NameError {
    pub(crate) fn new(name: &str, reason: &'static str) -> Self {
        Self {
            name: name.to_string(),
            reason,
        }
    }
}
