use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════
//  Messages
// ════════════════════════════════════════════════════════════════

/// Идентификатор сообщения в broker'е: (ledger, entry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId {
    pub ledger: u64,
    pub entry: u64,
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ledger, self.entry)
    }
}

/// Сообщение, полученное consumer'ом.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub id: MessageId,
    pub topic: String,
    pub payload: String,
}

// ════════════════════════════════════════════════════════════════
//  Subscription parameters
// ════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionType {
    /// Один consumer на подписку.
    Exclusive,
    /// Несколько consumer'ов делят один cursor.
    Shared,
}

impl fmt::Display for SubscriptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionType::Exclusive => f.write_str("exclusive"),
            SubscriptionType::Shared => f.write_str("shared"),
        }
    }
}

impl FromStr for SubscriptionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exclusive" => Ok(SubscriptionType::Exclusive),
            "shared" => Ok(SubscriptionType::Shared),
            other => Err(format!("unknown subscription type '{other}' (expected exclusive or shared)")),
        }
    }
}

/// С какой позиции новая подписка начинает читать.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InitialPosition {
    #[default]
    Earliest,
    Latest,
}

/// Durable подписка переживает отключение consumer'а.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionMode {
    #[default]
    Durable,
    NonDurable,
}

/// Полный набор параметров подписки для `MessageBus::subscribe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSpec {
    pub name: String,
    pub sub_type: SubscriptionType,
    pub initial_position: InitialPosition,
    pub mode: SubscriptionMode,
}

impl SubscriptionSpec {
    /// Durable подписка с чтением с самого начала.
    pub fn durable_earliest(name: impl Into<String>, sub_type: SubscriptionType) -> Self {
        Self {
            name: name.into(),
            sub_type,
            initial_position: InitialPosition::Earliest,
            mode: SubscriptionMode::Durable,
        }
    }
}
