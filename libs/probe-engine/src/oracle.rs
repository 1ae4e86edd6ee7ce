use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use probe_api::{NamespaceName, TopicAdmin, TopicName};

use crate::ProbeError;

/// Что admin API говорит о topic'е.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Present,
    Absent,
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Presence::Present => f.write_str("present"),
            Presence::Absent => f.write_str("absent"),
        }
    }
}

/// Существование topic'а глазами admin API.
///
/// Без кэша: каждый вызов — новый запрос `list_topics`.
#[derive(Clone)]
pub struct TopicOracle {
    admin: Arc<dyn TopicAdmin>,
}

impl TopicOracle {
    pub fn new(admin: Arc<dyn TopicAdmin>) -> Self {
        Self { admin }
    }

    pub async fn list_topics(&self, namespace: &NamespaceName) -> Result<BTreeSet<String>, ProbeError> {
        let topics = self.admin.list_topics(namespace).await?;
        Ok(topics.into_iter().collect())
    }

    pub async fn topic_exists(&self, topic: &TopicName) -> Result<bool, ProbeError> {
        let topics = self.list_topics(topic.namespace()).await?;
        Ok(topics.contains(&topic.to_string()))
    }

    pub async fn presence(&self, topic: &TopicName) -> Result<Presence, ProbeError> {
        Ok(match self.topic_exists(topic).await? {
            true => Presence::Present,
            false => Presence::Absent,
        })
    }

    /// Проверка одного наблюдения; расхождение → `UnexpectedTopicState`.
    pub async fn expect(&self, topic: &TopicName, expected: Presence) -> Result<(), ProbeError> {
        let observed = self.presence(topic).await?;
        if observed != expected {
            return Err(ProbeError::UnexpectedTopicState {
                topic: topic.to_string(),
                expected,
                observed,
            });
        }
        tracing::debug!(topic = %topic, %observed, "topic presence confirmed");
        Ok(())
    }
}
