use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::time::Instant;

use probe_api::{BusError, MessageId, ReceivedMessage, SubscriptionMode, TopicConsumer, TopicProducer};

use crate::{Inner, StoredMessage, TopicState};

// ═══════════════════════════════════════════════════════════════
//  MemoryProducer
// ═══════════════════════════════════════════════════════════════

pub(crate) struct MemoryProducer {
    inner: Arc<Inner>,
    topic: String,
    closed: bool,
}

impl MemoryProducer {
    pub(crate) fn new(inner: Arc<Inner>, topic: String) -> Self {
        Self {
            inner,
            topic,
            closed: false,
        }
    }

    fn send_err(&self, detail: &str) -> BusError {
        BusError::Send {
            topic: self.topic.clone(),
            detail: detail.to_string(),
        }
    }
}

impl TopicProducer for MemoryProducer {
    fn send(&mut self, payload: String) -> Pin<Box<dyn Future<Output = Result<MessageId, BusError>> + Send + '_>> {
        Box::pin(async move {
            if self.closed {
                return Err(self.send_err("producer is closed"));
            }
            let mut state = self.inner.state.write().await;
            let topic = state
                .topics
                .get_mut(&self.topic)
                .ok_or_else(|| self.send_err("topic was deleted"))?;

            let id = MessageId {
                ledger: topic.ledger,
                entry: topic.messages.len() as u64,
            };
            topic.messages.push(StoredMessage { id, payload });
            topic.last_active = Instant::now();
            drop(state);

            self.inner.notify.notify_waiters();
            Ok(id)
        })
    }

    fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<(), BusError>> + Send + '_>> {
        Box::pin(async move {
            if std::mem::replace(&mut self.closed, true) {
                return Ok(());
            }
            let mut state = self.inner.state.write().await;
            if let Some(topic) = state.topics.get_mut(&self.topic) {
                topic.producers = topic.producers.saturating_sub(1);
                topic.last_active = Instant::now();
            }
            Ok(())
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryConsumer
// ═══════════════════════════════════════════════════════════════

pub(crate) struct MemoryConsumer {
    inner: Arc<Inner>,
    topic: String,
    subscription: String,
    handle: u64,
    closed: bool,
}

impl MemoryConsumer {
    pub(crate) fn new(inner: Arc<Inner>, topic: String, subscription: String, handle: u64) -> Self {
        Self {
            inner,
            topic,
            subscription,
            handle,
            closed: false,
        }
    }

    fn receive_err(&self, detail: &str) -> BusError {
        BusError::Receive {
            topic: self.topic.clone(),
            detail: detail.to_string(),
        }
    }

    /// Забрать следующее сообщение под cursor'ом, если оно есть.
    async fn try_take(&self) -> Result<Option<ReceivedMessage>, BusError> {
        let mut state = self.inner.state.write().await;
        let TopicState {
            messages,
            subscriptions,
            last_active,
            poisoned,
            ..
        } = state
            .topics
            .get_mut(&self.topic)
            .ok_or_else(|| self.receive_err("topic was deleted"))?;

        if *poisoned {
            return Ok(None);
        }
        let sub = subscriptions
            .get_mut(&self.subscription)
            .ok_or_else(|| self.receive_err("subscription was deleted"))?;

        let Some(msg) = messages.get(sub.cursor) else {
            return Ok(None);
        };
        sub.cursor += 1;
        *last_active = Instant::now();
        Ok(Some(ReceivedMessage {
            id: msg.id,
            topic: self.topic.clone(),
            payload: msg.payload.clone(),
        }))
    }
}

impl TopicConsumer for MemoryConsumer {
    fn receive(&mut self) -> Pin<Box<dyn Future<Output = Result<Option<ReceivedMessage>, BusError>> + Send + '_>> {
        Box::pin(async move {
            loop {
                if self.closed {
                    return Ok(None);
                }
                // Регистрируемся до проверки, иначе notify_waiters между
                // проверкой и await потеряется.
                let notified = self.inner.notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                if let Some(msg) = self.try_take().await? {
                    return Ok(Some(msg));
                }
                notified.await;
            }
        })
    }

    fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<(), BusError>> + Send + '_>> {
        Box::pin(async move {
            if std::mem::replace(&mut self.closed, true) {
                return Ok(());
            }
            let mut state = self.inner.state.write().await;
            let Some(topic) = state.topics.get_mut(&self.topic) else {
                return Ok(());
            };
            let drop_sub = match topic.subscriptions.get_mut(&self.subscription) {
                Some(sub) => {
                    sub.consumers.remove(&self.handle);
                    sub.mode == SubscriptionMode::NonDurable && sub.consumers.is_empty()
                }
                None => false,
            };
            if drop_sub {
                topic.subscriptions.remove(&self.subscription);
            }
            topic.last_active = Instant::now();
            Ok(())
        })
    }
}
