use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use probe_api::{
    BusError, MessageBus, MessageId, ReceivedMessage, SubscriptionSpec, TopicConsumer, TopicName, TopicProducer,
};

use crate::ProbeError;

/// Итог `produce_and_consume_one`: отправленный batch и первое полученное сообщение.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub sent: Vec<MessageId>,
    pub received: ReceivedMessage,
}

// ═══════════════════════════════════════════════════════════════
//  ExchangeDriver
// ═══════════════════════════════════════════════════════════════

/// Produce / consume через data-plane клиент.
///
/// Каждая операция открывает свой producer или consumer и закрывает его
/// на любом пути выхода. Async close нельзя сделать в `Drop`, поэтому
/// close вызывается явно после тела операции, независимо от результата.
#[derive(Clone)]
pub struct ExchangeDriver {
    bus: Arc<dyn MessageBus>,
    send_timeout: Duration,
    receive_timeout: Duration,
}

impl ExchangeDriver {
    pub fn new(bus: Arc<dyn MessageBus>, send_timeout: Duration, receive_timeout: Duration) -> Self {
        Self {
            bus,
            send_timeout,
            receive_timeout,
        }
    }

    /// Отправить `count` сообщений со случайными UUID payload'ами.
    ///
    /// Всё или ничего: любая ошибка send (или close) → `ProduceFailed`.
    /// Не идемпотентна — каждый вызов добавляет новые сообщения.
    pub async fn produce_batch(&self, topic: &TopicName, count: usize) -> Result<Vec<MessageId>, ProbeError> {
        let failed = |sent: usize, source: BusError| ProbeError::ProduceFailed {
            topic: topic.to_string(),
            sent,
            count,
            source,
        };

        let mut producer = self.bus.create_producer(topic).await.map_err(|e| failed(0, e))?;

        let mut ids = Vec::with_capacity(count);
        let sent = self.send_all(producer.as_mut(), topic, count, &mut ids).await;
        let closed = producer.close().await;

        match (sent, closed) {
            (Ok(()), Ok(())) => {
                tracing::info!(topic = %topic, count, "batch sent");
                Ok(ids)
            }
            (Ok(()), Err(e)) => Err(failed(ids.len(), e)),
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    tracing::warn!(topic = %topic, error = %close_err, "producer close failed after send error");
                }
                Err(failed(ids.len(), e))
            }
        }
    }

    async fn send_all(
        &self,
        producer: &mut dyn TopicProducer,
        topic: &TopicName,
        count: usize,
        ids: &mut Vec<MessageId>,
    ) -> Result<(), BusError> {
        for _ in 0..count {
            let payload = uuid::Uuid::new_v4().to_string();
            tracing::info!(topic = %topic, %payload, "sending message");
            let id = tokio::time::timeout(self.send_timeout, producer.send(payload))
                .await
                .map_err(|_| BusError::Send {
                    topic: topic.to_string(),
                    detail: format!("no receipt within {:?}", self.send_timeout),
                })??;
            ids.push(id);
        }
        Ok(())
    }

    /// Подписаться, затем отправить свежий batch и ждать одно сообщение
    /// не дольше `receive_timeout`.
    ///
    /// Подписка открывается до produce, так что при `Earliest` сообщение
    /// второго batch'а обязано прийти, если topic пригоден к работе.
    pub async fn produce_and_consume_one(
        &self,
        topic: &TopicName,
        subscription: &SubscriptionSpec,
        count: usize,
    ) -> Result<Exchange, ProbeError> {
        let mut consumer = self.bus.subscribe(topic, subscription).await?;
        tracing::info!(topic = %topic, subscription = %subscription.name, sub_type = %subscription.sub_type, "subscribed");

        let result = self.produce_then_receive(consumer.as_mut(), topic, count).await;
        release_consumer(consumer.as_mut(), topic).await;

        let exchange = result?;
        let msg = &exchange.received;
        tracing::info!(topic = %topic, id = %msg.id, payload = %msg.payload, "received message");
        Ok(exchange)
    }

    async fn produce_then_receive(
        &self,
        consumer: &mut dyn TopicConsumer,
        topic: &TopicName,
        count: usize,
    ) -> Result<Exchange, ProbeError> {
        let sent = self.produce_batch(topic, count).await?;

        let started = Instant::now();
        match tokio::time::timeout(self.receive_timeout, consumer.receive()).await {
            Ok(Ok(Some(received))) => Ok(Exchange { sent, received }),
            Ok(Ok(None)) => Err(ProbeError::NoMessageReceived {
                topic: topic.to_string(),
                waited: started.elapsed(),
            }),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(ProbeError::NoMessageReceived {
                topic: topic.to_string(),
                waited: self.receive_timeout,
            }),
        }
    }

    /// Вычитать подписку до тишины длиной `idle`.
    ///
    /// С `Earliest` на новой подписке даёт всё, что хранит topic.
    pub async fn drain(
        &self,
        topic: &TopicName,
        subscription: &SubscriptionSpec,
        idle: Duration,
    ) -> Result<Vec<ReceivedMessage>, ProbeError> {
        let mut consumer = self.bus.subscribe(topic, subscription).await?;

        let mut messages = Vec::new();
        let result = loop {
            match tokio::time::timeout(idle, consumer.receive()).await {
                Ok(Ok(Some(msg))) => messages.push(msg),
                Ok(Ok(None)) | Err(_) => break Ok(()),
                Ok(Err(e)) => break Err(e),
            }
        };
        release_consumer(consumer.as_mut(), topic).await;

        result?;
        tracing::debug!(topic = %topic, count = messages.len(), "drained");
        Ok(messages)
    }
}

/// Ошибка close consumer'а не меняет исход: сообщение уже получено (или нет).
async fn release_consumer(consumer: &mut dyn TopicConsumer, topic: &TopicName) {
    if let Err(e) = consumer.close().await {
        tracing::warn!(topic = %topic, error = %e, "consumer close failed");
    }
}
