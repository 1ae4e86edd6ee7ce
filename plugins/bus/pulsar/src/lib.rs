use std::future::Future;
use std::pin::Pin;

use futures::TryStreamExt;
use pulsar::consumer::{ConsumerOptions, InitialPosition as PulsarPosition};
use pulsar::proto::MessageIdData;
use pulsar::{Consumer, Producer, Pulsar, SubType, TokioExecutor};

use probe_api::{
    BusError, InitialPosition, MessageBus, MessageId, ReceivedMessage, SubscriptionMode, SubscriptionSpec,
    SubscriptionType, TopicConsumer, TopicName, TopicProducer,
};

// ═══════════════════════════════════════════════════════════════
//  PulsarBus
// ═══════════════════════════════════════════════════════════════

/// Data-plane клиент поверх `pulsar` crate (tokio executor).
///
/// Одно соединение на процесс; producer'ы и consumer'ы создаются
/// на каждую операцию и закрываются вызывающим.
pub struct PulsarBus {
    client: Pulsar<TokioExecutor>,
    service_url: String,
}

impl PulsarBus {
    pub async fn connect(service_url: &str) -> Result<Self, BusError> {
        let client = Pulsar::builder(service_url, TokioExecutor)
            .build()
            .await
            .map_err(|e| BusError::Connect {
                url: service_url.to_string(),
                detail: e.to_string(),
            })?;
        tracing::info!(url = %service_url, "connected to data plane");
        Ok(Self {
            client,
            service_url: service_url.to_string(),
        })
    }

    pub fn service_url(&self) -> &str {
        &self.service_url
    }
}

fn sub_type(t: SubscriptionType) -> SubType {
    match t {
        SubscriptionType::Exclusive => SubType::Exclusive,
        SubscriptionType::Shared => SubType::Shared,
    }
}

fn initial_position(p: InitialPosition) -> PulsarPosition {
    match p {
        InitialPosition::Earliest => PulsarPosition::Earliest,
        InitialPosition::Latest => PulsarPosition::Latest,
    }
}

impl MessageBus for PulsarBus {
    fn create_producer<'a>(
        &'a self,
        topic: &'a TopicName,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn TopicProducer>, BusError>> + Send + 'a>> {
        Box::pin(async move {
            let topic = topic.to_string();
            let inner = self
                .client
                .producer()
                .with_topic(&topic)
                .build()
                .await
                .map_err(|e| BusError::Producer {
                    topic: topic.clone(),
                    detail: e.to_string(),
                })?;
            Ok(Box::new(PulsarProducer { topic, inner }) as Box<dyn TopicProducer>)
        })
    }

    fn subscribe<'a>(
        &'a self,
        topic: &'a TopicName,
        spec: &'a SubscriptionSpec,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn TopicConsumer>, BusError>> + Send + 'a>> {
        Box::pin(async move {
            let topic = topic.to_string();
            let options = ConsumerOptions::default()
                .with_initial_position(initial_position(spec.initial_position))
                .durable(spec.mode == SubscriptionMode::Durable);

            let inner: Consumer<Vec<u8>, TokioExecutor> = self
                .client
                .consumer()
                .with_topic(&topic)
                .with_subscription_type(sub_type(spec.sub_type))
                .with_subscription(&spec.name)
                .with_options(options)
                .build()
                .await
                .map_err(|e| BusError::Subscribe {
                    topic: topic.clone(),
                    subscription: spec.name.clone(),
                    detail: e.to_string(),
                })?;
            tracing::debug!(topic = %topic, subscription = %spec.name, sub_type = %spec.sub_type, "subscribed");
            Ok(Box::new(PulsarConsumer { topic, inner }) as Box<dyn TopicConsumer>)
        })
    }
}

/// Receipt без message id не подтверждает запись.
fn receipt_id(topic: &str, id: Option<MessageIdData>) -> Result<MessageId, BusError> {
    let id = id.ok_or_else(|| BusError::Send {
        topic: topic.to_string(),
        detail: "broker receipt carries no message id".into(),
    })?;
    Ok(MessageId {
        ledger: id.ledger_id,
        entry: id.entry_id,
    })
}

// ═══════════════════════════════════════════════════════════════
//  Handles
// ═══════════════════════════════════════════════════════════════

struct PulsarProducer {
    topic: String,
    inner: Producer<TokioExecutor>,
}

impl TopicProducer for PulsarProducer {
    fn send(&mut self, payload: String) -> Pin<Box<dyn Future<Output = Result<MessageId, BusError>> + Send + '_>> {
        Box::pin(async move {
            let err = |e: pulsar::Error| BusError::Send {
                topic: self.topic.clone(),
                detail: e.to_string(),
            };
            let message = pulsar::producer::Message {
                payload: payload.into_bytes(),
                ..Default::default()
            };
            // Первый await — постановка в очередь, второй — receipt от broker'а.
            let receipt = self.inner.send_non_blocking(message).await.map_err(err)?.await.map_err(err)?;
            receipt_id(&self.topic, receipt.message_id)
        })
    }

    fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<(), BusError>> + Send + '_>> {
        Box::pin(async move {
            self.inner.close().await.map_err(|e| BusError::Close {
                what: "producer",
                topic: self.topic.clone(),
                detail: e.to_string(),
            })
        })
    }
}

struct PulsarConsumer {
    topic: String,
    inner: Consumer<Vec<u8>, TokioExecutor>,
}

impl TopicConsumer for PulsarConsumer {
    fn receive(&mut self) -> Pin<Box<dyn Future<Output = Result<Option<ReceivedMessage>, BusError>> + Send + '_>> {
        Box::pin(async move {
            let msg = self.inner.try_next().await.map_err(|e| BusError::Receive {
                topic: self.topic.clone(),
                detail: e.to_string(),
            })?;
            Ok(msg.map(|msg| {
                let id = msg.message_id();
                ReceivedMessage {
                    id: MessageId {
                        ledger: id.ledger_id,
                        entry: id.entry_id,
                    },
                    topic: msg.topic.clone(),
                    payload: String::from_utf8_lossy(&msg.payload.data).into_owned(),
                }
            }))
        })
    }

    fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<(), BusError>> + Send + '_>> {
        Box::pin(async move {
            self.inner.close().await.map_err(|e| BusError::Close {
                what: "consumer",
                topic: self.topic.clone(),
                detail: e.to_string(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_subscription_parameters() {
        assert!(matches!(sub_type(SubscriptionType::Shared), SubType::Shared));
        assert!(matches!(sub_type(SubscriptionType::Exclusive), SubType::Exclusive));
        assert!(matches!(initial_position(InitialPosition::Earliest), PulsarPosition::Earliest));
        assert!(matches!(initial_position(InitialPosition::Latest), PulsarPosition::Latest));
    }

    #[test]
    fn receipt_with_id_maps_ledger_and_entry() {
        let id = MessageIdData {
            ledger_id: 7,
            entry_id: 3,
            ..Default::default()
        };
        assert_eq!(receipt_id("t", Some(id)), Ok(MessageId { ledger: 7, entry: 3 }));
    }

    #[test]
    fn receipt_without_id_is_send_error() {
        let err = receipt_id("persistent://localdev/test/x", None).unwrap_err();
        assert!(matches!(err, BusError::Send { ref topic, .. } if topic == "persistent://localdev/test/x"));
    }
}
