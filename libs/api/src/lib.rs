pub mod error;
pub mod message;
pub mod name;
pub mod topic;

pub use error::{AdminError, BusError, NameError};
pub use message::{
    InitialPosition, MessageId, ReceivedMessage, SubscriptionMode, SubscriptionSpec,
    SubscriptionType,
};
pub use name::{NamespaceName, TopicDomain, TopicName};
pub use topic::{MessageBus, TopicAdmin, TopicConsumer, TopicProducer};
