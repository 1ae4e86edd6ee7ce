use probe_api::{NamespaceName, TopicAdmin};
use probe_engine::TopicOracle;

use super::config::Effective;
use super::error::CliError;

pub async fn run(eff: &Effective) -> Result<(), CliError> {
    let admin = super::admin_client(eff)?;
    let namespace = eff.scenario.namespace_name()?;

    let topics = list(admin, &namespace).await?;
    if topics.is_empty() {
        tracing::info!(%namespace, "namespace has no topics");
    }
    for topic in topics {
        println!("{topic}");
    }
    Ok(())
}

/// Отсортированный список topic'ов namespace'а.
async fn list(admin: std::sync::Arc<dyn TopicAdmin>, namespace: &NamespaceName) -> Result<Vec<String>, CliError> {
    let topics = TopicOracle::new(admin).list_topics(namespace).await?;
    Ok(topics.into_iter().collect())
}
