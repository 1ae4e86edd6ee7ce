use probe_api::{NamespaceName, TopicAdmin};

use crate::ProbeError;

/// Что fixture setup сделал на самом деле.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixtureOutcome {
    pub tenant_created: bool,
    pub namespace_created: bool,
}

/// Идемпотентно создать tenant и namespace.
///
/// Tenant разрешается на всех кластерах, которые отдаёт admin API.
/// `FixtureConflict` (уже существует) считается успехом шага.
pub async fn ensure_fixture(admin: &dyn TopicAdmin, namespace: &NamespaceName) -> Result<FixtureOutcome, ProbeError> {
    let clusters = admin.clusters().await?;
    tracing::debug!(?clusters, "clusters");

    let tenant_created = tolerate_conflict(
        admin
            .create_tenant(namespace.tenant(), &clusters)
            .await
            .map_err(ProbeError::from),
    )?;
    let namespace_created = tolerate_conflict(admin.create_namespace(namespace).await.map_err(ProbeError::from))?;

    tracing::info!(%namespace, tenant_created, namespace_created, "fixture ready");
    Ok(FixtureOutcome {
        tenant_created,
        namespace_created,
    })
}

/// Ok(true) — создано, Ok(false) — уже было.
fn tolerate_conflict(result: Result<(), ProbeError>) -> Result<bool, ProbeError> {
    match result {
        Ok(()) => Ok(true),
        Err(ProbeError::FixtureConflict(what)) => {
            tracing::debug!(%what, "already exists");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
