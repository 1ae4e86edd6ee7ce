use probe_engine::ensure_fixture;

use super::config::Effective;
use super::error::CliError;

pub async fn run(eff: &Effective) -> Result<(), CliError> {
    let admin = super::admin_client(eff)?;
    let namespace = eff.scenario.namespace_name()?;

    let outcome = ensure_fixture(admin.as_ref(), &namespace).await?;
    println!("tenant {}: {}", namespace.tenant(), created_or_existing(outcome.tenant_created));
    println!("namespace {namespace}: {}", created_or_existing(outcome.namespace_created));
    Ok(())
}

fn created_or_existing(created: bool) -> &'static str {
    if created { "created" } else { "already exists" }
}
