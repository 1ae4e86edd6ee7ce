pub mod config;
pub mod error;
pub mod run;
pub mod setup;
pub mod topics;

use std::sync::Arc;

use admin_http::HttpAdmin;
use probe_api::TopicAdmin;

use config::{Command, Effective};
use error::CliError;

pub async fn dispatch(command: &Command, eff: &Effective) -> Result<(), CliError> {
    match command {
        Command::Run => run::run(eff).await,
        Command::Setup => setup::run(eff).await,
        Command::Topics => topics::run(eff).await,
    }
}

fn admin_client(eff: &Effective) -> Result<Arc<dyn TopicAdmin>, CliError> {
    let admin = HttpAdmin::new(&eff.admin_url, eff.request_timeout)?;
    tracing::debug!(admin_url = %admin.base_url(), "admin client ready");
    Ok(Arc::new(admin))
}
