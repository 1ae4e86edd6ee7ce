mod config;
mod driver;
mod error;
mod fixture;
mod oracle;
mod scenario;
mod waiter;

pub use config::{ScenarioConfig, VariantConfig};
pub use driver::{Exchange, ExchangeDriver};
pub use error::ProbeError;
pub use fixture::{FixtureOutcome, ensure_fixture};
pub use oracle::{Presence, TopicOracle};
pub use scenario::{Scenario, ScenarioFailure, ScenarioReport, ScenarioState, Transition};
pub use waiter::Waiter;
