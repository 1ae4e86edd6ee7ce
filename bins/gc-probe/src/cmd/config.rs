use std::path::Path;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use probe_api::SubscriptionType;
use probe_engine::{ScenarioConfig, VariantConfig};

use super::error::CliError;

const DEFAULT_ADMIN_URL: &str = "http://localhost:8080";
const DEFAULT_SERVICE_URL: &str = "pulsar://localhost:6650";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub admin_url: Option<String>,
    pub service_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub scenario: ScenarioConfig,
}

/// Отсутствующий файл = пустой конфиг. Битый файл = ошибка.
pub fn load_config(path: &str) -> Result<Config, CliError> {
    if !Path::new(path).exists() {
        tracing::debug!(path, "config file not found, using defaults");
        return Ok(Config::default());
    }
    let content =
        std::fs::read_to_string(path).map_err(|e| CliError::Config(format!("cannot read config {path}: {e}")))?;
    parse_config(&content).map_err(|e| CliError::Config(format!("bad config {path}: {e}")))
}

fn parse_config(content: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(content)
}

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Parser)]
#[command(name = "gc-probe", about = "Проверка: topic пригоден к работе после GC broker'а")]
pub struct Cli {
    #[command(flatten)]
    pub args: ProbeArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Fixture + все варианты сценария по очереди
    Run,
    /// Только создать tenant и namespace
    Setup,
    /// Список topic'ов namespace'а
    Topics,
}

#[derive(Args, Clone, Debug, Default)]
pub struct ProbeArgs {
    /// Путь к gc-probe.toml
    #[arg(long, global = true, default_value = "gc-probe.toml", env = "GC_PROBE_CONFIG")]
    pub config: String,

    /// Admin REST endpoint
    #[arg(long, global = true, env = "PULSAR_ADMIN_URL")]
    pub admin_url: Option<String>,

    /// Binary protocol endpoint
    #[arg(long, global = true, env = "PULSAR_SERVICE_URL")]
    pub service_url: Option<String>,

    #[arg(long, global = true)]
    pub tenant: Option<String>,

    #[arg(long, global = true)]
    pub namespace: Option<String>,

    /// Сколько ждать GC topic'а
    #[arg(long, global = true)]
    pub gc_timeout_secs: Option<u64>,

    #[arg(long, global = true)]
    pub poll_interval_ms: Option<u64>,

    #[arg(long, global = true)]
    pub receive_timeout_secs: Option<u64>,

    /// Сообщений в каждом batch'е
    #[arg(long, global = true)]
    pub batch_size: Option<usize>,

    /// Прогнать только этот вариант (exclusive | shared)
    #[arg(long, global = true)]
    pub subscription_type: Option<SubscriptionType>,

    /// Пауза после GC для всех выбранных вариантов
    #[arg(long, global = true)]
    pub settle_ms: Option<u64>,
}

// ═══════════════════════════════════════════════════════════════
//  Effective — merged config
// ═══════════════════════════════════════════════════════════════

/// Итоговая конфигурация после мержа: defaults < gc-probe.toml < env/CLI
#[derive(Debug)]
pub struct Effective {
    pub admin_url: String,
    pub service_url: String,
    pub request_timeout: Duration,
    pub scenario: ScenarioConfig,
}

impl Effective {
    pub fn new(args: &ProbeArgs) -> Result<Self, CliError> {
        let cfg = load_config(&args.config)?;
        Self::merge(args, cfg)
    }

    fn merge(args: &ProbeArgs, cfg: Config) -> Result<Self, CliError> {
        let mut scenario = cfg.scenario;

        if let Some(tenant) = &args.tenant {
            scenario.tenant = tenant.clone();
        }
        if let Some(namespace) = &args.namespace {
            scenario.namespace = namespace.clone();
        }
        if let Some(v) = args.gc_timeout_secs {
            scenario.gc_timeout_secs = v;
        }
        if let Some(v) = args.poll_interval_ms {
            scenario.poll_interval_ms = v;
        }
        if let Some(v) = args.receive_timeout_secs {
            scenario.receive_timeout_secs = v;
        }
        if let Some(v) = args.batch_size {
            scenario.batch_size = v;
        }
        if let Some(sub_type) = args.subscription_type {
            scenario.variants.retain(|v| v.subscription_type == sub_type);
            if scenario.variants.is_empty() {
                scenario.variants.push(VariantConfig {
                    subscription_type: sub_type,
                    settle_ms: 0,
                });
            }
        }
        if let Some(settle_ms) = args.settle_ms {
            for v in &mut scenario.variants {
                v.settle_ms = settle_ms;
            }
        }

        scenario.validate()?;

        let request_timeout_secs = cfg.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if request_timeout_secs == 0 {
            return Err(CliError::Config("request_timeout_secs must be positive".into()));
        }

        Ok(Self {
            admin_url: args
                .admin_url
                .clone()
                .or(cfg.admin_url)
                .unwrap_or_else(|| DEFAULT_ADMIN_URL.into()),
            service_url: args
                .service_url
                .clone()
                .or(cfg.service_url)
                .unwrap_or_else(|| DEFAULT_SERVICE_URL.into()),
            request_timeout: Duration::from_secs(request_timeout_secs),
            scenario,
        })
    }
}
