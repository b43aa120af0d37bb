use std::io::Read;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gatekeeper_cache::cache_root;
use gatekeeper_config::AppConfig;
use gatekeeper_pipeline::background::{self, BackgroundValidateArgs};
use gatekeeper_pipeline::hook::{HookDecision, HookInput, PRE_TOOL_USE_EVENT, STOP_EVENT};
use gatekeeper_pipeline::pre_tool::{self, PreToolRequest};
use gatekeeper_pipeline::services::PipelineServices;
use gatekeeper_pipeline::stop::{self, StopRequest};
use tracing_subscriber::EnvFilter;

const STDIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Parser)]
#[command(name = "gatekeeper", version, about = "Policy-enforcement sidecar for an AI coding assistant host")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    /// Internal re-entry point for the detached background validator
    /// spawned by the trusted-file lazy path — never invoked by the host.
    #[arg(long = "background-validate", hide = true)]
    background_validate: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Inspect and clear the on-disk session caches for a transcript.
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
    /// Print resolved configuration and verify the LLM provider is reachable.
    Doctor,
}

#[derive(Debug, Subcommand)]
enum CacheCommands {
    /// Delete every cache file for a given session (identified by its
    /// transcript path).
    Clear {
        #[arg(long)]
        session: String,
    },
    /// Print the resolved cache directory root.
    Path,
}

fn init_tracing(config: &AppConfig) -> tracing_appender::non_blocking::WorkerGuard {
    // stdout must carry only the hook's one JSON decision, so logs go to a
    // rolling file under the cache root instead.
    let log_dir = cache_root().join("logs");
    let _ = std::fs::create_dir_all(&log_dir);
    let appender = tracing_appender::rolling::daily(log_dir, "gatekeeper.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_new(&config.telemetry.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).with_ansi(false).init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::load_default().unwrap_or_default();
    let _tracing_guard = init_tracing(&config);

    let cli = Cli::parse();

    if let Some(payload) = cli.background_validate {
        return run_background_validate(config, &payload).await;
    }

    match cli.command {
        Some(Commands::Cache { command }) => run_cache_command(&config, command),
        Some(Commands::Doctor) => run_doctor(config).await,
        None => run_hook(config).await,
    }
}

/// The default, host-invoked path: read one JSON hook payload from stdin,
/// dispatch to the matching orchestrator, and write exactly one JSON
/// decision to stdout. Per spec.md §4.6/§7: any failure along the way
/// becomes a generic "Hook error: …" deny rather than a hang or a panic.
async fn run_hook(config: AppConfig) -> Result<()> {
    let decision = match tokio::time::timeout(STDIN_TIMEOUT, read_stdin()).await {
        Ok(Ok(input)) => match serde_json::from_str::<HookInput>(&input) {
            Ok(hook_input) => dispatch(&config, hook_input).await,
            Err(err) => HookDecision::hook_error(PRE_TOOL_USE_EVENT, format!("malformed hook input: {err}")),
        },
        Ok(Err(err)) => HookDecision::hook_error(PRE_TOOL_USE_EVENT, format!("stdin read failed: {err}")),
        Err(_) => HookDecision::hook_error(PRE_TOOL_USE_EVENT, "stdin read timed out after 30s"),
    };

    let rendered = serde_json::to_string(&decision).context("serializing hook decision")?;
    println!("{rendered}");
    // §6: exit 0 for any decision a validator reached, allow or deny;
    // nonzero only when the sidecar itself couldn't produce one.
    if decision.is_sidecar_error {
        std::process::exit(1);
    }
    Ok(())
}

async fn read_stdin() -> std::io::Result<String> {
    tokio::task::spawn_blocking(|| {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    })
    .await
    .unwrap_or_else(|err| Err(std::io::Error::other(err)))
}

async fn dispatch(config: &AppConfig, input: HookInput) -> HookDecision {
    let services = PipelineServices::new(config.clone());
    let current_exe = match std::env::current_exe() {
        Ok(path) => path,
        Err(err) => {
            return HookDecision::hook_error(input.hook_event_name.as_str(), format!("cannot resolve current exe: {err}"));
        }
    };

    match input.hook_event_name.as_str() {
        PRE_TOOL_USE_EVENT => {
            let req = PreToolRequest {
                tool_name: input.tool_name(),
                tool_input: &input.tool_input,
                transcript_path: &input.transcript_path,
                cwd: &input.cwd,
                is_plan_mode: input.is_plan_mode(),
                current_exe: &current_exe,
            };
            pre_tool::handle(&services, req).await
        }
        STOP_EVENT => {
            let req = StopRequest { transcript_path: &input.transcript_path, cwd: &input.cwd };
            stop::handle(&services, req).await
        }
        other => HookDecision::allow(other),
    }
}

/// Internal re-entry: the detached child the lazy path spawns. Stdio is
/// ignored both ways; the only observable effect is the pending-validation
/// cache write.
async fn run_background_validate(config: AppConfig, payload: &str) -> Result<()> {
    let args: BackgroundValidateArgs = serde_json::from_str(payload).context("parsing background-validate payload")?;
    let services = PipelineServices::new(config);
    background::run_background_validation(&services, &args).await
}

fn run_cache_command(config: &AppConfig, command: CacheCommands) -> Result<()> {
    match command {
        CacheCommands::Path => {
            println!("{}", cache_root().display());
            Ok(())
        }
        CacheCommands::Clear { session } => {
            let services = PipelineServices::new(config.clone());
            let caches = services.session_caches(&session);
            caches.invalidate_all().context("clearing session caches")?;
            println!("cleared caches for session {session}");
            Ok(())
        }
    }
}

/// Print resolved configuration and confirm the configured LLM provider
/// answers a trivial request, mirroring the teacher's `doctor` subcommand.
async fn run_doctor(config: AppConfig) -> Result<()> {
    println!("provider base url: {}", config.llm.provider_base_url);
    println!("models: nano={} small={} standard={}", config.llm.nano_model, config.llm.small_model, config.llm.standard_model);
    println!("lazy validation enabled: {}", config.pipeline.lazy_validation_enabled);

    let services = PipelineServices::new(config);
    let probe = gatekeeper_llm::AgentConfig::direct("doctor-probe", gatekeeper_llm::ModelTier::Nano, "Reply with exactly: OK");
    let result = services.llm.run_agent(&probe, "ping").await;
    if result.success {
        println!("provider reachable: yes ({}, {}ms)", result.model, result.latency.as_millis());
    } else {
        println!("provider reachable: no ({})", result.text);
    }
    Ok(())
}
