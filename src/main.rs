use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use flowdeck_artifact::FsStore;
use flowdeck_bundle::{BundleResolver, Resolver};
use flowdeck_client::{
  FlowFile, FlowsApi, HttpEngineClient, LogPage, RunMode, RunRequest, SignInBoundary,
};
use flowdeck_config::{ConsoleConfig, FlowManifest};
use flowdeck_layout::layout;
use flowdeck_registry::{FlowRegistry, ParentLink, normalize};
use flowdeck_runner::{LogPager, Phase, RunController, RunSummary, TracingNotifier};

/// Flowdeck - manage flow hierarchies and runs on an orchestration engine
#[derive(Parser)]
#[command(name = "flowdeck")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.flowdeck)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Path to the config file (default: <data-dir>/config.json)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Show the flow hierarchy
  Flows {
    /// Print normalized nodes as JSON instead of a tree
    #[arg(long)]
    json: bool,
  },

  /// Print the computed graph layout as JSON
  Layout,

  /// Inspect or store a flow's code bundle
  Bundle {
    #[command(subcommand)]
    action: BundleAction,
  },

  /// Run a flow and watch it until it settles
  Run(RunArgs),

  /// Test-run a flow and watch it until it settles
  Test(RunArgs),

  /// Resume a paused run
  Resume {
    run_id: String,

    /// Keep watching after the resume call
    #[arg(long)]
    watch: bool,
  },

  /// Show a run's current state
  Status { run_id: String },

  /// Show a page of run logs, or download them all
  #[command(args_conflicts_with_subcommands = true)]
  Logs {
    #[command(subcommand)]
    action: Option<LogsAction>,

    run_id: Option<String>,

    #[arg(long)]
    limit: Option<u32>,

    #[arg(long, default_value_t = 0)]
    offset: u64,
  },

  /// Register every flow listed in a manifest
  Register {
    manifest: PathBuf,

    /// Directory that manifest file paths are relative to
    /// (default: the manifest's directory)
    #[arg(long)]
    root: Option<PathBuf>,
  },
}

#[derive(Subcommand)]
enum BundleAction {
  /// Print a flow's bundle as JSON
  Show { flow_id: String },

  /// Store every file under a directory as the flow's bundle
  Save {
    flow_id: String,
    dir: PathBuf,

    /// Object-store prefix (default: <flows-prefix>/<flow-id>/)
    #[arg(long)]
    prefix: Option<String>,

    /// Also point the engine's flow code record at the saved bundle
    #[arg(long)]
    publish: bool,
  },
}

#[derive(Subcommand)]
enum LogsAction {
  /// Download the complete log artifact
  Download {
    run_id: String,

    /// Write to this file instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,
  },
}

#[derive(clap::Args)]
struct RunArgs {
  flow_id: String,

  /// Run parameters as a JSON object
  #[arg(long)]
  params: Option<String>,

  /// Return after submission without watching
  #[arg(long)]
  no_watch: bool,
}

/// Prints a sign-in prompt when the engine rejects our credentials.
struct CliSignIn;

impl SignInBoundary for CliSignIn {
  fn redirect(&self, status: u16) {
    eprintln!(
      "engine rejected the request ({status}); sign in by setting FLOWDECK_ENGINE_TOKEN \
       or FLOWDECK_ENGINE_USERNAME/FLOWDECK_ENGINE_PASSWORD"
    );
  }
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flowdeck=info")),
    )
    .with_writer(std::io::stderr)
    .init();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".flowdeck"),
  };
  let config_path = cli
    .config
    .unwrap_or_else(|| data_dir.join("config.json"));

  let Some(command) = cli.command else {
    println!("flowdeck - use --help to see available commands");
    return Ok(());
  };

  let mut config = ConsoleConfig::load(&config_path)
    .with_context(|| format!("failed to load config: {}", config_path.display()))?;
  config.apply_env(|key| std::env::var(key).ok());
  config.validate().context("invalid configuration")?;
  debug!(config = %config_path.display(), engine = %config.engine.base_url, "configuration loaded");

  let rt = tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()?;
  rt.block_on(async { dispatch(command, config, data_dir).await })
}

async fn dispatch(command: Commands, config: ConsoleConfig, data_dir: PathBuf) -> Result<()> {
  let client = HttpEngineClient::with_sign_in(&config.engine, Arc::new(CliSignIn))
    .context("failed to create engine client")?;

  match command {
    Commands::Flows { json } => show_flows(&client, json).await,
    Commands::Layout => {
      let registry = fetch_registry(&client).await?;
      let computed = layout(&registry, &config.layout);
      println!("{}", serde_json::to_string_pretty(&computed)?);
      Ok(())
    }
    Commands::Bundle { action } => {
      let store_root = if config.store.root.is_absolute() {
        config.store.root.clone()
      } else {
        data_dir.join(&config.store.root)
      };
      let resolver = BundleResolver::new(
        client,
        FsStore::new(store_root),
        &config.store,
        &config.bundle,
      );
      bundle(&resolver, action).await
    }
    Commands::Run(args) => run_flow(client, &config, args, RunMode::Run).await,
    Commands::Test(args) => run_flow(client, &config, args, RunMode::Test).await,
    Commands::Resume { run_id, watch } => {
      let mut controller =
        RunController::with_notifier(client, config.polling.clone(), TracingNotifier);
      controller
        .observe(&run_id)
        .await
        .context("failed to fetch run")?;
      controller
        .resume(&run_id)
        .await
        .context("failed to resume run")?;
      eprintln!("resumed run {run_id}");
      if watch {
        let summary = controller.watch(interrupt_token()).await?;
        report(&summary)?;
      }
      Ok(())
    }
    Commands::Status { run_id } => {
      let mut controller = RunController::new(client, config.polling.clone());
      let record = controller
        .observe(&run_id)
        .await
        .context("failed to fetch run")?;
      let output = serde_json::json!({
        "run": record,
        "phase": controller.phase(),
      });
      println!("{}", serde_json::to_string_pretty(&output)?);
      Ok(())
    }
    Commands::Logs {
      action: Some(LogsAction::Download { run_id, output }),
      ..
    } => {
      let pager = LogPager::new(client, &config.logs);
      let bytes = pager.download_all(&run_id).await?;
      match output {
        Some(path) => {
          tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("failed to write logs: {}", path.display()))?;
          eprintln!("wrote {} bytes to {}", bytes.len(), path.display());
        }
        None => print!("{}", String::from_utf8_lossy(&bytes)),
      }
      Ok(())
    }
    Commands::Logs {
      action: None,
      run_id,
      limit,
      offset,
    } => {
      let run_id = run_id.context("a run id is required")?;
      let pager = LogPager::new(client, &config.logs);
      let limit = limit.unwrap_or(pager.page_size());
      let page = pager.fetch_page(&run_id, limit, offset).await?;
      print_logs(&page);
      eprintln!(
        "showing {} of {} entries from offset {offset}",
        page.logs.len(),
        page.total
      );
      Ok(())
    }
    Commands::Register { manifest, root } => register(&client, &manifest, root).await,
  }
}

async fn fetch_registry(client: &HttpEngineClient) -> Result<FlowRegistry> {
  let flows = client.list_flows().await.context("failed to list flows")?;
  Ok(normalize(&flows))
}

async fn show_flows(client: &HttpEngineClient, json: bool) -> Result<()> {
  let registry = fetch_registry(client).await?;

  if json {
    println!("{}", serde_json::to_string_pretty(registry.nodes())?);
    return Ok(());
  }

  for main in registry.mains() {
    println!("{} ({})", main.name, main.id);
    let children = registry.children_of(&main.id);
    let last = children.len().saturating_sub(1);
    for (i, child) in children.iter().enumerate() {
      let branch = if i == last { "└─" } else { "├─" };
      println!("  {branch} {} [{}] ({})", child.name, child.flow_type, child.id);
    }
  }

  let unattached = registry.unattached();
  if !unattached.is_empty() {
    println!();
    println!("unattached:");
    for node in unattached {
      let reason = match (&node.parent, &node.parent_flow_id) {
        (ParentLink::Orphaned, Some(parent)) => format!("parent '{parent}' not found"),
        _ => "no parent_flow label".to_string(),
      };
      println!("  {} [{}] ({}): {reason}", node.name, node.flow_type, node.id);
    }
  }
  Ok(())
}

async fn bundle<F: FlowsApi, S: flowdeck_artifact::Store>(
  resolver: &BundleResolver<F, S>,
  action: BundleAction,
) -> Result<()> {
  match action {
    BundleAction::Show { flow_id } => {
      let bundle = resolver.load_bundle(&flow_id).await?;
      if let Err(e) = bundle.entry() {
        eprintln!("warning: {e}");
      }
      println!("{}", serde_json::to_string_pretty(&bundle)?);
    }
    BundleAction::Save {
      flow_id,
      dir,
      prefix,
      publish,
    } => {
      let files = read_bundle_dir(&dir).await?;
      if publish {
        let bundle = resolver
          .publish_bundle(&flow_id, &files, prefix.as_deref())
          .await?;
        eprintln!(
          "published {} files under {} (entry: {})",
          bundle.files.len(),
          bundle.prefix,
          bundle.main_relative_path.as_deref().unwrap_or("implicit")
        );
      } else {
        let report = resolver
          .save_bundle(&flow_id, &files, prefix.as_deref())
          .await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
      }
    }
  }
  Ok(())
}

/// Every regular file under `dir`, skipping hidden entries, sorted by path.
async fn read_bundle_dir(dir: &Path) -> Result<Vec<FlowFile>> {
  let mut files = Vec::new();
  let mut pending = vec![dir.to_path_buf()];

  while let Some(current) = pending.pop() {
    let mut entries = tokio::fs::read_dir(&current)
      .await
      .with_context(|| format!("failed to read directory: {}", current.display()))?;
    while let Some(entry) = entries.next_entry().await? {
      if entry.file_name().to_string_lossy().starts_with('.') {
        continue;
      }
      let path = entry.path();
      if entry.file_type().await?.is_dir() {
        pending.push(path);
        continue;
      }
      let relative = path
        .strip_prefix(dir)
        .with_context(|| format!("{} is outside {}", path.display(), dir.display()))?;
      let relative_path = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
      let code = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
      files.push(FlowFile {
        relative_path,
        code,
      });
    }
  }

  files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
  if files.is_empty() {
    bail!("no files found under {}", dir.display());
  }
  Ok(files)
}

async fn run_flow(
  client: HttpEngineClient,
  config: &ConsoleConfig,
  args: RunArgs,
  mode: RunMode,
) -> Result<()> {
  let parameters = match args.params.as_deref() {
    Some(raw) => parse_params(raw)?,
    None => Map::new(),
  };
  let request = RunRequest::new(args.flow_id, mode).with_parameters(parameters);

  let pager = LogPager::new(client.clone(), &config.logs);
  let mut controller =
    RunController::with_notifier(client, config.polling.clone(), TracingNotifier);

  let run_id = controller.submit(request).await?;
  if args.no_watch {
    println!("{run_id}");
    return Ok(());
  }

  let summary = controller.watch(interrupt_token()).await?;

  match pager.last_page(&summary.run_id).await {
    Ok(page) => print_logs(&page),
    Err(e) => eprintln!("could not fetch logs: {e}"),
  }
  report(&summary)
}

fn parse_params(raw: &str) -> Result<Map<String, Value>> {
  match serde_json::from_str(raw).context("failed to parse --params")? {
    Value::Object(map) => Ok(map),
    other => bail!("--params must be a JSON object, got {other}"),
  }
}

/// A token cancelled on Ctrl-C. Cancelling only stops watching.
fn interrupt_token() -> CancellationToken {
  let cancel = CancellationToken::new();
  let trigger = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      trigger.cancel();
    }
  });
  cancel
}

fn report(summary: &RunSummary) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(summary)?);
  match &summary.phase {
    Phase::Paused { run_id } => {
      eprintln!("run {run_id} is paused; use `flowdeck resume {run_id}` to continue");
      Ok(())
    }
    Phase::Finished { outcome, .. } if outcome.is_success() => Ok(()),
    Phase::Finished { outcome, .. } => bail!("run {} ended {outcome}", summary.run_id),
    other => bail!("run {} stopped while {}", summary.run_id, other.name()),
  }
}

fn print_logs(page: &LogPage) {
  for entry in &page.logs {
    println!(
      "{} {:<8} {}",
      entry.timestamp.to_rfc3339(),
      entry.level.to_string(),
      entry.message
    );
  }
}

async fn register(client: &HttpEngineClient, manifest_path: &Path, root: Option<PathBuf>) -> Result<()> {
  let manifest = FlowManifest::load(manifest_path)
    .with_context(|| format!("failed to load manifest: {}", manifest_path.display()))?;

  for issue in manifest.validate() {
    eprintln!("warning: {issue}");
  }

  let root = match root {
    Some(root) => root,
    None => manifest_path
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_default(),
  };
  let registrations = manifest
    .registrations(&root)
    .context("failed to read flow code")?;

  let result = client
    .batch_register(&registrations)
    .await
    .context("batch registration failed")?;

  for flow in &result.registered {
    println!("registered {} ({})", flow.name, flow.id);
  }
  for failure in &result.failed {
    eprintln!("failed {}: {}", failure.name, failure.error);
  }
  if !result.failed.is_empty() {
    bail!(
      "{} of {} flows failed to register",
      result.failed.len(),
      registrations.len()
    );
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_params() {
    let params = parse_params(r#"{"batch_size": 500, "dry_run": true}"#).unwrap();
    assert_eq!(params["batch_size"], 500);
    assert!(parse_params("[1, 2]").is_err());
    assert!(parse_params("not json").is_err());
  }

  #[tokio::test]
  async fn test_read_bundle_dir() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::create_dir_all(root.join("docs/flows/tasks")).unwrap();
    std::fs::create_dir_all(root.join(".git")).unwrap();
    std::fs::write(root.join("docs/flows/main.py"), "def main(): ...").unwrap();
    std::fs::write(root.join("docs/flows/tasks/clean.py"), "def clean(): ...").unwrap();
    std::fs::write(root.join(".git/HEAD"), "ref").unwrap();

    let files = read_bundle_dir(root).await.unwrap();

    let paths: Vec<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();
    assert_eq!(paths, vec!["docs/flows/main.py", "docs/flows/tasks/clean.py"]);
  }

  #[tokio::test]
  async fn test_read_empty_bundle_dir_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(read_bundle_dir(dir.path()).await.is_err());
  }
}
