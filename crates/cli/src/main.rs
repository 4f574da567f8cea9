use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use cumulus_core::{RowEventKind, TableSnapshot};
use cumulus_engine::{Engine, EngineConfig, RefreshOutcome};
use cumulus_provider::fetch::ListingCache;
use cumulus_provider::{builtin_resources, CachedFetcher, FileFetcher, ResourceId, Scope};
use cumulus_store::CacheConfig;
use cumulus_view::text::TextSurface;
use cumulus_view::TableView;
use metrics::counter;
use serde::Serialize;
use tokio::signal;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "cumulusctl", version, about = "List and watch cloud resource tables")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Region to list, or "all"
    #[arg(long = "scope", global = true, env = "CUMULUS_SCOPE", default_value = Scope::ALL)]
    scope: String,

    /// Include wide columns
    #[arg(long = "wide", global = true, action = ArgAction::SetTrue)]
    wide: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output {
    Human,
    Json,
}

#[derive(clap::Args, Debug)]
struct TableArgs {
    /// Resource id, e.g. "ec2/instance"
    rid: String,
    /// JSON file holding the listing (an array of objects)
    #[arg(long = "source", env = "CUMULUS_SOURCE")]
    source: PathBuf,
    /// Case-insensitive substring filter over every column
    #[arg(long = "filter")]
    filter: Option<String>,
    /// Column name to sort by
    #[arg(long = "sort")]
    sort: Option<String>,
    /// Sort descending
    #[arg(long = "desc", action = ArgAction::SetTrue)]
    desc: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List built-in resource ids
    Kinds,
    /// Refresh once and print the table
    Ls {
        #[command(flatten)]
        table: TableArgs,
    },
    /// Keep refreshing and print the table on every change until Ctrl-C
    Watch {
        #[command(flatten)]
        table: TableArgs,
        /// Seconds between refreshes
        #[arg(long = "interval", env = "CUMULUS_REFRESH_SECS")]
        interval: Option<f64>,
        /// Seconds before a listing call is abandoned
        #[arg(long = "timeout", env = "CUMULUS_FETCH_TIMEOUT_SECS")]
        timeout: Option<f64>,
    },
}

fn init_tracing() {
    let env = std::env::var("CUMULUS_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("CUMULUS_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid CUMULUS_METRICS_ADDR; expected host:port");
        }
    }
}

fn secs(v: Option<f64>, what: &str) -> Result<Option<Duration>> {
    v.map(|s| Duration::try_from_secs_f64(s).with_context(|| format!("invalid {what}: {s}")))
        .transpose()
}

fn build_engine(rid: &ResourceId, source: PathBuf, cfg: EngineConfig) -> Result<Arc<Engine>> {
    let cache = Arc::new(ListingCache::new(CacheConfig::from_env()));
    let fetcher = CachedFetcher::new(rid.clone(), FileFetcher::new(source), cache);
    let engine = Engine::builtin(rid.clone(), Arc::new(fetcher), cfg)?;
    Ok(Arc::new(engine))
}

fn build_view<W: std::io::Write + Send>(engine: &Engine, args: &TableArgs, wide: bool, out: W) -> Result<TableView<TextSurface<W>>> {
    let renderer = engine.renderer().ok_or_else(|| anyhow!("no renderer bound for {}", engine.rid()))?;
    let mut view = TableView::new(engine.rid().clone(), TextSurface::new(out))
        .with_renderer(renderer)
        .with_wide(wide);
    if let Some(f) = &args.filter {
        view = view.with_filter(f);
    }
    if let Some(col) = &args.sort {
        view = view.with_sort(&col.to_ascii_uppercase(), !args.desc);
    }
    Ok(view)
}

#[derive(Serialize)]
struct JsonRow<'a> {
    id: &'a str,
    kind: RowEventKind,
    fields: serde_json::Map<String, serde_json::Value>,
}

fn rows_json(snap: &TableSnapshot, wide: bool) -> serde_json::Value {
    let header = snap.header();
    let cols = header.visible_indices(wide);
    let rows: Vec<JsonRow<'_>> = snap
        .rows()
        .iter()
        .map(|re| JsonRow {
            id: re.id(),
            kind: re.kind,
            fields: cols
                .iter()
                .filter_map(|&c| {
                    let name = header.get(c)?.name.clone();
                    Some((name, serde_json::Value::from(re.row.field(c).unwrap_or_default())))
                })
                .collect(),
        })
        .collect();
    serde_json::to_value(rows).unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let scope = Scope::new(cli.scope.clone());

    match cli.command {
        Commands::Kinds => {
            counter!("cli_commands_total", 1u64, "command" => "kinds");
            let kinds = builtin_resources();
            match cli.output {
                Output::Human => kinds.iter().for_each(|k| println!("{k}")),
                Output::Json => {
                    let names: Vec<String> = kinds.iter().map(ToString::to_string).collect();
                    println!("{}", serde_json::to_string_pretty(&names)?);
                }
            }
        }
        Commands::Ls { table } => {
            counter!("cli_commands_total", 1u64, "command" => "ls");
            let rid: ResourceId = table.rid.parse()?;
            info!(rid = %rid, %scope, source = %table.source.display(), "ls invoked");
            let engine = build_engine(&rid, table.source.clone(), EngineConfig::from_env())?;
            match cli.output {
                Output::Human => {
                    let view = Arc::new(build_view(&engine, &table, cli.wide, std::io::stdout())?);
                    engine.add_listener(view);
                    if engine.refresh(&scope).await? == RefreshOutcome::Failed {
                        return Err(anyhow!("listing {rid} failed"));
                    }
                }
                Output::Json => {
                    let view = build_view(&engine, &table, cli.wide, std::io::sink())?;
                    if engine.refresh(&scope).await? == RefreshOutcome::Failed {
                        return Err(anyhow!("listing {rid} failed"));
                    }
                    view.update(&engine.peek());
                    let shown = view.current().unwrap_or_default();
                    println!("{}", serde_json::to_string_pretty(&rows_json(&shown, cli.wide))?);
                }
            }
        }
        Commands::Watch { table, interval, timeout } => {
            counter!("cli_commands_total", 1u64, "command" => "watch");
            let rid: ResourceId = table.rid.parse()?;
            let mut cfg = EngineConfig::from_env();
            if let Some(every) = secs(interval, "interval")? {
                cfg = cfg.with_refresh_interval(every);
            }
            if let Some(t) = secs(timeout, "timeout")? {
                cfg = cfg.with_fetch_timeout(t);
            }
            info!(rid = %rid, %scope, every_ms = cfg.refresh_interval.as_millis() as u64, "watch invoked");
            let engine = build_engine(&rid, table.source.clone(), cfg)?;
            let view = Arc::new(build_view(&engine, &table, cli.wide, std::io::stdout())?);
            engine.add_listener(view);
            engine.watch(scope).await?;
            signal::ctrl_c().await.context("waiting for Ctrl-C")?;
            engine.shutdown().await;
            info!(rid = %rid, "watch finished");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cumulus_core::{Header, HeaderColumn, Row, RowEvent, RowEvents};

    #[test]
    fn parses_ls_with_flags() {
        let cli = Cli::try_parse_from([
            "cumulusctl", "ls", "ec2/instance", "--source", "fleet.json", "--filter", "web", "--sort", "age", "--desc",
            "-o", "json", "--scope", "us-east-1",
        ])
        .unwrap();
        assert_eq!(cli.output, Output::Json);
        assert_eq!(cli.scope, "us-east-1");
        let Commands::Ls { table } = cli.command else { panic!("expected ls") };
        assert_eq!(table.rid, "ec2/instance");
        assert_eq!(table.sort.as_deref(), Some("age"));
        assert!(table.desc);
    }

    #[test]
    fn rejects_bad_durations() {
        assert!(secs(Some(-1.0), "interval").is_err());
        assert_eq!(secs(Some(0.5), "interval").unwrap(), Some(Duration::from_millis(500)));
        assert_eq!(secs(None, "interval").unwrap(), None);
    }

    #[test]
    fn json_rows_follow_visible_columns() {
        let header = Header::new(vec![
            HeaderColumn::new("NAME"),
            HeaderColumn::with("AZ", cumulus_core::ColumnAttrs::WIDE),
        ]);
        let rows: RowEvents = [RowEvent::new(RowEventKind::Add, Row::new("a", ["a", "us-east-1a"]))].into_iter().collect();
        let snap = TableSnapshot::with_rows(header, rows);

        let narrow = rows_json(&snap, false);
        assert_eq!(narrow, serde_json::json!([{ "id": "a", "kind": "Add", "fields": { "NAME": "a" } }]));
        let wide = rows_json(&snap, true);
        assert_eq!(wide[0]["fields"]["AZ"], "us-east-1a");
    }
}
