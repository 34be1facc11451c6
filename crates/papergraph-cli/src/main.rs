//! papergraph: build and query a concept graph over research papers.

use std::path::PathBuf;

use anyhow::{bail, Context};
use papergraph_core::PaperGraphConfig;
use papergraph_runtime::PaperGraph;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
papergraph: concept graph RAG over research papers

Usage: papergraph <command> [args]

Commands:
  build-index              Rebuild the similarity index from the corpus
  build-graph              Rebuild the concept graph from the corpus
  build                    Rebuild both
  query <question> [--k N] Answer a question from retrieved chunks
  explain <node-id>        Explain a paper or concept node
  graph                    Print the graph snapshot as JSON
  clear                    Remove the index and graph snapshots
  help                     Show this help message

Environment:
  PAPERGRAPH_DATA_DIR      Data directory (default: storage)
  RUST_LOG                 Log filter (default: info)";

#[derive(Debug, PartialEq)]
enum Command {
    BuildIndex,
    BuildGraph,
    Build,
    Query { question: String, k: Option<usize> },
    Explain { node_id: String },
    Graph,
    Clear,
    Help,
}

fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let Some(name) = args.first() else {
        return Ok(Command::Help);
    };
    let rest = &args[1..];

    let command = match name.as_str() {
        "build-index" => Command::BuildIndex,
        "build-graph" => Command::BuildGraph,
        "build" => Command::Build,
        "graph" => Command::Graph,
        "clear" => Command::Clear,
        "--help" | "-h" | "help" => Command::Help,
        "explain" => match rest {
            [node_id] => Command::Explain {
                node_id: node_id.clone(),
            },
            _ => bail!("Usage: papergraph explain <node-id>"),
        },
        "query" => {
            let mut k = None;
            let mut words = Vec::new();
            let mut iter = rest.iter();
            while let Some(arg) = iter.next() {
                if arg == "--k" || arg == "-k" {
                    let value = iter.next().context("--k needs a value")?;
                    k = Some(
                        value
                            .parse::<usize>()
                            .with_context(|| format!("invalid --k value: {}", value))?,
                    );
                } else {
                    words.push(arg.as_str());
                }
            }
            if words.is_empty() {
                bail!("Usage: papergraph query <question> [--k N]");
            }
            Command::Query {
                question: words.join(" "),
                k,
            }
        }
        other => bail!("Unknown command: {}. Use 'papergraph help' for usage.", other),
    };
    Ok(command)
}

fn resolve_data_dir() -> PathBuf {
    std::env::var("PAPERGRAPH_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("storage"))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;
    if command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());
    let config = PaperGraphConfig::from_env(&data_dir)
        .with_context(|| format!("failed to prepare data directory {}", data_dir.display()))?;
    let papergraph = PaperGraph::open(config);

    match command {
        Command::BuildIndex => {
            let manifest = papergraph.build_index()?;
            print_json(&manifest)?;
        }
        Command::BuildGraph => {
            let report = papergraph.build_graph()?;
            print_json(&report.stats)?;
        }
        Command::Build => {
            let report = papergraph.build()?;
            print_json(&report)?;
        }
        Command::Query { question, k } => {
            let answer = papergraph.answer(&question, k).await;
            print_json(&answer)?;
        }
        Command::Explain { node_id } => {
            let explanation = papergraph.explain(&node_id).await;
            print_json(&explanation)?;
        }
        Command::Graph => {
            print_json(&papergraph.graph_snapshot())?;
        }
        Command::Clear => {
            papergraph.clear()?;
            println!("Cleared index and graph in {}", data_dir.display());
        }
        Command::Help => {}
    }
    Ok(())
}
