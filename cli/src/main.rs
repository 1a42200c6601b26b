//! Graph Studio CLI: run Cypher or Gremlin queries straight against a database
//!
//! Uses the same clients and normalization as the HTTP API.

use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use graph_studio::{
    connect_client, Bindings, ConnectionInfo, Dialect, QueryResult, StudioConfig, Value,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "graph-studio-cli", version, about = "Graph Studio query CLI")]
struct Cli {
    /// Database host
    #[arg(long, default_value = "localhost", global = true, env = "GRAPH_STUDIO_HOST")]
    host: String,

    /// Database port (Bolt or Gremlin Server)
    #[arg(long, default_value_t = 8182, global = true, env = "GRAPH_STUDIO_PORT")]
    port: u16,

    #[arg(long, short = 'u', default_value = "", global = true, env = "GRAPH_STUDIO_USER")]
    username: String,

    #[arg(long, short = 'p', default_value = "", global = true, env = "GRAPH_STUDIO_PASSWORD", hide_env_values = true)]
    password: String,

    /// Gremlin database name, appended to the endpoint path
    #[arg(long, global = true)]
    dbname: Option<String>,

    /// Gremlin submission timeout in milliseconds (overrides the config file)
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum DialectArg {
    Cypher,
    Gremlin,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Cypher => Dialect::Cypher,
            DialectArg::Gremlin => Dialect::Gremlin,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a query
    Query {
        /// Cypher statement or Gremlin traversal
        dsl: String,

        /// Query dialect; detected from the query when omitted
        #[arg(long = "type")]
        dialect: Option<DialectArg>,

        /// Bindings as a JSON object
        #[arg(long)]
        bindings: Option<String>,
    },
    /// Check that the server answers and accepts the credentials
    Ping,
    /// Start an interactive REPL
    Shell,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = run(&cli).await;
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut config = StudioConfig::from_env()?;
    if let Some(ms) = cli.timeout_ms {
        config.gremlin.timeout_ms = ms;
    }

    let mut info = ConnectionInfo::new(cli.host.clone(), cli.port)
        .with_credentials(cli.username.clone(), cli.password.clone());
    info.dbname = cli.dbname.clone();

    match &cli.command {
        Commands::Query {
            dsl,
            dialect,
            bindings,
        } => {
            let bindings = parse_bindings(bindings.as_deref())?;
            let dialect = dialect.map(Dialect::from);
            run_query(&info, &config, dsl, dialect, &bindings, &cli.format).await
        }
        Commands::Ping => run_ping(&info).await,
        Commands::Shell => run_shell(&info, &config, &cli.format).await,
    }
}

fn parse_bindings(raw: Option<&str>) -> anyhow::Result<Bindings> {
    match raw {
        None => Ok(Bindings::new()),
        Some(text) => match serde_json::from_str::<serde_json::Value>(text)? {
            serde_json::Value::Object(map) => Ok(map),
            other => anyhow::bail!("bindings must be a JSON object, got {}", other),
        },
    }
}

async fn run_query(
    info: &ConnectionInfo,
    config: &StudioConfig,
    dsl: &str,
    dialect: Option<Dialect>,
    bindings: &Bindings,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let dialect = dialect.unwrap_or_else(|| Dialect::detect(dsl));
    let mut client = connect_client(dialect, info, config)?;

    let outcome = match client.open().await {
        Ok(()) => client.run(dsl, bindings).await,
        Err(e) => Err(e),
    };
    client.close().await;
    let result = outcome.map_err(|e| anyhow::anyhow!("[{}] {}", e.status(), e))?;

    print_result(&result, format)
}

fn print_result(result: &QueryResult, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
        OutputFormat::Csv => {
            let (columns, rows) = tabulate(result);
            if !columns.is_empty() {
                println!("{}", columns.join(","));
                for row in &rows {
                    let cells: Vec<String> = row.iter().map(format_csv_value).collect();
                    println!("{}", cells.join(","));
                }
            }
        }
        OutputFormat::Table => {
            if result.is_empty() {
                println!("(no results)");
                return Ok(());
            }

            let (columns, rows) = tabulate(result);
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(&columns);

            for row in &rows {
                let cells: Vec<String> = row.iter().map(format_table_value).collect();
                table.add_row(cells);
            }

            println!("{}", table);
            println!(
                "{} row(s), {} node(s), {} edge(s)",
                result.len(),
                result.graph.node_count(),
                result.graph.edge_count()
            );
        }
    }

    Ok(())
}

/// Column names and cells; rows without column names get a single `result` column
fn tabulate(result: &QueryResult) -> (Vec<String>, Vec<Vec<Value>>) {
    let columns = result.columns();
    if columns.is_empty() {
        let rows = result.rows.iter().map(|row| vec![row.clone()]).collect();
        return (vec!["result".to_string()], rows);
    }

    let rows = result
        .rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| row.as_map().and_then(|m| m.get(c)).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect();
    (columns, rows)
}

async fn run_ping(info: &ConnectionInfo) -> anyhow::Result<()> {
    info.check()
        .await
        .map_err(|e| anyhow::anyhow!("[{}] {}", e.status(), e))?;
    println!("PONG");
    Ok(())
}

async fn run_shell(
    info: &ConnectionInfo,
    config: &StudioConfig,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    println!("Graph Studio Interactive Shell");
    println!("Type Cypher or Gremlin queries, or :help for commands. :quit to exit.\n");

    let stdin = std::io::stdin();
    let mut line = String::new();

    loop {
        eprint!("graph-studio> ");

        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break; // EOF
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match trimmed {
            ":quit" | ":exit" | ":q" => break,
            ":help" | ":h" => {
                println!("Commands:");
                println!("  :ping     Check the connection");
                println!("  :quit     Exit shell");
                println!("  g.<...>   Run a Gremlin traversal");
                println!("  <cypher>  Run a Cypher query");
            }
            ":ping" => {
                if let Err(e) = run_ping(info).await {
                    eprintln!("Error: {}", e);
                }
            }
            query => {
                if let Err(e) = run_query(info, config, query, None, &Bindings::new(), format).await {
                    eprintln!("Error: {}", e);
                }
            }
        }
    }

    println!("Bye!");
    Ok(())
}

fn format_table_value(v: &Value) -> String {
    match v {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        Value::Node(node) => format!("({}:{})", node.id, node.label),
        Value::Edge(edge) => format!("[{}:{}] {}->{}", edge.id, edge.label, edge.source, edge.target),
        Value::Path(_) => v.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn format_csv_value(v: &Value) -> String {
    match v {
        Value::Null => "".to_string(),
        Value::String(s) => {
            if s.contains(',') || s.contains('"') || s.contains('\n') {
                format!("\"{}\"", s.replace('"', "\"\""))
            } else {
                s.clone()
            }
        }
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => {
            let json = serde_json::to_string(v).unwrap_or_default();
            format!("\"{}\"", json.replace('"', "\"\""))
        }
    }
}
