//! Binary entry point for the quarry query-definition CLI.
#![forbid(unsafe_code)]

#[path = "cli/config.rs"]
mod config;
#[path = "cli/ui.rs"]
mod ui;

use std::error::Error;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use quarry::{
    query::{
        compile, expand, normalize, profile::profile_snapshot, CompileOptions, LayoutOptions,
        PaginationSpec, PaginationStrategy, PatternHop, QueryConfig, QueryGraph,
    },
    result::{
        flatten::{parse_flattened, shape_flattened},
        nested::NestedTable,
    },
    query::errors::ErrorWithCode,
    shape_payload, InMemoryCatalog, QuarryError, ResultSchema, ResultView, ShapeOptions,
};

use config::{CliConfig, ConfigError, Profile, ProfileUpdate};
use ui::{Theme, Ui};

#[derive(Parser, Debug)]
#[command(
    name = "quarry",
    version,
    about = "Compile, inspect and shape dynamic query definitions",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "QUARRY_CONFIG",
        value_name = "FILE",
        help = "CLI config file (defaults to the user config dir)"
    )]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_name = "NAME", help = "Profile to apply")]
    profile: Option<String>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = ThemeArg::Auto,
        help = "Color theme for text output"
    )]
    theme: ThemeArg,

    #[arg(long, global = true, help = "Plain, undecorated text output")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct CompileCmd {
    #[arg(value_name = "GRAPH", help = "Editor graph JSON file, or - for stdin")]
    input: PathBuf,

    #[arg(long, help = "Treat edges without an explicit flag as optional")]
    default_optional: bool,

    #[arg(long, help = "Wrap the hops in a full query config")]
    emit_config: bool,
}

#[derive(Args, Debug)]
struct ExpandCmd {
    #[arg(value_name = "INPUT", help = "Hop list or query config JSON, or - for stdin")]
    input: PathBuf,

    #[arg(long, value_name = "FILE", help = "Schema catalog JSON used for labels")]
    catalog: Option<PathBuf>,

    #[arg(long, value_name = "PX", help = "Horizontal spacing between depths")]
    column_spacing: Option<f64>,

    #[arg(long, value_name = "PX", help = "Vertical spacing between siblings")]
    row_spacing: Option<f64>,
}

#[derive(Args, Debug)]
struct ShapeCmd {
    #[arg(value_name = "PAYLOAD", help = "Backend payload JSON, or - for stdin")]
    input: PathBuf,

    #[arg(long, help = "Payload uses dot-path keys")]
    flatten: bool,

    #[arg(long, help = "Keep fields the catalog marks hidden")]
    include_hidden: bool,

    #[arg(
        long,
        value_name = "FILE",
        help = "Depth-ordered schema list overriding the payload's own (flattened only)"
    )]
    schemas: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ProfileSetCmd {
    #[arg(value_name = "NAME")]
    name: String,

    #[arg(long, value_name = "BOOL")]
    default_optional: Option<bool>,

    #[arg(long, value_name = "BOOL")]
    apply_rbac: Option<bool>,

    #[arg(long, value_name = "ROWS")]
    page_limit: Option<u32>,

    #[arg(long, value_enum)]
    pagination_strategy: Option<StrategyArg>,

    #[arg(long, value_name = "BOOL")]
    include_hidden: Option<bool>,
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    #[command(about = "List configured profiles")]
    List,
    #[command(about = "Create or update a profile")]
    Set(ProfileSetCmd),
    #[command(about = "Make a profile the default")]
    Use {
        #[arg(value_name = "NAME")]
        name: String,
    },
    #[command(about = "Clear the default profile")]
    Unset,
    #[command(about = "Delete a profile")]
    Delete {
        #[arg(value_name = "NAME")]
        name: String,
    },
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Compile an editor graph into canonical pattern hops")]
    Compile(CompileCmd),

    #[command(about = "Expand pattern hops into an editor graph")]
    Expand(ExpandCmd),

    #[command(about = "Canonicalize a hop list or query config")]
    Normalize {
        #[arg(value_name = "INPUT", help = "Hop list or query config JSON, or - for stdin")]
        input: PathBuf,
    },

    #[command(about = "Validate a persisted query config")]
    Validate {
        #[arg(value_name = "CONFIG", help = "Query config JSON, or - for stdin")]
        input: PathBuf,
    },

    #[command(about = "Shape a backend payload into display rows")]
    Shape(ShapeCmd),

    #[command(subcommand, about = "Manage CLI profiles")]
    Profile(ProfileCommand),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ThemeArg {
    Auto,
    Light,
    Dark,
    Plain,
}

impl From<ThemeArg> for Theme {
    fn from(theme: ThemeArg) -> Self {
        match theme {
            ThemeArg::Auto => Theme::Auto,
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
            ThemeArg::Plain => Theme::Plain,
        }
    }
}

/// Pagination strategy accepted on the command line and in profiles.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyArg {
    /// Limit/offset paging.
    Offset,
    /// Cursor paging.
    Cursor,
}

impl From<StrategyArg> for PaginationStrategy {
    fn from(strategy: StrategyArg) -> Self {
        match strategy {
            StrategyArg::Offset => PaginationStrategy::Offset,
            StrategyArg::Cursor => PaginationStrategy::Cursor,
        }
    }
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        match err.downcast_ref::<QuarryError>() {
            Some(err) => eprintln!("error: {}", ErrorWithCode(err)),
            None => eprintln!("error: {err}"),
        }
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("QUARRY_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let ui = Ui::new(cli.theme.into(), cli.quiet);
    let mut config = CliConfig::load(cli.config.clone())?;

    match cli.command {
        Command::Profile(cmd) => return run_profile(&cmd, &mut config, &cli.format, &ui),
        Command::Compile(cmd) => {
            let profile = active_profile(&config, cli.profile.as_deref())?;
            run_compile(&cmd, &profile, &cli.format, &ui)?
        }
        Command::Expand(cmd) => run_expand(&cmd, &cli.format, &ui)?,
        Command::Normalize { input } => run_normalize(&input, &cli.format, &ui)?,
        Command::Validate { input } => {
            if !run_validate(&input, &cli.format, &ui)? {
                std::process::exit(2);
            }
        }
        Command::Shape(cmd) => {
            let profile = active_profile(&config, cli.profile.as_deref())?;
            run_shape(&cmd, &profile, &cli.format, &ui)?
        }
    }

    if let Some(snapshot) = profile_snapshot(false) {
        info!(snapshot = %serde_json::to_string(&snapshot)?, "cli.profile");
    }
    Ok(())
}

fn active_profile(config: &CliConfig, requested: Option<&str>) -> Result<Profile, ConfigError> {
    Ok(config.active_profile(requested)?.cloned().unwrap_or_default())
}

fn run_compile(
    cmd: &CompileCmd,
    profile: &Profile,
    format: &OutputFormat,
    ui: &Ui,
) -> Result<(), Box<dyn Error>> {
    let graph: QueryGraph = serde_json::from_value(read_json(&cmd.input)?)?;
    let options = CompileOptions {
        default_optional: cmd.default_optional || profile.default_optional.unwrap_or(false),
    };
    let compiled = compile(&graph, &options).map_err(QuarryError::from)?;

    if cmd.emit_config {
        let mut pagination = PaginationSpec::default();
        if let Some(limit) = profile.page_limit {
            pagination.limit = limit;
        }
        if let Some(strategy) = profile.pagination_strategy {
            pagination.strategy = strategy.into();
        }
        let config = QueryConfig::from_patterns(compiled.hops.clone())
            .and_then(|config| {
                config
                    .with_apply_rbac(profile.apply_rbac.unwrap_or(false))
                    .with_pagination(pagination)
            })
            .map_err(QuarryError::from)?;
        return emit(format, &config, |_| print_config_text(ui, &config));
    }

    let bindings: serde_json::Map<String, Value> = compiled
        .bindings
        .iter()
        .map(|(node, schema)| (node.to_string(), json!(schema.key())))
        .collect();
    let report = json!({ "patterns": compiled.hops, "bindings": bindings });
    emit(format, &report, |_| {
        ui.list("Patterns", compiled.hops.iter().map(describe_hop));
        ui.spacer();
        ui.section(
            "Bindings",
            compiled
                .bindings
                .iter()
                .map(|(node, schema)| (node.0.as_str(), schema.key())),
        );
    })
}

fn run_expand(cmd: &ExpandCmd, format: &OutputFormat, ui: &Ui) -> Result<(), Box<dyn Error>> {
    let hops = read_patterns(&read_json(&cmd.input)?)?;
    let catalog: InMemoryCatalog = match &cmd.catalog {
        Some(path) => {
            let schemas: Vec<ResultSchema> = serde_json::from_value(read_json(path)?)?;
            schemas.into_iter().collect()
        }
        None => InMemoryCatalog::new(),
    };
    let mut layout = LayoutOptions::default();
    if let Some(spacing) = cmd.column_spacing {
        layout.column_spacing = spacing;
    }
    if let Some(spacing) = cmd.row_spacing {
        layout.row_spacing = spacing;
    }
    let graph = expand(&hops, &catalog, &layout)?;
    emit(format, &graph, |_| {
        ui.list(
            "Nodes",
            graph.nodes.iter().map(|node| {
                let marker = if node.placeholder { " [placeholder]" } else { "" };
                format!(
                    "{} {} at ({}, {}){marker}",
                    node.id, node.schema_id, node.position.x, node.position.y
                )
            }),
        );
        ui.spacer();
        ui.list(
            "Edges",
            graph.edges.iter().map(|edge| {
                let optional = if edge.optional == Some(true) { " (optional)" } else { "" };
                format!("{} -[{}]-> {}{optional}", edge.source, edge.relation, edge.target)
            }),
        );
    })
}

fn run_normalize(input: &Path, format: &OutputFormat, ui: &Ui) -> Result<(), Box<dyn Error>> {
    let value = read_json(input)?;
    if value.is_object() {
        let config = QueryConfig::load_metadata(&value)?.normalized()?;
        return emit(format, &config, |_| print_config_text(ui, &config));
    }
    let hops: Vec<PatternHop> = serde_json::from_value(value)?;
    let normalized = normalize(&hops)?;
    let report = json!({ "patterns": normalized.hops, "keyMap": normalized.key_map });
    emit(format, &report, |_| {
        ui.list("Patterns", normalized.hops.iter().map(describe_hop));
        ui.spacer();
        ui.section(
            "Renamed occurrences",
            normalized
                .key_map
                .iter()
                .filter(|(old, new)| old != new)
                .map(|(old, new)| (old.as_str(), new.as_str())),
        );
    })
}

fn run_validate(input: &Path, format: &OutputFormat, ui: &Ui) -> Result<bool, Box<dyn Error>> {
    let value = read_json(input)?;
    let loaded = QueryConfig::load_metadata(&value);
    let report = match &loaded {
        Ok(config) => json!({
            "valid": true,
            "hops": config.patterns().len(),
            "columns": config.columns().len(),
            "grouped": config.column_set().grouped().len(),
        }),
        Err(err) => json!({
            "valid": false,
            "code": err.code(),
            "message": err.to_string(),
        }),
    };
    emit(format, &report, |_| match &loaded {
        Ok(config) => ui.success(&format!(
            "valid config: {} hops, {} columns",
            config.patterns().len(),
            config.columns().len()
        )),
        Err(err) => ui.warn(&ErrorWithCode(err).to_string()),
    })?;
    Ok(loaded.is_ok())
}

fn run_shape(
    cmd: &ShapeCmd,
    profile: &Profile,
    format: &OutputFormat,
    ui: &Ui,
) -> Result<(), Box<dyn Error>> {
    let payload = read_json(&cmd.input)?;
    let options = ShapeOptions::default()
        .with_hidden(cmd.include_hidden || profile.include_hidden.unwrap_or(false));

    let view = match (&cmd.schemas, cmd.flatten, payload.as_object()) {
        (Some(path), true, Some(record)) => {
            let schemas: Vec<ResultSchema> = serde_json::from_value(read_json(path)?)?;
            let parsed = parse_flattened(record);
            if parsed.is_empty() {
                ResultView::NoData
            } else {
                ResultView::Flattened(shape_flattened(&parsed, &schemas, &options))
            }
        }
        _ => shape_payload(&payload, cmd.flatten, &options),
    };

    emit(format, &view, |_| match &view {
        ResultView::NoData => ui.warn("payload carries no result data"),
        ResultView::Flattened(table) => {
            for group in &table.groups {
                ui.list(
                    &group.label,
                    group.columns.iter().map(|c| format!("{} ({})", c.label, c.path)),
                );
            }
            ui.spacer();
            let headers: Vec<String> = table.columns.iter().map(|c| c.label.clone()).collect();
            let rows: Vec<Vec<Option<String>>> = table
                .rows
                .iter()
                .map(|row| row.cells.iter().map(|cell| cell.as_ref().map(render_cell)).collect())
                .collect();
            ui.table("Rows", &headers, &rows);
            if !table.skipped.is_empty() {
                ui.spacer();
                ui.list("Skipped keys", table.skipped.iter().cloned());
            }
        }
        ResultView::Nested(table) => print_nested(ui, table, ""),
    })
}

fn run_profile(
    cmd: &ProfileCommand,
    config: &mut CliConfig,
    format: &OutputFormat,
    ui: &Ui,
) -> Result<(), Box<dyn Error>> {
    match cmd {
        ProfileCommand::List => {
            let profiles: Vec<&Profile> = config.profiles().collect();
            let default = config.default_profile_name().map(str::to_string);
            let path = config.path().map(|path| path.display().to_string());
            let report = json!({ "config": path, "default": default, "profiles": profiles });
            emit(format, &report, |_| {
                if let Some(path) = &path {
                    ui.section("Config", [("path", path.as_str())]);
                    ui.spacer();
                }
                ui.list(
                    "Profiles",
                    profiles.iter().map(|profile| {
                        if default.as_deref() == Some(profile.name.as_str()) {
                            format!("{} (default)", profile.name)
                        } else {
                            profile.name.clone()
                        }
                    }),
                );
            })?;
        }
        ProfileCommand::Set(set) => {
            let update = ProfileUpdate {
                default_optional: set.default_optional,
                apply_rbac: set.apply_rbac,
                page_limit: set.page_limit,
                pagination_strategy: set.pagination_strategy,
                include_hidden: set.include_hidden,
            };
            config.upsert_profile(&set.name, update)?;
            let path = config.persist()?;
            ui.success(&format!("saved profile '{}' to {}", set.name, path.display()));
        }
        ProfileCommand::Use { name } => {
            config.set_default_profile(Some(name.as_str()))?;
            let path = config.persist()?;
            ui.success(&format!("default profile is now '{name}' ({})", path.display()));
        }
        ProfileCommand::Unset => {
            config.set_default_profile(None)?;
            config.persist()?;
            ui.success("default profile cleared");
        }
        ProfileCommand::Delete { name } => {
            config.delete_profile(name)?;
            config.persist()?;
            ui.success(&format!("deleted profile '{name}'"));
        }
    }
    Ok(())
}

fn print_config_text(ui: &Ui, config: &QueryConfig) {
    ui.list("Patterns", config.patterns().iter().map(describe_hop));
    ui.spacer();
    ui.list(
        "Columns",
        config.columns().iter().map(|column| {
            let group = column
                .group_order
                .map(|order| format!(" group={order}"))
                .unwrap_or_default();
            format!(
                "{}. {}.{}{group}",
                column.select_order, column.schema_id, column.field_id
            )
        }),
    );
    ui.spacer();
    let pagination = config.pagination();
    ui.section(
        "Execution",
        [
            ("applyRBAC", config.apply_rbac().to_string()),
            ("limit", pagination.limit.to_string()),
            ("offset", pagination.offset.to_string()),
            ("strategy", pagination.strategy.to_string()),
        ],
    );
}

fn print_nested(ui: &Ui, table: &NestedTable<'_>, prefix: &str) {
    let title = if prefix.is_empty() {
        table.label.clone()
    } else {
        format!("{prefix} {}", table.label)
    };
    let headers: Vec<String> = table.columns.iter().map(|c| c.label.clone()).collect();
    let rows: Vec<Vec<Option<String>>> = table
        .rows
        .iter()
        .map(|row| row.cells.iter().map(|cell| cell.map(render_cell)).collect())
        .collect();
    ui.table(&title, &headers, &rows);
    for (row_idx, row) in table.rows.iter().enumerate() {
        for child in &row.children {
            ui.spacer();
            print_nested(ui, &child.assemble(), &format!("{prefix}[{row_idx}]"));
        }
    }
}

fn describe_hop(hop: &PatternHop) -> String {
    match hop {
        PatternHop::Root { from } => format!("root {from}"),
        PatternHop::Edge {
            from,
            to,
            edge,
            optional,
        } => {
            let optional = if *optional { " (optional)" } else { "" };
            format!("{from} -[{edge}]-> {to}{optional}")
        }
    }
}

fn render_cell(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn read_patterns(value: &Value) -> Result<Vec<PatternHop>, Box<dyn Error>> {
    if value.is_object() {
        Ok(QueryConfig::load_metadata(value)?.patterns().to_vec())
    } else {
        Ok(serde_json::from_value(value.clone())?)
    }
}

fn read_json(path: &Path) -> Result<Value, Box<dyn Error>> {
    let raw = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(path).map_err(|err| format!("failed to read {}: {err}", path.display()))?
    };
    Ok(serde_json::from_str(&raw)?)
}

fn emit<T, F>(format: &OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: Fn(OutputFormat),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(OutputFormat::Text),
    }
    Ok(())
}
