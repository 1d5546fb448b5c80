use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use alert_workflow::serialization;
use alert_workflow::{ImportFormat, NodeCatalog, WorkflowResult, validate};

#[derive(Parser)]
#[command(name = "alert-workflow", version, about = "Alert workflow graph tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a workflow file and print the findings.
    Check {
        /// Workflow JSON in any supported shape.
        file: PathBuf,
    },
    /// Read a workflow in any supported shape and rewrite it.
    Convert {
        /// Workflow JSON in any supported shape.
        input: PathBuf,
        /// Destination file; stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Target shape.
        #[arg(short, long, value_enum, default_value_t = Shape::Document)]
        to: Shape,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Shape {
    /// Full document with positions, exit points and metadata.
    Document,
    /// Flat adjacency-list hand-off shape.
    Flat,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Check { file } => check(&file),
        Command::Convert { input, output, to } => convert(&input, output.as_deref(), to),
    };
    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn check(file: &Path) -> WorkflowResult<ExitCode> {
    let imported = serialization::load_from_file(file)?;
    let report = validate::validate(&imported.graph, &NodeCatalog::builtin());

    println!(
        "{}: {} nodes, {} edges, {} format",
        file.display(),
        imported.graph.nodes.len(),
        imported.graph.edges.len(),
        shape_name(imported.format),
    );
    if report.is_valid() {
        println!("valid");
        return Ok(ExitCode::SUCCESS);
    }
    for (index, error) in report.errors.iter().enumerate() {
        println!("{:>3}. {error}", index + 1);
    }
    println!("{} problem(s) found", report.errors.len());
    Ok(ExitCode::FAILURE)
}

fn convert(input: &Path, output: Option<&Path>, to: Shape) -> WorkflowResult<ExitCode> {
    let imported = serialization::load_from_file(input)?;
    let variables = imported.variables.unwrap_or_default();

    let json = match to {
        Shape::Document => {
            let mut document = serialization::graph_to_document(
                &imported.graph,
                &NodeCatalog::builtin(),
                imported.name.as_deref().unwrap_or(""),
                imported.description.as_deref(),
                &variables,
            );
            document.workflow_id = imported.workflow_id;
            if imported.metadata.is_some() {
                document.metadata = imported.metadata;
            }
            serde_json::to_string_pretty(&document)?
        }
        Shape::Flat => {
            let flat = serialization::graph_to_flat(
                &imported.graph,
                imported.workflow_id.as_deref(),
                &variables,
            );
            serde_json::to_string_pretty(&flat)?
        }
    };

    match output {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{json}"),
    }
    Ok(ExitCode::SUCCESS)
}

fn shape_name(format: ImportFormat) -> &'static str {
    match format {
        ImportFormat::Document => "document",
        ImportFormat::FlatPositioned => "flat (with positions)",
        ImportFormat::FlatGrid => "flat",
    }
}
