//! Expression-template compiler binary
//!
//! Reads a JSON list of expression records (either a bare array or a full
//! graph state with an `expressions.list` field), compiles it under the
//! given namespace, and writes the compiled template JSON.

use clap::Parser;
use desmod::{
    compile_template_with_options, CompileOptions, ExpressionRecord, Result, TemplateError, NAME,
    VERSION,
};
use std::fs;
use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug)]
#[command(
    name = "desmodc",
    version,
    about = "Compile an expression list into a namespaced, parameterized template module"
)]
struct Cli {
    /// Input JSON file: an expression-record array or a full graph state
    input: PathBuf,

    /// Namespace token injected into every identifier and subscript
    #[arg(short, long)]
    namespace: String,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pretty-print the compiled JSON
    #[arg(long)]
    pretty: bool,

    /// Enable extra per-phase logging
    #[arg(long)]
    debug: bool,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("{NAME} v{VERSION}: compilation failed: {e}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let source = fs::read_to_string(&cli.input)?;
    let records = parse_records(&source)?;

    let options = CompileOptions {
        debug_mode: cli.debug,
        ..Default::default()
    };
    let (template, stats) = compile_template_with_options(&records, &cli.namespace, options)?;

    let json = if cli.pretty {
        serde_json::to_string_pretty(&template)?
    } else {
        serde_json::to_string(&template)?
    };

    match &cli.output {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    log::info!(
        "compiled {} record(s), {} formula(s), {} default parameter(s)",
        stats.record_count,
        stats.formula_count,
        stats.parameter_count
    );
    Ok(())
}

/// Accept either a bare record array or a saved graph state, which nests the
/// list under `expressions.list`.
fn parse_records(source: &str) -> Result<Vec<ExpressionRecord>> {
    use serde::de::Error as _;

    if let Ok(records) = serde_json::from_str::<Vec<ExpressionRecord>>(source) {
        return Ok(records);
    }
    let state: serde_json::Value = serde_json::from_str(source)?;
    let list = state.pointer("/expressions/list").cloned().ok_or_else(|| {
        TemplateError::Json(serde_json::Error::custom(
            "expected a record array or a graph state with expressions.list",
        ))
    })?;
    Ok(serde_json::from_value(list)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_bare_array_and_graph_state() {
        let array = r#"[{"id": "a", "latex": "a_{1}=2"}]"#;
        assert_eq!(parse_records(array).unwrap().len(), 1);

        let state = r#"{"version": 9, "expressions": {"list": [{"id": "a"}]}}"#;
        assert_eq!(parse_records(state).unwrap().len(), 1);

        assert!(parse_records(r#"{"no": "records"}"#).is_err());
    }

    #[test]
    fn compiles_file_to_file() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("state.json");
        let output = dir.path().join("module.json");
        fs::write(
            &input,
            r##"[{"id": "slider", "latex": "s_{peed}=1", "color": "#2d70b3"}]"##,
        )
        .unwrap();

        let cli = Cli {
            input: input.clone(),
            namespace: "bar1".into(),
            output: Some(output.clone()),
            pretty: false,
            debug: false,
        };
        run(&cli).unwrap();

        let compiled: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(compiled["expressions"][0]["id"], "bar1 slider");
        assert_eq!(
            compiled["expressions"][0]["latex"],
            "s_{peedbar1}=${s_{peed}}"
        );
        assert_eq!(compiled["defaultValues"]["s_{peed}"], 1.0);
    }
}
