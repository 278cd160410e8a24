use std::io::{self, Read, Write};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser as ClapParser, Subcommand};
use formula_expr::{tokenize, ExprError, ParseOptions, Parser, TypeRegistry, Value};
use serde::Serialize;

#[derive(Debug, ClapParser)]
#[command(name = "formula-expr")]
#[command(about = "Evaluate formula-expr formulas against the built-in types.")]
struct Cli {
    /// Emit a JSON report instead of plain text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse, compile and evaluate a formula.
    Eval(EvalArgs),
    /// Print the tokens of a formula.
    Tokens(FormulaArg),
    /// Print the bound tree of a formula, fully parenthesized.
    Print(FormulaArg),
}

#[derive(Debug, clap::Args)]
struct FormulaArg {
    /// Formula text. If omitted, reads it from stdin.
    formula: Option<String>,
}

#[derive(Debug, clap::Args)]
struct EvalArgs {
    #[command(flatten)]
    input: FormulaArg,

    /// Maximum nesting of groups, unary operators and argument lists.
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=256))]
    max_depth: Option<u16>,

    /// Maximum formula length in bytes.
    #[arg(long)]
    max_len: Option<usize>,
}

#[derive(Debug, Serialize)]
struct Report {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    r#type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tokens: Option<Vec<TokenReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ExprError>,
}

impl Report {
    fn failed(error: ExprError) -> Self {
        Self {
            ok: false,
            r#type: None,
            value: None,
            output: None,
            tokens: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Serialize)]
struct TokenReport {
    kind: String,
    start: usize,
    end: usize,
}

fn read_formula(arg: &FormulaArg) -> io::Result<String> {
    match &arg.formula {
        Some(formula) => Ok(formula.clone()),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf.trim_end_matches(['\r', '\n']).to_string())
        }
    }
}

fn json_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Unit => serde_json::Value::Null,
        Value::Bool(v) => serde_json::Value::Bool(*v),
        Value::Int(v) => serde_json::Value::from(*v),
        Value::Float(v) => serde_json::Number::from_f64(f64::from(*v))
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        Value::Double(v) => serde_json::Number::from_f64(*v)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        other => serde_json::Value::String(other.to_string()),
    }
}

/// `error: message` followed by the formula with the offending bytes underlined.
fn render_error(formula: &str, err: &ExprError) -> String {
    let start = err.position().min(formula.len());
    let width = err.snippet(formula).chars().count().max(1);
    let indent = formula.get(..start).map_or(0, |s| s.chars().count());
    format!(
        "error: {}\n  {formula}\n  {}{}",
        err.message,
        " ".repeat(indent),
        "^".repeat(width)
    )
}

fn registry() -> Arc<TypeRegistry> {
    Arc::new(TypeRegistry::with_builtins())
}

fn run(command: &Command, formula: &str) -> Report {
    match command {
        Command::Eval(args) => {
            let defaults = ParseOptions::default();
            let options = ParseOptions {
                max_depth: args.max_depth.map_or(defaults.max_depth, usize::from),
                max_formula_len: args.max_len.unwrap_or(defaults.max_formula_len),
                ..defaults
            };
            let mut parser = Parser::new(registry()).with_options(options);
            let result = parser.compile(formula).and_then(|compiled| {
                let value = compiled.evaluate()?;
                Ok((compiled.result_type().to_string(), value))
            });
            match result {
                Ok((ty, value)) => Report {
                    ok: true,
                    r#type: Some(ty),
                    value: Some(json_value(&value)),
                    output: Some(value.to_string()),
                    tokens: None,
                    error: None,
                },
                Err(err) => Report::failed(err),
            }
        }
        Command::Tokens(_) => match tokenize(formula) {
            Ok(tokens) => Report {
                ok: true,
                r#type: None,
                value: None,
                output: None,
                tokens: Some(
                    tokens
                        .into_iter()
                        .map(|token| TokenReport {
                            kind: format!("{:?}", token.kind),
                            start: token.span.start,
                            end: token.span.end,
                        })
                        .collect(),
                ),
                error: None,
            },
            Err(err) => Report::failed(err),
        },
        Command::Print(_) => match Parser::new(registry()).parse(formula) {
            Ok(expr) => Report {
                ok: true,
                r#type: Some(expr.ty.to_string()),
                value: None,
                output: Some(expr.to_string()),
                tokens: None,
                error: None,
            },
            Err(err) => Report::failed(err),
        },
    }
}

fn emit(cli: &Cli, formula: &str, report: &Report) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if cli.json {
        let json = serde_json::to_string(report).map_err(io::Error::other)?;
        return writeln!(out, "{json}");
    }
    if let Some(err) = &report.error {
        return writeln!(io::stderr(), "{}", render_error(formula, err));
    }
    if let Some(tokens) = &report.tokens {
        for token in tokens {
            writeln!(out, "{}..{} {}", token.start, token.end, token.kind)?;
        }
    }
    if let Some(output) = &report.output {
        writeln!(out, "{output}")?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let input = match &cli.command {
        Command::Eval(args) => &args.input,
        Command::Tokens(arg) | Command::Print(arg) => arg,
    };
    let formula = match read_formula(input) {
        Ok(formula) => formula,
        Err(err) => {
            eprintln!("error: failed to read formula: {err}");
            return ExitCode::FAILURE;
        }
    };

    let report = run(&cli.command, &formula);
    match emit(&cli, &formula, &report) {
        Ok(()) => {}
        // A closed pipe just means the reader lost interest.
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {}
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    }
    if report.ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
