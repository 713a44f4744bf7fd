mod wizard;

use clap::{Parser, Subcommand, ValueEnum};
use component_form::{
    Surface, render_json_ui as component_render_json_ui,
    render_text as component_render_text, submit_all,
};
use form_spec::{
    AnswerOutcome, AnswerSet, CompiledForm, EngineConfig, FormEngine, RenderField, RenderPayload,
    RenderStatus, ValidationResult, build_render_payload,
};
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::Level;
use wizard::{PromptContext, Verbosity, WizardPresenter, parse_answer};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Campaign form CLI",
    long_about = "Compiles form schemas, evaluates answers and fills forms in a text shell"
)]
struct Cli {
    /// Emit debug logs on stderr.
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RenderMode {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SurfaceArg {
    Authoring,
    Preview,
    Public,
}

impl From<SurfaceArg> for Surface {
    fn from(value: SurfaceArg) -> Self {
        match value {
            SurfaceArg::Authoring => Surface::AuthoringPreview,
            SurfaceArg::Preview => Surface::AuthenticatedPreview,
            SurfaceArg::Public => Surface::PublicSubmission,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Compile a schema document and print the compiled form.
    Compile {
        /// Path to the JSON schema document.
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
        /// Write the compiled form here instead of stdout.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Turn a compiled form back into a schema document.
    Decompile {
        /// Path to a compiled form produced by `compile`.
        #[arg(long, value_name = "FORM")]
        form: PathBuf,
    },
    /// Show visible fields, eligible options and errors for a set of answers.
    Evaluate {
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
        /// Engine configuration JSON (reset policy, geographic hierarchy).
        #[arg(long, value_name = "CONFIG")]
        config: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
        #[arg(long, value_enum, default_value_t = SurfaceArg::Preview)]
        surface: SurfaceArg,
    },
    /// Validate an answers file against a schema.
    Validate {
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
        #[arg(long, value_name = "CONFIG")]
        config: Option<PathBuf>,
    },
    /// Submit a whole answer set the way a consuming surface would.
    Submit {
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
        #[arg(long, value_name = "CONFIG")]
        config: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = SurfaceArg::Public)]
        surface: SurfaceArg,
    },
    /// Report schema problems and expressions that would fall open.
    Lint {
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
    },
    /// Fill a form interactively, one field at a time.
    Fill {
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
        /// Optional JSON file containing initial answers.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
        #[arg(long, value_name = "CONFIG")]
        config: Option<PathBuf>,
        /// Show statuses and visible fields between prompts.
        #[arg(long)]
        show_state: bool,
        /// Also emit answer JSON on completion.
        #[arg(long)]
        answers_json: bool,
    },
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    let max_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(max_level)
        .init();

    match cli.command {
        Command::Compile { schema, out } => run_compile(&schema, out.as_deref()),
        Command::Decompile { form } => run_decompile(&form),
        Command::Evaluate {
            schema,
            answers,
            config,
            format,
            surface,
        } => run_evaluate(
            &schema,
            answers.as_deref(),
            config.as_deref(),
            format,
            surface.into(),
        ),
        Command::Validate {
            schema,
            answers,
            config,
        } => run_validate(&schema, &answers, config.as_deref()),
        Command::Submit {
            schema,
            answers,
            config,
            surface,
        } => run_submit(&schema, &answers, config.as_deref(), surface.into()),
        Command::Lint { schema } => run_lint(&schema),
        Command::Fill {
            schema,
            answers,
            config,
            show_state,
            answers_json,
        } => run_fill(
            &schema,
            answers.as_deref(),
            config.as_deref(),
            show_state,
            answers_json,
        ),
    }
}

fn read_json(path: &Path) -> CliResult<Value> {
    let text = fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {}", path.display(), err))?;
    let value = serde_json::from_str(&text)
        .map_err(|err| format!("failed to parse {}: {}", path.display(), err))?;
    Ok(value)
}

fn load_config(config_path: Option<&Path>) -> CliResult<EngineConfig> {
    match config_path {
        Some(path) => Ok(serde_json::from_value(read_json(path)?)?),
        None => Ok(EngineConfig::default()),
    }
}

fn load_engine(schema_path: &Path, config_path: Option<&Path>) -> CliResult<FormEngine> {
    let schema = read_json(schema_path)?;
    Ok(FormEngine::from_value(&schema, load_config(config_path)?))
}

fn load_answers(answers_path: Option<&Path>) -> CliResult<AnswerSet> {
    match answers_path {
        Some(path) => Ok(AnswerSet::from_value(&read_json(path)?)),
        None => Ok(AnswerSet::new()),
    }
}

/// Builds the config string the component surface expects.
fn component_config(schema_path: &Path, config_path: Option<&Path>) -> CliResult<String> {
    let schema_json = fs::read_to_string(schema_path)
        .map_err(|err| format!("failed to read {}: {}", schema_path.display(), err))?;
    let engine = serde_json::to_value(load_config(config_path)?)?;
    Ok(json!({ "schema_json": schema_json, "engine": engine }).to_string())
}

fn parse_component_result(response: &str) -> CliResult<Value> {
    let value: Value = serde_json::from_str(response)?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        Err(error.into())
    } else {
        Ok(value)
    }
}

fn run_compile(schema_path: &Path, out: Option<&Path>) -> CliResult<()> {
    let engine = load_engine(schema_path, None)?;
    for diagnostic in &engine.form().diagnostics {
        eprintln!("warning: {}: {}", diagnostic.field, diagnostic.message);
    }
    let compiled = serde_json::to_string_pretty(engine.form())?;
    match out {
        Some(path) => {
            fs::write(path, compiled)?;
            println!(
                "Compiled {} field(s) to {}",
                engine.form().fields.len(),
                path.display()
            );
        }
        None => println!("{}", compiled),
    }
    Ok(())
}

fn run_decompile(form_path: &Path) -> CliResult<()> {
    let form: CompiledForm = serde_json::from_value(read_json(form_path)?)?;
    println!("{}", serde_json::to_string_pretty(&form.to_document())?);
    Ok(())
}

fn run_evaluate(
    schema_path: &Path,
    answers_path: Option<&Path>,
    config_path: Option<&Path>,
    format: RenderMode,
    surface: Surface,
) -> CliResult<()> {
    let config = component_config(schema_path, config_path)?;
    let answers = load_answers(answers_path)?.to_value().to_string();
    match format {
        RenderMode::Text => {
            let output = component_render_text(&config, &answers);
            // Errors come back as a JSON object instead of text.
            if output.starts_with('{') {
                parse_component_result(&output)?;
            }
            println!("{}", output);
        }
        RenderMode::Json => {
            let ui = parse_component_result(&component_render_json_ui(surface, &config, &answers))?;
            println!("{}", serde_json::to_string_pretty(&ui)?);
        }
    }
    Ok(())
}

fn run_validate(
    schema_path: &Path,
    answers_path: &Path,
    config_path: Option<&Path>,
) -> CliResult<()> {
    let engine = load_engine(schema_path, config_path)?;
    let answers = load_answers(Some(answers_path))?;

    let result = engine.validate(&answers);
    println!(
        "Validation result: {}",
        if result.valid { "valid" } else { "invalid" }
    );
    describe_validation(&result);

    if result.valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn describe_validation(result: &ValidationResult) {
    if !result.errors.is_empty() {
        println!("Errors:");
        for error in &result.errors {
            println!(
                "  {} - {}",
                error.field.as_deref().unwrap_or("<unknown>"),
                error.message
            );
        }
    }
    if !result.missing_required.is_empty() {
        println!(
            "Missing required answers: {}",
            result.missing_required.join(", ")
        );
    }
    if !result.unknown_fields.is_empty() {
        println!(
            "Unknown answer fields: {}",
            result.unknown_fields.join(", ")
        );
    }
}

fn run_submit(
    schema_path: &Path,
    answers_path: &Path,
    config_path: Option<&Path>,
    surface: Surface,
) -> CliResult<()> {
    let config = component_config(schema_path, config_path)?;
    let answers = load_answers(Some(answers_path))?.to_value().to_string();
    let response = parse_component_result(&submit_all(surface, &config, &answers))?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    if response["status"] == "error" {
        Err("submission rejected".into())
    } else {
        Ok(())
    }
}

fn run_lint(schema_path: &Path) -> CliResult<()> {
    let engine = load_engine(schema_path, None)?;
    let diagnostics = engine.lint();
    if diagnostics.is_empty() {
        println!("No problems found.");
        return Ok(());
    }
    for diagnostic in &diagnostics {
        println!("{}: {}", diagnostic.field, diagnostic.message);
    }
    Err(format!("{} problem(s) found", diagnostics.len()).into())
}

fn run_fill(
    schema_path: &Path,
    answers_path: Option<&Path>,
    config_path: Option<&Path>,
    show_state: bool,
    answers_json: bool,
) -> CliResult<()> {
    let engine = load_engine(schema_path, config_path)?;
    let mut session = match answers_path {
        Some(path) => engine.session_with(load_answers(Some(path))?),
        None => engine.session(),
    };
    let mut presenter = WizardPresenter::new(Verbosity::from_verbose(show_state), answers_json);
    // Optional fields the user left blank; not asked again unless cleared.
    let mut skipped: BTreeSet<String> = BTreeSet::new();
    let mut evaluation = session.evaluate();

    loop {
        let payload = build_render_payload(engine.form(), session.answers(), &evaluation);
        presenter.show_header(&payload);
        presenter.show_status(&payload);

        let Some(field) = next_prompt(&payload, &skipped) else {
            if payload.status == RenderStatus::Complete {
                presenter.show_completion(session.answers());
                return Ok(());
            }
            return Err("form is incomplete and no field can be asked".into());
        };

        let prompt = PromptContext::new(field, &payload.progress);
        let value = prompt_field(&prompt, field, &presenter)?;
        if value.is_null() {
            skipped.insert(field.name.clone());
        }

        let update = session.set_answer(&field.name, value)?;
        match &update.outcome {
            AnswerOutcome::Accepted { cleared } => {
                presenter.show_cleared(cleared);
                for name in cleared {
                    skipped.remove(name);
                }
            }
            AnswerOutcome::Rejected { error } => presenter.show_rejection(&error.message),
        }
        evaluation = update.evaluation;
    }
}

/// First visible field holding an error, or unanswered and not skipped.
fn next_prompt<'p>(
    payload: &'p RenderPayload,
    skipped: &BTreeSet<String>,
) -> Option<&'p RenderField> {
    payload
        .groups
        .iter()
        .flat_map(|group| group.fields.iter())
        .find(|field| {
            field.error.is_some()
                || (field.current_value.is_none() && !skipped.contains(&field.name))
        })
}

fn prompt_field(
    prompt: &PromptContext,
    field: &RenderField,
    presenter: &WizardPresenter,
) -> CliResult<Value> {
    loop {
        presenter.show_prompt(prompt);
        let input = prompt_line("> ")?.ok_or("input ended before the form was complete")?;
        if input.eq_ignore_ascii_case("exit") {
            return Err("fill aborted by user".into());
        }

        match parse_answer(field, &input) {
            Ok(value) => return Ok(value),
            Err(err) => presenter.show_parse_error(&err),
        }
    }
}

/// Reads one trimmed line; `None` once stdin is exhausted.
fn prompt_line(prompt: &str) -> CliResult<Option<String>> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}
