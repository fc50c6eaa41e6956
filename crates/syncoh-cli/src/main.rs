// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use syncoh_cli::{AutoCompare, generate_and_compare};
use syncoh_core::{
    Cohort, Estimator, GeneratedCohort, GenerationDiagnostics, GenerationRequest, Indication,
    MissingMechanism, SyncohError,
};
use syncoh_doctor::{CompareConfig, MethodRun, RankingReport, compare};
use syncoh_eval::{QualityReport, ScoreConfig, score};
use syncoh_gen::{
    DistributionModel, GenerationContext, GeneratorMethod, MvnConfig, Phase, RuleConfig, fit,
    generate_with,
};
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;

struct Cli {
    log_level: LevelFilter,
    command: Command,
}

enum Command {
    Fit(FitArgs),
    Generate(GenerateArgs),
    Score(ScoreArgs),
    Compare(CompareArgs),
}

#[derive(Debug)]
struct FitArgs {
    reference: PathBuf,
    output: Option<PathBuf>,
}

/// Options that shape a [`GenerationRequest`] and its context.
#[derive(Debug, Default)]
struct GenerationFlags {
    request: Option<PathBuf>,
    n_per_arm: Option<usize>,
    seed: Option<u64>,
    target_effect: Option<f64>,
    effect_field: Option<String>,
    jitter_frac: Option<f64>,
    missing_rate: Option<f64>,
    mar_driver: Option<String>,
    estimator: Option<Estimator>,
    rules: Option<PathBuf>,
    indication: Option<Indication>,
    phase: Option<Phase>,
    within_subject_correlation: Option<f64>,
}

#[derive(Debug)]
struct GenerateArgs {
    method: GeneratorMethod,
    reference: Option<PathBuf>,
    model: Option<PathBuf>,
    flags: GenerationFlags,
    output: Option<PathBuf>,
}

#[derive(Debug)]
struct ScoreArgs {
    real: PathBuf,
    synthetic: PathBuf,
    config: Option<PathBuf>,
    k: Option<usize>,
    seed: Option<u64>,
    output: Option<PathBuf>,
}

#[derive(Debug)]
struct CompareArgs {
    real: PathBuf,
    runs: Option<PathBuf>,
    methods: Option<Vec<GeneratorMethod>>,
    config: Option<PathBuf>,
    flags: GenerationFlags,
    output: Option<PathBuf>,
}

#[derive(Debug)]
enum CliError {
    Syncoh(SyncohError),
    Io {
        context: String,
        source: std::io::Error,
    },
    Json {
        context: String,
        source: serde_json::Error,
    },
    InvalidInput(String),
}

impl CliError {
    fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Syncoh(err) => err.code(),
            Self::Io { .. } => "io_error",
            Self::Json { .. } => "json_error",
            Self::InvalidInput(_) => "invalid_input",
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syncoh(err) => write!(f, "{err}"),
            Self::Io { context, source } => write!(f, "{context}: {source}"),
            Self::Json { context, source } => write!(f, "{context}: {source}"),
            Self::InvalidInput(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Syncoh(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::InvalidInput(_) => None,
        }
    }
}

impl From<SyncohError> for CliError {
    fn from(value: SyncohError) -> Self {
        Self::Syncoh(value)
    }
}

#[derive(Serialize)]
struct FitOutput<'a> {
    command: &'static str,
    n_reference_records: usize,
    model: &'a DistributionModel,
}

#[derive(Serialize)]
struct GenerateOutput<'a> {
    command: &'static str,
    method: &'static str,
    request: &'a GenerationRequest,
    cohort: &'a Cohort,
    diagnostics: &'a GenerationDiagnostics,
}

#[derive(Serialize)]
struct ScoreOutput<'a> {
    command: &'static str,
    config: &'a ScoreConfig,
    report: &'a QualityReport,
}

#[derive(Serialize)]
struct CompareOutput<'a> {
    command: &'static str,
    config: &'a CompareConfig,
    report: &'a RankingReport,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorPayload,
}

#[derive(Serialize)]
struct ErrorPayload {
    code: String,
    message: String,
}

fn main() {
    if let Err(err) = run() {
        emit_structured_error(&err);
        process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    let Some(cli) = parse_cli(&args)? else {
        return Ok(());
    };
    install_tracing(cli.log_level);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Generate(args) => handle_generate(args),
        Command::Score(args) => handle_score(args),
        Command::Compare(args) => handle_compare(args),
    }
}

fn install_tracing(level: LevelFilter) {
    // A subscriber may already be installed.
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

fn parse_cli(args: &[String]) -> Result<Option<Cli>, CliError> {
    if args.is_empty() || matches!(args[0].as_str(), "-h" | "--help") {
        print_root_help();
        return Ok(None);
    }
    if matches!(args[0].as_str(), "-V" | "--version") {
        print_version();
        return Ok(None);
    }

    let command_name = args[0].as_str();
    let rest = &args[1..];
    if rest
        .iter()
        .any(|arg| matches!(arg.as_str(), "-h" | "--help"))
    {
        print_command_help(command_name)?;
        return Ok(None);
    }

    let (log_level, rest) = extract_log_level(rest)?;
    let command = match command_name {
        "fit" => Command::Fit(parse_fit_args(&rest)?),
        "generate" => Command::Generate(parse_generate_args(&rest)?),
        "score" => Command::Score(parse_score_args(&rest)?),
        "compare" => Command::Compare(parse_compare_args(&rest)?),
        _ => {
            return Err(CliError::invalid_input(format!(
                "unknown command '{command_name}'; expected one of: fit, generate, score, compare"
            )));
        }
    };

    Ok(Some(Cli { log_level, command }))
}

/// Pulls `--log-level` out of the token stream; every subcommand accepts it.
fn extract_log_level(tokens: &[String]) -> Result<(LevelFilter, Vec<String>), CliError> {
    let mut level = LevelFilter::WARN;
    let mut remaining = Vec::with_capacity(tokens.len());
    let mut idx = 0usize;
    while idx < tokens.len() {
        let token = tokens[idx].as_str();
        if token == "--log-level" || token.starts_with("--log-level=") {
            let (flag, inline_value) = split_flag(token)?;
            let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
            level = raw.parse::<LevelFilter>().map_err(|_| {
                CliError::invalid_input(format!(
                    "invalid --log-level '{raw}'; expected one of: off, error, warn, info, debug, trace"
                ))
            })?;
        } else {
            remaining.push(tokens[idx].clone());
        }
        idx += 1;
    }
    Ok((level, remaining))
}

fn parse_fit_args(tokens: &[String]) -> Result<FitArgs, CliError> {
    let mut reference = None;
    let mut output = None;
    let mut idx = 0usize;
    while idx < tokens.len() {
        let (flag, inline_value) = split_flag(tokens[idx].as_str())?;
        match flag {
            "--reference" => {
                reference = Some(PathBuf::from(take_flag_value(
                    flag,
                    inline_value,
                    tokens,
                    &mut idx,
                )?));
            }
            "--output" => {
                output = Some(PathBuf::from(take_flag_value(
                    flag,
                    inline_value,
                    tokens,
                    &mut idx,
                )?));
            }
            other => {
                return Err(CliError::invalid_input(format!(
                    "unknown fit option '{other}'"
                )));
            }
        }
        idx += 1;
    }

    Ok(FitArgs {
        reference: reference
            .ok_or_else(|| CliError::invalid_input("fit requires --reference <path>"))?,
        output,
    })
}

/// Consumes a flag shared by `generate` and `compare`. Returns false when
/// `flag` is not a generation flag.
fn parse_generation_flag(
    flags: &mut GenerationFlags,
    flag: &str,
    inline_value: Option<String>,
    tokens: &[String],
    idx: &mut usize,
) -> Result<bool, CliError> {
    match flag {
        "--request" => {
            flags.request = Some(PathBuf::from(take_flag_value(
                flag,
                inline_value,
                tokens,
                idx,
            )?));
        }
        "--n-per-arm" => {
            let raw = take_flag_value(flag, inline_value, tokens, idx)?;
            flags.n_per_arm = Some(parse_usize_arg(&raw, flag)?);
        }
        "--seed" => {
            let raw = take_flag_value(flag, inline_value, tokens, idx)?;
            flags.seed = Some(parse_u64_arg(&raw, flag)?);
        }
        "--target-effect" => {
            let raw = take_flag_value(flag, inline_value, tokens, idx)?;
            flags.target_effect = Some(parse_f64_arg(&raw, flag)?);
        }
        "--effect-field" => {
            flags.effect_field = Some(take_flag_value(flag, inline_value, tokens, idx)?);
        }
        "--jitter-frac" => {
            let raw = take_flag_value(flag, inline_value, tokens, idx)?;
            flags.jitter_frac = Some(parse_f64_arg(&raw, flag)?);
        }
        "--missing-rate" => {
            let raw = take_flag_value(flag, inline_value, tokens, idx)?;
            flags.missing_rate = Some(parse_f64_arg(&raw, flag)?);
        }
        "--mar-driver" => {
            flags.mar_driver = Some(take_flag_value(flag, inline_value, tokens, idx)?);
        }
        "--estimator" => {
            let raw = take_flag_value(flag, inline_value, tokens, idx)?;
            flags.estimator = Some(Estimator::parse(&raw)?);
        }
        "--rules" => {
            flags.rules = Some(PathBuf::from(take_flag_value(
                flag,
                inline_value,
                tokens,
                idx,
            )?));
        }
        "--indication" => {
            let raw = take_flag_value(flag, inline_value, tokens, idx)?;
            flags.indication = Some(Indication::parse(&raw)?);
        }
        "--phase" => {
            let raw = take_flag_value(flag, inline_value, tokens, idx)?;
            flags.phase = Some(Phase::parse(&raw)?);
        }
        "--within-subject-correlation" => {
            let raw = take_flag_value(flag, inline_value, tokens, idx)?;
            flags.within_subject_correlation = Some(parse_f64_arg(&raw, flag)?);
        }
        _ => return Ok(false),
    }
    Ok(true)
}

fn parse_generate_args(tokens: &[String]) -> Result<GenerateArgs, CliError> {
    let mut method = None;
    let mut reference = None;
    let mut model = None;
    let mut output = None;
    let mut flags = GenerationFlags::default();

    let mut idx = 0usize;
    while idx < tokens.len() {
        let (flag, inline_value) = split_flag(tokens[idx].as_str())?;
        match flag {
            "--method" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                method = Some(GeneratorMethod::parse(&raw)?);
            }
            "--reference" => {
                reference = Some(PathBuf::from(take_flag_value(
                    flag,
                    inline_value,
                    tokens,
                    &mut idx,
                )?));
            }
            "--model" => {
                model = Some(PathBuf::from(take_flag_value(
                    flag,
                    inline_value,
                    tokens,
                    &mut idx,
                )?));
            }
            "--output" => {
                output = Some(PathBuf::from(take_flag_value(
                    flag,
                    inline_value,
                    tokens,
                    &mut idx,
                )?));
            }
            other => {
                if !parse_generation_flag(&mut flags, other, inline_value, tokens, &mut idx)? {
                    return Err(CliError::invalid_input(format!(
                        "unknown generate option '{other}'"
                    )));
                }
            }
        }
        idx += 1;
    }

    let method = method.ok_or_else(|| {
        CliError::invalid_input("generate requires --method <mvn|bootstrap|rule_based>")
    })?;
    Ok(GenerateArgs {
        method,
        reference,
        model,
        flags,
        output,
    })
}

fn parse_score_args(tokens: &[String]) -> Result<ScoreArgs, CliError> {
    let mut real = None;
    let mut synthetic = None;
    let mut config = None;
    let mut k = None;
    let mut seed = None;
    let mut output = None;

    let mut idx = 0usize;
    while idx < tokens.len() {
        let (flag, inline_value) = split_flag(tokens[idx].as_str())?;
        match flag {
            "--real" => {
                real = Some(PathBuf::from(take_flag_value(
                    flag,
                    inline_value,
                    tokens,
                    &mut idx,
                )?));
            }
            "--synthetic" => {
                synthetic = Some(PathBuf::from(take_flag_value(
                    flag,
                    inline_value,
                    tokens,
                    &mut idx,
                )?));
            }
            "--config" => {
                config = Some(PathBuf::from(take_flag_value(
                    flag,
                    inline_value,
                    tokens,
                    &mut idx,
                )?));
            }
            "--k" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                k = Some(parse_usize_arg(&raw, flag)?);
            }
            "--seed" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                seed = Some(parse_u64_arg(&raw, flag)?);
            }
            "--output" => {
                output = Some(PathBuf::from(take_flag_value(
                    flag,
                    inline_value,
                    tokens,
                    &mut idx,
                )?));
            }
            other => {
                return Err(CliError::invalid_input(format!(
                    "unknown score option '{other}'"
                )));
            }
        }
        idx += 1;
    }

    Ok(ScoreArgs {
        real: real.ok_or_else(|| CliError::invalid_input("score requires --real <path>"))?,
        synthetic: synthetic
            .ok_or_else(|| CliError::invalid_input("score requires --synthetic <path>"))?,
        config,
        k,
        seed,
        output,
    })
}

fn parse_compare_args(tokens: &[String]) -> Result<CompareArgs, CliError> {
    let mut real = None;
    let mut runs = None;
    let mut methods = None;
    let mut config = None;
    let mut output = None;
    let mut flags = GenerationFlags::default();

    let mut idx = 0usize;
    while idx < tokens.len() {
        let (flag, inline_value) = split_flag(tokens[idx].as_str())?;
        match flag {
            "--real" => {
                real = Some(PathBuf::from(take_flag_value(
                    flag,
                    inline_value,
                    tokens,
                    &mut idx,
                )?));
            }
            "--runs" => {
                runs = Some(PathBuf::from(take_flag_value(
                    flag,
                    inline_value,
                    tokens,
                    &mut idx,
                )?));
            }
            "--methods" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                methods = Some(parse_method_list(&raw)?);
            }
            "--config" => {
                config = Some(PathBuf::from(take_flag_value(
                    flag,
                    inline_value,
                    tokens,
                    &mut idx,
                )?));
            }
            "--output" => {
                output = Some(PathBuf::from(take_flag_value(
                    flag,
                    inline_value,
                    tokens,
                    &mut idx,
                )?));
            }
            other => {
                if !parse_generation_flag(&mut flags, other, inline_value, tokens, &mut idx)? {
                    return Err(CliError::invalid_input(format!(
                        "unknown compare option '{other}'"
                    )));
                }
            }
        }
        idx += 1;
    }

    if runs.is_some() && methods.is_some() {
        return Err(CliError::invalid_input(
            "compare accepts either --runs or --methods, not both",
        ));
    }
    Ok(CompareArgs {
        real: real.ok_or_else(|| CliError::invalid_input("compare requires --real <path>"))?,
        runs,
        methods,
        config,
        flags,
        output,
    })
}

fn parse_method_list(raw: &str) -> Result<Vec<GeneratorMethod>, CliError> {
    if raw.eq_ignore_ascii_case("all") {
        return Ok(GeneratorMethod::ALL.to_vec());
    }
    let mut methods = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let method = GeneratorMethod::parse(part)?;
        if !methods.contains(&method) {
            methods.push(method);
        }
    }
    if methods.is_empty() {
        return Err(CliError::invalid_input(
            "--methods expects a comma-separated list or 'all'",
        ));
    }
    Ok(methods)
}

fn split_flag(token: &str) -> Result<(&str, Option<String>), CliError> {
    if !token.starts_with("--") {
        return Err(CliError::invalid_input(format!(
            "unexpected positional argument '{token}'; expected --flag value"
        )));
    }
    if let Some((flag, value)) = token.split_once('=') {
        return Ok((flag, Some(value.to_string())));
    }
    Ok((token, None))
}

fn take_flag_value(
    flag: &str,
    inline_value: Option<String>,
    tokens: &[String],
    idx: &mut usize,
) -> Result<String, CliError> {
    if let Some(value) = inline_value {
        return Ok(value);
    }

    *idx += 1;
    let value = tokens
        .get(*idx)
        .ok_or_else(|| CliError::invalid_input(format!("{flag} requires a value")))?;
    // Negative numbers are values, other dashed tokens are options.
    if value.starts_with("--") {
        return Err(CliError::invalid_input(format!(
            "{flag} requires a value, but got option '{value}'"
        )));
    }
    Ok(value.clone())
}

fn parse_usize_arg(raw: &str, flag: &str) -> Result<usize, CliError> {
    raw.parse::<usize>().map_err(|_| {
        CliError::invalid_input(format!(
            "{flag} expects a non-negative integer, got '{raw}'"
        ))
    })
}

fn parse_u64_arg(raw: &str, flag: &str) -> Result<u64, CliError> {
    raw.parse::<u64>().map_err(|_| {
        CliError::invalid_input(format!(
            "{flag} expects a non-negative integer, got '{raw}'"
        ))
    })
}

fn parse_f64_arg(raw: &str, flag: &str) -> Result<f64, CliError> {
    raw.parse::<f64>()
        .map_err(|_| CliError::invalid_input(format!("{flag} expects a number, got '{raw}'")))
}

fn print_version() {
    println!("syncoh {}", env!("CARGO_PKG_VERSION"));
}

fn print_root_help() {
    println!(
        "syncoh {}\n\nUSAGE:\n  syncoh <COMMAND> [OPTIONS]\n\nCOMMANDS:\n  fit        Fit per-arm, per-visit distributions to a reference cohort\n  generate   Generate a synthetic cohort with one method\n  score      Score a synthetic cohort against a real cohort\n  compare    Rank generation methods on quality, speed, and external similarity\n\nGLOBAL OPTIONS:\n  --log-level <off|error|warn|info|debug|trace>   Default: warn (logs go to stderr)\n  -h, --help                                      Show help\n  -V, --version                                   Show version\n\nRun 'syncoh <COMMAND> --help' for subcommand options.",
        env!("CARGO_PKG_VERSION")
    );
}

const GENERATION_FLAGS_HELP: &str = "  --request <path>                       GenerationRequest JSON; flags below override it\n  --n-per-arm <usize>                    Default: 50\n  --seed <u64>                           Default: 42\n  --target-effect <float>                Active minus placebo at the terminal visit\n  --effect-field <name>                  Default: SystolicBP\n  --jitter-frac <float>                  Bootstrap noise fraction. Default: 0.05\n  --missing-rate <float>                 Fraction of values nulled after sampling\n  --mar-driver <field>                   Use MAR missingness driven by this field\n  --estimator <mean|knn[:k]|mice[:iters]>\n  --rules <path>                         RuleConfig JSON for rule_based\n  --indication <hypertension|diabetes|oncology|general>   Built-in rules\n  --phase <I|II|III|IV>                  Built-in range spread. Default: III\n  --within-subject-correlation <float>   MVN override in [0, 1)";

fn print_command_help(command: &str) -> Result<(), CliError> {
    match command {
        "fit" => {
            println!(
                "USAGE:\n  syncoh fit --reference <cohort.json> [OPTIONS]\n\nOPTIONS:\n  --reference <path>   Required reference cohort JSON\n  --output <path>      Write JSON output to file"
            );
            Ok(())
        }
        "generate" => {
            println!(
                "USAGE:\n  syncoh generate --method <mvn|bootstrap|rule_based> [OPTIONS]\n\nOPTIONS:\n  --method <name>                        Required\n  --reference <path>                     Reference cohort JSON (bootstrap; mvn fits it when --model is absent)\n  --model <path>                         Fitted model JSON from 'syncoh fit'\n{GENERATION_FLAGS_HELP}\n  --output <path>                        Write JSON output to file"
            );
            Ok(())
        }
        "score" => {
            println!(
                "USAGE:\n  syncoh score --real <cohort.json> --synthetic <cohort.json> [OPTIONS]\n\nOPTIONS:\n  --real <path>        Required real cohort JSON\n  --synthetic <path>   Required synthetic cohort JSON (or 'syncoh generate' output)\n  --config <path>      ScoreConfig JSON\n  --k <usize>          Imputation neighbours. Default: 5\n  --seed <u64>         Masking seed. Default: 42\n  --output <path>      Write JSON output to file"
            );
            Ok(())
        }
        "compare" => {
            println!(
                "USAGE:\n  syncoh compare --real <cohort.json> [--runs <runs.json> | --methods <list|all>] [OPTIONS]\n\nOPTIONS:\n  --real <path>                          Required real cohort JSON\n  --runs <path>                          Object of method name -> {{cohort, generation_time_ms, external_similarity}}\n  --methods <list|all>                   Generate these methods from --real instead of --runs\n  --config <path>                        CompareConfig JSON\n{GENERATION_FLAGS_HELP}\n  --output <path>                        Write JSON output to file"
            );
            Ok(())
        }
        _ => Err(CliError::invalid_input(format!(
            "unknown command '{command}'; expected one of: fit, generate, score, compare"
        ))),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), CliError> {
    let reference = load_cohort(&args.reference)?;
    let model = fit(&reference)?;
    write_json_output(
        &FitOutput {
            command: "fit",
            n_reference_records: reference.len(),
            model: &model,
        },
        args.output.as_deref(),
    )
}

fn build_request(flags: &GenerationFlags) -> Result<GenerationRequest, CliError> {
    let mut request = match &flags.request {
        Some(path) => read_json_document::<GenerationRequest>(path, None)?,
        None => GenerationRequest::default(),
    };
    if let Some(n) = flags.n_per_arm {
        request.n_per_arm = n;
    }
    if let Some(seed) = flags.seed {
        request.seed = seed;
    }
    if let Some(field) = &flags.effect_field {
        request.effect_field = field.clone();
    }
    if let Some(effect) = flags.target_effect {
        request.target_effect = Some(effect);
    }
    if let Some(jitter) = flags.jitter_frac {
        request.jitter_frac = jitter;
    }
    if let Some(rate) = flags.missing_rate {
        request.missing_rate = rate;
    }
    if let Some(driver) = &flags.mar_driver {
        request.missing_mechanism = MissingMechanism::Mar {
            driver: driver.clone(),
        };
    }
    if let Some(estimator) = flags.estimator {
        request.estimator = Some(estimator);
    }
    request.validate()?;
    Ok(request)
}

fn build_rules(flags: &GenerationFlags) -> Result<Option<RuleConfig>, CliError> {
    match (&flags.rules, flags.indication) {
        (Some(_), Some(_)) => Err(CliError::invalid_input(
            "--rules and --indication are mutually exclusive",
        )),
        (Some(path), None) => {
            let rules = read_json_document::<RuleConfig>(path, Some("rules"))?;
            rules.validate()?;
            Ok(Some(rules))
        }
        (None, Some(indication)) => Ok(Some(RuleConfig::for_indication(
            indication,
            flags.phase.unwrap_or_default(),
        ))),
        (None, None) => Ok(None),
    }
}

fn build_mvn_config(flags: &GenerationFlags) -> Result<MvnConfig, CliError> {
    let config = MvnConfig {
        within_subject_correlation: flags.within_subject_correlation,
    };
    config.validate()?;
    Ok(config)
}

fn handle_generate(args: GenerateArgs) -> Result<(), CliError> {
    let request = build_request(&args.flags)?;
    let rules = build_rules(&args.flags)?;
    let mvn = build_mvn_config(&args.flags)?;
    let reference = args.reference.as_deref().map(load_cohort).transpose()?;

    let model = match (&args.model, &reference) {
        (Some(path), _) => Some(read_json_document::<DistributionModel>(path, Some("model"))?),
        (None, Some(reference)) if args.method == GeneratorMethod::Mvn => Some(fit(reference)?),
        _ => None,
    };

    let mut context = GenerationContext::new().with_mvn_config(mvn);
    if let Some(reference) = reference.as_ref() {
        context = context.with_reference(reference);
    }
    if let Some(model) = model.as_ref() {
        context = context.with_model(model);
    }
    if let Some(rules) = rules.as_ref() {
        context = context.with_rules(rules);
    }

    let GeneratedCohort {
        cohort,
        diagnostics,
    } = generate_with(args.method, &request, &context)?;
    write_json_output(
        &GenerateOutput {
            command: "generate",
            method: args.method.as_str(),
            request: &request,
            cohort: &cohort,
            diagnostics: &diagnostics,
        },
        args.output.as_deref(),
    )
}

fn handle_score(args: ScoreArgs) -> Result<(), CliError> {
    let real = load_cohort(&args.real)?;
    let synthetic = load_cohort(&args.synthetic)?;
    let mut config = match &args.config {
        Some(path) => read_json_document::<ScoreConfig>(path, None)?,
        None => ScoreConfig::default(),
    };
    if let Some(k) = args.k {
        config.k = k;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    let report = score(&real, &synthetic, &config)?;
    write_json_output(
        &ScoreOutput {
            command: "score",
            config: &config,
            report: &report,
        },
        args.output.as_deref(),
    )
}

fn handle_compare(args: CompareArgs) -> Result<(), CliError> {
    let real = load_cohort(&args.real)?;
    let config = match &args.config {
        Some(path) => read_json_document::<CompareConfig>(path, None)?,
        None => CompareConfig::default(),
    };

    let report = match &args.runs {
        Some(path) => {
            let runs = read_json_document::<BTreeMap<String, MethodRun>>(path, Some("runs"))?;
            debug!(methods = runs.len(), "loaded method runs");
            compare(&runs, &real, &config)?
        }
        None => {
            let rules = build_rules(&args.flags)?;
            let methods = match &args.methods {
                Some(methods) => methods.clone(),
                None if rules.is_some() => GeneratorMethod::ALL.to_vec(),
                None => vec![GeneratorMethod::Mvn, GeneratorMethod::Bootstrap],
            };
            let plan = AutoCompare {
                methods,
                request: build_request(&args.flags)?,
                rules: rules.as_ref(),
                mvn: build_mvn_config(&args.flags)?,
                config,
            };
            generate_and_compare(&real, &plan)?
        }
    };

    write_json_output(
        &CompareOutput {
            command: "compare",
            config: &config,
            report: &report,
        },
        args.output.as_deref(),
    )
}

fn read_json_value(path: &Path) -> Result<Value, CliError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| CliError::io(format!("failed to read '{}'", path.display()), source))?;
    serde_json::from_str(raw.as_str())
        .map_err(|source| CliError::json(format!("invalid JSON in '{}'", path.display()), source))
}

/// Decodes `path`, unwrapping `envelope_key` when the document is a CLI
/// output envelope rather than the bare payload.
fn read_json_document<T: DeserializeOwned>(
    path: &Path,
    envelope_key: Option<&str>,
) -> Result<T, CliError> {
    let value = read_json_value(path)?;
    let payload = match envelope_key {
        Some(key) => unwrap_envelope(value, key),
        None => value,
    };
    serde_json::from_value(payload)
        .map_err(|source| CliError::json(format!("failed to decode '{}'", path.display()), source))
}

fn unwrap_envelope(value: Value, key: &str) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("command") && map.contains_key(key) => {
            map.remove(key).unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn load_cohort(path: &Path) -> Result<Cohort, CliError> {
    read_json_document::<Cohort>(path, Some("cohort"))
}

fn write_json_output<T: Serialize>(
    payload: &T,
    output_path: Option<&Path>,
) -> Result<(), CliError> {
    let encoded = serde_json::to_string_pretty(payload)
        .map_err(|source| CliError::json("failed to serialize JSON output", source))?;

    if let Some(path) = output_path {
        fs::write(path, format!("{encoded}\n"))
            .map_err(|source| CliError::io(format!("failed to write '{}'", path.display()), source))
    } else {
        println!("{encoded}");
        Ok(())
    }
}

fn emit_structured_error(err: &CliError) {
    let envelope = ErrorEnvelope {
        error: ErrorPayload {
            code: err.code().to_string(),
            message: err.to_string(),
        },
    };

    match serde_json::to_string_pretty(&envelope) {
        Ok(json) => eprintln!("{json}"),
        Err(_) => eprintln!(
            "{{\"error\":{{\"code\":\"{}\",\"message\":\"{}\"}}}}",
            err.code(),
            err
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CliError, Command, GenerationFlags, build_request, build_rules, extract_log_level,
        parse_cli, parse_method_list, unwrap_envelope,
    };
    use serde_json::json;
    use syncoh_core::{Estimator, Indication, MissingMechanism};
    use syncoh_gen::GeneratorMethod;
    use tracing_subscriber::filter::LevelFilter;

    fn tokens(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn generate_args_accept_inline_and_spaced_values() {
        let cli = parse_cli(&tokens(&[
            "generate",
            "--method=bootstrap",
            "--reference",
            "ref.json",
            "--n-per-arm",
            "25",
            "--target-effect",
            "-5.0",
            "--estimator",
            "knn:3",
            "--log-level=debug",
        ]))
        .expect("arguments should parse")
        .expect("command expected");
        assert_eq!(cli.log_level, LevelFilter::DEBUG);
        let Command::Generate(args) = cli.command else {
            panic!("expected generate command");
        };
        assert_eq!(args.method, GeneratorMethod::Bootstrap);
        assert_eq!(args.flags.n_per_arm, Some(25));
        assert_eq!(args.flags.target_effect, Some(-5.0));
        assert_eq!(args.flags.estimator, Some(Estimator::Knn { k: 3 }));
    }

    #[test]
    fn unknown_options_and_commands_are_invalid_input() {
        let err = parse_cli(&tokens(&["score", "--real", "a.json", "--bogus", "1"]))
            .err()
            .expect("unknown flag must fail");
        assert_eq!(err.code(), "invalid_input");
        let err = parse_cli(&tokens(&["detect"])).err().expect("unknown command");
        assert!(err.to_string().contains("fit, generate, score, compare"));
    }

    #[test]
    fn missing_required_flags_are_reported() {
        let err = parse_cli(&tokens(&["generate"])).err().expect("method required");
        assert!(err.to_string().contains("--method"));
        let err = parse_cli(&tokens(&["score", "--real", "a.json"]))
            .err()
            .expect("synthetic required");
        assert!(err.to_string().contains("--synthetic"));
    }

    #[test]
    fn log_level_is_validated() {
        let (level, rest) = extract_log_level(&tokens(&["--real", "a", "--log-level", "info"]))
            .expect("level should parse");
        assert_eq!(level, LevelFilter::INFO);
        assert_eq!(rest, tokens(&["--real", "a"]));
        assert!(extract_log_level(&tokens(&["--log-level", "loud"])).is_err());
    }

    #[test]
    fn flags_override_request_defaults() {
        let flags = GenerationFlags {
            n_per_arm: Some(10),
            seed: Some(7),
            missing_rate: Some(0.1),
            mar_driver: Some("HeartRate".to_string()),
            ..GenerationFlags::default()
        };
        let request = build_request(&flags).expect("request should build");
        assert_eq!(request.n_per_arm, 10);
        assert_eq!(request.seed, 7);
        assert_eq!(
            request.missing_mechanism,
            MissingMechanism::Mar {
                driver: "HeartRate".to_string()
            }
        );

        let invalid = GenerationFlags {
            n_per_arm: Some(0),
            ..GenerationFlags::default()
        };
        let err = build_request(&invalid).expect_err("n_per_arm=0 must fail");
        assert_eq!(err.code(), "invalid_configuration");
    }

    #[test]
    fn builtin_rules_follow_indication() {
        let flags = GenerationFlags {
            indication: Some(Indication::Diabetes),
            ..GenerationFlags::default()
        };
        let rules = build_rules(&flags)
            .expect("rules should build")
            .expect("rules expected");
        assert_eq!(rules.schedule.terminal(), "Week 26");
        assert!(build_rules(&GenerationFlags::default()).expect("ok").is_none());
    }

    #[test]
    fn method_lists_deduplicate_and_expand_all() {
        assert_eq!(
            parse_method_list("all").expect("all is valid"),
            GeneratorMethod::ALL.to_vec()
        );
        assert_eq!(
            parse_method_list("mvn, bootstrap,mvn").expect("list is valid"),
            vec![GeneratorMethod::Mvn, GeneratorMethod::Bootstrap]
        );
        assert!(parse_method_list(",").is_err());
    }

    #[test]
    fn envelopes_are_unwrapped_only_for_cli_outputs() {
        let wrapped = json!({"command": "generate", "cohort": {"records": []}});
        assert_eq!(unwrap_envelope(wrapped, "cohort"), json!({"records": []}));
        let bare = json!({"schedule": ["Baseline"], "records": []});
        assert_eq!(unwrap_envelope(bare.clone(), "cohort"), bare);
    }

    #[test]
    fn syncoh_errors_keep_their_code() {
        let err = CliError::from(syncoh_core::SyncohError::schema_mismatch("fields differ"));
        assert_eq!(err.code(), "schema_mismatch");
        assert_eq!(err.to_string(), "schema mismatch: fields differ");
    }
}
