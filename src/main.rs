use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use log::info;

use sqlprep::config::{apply_env_overrides, MacroMapping, RunConfig};
use sqlprep::encoding::EncodingDetector;
use sqlprep::execution::executor_for;
use sqlprep::hooks::Hooks;
use sqlprep::translate::{CommandInvoker, CopyInvoker, TranslationInvoker, TranslationOutcome};
use sqlprep::workflow::{self, build_router};
use sqlprep::{FragmentKind, HeredocExtractor, PrepError};

#[derive(Parser)]
#[command(name = "sqlprep", version, about = "Heredoc extraction and reversible macro expansion around SQL translation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the heredoc SQL embedded in a shell script
    Extract {
        file: PathBuf,
        /// Command whose heredocs are extracted
        #[arg(long, default_value = "bteq")]
        command: String,
        /// Rewrite this text on each heredoc-opening line
        #[arg(long, requires = "replace_to")]
        replace_from: Option<String>,
        #[arg(long, requires = "replace_from")]
        replace_to: Option<String>,
        /// Print every fragment with its line, kind, and quoting
        #[arg(long)]
        all: bool,
    },
    /// Expand macros in one file and print the result
    Expand(MacroArgs),
    /// Expand then un-expand one file, showing both steps and any warnings
    RoundTrip(MacroArgs),
    /// Preprocess a tree, translate it, and postprocess the output
    Run(RunArgs),
}

#[derive(Args)]
struct MacroArgs {
    file: PathBuf,
    /// YAML macro mapping (`macros: {glob: {token: value}}`)
    #[arg(long, env = "SQLPREP_MACRO_MAPPING_PATH")]
    macros: PathBuf,
    /// Regex with one capture group naming the macro
    #[arg(long)]
    macro_pattern: Option<String>,
    /// Path used for glob routing (defaults to the file name)
    #[arg(long)]
    as_path: Option<String>,
}

#[derive(Args)]
struct RunArgs {
    #[arg(long, env = "SQLPREP_INPUT_PATH")]
    input: PathBuf,
    #[arg(long, env = "SQLPREP_PREPROCESSED_PATH")]
    preprocessed: PathBuf,
    #[arg(long, env = "SQLPREP_TRANSLATED_PATH")]
    translated: PathBuf,
    #[arg(long, env = "SQLPREP_POSTPROCESSED_PATH")]
    postprocessed: PathBuf,
    #[arg(long, env = "SQLPREP_MACRO_MAPPING_PATH")]
    macros: Option<PathBuf>,
    #[arg(long)]
    macro_pattern: Option<String>,
    /// Shell command that translates $SQLPREP_TRANSLATE_INPUT into
    /// $SQLPREP_TRANSLATE_OUTPUT; without it files are copied unchanged
    #[arg(long)]
    translate_cmd: Option<String>,
    /// Worker threads for file tasks (0 runs them inline)
    #[arg(long)]
    workers: Option<usize>,
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Fail on input that is not UTF-8 instead of reading it as ISO-8859-1
    #[arg(long)]
    strict_encoding: bool,
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    match dispatch(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<PrepError>() {
                Some(prep) => eprintln!("error: {}", prep.display_simple()),
                None => eprintln!("error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let env = env_logger::Env::default().filter_or("SQLPREP_LOG", "info");
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}

fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Extract {
            file,
            command,
            replace_from,
            replace_to,
            all,
        } => extract(&file, &command, replace_from.zip(replace_to), all),
        Commands::Expand(args) => expand(&args, false),
        Commands::RoundTrip(args) => expand(&args, true),
        Commands::Run(args) => run(args),
    }
}

fn read_text(path: &Path, detector: EncodingDetector) -> Result<String> {
    let bytes = fs::read(path).map_err(|err| PrepError::io(path, err))?;
    Ok(detector.decode(path, &bytes)?)
}

fn extract(
    file: &Path,
    command: &str,
    replace: Option<(String, String)>,
    all: bool,
) -> Result<()> {
    let extractor = HeredocExtractor::with_replacement(command, replace)?;
    let text = read_text(file, EncodingDetector::default())?;
    let fragments = extractor.read_fragments(&text);
    for fragment in &fragments {
        if all {
            let kind = match fragment.kind {
                FragmentKind::Shell => "shell",
                FragmentKind::Heredoc => "heredoc",
            };
            println!(
                "--- line={} kind={} quoted={}",
                fragment.start_line, kind, fragment.quoted
            );
            print!("{}", fragment.text);
        } else if fragment.kind == FragmentKind::Heredoc {
            print!("{}", fragment.text);
        }
    }
    for warning in extractor.warnings() {
        eprintln!("warning: {warning}");
    }
    Ok(())
}

fn expand(args: &MacroArgs, round_trip: bool) -> Result<()> {
    let mapping = MacroMapping::load(&args.macros)?;
    let router = build_router(&mapping, args.macro_pattern.as_deref())?;
    let key = match &args.as_path {
        Some(path) => path.clone(),
        None => args
            .file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("not a file: {}", args.file.display()))?,
    };
    let text = read_text(&args.file, EncodingDetector::default())?;
    let expanded = router.expand(&key, &text);
    if round_trip {
        let restored = router.un_expand(&key, &expanded);
        println!("--- expanded");
        print!("{expanded}");
        println!("--- restored");
        print!("{restored}");
        if restored != text {
            eprintln!("warning: round trip of {key} did not reproduce the input");
        }
    } else {
        print!("{expanded}");
    }
    for warning in router.all_messages() {
        eprintln!("warning: {warning}");
    }
    Ok(())
}

fn run(args: RunArgs) -> Result<()> {
    let mut config = RunConfig::new(
        args.input,
        args.preprocessed,
        args.translated,
        args.postprocessed,
    );
    config.macro_mapping_path = args.macros;
    apply_env_overrides(&mut config)?;
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(secs) = args.timeout_secs {
        config.translation_timeout = Duration::from_secs(secs);
    }

    let detector = if args.strict_encoding {
        EncodingDetector::strict()
    } else {
        EncodingDetector::default()
    };
    let pipeline = workflow::pipeline_for(&config, Hooks::default(), args.macro_pattern.as_deref())?
        .with_detector(detector);
    let invoker: Box<dyn TranslationInvoker> = match args.translate_cmd {
        Some(command) => Box::new(CommandInvoker::new(command)),
        None => Box::new(CopyInvoker),
    };
    let executor = executor_for(config.workers)?;

    let report = workflow::execute(&config, &pipeline, invoker.as_ref(), executor.as_ref())?;
    info!(
        "run event=summary preprocessed={} copied={} warnings={}",
        report.preprocessed.processed,
        report.preprocessed.copied,
        report.warnings.len()
    );
    match report.translation {
        TranslationOutcome::Completed => {
            if let Some(post) = report.postprocessed {
                println!(
                    "Processed {} file(s); output written to {}",
                    post.processed,
                    config.postprocessed_path.display()
                );
            }
        }
        TranslationOutcome::TimedOut => {
            println!(
                "Translation did not finish within {}s; postprocessing skipped.",
                config.translation_timeout.as_secs()
            );
        }
    }
    Ok(())
}
