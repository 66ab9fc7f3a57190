use clap::{Parser, ValueEnum};
use fglue::{
    DEFAULT_TEMPLATE, DirectiveKind, GlueError, MergeRequest, Result, SelectOptions,
    SessionCounters, batch_totals, build_exclude_set, collect_files, extract_batch_rules,
    find_directives, merge, normalize_extensions,
};
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{Level, debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const LONG_HELP: &str = r#"
Directive reference:
  {name} {extension} {filename}    - File name parts
  {path} {folder} {drive} {size}   - Location and size
  {hash:md5} {hash:sha1}           - Content hashes
  {created} {modified} {accessed}  - Timestamps; append :FMT for a custom
                                     strftime format, e.g. {modified:%d.%m.%Y}
  {content} {content:numbered}     - File contents, plain or line-numbered
  {line:N} {lines:A;B} {head:N} {tail:N}
                                   - Line slices (1-based, inclusive)
  {char:N} {chars:A;B} {headchars:N} {tailchars:N}
                                   - Character slices (1-based, inclusive)
  {upper} {lower} {title}          - Case transforms
  {remove_linebreaks} {remove_blank_lines} {remove_whitespaces}
  {remove_spaces} {collapse_spaces}
                                   - Whitespace transforms
  {lines_count} {words_count} {chars_count}
                                   - Per-file statistics
  {counter} {current_files_count} {current_lines_count}
  {current_words_count} {current_chars_count}
                                   - Running statistics
  {total_files_count} {total_lines_count} {total_words_count}
  {total_chars_count}              - Batch totals
  {allow_ext:E1;E2} {skip_ext:E1;E2} {limit_files:N}
                                   - Batch filters
  {show_before} {show_after}       - Lines shown only before the first or
                                     after the last file
  {skip_empty} {skip_binary}       - Skip empty or non-text files
  {_} {nl} {x}                     - Literal space, newline, drop this line

Examples:
  # Merge two files with the default template
  fglue a.txt b.txt
  # Merge a directory using a template file
  fglue src/ --template template.txt -o merged.txt
  # Template from stdin
  echo "{counter}. {filename}{nl}{content}{nl}" | fglue src/ -t -
  # Keep only Rust sources, skip logs
  fglue src/ --ext rs -x '*.log'
  # Check which files would be merged (dry run)
  fglue src/ -t template.txt --dry-run
  # List directives in a template
  fglue -t template.txt --list=detailed

Template example:
  {show_before}===== Merging {total_files_count} files =====
  {counter}. {filename} ({size}, {lines_count} lines)
  {content:numbered}
  {show_after}===== {total_lines_count} lines in total =====
"#;

/// Merge files into one document through a `{directive}` template.
#[derive(Parser, Debug)]
#[command(
    name = "fglue",
    version,
    about = "Merge files into one document through a {directive} template.",
    after_long_help = LONG_HELP
)]
struct Cli {
    /// Files and directories to merge
    #[arg(value_name = "INPUTS", required_unless_present = "list")]
    inputs: Vec<PathBuf>,

    /// Template file driving the merge. Use '-' for stdin.
    #[arg(long, short, value_name = "TEMPLATE", env = "FGLUE_TEMPLATE")]
    template: Option<PathBuf>,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Keep only files with these extensions (repeatable)
    #[arg(short = 'e', long = "ext", value_name = "EXT", action = clap::ArgAction::Append)]
    ext: Vec<String>,

    /// Exclude glob patterns (repeatable). Matched against paths and file names
    #[arg(short = 'x', long = "exclude", value_name = "GLOB", action = clap::ArgAction::Append)]
    exclude: Vec<String>,

    /// Disable compliance with .gitignore files
    #[arg(long)]
    no_gitignore: bool,

    /// Perform a dry run - show which files would be merged
    #[arg(long, conflicts_with = "list")]
    dry_run: bool,

    /// List directives in template (optionally with format: plain, detailed, json)
    #[arg(long, value_name = "FORMAT", num_args = 0..=1, default_missing_value = "plain", conflicts_with = "dry_run")]
    list: Option<ListFormat>,

    /// Increase verbosity (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq)]
enum ListFormat {
    /// Simple list of directives
    Plain,
    /// Detailed information about each directive
    Detailed,
    /// JSON output for scripting
    Json,
}

#[derive(Serialize, Deserialize)]
struct DirectiveInfo {
    directive: String,
    name: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    args: Vec<String>,
    start: usize,
    end: usize,
    recognized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let template_content = match get_template_content(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let result = if let Some(list_format) = cli.list {
        list_directives(&template_content, list_format)
    } else {
        let exclude = match build_exclude_set(&cli.exclude) {
            Ok(set) => set,
            Err(e) => {
                eprintln!("[ERROR] {e}");
                std::process::exit(2);
            }
        };
        let options = SelectOptions {
            extensions: normalize_extensions(&cli.ext),
            exclude,
            use_gitignore: !cli.no_gitignore,
        };
        match collect_files(&cli.inputs, &options) {
            Ok(selected) => {
                if cli.dry_run {
                    dry_run(&template_content, &selected)
                } else {
                    run_merge(&template_content, selected, cli.output.clone())
                }
            }
            Err(e) => Err(e),
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::WARN,
        (false, 1) => Level::INFO,
        (false, 2) => Level::DEBUG,
        (false, _) => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn get_template_content(cli: &Cli) -> Result<String> {
    let template = if let Some(template_path) = &cli.template {
        if template_path.as_path() == Path::new("-") {
            info!("Reading template from stdin...");
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        } else {
            if !template_path.is_file() {
                return Err(GlueError::TemplateNotFound {
                    path: template_path.clone(),
                });
            }
            info!("Reading template from {}", template_path.display());
            std::fs::read_to_string(template_path)?
        }
    } else {
        DEFAULT_TEMPLATE.to_string()
    };

    if template.is_empty() {
        return Err(GlueError::EmptyTemplate);
    }
    Ok(template)
}

fn run_merge(template: &str, selected_paths: Vec<PathBuf>, output: Option<PathBuf>) -> Result<()> {
    debug!("Starting merge...");

    if selected_paths.is_empty() {
        return Err(GlueError::NoFilesSelected);
    }

    let request = MergeRequest {
        selected_paths,
        template: template.to_string(),
    };
    let mut counters = SessionCounters::new();
    let merged = merge(&request, &mut counters)?;

    info!(
        lines = merged.lines().count(),
        words = merged.split_whitespace().count(),
        chars = merged.chars().count(),
        "merged result statistics"
    );

    if let Some(output_path) = output {
        info!("Writing output to {}", output_path.display());
        std::fs::write(output_path, merged)?;
    } else {
        print!("{merged}");
        io::stdout().flush()?;
    }

    info!("Merge complete!");
    Ok(())
}

fn dry_run(template_content: &str, selected: &[PathBuf]) -> Result<()> {
    info!("Performing dry run - checking selection...");

    let (_, rules) = extract_batch_rules(template_content)?;
    let filtered = rules.apply(selected);
    let dropped = selected.len() - filtered.len();

    let mut all_valid = true;
    let mut valid_count = 0;
    let mut invalid_count = 0;

    for path in &filtered {
        if path.is_file() {
            info!("✓ {}", path.display());
            valid_count += 1;
        } else {
            warn!("✗ {} (not found)", path.display());
            invalid_count += 1;
            all_valid = false;
        }
    }

    let totals = batch_totals(&filtered);

    println!("\nSummary: {} files selected", filtered.len());
    if valid_count > 0 {
        println!("  ✓ {valid_count} found");
    }
    if invalid_count > 0 {
        println!("  ✗ {invalid_count} missing");
    }
    if dropped > 0 {
        println!("  {dropped} filtered out by template rules");
    }
    println!(
        "  {} lines, {} words, {} chars to merge",
        totals.lines, totals.words, totals.chars
    );

    if !all_valid {
        std::process::exit(1);
    }

    Ok(())
}

fn list_directives(template_content: &str, format: ListFormat) -> Result<()> {
    debug!("Listing template directives...");

    let directives = find_directives(template_content)?;

    match format {
        ListFormat::Plain => {
            for directive in &directives {
                println!("{}", directive.full);
            }
        }
        ListFormat::Detailed => {
            for directive in &directives {
                println!("Directive: {}", directive.full);
                println!("  Name: {}", directive.name);
                if !directive.args.is_empty() {
                    println!("  Args: {}", directive.args.join(";"));
                }
                println!("  Position: {}..{}", directive.start, directive.end);
                match DirectiveKind::classify(directive) {
                    Some(kind) => println!("  Recognized: yes ({})", kind.token()),
                    None => println!("  Recognized: no (passes through verbatim)"),
                }
                println!();
            }
        }
        ListFormat::Json => {
            let mut infos = Vec::new();
            for directive in &directives {
                let kind = DirectiveKind::classify(directive);
                infos.push(DirectiveInfo {
                    directive: directive.full.clone(),
                    name: directive.name.clone(),
                    args: directive.args.clone(),
                    start: directive.start,
                    end: directive.end,
                    recognized: kind.is_some(),
                    kind: kind.map(|k| k.token().to_string()),
                });
            }
            let json = serde_json::to_string_pretty(&infos)?;
            println!("{json}");
        }
    }

    Ok(())
}
