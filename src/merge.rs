use crate::context::{self, BatchTotals, FileContext, SessionCounters};
use crate::directive::{self, DirectiveKind};
use crate::error::Result;
use crate::render::render;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Template used when the caller supplies none.
pub const DEFAULT_TEMPLATE: &str = "----- {filename} -----{nl}{content}{nl}";

/// One merge invocation: the ordered selection and the template to render.
#[derive(Debug, Clone)]
pub struct MergeRequest {
    /// Files in selection order; batch directives filter this list further.
    pub selected_paths: Vec<PathBuf>,
    /// Template text, batch directives included.
    pub template: String,
}

/// Batch-level rules extracted from the template before per-file rendering.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchRules {
    /// Union of `{allow_ext:...}` values, lowercase without dots. Empty
    /// means every extension is allowed.
    pub allow: Vec<String>,
    /// Union of `{skip_ext:...}` values.
    pub deny: Vec<String>,
    /// `{limit_files:N}` when present and parseable.
    pub limit: Option<usize>,
}

impl BatchRules {
    /// Filters the selection: denied extensions first, then the allow list,
    /// then the optional count limit. Files without an extension survive
    /// every deny rule but never match an allow list.
    pub fn apply(&self, paths: &[PathBuf]) -> Vec<PathBuf> {
        let mut survivors: Vec<PathBuf> = paths
            .iter()
            .filter(|path| !self.denied(path))
            .filter(|path| self.allowed(path))
            .cloned()
            .collect();
        if let Some(limit) = self.limit {
            survivors.truncate(limit);
        }
        survivors
    }

    fn denied(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.deny.contains(&ext))
    }

    fn allowed(&self, path: &Path) -> bool {
        self.allow.is_empty() || extension_of(path).is_some_and(|ext| self.allow.contains(&ext))
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// Scans the template for batch directives and strips their tokens.
///
/// Extension lists union across occurrences. The file limit is read from
/// the first `{limit_files}` occurrence; a missing or unparseable value
/// leaves the selection unlimited. All three tokens are removed from the
/// returned template unconditionally so none of them reaches per-file
/// rendering.
///
/// # Errors
///
/// Returns `GlueError::Regex` if the directive scan pattern fails to
/// compile.
pub fn extract_batch_rules(template: &str) -> Result<(String, BatchRules)> {
    let directives = directive::find_directives(template)?;
    let mut rules = BatchRules::default();

    for d in &directives {
        match DirectiveKind::classify(d) {
            Some(DirectiveKind::AllowExt) => collect_extensions(&d.args, &mut rules.allow),
            Some(DirectiveKind::SkipExt) => collect_extensions(&d.args, &mut rules.deny),
            _ => {}
        }
    }
    rules.limit = directives
        .iter()
        .find(|d| DirectiveKind::classify(d) == Some(DirectiveKind::LimitFiles))
        .and_then(|d| d.args.first())
        .and_then(|raw| raw.trim().parse::<usize>().ok());

    let stripped = directive::strip_token(template, DirectiveKind::SkipExt);
    let stripped = directive::strip_token(&stripped, DirectiveKind::AllowExt);
    let stripped = directive::strip_token(&stripped, DirectiveKind::LimitFiles);

    Ok((stripped, rules))
}

/// Normalizes and unions one occurrence's extension arguments. Leading dots
/// and surrounding whitespace are tolerated; matching is case-insensitive.
fn collect_extensions(args: &[String], into: &mut Vec<String>) {
    for arg in args {
        let ext = arg.trim().trim_start_matches('.').to_lowercase();
        if !ext.is_empty() && !into.contains(&ext) {
            into.push(ext);
        }
    }
}

/// Sums line, word and char counts over the final selection. Each file is
/// read independently here, before any context exists; unreadable or binary
/// files contribute zero.
pub fn batch_totals(paths: &[PathBuf]) -> BatchTotals {
    let mut totals = BatchTotals {
        files: paths.len(),
        ..BatchTotals::default()
    };
    for path in paths {
        let (content, _) = context::read_text(path);
        totals.lines += content.lines().count();
        totals.words += content.split_whitespace().count();
        totals.chars += content.chars().count();
    }
    totals
}

/// Resolves the boundary markers for the file at `index` of `count`.
///
/// `{show_before}` marks lines that appear only before the first file,
/// `{show_after}` lines that appear only after the last. On the first file
/// the after-lines are deleted and the before-tokens stripped in place; on
/// the last file the reverse; middle files lose both lines. A single-file
/// merge takes the first-file branch.
fn position_template(template: &str, index: usize, count: usize) -> String {
    if index == 0 {
        let text = directive::remove_marked_lines(template, DirectiveKind::ShowAfter);
        directive::strip_token(&text, DirectiveKind::ShowBefore)
    } else if index == count - 1 {
        let text = directive::strip_token(template, DirectiveKind::ShowAfter);
        directive::remove_marked_lines(&text, DirectiveKind::ShowBefore)
    } else {
        let text = directive::remove_marked_lines(template, DirectiveKind::ShowBefore);
        directive::remove_marked_lines(&text, DirectiveKind::ShowAfter)
    }
}

/// Merges the selected files into one string.
///
/// Resets the per-merge counter layers, applies batch directives once,
/// precomputes totals over the surviving selection, then renders each file
/// in order with position-sensitive boundary markers and concatenates the
/// results without separators. Per-file read failures degrade to empty
/// fields rather than aborting the merge.
///
/// # Errors
///
/// Returns `GlueError::Regex` if the directive scan pattern fails to
/// compile.
pub fn merge(request: &MergeRequest, counters: &mut SessionCounters) -> Result<String> {
    counters.reset();

    let (template, rules) = extract_batch_rules(&request.template)?;
    let files = rules.apply(&request.selected_paths);
    debug!(
        selected = request.selected_paths.len(),
        surviving = files.len(),
        "applied batch directives"
    );
    counters.set_totals(batch_totals(&files));

    let count = files.len();
    let mut merged = String::new();
    for (index, path) in files.iter().enumerate() {
        let scoped = position_template(&template, index, count);
        let mut ctx = FileContext::new(path, counters);
        merged.push_str(&render(&scoped, &mut ctx));
    }

    info!(files = count, "merge complete");
    Ok(merged)
}
