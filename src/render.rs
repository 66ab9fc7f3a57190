use crate::context::{DEFAULT_TIME_FORMAT, FileContext, human_size};
use crate::directive::{self, DirectiveKind};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// One pipeline stage; fully resolves its directive family over the text.
type RenderPass = fn(String, &mut FileContext) -> String;

/// The fixed resolution pipeline.
///
/// The order is observable: passes interact through content mutation, so a
/// transform directive always reshapes content before any emission directive
/// reads it, wherever the tokens sit in the template.
const PIPELINE: [RenderPass; 8] = [
    identity_pass,
    hash_pass,
    timestamp_pass,
    literal_pass,
    marked_line_pass,
    transform_pass,
    emission_pass,
    statistics_pass,
];

/// Renders one template against one file context.
///
/// Returns the fully substituted text, or an empty string when a skip
/// directive applies to this file. Unknown directives pass through
/// verbatim, and text inserted by a directive is never expanded again by
/// the pass that produced it.
pub fn render(template: &str, ctx: &mut FileContext) -> String {
    if skip_requested(template, ctx) {
        debug!(path = %ctx.path().display(), "skip directive matched, omitting file");
        return String::new();
    }

    let mut text = directive::strip_token(template, DirectiveKind::SkipEmpty);
    text = directive::strip_token(&text, DirectiveKind::SkipBinary);
    for pass in PIPELINE {
        text = pass(text, ctx);
    }
    text
}

/// `{skip_empty}` omits files with empty content, `{skip_binary}` omits
/// files whose bytes were not valid UTF-8.
fn skip_requested(template: &str, ctx: &FileContext) -> bool {
    (directive::contains(template, DirectiveKind::SkipEmpty) && ctx.content().is_empty())
        || (directive::contains(template, DirectiveKind::SkipBinary) && !ctx.is_text())
}

fn identity_pass(text: String, ctx: &mut FileContext) -> String {
    let text = directive::substitute(&text, DirectiveKind::Name, |_| ctx.name());
    let text = directive::substitute(&text, DirectiveKind::Extension, |_| ctx.extension());
    let text = directive::substitute(&text, DirectiveKind::Filename, |_| ctx.filename());
    let text = directive::substitute(&text, DirectiveKind::Path, |_| ctx.display_path());
    let text = directive::substitute(&text, DirectiveKind::Folder, |_| ctx.folder());
    let text = directive::substitute(&text, DirectiveKind::Drive, |_| ctx.drive());
    directive::substitute(&text, DirectiveKind::Size, |_| {
        ctx.size().map(human_size).unwrap_or_default()
    })
}

fn hash_pass(text: String, ctx: &mut FileContext) -> String {
    let text = directive::substitute(&text, DirectiveKind::HashMd5, |_| ctx.hash_md5());
    directive::substitute(&text, DirectiveKind::HashSha1, |_| ctx.hash_sha1())
}

/// Timestamp directives consume their payload verbatim, so `;` is allowed
/// inside a strftime pattern.
fn timestamp_pass(text: String, ctx: &mut FileContext) -> String {
    let text = directive::substitute(&text, DirectiveKind::Created, |args| {
        ctx.created(args.raw().unwrap_or(DEFAULT_TIME_FORMAT))
    });
    let text = directive::substitute(&text, DirectiveKind::Modified, |args| {
        ctx.modified(args.raw().unwrap_or(DEFAULT_TIME_FORMAT))
    });
    directive::substitute(&text, DirectiveKind::Accessed, |args| {
        ctx.accessed(args.raw().unwrap_or(DEFAULT_TIME_FORMAT))
    })
}

fn literal_pass(text: String, _ctx: &mut FileContext) -> String {
    let text = directive::substitute(&text, DirectiveKind::Space, |_| " ".to_string());
    directive::substitute(&text, DirectiveKind::Newline, |_| "\n".to_string())
}

/// `{x}` deletes its whole template line, which pairs with batch and skip
/// directives to keep their lines out of the output.
fn marked_line_pass(text: String, _ctx: &mut FileContext) -> String {
    directive::remove_marked_lines(&text, DirectiveKind::DropLine)
}

fn transform_pass(text: String, ctx: &mut FileContext) -> String {
    let text = apply_transform(&text, DirectiveKind::Upper, ctx, |content| {
        content.to_uppercase()
    });
    let text = apply_transform(&text, DirectiveKind::Lower, ctx, |content| {
        content.to_lowercase()
    });
    let text = apply_transform(&text, DirectiveKind::Title, ctx, title_case);
    let text = apply_transform(&text, DirectiveKind::RemoveLinebreaks, ctx, |content| {
        content.chars().filter(|&c| c != '\n' && c != '\r').collect()
    });
    let text = apply_transform(&text, DirectiveKind::RemoveBlankLines, ctx, drop_blank_lines);
    let text = apply_transform(&text, DirectiveKind::RemoveWhitespaces, ctx, |content| {
        content.split_whitespace().collect::<Vec<_>>().join(" ")
    });
    let text = apply_transform(&text, DirectiveKind::RemoveSpaces, ctx, |content| {
        content.replace(' ', "")
    });
    apply_transform(&text, DirectiveKind::CollapseSpaces, ctx, collapse_space_runs)
}

/// Runs one content transform: every occurrence of the token reapplies the
/// transform to the held content and erases itself from the template.
fn apply_transform(
    text: &str,
    kind: DirectiveKind,
    ctx: &mut FileContext,
    transform: impl Fn(&str) -> String,
) -> String {
    directive::substitute(text, kind, |_| {
        let updated = transform(&ctx.content);
        ctx.content = updated;
        String::new()
    })
}

fn emission_pass(text: String, ctx: &mut FileContext) -> String {
    let text = directive::substitute(&text, DirectiveKind::ContentNumbered, |_| {
        ctx.lines()
            .iter()
            .enumerate()
            .map(|(index, line)| format!("{}: {line}", index + 1))
            .collect::<Vec<_>>()
            .join("\n")
    });
    let text = directive::substitute(&text, DirectiveKind::Content, |_| {
        ctx.content().to_string()
    });

    let text = directive::substitute(&text, DirectiveKind::Line, |args| {
        match parse_index(args.first()) {
            Some(n) if n >= 1 && n <= ctx.lines().len() => ctx.lines()[n - 1].clone(),
            _ => String::new(),
        }
    });
    let text = directive::substitute(&text, DirectiveKind::Lines, |args| {
        let (Some(start), Some(end)) = (parse_index(args.first()), parse_index(args.get(1)))
        else {
            return String::new();
        };
        line_range(ctx.lines(), start, end)
    });
    let text = directive::substitute(&text, DirectiveKind::Head, |args| {
        match parse_index(args.first()) {
            Some(n) => ctx.lines()[..n.min(ctx.lines().len())].join("\n"),
            None => String::new(),
        }
    });
    let text = directive::substitute(&text, DirectiveKind::Tail, |args| {
        match parse_index(args.first()) {
            Some(n) if n > 0 => {
                let lines = ctx.lines();
                lines[lines.len() - n.min(lines.len())..].join("\n")
            }
            _ => String::new(),
        }
    });

    let text = directive::substitute(&text, DirectiveKind::Char, |args| {
        match parse_index(args.first()) {
            Some(n) if n >= 1 => ctx
                .content()
                .chars()
                .nth(n - 1)
                .map(String::from)
                .unwrap_or_default(),
            _ => String::new(),
        }
    });
    let text = directive::substitute(&text, DirectiveKind::Chars, |args| {
        let (Some(start), Some(end)) = (parse_index(args.first()), parse_index(args.get(1)))
        else {
            return String::new();
        };
        char_range(ctx.content(), start, end)
    });
    let text = directive::substitute(&text, DirectiveKind::HeadChars, |args| {
        match parse_index(args.first()) {
            Some(n) => ctx.content().chars().take(n).collect(),
            None => String::new(),
        }
    });
    directive::substitute(&text, DirectiveKind::TailChars, |args| {
        match parse_index(args.first()) {
            Some(n) if n > 0 => {
                let total = ctx.content().chars().count();
                ctx.content().chars().skip(total.saturating_sub(n)).collect()
            }
            _ => String::new(),
        }
    })
}

fn statistics_pass(text: String, ctx: &mut FileContext) -> String {
    let text = directive::substitute(&text, DirectiveKind::LinesCount, |_| {
        ctx.lines_count().to_string()
    });
    let text = directive::substitute(&text, DirectiveKind::WordsCount, |_| {
        ctx.words_count().to_string()
    });
    let text = directive::substitute(&text, DirectiveKind::CharsCount, |_| {
        ctx.chars_count().to_string()
    });

    let text = directive::substitute(&text, DirectiveKind::Counter, |_| {
        ctx.ordinal().to_string()
    });
    let text = directive::substitute(&text, DirectiveKind::CurrentFilesCount, |_| {
        ctx.running().files.to_string()
    });
    let text = directive::substitute(&text, DirectiveKind::CurrentLinesCount, |_| {
        ctx.running().lines.to_string()
    });
    let text = directive::substitute(&text, DirectiveKind::CurrentWordsCount, |_| {
        ctx.running().words.to_string()
    });
    let text = directive::substitute(&text, DirectiveKind::CurrentCharsCount, |_| {
        ctx.running().chars.to_string()
    });

    let text = directive::substitute(&text, DirectiveKind::TotalFilesCount, |_| {
        ctx.totals().files.to_string()
    });
    let text = directive::substitute(&text, DirectiveKind::TotalLinesCount, |_| {
        ctx.totals().lines.to_string()
    });
    let text = directive::substitute(&text, DirectiveKind::TotalWordsCount, |_| {
        ctx.totals().words.to_string()
    });
    directive::substitute(&text, DirectiveKind::TotalCharsCount, |_| {
        ctx.totals().chars.to_string()
    })
}

/// Permissive numeric argument parsing: anything that is not a plain
/// non-negative integer counts as absent and the directive resolves empty.
fn parse_index(arg: Option<&str>) -> Option<usize> {
    arg.and_then(|raw| raw.parse::<usize>().ok())
}

/// 1-based inclusive line range. The end clamps to the last line; a zero or
/// out-of-range start, or an inverted range, resolves empty.
fn line_range(lines: &[String], start: usize, end: usize) -> String {
    if start == 0 || start > lines.len() {
        return String::new();
    }
    let end = end.min(lines.len());
    if end < start {
        return String::new();
    }
    lines[start - 1..end].join("\n")
}

/// 1-based inclusive character range over the current content, counted in
/// characters rather than bytes.
fn char_range(content: &str, start: usize, end: usize) -> String {
    if start == 0 || end < start {
        return String::new();
    }
    content
        .chars()
        .skip(start - 1)
        .take(end - start + 1)
        .collect()
}

/// Uppercases every alphabetic character that follows a non-alphabetic one
/// and lowercases the rest.
fn title_case(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut prev_alphabetic = false;
    for c in content.chars() {
        if c.is_alphabetic() {
            if prev_alphabetic {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alphabetic = true;
        } else {
            out.push(c);
            prev_alphabetic = false;
        }
    }
    out
}

/// Removes whitespace-only lines, keeping the terminators of surviving
/// lines intact.
fn drop_blank_lines(content: &str) -> String {
    content
        .split_inclusive('\n')
        .filter(|line| !line.trim().is_empty())
        .collect()
}

/// Two or more consecutive spaces or tabs, collapsed by `{collapse_spaces}`.
static SPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("invalid space-run pattern"));

fn collapse_space_runs(content: &str) -> String {
    SPACE_RUNS.replace_all(content, " ").into_owned()
}
