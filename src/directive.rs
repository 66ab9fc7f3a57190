use crate::error::Result;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

/// A directive occurrence found in a template.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    /// The full token including braces
    pub full: String,
    /// Directive name between `{` and `}` or `:`
    pub name: String,
    /// Arguments from the `:` payload, split on `;` (empty when no payload)
    pub args: Vec<String>,
    /// Starting position in the template
    pub start: usize,
    /// Ending position in the template
    pub end: usize,
}

/// Finds all directives in the given template text.
///
/// A directive is `{name}` or `{name:payload}` where the name is one or more
/// ASCII letters, digits or underscores and the payload is any non-empty run
/// of characters other than `}`. `{name:}` carries an empty payload and is
/// not a directive. Unknown names are still reported so callers can decide
/// what to do with them.
///
/// # Errors
///
/// Returns `GlueError::Regex` if there's an error compiling the scan pattern.
pub fn find_directives(template: &str) -> Result<Vec<Directive>> {
    let pattern = Regex::new(r"\{([A-Za-z0-9_]+)(?::([^}]+))?\}")?;
    let mut directives = Vec::new();

    for capture in pattern.captures_iter(template) {
        if let Some(full) = capture.get(0)
            && let Some(name) = capture.get(1)
        {
            let args = capture.get(2).map_or_else(Vec::new, |payload| {
                payload.as_str().split(';').map(str::to_string).collect()
            });

            directives.push(Directive {
                full: full.as_str().to_string(),
                name: name.as_str().to_string(),
                args,
                start: full.start(),
                end: full.end(),
            });
        }
    }

    Ok(directives)
}

/// Every directive name the engine recognizes.
///
/// Plain variants match `{token}` or `{token:args}`. Compound variants carry
/// a fixed suffix as part of their token (`{hash:md5}`) and take precedence
/// over the plain directive sharing their prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    Name,
    Extension,
    Filename,
    Path,
    Folder,
    Drive,
    Size,
    HashMd5,
    HashSha1,
    Created,
    Modified,
    Accessed,
    Space,
    Newline,
    DropLine,
    Upper,
    Lower,
    Title,
    RemoveLinebreaks,
    RemoveBlankLines,
    RemoveWhitespaces,
    RemoveSpaces,
    CollapseSpaces,
    ContentNumbered,
    Content,
    Line,
    Lines,
    Head,
    Tail,
    Char,
    Chars,
    HeadChars,
    TailChars,
    LinesCount,
    WordsCount,
    CharsCount,
    Counter,
    CurrentFilesCount,
    CurrentLinesCount,
    CurrentWordsCount,
    CurrentCharsCount,
    TotalFilesCount,
    TotalLinesCount,
    TotalWordsCount,
    TotalCharsCount,
    SkipEmpty,
    SkipBinary,
    AllowExt,
    SkipExt,
    LimitFiles,
    ShowBefore,
    ShowAfter,
}

impl DirectiveKind {
    /// All recognized directives, in resolution order.
    pub const ALL: &'static [Self] = &[
        Self::Name,
        Self::Extension,
        Self::Filename,
        Self::Path,
        Self::Folder,
        Self::Drive,
        Self::Size,
        Self::HashMd5,
        Self::HashSha1,
        Self::Created,
        Self::Modified,
        Self::Accessed,
        Self::Space,
        Self::Newline,
        Self::DropLine,
        Self::Upper,
        Self::Lower,
        Self::Title,
        Self::RemoveLinebreaks,
        Self::RemoveBlankLines,
        Self::RemoveWhitespaces,
        Self::RemoveSpaces,
        Self::CollapseSpaces,
        Self::ContentNumbered,
        Self::Content,
        Self::Line,
        Self::Lines,
        Self::Head,
        Self::Tail,
        Self::Char,
        Self::Chars,
        Self::HeadChars,
        Self::TailChars,
        Self::LinesCount,
        Self::WordsCount,
        Self::CharsCount,
        Self::Counter,
        Self::CurrentFilesCount,
        Self::CurrentLinesCount,
        Self::CurrentWordsCount,
        Self::CurrentCharsCount,
        Self::TotalFilesCount,
        Self::TotalLinesCount,
        Self::TotalWordsCount,
        Self::TotalCharsCount,
        Self::SkipEmpty,
        Self::SkipBinary,
        Self::AllowExt,
        Self::SkipExt,
        Self::LimitFiles,
        Self::ShowBefore,
        Self::ShowAfter,
    ];

    /// Literal token text between the braces. Compound directives include
    /// their fixed suffix.
    pub const fn token(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Extension => "extension",
            Self::Filename => "filename",
            Self::Path => "path",
            Self::Folder => "folder",
            Self::Drive => "drive",
            Self::Size => "size",
            Self::HashMd5 => "hash:md5",
            Self::HashSha1 => "hash:sha1",
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Accessed => "accessed",
            Self::Space => "_",
            Self::Newline => "nl",
            Self::DropLine => "x",
            Self::Upper => "upper",
            Self::Lower => "lower",
            Self::Title => "title",
            Self::RemoveLinebreaks => "remove_linebreaks",
            Self::RemoveBlankLines => "remove_blank_lines",
            Self::RemoveWhitespaces => "remove_whitespaces",
            Self::RemoveSpaces => "remove_spaces",
            Self::CollapseSpaces => "collapse_spaces",
            Self::ContentNumbered => "content:numbered",
            Self::Content => "content",
            Self::Line => "line",
            Self::Lines => "lines",
            Self::Head => "head",
            Self::Tail => "tail",
            Self::Char => "char",
            Self::Chars => "chars",
            Self::HeadChars => "headchars",
            Self::TailChars => "tailchars",
            Self::LinesCount => "lines_count",
            Self::WordsCount => "words_count",
            Self::CharsCount => "chars_count",
            Self::Counter => "counter",
            Self::CurrentFilesCount => "current_files_count",
            Self::CurrentLinesCount => "current_lines_count",
            Self::CurrentWordsCount => "current_words_count",
            Self::CurrentCharsCount => "current_chars_count",
            Self::TotalFilesCount => "total_files_count",
            Self::TotalLinesCount => "total_lines_count",
            Self::TotalWordsCount => "total_words_count",
            Self::TotalCharsCount => "total_chars_count",
            Self::SkipEmpty => "skip_empty",
            Self::SkipBinary => "skip_binary",
            Self::AllowExt => "allow_ext",
            Self::SkipExt => "skip_ext",
            Self::LimitFiles => "limit_files",
            Self::ShowBefore => "show_before",
            Self::ShowAfter => "show_after",
        }
    }

    /// Boundary markers match case-insensitively; every other name is exact.
    const fn case_insensitive(self) -> bool {
        matches!(self, Self::ShowBefore | Self::ShowAfter)
    }

    /// Maps a parsed occurrence to the directive it names, if any.
    ///
    /// Compound tokens are tried first so the plain `content` directive does
    /// not swallow `content:numbered`.
    pub fn classify(directive: &Directive) -> Option<Self> {
        for kind in Self::ALL {
            if let Some((prefix, suffix)) = kind.token().split_once(':')
                && directive.name == prefix
                && directive.args.len() == 1
                && directive.args[0] == suffix
            {
                return Some(*kind);
            }
        }

        Self::ALL.iter().copied().find(|kind| {
            let token = kind.token();
            if token.contains(':') {
                return false;
            }
            if kind.case_insensitive() {
                directive.name.eq_ignore_ascii_case(token)
            } else {
                directive.name == token
            }
        })
    }
}

/// Per-directive token matcher: `{token}` or `{token:payload}`, with the
/// payload as capture group 1. Compiled once on first use.
static TOKEN_PATTERNS: LazyLock<HashMap<DirectiveKind, Regex>> = LazyLock::new(|| {
    DirectiveKind::ALL
        .iter()
        .map(|&kind| {
            let flags = if kind.case_insensitive() { "(?i)" } else { "" };
            let pattern = format!(
                r"{}\{{{}(?::([^}}]+))?\}}",
                flags,
                regex::escape(kind.token())
            );
            let regex = Regex::new(&pattern).expect("invalid directive token pattern");
            (kind, regex)
        })
        .collect()
});

/// Per-directive whole-line matcher: any line containing the token, line
/// break included. The payload is optional and may be empty here, so a bare
/// `{x:}` still marks its line.
static LINE_PATTERNS: LazyLock<HashMap<DirectiveKind, Regex>> = LazyLock::new(|| {
    DirectiveKind::ALL
        .iter()
        .map(|&kind| {
            let flags = if kind.case_insensitive() { "(?i)" } else { "" };
            let pattern = format!(
                r"{}.*\{{{}(?::[^}}]*)?\}}.*\n?",
                flags,
                regex::escape(kind.token())
            );
            let regex = Regex::new(&pattern).expect("invalid directive line pattern");
            (kind, regex)
        })
        .collect()
});

/// Arguments attached to one directive occurrence.
///
/// Keeps both the split items and the raw payload: most resolvers consume
/// positional items, timestamp formats consume the payload verbatim so that
/// `;` may appear inside a format string.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ArgList {
    raw: Option<String>,
    items: Vec<String>,
}

impl ArgList {
    fn from_payload(payload: Option<&str>) -> Self {
        payload.map_or_else(Self::default, |raw| Self {
            raw: Some(raw.to_string()),
            items: raw.split(';').map(str::to_string).collect(),
        })
    }

    /// The full `:` payload, if one was supplied.
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// Positional argument by index.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.items.get(index).map(String::as_str)
    }

    /// First positional argument.
    pub fn first(&self) -> Option<&str> {
        self.get(0)
    }
}

/// Replaces every occurrence of one directive with the resolver's output.
///
/// The resolver receives the occurrence's arguments; its output is inserted
/// verbatim, with no further directive expansion of the replacement text.
/// Text that does not match the directive is left untouched.
pub fn substitute<F>(text: &str, kind: DirectiveKind, mut resolve: F) -> String
where
    F: FnMut(&ArgList) -> String,
{
    let Some(pattern) = TOKEN_PATTERNS.get(&kind) else {
        return text.to_string();
    };
    pattern
        .replace_all(text, |caps: &Captures<'_>| {
            let args = ArgList::from_payload(caps.get(1).map(|m| m.as_str()));
            resolve(&args)
        })
        .into_owned()
}

/// Removes the directive token itself, keeping the rest of its line.
pub fn strip_token(text: &str, kind: DirectiveKind) -> String {
    substitute(text, kind, |_| String::new())
}

/// Deletes every line containing the directive, line break included.
pub fn remove_marked_lines(text: &str, kind: DirectiveKind) -> String {
    let Some(pattern) = LINE_PATTERNS.get(&kind) else {
        return text.to_string();
    };
    pattern.replace_all(text, "").into_owned()
}

/// True when the directive occurs anywhere in the text.
pub fn contains(text: &str, kind: DirectiveKind) -> bool {
    TOKEN_PATTERNS
        .get(&kind)
        .is_some_and(|pattern| pattern.is_match(text))
}
