use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use md5::Md5;
use sha1::{Digest, Sha1};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

/// Timestamp pattern used when `{created}`, `{modified}` or `{accessed}`
/// carry no format argument.
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Best-effort text read used by file contexts and batch totals.
///
/// Returns the decoded content and whether the bytes were valid UTF-8.
/// Unreadable files and undecodable bytes both yield empty content.
pub(crate) fn read_text(path: &Path) -> (String, bool) {
    match fs::read(path) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(content) => (content, true),
            Err(_) => {
                debug!(path = %path.display(), "not valid UTF-8, treating as binary");
                (String::new(), false)
            }
        },
        Err(err) => {
            warn!(path = %path.display(), %err, "unreadable file, treating as empty");
            (String::new(), true)
        }
    }
}

/// Totals over the final selection of one merge, computed before any file
/// is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchTotals {
    pub files: usize,
    pub lines: usize,
    pub words: usize,
    pub chars: usize,
}

/// Counters accumulated through the files rendered so far, this file
/// included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunningCounts {
    pub files: usize,
    pub lines: usize,
    pub words: usize,
    pub chars: usize,
}

/// Session-wide counter state threaded through merges.
///
/// Two layers with different lifetimes: the file ordinal behind `{counter}`
/// keeps growing across merges on the same session, while the running
/// `current_*` layer and the batch totals are cleared at the start of every
/// merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCounters {
    files_counter: usize,
    current: RunningCounts,
    totals: BatchTotals,
}

impl SessionCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the per-merge layers. The file ordinal deliberately survives:
    /// it numbers files across every merge of the session.
    pub fn reset(&mut self) {
        self.current = RunningCounts::default();
        self.totals = BatchTotals::default();
    }

    /// Stores the totals computed over the final file list of a merge.
    pub fn set_totals(&mut self, totals: BatchTotals) {
        self.totals = totals;
    }

    /// Registers one file and returns its ordinal plus the running counts
    /// accumulated through it.
    fn record(&mut self, lines: usize, words: usize, chars: usize) -> (usize, RunningCounts) {
        self.files_counter += 1;
        self.current.files += 1;
        self.current.lines += lines;
        self.current.words += words;
        self.current.chars += chars;
        (self.files_counter, self.current)
    }

    /// Ordinal of the most recently registered file.
    pub fn files_counter(&self) -> usize {
        self.files_counter
    }

    /// Running counts accumulated so far in the current merge.
    pub fn current(&self) -> RunningCounts {
        self.current
    }

    /// Totals of the current merge's final selection.
    pub fn totals(&self) -> BatchTotals {
        self.totals
    }
}

/// One file's content and metadata during a merge.
///
/// Construction reads the file once, splits it into lines and registers it
/// with the session counters; the counter layers visible to directives are
/// snapshotted here. The line list stays frozen afterwards, while `content`
/// is mutated in place by content transforms.
#[derive(Debug)]
pub struct FileContext {
    path: PathBuf,
    pub(crate) content: String,
    lines: Vec<String>,
    lines_count: usize,
    words_count: usize,
    chars_count: usize,
    text: bool,
    ordinal: usize,
    running: RunningCounts,
    totals: BatchTotals,
}

impl FileContext {
    /// Builds the context for `path`, reading its content best-effort.
    ///
    /// Never fails: an unreadable file yields empty content, bytes that are
    /// not valid UTF-8 yield empty content with the text flag cleared.
    pub fn new(path: impl Into<PathBuf>, counters: &mut SessionCounters) -> Self {
        let path = path.into();
        let (content, text) = read_text(&path);
        let lines: Vec<String> = content.lines().map(str::to_string).collect();
        let lines_count = lines.len();
        let words_count = content.split_whitespace().count();
        let chars_count = content.chars().count();
        let (ordinal, running) = counters.record(lines_count, words_count, chars_count);
        let totals = counters.totals();

        Self {
            path,
            content,
            lines,
            lines_count,
            words_count,
            chars_count,
            text,
            ordinal,
            running,
            totals,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current content, after any transforms applied so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Lines as read at construction, untouched by transforms.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Line count at construction.
    pub fn lines_count(&self) -> usize {
        self.lines_count
    }

    /// Whitespace-separated word count at construction.
    pub fn words_count(&self) -> usize {
        self.words_count
    }

    /// Character count at construction.
    pub fn chars_count(&self) -> usize {
        self.chars_count
    }

    /// False when the file held bytes that were not valid UTF-8.
    pub fn is_text(&self) -> bool {
        self.text
    }

    /// Session-wide ordinal of this file.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Running counts accumulated through this file.
    pub fn running(&self) -> RunningCounts {
        self.running
    }

    /// Batch totals of the merge this file belongs to.
    pub fn totals(&self) -> BatchTotals {
        self.totals
    }

    /// File name without its final extension.
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Final extension without the leading dot, empty when absent.
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// File name with extension.
    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Full path in the platform's native display form.
    pub fn display_path(&self) -> String {
        self.path.display().to_string()
    }

    /// Containing directory, empty for bare file names.
    pub fn folder(&self) -> String {
        self.path
            .parent()
            .map(|parent| parent.display().to_string())
            .unwrap_or_default()
    }

    /// Windows drive or UNC prefix; empty on other platforms and for
    /// relative paths.
    pub fn drive(&self) -> String {
        match self.path.components().next() {
            Some(Component::Prefix(prefix)) => {
                prefix.as_os_str().to_string_lossy().into_owned()
            }
            _ => String::new(),
        }
    }

    /// File size from metadata, if the file is still statable.
    pub fn size(&self) -> Option<u64> {
        fs::metadata(&self.path).map(|meta| meta.len()).ok()
    }

    /// Creation time formatted with `fmt`, empty on any failure.
    pub fn created(&self, fmt: &str) -> String {
        self.timestamp(fmt, |meta| meta.created())
    }

    /// Last modification time formatted with `fmt`, empty on any failure.
    pub fn modified(&self, fmt: &str) -> String {
        self.timestamp(fmt, |meta| meta.modified())
    }

    /// Last access time formatted with `fmt`, empty on any failure.
    pub fn accessed(&self, fmt: &str) -> String {
        self.timestamp(fmt, |meta| meta.accessed())
    }

    fn timestamp(
        &self,
        fmt: &str,
        pick: impl Fn(&fs::Metadata) -> io::Result<SystemTime>,
    ) -> String {
        let Ok(meta) = fs::metadata(&self.path) else {
            return String::new();
        };
        let Ok(time) = pick(&meta) else {
            return String::new();
        };
        format_timestamp(time, fmt)
    }

    /// MD5 of the raw file bytes as lowercase hex, empty when unreadable.
    pub fn hash_md5(&self) -> String {
        match fs::read(&self.path) {
            Ok(bytes) => {
                let mut hasher = Md5::new();
                hasher.update(&bytes);
                format!("{:x}", hasher.finalize())
            }
            Err(_) => String::new(),
        }
    }

    /// SHA-1 of the raw file bytes as lowercase hex, empty when unreadable.
    pub fn hash_sha1(&self) -> String {
        match fs::read(&self.path) {
            Ok(bytes) => {
                let mut hasher = Sha1::new();
                hasher.update(&bytes);
                format!("{:x}", hasher.finalize())
            }
            Err(_) => String::new(),
        }
    }
}

/// Formats a timestamp with a strftime pattern in local time.
///
/// The pattern is validated first so a user-supplied format can never panic
/// the formatter; invalid patterns degrade to an empty string.
pub fn format_timestamp(time: SystemTime, fmt: &str) -> String {
    let items: Vec<Item<'_>> = StrftimeItems::new(fmt).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        debug!(fmt, "invalid strftime pattern");
        return String::new();
    }
    DateTime::<Local>::from(time)
        .format_with_items(items.into_iter())
        .to_string()
}

/// Human-readable size: plain integer at the bytes floor, two decimals for
/// every unit above. Sizes past the ladder stay in terabytes.
pub fn human_size(size: u64) -> String {
    const UNITS: [&str; 5] = ["bytes", "KB", "MB", "GB", "TB"];

    if size < 1024 {
        return format!("{size} bytes");
    }
    let mut value = size as f64 / 1024.0;
    let mut unit = UNITS[1];
    for &next in &UNITS[2..] {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{value:.2} {unit}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_context_reads_content_and_counts() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "sample.txt", "alpha beta\n\ngamma\n");
        let mut counters = SessionCounters::new();

        let ctx = FileContext::new(&path, &mut counters);
        assert_eq!(ctx.content(), "alpha beta\n\ngamma\n");
        assert_eq!(ctx.lines(), vec!["alpha beta", "", "gamma"]);
        assert_eq!(ctx.lines_count(), 3);
        assert_eq!(ctx.words_count(), 3);
        assert_eq!(ctx.chars_count(), 18);
        assert!(ctx.is_text());
    }

    #[test]
    fn test_context_unicode_chars_counted_not_bytes() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "uni.txt", "héllo");
        let mut counters = SessionCounters::new();

        let ctx = FileContext::new(&path, &mut counters);
        assert_eq!(ctx.chars_count(), 5);
    }

    #[test]
    fn test_context_missing_file_is_empty_text() {
        let dir = TempDir::new().unwrap();
        let mut counters = SessionCounters::new();

        let ctx = FileContext::new(dir.path().join("absent.txt"), &mut counters);
        assert_eq!(ctx.content(), "");
        assert!(ctx.is_text());
        assert_eq!(ctx.lines_count(), 0);
        assert_eq!(ctx.words_count(), 0);
        assert_eq!(ctx.chars_count(), 0);
        // The file still takes an ordinal.
        assert_eq!(ctx.ordinal(), 1);
    }

    #[test]
    fn test_context_binary_file_is_empty_non_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blob.bin");
        fs::write(&path, [0xff, 0xfe, 0x00, 0x41]).unwrap();
        let mut counters = SessionCounters::new();

        let ctx = FileContext::new(&path, &mut counters);
        assert_eq!(ctx.content(), "");
        assert!(!ctx.is_text());
    }

    #[test]
    fn test_identity_accessors() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "report.tar.gz", "x");
        let mut counters = SessionCounters::new();

        let ctx = FileContext::new(&path, &mut counters);
        assert_eq!(ctx.name(), "report.tar");
        assert_eq!(ctx.extension(), "gz");
        assert_eq!(ctx.filename(), "report.tar.gz");
        assert_eq!(ctx.folder(), dir.path().display().to_string());
        assert!(ctx.display_path().ends_with("report.tar.gz"));
    }

    #[test]
    fn test_identity_without_extension_or_folder() {
        let mut counters = SessionCounters::new();
        let ctx = FileContext::new("README", &mut counters);
        assert_eq!(ctx.name(), "README");
        assert_eq!(ctx.extension(), "");
        assert_eq!(ctx.filename(), "README");
        assert_eq!(ctx.folder(), "");
        assert_eq!(ctx.drive(), "");
    }

    #[test]
    fn test_size_of_missing_file_is_none() {
        let mut counters = SessionCounters::new();
        let ctx = FileContext::new("no/such/file.txt", &mut counters);
        assert_eq!(ctx.size(), None);
    }

    #[test]
    fn test_counters_record_ordinals_and_running_sums() {
        let dir = TempDir::new().unwrap();
        let first = write_file(&dir, "a.txt", "one two\n");
        let second = write_file(&dir, "b.txt", "three\nfour\n");
        let mut counters = SessionCounters::new();

        let ctx_a = FileContext::new(&first, &mut counters);
        assert_eq!(ctx_a.ordinal(), 1);
        assert_eq!(ctx_a.running().files, 1);
        assert_eq!(ctx_a.running().lines, 1);
        assert_eq!(ctx_a.running().words, 2);

        let ctx_b = FileContext::new(&second, &mut counters);
        assert_eq!(ctx_b.ordinal(), 2);
        assert_eq!(ctx_b.running().files, 2);
        assert_eq!(ctx_b.running().lines, 3);
        assert_eq!(ctx_b.running().words, 4);

        // Earlier snapshots are unaffected by later files.
        assert_eq!(ctx_a.running().files, 1);
    }

    #[test]
    fn test_reset_preserves_file_ordinal() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.txt", "x\n");
        let mut counters = SessionCounters::new();

        let _ = FileContext::new(&path, &mut counters);
        let _ = FileContext::new(&path, &mut counters);
        counters.set_totals(BatchTotals {
            files: 2,
            lines: 2,
            words: 2,
            chars: 4,
        });
        counters.reset();

        assert_eq!(counters.files_counter(), 2);
        assert_eq!(counters.current(), RunningCounts::default());
        assert_eq!(counters.totals(), BatchTotals::default());

        let ctx = FileContext::new(&path, &mut counters);
        assert_eq!(ctx.ordinal(), 3);
        assert_eq!(ctx.running().files, 1);
    }

    #[test]
    fn test_hashes_known_vectors() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "vector.txt", "hello world");
        let mut counters = SessionCounters::new();

        let ctx = FileContext::new(&path, &mut counters);
        assert_eq!(ctx.hash_md5(), "5eb63bbbe01eeed093cb22bb8f5acdc3");
        assert_eq!(ctx.hash_sha1(), "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed");
    }

    #[test]
    fn test_hashes_of_missing_file_are_empty() {
        let mut counters = SessionCounters::new();
        let ctx = FileContext::new("no/such/file.bin", &mut counters);
        assert_eq!(ctx.hash_md5(), "");
        assert_eq!(ctx.hash_sha1(), "");
    }

    #[test]
    fn test_timestamps_default_format_shape() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "t.txt", "x");
        let mut counters = SessionCounters::new();

        let ctx = FileContext::new(&path, &mut counters);
        let stamp = ctx.modified(DEFAULT_TIME_FORMAT);
        assert_eq!(stamp.len(), 19);
        assert_eq!(&stamp[4..5], "-");
        assert_eq!(&stamp[7..8], "-");
        assert_eq!(&stamp[10..11], " ");
        assert_eq!(&stamp[13..14], ":");
        assert_eq!(&stamp[16..17], ":");
    }

    #[test]
    fn test_timestamps_custom_format() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "t.txt", "x");
        let mut counters = SessionCounters::new();

        let ctx = FileContext::new(&path, &mut counters);
        let year = ctx.modified("%Y");
        assert_eq!(year.len(), 4);
        assert!(year.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_timestamps_invalid_format_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "t.txt", "x");
        let mut counters = SessionCounters::new();

        let ctx = FileContext::new(&path, &mut counters);
        assert_eq!(ctx.modified("%Q"), "");
    }

    #[test]
    fn test_timestamps_of_missing_file_are_empty() {
        let mut counters = SessionCounters::new();
        let ctx = FileContext::new("no/such/file.txt", &mut counters);
        assert_eq!(ctx.created(DEFAULT_TIME_FORMAT), "");
        assert_eq!(ctx.modified(DEFAULT_TIME_FORMAT), "");
        assert_eq!(ctx.accessed(DEFAULT_TIME_FORMAT), "");
    }

    #[test]
    fn test_human_size_ladder() {
        assert_eq!(human_size(0), "0 bytes");
        assert_eq!(human_size(1), "1 bytes");
        assert_eq!(human_size(1023), "1023 bytes");
        assert_eq!(human_size(1024), "1.00 KB");
        assert_eq!(human_size(1536), "1.50 KB");
        assert_eq!(human_size(1024 * 1024), "1.00 MB");
        assert_eq!(human_size(5 * 1024 * 1024 * 1024 / 2), "2.50 GB");
        assert_eq!(human_size(1024_u64.pow(4)), "1.00 TB");
    }

    #[test]
    fn test_human_size_stays_in_terabytes() {
        assert_eq!(human_size(1024_u64.pow(5)), "1024.00 TB");
    }
}
