//! # fglue
//!
//! A file-merge library and CLI tool driven by `{directive}` templates.
//! Each selected file is rendered through the template and the results are
//! concatenated, which makes it easy to glue source trees, notes or logs
//! into a single annotated document.
//!
//! ## Features
//!
//! - Per-file directives: `{filename}`, `{content}`, `{size}`, hashes,
//!   timestamps and more
//! - Content transforms such as `{upper}` or `{remove_blank_lines}`
//! - Slicing directives for lines and characters
//! - Batch filters (`{allow_ext:...}`, `{skip_ext:...}`, `{limit_files:N}`)
//!   and boundary markers (`{show_before}`, `{show_after}`)
//! - Running and total statistics across the merged batch
//!
//! ## Usage
//!
//! ### As a Library
//!
//! ```no_run
//! use fglue::{MergeRequest, SessionCounters, merge};
//!
//! let request = MergeRequest {
//!     selected_paths: vec!["notes/a.txt".into(), "notes/b.txt".into()],
//!     template: "----- {filename} -----{nl}{content}{nl}".to_string(),
//! };
//! let mut counters = SessionCounters::new();
//!
//! match merge(&request, &mut counters) {
//!     Ok(result) => println!("{}", result),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```
//!
//! ### As a CLI Tool
//!
//! ```bash
//! # Merge two files with the default template
//! fglue a.txt b.txt
//!
//! # Merge a directory with a template file
//! fglue src/ -t template.txt -o merged.txt
//!
//! # Read the template from stdin
//! echo "{counter}. {filename}{nl}{content}{nl}" | fglue src/ -t -
//! ```

pub mod context;
pub mod directive;
pub mod error;
pub mod merge;
pub mod render;
pub mod select;

// Re-export main types and functions for convenience
pub use context::{
    BatchTotals, FileContext, RunningCounts, SessionCounters, format_timestamp, human_size,
};
pub use directive::{ArgList, Directive, DirectiveKind, find_directives};
pub use error::{GlueError, Result};
pub use merge::{
    BatchRules, DEFAULT_TEMPLATE, MergeRequest, batch_totals, extract_batch_rules, merge,
};
pub use render::render;
pub use select::{SelectOptions, build_exclude_set, collect_files, normalize_extensions};
