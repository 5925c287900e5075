//! Textual `include <path>` expansion.
//!
//! Before parsing, a file's `include` directives are spliced into the
//! combined buffer through the [`SourceMap`], so the parser sees one flat
//! program while every node still reports its true origin. `use` statements
//! are never expanded.

use crate::error::Error;
use crate::resolver::find_library_file;
use crate::source_map::SourceMap;
use log::debug;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A raw `include <path>` occurrence found by the pre-parse scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective {
    /// Byte offset of the `i` of `include` in the scanned text.
    pub start: usize,
    /// Length of the directive up to and including the closing `>`.
    pub len: usize,
    /// The path text between the angle brackets, trimmed.
    pub path: String,
}

const fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Scan source text for `include <path>` directives.
///
/// A restricted pre-parse, not the real grammar: it only has to know enough
/// to skip string literals and both comment forms, and to reject directives
/// whose `<path>` group spans a line break.
#[must_use]
pub fn scan_includes(code: &str) -> Vec<IncludeDirective> {
    let bytes = code.as_bytes();
    let mut directives = Vec::new();
    let mut i = 0;
    let mut in_string = false;
    let mut string_quote = 0u8;
    let mut in_line_comment = false;
    let mut in_block_comment = false;

    while i < bytes.len() {
        let c = bytes[i];
        let next = bytes.get(i + 1).copied();

        if !in_line_comment && !in_block_comment {
            if c == b'"' || c == b'\'' {
                if !in_string {
                    in_string = true;
                    string_quote = c;
                } else if c == string_quote && (i == 0 || bytes[i - 1] != b'\\') {
                    in_string = false;
                }
            } else if in_string && c == b'\\' && next == Some(string_quote) {
                i += 2;
                continue;
            }
        }
        if !in_string && !in_block_comment {
            if c == b'/' && next == Some(b'/') {
                in_line_comment = true;
                i += 2;
                continue;
            }
            if in_line_comment && c == b'\n' {
                in_line_comment = false;
            }
        }
        if !in_string && !in_line_comment {
            if c == b'/' && next == Some(b'*') {
                in_block_comment = true;
                i += 2;
                continue;
            }
            if in_block_comment && c == b'*' && next == Some(b'/') {
                in_block_comment = false;
                i += 2;
                continue;
            }
        }

        if !in_string
            && !in_line_comment
            && !in_block_comment
            && c == b'i'
            && code[i..].starts_with("include")
            && (i == 0 || !is_word_byte(bytes[i - 1]))
        {
            let mut j = i + 7;
            while j < bytes.len() && matches!(bytes[j], b' ' | b'\t' | b'\r' | b'\n') {
                j += 1;
            }
            if j < bytes.len() && bytes[j] == b'<' {
                let path_start = j + 1;
                let mut k = path_start;
                let mut closed = false;
                while k < bytes.len() {
                    match bytes[k] {
                        b'>' => {
                            closed = true;
                            break;
                        }
                        b'\n' => break,
                        _ => k += 1,
                    }
                }
                if closed {
                    let path = code[path_start..k].trim();
                    if !path.is_empty() {
                        directives.push(IncludeDirective {
                            start: i,
                            len: k + 1 - i,
                            path: path.to_string(),
                        });
                        i = k + 1;
                        continue;
                    }
                }
            }
        }

        i += 1;
    }

    directives
}

/// Expand every `include` directive in `map`, recursively.
///
/// Each directive resolves against the directory of the origin file that
/// textually contains it. The included content is spliced in at the
/// directive's offset and the directive text itself is blanked out, so all
/// other combined offsets are preserved. A file is expanded at most once;
/// a directive naming an already-expanded file (a cycle, or a diamond) is
/// blanked and skipped.
///
/// # Errors
/// [`Error::IncludeNotFound`] when a directive's path cannot be resolved,
/// carrying the including position; [`Error::Io`] on read failure.
pub fn expand_includes(map: &mut SourceMap, main_file: &Path) -> Result<(), Error> {
    let mut expanded: HashSet<PathBuf> = HashSet::new();
    if let Ok(canonical) = main_file.canonicalize() {
        expanded.insert(canonical);
    }

    loop {
        let Some(directive) = scan_includes(map.combined()).into_iter().next() else {
            return Ok(());
        };
        let position = map.location(directive.start).unwrap_or_default();
        let Some(resolved) = find_library_file(&position.origin, &directive.path) else {
            return Err(Error::IncludeNotFound {
                path: directive.path,
                position,
            });
        };
        let canonical = resolved.canonicalize().unwrap_or_else(|_| resolved.clone());
        if !expanded.insert(canonical) {
            debug!(
                "include <{}> at {position}: already expanded, skipping",
                directive.path
            );
            map.blank_range(directive.start, directive.len);
            continue;
        }

        let content = crate::files::read_source(&resolved)?;
        debug!(
            "include <{}> at {position}: splicing {} ({} bytes)",
            directive.path,
            resolved.display(),
            content.len()
        );
        map.add_origin(resolved.to_string_lossy(), &content, Some(directive.start));
        map.blank_range(directive.start + content.len(), directive.len);
    }
}
