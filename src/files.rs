//! File-level parsing API: reading, include expansion, and the process-wide
//! AST cache.
//!
//! The cache is keyed by `(canonical path, options)` and invalidated by
//! file modification time. Cached trees are shared as [`Arc`]s, so callers
//! can use a result without holding any lock; the lock itself is only held
//! for lookup and insert, never across a parse (concurrent identical
//! requests may duplicate work).

use crate::ast::SourceFile;
use crate::error::{Error, ParseError};
use crate::includes::expand_includes;
use crate::parser;
use crate::resolver::find_library_file;
use crate::source_map::SourceMap;
use log::debug;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

/// Options recognized by the file-level functions.
///
/// The pair is also the cache-key signature: the same file parsed with
/// different options is cached separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParseOptions {
    /// Emit comment nodes in the AST.
    pub include_comments: bool,
    /// Splice `include` files before parsing; when `false`, `Include`
    /// statement nodes are emitted instead. `use` is unaffected.
    pub process_includes: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            include_comments: false,
            process_includes: true,
        }
    }
}

type CacheKey = (PathBuf, ParseOptions);
type CacheEntry = (SystemTime, Arc<SourceFile>);

static AST_CACHE: Lazy<Mutex<HashMap<CacheKey, CacheEntry>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn cache() -> std::sync::MutexGuard<'static, HashMap<CacheKey, CacheEntry>> {
    AST_CACHE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Read a source file as UTF-8, stripping a leading BOM.
pub(crate) fn read_source(path: &Path) -> Result<String, Error> {
    let text = fs::read_to_string(path).map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            Error::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            Error::Io(err)
        }
    })?;
    Ok(match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    })
}

/// Parse `OpenSCAD` source from a string.
///
/// The origin is reported as `"<string>"`. Includes are never expanded for
/// string input (there is no base directory to resolve against), so
/// `include` directives surface as `Include` statement nodes. No caching.
pub fn parse_string(code: &str, options: ParseOptions) -> Result<SourceFile, ParseError> {
    let code = code.strip_prefix('\u{feff}').unwrap_or(code);
    let mut map = SourceMap::new();
    map.add_origin("<string>", code, None);
    parser::parse_source_map(&map, options.include_comments)
}

/// Parse an `OpenSCAD` file, with caching.
///
/// The cached tree is returned as long as the file's modification time is
/// unchanged; otherwise the file is re-parsed and the entry replaced.
pub fn parse_file(path: impl AsRef<Path>, options: ParseOptions) -> Result<Arc<SourceFile>, Error> {
    let path = path.as_ref();
    let canonical = path.canonicalize().map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            Error::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            Error::Io(err)
        }
    })?;
    let mtime = fs::metadata(&canonical)?.modified()?;
    let key = (canonical.clone(), options);

    if let Some((cached_mtime, ast)) = cache().get(&key) {
        if *cached_mtime == mtime {
            debug!("ast cache hit: {}", canonical.display());
            return Ok(Arc::clone(ast));
        }
        debug!("ast cache stale (mtime changed): {}", canonical.display());
    }

    let code = read_source(&canonical)?;
    let mut map = SourceMap::new();
    map.add_origin(canonical.to_string_lossy(), &code, None);
    if options.process_includes {
        expand_includes(&mut map, &canonical)?;
    }
    debug!(
        "parsing {} ({} bytes combined)",
        canonical.display(),
        map.combined().len()
    );
    let ast = Arc::new(parser::parse_source_map(&map, options.include_comments)?);
    cache().insert(key, (mtime, Arc::clone(&ast)));
    Ok(ast)
}

/// Find and parse a library file using `OpenSCAD`'s search rules.
///
/// Returns the tree together with the resolved absolute path. Parsing goes
/// through [`parse_file`], so the result is cached.
pub fn parse_library_file(
    current_file: &str,
    libfile: &str,
    options: ParseOptions,
) -> Result<(Arc<SourceFile>, PathBuf), Error> {
    let Some(found) = find_library_file(current_file, libfile) else {
        return Err(Error::LibraryNotFound {
            libfile: libfile.to_string(),
        });
    };
    let ast = parse_file(&found, options)?;
    let resolved = found.canonicalize().unwrap_or(found);
    Ok((ast, resolved))
}

/// Empty the process-wide AST cache, forcing subsequent [`parse_file`]
/// calls to re-parse.
pub fn clear_ast_cache() {
    cache().clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::StatementKind;
    use std::time::Duration;

    fn write(path: &Path, content: &str) {
        fs::write(path, content).unwrap();
    }

    fn bump_mtime(path: &Path) {
        let file = fs::OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(10))
            .unwrap();
    }

    #[test]
    fn test_parse_string_origin() {
        let file = parse_string("x = 1;", ParseOptions::default()).unwrap();
        assert_eq!(file.statements.len(), 1);
        assert_eq!(file.statements[0].position.origin, "<string>");
    }

    #[test]
    fn test_parse_string_keeps_include_nodes() {
        let file = parse_string("include <lib.scad>\nx = 1;", ParseOptions::default()).unwrap();
        assert!(matches!(
            file.statements[0].kind,
            StatementKind::Include { ref path } if path == "lib.scad"
        ));
    }

    #[test]
    fn test_parse_string_strips_bom() {
        let file = parse_string("\u{feff}x = 1;", ParseOptions::default()).unwrap();
        assert_eq!(file.statements[0].position.offset, 0);
    }

    #[test]
    fn test_parse_file_missing() {
        let err = parse_file("/no/such/file.scad", ParseOptions::default()).unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }

    // The mtime and clear checks share one test: `clear_ast_cache` empties
    // the process-wide cache, and a concurrently running cache test would
    // see its entries vanish mid-assertion.
    #[test]
    fn test_cache_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cached.scad");
        write(&path, "a = 1;");

        let first = parse_file(&path, ParseOptions::default()).unwrap();
        let second = parse_file(&path, ParseOptions::default()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        write(&path, "a = 2;");
        bump_mtime(&path);
        let third = parse_file(&path, ParseOptions::default()).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        match &third.statements[0].kind {
            StatementKind::Assignment { value, .. } => {
                assert!(matches!(
                    value.kind,
                    crate::ast::ExprKind::Number { value } if (value - 2.0).abs() < f64::EPSILON
                ));
            }
            other => panic!("expected assignment, got {other:?}"),
        }

        clear_ast_cache();
        let fourth = parse_file(&path, ParseOptions::default()).unwrap();
        assert!(!Arc::ptr_eq(&third, &fourth));
        assert_eq!(*third, *fourth);
    }

    #[test]
    fn test_cache_key_distinguishes_options() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opts.scad");
        write(&path, "// note\nb = 3;");

        let plain = parse_file(&path, ParseOptions::default()).unwrap();
        let with_comments = parse_file(
            &path,
            ParseOptions {
                include_comments: true,
                ..ParseOptions::default()
            },
        )
        .unwrap();
        assert_eq!(plain.statements.len(), 1);
        assert_eq!(with_comments.statements.len(), 2);
    }

    #[test]
    fn test_parse_library_file_not_found() {
        let err = parse_library_file("", "no-such-lib-anywhere.scad", ParseOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::LibraryNotFound { .. }));
    }

    #[test]
    fn test_parse_library_file_relative() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("helper.scad"), "function two() = 2;");
        let main = dir.path().join("main.scad");
        write(&main, "use <helper.scad>");

        let (ast, resolved) =
            parse_library_file(main.to_str().unwrap(), "helper.scad", ParseOptions::default())
                .unwrap();
        assert_eq!(ast.statements.len(), 1);
        assert!(resolved.ends_with("helper.scad"));
    }
}
