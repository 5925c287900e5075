//! Library file lookup mirroring `OpenSCAD`'s own search rules.

use log::trace;
use std::env;
use std::path::{Path, PathBuf};

/// Search for a library file the way `OpenSCAD` does.
///
/// Tried in order, first existing regular file wins:
/// 1. `libfile` itself, if absolute;
/// 2. the directory containing `current_file` (when non-empty);
/// 3. each directory of the `OPENSCADPATH` environment variable, split by
///    the platform path separator, empty entries ignored;
/// 4. the platform default library directory
///    (`~/Documents/OpenSCAD/libraries` on Windows and macOS,
///    `~/.local/share/OpenSCAD/libraries` elsewhere).
#[must_use]
pub fn find_library_file(current_file: &str, libfile: &str) -> Option<PathBuf> {
    let lib = Path::new(libfile);
    if lib.is_absolute() {
        return lib.is_file().then(|| lib.to_path_buf());
    }

    let mut dirs: Vec<PathBuf> = Vec::new();
    if !current_file.is_empty() {
        let abs = absolute(Path::new(current_file));
        if let Some(parent) = abs.parent() {
            dirs.push(parent.to_path_buf());
        }
    }
    if let Some(env_path) = env::var_os("OPENSCADPATH") {
        dirs.extend(env::split_paths(&env_path).filter(|p| !p.as_os_str().is_empty()));
    }
    if let Some(home) = home_dir() {
        if cfg!(any(windows, target_os = "macos")) {
            dirs.push(home.join("Documents").join("OpenSCAD").join("libraries"));
        } else {
            dirs.push(home.join(".local/share/OpenSCAD/libraries"));
        }
    }

    for dir in &dirs {
        let candidate = dir.join(lib);
        trace!("library search: trying {}", candidate.display());
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_absolute_path_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("lib.scad");
        fs::write(&lib, "x = 1;\n").unwrap();

        let found = find_library_file("", lib.to_str().unwrap()).unwrap();
        assert_eq!(found, lib);

        let missing = dir.path().join("missing.scad");
        assert!(find_library_file("", missing.to_str().unwrap()).is_none());
    }

    #[test]
    fn test_relative_to_current_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("utils")).unwrap();
        fs::write(dir.path().join("utils/math.scad"), "function sq(x) = x * x;\n").unwrap();
        let main = dir.path().join("main.scad");
        fs::write(&main, "use <utils/math.scad>\n").unwrap();

        let found = find_library_file(main.to_str().unwrap(), "utils/math.scad").unwrap();
        assert_eq!(found, dir.path().join("utils/math.scad"));
    }

    #[test]
    fn test_openscadpath_environment() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("envlib.scad"), "y = 2;\n").unwrap();

        // SAFETY: test-only env mutation; the variable is restored below.
        unsafe { env::set_var("OPENSCADPATH", dir.path()) };
        let found = find_library_file("", "envlib.scad");
        unsafe { env::remove_var("OPENSCADPATH") };

        assert_eq!(found.unwrap(), dir.path().join("envlib.scad"));
    }

    #[test]
    fn test_not_found() {
        assert!(find_library_file("", "definitely-not-a-real-library.scad").is_none());
    }
}
