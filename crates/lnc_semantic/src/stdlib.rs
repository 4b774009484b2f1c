//! The embedded standard library.
//!
//! The `std/` directory of this crate is compiled into the binary with
//! [`include_dir`], giving an immutable name → source-text table resolved at
//! build time. `@std/<name>` imports read from this table and never touch
//! the filesystem.

use include_dir::{include_dir, Dir};

static STD_SOURCES: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/std");

/// The source text of `@std/<name>`, if the module exists.
pub fn source(name: &str) -> Option<&'static str> {
    STD_SOURCES
        .get_file(format!("{name}.ln"))
        .and_then(|file| file.contents_utf8())
}

/// Names of every bundled module, sorted.
pub fn names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = STD_SOURCES
        .files()
        .filter_map(|file| file.path().file_stem().and_then(|stem| stem.to_str()))
        .collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_and_app_are_bundled() {
        assert!(source("root").is_some());
        assert!(source("app").is_some());
        assert!(source("nonexistent").is_none());
    }

    #[test]
    fn names_are_sorted_and_complete() {
        let names = names();
        assert!(names.contains(&"root"));
        assert!(names.contains(&"app"));
        assert!(names.contains(&"seq"));
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
    }

    #[test]
    fn app_exports_the_start_event_first() {
        let app = source("app").unwrap();
        let start = app.find("event start").unwrap();
        let stdout = app.find("event stdout").unwrap();
        assert!(start < stdout);
    }
}
