//! Include/exclude glob filtering over root-relative paths.
//!
//! Pattern strings are semicolon-delimited glob lists. Globs are built with
//! `literal_separator` so `*` matches within one path segment and `**`
//! crosses directory boundaries. A blank or whitespace-only pattern string
//! is treated identically to an absent one: includes default to "match
//! everything", excludes to "match nothing".

use crate::backup::result_error::result::Result;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;

#[derive(Debug)]
pub struct PathMatcher {
    includes: Option<GlobSet>,
    excludes: Option<GlobSet>,
}

impl PathMatcher {
    pub fn new(includes: Option<&str>, excludes: Option<&str>) -> Result<PathMatcher> {
        Ok(PathMatcher {
            includes: parse_pattern_set(includes)?,
            excludes: parse_pattern_set(excludes)?,
        })
    }

    /// A path is selected iff it matches at least one include pattern (or
    /// includes are absent) and matches none of the exclude patterns.
    /// Exclude always takes precedence.
    pub fn matches<P: AsRef<Path>>(&self, rel_path: P) -> bool {
        let rel_path = rel_path.as_ref();
        let included = self
            .includes
            .as_ref()
            .map_or(true, |g| g.is_match(rel_path));
        let excluded = self
            .excludes
            .as_ref()
            .is_some_and(|g| g.is_match(rel_path));
        included && !excluded
    }
}

/// Compiles a semicolon-delimited pattern string into a glob set.
///
/// Returns `None` for absent or blank input. A pattern with a trailing `/`
/// is directory-only: it matches the directory itself and everything
/// beneath it, so `jobs/` compiles to the pair `jobs` + `jobs/**`.
fn parse_pattern_set(patterns: Option<&str>) -> Result<Option<GlobSet>> {
    let patterns = match patterns.map(str::trim).filter(|s| !s.is_empty()) {
        Some(p) => p,
        None => return Ok(None),
    };

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        match pattern.strip_suffix('/') {
            Some(dir_pattern) => {
                builder.add(build_glob(dir_pattern)?);
                builder.add(build_glob(&format!("{dir_pattern}/**"))?);
            }
            None => {
                builder.add(build_glob(pattern)?);
            }
        }
    }

    Ok(Some(builder.build()?))
}

fn build_glob(pattern: &str) -> Result<globset::Glob> {
    Ok(GlobBuilder::new(pattern).literal_separator(true).build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_PATHS: &[&str] = &[
        "config.xml",
        "jobs/myjob/builds/1/build.xml",
        "jobs/myjob/config.xml",
        "jobs/myjob/nextBuildNumber",
        "plugins/periodicbackup.jpl",
    ];

    fn selected(includes: Option<&str>, excludes: Option<&str>) -> Vec<&'static str> {
        let matcher = PathMatcher::new(includes, excludes).unwrap();
        ALL_PATHS
            .iter()
            .copied()
            .filter(|p| matcher.matches(p))
            .collect()
    }

    #[test]
    fn test_absent_patterns_select_everything() {
        assert_eq!(selected(None, None), ALL_PATHS);
    }

    #[test]
    fn test_blank_patterns_behave_like_absent() {
        assert_eq!(selected(Some(""), Some("")), ALL_PATHS);
        assert_eq!(selected(Some("    "), Some("    ")), ALL_PATHS);
    }

    #[test]
    fn test_include_all() {
        assert_eq!(selected(Some("**"), None), ALL_PATHS);
    }

    #[test]
    fn test_include_single_file_does_not_cross_segments() {
        // literal separator: config.xml must not match jobs/myjob/config.xml
        assert_eq!(selected(Some("config.xml"), None), vec!["config.xml"]);
    }

    #[test]
    fn test_include_all_xml_files() {
        assert_eq!(
            selected(Some("**/*.xml"), None),
            vec![
                "config.xml",
                "jobs/myjob/builds/1/build.xml",
                "jobs/myjob/config.xml",
            ]
        );
    }

    #[test]
    fn test_exclude_all() {
        assert!(selected(None, Some("**")).is_empty());
    }

    #[test]
    fn test_exclude_single_file() {
        assert_eq!(
            selected(None, Some("config.xml")),
            vec![
                "jobs/myjob/builds/1/build.xml",
                "jobs/myjob/config.xml",
                "jobs/myjob/nextBuildNumber",
                "plugins/periodicbackup.jpl",
            ]
        );
    }

    #[test]
    fn test_exclude_all_xml_files() {
        assert_eq!(
            selected(None, Some("**/*.xml")),
            vec!["jobs/myjob/nextBuildNumber", "plugins/periodicbackup.jpl"]
        );
    }

    #[test]
    fn test_directory_pattern_excludes_whole_subtree() {
        assert_eq!(
            selected(None, Some("jobs/")),
            vec!["config.xml", "plugins/periodicbackup.jpl"]
        );
    }

    #[test]
    fn test_nested_directory_pattern() {
        assert_eq!(
            selected(None, Some("jobs/*/builds/")),
            vec![
                "config.xml",
                "jobs/myjob/config.xml",
                "jobs/myjob/nextBuildNumber",
                "plugins/periodicbackup.jpl",
            ]
        );
    }

    #[test]
    fn test_semicolon_delimited_patterns() {
        assert_eq!(
            selected(None, Some("jobs/*/builds/; **/nextBuildNumber")),
            vec![
                "config.xml",
                "jobs/myjob/config.xml",
                "plugins/periodicbackup.jpl",
            ]
        );
    }

    #[test]
    fn test_exclude_takes_precedence_over_include() {
        assert_eq!(
            selected(Some("**/*.xml"), Some("config.xml")),
            vec!["jobs/myjob/builds/1/build.xml", "jobs/myjob/config.xml"]
        );
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(PathMatcher::new(Some("[invalid"), None).is_err());
    }
}
