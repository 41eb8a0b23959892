//! Pattern classification: partition changed packages into run-first,
//! run-last and everything else, preserving pattern declaration order.

use std::collections::BTreeSet;

use glob::Pattern;
use tracing::debug;

use crate::changes::{compile_patterns, pattern_matches};
use crate::error::Result;

/// Packages claimed by one glob pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternGroup {
    /// The glob as declared by the caller
    pub pattern: String,
    /// Matched package names, sorted
    pub packages: Vec<String>,
}

/// The three disjoint ordered buckets produced by classification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Groups to run before everything else, in declaration order.
    /// Patterns matching nothing are omitted.
    pub run_first_groups: Vec<PatternGroup>,
    /// Changed packages not claimed by any run-first or run-last pattern
    pub other_packages: BTreeSet<String>,
    /// Groups to run after everything else, in declaration order
    pub run_last_groups: Vec<PatternGroup>,
}

impl Classification {
    /// Whether the classification holds no packages at all
    pub fn is_empty(&self) -> bool {
        self.run_first_groups.is_empty()
            && self.other_packages.is_empty()
            && self.run_last_groups.is_empty()
    }

    /// Total number of distinct packages across all buckets
    pub fn package_count(&self) -> usize {
        let mut names: BTreeSet<&str> = self.other_packages.iter().map(String::as_str).collect();
        for group in self.run_first_groups.iter().chain(&self.run_last_groups) {
            names.extend(group.packages.iter().map(String::as_str));
        }
        names.len()
    }
}

/// Partition `changed` into run-first groups, run-last groups and the rest.
///
/// Matching is case-sensitive glob semantics (`*` does not cross `/`, so
/// scoped names like `@my/core` behave as expected). A name matching both a
/// run-first and a run-last pattern is claimed by run-first: run-last
/// matches are computed against the full changed set but names already
/// claimed by run-first groups are removed before run-last groups are
/// rebuilt. Patterns matching zero names are dropped from the output so no
/// empty execution pass is ever produced.
pub fn classify(
    changed: &BTreeSet<String>,
    run_first: &[String],
    run_last: &[String],
) -> Result<Classification> {
    let first_patterns = compile_patterns(run_first)?;
    let last_patterns = compile_patterns(run_last)?;

    // Union of names claimed by each pattern list, both taken against the
    // full changed set; precedence is applied when groups are rebuilt.
    let first_matched = match_any(changed, &first_patterns);
    let last_matched = match_any(changed, &last_patterns);

    let run_first_groups = build_groups(run_first, &first_patterns, &first_matched);

    let last_pool: BTreeSet<String> = last_matched
        .difference(&first_matched)
        .cloned()
        .collect();
    let run_last_groups = build_groups(run_last, &last_patterns, &last_pool);

    let other_packages: BTreeSet<String> = changed
        .iter()
        .filter(|name| !first_matched.contains(*name) && !last_pool.contains(*name))
        .cloned()
        .collect();

    debug!(
        run_first_groups = run_first_groups.len(),
        run_last_groups = run_last_groups.len(),
        other = other_packages.len(),
        "classification complete"
    );

    Ok(Classification {
        run_first_groups,
        other_packages,
        run_last_groups,
    })
}

/// Names in `names` matched by at least one pattern
fn match_any(names: &BTreeSet<String>, patterns: &[Pattern]) -> BTreeSet<String> {
    names
        .iter()
        .filter(|name| patterns.iter().any(|p| pattern_matches(p, name)))
        .cloned()
        .collect()
}

/// Rebuild per-pattern groups in declaration order against a match pool,
/// dropping patterns that claim nothing
fn build_groups(
    declared: &[String],
    patterns: &[Pattern],
    pool: &BTreeSet<String>,
) -> Vec<PatternGroup> {
    declared
        .iter()
        .zip(patterns)
        .filter_map(|(glob, pattern)| {
            let packages: Vec<String> = pool
                .iter()
                .filter(|name| pattern_matches(pattern, name))
                .cloned()
                .collect();

            if packages.is_empty() {
                None
            } else {
                Some(PatternGroup {
                    pattern: glob.clone(),
                    packages,
                })
            }
        })
        .collect()
}
