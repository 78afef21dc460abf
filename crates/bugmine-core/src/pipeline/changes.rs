//! Methods touched by a fix commit.

use indexmap::IndexSet;
use tracing::debug;

use crate::errors::{Diagnostics, MinerResult, Stage};
use crate::extractor::MethodExtractor;
use crate::vcs::{CommitInfo, VersionControl};

/// Signatures of the methods whose span intersects a line edited by `commit`.
///
/// A root commit has no parent to diff against, so every method in its tree
/// counts as modified. Signatures come back de-duplicated in first-seen order.
pub fn modified_methods(
    vcs: &dyn VersionControl,
    extractor: &mut MethodExtractor,
    commit: &CommitInfo,
    diagnostics: &mut Diagnostics,
) -> MinerResult<Vec<String>> {
    let mut signatures: IndexSet<String> = IndexSet::new();

    let Some(parent) = commit.first_parent() else {
        for method in extractor.extract_methods(vcs, &commit.hash, diagnostics)? {
            signatures.insert(method.signature);
        }
        debug!(commit = %commit.hash, methods = signatures.len(), "root commit, every method modified");
        return Ok(signatures.into_iter().collect());
    };

    let diffs = vcs.diff(Some(parent), &commit.hash, extractor.filter())?;
    for diff in diffs {
        if diff.edited_lines.is_empty() {
            continue;
        }
        let Some(contents) = vcs.file_at(&commit.hash, &diff.new_path)? else {
            continue;
        };
        let methods = match extractor.extract_source(&diff.new_path, &contents) {
            Ok(methods) => methods,
            Err(skip) => {
                diagnostics.record(Stage::Extraction, skip);
                continue;
            }
        };
        for method in methods {
            if diff.edited_lines.iter().any(|line| method.spans(*line)) {
                signatures.insert(method.signature);
            }
        }
    }
    debug!(commit = %commit.hash, methods = signatures.len(), "modified methods");
    Ok(signatures.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::SourceFilter;
    use crate::testing::FakeRepository;

    const BEFORE: &str = "\
class A {
    void f() {
        int x = 1;
    }
    void g() {
        int y = 1;
    }
}
";

    const AFTER: &str = "\
class A {
    void f() {
        int x = 1;
    }
    void g() {
        int y = 2;
    }
}
";

    fn extractor() -> MethodExtractor {
        MethodExtractor::new(SourceFilter::default()).unwrap()
    }

    #[test]
    fn test_only_methods_spanning_edits_are_modified() {
        let vcs = FakeRepository::new()
            .with_commit("c1", "init", 10, &[], &[("src/A.java", BEFORE)])
            .with_commit("c2", "fix BK-1", 20, &["c1"], &[("src/A.java", AFTER)]);
        let log = vcs.log().unwrap();
        let mut diagnostics = Diagnostics::new();
        let modified = modified_methods(&vcs, &mut extractor(), &log[0], &mut diagnostics).unwrap();
        assert_eq!(modified, vec!["A#g()"]);
    }

    #[test]
    fn test_root_commit_counts_every_method() {
        let vcs = FakeRepository::new().with_commit("c1", "init", 10, &[], &[("src/A.java", BEFORE)]);
        let log = vcs.log().unwrap();
        let mut diagnostics = Diagnostics::new();
        let modified = modified_methods(&vcs, &mut extractor(), &log[0], &mut diagnostics).unwrap();
        assert_eq!(modified, vec!["A#f()", "A#g()"]);
    }

    #[test]
    fn test_test_files_and_unparsable_files_ignored() {
        let vcs = FakeRepository::new()
            .with_commit("c1", "init", 10, &[], &[("src/A.java", BEFORE)])
            .with_commit(
                "c2",
                "fix BK-1",
                20,
                &["c1"],
                &[
                    ("src/A.java", BEFORE),
                    ("src/test/ATest.java", "class ATest { void t() { } }\n"),
                    ("src/B.java", "class B { void h( }\n"),
                ],
            );
        let log = vcs.log().unwrap();
        let mut diagnostics = Diagnostics::new();
        let modified = modified_methods(&vcs, &mut extractor(), &log[0], &mut diagnostics).unwrap();
        assert!(modified.is_empty());
        assert_eq!(diagnostics.count("unparsable"), 1);
    }

    #[test]
    fn test_signatures_in_first_seen_order() {
        let overloads_before = "class O {\n  void a() {}\n  void b() {}\n}\nclass P {\n  void a() {}\n}\n";
        let overloads_after = "class O {\n  void a() {int i;}\n  void b() {int j;}\n}\nclass P {\n  void a() {int k;}\n}\n";
        let vcs = FakeRepository::new()
            .with_commit("c1", "init", 10, &[], &[("src/O.java", overloads_before)])
            .with_commit("c2", "fix", 20, &["c1"], &[("src/O.java", overloads_after)]);
        let log = vcs.log().unwrap();
        let mut diagnostics = Diagnostics::new();
        let modified = modified_methods(&vcs, &mut extractor(), &log[0], &mut diagnostics).unwrap();
        assert_eq!(modified, vec!["O#a()", "O#b()", "P#a()"]);
    }
}
