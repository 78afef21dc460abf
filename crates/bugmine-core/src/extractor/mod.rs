//! Java method extraction: parsing, method discovery and metrics.

pub mod methods;
pub mod metrics;
pub mod parser;
pub mod paths;

use tracing::debug;

use crate::errors::{Diagnostics, MinerResult, Skip, Stage};
use crate::vcs::VersionControl;

pub use methods::ExtractedMethod;
pub use parser::JavaParser;
pub use paths::SourceFilter;

/// Turns source snapshots into method inventories.
pub struct MethodExtractor {
    parser: JavaParser,
    filter: SourceFilter,
}

impl MethodExtractor {
    pub fn new(filter: SourceFilter) -> MinerResult<Self> {
        Ok(Self {
            parser: JavaParser::new()?,
            filter,
        })
    }

    pub fn filter(&self) -> &SourceFilter {
        &self.filter
    }

    /// Methods declared in one file. A file with syntax errors is a [`Skip`].
    pub fn extract_source(&mut self, path: &str, source: &str) -> Result<Vec<ExtractedMethod>, Skip> {
        let tree = self.parser.parse_clean(source).ok_or_else(|| Skip::Unparsable {
            path: path.to_string(),
        })?;
        Ok(methods::collect_methods(&tree, source, path))
    }

    /// Every method in the non-test source files of `commit`.
    pub fn extract_methods(
        &mut self,
        vcs: &dyn VersionControl,
        commit: &str,
        diagnostics: &mut Diagnostics,
    ) -> MinerResult<Vec<ExtractedMethod>> {
        let files = vcs.tree_at(commit, &self.filter)?;
        let mut out = Vec::new();
        for file in &files {
            match self.extract_source(&file.path, &file.contents) {
                Ok(found) => out.extend(found),
                Err(skip) => diagnostics.record(Stage::Extraction, skip),
            }
        }
        debug!(commit, files = files.len(), methods = out.len(), "extracted methods");
        Ok(out)
    }
}
