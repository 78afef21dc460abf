//! Source and test path classification.

/// Decides which repository paths hold production source code.
#[derive(Clone, Debug)]
pub struct SourceFilter {
    extensions: Vec<String>,
    test_segments: Vec<String>,
}

impl Default for SourceFilter {
    fn default() -> Self {
        Self::new(vec![".java".to_string()], vec!["test".to_string(), "tests".to_string()])
    }
}

impl SourceFilter {
    pub fn new(extensions: Vec<String>, test_segments: Vec<String>) -> Self {
        let extensions = extensions
            .into_iter()
            .map(|ext| {
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{ext}")
                }
            })
            .collect();
        Self {
            extensions,
            test_segments,
        }
    }

    pub fn is_source(&self, path: &str) -> bool {
        self.extensions.iter().any(|ext| path.ends_with(ext.as_str()))
    }

    /// True when any directory segment of `path` is a test directory name.
    pub fn is_test(&self, path: &str) -> bool {
        let mut segments: Vec<&str> = path.split(['/', '\\']).collect();
        segments.pop();
        segments
            .iter()
            .any(|segment| self.test_segments.iter().any(|t| t == segment))
    }

    pub fn accepts(&self, path: &str) -> bool {
        self.is_source(path) && !self.is_test(path)
    }
}
