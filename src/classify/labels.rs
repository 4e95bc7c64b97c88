use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::PipelineError;

/// Ordered class names. Line `i` of `labels.txt` names score index `i`.
///
/// Cloning shares the underlying list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelTable {
    labels: Arc<[String]>,
}

impl LabelTable {
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(PipelineError::load("label table is empty").into());
        }
        Ok(Self {
            labels: labels.into(),
        })
    }

    /// Parse `labels.txt` content: one label per line, order significant.
    pub fn parse(contents: &str) -> Result<Self> {
        // A UTF-8 BOM would otherwise end up in the first class name.
        let contents = contents.strip_prefix('\u{feff}').unwrap_or(contents);
        Self::new(contents.lines())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::load(format!("failed to read labels {}: {}", path.display(), e))
        })?;
        let table =
            Self::parse(&contents).with_context(|| format!("labels {}", path.display()))?;
        log::info!("labels loaded from {}: {:?}", path.display(), table.labels);
        Ok(table)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}
