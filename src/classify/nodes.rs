//! Input/output node discovery for exported classifier graphs.
//!
//! Exported image classifiers name their entry operation with an `input`
//! marker and place the operation producing class scores right after it. Both
//! scans walk the operations in graph order and keep overwriting on every
//! match, so with several marked operations the last one decides.

use anyhow::Result;

use crate::PipelineError;

/// Substring that marks the graph input operation.
pub const IO_NODE_MARKER: &str = "input";

/// Name of the last operation whose name contains `IO_NODE_MARKER`.
pub fn discover_input_node<'a, I>(operations: I) -> Result<String>
where
    I: IntoIterator<Item = &'a str>,
{
    operations
        .into_iter()
        .filter(|name| name.contains(IO_NODE_MARKER))
        .last()
        .map(str::to_string)
        .ok_or_else(no_marker_error)
}

/// Name of the operation that follows a marked operation.
///
/// The follower is consumed by the scan and is not itself checked for the
/// marker. When several marked operations exist, the follower of the last
/// one examined wins. A marked operation at the very end of the graph has no
/// follower and is a load error.
pub fn discover_output_node<'a, I>(operations: I) -> Result<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut operations = operations.into_iter();
    let mut output = None;
    while let Some(name) = operations.next() {
        if !name.contains(IO_NODE_MARKER) {
            continue;
        }
        let follower = operations.next().ok_or_else(|| {
            PipelineError::load(format!(
                "operation '{}' is the last in the graph; no output operation follows it",
                name
            ))
        })?;
        output = Some(follower.to_string());
    }
    output.ok_or_else(no_marker_error)
}

fn no_marker_error() -> anyhow::Error {
    PipelineError::load(format!(
        "no graph operation name contains '{}'",
        IO_NODE_MARKER
    ))
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error_kind, ErrorKind};

    #[test]
    fn single_marker_graph() -> Result<()> {
        let ops = ["serving_default_input_1", "sequential/dense/Softmax", "Identity"];
        assert_eq!(discover_input_node(ops)?, "serving_default_input_1");
        assert_eq!(discover_output_node(ops)?, "sequential/dense/Softmax");
        Ok(())
    }

    #[test]
    fn last_match_wins() -> Result<()> {
        let ops = ["input_a", "conv", "input_b", "scores", "tail"];
        assert_eq!(discover_input_node(ops)?, "input_b");
        assert_eq!(discover_output_node(ops)?, "scores");
        Ok(())
    }

    #[test]
    fn follower_is_consumed_without_being_checked() -> Result<()> {
        // `input_b` is the follower of `input_a`, so the output scan never
        // treats it as a marker; the input scan still does.
        let ops = ["input_a", "input_b", "scores"];
        assert_eq!(discover_input_node(ops)?, "input_b");
        assert_eq!(discover_output_node(ops)?, "input_b");
        Ok(())
    }

    #[test]
    fn marker_at_end_has_no_output() {
        let err = discover_output_node(["conv", "input"]).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::Load));
    }

    #[test]
    fn graphs_without_marker_fail_to_load() {
        let ops = ["x", "conv", "softmax"];
        assert_eq!(
            error_kind(&discover_input_node(ops).unwrap_err()),
            Some(ErrorKind::Load)
        );
        assert_eq!(
            error_kind(&discover_output_node(ops).unwrap_err()),
            Some(ErrorKind::Load)
        );
    }
}
