//! The DOM data side-tables: `data-parsoid`, `data-mw`, and the
//! [`PageBundle`] written out alongside the HTML.
//!
//! Data records live in an arena keyed by a numeric id stored on the node,
//! so they survive node mutation without repeated JSON round-trips; they are
//! serialized exactly once, during cleanup.

use crate::tokens::{ArgInfo, ParamInfo, Tsr};
use indexmap::IndexMap;
use serde::{Serialize, Serializer, ser::SerializeSeq};

/// A DOM source range: the byte range of the wikitext a node renders, plus
/// the widths of its opening and closing syntax.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct Dsr {
    /// Content start offset.
    pub start: Option<usize>,
    /// Content end offset.
    pub end: Option<usize>,
    /// Width of the opening syntax, e.g. `2` for `==`.
    pub open_width: Option<usize>,
    /// Width of the closing syntax.
    pub close_width: Option<usize>,
}

impl Dsr {
    /// Creates a fully-known range.
    pub fn new(start: usize, end: usize, open_width: usize, close_width: usize) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            open_width: Some(open_width),
            close_width: Some(close_width),
        }
    }

    /// True when both content offsets are known.
    pub fn is_valid(self) -> bool {
        self.start.is_some() && self.end.is_some()
    }
}

impl Serialize for Dsr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(4))?;
        seq.serialize_element(&self.start)?;
        seq.serialize_element(&self.end)?;
        seq.serialize_element(&self.open_width)?;
        seq.serialize_element(&self.close_width)?;
        seq.end()
    }
}

/// Pass-scoped scratch state. Never serialized.
#[derive(Clone, Debug, Default)]
pub(crate) struct TempData {
    /// Ids of the template ranges covering this node, set during
    /// encapsulation.
    pub range_ids: Vec<u32>,
    /// Template argument info carried by a transclusion start marker.
    pub tpl_arg_info: Option<ArgInfo>,
    /// The source range of the matching end tag, recorded by the tree
    /// builder so DSR computation can derive closing widths.
    pub end_tsr: Option<Tsr>,
    /// The tree builder synthesized the end of this element.
    pub auto_inserted_end: bool,
}

/// Returns true when a bool is false, for serde skipping.
#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(v: &bool) -> bool {
    !*v
}

/// The `data-parsoid` record of one node.
#[derive(Clone, Debug, Default, Serialize)]
pub(crate) struct DataParsoid {
    /// The node’s DOM source range.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dsr: Option<Dsr>,
    /// The token source range the node was built from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tsr: Option<Tsr>,
    /// Raw source for nodes whose source is not recoverable from offsets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// The syntax variant that produced the node, e.g. `"html"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stx: Option<String>,
    /// The node was foster-parented out of a table by the tree builder.
    #[serde(skip_serializing_if = "is_false")]
    pub fostered: bool,
    /// The name of the first wikitext node in an encapsulated range, for
    /// serializer newline-constraint resolution.
    #[serde(rename = "firstWikitextNode", skip_serializing_if = "Option::is_none")]
    pub first_wikitext_node: Option<String>,
    /// Per-template parameter source offsets for an encapsulated range.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pi: Vec<Vec<ParamInfo>>,
    /// Pass scratch.
    #[serde(skip)]
    pub tmp: TempData,
}

/// The records attached to one node.
#[derive(Clone, Debug, Default)]
pub(crate) struct NodeData {
    /// Syntactic round-trip metadata.
    pub parsoid: DataParsoid,
    /// Semantic metadata: template parts, extension arguments, captions.
    pub mw: Option<serde_json::Value>,
}

/// The per-document pair of side-tables persisted alongside the HTML,
/// keyed by the id attributes assigned at cleanup.
#[derive(Debug, Default, Serialize)]
pub(crate) struct PageBundle {
    /// `data-parsoid` records by node id.
    pub parsoid: IndexMap<String, serde_json::Value>,
    /// `data-mw` records by node id.
    pub mw: IndexMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsr_serializes_as_tuple() {
        let dsr = Dsr::new(0, 10, 2, 2);
        assert_eq!(
            serde_json::to_string(&dsr).unwrap(),
            "[0,10,2,2]".to_string()
        );

        let partial = Dsr {
            start: Some(3),
            ..Dsr::default()
        };
        assert_eq!(
            serde_json::to_string(&partial).unwrap(),
            "[3,null,null,null]".to_string()
        );
    }

    #[test]
    fn empty_data_parsoid_is_empty_object() {
        let dp = DataParsoid::default();
        assert_eq!(serde_json::to_string(&dp).unwrap(), "{}".to_string());
    }
}
