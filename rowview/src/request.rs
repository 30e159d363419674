use serde_json::Value;

use crate::{Generation, Page, Row, RowSource, SeekResult, SourceResult};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RequestId(pub u64);

#[derive(Clone, Debug, PartialEq)]
pub enum FetchKind {
    FromStart,
    From { index: usize },
    Before { index: usize },
    Seek { key: Value },
}

/// A row source call queued by the viewer, tagged with the generation it belongs to.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchRequest {
    pub id: RequestId,
    pub generation: Generation,
    pub kind: FetchKind,
}

impl FetchRequest {
    /// Runs the request against `source` and wraps the result for
    /// [`crate::Viewer::apply_response`].
    pub fn execute<S: RowSource + ?Sized>(&self, source: &mut S) -> FetchResponse {
        let result = match &self.kind {
            FetchKind::FromStart => FetchResult::Page(source.rows_from_start()),
            FetchKind::From { index } => FetchResult::Page(source.rows_from(*index)),
            FetchKind::Before { index } => FetchResult::Before(source.rows_before(*index)),
            FetchKind::Seek { key } => FetchResult::Seek(source.seek(key)),
        };
        self.respond(result)
    }

    pub fn respond(&self, result: FetchResult) -> FetchResponse {
        FetchResponse {
            id: self.id,
            generation: self.generation,
            result,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FetchResult {
    Page(SourceResult<Page>),
    Before(SourceResult<Vec<Row>>),
    Seek(SourceResult<SeekResult>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FetchResponse {
    pub id: RequestId,
    pub generation: Generation,
    pub result: FetchResult,
}
