//! Wire-level query API
//!
//! One request envelope covers every query operation, so transports (HTTP,
//! CLI JSON mode) share a single dispatch path. Query failures travel in
//! the response envelope with their kind tag; they are never transport
//! errors.

use crate::node::ThemeId;
use crate::query::{
    CancelToken, Chain, LookupResult, QueryEngine, QueryError, SearchHit, ThemeRelation,
    TraceSeed,
};
use serde::{Deserialize, Serialize};

/// A query request, tagged by operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum QueryRequest {
    Lookup {
        reference: String,
    },
    Search {
        keywords: Vec<String>,
        limit: Option<usize>,
    },
    TraceTheme {
        seed: String,
        max_depth: Option<usize>,
    },
    RelatedThemes {
        theme: String,
    },
}

/// Successful payload, one variant per operation.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum QueryResult {
    Lookup(LookupResult),
    Search(Vec<SearchHit>),
    Trace(Chain),
    Related(Vec<ThemeRelation>),
}

/// Response envelope: `ok` plus either a result or a tagged error.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<QueryResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<QueryError>,
}

impl QueryResponse {
    pub fn success(result: QueryResult) -> Self {
        Self { ok: true, result: Some(result), error: None }
    }

    pub fn failure(error: QueryError) -> Self {
        Self { ok: false, result: None, error: Some(error) }
    }
}

/// Run one request against an engine.
pub fn dispatch(
    engine: &QueryEngine<'_>,
    request: &QueryRequest,
    cancel: &CancelToken,
) -> QueryResponse {
    let outcome: Result<QueryResult, QueryError> = match request {
        QueryRequest::Lookup { reference } => {
            engine.lookup(reference).map(QueryResult::Lookup)
        }
        QueryRequest::Search { keywords, limit } => {
            let mut hits = engine.search(keywords);
            if let Some(limit) = limit {
                hits.truncate(*limit);
            }
            Ok(QueryResult::Search(hits))
        }
        QueryRequest::TraceTheme { seed, max_depth } => {
            let seed = TraceSeed::parse(seed);
            let depth = max_depth.unwrap_or(engine.max_trace_depth());
            engine.trace(&seed, depth, cancel).map(QueryResult::Trace)
        }
        QueryRequest::RelatedThemes { theme } => engine
            .related_themes(&ThemeId::from_label(theme))
            .map(QueryResult::Related),
    };

    match outcome {
        Ok(result) => QueryResponse::success(result),
        Err(error) => QueryResponse::failure(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphStore;
    use crate::index::SearchIndex;
    use crate::parser::Parser;

    const CORPUS: &str = r#"
@verse GEN.15.6
And he believed in the LORD.

@note covenant GEN.15.6
The covenant of faith.
@theme Abrahamic Covenant
"#;

    fn fixture() -> (GraphStore, SearchIndex) {
        let (corpus, _) = Parser::new().parse(CORPUS).unwrap();
        let graph = GraphStore::build(corpus).unwrap();
        let index = SearchIndex::build(&graph).unwrap();
        (graph, index)
    }

    #[test]
    fn test_dispatch_lookup() {
        let (graph, index) = fixture();
        let engine = QueryEngine::new(&graph, &index);

        let request: QueryRequest =
            serde_json::from_str(r#"{"op": "lookup", "reference": "GEN.15.6"}"#).unwrap();
        let response = dispatch(&engine, &request, &CancelToken::new());
        assert!(response.ok);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["result"]["verses"][0]["id"], "GEN.15.6");
    }

    #[test]
    fn test_dispatch_search_with_limit() {
        let (graph, index) = fixture();
        let engine = QueryEngine::new(&graph, &index);

        let request = QueryRequest::Search {
            keywords: vec!["covenant".to_string()],
            limit: Some(1),
        };
        let response = dispatch(&engine, &request, &CancelToken::new());
        assert!(response.ok);
        assert!(matches!(response.result, Some(QueryResult::Search(ref hits)) if hits.len() == 1));
    }

    #[test]
    fn test_dispatch_trace_theme() {
        let (graph, index) = fixture();
        let engine = QueryEngine::new(&graph, &index);

        let request: QueryRequest = serde_json::from_str(
            r#"{"op": "traceTheme", "seed": "Abrahamic Covenant", "max_depth": 2}"#,
        )
        .unwrap();
        let response = dispatch(&engine, &request, &CancelToken::new());
        assert!(response.ok);
    }

    #[test]
    fn test_dispatch_related_themes() {
        let input = r#"
@verse GEN.15.6
And he believed.

@note covenant GEN.15.6
On the covenant of faith.
@theme Abrahamic Covenant
@theme Faith
"#;
        let (corpus, _) = Parser::new().parse(input).unwrap();
        let graph = GraphStore::build(corpus).unwrap();
        let index = SearchIndex::build(&graph).unwrap();
        let engine = QueryEngine::new(&graph, &index);

        let request: QueryRequest = serde_json::from_str(
            r#"{"op": "relatedThemes", "theme": "Abrahamic Covenant"}"#,
        )
        .unwrap();
        let response = dispatch(&engine, &request, &CancelToken::new());
        assert!(response.ok);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["result"][0]["label"], "Faith");
        assert_eq!(json["result"][0]["shared"], 1);
    }

    #[test]
    fn test_error_envelope_carries_kind() {
        let (graph, index) = fixture();
        let engine = QueryEngine::new(&graph, &index);

        let request = QueryRequest::Lookup { reference: "JOH.3.16".to_string() };
        let response = dispatch(&engine, &request, &CancelToken::new());
        assert!(!response.ok);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["error"]["kind"], "notfound");
        assert!(json["error"]["message"].is_string());
    }

    #[test]
    fn test_invalid_depth_reported_in_envelope() {
        let (graph, index) = fixture();
        let engine = QueryEngine::new(&graph, &index);

        let request = QueryRequest::TraceTheme {
            seed: "Abrahamic Covenant".to_string(),
            max_depth: Some(99),
        };
        let response = dispatch(&engine, &request, &CancelToken::new());
        assert!(!response.ok);
        assert!(matches!(response.error, Some(QueryError::InvalidDepth { .. })));
    }

    #[test]
    fn test_unknown_op_rejected_at_deserialization() {
        let parsed: Result<QueryRequest, _> =
            serde_json::from_str(r#"{"op": "dropTables"}"#);
        assert!(parsed.is_err());
    }
}
