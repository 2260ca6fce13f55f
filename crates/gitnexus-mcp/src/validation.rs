//! Schema validation for tool arguments.
//!
//! Raw `tools/call` arguments arrive as a free-form JSON mapping. The
//! validator checks them against the tool's schema and produces a typed
//! [`ToolArgs`] variant with defaults filled and enums canonicalized, so
//! everything downstream of this module works with normalized records.
//!
//! Validation always runs before the resilience wrapper: a rejection here
//! never touches the bridge and never counts against the circuit breaker.

use serde::Serialize;
use serde_json::{Map, Value};

use gitnexus_core::{GatewayError, ValidationIssue};

use crate::tools::names;

// ============================================================================
// Normalized argument records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextArgs {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchArgs {
    pub query: String,
    pub limit: u32,
    pub group_by_process: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CypherArgs {
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrepArgs {
    pub pattern: String,
    pub case_sensitive: bool,
    pub max_results: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadArgs {
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
}

/// What kind of entity `explore` is pointed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExploreKind {
    Symbol,
    Cluster,
    Process,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExploreArgs {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ExploreKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewArgs {
    pub show_processes: bool,
    pub show_clusters: bool,
    pub limit: u32,
}

/// Traversal direction for `impact`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Upstream,
    Downstream,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactArgs {
    pub target: String,
    pub direction: Direction,
    pub max_depth: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation_types: Option<Vec<String>>,
    pub include_tests: bool,
    pub min_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HighlightArgs {
    pub node_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Change-kind filter for `diff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffFilter {
    All,
    Added,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffArgs {
    pub baseline: String,
    pub include_content: bool,
    pub filter: DiffFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeepDiveArgs {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewFileArgs {
    pub file_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceFlowArgs {
    pub from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    pub max_steps: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FindSimilarArgs {
    pub name: String,
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestImpactArgs {
    pub changed_files: Vec<String>,
    pub max_depth: u32,
    pub suggest_tests: bool,
}

/// Validated, normalized arguments: one variant per tool.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolArgs {
    Context(ContextArgs),
    Search(SearchArgs),
    Cypher(CypherArgs),
    Grep(GrepArgs),
    Read(ReadArgs),
    Explore(ExploreArgs),
    Overview(OverviewArgs),
    Impact(ImpactArgs),
    Highlight(HighlightArgs),
    Diff(DiffArgs),
    DeepDive(DeepDiveArgs),
    ReviewFile(ReviewFileArgs),
    TraceFlow(TraceFlowArgs),
    FindSimilar(FindSimilarArgs),
    TestImpact(TestImpactArgs),
}

impl ToolArgs {
    /// The wire method the bridge forwards to the browser.
    pub fn method(&self) -> &'static str {
        match self {
            Self::Context(_) => names::CONTEXT,
            Self::Search(_) => names::SEARCH,
            Self::Cypher(_) => names::CYPHER,
            Self::Grep(_) => names::GREP,
            Self::Read(_) => names::READ,
            Self::Explore(_) => names::EXPLORE,
            Self::Overview(_) => names::OVERVIEW,
            Self::Impact(_) => names::IMPACT,
            Self::Highlight(_) => names::HIGHLIGHT,
            Self::Diff(_) => names::DIFF,
            Self::DeepDive(_) => names::DEEP_DIVE,
            Self::ReviewFile(_) => names::REVIEW_FILE,
            Self::TraceFlow(_) => names::TRACE_FLOW,
            Self::FindSimilar(_) => names::FIND_SIMILAR,
            Self::TestImpact(_) => names::TEST_IMPACT,
        }
    }

    /// The normalized argument mapping, with defaults materialized.
    pub fn params(&self) -> Value {
        let value = match self {
            Self::Context(a) => serde_json::to_value(a),
            Self::Search(a) => serde_json::to_value(a),
            Self::Cypher(a) => serde_json::to_value(a),
            Self::Grep(a) => serde_json::to_value(a),
            Self::Read(a) => serde_json::to_value(a),
            Self::Explore(a) => serde_json::to_value(a),
            Self::Overview(a) => serde_json::to_value(a),
            Self::Impact(a) => serde_json::to_value(a),
            Self::Highlight(a) => serde_json::to_value(a),
            Self::Diff(a) => serde_json::to_value(a),
            Self::DeepDive(a) => serde_json::to_value(a),
            Self::ReviewFile(a) => serde_json::to_value(a),
            Self::TraceFlow(a) => serde_json::to_value(a),
            Self::FindSimilar(a) => serde_json::to_value(a),
            Self::TestImpact(a) => serde_json::to_value(a),
        };
        value.expect("normalized args serialize to JSON")
    }
}

// ============================================================================
// Validator entry point
// ============================================================================

/// Validate raw arguments for `tool_name`.
///
/// Returns the normalized record, or `VALIDATION_ERROR` listing every failed
/// constraint. Tool names are addressed internally by their namespaced key.
pub fn validate(tool_name: &str, raw: &Value) -> Result<ToolArgs, GatewayError> {
    let empty = Map::new();
    let map = match raw {
        Value::Object(map) => map,
        Value::Null => &empty,
        _ => {
            return Err(GatewayError::Validation {
                tool: tool_name.to_string(),
                issues: vec![ValidationIssue::new("", "arguments must be an object")],
            });
        }
    };

    let key = names::namespaced(tool_name);
    let result = match key.as_str() {
        "gitnexus.context" => validate_context(map),
        "gitnexus.search" => validate_search(map),
        "gitnexus.cypher" => validate_cypher(map),
        "gitnexus.grep" => validate_grep(map),
        "gitnexus.read" => validate_read(map),
        "gitnexus.explore" => validate_explore(map),
        "gitnexus.overview" => validate_overview(map),
        "gitnexus.impact" => validate_impact(map),
        "gitnexus.highlight" => validate_highlight(map),
        "gitnexus.diff" => validate_diff(map),
        "gitnexus.deep_dive" => validate_deep_dive(map),
        "gitnexus.review_file" => validate_review_file(map),
        "gitnexus.trace_flow" => validate_trace_flow(map),
        "gitnexus.find_similar" => validate_find_similar(map),
        "gitnexus.test_impact" => validate_test_impact(map),
        _ => {
            return Err(GatewayError::ToolNotFound {
                name: tool_name.to_string(),
            })
        }
    };

    result.map_err(|issues| GatewayError::Validation {
        tool: tool_name.to_string(),
        issues,
    })
}

// ============================================================================
// Per-tool validators
// ============================================================================

fn validate_context(map: &Map<String, Value>) -> Result<ToolArgs, Vec<ValidationIssue>> {
    let mut reader = ArgReader::new(map, &[]);
    reader.finish()?;
    Ok(ToolArgs::Context(ContextArgs {}))
}

fn validate_search(map: &Map<String, Value>) -> Result<ToolArgs, Vec<ValidationIssue>> {
    let mut reader = ArgReader::new(map, &["query", "limit", "group_by_process"]);
    let query = reader.require_str("query");
    let limit = reader.opt_int("limit", 1, 100, 10);
    let group_by_process = reader.opt_bool("group_by_process", true);
    reader.finish()?;
    Ok(ToolArgs::Search(SearchArgs {
        query: query.expect("issues checked"),
        limit,
        group_by_process,
    }))
}

fn validate_cypher(map: &Map<String, Value>) -> Result<ToolArgs, Vec<ValidationIssue>> {
    let mut reader = ArgReader::new(map, &["query"]);
    let query = reader.require_str("query");
    reader.finish()?;
    Ok(ToolArgs::Cypher(CypherArgs {
        query: query.expect("issues checked"),
    }))
}

fn validate_grep(map: &Map<String, Value>) -> Result<ToolArgs, Vec<ValidationIssue>> {
    let mut reader = ArgReader::new(map, &["pattern", "case_sensitive", "max_results"]);
    let pattern = reader.require_str("pattern");
    let case_sensitive = reader.opt_bool("case_sensitive", false);
    let max_results = reader.opt_int("max_results", 1, 500, 50);
    reader.finish()?;
    Ok(ToolArgs::Grep(GrepArgs {
        pattern: pattern.expect("issues checked"),
        case_sensitive,
        max_results,
    }))
}

fn validate_read(map: &Map<String, Value>) -> Result<ToolArgs, Vec<ValidationIssue>> {
    let mut reader = ArgReader::new(map, &["file_path", "start_line", "end_line"]);
    let file_path = reader.require_str("file_path");
    let start_line = reader.opt_int_min("start_line", 1);
    let end_line = reader.opt_int_min("end_line", 1);
    if let (Some(start), Some(end)) = (start_line, end_line) {
        if end < start {
            reader.push("end_line", "end_line must be >= start_line");
        }
    }
    reader.finish()?;
    Ok(ToolArgs::Read(ReadArgs {
        file_path: file_path.expect("issues checked"),
        start_line,
        end_line,
    }))
}

fn validate_explore(map: &Map<String, Value>) -> Result<ToolArgs, Vec<ValidationIssue>> {
    let mut reader = ArgReader::new(map, &["name", "type"]);
    let name = reader.require_str("name");
    let kind = reader.require_enum("type", &["symbol", "cluster", "process"]);
    reader.finish()?;
    let kind = match kind.expect("issues checked").as_str() {
        "symbol" => ExploreKind::Symbol,
        "cluster" => ExploreKind::Cluster,
        _ => ExploreKind::Process,
    };
    Ok(ToolArgs::Explore(ExploreArgs {
        name: name.expect("issues checked"),
        kind,
    }))
}

fn validate_overview(map: &Map<String, Value>) -> Result<ToolArgs, Vec<ValidationIssue>> {
    let mut reader = ArgReader::new(map, &["show_processes", "show_clusters", "limit"]);
    let show_processes = reader.opt_bool("show_processes", true);
    let show_clusters = reader.opt_bool("show_clusters", true);
    let limit = reader.opt_int("limit", 1, 100, 20);
    reader.finish()?;
    Ok(ToolArgs::Overview(OverviewArgs {
        show_processes,
        show_clusters,
        limit,
    }))
}

fn validate_impact(map: &Map<String, Value>) -> Result<ToolArgs, Vec<ValidationIssue>> {
    let mut reader = ArgReader::new(
        map,
        &[
            "target",
            "direction",
            "max_depth",
            "relation_types",
            "include_tests",
            "min_confidence",
        ],
    );
    let target = reader.require_str("target");
    let direction = reader.require_enum("direction", &["upstream", "downstream"]);
    let max_depth = reader.opt_int("max_depth", 1, 10, 3);
    let relation_types = reader.opt_str_array("relation_types");
    let include_tests = reader.opt_bool("include_tests", false);
    let min_confidence = reader.opt_float("min_confidence", 0.0, 1.0, 0.7);
    reader.finish()?;
    let direction = match direction.expect("issues checked").as_str() {
        "upstream" => Direction::Upstream,
        _ => Direction::Downstream,
    };
    Ok(ToolArgs::Impact(ImpactArgs {
        target: target.expect("issues checked"),
        direction,
        max_depth,
        relation_types,
        include_tests,
        min_confidence,
    }))
}

fn validate_highlight(map: &Map<String, Value>) -> Result<ToolArgs, Vec<ValidationIssue>> {
    let mut reader = ArgReader::new(map, &["node_ids", "color"]);
    let node_ids = reader.require_str_array("node_ids");
    let color = reader.opt_str("color");
    reader.finish()?;
    Ok(ToolArgs::Highlight(HighlightArgs {
        node_ids: node_ids.expect("issues checked"),
        color,
    }))
}

fn validate_diff(map: &Map<String, Value>) -> Result<ToolArgs, Vec<ValidationIssue>> {
    let mut reader = ArgReader::new(map, &["baseline", "include_content", "filter"]);
    let baseline = reader.opt_str("baseline").unwrap_or_else(|| "last_index".to_string());
    let include_content = reader.opt_bool("include_content", false);
    let filter = reader.opt_enum("filter", &["all", "added", "modified", "deleted"], "all");
    reader.finish()?;
    let filter = match filter.as_str() {
        "added" => DiffFilter::Added,
        "modified" => DiffFilter::Modified,
        "deleted" => DiffFilter::Deleted,
        _ => DiffFilter::All,
    };
    Ok(ToolArgs::Diff(DiffArgs {
        baseline,
        include_content,
        filter,
    }))
}

fn validate_deep_dive(map: &Map<String, Value>) -> Result<ToolArgs, Vec<ValidationIssue>> {
    let mut reader = ArgReader::new(map, &["name"]);
    let name = reader.require_str("name");
    reader.finish()?;
    Ok(ToolArgs::DeepDive(DeepDiveArgs {
        name: name.expect("issues checked"),
    }))
}

fn validate_review_file(map: &Map<String, Value>) -> Result<ToolArgs, Vec<ValidationIssue>> {
    let mut reader = ArgReader::new(map, &["file_path"]);
    let file_path = reader.require_str("file_path");
    reader.finish()?;
    Ok(ToolArgs::ReviewFile(ReviewFileArgs {
        file_path: file_path.expect("issues checked"),
    }))
}

fn validate_trace_flow(map: &Map<String, Value>) -> Result<ToolArgs, Vec<ValidationIssue>> {
    let mut reader = ArgReader::new(map, &["from", "to", "max_steps"]);
    let from = reader.require_str("from");
    let to = reader.opt_str("to");
    let max_steps = reader.opt_int("max_steps", 1, 20, 10);
    reader.finish()?;
    Ok(ToolArgs::TraceFlow(TraceFlowArgs {
        from: from.expect("issues checked"),
        to,
        max_steps,
    }))
}

fn validate_find_similar(map: &Map<String, Value>) -> Result<ToolArgs, Vec<ValidationIssue>> {
    let mut reader = ArgReader::new(map, &["name", "limit"]);
    let name = reader.require_str("name");
    let limit = reader.opt_int("limit", 1, 20, 5);
    reader.finish()?;
    Ok(ToolArgs::FindSimilar(FindSimilarArgs {
        name: name.expect("issues checked"),
        limit,
    }))
}

fn validate_test_impact(map: &Map<String, Value>) -> Result<ToolArgs, Vec<ValidationIssue>> {
    let mut reader = ArgReader::new(map, &["changed_files", "max_depth", "suggest_tests"]);
    let changed_files = reader.require_str_array("changed_files");
    let max_depth = reader.opt_int("max_depth", 1, 5, 2);
    let suggest_tests = reader.opt_bool("suggest_tests", true);
    reader.finish()?;
    Ok(ToolArgs::TestImpact(TestImpactArgs {
        changed_files: changed_files.expect("issues checked"),
        max_depth,
        suggest_tests,
    }))
}

// ============================================================================
// Field reader
// ============================================================================

/// Collects issues while reading typed fields out of the raw mapping.
///
/// Every accessor records an issue instead of failing early, so the agent
/// sees all problems in one response.
struct ArgReader<'a> {
    map: &'a Map<String, Value>,
    issues: Vec<ValidationIssue>,
}

impl<'a> ArgReader<'a> {
    fn new(map: &'a Map<String, Value>, allowed: &'static [&'static str]) -> Self {
        let mut issues = Vec::new();
        for key in map.keys() {
            if !allowed.contains(&key.as_str()) {
                issues.push(ValidationIssue::new(key.clone(), "unknown field"));
            }
        }
        Self { map, issues }
    }

    fn push(&mut self, path: &str, message: &str) {
        self.issues.push(ValidationIssue::new(path, message));
    }

    /// Required non-empty string.
    fn require_str(&mut self, key: &str) -> Option<String> {
        match self.map.get(key) {
            Some(Value::String(s)) => {
                if s.is_empty() {
                    self.push(key, &format!("{key} cannot be empty"));
                    None
                } else {
                    Some(s.clone())
                }
            }
            Some(_) => {
                self.push(key, "must be a string");
                None
            }
            None => {
                self.push(key, "is required");
                None
            }
        }
    }

    /// Optional string; absent stays absent.
    fn opt_str(&mut self, key: &str) -> Option<String> {
        match self.map.get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.push(key, "must be a string");
                None
            }
            None => None,
        }
    }

    /// Optional boolean with default.
    fn opt_bool(&mut self, key: &str, default: bool) -> bool {
        match self.map.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(_) => {
                self.push(key, "must be a boolean");
                default
            }
            None => default,
        }
    }

    /// Optional integer in `[min, max]` with default.
    fn opt_int(&mut self, key: &str, min: i64, max: i64, default: u32) -> u32 {
        match self.map.get(key) {
            Some(value) => match value.as_i64() {
                Some(n) if n >= min && n <= max => n as u32,
                Some(_) => {
                    self.push(key, &format!("must be between {min} and {max}"));
                    default
                }
                None => {
                    self.push(key, "must be an integer");
                    default
                }
            },
            None => default,
        }
    }

    /// Optional integer with a lower bound and no default.
    fn opt_int_min(&mut self, key: &str, min: i64) -> Option<u32> {
        match self.map.get(key) {
            Some(value) => match value.as_i64() {
                Some(n) if n >= min => Some(n as u32),
                Some(_) => {
                    self.push(key, &format!("must be >= {min}"));
                    None
                }
                None => {
                    self.push(key, "must be an integer");
                    None
                }
            },
            None => None,
        }
    }

    /// Optional number in `[min, max]` with default.
    fn opt_float(&mut self, key: &str, min: f64, max: f64, default: f64) -> f64 {
        match self.map.get(key) {
            Some(value) => match value.as_f64() {
                Some(n) if n.is_finite() && n >= min && n <= max => n,
                Some(_) => {
                    self.push(key, &format!("must be between {min} and {max}"));
                    default
                }
                None => {
                    self.push(key, "must be a number");
                    default
                }
            },
            None => default,
        }
    }

    /// Required enum member; input is canonicalized to lowercase.
    fn require_enum(&mut self, key: &str, allowed: &[&str]) -> Option<String> {
        match self.map.get(key) {
            Some(Value::String(s)) => {
                let canonical = s.trim().to_ascii_lowercase();
                if allowed.contains(&canonical.as_str()) {
                    Some(canonical)
                } else {
                    self.push(key, &format!("must be one of: {}", allowed.join(", ")));
                    None
                }
            }
            Some(_) => {
                self.push(key, "must be a string");
                None
            }
            None => {
                self.push(key, "is required");
                None
            }
        }
    }

    /// Optional enum member with default; input is canonicalized to lowercase.
    fn opt_enum(&mut self, key: &str, allowed: &[&str], default: &str) -> String {
        match self.map.get(key) {
            Some(Value::String(s)) => {
                let canonical = s.trim().to_ascii_lowercase();
                if allowed.contains(&canonical.as_str()) {
                    canonical
                } else {
                    self.push(key, &format!("must be one of: {}", allowed.join(", ")));
                    default.to_string()
                }
            }
            Some(_) => {
                self.push(key, "must be a string");
                default.to_string()
            }
            None => default.to_string(),
        }
    }

    /// Required array of strings with at least one element.
    fn require_str_array(&mut self, key: &str) -> Option<Vec<String>> {
        match self.map.get(key) {
            Some(Value::Array(items)) => {
                if items.is_empty() {
                    self.push(key, &format!("{key} cannot be empty"));
                    return None;
                }
                let mut out = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    match item {
                        Value::String(s) if !s.is_empty() => out.push(s.clone()),
                        Value::String(_) => {
                            self.push(&format!("{key}[{index}]"), "cannot be empty");
                        }
                        _ => {
                            self.push(&format!("{key}[{index}]"), "must be a string");
                        }
                    }
                }
                Some(out)
            }
            Some(_) => {
                self.push(key, "must be an array of strings");
                None
            }
            None => {
                self.push(key, "is required");
                None
            }
        }
    }

    /// Optional array of strings; absent stays absent.
    fn opt_str_array(&mut self, key: &str) -> Option<Vec<String>> {
        match self.map.get(key) {
            Some(Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    match item {
                        Value::String(s) => out.push(s.clone()),
                        _ => self.push(&format!("{key}[{index}]"), "must be a string"),
                    }
                }
                Some(out)
            }
            Some(_) => {
                self.push(key, "must be an array of strings");
                None
            }
            None => None,
        }
    }

    fn finish(self) -> Result<(), Vec<ValidationIssue>> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(self.issues)
        }
    }
}
