//! Fluent, typed query assembler over [`crate::store::GraphStore`]: a
//! relation + fields + where/join/order/limit builder, plus a handful of
//! reusable parameterized [`Rule`] fragments for common graph traversals.

use crate::store::{QueryParams, QueryResult, QueryScript, QueryValue};

/// Closed set of comparison operators a `where` clause may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Like,
    Contains,
    IsNull,
    IsNotNull,
}

impl Op {
    fn as_str(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Gt => ">",
            Op::Gte => ">=",
            Op::Lt => "<",
            Op::Lte => "<=",
            Op::In => "IN",
            Op::Nin => "NOT IN",
            Op::Like => "LIKE",
            Op::Contains => "CONTAINS",
            Op::IsNull => "IS NULL",
            Op::IsNotNull => "IS NOT NULL",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Condition {
    field: String,
    op: Op,
    param: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone)]
pub struct Join {
    relation: String,
    on_field: String,
    to_field: String,
    kind: JoinKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct OrderBy {
    field: String,
    direction: OrderDirection,
}

#[derive(Debug, Clone)]
pub struct VectorSearchClause {
    pub vector: Vec<f32>,
    pub k: usize,
}

/// Converts a caller-facing field name (`camelCase` or arbitrary ASCII
/// mixed case) into the store-native `snake_case` the relations use.
///
/// ASCII-only by design: non-ASCII identifiers pass through unchanged
/// rather than being (incorrectly) case-folded.
pub fn to_store_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    for (i, c) in field.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i != 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Converts a store-native `snake_case` field name back to the
/// caller-facing `camelCase` form used when round-tripping result rows.
pub fn to_caller_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper_next = false;
    for c in field.chars() {
        if c == '_' {
            upper_next = true;
            continue;
        }
        if upper_next && c.is_ascii_alphabetic() {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Fluent assembler for a single query against one relation.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    relation: String,
    fields: Vec<String>,
    conditions: Vec<Condition>,
    joins: Vec<Join>,
    order: Vec<OrderBy>,
    limit: Option<usize>,
    offset: Option<usize>,
    vector_search: Option<VectorSearchClause>,
    params: QueryParams,
    next_param: u32,
}

impl QueryBuilder {
    pub fn new(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            fields: Vec::new(),
            conditions: Vec::new(),
            joins: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            vector_search: None,
            params: QueryParams::new(),
            next_param: 0,
        }
    }

    pub fn select(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|f| to_store_case(f)).collect();
        self
    }

    fn bind(&mut self, value: QueryValue) -> String {
        let name = format!("p{}", self.next_param);
        self.next_param += 1;
        self.params.insert(name.clone(), value);
        name
    }

    /// Add a `where` condition. `value` is `None` for `IsNull`/`IsNotNull`,
    /// which carry no parameter.
    pub fn filter(mut self, field: &str, op: Op, value: Option<QueryValue>) -> Self {
        let param = value.map(|v| self.bind(v));
        self.conditions.push(Condition {
            field: to_store_case(field),
            op,
            param,
        });
        self
    }

    pub fn join(mut self, relation: &str, on_field: &str, to_field: &str, kind: JoinKind) -> Self {
        self.joins.push(Join {
            relation: relation.to_string(),
            on_field: to_store_case(on_field),
            to_field: to_store_case(to_field),
            kind,
        });
        self
    }

    pub fn order_by(mut self, field: &str, direction: OrderDirection) -> Self {
        self.order.push(OrderBy {
            field: to_store_case(field),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn vector_search(mut self, vector: Vec<f32>, k: usize) -> Self {
        self.vector_search = Some(VectorSearchClause { vector, k });
        self
    }

    /// Assemble the parameterized script. No user value is ever written
    /// into `text`; every bound value travels in `params`.
    pub fn build(self) -> (QueryScript, QueryParams) {
        let mut text = String::new();
        text.push_str("SELECT ");
        if self.fields.is_empty() {
            text.push('*');
        } else {
            text.push_str(&self.fields.join(", "));
        }
        text.push_str(" FROM ");
        text.push_str(&self.relation);
        for join in &self.joins {
            let kw = match join.kind {
                JoinKind::Inner => "JOIN",
                JoinKind::Left => "LEFT JOIN",
            };
            text.push_str(&format!(
                " {} {} ON {}.{} = {}.{}",
                kw, join.relation, self.relation, join.on_field, join.relation, join.to_field
            ));
        }
        if !self.conditions.is_empty() {
            text.push_str(" WHERE ");
            let clauses: Vec<String> = self
                .conditions
                .iter()
                .map(|c| match &c.param {
                    Some(p) => format!("{} {} :{}", c.field, c.op.as_str(), p),
                    None => format!("{} {}", c.field, c.op.as_str()),
                })
                .collect();
            text.push_str(&clauses.join(" AND "));
        }
        if !self.order.is_empty() {
            text.push_str(" ORDER BY ");
            let clauses: Vec<String> = self
                .order
                .iter()
                .map(|o| {
                    let dir = match o.direction {
                        OrderDirection::Asc => "ASC",
                        OrderDirection::Desc => "DESC",
                    };
                    format!("{} {}", o.field, dir)
                })
                .collect();
            text.push_str(&clauses.join(", "));
        }
        if let Some(limit) = self.limit {
            text.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            text.push_str(&format!(" OFFSET {offset}"));
        }
        if let Some(vs) = &self.vector_search {
            text.push_str(&format!(" VECTOR_SEARCH(k={})", vs.k));
        }
        (QueryScript::new(self.relation, text), self.params)
    }

    /// Converts result rows' field names from store-native `snake_case`
    /// back to the caller-facing casing the fields were requested under.
    pub fn round_trip(result: QueryResult) -> QueryResult {
        let rows = result
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|(k, v)| (to_caller_case(&k), v))
                    .collect()
            })
            .collect();
        QueryResult {
            rows,
            stats: result.stats,
        }
    }
}

/// A reusable parameterized query fragment for a common traversal.
pub struct Rule;

impl Rule {
    /// All entities transitively reachable from `root_id` via `calls`
    /// edges.
    pub fn recursive_calls(root_id: &str) -> QueryBuilder {
        QueryBuilder::new("edges")
            .filter("kind", Op::Eq, Some(QueryValue::from("calls")))
            .filter("from_id", Op::Eq, Some(QueryValue::from(root_id)))
    }

    /// All files transitively reachable from `root_file_id` via `imports`
    /// edges.
    pub fn recursive_imports(root_file_id: &str) -> QueryBuilder {
        QueryBuilder::new("edges")
            .filter("kind", Op::Eq, Some(QueryValue::from("imports")))
            .filter("from_id", Op::Eq, Some(QueryValue::from(root_file_id)))
    }

    /// Every entity with an outgoing `calls` edge into `target_id`.
    pub fn caller_set(target_id: &str) -> QueryBuilder {
        QueryBuilder::new("edges")
            .filter("kind", Op::Eq, Some(QueryValue::from("calls")))
            .filter("to_id", Op::Eq, Some(QueryValue::from(target_id)))
    }

    /// The supertype chain for a class/interface entity.
    pub fn class_hierarchy(entity_id: &str) -> QueryBuilder {
        QueryBuilder::new("edges")
            .filter("kind", Op::Eq, Some(QueryValue::from("extends")))
            .filter("from_id", Op::Eq, Some(QueryValue::from(entity_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_case_conversion_round_trips_ascii() {
        assert_eq!(to_store_case("filePath"), "file_path");
        assert_eq!(to_caller_case("file_path"), "filePath");
    }

    #[test]
    fn non_ascii_field_names_pass_through() {
        assert_eq!(to_store_case("naïveField"), "naïve_field");
    }

    #[test]
    fn build_never_interpolates_filter_value_into_text() {
        let (script, params) = QueryBuilder::new("entities")
            .filter("name", Op::Eq, Some(QueryValue::from("'; DROP TABLE entities; --")))
            .build();
        assert!(!script.text.contains("DROP TABLE"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn is_null_condition_carries_no_parameter() {
        let (script, params) = QueryBuilder::new("entities")
            .filter("extends", Op::IsNull, None)
            .build();
        assert!(script.text.contains("IS NULL"));
        assert!(params.is_empty());
    }

    #[test]
    fn caller_set_rule_targets_calls_edges() {
        let (script, _) = Rule::caller_set("entity-123").build();
        assert!(script.text.contains("WHERE"));
        assert_eq!(script.relation, "edges");
    }
}
