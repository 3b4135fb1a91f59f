//! Heuristic rewrites that bound the worst case of a candidate query.
//!
//! Two rules, each a no-op on its own output:
//! - an unbounded query whose size is unknown or large gets a hard `LIMIT`;
//! - a single terminal `RETURN` over more than two `MATCH` clauses is folded
//!   into one deduplicated `aggregated_data` list plus its `total_count`.

use crate::cypher::{self, Token};

/// Column name introduced by the aggregation rewrite.
pub const AGGREGATED_COLUMN: &str = "aggregated_data";

/// Rewrite `query` so that it cannot return more than `row_limit` rows
/// unless it already says otherwise.
pub fn optimize(query: &str, estimated_rows: Option<usize>, row_limit: usize) -> String {
    let bounded = apply_limit(query, estimated_rows, row_limit);
    let optimized = apply_aggregation(&bounded).unwrap_or(bounded);

    if optimized != query {
        tracing::debug!(estimated_rows = ?estimated_rows, "Query rewritten by optimizer");
    }
    optimized
}

fn apply_limit(query: &str, estimated_rows: Option<usize>, row_limit: usize) -> String {
    let tokens = cypher::tokenize(query);
    let needs_limit = match estimated_rows {
        None => true,
        Some(n) => n > row_limit,
    };
    if cypher::contains(&tokens, "LIMIT") || !needs_limit {
        return query.to_string();
    }
    format!("{}\nLIMIT {row_limit}", trim_statement(query))
}

fn apply_aggregation(query: &str) -> Option<String> {
    if query.to_ascii_lowercase().contains(AGGREGATED_COLUMN) {
        return None;
    }

    let tokens = cypher::tokenize(query);
    if cypher::count(&tokens, "RETURN") != 1
        || cypher::count(&tokens, "MATCH") <= 2
        || cypher::contains(&tokens, "UNION")
    {
        return None;
    }

    let ret_idx = tokens.iter().position(|t| t.is("RETURN"))?;
    let mut items_start = tokens[ret_idx].end;
    let mut distinct = "";
    if let Some(next) = tokens.get(ret_idx + 1).filter(|t| t.is("DISTINCT")) {
        items_start = next.end;
        distinct = "DISTINCT ";
    }

    let tail_start = tokens[ret_idx + 1..]
        .iter()
        .find(|t| is_projection_tail(t))
        .map(|t| t.start)
        .unwrap_or(query.len());

    let items_text = query[items_start..tail_start].trim();
    if items_text.is_empty() || items_text == "*" {
        return None;
    }

    let items: Vec<(String, String)> = split_top_level(items_text)
        .into_iter()
        .map(|item| aliased(&item))
        .collect();

    let projection = items
        .iter()
        .map(|(expr, alias)| {
            if expr == alias {
                expr.clone()
            } else {
                format!("{expr} AS {alias}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    let map = items
        .iter()
        .map(|(_, alias)| format!("{alias}: {alias}"))
        .collect::<Vec<_>>()
        .join(", ");

    let head = query[..tokens[ret_idx].start].trim_end();
    let tail = trim_statement(&query[tail_start..]);
    let tail = if tail.is_empty() {
        String::new()
    } else {
        format!(" {tail}")
    };

    Some(format!(
        "{head}\nWITH {distinct}{projection}{tail}\n\
         WITH collect(DISTINCT {{{map}}}) AS {AGGREGATED_COLUMN}\n\
         RETURN {AGGREGATED_COLUMN}, size({AGGREGATED_COLUMN}) AS total_count"
    ))
}

fn is_projection_tail(token: &Token) -> bool {
    (token.is("ORDER") && token.next.is_some_and(|c| c.eq_ignore_ascii_case(&'b')))
        || token.is("SKIP")
        || token.is("LIMIT")
}

/// Strip trailing whitespace and statement terminators.
pub(crate) fn trim_statement(query: &str) -> &str {
    query.trim().trim_end_matches(';').trim_end()
}

/// Split a projection list on commas outside brackets and literals.
fn split_top_level(items: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut current = String::new();

    for c in items.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                current.push(c);
            }
            None => match c {
                '\'' | '"' | '`' => {
                    quote = Some(c);
                    current.push(c);
                }
                '(' | '[' | '{' => {
                    depth += 1;
                    current.push(c);
                }
                ')' | ']' | '}' => {
                    depth -= 1;
                    current.push(c);
                }
                ',' if depth == 0 => {
                    parts.push(current.trim().to_string());
                    current.clear();
                }
                _ => current.push(c),
            },
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// Split `expr AS alias`; unaliased expressions get a backtick-quoted alias
/// of their own text, which `WITH` requires for non-variable expressions.
fn aliased(item: &str) -> (String, String) {
    let tokens = cypher::tokenize(item);
    if let Some(as_token) = tokens.iter().rev().find(|t| t.is("AS")) {
        let alias = item[as_token.end..].trim();
        if is_identifier(alias) {
            return (item[..as_token.start].trim().to_string(), alias.to_string());
        }
    }

    if is_identifier(item) {
        return (item.to_string(), item.to_string());
    }
    let quoted = format!("`{}`", item.replace('`', "``"));
    (item.to_string(), quoted)
}

fn is_identifier(text: &str) -> bool {
    if text.len() >= 2 && text.starts_with('`') && text.ends_with('`') {
        return true;
    }
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
