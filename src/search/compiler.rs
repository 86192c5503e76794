//! Compilation of [`SearchQuery`] into parameterized SQL.

use rusqlite::types::Value;

use super::{GroupBy, Orientation, SearchQuery, SortOrder, SourceSet};

/// Characters stripped from terms before they become match parameters:
/// statement separators, comment-marker and quote characters, and the
/// LIKE/FTS wildcard metacharacters. Binding makes injection impossible;
/// the stripping keeps stray operators from changing match semantics.
const STRIPPED: &[char] = &[';', '\'', '"', '`', '*', '%', '/', '\\', '-'];

/// A compiled, executor-ready search statement.
///
/// `sql` contains only structural syntax assembled from trusted fragments;
/// every piece of user-supplied content rides in `params`. Compilation is
/// deterministic, so compiled queries may be cached by normalized input.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Value>,
    /// Number of text terms that survived sanitization.
    pub term_count: usize,
}

/// Compile a query against the given source tables.
///
/// Zero surviving terms and zero filters compile to match-all; that is a
/// valid query, not an error.
pub fn compile(query: &SearchQuery, sources: &SourceSet) -> CompiledQuery {
    let terms = tokenize(&query.text);

    let mut predicates: Vec<String> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    for term in &terms {
        predicates.push(term_fragment(query, sources, term, &mut params));
    }
    push_filters(query, &mut predicates, &mut params);

    let mut sql = String::from("SELECT p.id, p.path, p.filename FROM photos p");
    if !predicates.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }
    sql.push_str(" ORDER BY ");
    sql.push_str(&order_clause(query));

    CompiledQuery {
        sql,
        params,
        term_count: terms.len(),
    }
}

/// Split free text on whitespace and sanitize each token. Tokens emptied by
/// sanitization are dropped, not errors.
fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(sanitize_term)
        .filter(|t| !t.is_empty())
        .collect()
}

fn sanitize_term(raw: &str) -> String {
    raw.chars().filter(|c| !STRIPPED.contains(c)).collect()
}

/// One per-term fragment: the image must match this term through at least
/// one enabled source. Keyword tags always participate; AI object tags and
/// person names only with `include_ai_tags`; captions unless `tags_only`.
fn term_fragment(
    query: &SearchQuery,
    sources: &SourceSet,
    term: &str,
    params: &mut Vec<Value>,
) -> String {
    // FTS5 prefix query: quoted term, trailing star. The term itself is
    // bound, never spliced into the statement.
    let match_param = format!("\"{}\"*", term);

    let mut tables: Vec<&str> = vec![&sources.keywords];
    if query.include_ai_tags {
        tables.push(&sources.objects);
        tables.push(&sources.people);
    }
    if !query.tags_only {
        tables.push(&sources.captions);
    }

    let union = tables
        .iter()
        .map(|table| {
            params.push(Value::Text(match_param.clone()));
            format!("SELECT photo_id FROM {table} WHERE {table} MATCH ?")
        })
        .collect::<Vec<_>>()
        .join(" UNION ");

    format!("p.id IN ({union})")
}

fn push_filters(query: &SearchQuery, predicates: &mut Vec<String>, params: &mut Vec<Value>) {
    if let Some(folder) = &query.folder {
        predicates.push("(p.directory = ? OR p.directory LIKE ?)".to_string());
        params.push(Value::Text(folder.clone()));
        params.push(Value::Text(format!("{}/%", folder.trim_end_matches('/'))));
    }
    if let Some(tag_id) = query.tag_id {
        predicates.push("p.id IN (SELECT photo_id FROM photo_tags WHERE tag_id = ?)".to_string());
        params.push(Value::Integer(tag_id));
    }
    if let Some(person_id) = query.person_id {
        predicates.push("p.id IN (SELECT photo_id FROM faces WHERE person_id = ?)".to_string());
        params.push(Value::Integer(person_id));
    }
    if let Some(camera) = &query.camera_model {
        predicates.push("p.camera_model = ?".to_string());
        params.push(Value::Text(camera.clone()));
    }
    if let Some(lens) = &query.lens {
        predicates.push("p.lens = ?".to_string());
        params.push(Value::Text(lens.clone()));
    }
    if let Some(after) = query.taken_after {
        predicates.push("date(p.taken_at) >= ?".to_string());
        params.push(Value::Text(after.format("%Y-%m-%d").to_string()));
    }
    if let Some(before) = query.taken_before {
        predicates.push("date(p.taken_at) <= ?".to_string());
        params.push(Value::Text(before.format("%Y-%m-%d").to_string()));
    }
    if let Some(min) = query.min_size_bytes {
        predicates.push("p.size_bytes >= ?".to_string());
        params.push(Value::Integer(min));
    }
    if let Some(max) = query.max_size_bytes {
        predicates.push("p.size_bytes <= ?".to_string());
        params.push(Value::Integer(max));
    }
    if let Some(rating) = query.min_rating {
        predicates.push("p.rating >= ?".to_string());
        params.push(Value::Integer(rating as i64));
    }
    if let Some(orientation) = query.orientation {
        predicates.push(
            match orientation {
                Orientation::Landscape => "p.width > p.height",
                Orientation::Portrait => "p.width < p.height",
                Orientation::Square => "p.width = p.height",
            }
            .to_string(),
        );
    }
}

fn order_clause(query: &SearchQuery) -> String {
    let mut keys: Vec<&str> = Vec::new();
    match query.group_by {
        GroupBy::None => {}
        GroupBy::Folder => keys.push("p.directory ASC"),
        GroupBy::CaptureDate => keys.push("date(p.taken_at) DESC"),
    }
    keys.push(match query.sort {
        SortOrder::NewestFirst => "p.taken_at DESC",
        SortOrder::OldestFirst => "p.taken_at ASC",
        SortOrder::Filename => "p.filename COLLATE NOCASE ASC",
        SortOrder::LargestFirst => "p.size_bytes DESC",
    });
    keys.push("p.id ASC");
    keys.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> SourceSet {
        SourceSet::default()
    }

    #[test]
    fn empty_query_matches_all() {
        let compiled = compile(&SearchQuery::default(), &sources());
        assert!(!compiled.sql.contains("WHERE"));
        assert!(compiled.params.is_empty());
        assert_eq!(compiled.term_count, 0);
    }

    #[test]
    fn whitespace_only_text_skips_text_stage() {
        let compiled = compile(&SearchQuery::text("   \t  "), &sources());
        assert_eq!(compiled.term_count, 0);
        assert!(!compiled.sql.contains("MATCH"));
    }

    #[test]
    fn each_term_gets_its_own_anded_fragment() {
        let compiled = compile(&SearchQuery::text("sunset beach"), &sources());
        assert_eq!(compiled.term_count, 2);
        assert_eq!(compiled.sql.matches("p.id IN (SELECT").count(), 2);
        assert!(compiled.sql.contains(") AND p.id IN ("));
    }

    #[test]
    fn sources_union_within_a_term() {
        let query = SearchQuery {
            include_ai_tags: true,
            ..SearchQuery::text("dog")
        };
        let compiled = compile(&query, &sources());
        for table in ["keyword_fts", "object_fts", "person_fts", "caption_fts"] {
            assert!(compiled.sql.contains(table), "missing source {table}");
        }
        assert_eq!(compiled.sql.matches(" UNION ").count(), 3);
        // One bound copy of the match string per source.
        assert_eq!(compiled.params.len(), 4);
    }

    #[test]
    fn ai_sources_gated_by_flag() {
        let compiled = compile(&SearchQuery::text("dog"), &sources());
        assert!(compiled.sql.contains("keyword_fts"));
        assert!(compiled.sql.contains("caption_fts"));
        assert!(!compiled.sql.contains("object_fts"));
        assert!(!compiled.sql.contains("person_fts"));
    }

    #[test]
    fn tags_only_excludes_captions() {
        let query = SearchQuery {
            tags_only: true,
            ..SearchQuery::text("dog")
        };
        let compiled = compile(&query, &sources());
        assert!(compiled.sql.contains("keyword_fts"));
        assert!(!compiled.sql.contains("caption_fts"));
    }

    #[test]
    fn terms_are_bound_not_spliced() {
        let compiled = compile(&SearchQuery::text("sunset"), &sources());
        assert!(!compiled.sql.contains("sunset"));
        assert_eq!(
            compiled.params,
            vec![Value::Text("\"sunset\"*".to_string()), Value::Text("\"sunset\"*".to_string())]
        );
    }

    #[test]
    fn separators_are_stripped_from_terms() {
        let compiled = compile(&SearchQuery::text("beach;drop"), &sources());
        assert_eq!(compiled.term_count, 1);
        assert!(!compiled.sql.contains(';'));
        match &compiled.params[0] {
            Value::Text(t) => assert_eq!(t, "\"beachdrop\"*"),
            other => panic!("expected text param, got {other:?}"),
        }
    }

    #[test]
    fn fully_sanitized_term_is_dropped() {
        let compiled = compile(&SearchQuery::text("';--' beach"), &sources());
        assert_eq!(compiled.term_count, 1);
    }

    #[test]
    fn filters_compile_without_text() {
        let query = SearchQuery {
            folder: Some("/photos/2024".to_string()),
            min_rating: Some(3),
            orientation: Some(Orientation::Portrait),
            ..SearchQuery::default()
        };
        let compiled = compile(&query, &sources());
        assert!(compiled.sql.contains("p.directory"));
        assert!(compiled.sql.contains("p.rating >= ?"));
        assert!(compiled.sql.contains("p.width < p.height"));
        assert_eq!(compiled.params.len(), 3);
    }

    #[test]
    fn grouping_and_sort_shape_the_order_clause() {
        let query = SearchQuery {
            group_by: GroupBy::Folder,
            sort: SortOrder::Filename,
            ..SearchQuery::default()
        };
        let compiled = compile(&query, &sources());
        assert!(compiled
            .sql
            .ends_with("ORDER BY p.directory ASC, p.filename COLLATE NOCASE ASC, p.id ASC"));
    }

    #[test]
    fn compilation_is_deterministic() {
        let query = SearchQuery {
            include_ai_tags: true,
            folder: Some("/p".to_string()),
            ..SearchQuery::text("red panda")
        };
        assert_eq!(compile(&query, &sources()), compile(&query, &sources()));
    }
}
