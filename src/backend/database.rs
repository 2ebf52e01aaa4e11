//! Relational search backend over per-field SQLite tables.
//!
//! Storage layout, per index: one items table `(item_id, datasource,
//! language)`, one table per scalar field `(item_id, value)`, and one word
//! table per fulltext field `(item_id, word, score)` holding lowercased
//! tokens with boost-scaled scores.
//!
//! Query execution translates each leaf of the condition tree and each
//! keyword into a SQL lookup returning candidate item ids, then combines
//! the candidate sets in memory: intersection for AND, union for OR, and
//! complement against the items table for negation. Scores are summed word
//! scores for fulltext matches and a flat 1.0 for pure filter matches.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use ahash::{AHashMap, AHashSet};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, params, params_from_iter};
use serde_json::Value;
use tracing::debug;

use super::SearchBackend;
use crate::error::{Error, Result};
use crate::index::{Field, Index};
use crate::parse::{Conjunction, KeyExpr, Keys};
use crate::query::{
    Condition, ConditionGroup, ConditionItem, ResultItem, ResultSet, SORT_ITEM_ID, SORT_RELEVANCE,
    SearchQuery, SortOrder,
};
use crate::types::FieldValue;

/// Fulltext candidates: item id to accumulated score and matched words.
type Hits = AHashMap<String, Hit>;

#[derive(Debug, Clone, Default)]
struct Hit {
    score: f32,
    words: Vec<String>,
}

impl Hit {
    /// Score assigned to items matched by filters alone.
    fn filter_match() -> Self {
        Self {
            score: 1.0,
            words: Vec::new(),
        }
    }
}

/// SQLite-backed [`SearchBackend`].
pub struct Database {
    conn: Mutex<Connection>,
    prefix: String,
    min_word_length: usize,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    /// In-memory database, mainly for tests and throwaway indexes.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            prefix: "quarry".to_string(),
            min_word_length: 1,
        }
    }

    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Fulltext keywords shorter than this are skipped and reported in the
    /// result set's ignored list.
    pub fn with_min_word_length(mut self, length: usize) -> Self {
        self.min_word_length = length;
        self
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn items_table(&self, index: &Index) -> String {
        format!("{}_{}_items", self.prefix, sanitize_identifier(index.id()))
    }

    fn field_table(&self, index: &Index, field_id: &str) -> String {
        format!(
            "{}_{}_{}",
            self.prefix,
            sanitize_identifier(index.id()),
            sanitize_identifier(field_id)
        )
    }

    /// Create the items table and one table per field of `index`.
    pub fn create_index_tables(&self, index: &Index) -> Result<()> {
        let conn = self.conn();
        let items = self.items_table(index);
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {items} (
                item_id TEXT PRIMARY KEY,
                datasource TEXT NOT NULL,
                language TEXT NOT NULL DEFAULT 'und'
            );"
        ))?;
        for field in index.fields().values() {
            let table = self.field_table(index, field.field_id());
            if field.data_type() == "text" {
                conn.execute_batch(&format!(
                    "CREATE TABLE IF NOT EXISTS {table} (
                        item_id TEXT NOT NULL,
                        word TEXT NOT NULL,
                        score REAL NOT NULL DEFAULT 1.0
                    );
                    CREATE INDEX IF NOT EXISTS {table}_word ON {table} (word);"
                ))?;
            } else {
                conn.execute_batch(&format!(
                    "CREATE TABLE IF NOT EXISTS {table} (
                        item_id TEXT NOT NULL,
                        value
                    );
                    CREATE INDEX IF NOT EXISTS {table}_value ON {table} (value);"
                ))?;
            }
        }
        Ok(())
    }

    /// Ingest one item's prepared field values.
    ///
    /// Replaces any previously indexed version of the item. Text values
    /// are stored one row per token (falling back to a whitespace split
    /// when the value carries no token list) with the token boost scaled
    /// by the field boost; scalar values are stored as-is. Repeating a
    /// field id in `values` stores a multi-valued field.
    pub fn index_item(
        &self,
        index: &Index,
        datasource: &str,
        item_id: &str,
        language: &str,
        values: &[(&str, FieldValue)],
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let items = self.items_table(index);
        tx.execute(
            &format!("DELETE FROM {items} WHERE item_id = ?1"),
            params![item_id],
        )?;
        for field in index.fields().values() {
            let table = self.field_table(index, field.field_id());
            tx.execute(
                &format!("DELETE FROM {table} WHERE item_id = ?1"),
                params![item_id],
            )?;
        }
        tx.execute(
            &format!("INSERT INTO {items} (item_id, datasource, language) VALUES (?1, ?2, ?3)"),
            params![item_id, datasource, language],
        )?;
        for (field_id, value) in values {
            let field = index.field(field_id).ok_or_else(|| {
                Error::config(format!(
                    "cannot index unknown field '{field_id}' on index '{}'",
                    index.id()
                ))
            })?;
            let table = self.field_table(index, field.field_id());
            if field.data_type() == "text" {
                for (word, score) in text_tokens(value, field.boost()) {
                    if word.is_empty() {
                        continue;
                    }
                    tx.execute(
                        &format!(
                            "INSERT INTO {table} (item_id, word, score) VALUES (?1, ?2, ?3)"
                        ),
                        params![item_id, word, score as f64],
                    )?;
                }
            } else {
                tx.execute(
                    &format!("INSERT INTO {table} (item_id, value) VALUES (?1, ?2)"),
                    params![item_id, field_value_to_sql(value)],
                )?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Remove one item from the index tables.
    pub fn delete_item(&self, index: &Index, item_id: &str) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let items = self.items_table(index);
        tx.execute(
            &format!("DELETE FROM {items} WHERE item_id = ?1"),
            params![item_id],
        )?;
        for field in index.fields().values() {
            let table = self.field_table(index, field.field_id());
            tx.execute(
                &format!("DELETE FROM {table} WHERE item_id = ?1"),
                params![item_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn eval_condition_group(
        &self,
        conn: &Connection,
        index: &Index,
        group: &ConditionGroup,
        universe: &AHashSet<String>,
    ) -> Result<Option<AHashSet<String>>> {
        let mut combined: Option<AHashSet<String>> = None;
        for item in &group.items {
            let Some(set) = self.eval_condition_item(conn, index, item, universe)? else {
                continue;
            };
            combined = Some(match (combined, group.conjunction) {
                (None, _) => set,
                (Some(acc), Conjunction::And) => acc.intersection(&set).cloned().collect(),
                (Some(acc), Conjunction::Or) => acc.union(&set).cloned().collect(),
            });
        }
        Ok(combined)
    }

    fn eval_condition_item(
        &self,
        conn: &Connection,
        index: &Index,
        item: &ConditionItem,
        universe: &AHashSet<String>,
    ) -> Result<Option<AHashSet<String>>> {
        match item {
            ConditionItem::Condition(condition) => {
                Ok(Some(self.eval_condition(conn, index, condition, universe)?))
            }
            ConditionItem::Group(group) => self.eval_condition_group(conn, index, group, universe),
            ConditionItem::Negated(inner) => Ok(self
                .eval_condition_item(conn, index, inner, universe)?
                .map(|set| universe.iter().filter(|id| !set.contains(*id)).cloned().collect())),
        }
    }

    /// Translate one leaf condition into a SQL lookup.
    fn eval_condition(
        &self,
        conn: &Connection,
        index: &Index,
        condition: &Condition,
        universe: &AHashSet<String>,
    ) -> Result<AHashSet<String>> {
        let field = index.field(&condition.field).ok_or_else(|| {
            Error::config(format!(
                "condition on unknown field '{}' of index '{}'",
                condition.field,
                index.id()
            ))
        })?;
        let table = self.field_table(index, field.field_id());
        // Conditions on fulltext fields match single indexed words.
        let column = if field.data_type() == "text" {
            "word"
        } else {
            "value"
        };

        match condition.operator.as_str() {
            op @ ("=" | "<>" | "<" | ">" | "<=" | ">=") => {
                let sql = format!("SELECT DISTINCT item_id FROM {table} WHERE {column} {op} ?1");
                let param = condition_param(field, &condition.value);
                collect_ids(conn, &sql, params![param])
            }
            op @ ("IN" | "NOT IN") => {
                let Value::Array(values) = &condition.value else {
                    return Err(Error::config(format!(
                        "operator '{op}' on field '{}' requires an array value",
                        condition.field
                    )));
                };
                let matched = if values.is_empty() {
                    AHashSet::new()
                } else {
                    let placeholders = (1..=values.len())
                        .map(|i| format!("?{i}"))
                        .collect::<Vec<_>>()
                        .join(", ");
                    let sql = format!(
                        "SELECT DISTINCT item_id FROM {table} WHERE {column} IN ({placeholders})"
                    );
                    let sql_params: Vec<SqlValue> =
                        values.iter().map(|v| condition_param(field, v)).collect();
                    collect_ids(conn, &sql, params_from_iter(sql_params))?
                };
                if op == "IN" {
                    Ok(matched)
                } else {
                    Ok(universe
                        .iter()
                        .filter(|id| !matched.contains(*id))
                        .cloned()
                        .collect())
                }
            }
            "BETWEEN" => {
                let bounds = match &condition.value {
                    Value::Array(values) if values.len() == 2 => values,
                    _ => {
                        return Err(Error::config(format!(
                            "operator 'BETWEEN' on field '{}' requires a two-element array",
                            condition.field
                        )));
                    }
                };
                let sql = format!(
                    "SELECT DISTINCT item_id FROM {table} WHERE {column} BETWEEN ?1 AND ?2"
                );
                let sql_params: Vec<SqlValue> =
                    bounds.iter().map(|v| condition_param(field, v)).collect();
                collect_ids(conn, &sql, params_from_iter(sql_params))
            }
            other => Err(Error::UnsupportedOperator {
                operator: other.to_string(),
            }),
        }
    }

    fn eval_key_expr(
        &self,
        conn: &Connection,
        tables: &[String],
        expr: &KeyExpr,
        ignored: &mut Vec<String>,
        universe: &AHashSet<String>,
    ) -> Result<Option<Hits>> {
        match expr {
            KeyExpr::Term(term) => self.eval_term(conn, tables, term, ignored),
            KeyExpr::Group {
                conjunction,
                children,
                ..
            } => {
                let mut combined: Option<Hits> = None;
                let mut excluded: AHashSet<String> = AHashSet::new();
                for child in children {
                    let child_negated = matches!(child, KeyExpr::Group { negated: true, .. });
                    let Some(hits) =
                        self.eval_key_expr(conn, tables, child, ignored, universe)?
                    else {
                        continue;
                    };
                    if child_negated {
                        excluded.extend(hits.into_keys());
                        continue;
                    }
                    combined = Some(match (combined, conjunction) {
                        (None, _) => hits,
                        (Some(acc), Conjunction::And) => intersect_hits(acc, hits),
                        (Some(acc), Conjunction::Or) => union_hits(acc, hits),
                    });
                }
                let mut combined = match combined {
                    Some(hits) => hits,
                    // Pure negation: start from every indexed item.
                    None if !excluded.is_empty() => universe
                        .iter()
                        .map(|id| (id.clone(), Hit::filter_match()))
                        .collect(),
                    None => return Ok(None),
                };
                combined.retain(|id, _| !excluded.contains(id));
                Ok(Some(combined))
            }
        }
    }

    /// Match one keyword (possibly a quoted multi-word term) against the
    /// word tables of the searched fulltext fields.
    fn eval_term(
        &self,
        conn: &Connection,
        tables: &[String],
        term: &str,
        ignored: &mut Vec<String>,
    ) -> Result<Option<Hits>> {
        let mut combined: Option<Hits> = None;
        let mut searched_any = false;
        for word in term.split_whitespace() {
            let lower = word.to_lowercase();
            if lower.chars().count() < self.min_word_length {
                ignored.push(word.to_string());
                continue;
            }
            searched_any = true;
            let mut word_hits: Hits = AHashMap::new();
            for table in tables {
                let sql = format!(
                    "SELECT item_id, SUM(score) FROM {table} WHERE word = ?1 GROUP BY item_id"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![lower], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
                })?;
                for row in rows {
                    let (item_id, score) = row?;
                    let entry = word_hits.entry(item_id).or_insert_with(|| Hit {
                        score: 0.0,
                        words: vec![word.to_string()],
                    });
                    entry.score += score as f32;
                }
            }
            // Every word of a multi-word term has to match.
            combined = Some(match combined {
                None => word_hits,
                Some(acc) => intersect_hits(acc, word_hits),
            });
        }
        if !searched_any {
            return Ok(None);
        }
        Ok(combined)
    }

    fn resolve_sorts(
        &self,
        conn: &Connection,
        index: &Index,
        query: &SearchQuery,
    ) -> Result<Vec<(SortKeySource, SortOrder)>> {
        if query.sorts().is_empty() {
            return Ok(vec![(SortKeySource::Relevance, SortOrder::Descending)]);
        }
        let mut resolved = Vec::with_capacity(query.sorts().len());
        for sort in query.sorts() {
            let source = match sort.field.as_str() {
                SORT_RELEVANCE => SortKeySource::Relevance,
                SORT_ITEM_ID => SortKeySource::ItemId,
                field_id => {
                    let field = index.field(field_id).ok_or_else(|| {
                        Error::config(format!(
                            "sort on unknown field '{field_id}' of index '{}'",
                            index.id()
                        ))
                    })?;
                    if field.data_type() == "text" {
                        return Err(Error::config(format!(
                            "cannot sort on fulltext field '{field_id}'"
                        )));
                    }
                    let table = self.field_table(index, field.field_id());
                    let mut keys: AHashMap<String, SortKey> = AHashMap::new();
                    let mut stmt =
                        conn.prepare(&format!("SELECT item_id, value FROM {table}"))?;
                    let rows = stmt.query_map([], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, SqlValue>(1)?))
                    })?;
                    for row in rows {
                        let (item_id, value) = row?;
                        if let Some(key) = SortKey::from_sql(value) {
                            keys.insert(item_id, key);
                        }
                    }
                    SortKeySource::Field(keys)
                }
            };
            resolved.push((source, sort.order));
        }
        Ok(resolved)
    }
}

impl SearchBackend for Database {
    fn id(&self) -> &'static str {
        "database"
    }

    fn search(&self, query: &SearchQuery) -> Result<ResultSet> {
        let index = query.index();
        let conn = self.conn();
        let mut results = ResultSet::empty();

        let universe = collect_ids(
            &conn,
            &format!("SELECT item_id FROM {}", self.items_table(index)),
            [],
        )?;

        let condition_set =
            self.eval_condition_group(&conn, index, query.condition_group(), &universe)?;

        let mut ignored = Vec::new();
        let mut hits: Option<Hits> = None;
        if let Some(keys) = query.keys() {
            let field_ids: Vec<String> = match query.fulltext_fields() {
                Some(fields) => fields.to_vec(),
                None => index
                    .fulltext_fields()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            };
            if field_ids.is_empty() {
                results.add_warning("no fulltext fields available for keyword search");
            } else {
                let tables: Vec<String> = field_ids
                    .iter()
                    .map(|field_id| self.field_table(index, field_id))
                    .collect();
                let expr = match keys {
                    Keys::Parsed(expr) => expr.clone(),
                    // Raw keys carry no structure; treat them as an AND
                    // of whitespace-separated words.
                    Keys::Raw(raw) => KeyExpr::group(
                        Conjunction::And,
                        raw.split_whitespace()
                            .map(|word| KeyExpr::Term(word.to_string()))
                            .collect(),
                    ),
                };
                hits = self.eval_key_expr(&conn, &tables, &expr, &mut ignored, &universe)?;
            }
        }
        for word in ignored {
            results.add_ignored_key(word);
        }

        let language_set: Option<AHashSet<String>> = match query.languages() {
            Some(languages) if !languages.is_empty() => {
                let placeholders = (1..=languages.len())
                    .map(|i| format!("?{i}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let sql = format!(
                    "SELECT item_id FROM {} WHERE language IN ({placeholders})",
                    self.items_table(index)
                );
                let sql_params: Vec<SqlValue> = languages
                    .iter()
                    .map(|lang| SqlValue::Text(lang.clone()))
                    .collect();
                Some(collect_ids(&conn, &sql, params_from_iter(sql_params))?)
            }
            Some(_) => Some(AHashSet::new()),
            None => None,
        };

        let mut candidates: Hits = match hits {
            Some(hits) => hits,
            None => universe
                .iter()
                .map(|id| (id.clone(), Hit::filter_match()))
                .collect(),
        };
        if let Some(set) = condition_set {
            candidates.retain(|id, _| set.contains(id));
        }
        if let Some(set) = language_set {
            candidates.retain(|id, _| set.contains(id));
        }

        results.set_result_count(candidates.len() as u64);

        let datasources = collect_pairs(
            &conn,
            &format!("SELECT item_id, datasource FROM {}", self.items_table(index)),
        )?;

        let resolved = self.resolve_sorts(&conn, index, query)?;
        let mut rows: Vec<(String, Hit)> = candidates.into_iter().collect();
        rows.sort_by(|a, b| compare_rows(a, b, &resolved));

        let offset = query.offset() as usize;
        let limit = query.limit().map(|l| l as usize).unwrap_or(usize::MAX);
        for (item_id, hit) in rows.into_iter().skip(offset).take(limit) {
            let datasource = datasources.get(&item_id).cloned().unwrap_or_default();
            let mut item = ResultItem::new(datasource, item_id, hit.score);
            if !hit.words.is_empty() {
                item = item.with_excerpt(make_excerpt(&hit.words));
            }
            results.add_item(item);
        }

        debug!(
            index = index.id(),
            count = results.result_count(),
            returned = results.items().len(),
            "database search complete"
        );
        Ok(results)
    }
}

/// Sort key sources resolved ahead of the in-memory sort.
enum SortKeySource {
    Relevance,
    ItemId,
    Field(AHashMap<String, SortKey>),
}

#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Num(f64),
    Text(String),
}

impl SortKey {
    fn from_sql(value: SqlValue) -> Option<Self> {
        match value {
            SqlValue::Integer(i) => Some(SortKey::Num(i as f64)),
            SqlValue::Real(f) => Some(SortKey::Num(f)),
            SqlValue::Text(s) => Some(SortKey::Text(s)),
            SqlValue::Null | SqlValue::Blob(_) => None,
        }
    }
}

fn cmp_sort_keys(a: &SortKey, b: &SortKey) -> Ordering {
    match (a, b) {
        (SortKey::Num(x), SortKey::Num(y)) => x.total_cmp(y),
        (SortKey::Text(x), SortKey::Text(y)) => x.cmp(y),
        (SortKey::Num(_), SortKey::Text(_)) => Ordering::Less,
        (SortKey::Text(_), SortKey::Num(_)) => Ordering::Greater,
    }
}

fn compare_rows(
    a: &(String, Hit),
    b: &(String, Hit),
    resolved: &[(SortKeySource, SortOrder)],
) -> Ordering {
    for (source, order) in resolved {
        let ord = match source {
            SortKeySource::Relevance => a.1.score.total_cmp(&b.1.score),
            SortKeySource::ItemId => a.0.cmp(&b.0),
            SortKeySource::Field(keys) => match (keys.get(&a.0), keys.get(&b.0)) {
                (Some(x), Some(y)) => cmp_sort_keys(x, y),
                // Items without a value sort last regardless of direction.
                (Some(_), None) => return Ordering::Less,
                (None, Some(_)) => return Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        };
        let ord = match order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    // Deterministic order for full ties.
    a.0.cmp(&b.0)
}

fn intersect_hits(mut acc: Hits, other: Hits) -> Hits {
    acc.retain(|id, _| other.contains_key(id));
    for (id, hit) in other {
        if let Some(existing) = acc.get_mut(&id) {
            existing.score += hit.score;
            existing.words.extend(hit.words);
        }
    }
    acc
}

fn union_hits(mut acc: Hits, other: Hits) -> Hits {
    for (id, hit) in other {
        match acc.entry(id) {
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                existing.score += hit.score;
                existing.words.extend(hit.words);
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(hit);
            }
        }
    }
    acc
}

fn make_excerpt(words: &[String]) -> String {
    let mut unique: Vec<&str> = Vec::new();
    for word in words {
        if !unique.contains(&word.as_str()) {
            unique.push(word);
        }
    }
    format!("… {} …", unique.join(" … "))
}

/// Keep table names derived from user-supplied ids safe to splice into SQL.
fn sanitize_identifier(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn condition_param(field: &Field, value: &Value) -> SqlValue {
    let sql = json_to_sql(value);
    // Word tables hold lowercased tokens.
    if field.data_type() == "text" {
        if let SqlValue::Text(text) = &sql {
            return SqlValue::Text(text.to_lowercase());
        }
    }
    sql
}

fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn field_value_to_sql(value: &FieldValue) -> SqlValue {
    match value {
        FieldValue::Text(text) => SqlValue::Text(text.to_text()),
        FieldValue::String(s) => SqlValue::Text(s.clone()),
        FieldValue::Integer(i) | FieldValue::Date(i) => SqlValue::Integer(*i),
        FieldValue::Decimal(f) => SqlValue::Real(*f),
        FieldValue::Boolean(b) => SqlValue::Integer(*b as i64),
    }
}

/// Tokens to store for a text field: the value's own token list when
/// present, otherwise a whitespace split of its textual form.
fn text_tokens(value: &FieldValue, field_boost: f32) -> Vec<(String, f32)> {
    if let FieldValue::Text(text) = value {
        if let Some(tokens) = text.tokens() {
            return tokens
                .iter()
                .map(|t| (t.text.to_lowercase(), t.boost * field_boost))
                .collect();
        }
    }
    let text = match value {
        FieldValue::Text(text) => text.to_text(),
        FieldValue::String(s) => s.clone(),
        FieldValue::Integer(i) | FieldValue::Date(i) => i.to_string(),
        FieldValue::Decimal(f) => f.to_string(),
        FieldValue::Boolean(b) => b.to_string(),
    };
    text.split_whitespace()
        .map(|word| (word.to_lowercase(), field_boost))
        .collect()
}

fn collect_ids(
    conn: &Connection,
    sql: &str,
    sql_params: impl rusqlite::Params,
) -> Result<AHashSet<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(sql_params, |row| row.get::<_, String>(0))?;
    let mut set = AHashSet::new();
    for row in rows {
        set.insert(row?);
    }
    Ok(set)
}

fn collect_pairs(conn: &Connection, sql: &str) -> Result<AHashMap<String, String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut map = AHashMap::new();
    for row in rows {
        let (key, value) = row?;
        map.insert(key, value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::query::{HookRegistry, SearchQuery};
    use crate::types::{TextToken, TextValue};

    fn content_index() -> Arc<Index> {
        let mut index = Index::new("content");
        index.add_datasource("node");
        let mut title = Field::new("content", "title", "title", "text");
        title.set_boost(2.0);
        index.add_field(title).unwrap();
        index
            .add_field(Field::new("content", "body", "body.value", "text"))
            .unwrap();
        index
            .add_field(Field::new("content", "uid", "uid", "integer"))
            .unwrap();
        Arc::new(index)
    }

    fn seeded_backend(index: &Index) -> Arc<Database> {
        let db = Database::open_in_memory().unwrap();
        db.create_index_tables(index).unwrap();
        db.index_item(
            index,
            "node",
            "1",
            "en",
            &[
                ("title", FieldValue::Text(TextValue::new("Hello World"))),
                ("body", FieldValue::Text(TextValue::new("foo bar baz"))),
                ("uid", FieldValue::Integer(1)),
            ],
        )
        .unwrap();
        db.index_item(
            index,
            "node",
            "2",
            "de",
            &[
                ("title", FieldValue::Text(TextValue::new("Goodbye World"))),
                ("body", FieldValue::Text(TextValue::new("foo qux"))),
                ("uid", FieldValue::Integer(2)),
            ],
        )
        .unwrap();
        db.index_item(
            index,
            "node",
            "3",
            "en",
            &[
                ("title", FieldValue::Text(TextValue::new("Hello Again"))),
                ("body", FieldValue::Text(TextValue::new("corge"))),
            ],
        )
        .unwrap();
        Arc::new(db)
    }

    fn query(index: &Arc<Index>, backend: &Arc<Database>) -> SearchQuery {
        SearchQuery::new(
            Arc::clone(index),
            Arc::clone(backend) as Arc<dyn SearchBackend>,
            Arc::new(HookRegistry::new()),
        )
        .unwrap()
    }

    fn item_ids(results: &ResultSet) -> Vec<&str> {
        results.items().iter().map(|i| i.item_id.as_str()).collect()
    }

    #[test]
    fn test_filter_match_scores_one() {
        let index = content_index();
        let backend = seeded_backend(&index);
        let mut query = query(&index, &backend);
        query.add_condition("uid", 2, "=");
        let results = query.execute().unwrap();
        assert_eq!(results.result_count(), 1);
        assert_eq!(results.items()[0].item_id, "2");
        assert_eq!(results.items()[0].datasource, "node");
        assert_eq!(results.items()[0].score, 1.0);
        assert!(results.items()[0].excerpt.is_none());
    }

    #[test]
    fn test_unknown_operator_is_rejected() {
        let index = content_index();
        let backend = seeded_backend(&index);
        let mut query = query(&index, &backend);
        query.add_condition("uid", 1, "!=");
        let err = query.execute().unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperator { operator } if operator == "!="));
    }

    #[test]
    fn test_in_and_not_in() {
        let index = content_index();
        let backend = seeded_backend(&index);

        let mut q = query(&index, &backend);
        q.add_condition("uid", serde_json::json!([1, 2]), "IN");
        q.sort(SORT_ITEM_ID, SortOrder::Ascending);
        assert_eq!(item_ids(q.execute().unwrap()), ["1", "2"]);

        let mut q = query(&index, &backend);
        q.add_condition("uid", serde_json::json!([1]), "NOT IN");
        q.sort(SORT_ITEM_ID, SortOrder::Ascending);
        // Item 3 has no uid value at all, so NOT IN keeps it too.
        assert_eq!(item_ids(q.execute().unwrap()), ["2", "3"]);
    }

    #[test]
    fn test_between() {
        let index = content_index();
        let backend = seeded_backend(&index);
        let mut q = query(&index, &backend);
        q.add_condition("uid", serde_json::json!([1, 2]), "BETWEEN");
        q.sort(SORT_ITEM_ID, SortOrder::Ascending);
        assert_eq!(item_ids(q.execute().unwrap()), ["1", "2"]);
    }

    #[test]
    fn test_fulltext_and_requires_all_words() {
        let index = content_index();
        let backend = seeded_backend(&index);
        let mut q = query(&index, &backend);
        q.set_keys("hello world");
        let results = q.execute().unwrap();
        assert_eq!(item_ids(results), ["1"]);
        let excerpt = results.items()[0].excerpt.as_deref().unwrap();
        assert!(excerpt.contains("hello"));
        assert!(excerpt.contains("world"));
    }

    #[test]
    fn test_fulltext_scores_use_field_boost() {
        let index = content_index();
        let backend = seeded_backend(&index);
        let mut q = query(&index, &backend);
        q.set_keys("hello");
        let results = q.execute().unwrap();
        // Title carries boost 2.0, so each title match scores 2.0.
        assert_eq!(results.result_count(), 2);
        for item in results.items() {
            assert_eq!(item.score, 2.0);
        }
    }

    #[test]
    fn test_fulltext_or_unions_and_ranks() {
        let index = content_index();
        let backend = seeded_backend(&index);
        let mut q = query(&index, &backend);
        q.set_option("conjunction", "OR");
        q.set_keys("hello qux");
        let results = q.execute().unwrap();
        assert_eq!(results.result_count(), 3);
        // Default sort is relevance descending; title matches outrank
        // the body-only match on item 2.
        let ids = item_ids(results);
        assert_eq!(ids[2], "2");
    }

    #[test]
    fn test_negated_key_group_excludes() {
        let index = content_index();
        let backend = seeded_backend(&index);
        let mut q = query(&index, &backend);
        q.set_parsed_keys(KeyExpr::group(
            Conjunction::And,
            vec![
                KeyExpr::Term("hello".to_string()),
                KeyExpr::Group {
                    conjunction: Conjunction::Or,
                    negated: true,
                    children: vec![KeyExpr::Term("world".to_string())],
                },
            ],
        ));
        assert_eq!(item_ids(q.execute().unwrap()), ["3"]);
    }

    #[test]
    fn test_condition_on_text_field_matches_word() {
        let index = content_index();
        let backend = seeded_backend(&index);
        let mut q = query(&index, &backend);
        q.add_condition("title", "Hello", "=");
        q.sort(SORT_ITEM_ID, SortOrder::Ascending);
        assert_eq!(item_ids(q.execute().unwrap()), ["1", "3"]);
    }

    #[test]
    fn test_language_filter() {
        let index = content_index();
        let backend = seeded_backend(&index);
        let mut q = query(&index, &backend);
        q.set_languages(Some(vec!["en".to_string()]));
        q.sort(SORT_ITEM_ID, SortOrder::Ascending);
        assert_eq!(item_ids(q.execute().unwrap()), ["1", "3"]);
    }

    #[test]
    fn test_sort_missing_values_last() {
        let index = content_index();
        let backend = seeded_backend(&index);

        let mut q = query(&index, &backend);
        q.sort("uid", SortOrder::Ascending);
        assert_eq!(item_ids(q.execute().unwrap()), ["1", "2", "3"]);

        let mut q = query(&index, &backend);
        q.sort("uid", SortOrder::Descending);
        // Item 3 has no uid and stays last in both directions.
        assert_eq!(item_ids(q.execute().unwrap()), ["2", "1", "3"]);
    }

    #[test]
    fn test_sort_on_fulltext_field_is_config_error() {
        let index = content_index();
        let backend = seeded_backend(&index);
        let mut q = query(&index, &backend);
        q.sort("title", SortOrder::Ascending);
        let err = q.execute().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_paging() {
        let index = content_index();
        let backend = seeded_backend(&index);
        let mut q = query(&index, &backend);
        q.sort(SORT_ITEM_ID, SortOrder::Ascending);
        q.range(Some(1), Some(1));
        let results = q.execute().unwrap();
        // Count reflects all matches, items only the requested page.
        assert_eq!(results.result_count(), 3);
        assert_eq!(item_ids(results), ["2"]);
    }

    #[test]
    fn test_min_word_length_ignores_short_keys() {
        let index = content_index();
        let db = Database::open_in_memory().unwrap().with_min_word_length(3);
        db.create_index_tables(&index).unwrap();
        db.index_item(
            &index,
            "node",
            "1",
            "en",
            &[("body", FieldValue::Text(TextValue::new("a hello")))],
        )
        .unwrap();
        let backend = Arc::new(db);
        let mut q = query(&index, &backend);
        q.set_keys("a hello");
        let results = q.execute().unwrap();
        assert_eq!(results.ignored_keys(), ["a"]);
        assert_eq!(item_ids(results), ["1"]);
    }

    #[test]
    fn test_token_boosts_scale_scores() {
        let index = content_index();
        let backend = Arc::new(Database::open_in_memory().unwrap());
        backend.create_index_tables(&index).unwrap();
        backend
            .index_item(
                &index,
                "node",
                "1",
                "en",
                &[(
                    "body",
                    FieldValue::Text(TextValue::with_tokens(
                        "heavy light",
                        vec![
                            TextToken::with_boost("heavy", 5.0),
                            TextToken::new("light"),
                        ],
                    )),
                )],
            )
            .unwrap();
        let mut q = query(&index, &backend);
        q.set_keys("heavy");
        let results = q.execute().unwrap();
        assert_eq!(results.items()[0].score, 5.0);
    }

    #[test]
    fn test_delete_item() {
        let index = content_index();
        let backend = seeded_backend(&index);
        backend.delete_item(&index, "1").unwrap();
        let mut q = query(&index, &backend);
        q.sort(SORT_ITEM_ID, SortOrder::Ascending);
        assert_eq!(item_ids(q.execute().unwrap()), ["2", "3"]);
    }

    #[test]
    fn test_no_constraints_returns_everything() {
        let index = content_index();
        let backend = seeded_backend(&index);
        let mut q = query(&index, &backend);
        q.sort(SORT_ITEM_ID, SortOrder::Ascending);
        let results = q.execute().unwrap();
        assert_eq!(results.result_count(), 3);
        assert!(results.items().iter().all(|i| i.score == 1.0));
    }
}
