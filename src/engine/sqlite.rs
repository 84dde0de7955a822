//! SQLite query engine.
//!
//! Reads a KGTK graph cache: one table per logical graph, each with the
//! columns `id, node1, label, node2`. Table and relationship names come
//! from the `GraphSchema`; table names are checked to be plain identifiers
//! before they are spliced into SQL.
//!
//! A single connection is shared behind a mutex, so the engine does not
//! advertise concurrent readers. Statements are prepared through the
//! connection's statement cache.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags};
use tracing::{debug, info};

use super::{
    effective_limit, EdgeQuery, EdgeSink, EngineCapabilities, GraphSchema, GraphTable,
    LabelPattern, Query, QueryEngine, QueryKind, LANGUAGE_ANY,
};
use crate::frame::{Frame, Row};
use crate::model::Edge;
use crate::Result;

// ============================================================================
// SqliteEngine
// ============================================================================

/// A KGTK graph cache file.
pub struct SqliteEngine {
    conn: Mutex<Connection>,
    schema: GraphSchema,
    max_results: usize,
}

impl SqliteEngine {
    /// Open an existing cache. `read_only` refuses any write, including
    /// `create_schema`.
    pub fn open(
        path: impl AsRef<Path>,
        schema: GraphSchema,
        max_results: usize,
        read_only: bool,
    ) -> Result<Self> {
        schema.validate()?;
        let path = path.as_ref();
        let conn = if read_only {
            Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI,
            )?
        } else {
            Connection::open(path)?
        };
        info!(path = %path.display(), read_only, "opened graph cache");
        Ok(Self { conn: Mutex::new(conn), schema, max_results })
    }

    /// A fresh in-memory cache with empty tables.
    pub fn open_in_memory(schema: GraphSchema, max_results: usize) -> Result<Self> {
        schema.validate()?;
        let engine = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            schema,
            max_results,
        };
        engine.create_schema()?;
        Ok(engine)
    }

    /// Create every graph table and its lookup indexes if missing.
    pub fn create_schema(&self) -> Result<()> {
        let conn = self.conn.lock();
        for graph in GraphTable::ALL {
            let t = self.schema.table(graph);
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {t} (
                    id TEXT,
                    node1 TEXT NOT NULL,
                    label TEXT NOT NULL,
                    node2 TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS {t}_node1_label ON {t} (node1, label);
                CREATE INDEX IF NOT EXISTS {t}_node2_label ON {t} (node2, label);
                CREATE INDEX IF NOT EXISTS {t}_label ON {t} (label);
                CREATE INDEX IF NOT EXISTS {t}_id ON {t} (id);"
            ))?;
        }
        Ok(())
    }

    fn run(&self, kind: QueryKind, sql: &str, values: Vec<Value>) -> Result<Frame> {
        let header = kind.header();
        let arity = header.len();
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), |r| {
                (0..arity)
                    .map(|i| r.get::<_, Option<String>>(i))
                    .collect::<rusqlite::Result<Row>>()
            })?
            .collect::<rusqlite::Result<Vec<Row>>>()?;
        debug!(query = kind.name(), rows = rows.len(), "sqlite query");
        Frame::new(header.iter().copied(), rows)
    }

    fn limit(&self, limit: usize) -> Value {
        Value::Integer(effective_limit(limit, self.max_results) as i64)
    }
}

impl EdgeSink for SqliteEngine {
    fn insert_edges(&self, graph: GraphTable, edges: &[Edge]) -> Result<()> {
        let t = self.schema.table(graph);
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {t} (id, node1, label, node2) VALUES (?1, ?2, ?3, ?4)"
            ))?;
            for e in edges {
                stmt.execute(params![e.id, e.node1, e.label, e.node2])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

// ============================================================================
// QueryEngine impl
// ============================================================================

impl QueryEngine for SqliteEngine {
    fn execute(&self, query: &Query) -> Result<Frame> {
        let sql = Sql { s: &self.schema };
        let kind = query.kind();
        let (statement, values) = match query {
            Query::NodeLabels { node, lang } => (
                sql.node_values(GraphTable::Labels, &self.schema.label_label, true),
                vec![text(node), text(lang), self.limit(0)],
            ),
            Query::NodeAliases { node, lang } => (
                sql.node_values(GraphTable::Aliases, &self.schema.alias_label, true),
                vec![text(node), text(lang), self.limit(0)],
            ),
            Query::NodeDescriptions { node, lang } => (
                sql.node_values(GraphTable::Descriptions, &self.schema.description_label, true),
                vec![text(node), text(lang), self.limit(0)],
            ),
            Query::NodeImages { node } => (
                sql.node_values(GraphTable::Edges, &self.schema.image_label, false),
                vec![text(node), text(LANGUAGE_ANY), self.limit(0)],
            ),
            Query::NodeEdges(q) => (sql.node_edges(false, false), self.edge_values(q)),
            Query::NodeInverseEdges(q) => (sql.node_edges(true, false), self.edge_values(q)),
            Query::NodeEdgeQualifiers(q) => (sql.node_edges(false, true), self.edge_values(q)),
            Query::NodeInverseEdgeQualifiers(q) => {
                (sql.node_edges(true, true), self.edge_values(q))
            }
            Query::ItemEdges { node, lang, limit } => (
                sql.item_edges(false),
                vec![text(node), text(lang), self.limit(*limit)],
            ),
            Query::ItemInverseEdges { node, lang, limit } => (
                sql.item_edges(true),
                vec![text(node), text(lang), self.limit(*limit)],
            ),
            Query::ItemQualifiers { node, lang, limit } => (
                sql.item_qualifiers("e.node1 = ?1"),
                vec![text(node), text(lang), self.limit(*limit)],
            ),
            Query::ItemQualifiersByEdge { edge_id, lang, limit } => (
                sql.item_qualifiers("e.id = ?1"),
                vec![text(edge_id), text(lang), self.limit(*limit)],
            ),
            Query::ItemQualifiersIn { edge_ids, lang, limit } => {
                if edge_ids.is_empty() {
                    return Ok(Frame::with_header(kind.header()));
                }
                let slots: Vec<String> =
                    (0..edge_ids.len()).map(|i| format!("?{}", i + 3)).collect();
                let mut values = vec![self.limit(*limit), text(lang)];
                values.extend(edge_ids.iter().map(|id| text(id)));
                let statement = sql.item_qualifiers_in(&slots.join(", "));
                return self.run(kind, &statement, values);
            }
            Query::FormatterTemplate { relationship } => {
                (sql.formatter(), vec![text(relationship)])
            }
            Query::SubpropertyRelationships { lang } => {
                (sql.subproperties(), vec![text(lang), self.limit(0)])
            }
            Query::LanguageLabels { code, lang } => (
                sql.language_labels(),
                vec![text(&format!("\"{code}\"")), text(code), text(lang), self.limit(0)],
            ),
            Query::MatchItemExactly { node, lang, limit } => (
                sql.node_values(GraphTable::Labels, &self.schema.label_label, true),
                vec![text(node), text(lang), self.limit(*limit)],
            ),
            Query::MatchLabelExactly { label, lang, ignore_case, limit } => {
                let pattern = LabelPattern::exact(label, lang);
                (
                    sql.match_labels(&pattern, *ignore_case),
                    vec![text(pattern.text()), text(lang), self.limit(*limit)],
                )
            }
            Query::MatchLabelPrefix { prefix, lang, ignore_case, limit } => {
                let pattern = LabelPattern::prefix(prefix);
                (
                    sql.match_labels(&pattern, *ignore_case),
                    vec![text(pattern.text()), text(lang), self.limit(*limit)],
                )
            }
            Query::MatchItemPrefix { prefix, lang, limit } => (
                sql.match_item_prefix(),
                vec![text(prefix), text(lang), self.limit(*limit)],
            ),
        };
        self.run(kind, &statement, values)
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            concurrent_readers: false,
            max_results: self.max_results,
        }
    }

    fn schema(&self) -> &GraphSchema {
        &self.schema
    }
}

impl SqliteEngine {
    fn edge_values(&self, q: &EdgeQuery) -> Vec<Value> {
        vec![
            text(&q.node),
            text(&q.lang),
            Value::Integer(q.images as i64),
            Value::Integer(q.fanouts as i64),
            self.limit(0),
        ]
    }
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

// ============================================================================
// SQL text
// ============================================================================

/// Builds statement text for one schema.
struct Sql<'a> {
    s: &'a GraphSchema,
}

/// A SQL string literal.
fn lit(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `alias.node2` is a language-qualified string tagged exactly `param`,
/// or `param` is the any-language code.
fn lang_filter(alias: &str, param: &str) -> String {
    format!(
        "({param} = {any} OR (substr({alias}.node2, 1, 1) = '''' \
         AND substr({alias}.node2, -(length({param}) + 2)) = '''@' || {param}))",
        any = lit(LANGUAGE_ANY),
    )
}

impl Sql<'_> {
    fn t(&self, graph: GraphTable) -> &str {
        self.s.table(graph)
    }

    /// ?1 node, ?2 lang (ignored unless `filtered`), ?3 limit.
    fn node_values(&self, graph: GraphTable, label: &str, filtered: bool) -> String {
        let filter = if filtered { format!("AND {}", lang_filter("l", "?2")) } else { String::new() };
        format!(
            "SELECT l.node1, l.node2 FROM {t} AS l \
             WHERE l.node1 = ?1 AND l.label = {label} {filter} \
             ORDER BY l.rowid LIMIT ?3",
            t = self.t(graph),
            label = lit(label),
        )
    }

    /// ?1 node, ?2 lang, ?3 images, ?4 fanouts, ?5 limit.
    fn node_edges(&self, inverse: bool, qualifiers: bool) -> String {
        let (anchor, far) = if inverse { ("e.node2", "e.node1") } else { ("e.node1", "e.node2") };
        let (select, join, target, order) = if qualifiers {
            (
                "q.id, q.node1, q.label, q.node2",
                format!("JOIN {} AS q ON q.node1 = e.id", self.t(GraphTable::Qualifiers)),
                "q.node2",
                "e.rowid, q.rowid",
            )
        } else {
            ("e.id, e.node1, e.label, e.node2", String::new(), far, "e.rowid")
        };
        format!(
            "SELECT {select}, l.node2, i.node2, f.node2 \
             FROM {edges} AS e {join} \
             LEFT JOIN {labels} AS l ON l.node1 = {target} AND l.label = {label} AND {lang} \
             LEFT JOIN {edges} AS i ON ?3 AND i.node1 = {target} AND i.label = {image} \
             LEFT JOIN {metadata} AS f ON ?4 AND f.node1 = {target} AND f.label = {fanout} \
             WHERE {anchor} = ?1 \
             ORDER BY {order}, l.rowid, i.rowid, f.rowid LIMIT ?5",
            edges = self.t(GraphTable::Edges),
            labels = self.t(GraphTable::Labels),
            metadata = self.t(GraphTable::Metadata),
            label = lit(&self.s.label_label),
            image = lit(&self.s.image_label),
            fanout = lit(&self.s.fanout_label),
            lang = lang_filter("l", "?2"),
        )
    }

    /// ?1 node, ?2 lang, ?3 limit. One row per edge, so the limit counts
    /// edges; each lookup takes its first match by rowid.
    fn item_edges(&self, inverse: bool) -> String {
        let (anchor, target) = if inverse { ("e.node2", "e.node1") } else { ("e.node1", "e.node2") };
        format!(
            "SELECT e.id, e.node1, e.label, e.node2, \
             (SELECT rl.node2 FROM {labels} AS rl \
              WHERE rl.node1 = e.label AND rl.label = {label} AND {rl_lang} ORDER BY rl.rowid LIMIT 1), \
             {target}, \
             (SELECT tl.node2 FROM {labels} AS tl \
              WHERE tl.node1 = {target} AND tl.label = {label} AND {tl_lang} ORDER BY tl.rowid LIMIT 1), \
             (SELECT td.node2 FROM {descriptions} AS td \
              WHERE td.node1 = {target} AND td.label = {description} AND {td_lang} ORDER BY td.rowid LIMIT 1), \
             (SELECT dt.node2 FROM {datatypes} AS dt \
              WHERE dt.node1 = e.label AND dt.label = {datatype} ORDER BY dt.rowid LIMIT 1) \
             FROM {edges} AS e \
             WHERE {anchor} = ?1 \
             ORDER BY e.rowid LIMIT ?3",
            edges = self.t(GraphTable::Edges),
            labels = self.t(GraphTable::Labels),
            descriptions = self.t(GraphTable::Descriptions),
            datatypes = self.t(GraphTable::Datatypes),
            label = lit(&self.s.label_label),
            description = lit(&self.s.description_label),
            datatype = lit(&self.s.datatype_label),
            rl_lang = lang_filter("rl", "?2"),
            tl_lang = lang_filter("tl", "?2"),
            td_lang = lang_filter("td", "?2"),
        )
    }

    /// Qualifiers of the edges selected by `anchor`. The language is
    /// `lang_param` and the row cap `limit_param`.
    fn qualifiers_where(&self, anchor: &str, lang_param: &str, limit_param: &str) -> String {
        format!(
            "SELECT e.id, e.node1, q.id, q.label, q.node2, ql.node2, qn.node2, qd.node2 \
             FROM {edges} AS e \
             JOIN {qualifiers} AS q ON q.node1 = e.id \
             LEFT JOIN {labels} AS ql ON ql.node1 = q.label AND ql.label = {label} AND {ql_lang} \
             LEFT JOIN {labels} AS qn ON qn.node1 = q.node2 AND qn.label = {label} AND {qn_lang} \
             LEFT JOIN {descriptions} AS qd ON qd.node1 = q.node2 AND qd.label = {description} AND {qd_lang} \
             WHERE {anchor} \
             ORDER BY e.rowid, q.rowid, ql.rowid, qn.rowid, qd.rowid LIMIT {limit_param}",
            edges = self.t(GraphTable::Edges),
            qualifiers = self.t(GraphTable::Qualifiers),
            labels = self.t(GraphTable::Labels),
            descriptions = self.t(GraphTable::Descriptions),
            label = lit(&self.s.label_label),
            description = lit(&self.s.description_label),
            ql_lang = lang_filter("ql", lang_param),
            qn_lang = lang_filter("qn", lang_param),
            qd_lang = lang_filter("qd", lang_param),
        )
    }

    /// ?1 key, ?2 lang, ?3 limit.
    fn item_qualifiers(&self, anchor: &str) -> String {
        self.qualifiers_where(anchor, "?2", "?3")
    }

    /// ?1 limit, ?2 lang, ?3.. edge ids.
    fn item_qualifiers_in(&self, slots: &str) -> String {
        self.qualifiers_where(&format!("e.id IN ({slots})"), "?2", "?1")
    }

    /// ?1 relationship.
    fn formatter(&self) -> String {
        format!(
            "SELECT e.node2 FROM {edges} AS e \
             WHERE e.node1 = ?1 AND e.label = {formatter} \
             ORDER BY e.rowid LIMIT 1",
            edges = self.t(GraphTable::Edges),
            formatter = lit(&self.s.formatter_label),
        )
    }

    /// ?1 lang, ?2 limit.
    fn subproperties(&self) -> String {
        format!(
            "SELECT e.node1, e.node2, l.node2 FROM {edges} AS e \
             LEFT JOIN {labels} AS l ON l.node1 = e.node1 AND l.label = {label} AND {lang} \
             WHERE e.label = {subproperty} \
             ORDER BY e.rowid, l.rowid LIMIT ?2",
            edges = self.t(GraphTable::Edges),
            labels = self.t(GraphTable::Labels),
            label = lit(&self.s.label_label),
            subproperty = lit(&self.s.subproperty_label),
            lang = lang_filter("l", "?1"),
        )
    }

    /// ?1 quoted code, ?2 bare code, ?3 lang, ?4 limit.
    fn language_labels(&self) -> String {
        let classes: Vec<String> = self.s.language_classes.iter().map(|c| lit(c)).collect();
        format!(
            "SELECT e.node1, l.node2 FROM {edges} AS e \
             JOIN {edges} AS isa ON isa.node1 = e.node1 AND isa.label = {instance_of} \
                AND isa.node2 IN ({classes}) \
             LEFT JOIN {labels} AS l ON l.node1 = e.node1 AND l.label = {label} AND {lang} \
             WHERE e.label = {code} AND (e.node2 = ?1 OR e.node2 = ?2) \
             ORDER BY e.rowid, isa.rowid, l.rowid LIMIT ?4",
            edges = self.t(GraphTable::Edges),
            labels = self.t(GraphTable::Labels),
            instance_of = lit(&self.s.instance_of_label),
            classes = classes.join(", "),
            label = lit(&self.s.label_label),
            code = lit(&self.s.language_code_label),
            lang = lang_filter("l", "?3"),
        )
    }

    /// ?1 pattern, ?2 lang, ?3 limit.
    fn match_labels(&self, pattern: &LabelPattern, ignore_case: bool) -> String {
        let cmp = match (pattern, ignore_case) {
            (LabelPattern::Exact(_), false) => "l.node2 = ?1",
            (LabelPattern::Exact(_), true) => "upper(l.node2) = upper(?1)",
            (LabelPattern::Prefix(_), false) => "substr(l.node2, 1, length(?1)) = ?1",
            (LabelPattern::Prefix(_), true) => {
                "upper(substr(l.node2, 1, length(?1))) = upper(?1)"
            }
        };
        format!(
            "SELECT l.node1, l.node2 FROM {labels} AS l \
             WHERE l.label = {label} AND {cmp} AND {lang} \
             ORDER BY length(l.node1), l.node1, l.rowid LIMIT ?3",
            labels = self.t(GraphTable::Labels),
            label = lit(&self.s.label_label),
            lang = lang_filter("l", "?2"),
        )
    }

    /// ?1 prefix, ?2 lang, ?3 limit.
    fn match_item_prefix(&self) -> String {
        format!(
            "SELECT l.node1, l.node2 FROM {labels} AS l \
             WHERE l.label = {label} AND substr(l.node1, 1, length(?1)) = ?1 AND {lang} \
             ORDER BY length(l.node1), l.node1, l.rowid LIMIT ?3",
            labels = self.t(GraphTable::Labels),
            label = lit(&self.s.label_label),
            lang = lang_filter("l", "?2"),
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
