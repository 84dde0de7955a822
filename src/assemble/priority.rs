//! Relationship display priorities.
//!
//! A seed list names anchor relationships in display order. A trailing `*`
//! expands the anchor into its subproperty forest: every relationship that
//! is a subproperty of the anchor is ranked right after it, children sorted
//! by (seed priority, label, position) and visited depth-first.
//!
//! The table is built once per process from the subproperty query and is
//! read-only afterwards.

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use parking_lot::RwLock;
use tracing::info;

use crate::frame::{optional, required, FromRow};
use crate::Result;

/// Priority of relationships the table does not rank.
pub const DEFAULT_PRIORITY: u32 = 99_999;

/// The default seed list. `*` marks anchors whose subproperties follow them.
pub fn default_seeds() -> Vec<String> {
    [
        "P31", "P279", "P21", "P2561*", "P138", "P580*", "P582*", "P509", "P1196", "P20",
        "P1038*", "P3342*",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// One `(child, parent, child label)` row of the subproperty relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subproperty {
    pub child: String,
    pub parent: String,
    pub label: Option<String>,
}

impl FromRow for Subproperty {
    const COLUMNS: &'static [&'static str] = &["node1", "node2", "node1_label"];

    fn from_row(cells: &[Option<&str>]) -> Result<Self> {
        Ok(Self {
            child: required(cells, 0, "node1")?,
            parent: required(cells, 1, "node2")?,
            label: optional(cells, 2),
        })
    }
}

/// A built relationship -> rank table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriorityMap {
    ranks: HashMap<String, u32>,
}

impl PriorityMap {
    pub fn get(&self, relationship: &str) -> u32 {
        self.ranks.get(relationship).copied().unwrap_or(DEFAULT_PRIORITY)
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    /// Expand `seeds` over the subproperty forest.
    pub fn build(seeds: &[String], subproperties: &[Subproperty]) -> Self {
        let mut initial: HashMap<&str, u32> = HashMap::new();
        for seed in seeds {
            let name = seed.strip_suffix('*').unwrap_or(seed);
            let next = initial.len() as u32;
            initial.entry(name).or_insert(next);
        }

        let mut forest: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut labels: HashMap<&str, &str> = HashMap::new();
        for sp in subproperties {
            forest.entry(sp.parent.as_str()).or_default().push(&sp.child);
            if let Some(label) = &sp.label {
                labels.insert(&sp.child, label);
            }
        }

        let mut scan = Scan {
            initial: &initial,
            forest: &forest,
            labels: &labels,
            ranks: HashMap::new(),
            seen: HashSet::new(),
        };
        for seed in seeds {
            let (name, expand) = match seed.strip_suffix('*') {
                Some(name) => (name, true),
                None => (seed.as_str(), false),
            };
            if !scan.seen.insert(name) {
                continue;
            }
            scan.assign(name);
            if expand {
                if let Some(children) = forest.get(name) {
                    scan.visit(children);
                }
            }
        }

        let ranks = scan
            .ranks
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Self { ranks }
    }
}

struct Scan<'a> {
    initial: &'a HashMap<&'a str, u32>,
    forest: &'a HashMap<&'a str, Vec<&'a str>>,
    labels: &'a HashMap<&'a str, &'a str>,
    ranks: HashMap<&'a str, u32>,
    seen: HashSet<&'a str>,
}

impl<'a> Scan<'a> {
    fn assign(&mut self, relationship: &'a str) {
        let next = self.ranks.len() as u32;
        self.ranks.entry(relationship).or_insert(next);
    }

    fn visit(&mut self, children: &[&'a str]) {
        let mut keyed: Vec<(u32, &str, usize, &'a str)> = Vec::new();
        for (idx, &child) in children.iter().enumerate() {
            if !self.seen.insert(child) {
                continue;
            }
            let priority = self.initial.get(child).copied().unwrap_or(DEFAULT_PRIORITY);
            let label = self.labels.get(child).copied().unwrap_or(child);
            keyed.push((priority, label, idx, child));
        }
        keyed.sort();

        for (_, _, _, child) in keyed {
            self.assign(child);
            if let Some(grandchildren) = self.forest.get(child) {
                self.visit(grandchildren);
            }
        }
    }
}

/// The lazily built, process-wide priority table.
pub struct PriorityTable {
    seeds: Vec<String>,
    built: RwLock<Option<Arc<PriorityMap>>>,
}

impl PriorityTable {
    pub fn new(seeds: Vec<String>) -> Self {
        Self { seeds, built: RwLock::new(None) }
    }

    /// The table, if it has been built.
    pub fn get(&self) -> Option<Arc<PriorityMap>> {
        self.built.read().clone()
    }

    /// Return the table, building it with `fetch` on first use. A builder
    /// that loses the race discards its own result.
    pub fn get_or_build<F>(&self, fetch: F) -> Result<Arc<PriorityMap>>
    where
        F: FnOnce() -> Result<Vec<Subproperty>>,
    {
        if let Some(map) = self.get() {
            return Ok(map);
        }
        let subproperties = fetch()?;
        let map = Arc::new(PriorityMap::build(&self.seeds, &subproperties));

        let mut slot = self.built.write();
        if let Some(existing) = slot.as_ref() {
            return Ok(Arc::clone(existing));
        }
        info!(
            seeds = self.seeds.len(),
            subproperties = subproperties.len(),
            entries = map.len(),
            "built property priority map"
        );
        *slot = Some(Arc::clone(&map));
        Ok(map)
    }
}

/// Fixed ranks for qualifier relationships.
#[derive(Debug, Clone, Default)]
pub struct QualifierPriority {
    ranks: HashMap<String, u32>,
}

impl QualifierPriority {
    pub fn new(order: &[String]) -> Self {
        let mut ranks = HashMap::new();
        for rel in order {
            let next = ranks.len() as u32;
            ranks.entry(rel.clone()).or_insert(next);
        }
        Self { ranks }
    }

    pub fn get(&self, relationship: &str) -> u32 {
        self.ranks.get(relationship).copied().unwrap_or(DEFAULT_PRIORITY)
    }
}

/// Default qualifier order: start time, end time.
pub fn default_qualifier_order() -> Vec<String> {
    vec!["P580".into(), "P582".into()]
}
