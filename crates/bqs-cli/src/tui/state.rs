//! Browser state: view machine, selection, search, and schema tree.

use bqs_core::bq::{SchemaField, TableInfo, TableMetadata};
use bqs_core::config::UiConfig;
use std::collections::HashSet;
use std::time::Instant;

/// Current view of the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Loading,
    TableList,
    TableDetail,
    Error,
    Help,
}

/// Input/interaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Search,
}

/// What the active search filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchContext {
    Tables,
    Schema,
}

/// One row of the flattened schema tree.
#[derive(Debug, Clone)]
pub struct SchemaNode {
    pub field: SchemaField,
    /// Dotted path identifying the field, e.g. `payload.kind`.
    pub path: String,
    /// Nesting level for indentation.
    pub level: usize,
    pub has_children: bool,
}

/// Flatten schema fields depth-first, descending only into expanded paths.
pub fn flatten_schema(fields: &[SchemaField], expanded: &HashSet<String>) -> Vec<SchemaNode> {
    fn walk(
        fields: &[SchemaField],
        parent: &str,
        level: usize,
        expanded: &HashSet<String>,
        out: &mut Vec<SchemaNode>,
    ) {
        for field in fields {
            let path = if parent.is_empty() {
                field.name.clone()
            } else {
                format!("{parent}.{}", field.name)
            };
            let has_children = !field.fields.is_empty();

            out.push(SchemaNode {
                field: field.clone(),
                path: path.clone(),
                level,
                has_children,
            });

            if has_children && expanded.contains(&path) {
                walk(&field.fields, &path, level + 1, expanded, out);
            }
        }
    }

    let mut nodes = Vec::new();
    walk(fields, "", 0, expanded, &mut nodes);
    nodes
}

/// The browser's whole mutable state.
pub struct App {
    pub project: String,
    pub dataset: String,

    pub state: ViewState,
    /// Where to return from the help overlay.
    pub previous_state: ViewState,
    pub mode: Mode,

    pub tables: Vec<TableInfo>,
    /// Cache-hit indicator per table, parallel to `tables`.
    pub cached: Vec<bool>,
    pub selected_table: usize,

    /// Table currently open in the detail view.
    pub current_table: Option<String>,
    pub metadata: Option<TableMetadata>,
    pub schema_nodes: Vec<SchemaNode>,
    pub selected_schema: usize,
    pub expanded: HashSet<String>,

    pub search_context: SearchContext,
    pub search_query: String,

    pub status: Option<(String, Instant)>,
    pub error: Option<String>,

    /// Pending key for two-key sequences like `gg`.
    pub last_key: Option<char>,
}

impl App {
    pub fn new(project: String, dataset: String, initial_table: Option<String>) -> Self {
        Self {
            project,
            dataset,
            state: ViewState::Loading,
            previous_state: ViewState::TableList,
            mode: Mode::Normal,
            tables: Vec::new(),
            cached: Vec::new(),
            selected_table: 0,
            current_table: initial_table,
            metadata: None,
            schema_nodes: Vec::new(),
            selected_schema: 0,
            expanded: HashSet::new(),
            search_context: SearchContext::Tables,
            search_query: String::new(),
            status: None,
            error: None,
            last_key: None,
        }
    }

    pub fn set_tables(&mut self, tables: Vec<TableInfo>, cached: Vec<bool>) {
        self.tables = tables;
        self.cached = cached;
        if self.selected_table >= self.tables.len() {
            self.selected_table = 0;
        }
    }

    pub fn set_metadata(&mut self, metadata: TableMetadata) {
        self.metadata = Some(metadata);
        self.rebuild_schema_tree();
        self.state = ViewState::TableDetail;
    }

    /// Recompute the flattened tree after expansion or metadata changes.
    pub fn rebuild_schema_tree(&mut self) {
        self.schema_nodes = match self.metadata.as_ref().and_then(|m| m.schema.as_ref()) {
            Some(schema) => flatten_schema(&schema.fields, &self.expanded),
            None => Vec::new(),
        };
        if self.selected_schema >= self.schema_nodes.len() {
            self.selected_schema = 0;
        }
    }

    /// Indices into `tables` matching the active search filter.
    pub fn visible_tables(&self) -> Vec<usize> {
        if self.search_query.is_empty() || self.search_context != SearchContext::Tables {
            return (0..self.tables.len()).collect();
        }
        let query = self.search_query.to_lowercase();
        (0..self.tables.len())
            .filter(|&i| self.tables[i].table_id.to_lowercase().contains(&query))
            .collect()
    }

    /// Indices into `schema_nodes` matching the active search filter.
    pub fn visible_schema_nodes(&self) -> Vec<usize> {
        if self.search_query.is_empty() || self.search_context != SearchContext::Schema {
            return (0..self.schema_nodes.len()).collect();
        }
        let query = self.search_query.to_lowercase();
        (0..self.schema_nodes.len())
            .filter(|&i| {
                let node = &self.schema_nodes[i];
                node.field.name.to_lowercase().contains(&query)
                    || node.field.field_type.to_lowercase().contains(&query)
            })
            .collect()
    }

    /// Length of the list the selection currently moves over.
    fn selection_len(&self) -> usize {
        match self.state {
            ViewState::TableList => self.visible_tables().len(),
            ViewState::TableDetail => self.visible_schema_nodes().len(),
            _ => 0,
        }
    }

    fn selection(&mut self) -> &mut usize {
        match self.state {
            ViewState::TableDetail => &mut self.selected_schema,
            _ => &mut self.selected_table,
        }
    }

    pub fn move_selection(&mut self, delta: isize) {
        let len = self.selection_len();
        if len == 0 {
            return;
        }
        let selected = self.selection();
        let next = selected.saturating_add_signed(delta);
        *selected = next.min(len - 1);
    }

    pub fn move_top(&mut self) {
        *self.selection() = 0;
    }

    pub fn move_bottom(&mut self) {
        let len = self.selection_len();
        if len > 0 {
            *self.selection() = len - 1;
        }
    }

    /// The table currently under the cursor in the list view.
    pub fn selected_table_info(&self) -> Option<&TableInfo> {
        let visible = self.visible_tables();
        visible
            .get(self.selected_table)
            .map(|&i| &self.tables[i])
    }

    /// Whether the table under the cursor has cached metadata.
    pub fn selected_table_cached(&self) -> bool {
        let visible = self.visible_tables();
        visible
            .get(self.selected_table)
            .map(|&i| self.cached[i])
            .unwrap_or(false)
    }

    /// The schema node currently under the cursor in the detail view.
    pub fn selected_schema_node(&self) -> Option<&SchemaNode> {
        let visible = self.visible_schema_nodes();
        visible
            .get(self.selected_schema)
            .map(|&i| &self.schema_nodes[i])
    }

    /// Toggle expansion of the selected RECORD field.
    pub fn toggle_expand(&mut self) {
        let Some(node) = self.selected_schema_node() else {
            return;
        };
        if !node.has_children {
            return;
        }
        let path = node.path.clone();
        if !self.expanded.remove(&path) {
            self.expanded.insert(path);
        }
        self.rebuild_schema_tree();
    }

    pub fn enter_search(&mut self) {
        self.mode = Mode::Search;
        self.search_query.clear();
        self.search_context = match self.state {
            ViewState::TableDetail => SearchContext::Schema,
            _ => SearchContext::Tables,
        };
        self.move_top();
    }

    pub fn cancel_search(&mut self) {
        self.mode = Mode::Normal;
        self.search_query.clear();
        self.move_top();
    }

    /// Leave search mode but keep the filter applied.
    pub fn accept_search(&mut self) {
        self.mode = Mode::Normal;
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some((message.into(), Instant::now() + UiConfig::STATUS_MESSAGE_TTL));
    }

    /// Drop the status message once its deadline passes.
    pub fn expire_status(&mut self) {
        if let Some((_, deadline)) = &self.status {
            if Instant::now() >= *deadline {
                self.status = None;
            }
        }
    }

    pub fn status_text(&self) -> Option<&str> {
        self.status
            .as_ref()
            .filter(|(_, deadline)| Instant::now() < *deadline)
            .map(|(message, _)| message.as_str())
    }
}
