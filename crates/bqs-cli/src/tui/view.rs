//! Rendering for the browser views.

use super::state::{App, Mode, SearchContext, ViewState};
use bqs_core::format::{format_bytes, format_time, table_type_icon};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, Borders, Cell, List, ListItem, ListState, Paragraph, Row, Table, TableState, Wrap,
};
use ratatui::Frame;

pub fn render(f: &mut Frame<'_>, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(f.size());

    render_header(f, app, chunks[0]);

    match app.state {
        ViewState::Loading => render_loading(f, chunks[1]),
        ViewState::TableList => render_table_list(f, app, chunks[1]),
        ViewState::TableDetail => render_table_detail(f, app, chunks[1]),
        ViewState::Error => render_error(f, app, chunks[1]),
        ViewState::Help => render_help(f, chunks[1]),
    }

    render_footer(f, app, chunks[2]);
}

fn render_header(f: &mut Frame<'_>, app: &App, area: Rect) {
    let title = match (&app.state, &app.current_table) {
        (ViewState::TableDetail, Some(table)) => {
            format!("📊 {}.{}.{}", app.project, app.dataset, table)
        }
        _ => format!("📊 {}.{}", app.project, app.dataset),
    };

    let mut spans = vec![Span::styled(
        title,
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )];
    if app.state == ViewState::TableList && !app.tables.is_empty() {
        spans.push(Span::raw(format!("  ({} tables)", app.visible_tables().len())));
    }

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default().borders(Borders::BOTTOM),
    );
    f.render_widget(header, area);
}

fn render_loading(f: &mut Frame<'_>, area: Rect) {
    let loading = Paragraph::new("⏳ Loading...")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Yellow));
    f.render_widget(loading, centered_line(area));
}

fn render_table_list(f: &mut Frame<'_>, app: &App, area: Rect) {
    let visible = app.visible_tables();

    if visible.is_empty() {
        let message = if app.search_query.is_empty() {
            "No tables found in this dataset".to_string()
        } else {
            format!("No tables matching '{}'", app.search_query)
        };
        let empty = Paragraph::new(message)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(empty, centered_line(area));
        return;
    }

    let header = Row::new(vec!["⚡", "", "Table", "Type", "Created"]).style(
        Style::default()
            .fg(Color::Gray)
            .add_modifier(Modifier::BOLD),
    );

    let rows: Vec<Row> = visible
        .iter()
        .map(|&i| {
            let table = &app.tables[i];
            let cached = if app.cached.get(i).copied().unwrap_or(false) {
                "⚡"
            } else {
                " "
            };
            Row::new(vec![
                Cell::from(cached),
                Cell::from(table_type_icon(&table.table_type)),
                Cell::from(table.table_id.clone()),
                Cell::from(table.table_type.clone()),
                Cell::from(format_time(table.creation_time)),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(2),
        Constraint::Length(3),
        Constraint::Min(24),
        Constraint::Length(18),
        Constraint::Length(14),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .highlight_style(
            Style::default()
                .bg(Color::Indexed(62))
                .fg(Color::Indexed(230)),
        )
        .block(Block::default().borders(Borders::NONE));

    let mut state = TableState::default();
    state.select(Some(app.selected_table.min(visible.len() - 1)));
    f.render_stateful_widget(table, area, &mut state);
}

fn render_table_detail(f: &mut Frame<'_>, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .split(area);

    let info_line = match &app.metadata {
        Some(metadata) => Line::from(vec![
            Span::raw(format!("📈 {} rows", metadata.info.num_rows)),
            Span::raw("  •  "),
            Span::raw(format!(
                "💾 {}",
                format_bytes(metadata.info.num_bytes.max(0) as u64)
            )),
            Span::raw("  •  "),
            Span::raw(format!(
                "🕒 Modified {}",
                format_time(metadata.info.last_modified_time)
            )),
        ]),
        None => Line::from("⏳ Loading metadata..."),
    };

    let info = Paragraph::new(info_line).block(
        Block::default()
            .borders(Borders::BOTTOM)
            .title("🌲 Schema"),
    );
    f.render_widget(info, chunks[0]);

    let visible = app.visible_schema_nodes();
    let items: Vec<ListItem> = visible
        .iter()
        .map(|&i| {
            let node = &app.schema_nodes[i];
            let indent = "  ".repeat(node.level);

            let expand_icon = if node.has_children {
                if app.expanded.contains(&node.path) {
                    "▼ "
                } else {
                    "▶ "
                }
            } else {
                "  "
            };

            let mut spans = vec![
                Span::raw(format!("{indent}├─{expand_icon}")),
                Span::raw(node.field.name.clone()),
                Span::raw(" "),
                Span::styled(
                    node.field.field_type.clone(),
                    Style::default().fg(Color::Indexed(33)),
                ),
            ];
            match node.field.mode.as_str() {
                "REQUIRED" => spans.push(Span::styled(
                    " REQUIRED",
                    Style::default().fg(Color::Indexed(196)),
                )),
                "REPEATED" => spans.push(Span::styled(
                    " REPEATED",
                    Style::default().fg(Color::Indexed(220)),
                )),
                _ => {}
            }

            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items).highlight_style(
        Style::default()
            .bg(Color::Indexed(62))
            .fg(Color::Indexed(230)),
    );

    let mut state = ListState::default();
    if !visible.is_empty() {
        state.select(Some(app.selected_schema.min(visible.len() - 1)));
    }
    f.render_stateful_widget(list, chunks[1], &mut state);
}

fn render_error(f: &mut Frame<'_>, app: &App, area: Rect) {
    let message = app.error.as_deref().unwrap_or("Something went wrong");
    let error = Paragraph::new(vec![
        Line::from(Span::styled(
            format!("✗ {message}"),
            Style::default().fg(Color::Red),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "r to retry • q to quit",
            Style::default().fg(Color::DarkGray),
        )),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true });
    f.render_widget(error, centered_line(area));
}

fn render_help(f: &mut Frame<'_>, area: Rect) {
    let lines = vec![
        Line::from(Span::styled(
            "Keyboard shortcuts",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("  j / ↓        move down"),
        Line::from("  k / ↑        move up"),
        Line::from("  gg / G       jump to top / bottom"),
        Line::from("  enter        open table / toggle field"),
        Line::from("  tab          expand or collapse a RECORD field"),
        Line::from("  /            search tables or schema fields"),
        Line::from("  r            refresh (drops cached data)"),
        Line::from("  c            copy table metadata JSON to clipboard"),
        Line::from("  esc          back"),
        Line::from("  ?            toggle this help"),
        Line::from("  q            quit"),
    ];

    let help = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Help"),
    );
    f.render_widget(help, area);
}

fn render_footer(f: &mut Frame<'_>, app: &App, area: Rect) {
    let line = if app.mode == Mode::Search {
        let target = match app.search_context {
            SearchContext::Tables => "tables",
            SearchContext::Schema => "schema",
        };
        Line::from(vec![
            Span::styled("Search ", Style::default().fg(Color::Yellow)),
            Span::raw(format!("({target}): {}▌", app.search_query)),
        ])
    } else if let Some(status) = app.status_text() {
        Line::from(Span::styled(status, Style::default().fg(Color::Yellow)))
    } else {
        let hints = match app.state {
            ViewState::TableList => "enter open • / search • r refresh • c copy • ? help • q quit",
            ViewState::TableDetail => {
                "tab expand • / search • r refresh • c copy • esc back • q quit"
            }
            ViewState::Error => "r retry • q quit",
            ViewState::Help => "press any key to close",
            ViewState::Loading => "",
        };
        Line::from(Span::styled(hints, Style::default().fg(Color::DarkGray)))
    };

    let footer = Paragraph::new(line).block(Block::default().borders(Borders::TOP));
    f.render_widget(footer, area);
}

/// A one-line area vertically centered in `area`, for short messages.
fn centered_line(area: Rect) -> Rect {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(45),
            Constraint::Length(3),
            Constraint::Percentage(45),
        ])
        .split(area);
    chunks[1]
}
