//! Interactive dataset browser.
//!
//! Input arrives from a reader thread over an mpsc channel; fetches run as
//! background tasks posting typed events back into the loop, so a key
//! press is never blocked on the external tool.

mod keys;
mod state;
mod view;

use anyhow::Result;
use bqs_core::bq::{TableInfo, TableMetadata};
use bqs_core::clipboard;
use bqs_core::config::UiConfig;
use bqs_core::error::BqsError;
use bqs_core::Client;
use crossterm::event::{self, Event as CrosstermEvent};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use keys::KeyAction;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use serde::Serialize;
use state::{App, Mode, ViewState};
use std::io::{self, Stdout};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

enum BrowserEvent {
    Input(crossterm::event::KeyEvent),
    Resize,
    TablesLoaded(Vec<TableInfo>),
    MetadataLoaded(Box<TableMetadata>),
    LoadFailed(BqsError),
    ExportDone {
        table_id: String,
        result: Result<(), String>,
    },
}

/// Run the browser until the user quits.
pub async fn run(
    client: Client,
    project: String,
    dataset: String,
    table: Option<String>,
) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let _guard = TerminalGuard;

    let (tx, mut rx) = mpsc::channel::<BrowserEvent>(256);
    spawn_input_reader(tx.clone());

    let mut app = App::new(project, dataset, table.clone());
    let token = CancellationToken::new();

    spawn_load_tables(&client, &tx, &app, &token);
    if let Some(table) = table {
        // Deep dive: land directly on the detail view once metadata arrives.
        spawn_load_metadata(&client, &tx, &app, &token, table);
    }

    let mut ticker = tokio::time::interval(UiConfig::TICK_INTERVAL);

    loop {
        terminal.draw(|f| view::render(f, &app))?;

        tokio::select! {
            _ = ticker.tick() => {
                app.expire_status();
            }
            maybe_event = rx.recv() => {
                let Some(event) = maybe_event else { break };
                if handle_event(&mut app, event, &client, &tx, &token) {
                    break;
                }
            }
        }
    }

    token.cancel();
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = execute!(stdout, LeaveAlternateScreen);
    }
}

fn spawn_input_reader(sender: mpsc::Sender<BrowserEvent>) {
    std::thread::spawn(move || loop {
        if let Ok(true) = event::poll(UiConfig::INPUT_POLL_INTERVAL) {
            if let Ok(evt) = event::read() {
                let send = match evt {
                    CrosstermEvent::Key(key) => sender.blocking_send(BrowserEvent::Input(key)),
                    CrosstermEvent::Resize(_, _) => sender.blocking_send(BrowserEvent::Resize),
                    _ => Ok(()),
                };
                if send.is_err() {
                    break;
                }
            }
        }
    });
}

/// Apply one event; returns true when the browser should exit.
fn handle_event(
    app: &mut App,
    event: BrowserEvent,
    client: &Client,
    tx: &mpsc::Sender<BrowserEvent>,
    token: &CancellationToken,
) -> bool {
    match event {
        BrowserEvent::Input(key) => return handle_key(app, key, client, tx, token),
        BrowserEvent::Resize => {}
        BrowserEvent::TablesLoaded(tables) => {
            let cached = tables
                .iter()
                .map(|t| client.is_table_metadata_cached(&app.project, &app.dataset, &t.table_id))
                .collect();
            app.set_tables(tables, cached);
            if app.state == ViewState::Loading || app.state == ViewState::Error {
                app.state = ViewState::TableList;
                app.error = None;
            }
        }
        BrowserEvent::MetadataLoaded(metadata) => {
            app.set_metadata(*metadata);
        }
        BrowserEvent::LoadFailed(err) => {
            let message = err.user_friendly_message();
            if app.tables.is_empty() {
                app.error = Some(message);
                app.state = ViewState::Error;
            } else {
                app.set_status(format!("✗ {message}"));
                // Don't strand the user on a detail view that never loads.
                if app.state == ViewState::Loading
                    || (app.state == ViewState::TableDetail && app.metadata.is_none())
                {
                    app.state = ViewState::TableList;
                    app.current_table = None;
                }
            }
        }
        BrowserEvent::ExportDone { table_id, result } => match result {
            Ok(()) => app.set_status(format!("✓ Copied {table_id} metadata to clipboard")),
            Err(message) => app.set_status(format!("✗ Export failed: {message}")),
        },
    }
    false
}

fn handle_key(
    app: &mut App,
    key: crossterm::event::KeyEvent,
    client: &Client,
    tx: &mpsc::Sender<BrowserEvent>,
    token: &CancellationToken,
) -> bool {
    // Any key closes the help overlay.
    if app.state == ViewState::Help {
        app.state = app.previous_state;
        return false;
    }

    let action = keys::map_key(key, app.mode, app.last_key);
    app.last_key = match action {
        KeyAction::PendingG => Some('g'),
        _ => None,
    };

    match action {
        KeyAction::Quit => return true,
        KeyAction::MoveUp => app.move_selection(-1),
        KeyAction::MoveDown => app.move_selection(1),
        KeyAction::Top => app.move_top(),
        KeyAction::Bottom => app.move_bottom(),

        KeyAction::Select => match app.state {
            ViewState::TableList => {
                if let Some(info) = app.selected_table_info() {
                    let table = info.table_id.clone();
                    app.current_table = Some(table.clone());
                    app.metadata = None;
                    app.schema_nodes.clear();
                    app.expanded.clear();
                    app.selected_schema = 0;
                    app.state = ViewState::TableDetail;
                    if app.mode == Mode::Search {
                        app.cancel_search();
                    } else {
                        app.search_query.clear();
                    }
                    spawn_load_metadata(client, tx, app, token, table);
                }
            }
            ViewState::TableDetail => app.toggle_expand(),
            _ => {}
        },

        KeyAction::Back => match app.state {
            ViewState::TableDetail => {
                app.state = ViewState::TableList;
                app.current_table = None;
                app.search_query.clear();
            }
            ViewState::Error => {
                if app.tables.is_empty() {
                    return true;
                }
                app.state = ViewState::TableList;
            }
            ViewState::TableList => return true,
            _ => {}
        },

        KeyAction::ToggleExpand => {
            if app.state == ViewState::TableDetail {
                app.toggle_expand();
            }
        }

        KeyAction::OpenSearch => {
            if matches!(app.state, ViewState::TableList | ViewState::TableDetail) {
                app.enter_search();
            }
        }

        KeyAction::Refresh => match app.state {
            ViewState::TableList | ViewState::Error | ViewState::Loading => {
                if let Err(err) = client.invalidate_cache(&app.project, &app.dataset, None) {
                    app.set_status(format!("✗ {}", err.user_friendly_message()));
                } else {
                    app.set_status("🔄 Refreshing tables...");
                    app.state = ViewState::Loading;
                    spawn_load_tables(client, tx, app, token);
                }
            }
            ViewState::TableDetail => {
                if let Some(table) = app.current_table.clone() {
                    if let Err(err) =
                        client.invalidate_cache(&app.project, &app.dataset, Some(&table))
                    {
                        app.set_status(format!("✗ {}", err.user_friendly_message()));
                    } else {
                        app.set_status(format!("🔄 Refreshing {table}..."));
                        app.metadata = None;
                        spawn_load_metadata(client, tx, app, token, table);
                    }
                }
            }
            _ => {}
        },

        KeyAction::Export => {
            // Reuse already-loaded metadata only when it belongs to the
            // table being exported.
            let (target, existing) = match app.state {
                ViewState::TableDetail => (app.current_table.clone(), app.metadata.clone()),
                ViewState::TableList => (
                    app.selected_table_info().map(|info| info.table_id.clone()),
                    None,
                ),
                _ => (None, None),
            };
            if let Some(table) = target {
                app.set_status(format!("📋 Exporting {table}..."));
                spawn_export(client, tx, app, token, table, existing);
            }
        }

        KeyAction::Help => {
            app.previous_state = app.state;
            app.state = ViewState::Help;
        }

        KeyAction::SearchChar(c) => {
            app.search_query.push(c);
            app.move_top();
        }
        KeyAction::SearchBackspace => {
            app.search_query.pop();
            app.move_top();
        }
        KeyAction::SearchAccept => app.accept_search(),
        KeyAction::SearchCancel => app.cancel_search(),

        KeyAction::PendingG | KeyAction::None => {}
    }

    false
}

fn spawn_load_tables(
    client: &Client,
    tx: &mpsc::Sender<BrowserEvent>,
    app: &App,
    token: &CancellationToken,
) {
    let client = client.clone();
    let tx = tx.clone();
    let token = token.clone();
    let (project, dataset) = (app.project.clone(), app.dataset.clone());

    tokio::spawn(async move {
        let event = match client.list_tables(&token, &project, &dataset).await {
            Ok(tables) => BrowserEvent::TablesLoaded(tables),
            Err(err) => BrowserEvent::LoadFailed(err),
        };
        let _ = tx.send(event).await;
    });
}

fn spawn_load_metadata(
    client: &Client,
    tx: &mpsc::Sender<BrowserEvent>,
    app: &App,
    token: &CancellationToken,
    table: String,
) {
    let client = client.clone();
    let tx = tx.clone();
    let token = token.clone();
    let (project, dataset) = (app.project.clone(), app.dataset.clone());

    tokio::spawn(async move {
        let event = match client
            .get_table_metadata(&token, &project, &dataset, &table)
            .await
        {
            Ok(metadata) => BrowserEvent::MetadataLoaded(Box::new(metadata)),
            Err(err) => BrowserEvent::LoadFailed(err),
        };
        let _ = tx.send(event).await;
    });
}

/// JSON shape written to the clipboard by the export action.
#[derive(Serialize)]
struct ExportData<'a> {
    project: &'a str,
    dataset: &'a str,
    table_id: &'a str,
    full_table_id: String,
    #[serde(rename = "type")]
    table_type: &'a str,
    metadata: &'a TableMetadata,
    exported_at: String,
}

fn spawn_export(
    client: &Client,
    tx: &mpsc::Sender<BrowserEvent>,
    app: &App,
    token: &CancellationToken,
    table: String,
    existing: Option<TableMetadata>,
) {
    let client = client.clone();
    let tx = tx.clone();
    let token = token.clone();
    let (project, dataset) = (app.project.clone(), app.dataset.clone());

    tokio::spawn(async move {
        let metadata = match existing {
            Some(metadata) => Ok(metadata),
            None => client
                .get_table_metadata(&token, &project, &dataset, &table)
                .await
                .map_err(|err| err.user_friendly_message()),
        };

        let result = match metadata {
            Ok(metadata) => export_to_clipboard(&project, &dataset, &table, &metadata),
            Err(message) => Err(message),
        };

        let _ = tx
            .send(BrowserEvent::ExportDone {
                table_id: table,
                result,
            })
            .await;
    });
}

fn export_to_clipboard(
    project: &str,
    dataset: &str,
    table: &str,
    metadata: &TableMetadata,
) -> Result<(), String> {
    let export = ExportData {
        project,
        dataset,
        table_id: table,
        full_table_id: format!("{project}.{dataset}.{table}"),
        table_type: &metadata.info.table_type,
        metadata,
        exported_at: chrono::Utc::now().to_rfc3339(),
    };

    let json = serde_json::to_string_pretty(&export)
        .map_err(|_| "Failed to generate JSON export".to_string())?;

    clipboard::copy_to_clipboard(&json).map_err(|err| err.to_string())
}
