//! Clinform - terminal client for dynamic clinical data-collection forms
//!
//! Loads a form schema from the form service, renders it with conditional
//! visibility and calculated values, and submits or reviews responses.

mod api;
mod app;
mod config;
mod enrich;
mod expr;
mod render;
mod schema;
mod state;
mod ui;

use anyhow::Result;
use api::{AuthContext, HttpFormApi};
use app::App;
use config::ClientConfig;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clinform=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let config = ClientConfig::load()?;
    let form_arg = std::env::args().nth(1);
    let form_id = config.resolve_form_id(form_arg.as_deref())?;
    if form_arg.is_some() {
        if let Err(err) = ClientConfig::remember_form_id(form_id) {
            tracing::warn!(error = %format!("{err:#}"), "Could not save form id");
        }
    }

    let auth = match &config.session_cookie {
        Some(cookie) => AuthContext::with_cookie(cookie.clone()),
        None => AuthContext::default(),
    };
    if !auth.is_authenticated() {
        tracing::warn!("No session cookie configured; the form service may reject requests");
    }
    let api = HttpFormApi::new(&config.api_base_url, auth)?;
    tracing::info!(base = %config.api_base_url, form = %form_id, "Starting");

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create app and run
    let mut app = App::new(Arc::new(api), config, form_id);
    terminal.draw(|frame| ui::draw(frame, &app))?;
    app.load_form().await;
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    // Handle any errors
    if let Err(err) = result {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }

    Ok(())
}

async fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        // Apply finished lookups before drawing
        app.tick();

        terminal.draw(|frame| ui::draw(frame, app))?;

        // Poll faster while lookups are running
        let poll_duration = if app.fetches_in_flight() > 0 {
            Duration::from_millis(16)
        } else {
            Duration::from_millis(100)
        };

        if event::poll(poll_duration)? {
            if let Event::Key(key) = event::read()? {
                // Global quit: Ctrl+C
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                app.handle_key(key).await?;
            }
        }

        if app.should_quit() {
            return Ok(());
        }
    }
}
