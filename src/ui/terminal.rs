use {
    crate::pipeline::{lock_engine, PipelineEngine},
    crate::ui::layout::{render_layout, ChartView},
    ratatui::{backend::CrosstermBackend, Terminal},
    std::{
        fs::File,
        path::Path,
        sync::{Arc, Mutex},
        time::Duration,
    },
    tokio::sync::watch,
};

const REFRESH_INTERVAL: Duration = Duration::from_millis(250);

/// Where logs go for a run
///
/// stderr shares the tty with the chart, so with the UI on they go to
/// `log_path` (truncated) instead.
pub fn log_target(enable_ui: bool, log_path: &Path) -> std::io::Result<env_logger::Target> {
    if !enable_ui {
        return Ok(env_logger::Target::Stderr);
    }
    let log_file = File::create(log_path)?;
    Ok(env_logger::Target::Pipe(Box::new(log_file)))
}

/// Run the live chart until shutdown or until the user presses `q`/Esc
///
/// A keypress stop is forwarded to `stop_tx` so the rest of the pipeline
/// winds down with the UI.
pub async fn run_ui(
    engine: Arc<Mutex<PipelineEngine>>,
    trailing_secs: f64,
    stop_tx: watch::Sender<bool>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut shutdown = stop_tx.subscribe();

    let stdout = std::io::stdout();
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    crossterm::terminal::enable_raw_mode()?;

    // Logs must not reach the tty while this is up, see `log_target`
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::cursor::Hide
    )?;
    terminal.clear()?;

    let result = draw_loop(&mut terminal, &engine, trailing_secs, &stop_tx, &mut shutdown).await;

    // Restore terminal state even if drawing failed
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::cursor::Show
    )?;
    crossterm::terminal::disable_raw_mode()?;

    result
}

async fn draw_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    engine: &Mutex<PipelineEngine>,
    trailing_secs: f64,
    stop_tx: &watch::Sender<bool>,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        if *shutdown.borrow() {
            break;
        }

        // Copy the frame data out, then draw without holding the lock
        let view = {
            let engine_guard = lock_engine(engine);
            ChartView::build(&engine_guard, trailing_secs)
        };

        let area = terminal.size()?;
        terminal.draw(|f| render_layout(f, area, &view))?;

        let key = tokio::task::block_in_place(|| -> std::io::Result<Option<crossterm::event::KeyCode>> {
            if crossterm::event::poll(REFRESH_INTERVAL)? {
                if let crossterm::event::Event::Key(key) = crossterm::event::read()? {
                    return Ok(Some(key.code));
                }
            }
            Ok(None)
        })?;

        match key {
            Some(crossterm::event::KeyCode::Char('q')) | Some(crossterm::event::KeyCode::Esc) => {
                log::info!("🛑 Stop requested from UI");
                let _ = stop_tx.send(true);
                break;
            }
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_log_target_moves_off_tty_with_ui() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipeline_runtime.log");

        assert!(matches!(log_target(false, &path).unwrap(), env_logger::Target::Stderr));
        assert!(!path.exists());

        assert!(matches!(log_target(true, &path).unwrap(), env_logger::Target::Pipe(_)));
        assert!(path.exists());

        assert!(log_target(true, &dir.path().join("missing").join("x.log")).is_err());
    }
}
