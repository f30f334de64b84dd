//! Ondas CLI — terminal player for the SS Radio stream

use std::io;
use std::os::unix::io::AsRawFd;
use std::time::{Duration, Instant};

use clap::Parser;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use ratatui::widgets::*;

use ondas::audio::RodioBackend;
use ondas::config::station::{NAME, STREAM_URL};
use ondas::config::volume::DEFAULT_PERCENT;
use ondas::player::StreamPlayer;
use ondas::state::{PlaybackPhase, PlayerSnapshot};

#[derive(Parser)]
#[command(name = "ondas", about = "Terminal player for the SS Radio stream", version)]
struct Cli {
    /// Initial volume (0-100)
    #[arg(long, default_value_t = DEFAULT_PERCENT)]
    volume: u8,
}

/// Frontend-local state; everything about playback lives in the player
struct Ui {
    muted: bool,
    saved_volume: u8,
    show_about: bool,
    running: bool,
}

const VOLUME_STEP: u8 = 5;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut player = StreamPlayer::with_volume(Box::new(RodioBackend::new()), cli.volume);
    player.initialize();

    // Suppress stderr during the TUI — ALSA/PulseAudio write diagnostic
    // messages to stderr which corrupt the ratatui display.
    let saved_stderr = unsafe { libc::dup(2) };
    {
        let devnull = std::fs::File::open("/dev/null")?;
        unsafe { libc::dup2(devnull.as_raw_fd(), 2) };
    }

    // Enter TUI
    terminal::enable_raw_mode()?;
    io::stdout().execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let mut ui = Ui {
        muted: false,
        saved_volume: cli.volume.min(100),
        show_about: false,
        running: true,
    };

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    while ui.running {
        terminal.draw(|f| draw_ui(f, player.snapshot(), player.retry_pending(), &ui))?;

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(key.code, &mut player, &mut ui);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
            player.poll();
        }
    }

    // Tear down playback while still in the alternate screen
    player.cleanup();
    drop(player);

    // Restore terminal
    terminal::disable_raw_mode()?;
    io::stdout().execute(LeaveAlternateScreen)?;

    // Restore stderr
    if saved_stderr >= 0 {
        unsafe {
            libc::dup2(saved_stderr, 2);
            libc::close(saved_stderr);
        }
    }

    Ok(())
}

fn handle_key(code: KeyCode, player: &mut StreamPlayer, ui: &mut Ui) {
    match code {
        KeyCode::Char('q') => {
            ui.running = false;
        }
        KeyCode::Esc => {
            if ui.show_about {
                ui.show_about = false;
            } else {
                ui.running = false;
            }
        }
        KeyCode::Char('a') => {
            ui.show_about = !ui.show_about;
        }
        KeyCode::Char(' ') | KeyCode::Char('p') => {
            player.toggle_play();
        }
        KeyCode::Char('r') => {
            player.retry_connection(Instant::now());
        }
        KeyCode::Char('m') => {
            if ui.muted {
                ui.muted = false;
                player.change_volume(ui.saved_volume);
            } else {
                ui.saved_volume = player.snapshot().volume;
                ui.muted = true;
                player.change_volume(0);
            }
        }
        KeyCode::Char('+') | KeyCode::Char('=') => {
            let volume = player.snapshot().volume.saturating_add(VOLUME_STEP).min(100);
            ui.muted = false;
            player.change_volume(volume);
        }
        KeyCode::Char('-') => {
            let volume = player.snapshot().volume.saturating_sub(VOLUME_STEP);
            if volume == 0 {
                ui.muted = true;
            }
            player.change_volume(volume);
        }
        _ => {}
    }
}

fn draw_ui(f: &mut Frame, snapshot: &PlayerSnapshot, retry_pending: bool, ui: &Ui) {
    let area = f.area();

    let outer = Block::default()
        .title(format!(" Ondas v{} ", env!("CARGO_PKG_VERSION")))
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded);
    let inner = outer.inner(area);
    f.render_widget(outer, area);

    let chunks = Layout::vertical([
        Constraint::Length(4), // station + now playing
        Constraint::Length(4), // status
        Constraint::Length(3), // help bar
    ])
    .split(inner);

    draw_metadata(f, snapshot, chunks[0]);
    draw_status(f, snapshot, retry_pending, chunks[1]);
    draw_help(f, snapshot, ui, chunks[2]);

    if ui.show_about {
        draw_about(f, area);
    }
}

fn draw_metadata(f: &mut Frame, snapshot: &PlayerSnapshot, area: Rect) {
    let max_url_len = area.width.saturating_sub(9) as usize;
    let url_display = truncate_str(STREAM_URL, max_url_len);
    let text = vec![
        Line::from(vec![
            Span::styled("  Station: ", Style::default().fg(Color::DarkGray)),
            Span::styled(NAME, Style::default().fg(Color::White).bold()),
        ]),
        Line::from(vec![
            Span::styled("  Now Playing: ", Style::default().fg(Color::DarkGray)),
            Span::styled(&snapshot.current_song, Style::default().fg(Color::Yellow)),
        ]),
        Line::from(vec![
            Span::styled("  URL: ", Style::default().fg(Color::DarkGray)),
            Span::styled(url_display, Style::default().fg(Color::DarkGray)),
        ]),
    ];
    f.render_widget(Paragraph::new(text), area);
}

fn draw_status(f: &mut Frame, snapshot: &PlayerSnapshot, retry_pending: bool, area: Rect) {
    let (status, status_color) = match snapshot.phase {
        PlaybackPhase::Playing => ("Playing".to_string(), Color::Green),
        PlaybackPhase::Loading => ("Loading...".to_string(), Color::Yellow),
        PlaybackPhase::Paused => ("Paused".to_string(), Color::Yellow),
        PlaybackPhase::Stopped => ("Stopped".to_string(), Color::DarkGray),
        PlaybackPhase::Errored => {
            let message = snapshot
                .error_message
                .as_deref()
                .unwrap_or("Error")
                .to_string();
            let message = if retry_pending {
                format!("{message} — reconnecting...")
            } else {
                message
            };
            (message, Color::Red)
        }
    };

    let codec_str = match &snapshot.codec {
        Some(info) => info.to_string(),
        None => "---".to_string(),
    };

    let block = Block::default()
        .title(" Playback ")
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::DarkGray));
    let text = vec![
        Line::from(vec![
            Span::styled("  Status: ", Style::default().fg(Color::DarkGray)),
            Span::styled(status, Style::default().fg(status_color)),
        ]),
        Line::from(vec![
            Span::styled("  Codec: ", Style::default().fg(Color::DarkGray)),
            Span::styled(codec_str, Style::default().fg(Color::White)),
        ]),
    ];
    f.render_widget(Paragraph::new(text).block(block), area);
}

fn draw_help(f: &mut Frame, snapshot: &PlayerSnapshot, ui: &Ui, area: Rect) {
    let vol_display = if ui.muted {
        "MUTE".to_string()
    } else {
        format!("{}%", snapshot.volume)
    };

    let help = Line::from(vec![
        Span::styled("  'space' ", Style::default().fg(Color::Yellow)),
        Span::raw("play/pause  |  "),
        Span::styled("'+'/'-' ", Style::default().fg(Color::Yellow)),
        Span::raw("volume  |  "),
        Span::styled("'m' ", Style::default().fg(Color::Yellow)),
        Span::raw("mute  |  "),
        Span::styled("'r' ", Style::default().fg(Color::Yellow)),
        Span::raw("retry  |  "),
        Span::styled("'a' ", Style::default().fg(Color::Yellow)),
        Span::raw("about  |  "),
        Span::styled("'q' ", Style::default().fg(Color::Yellow)),
        Span::raw("quit  |  "),
        Span::styled(
            format!("Vol: {}", vol_display),
            Style::default().fg(Color::Cyan).bold(),
        ),
    ]);

    f.render_widget(Paragraph::new(help).alignment(Alignment::Left), area);
}

fn draw_about(f: &mut Frame, area: Rect) {
    let popup = centered_rect(60, 9, area);
    f.render_widget(Clear, popup);

    let block = Block::default()
        .title(" About ")
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded);
    let text = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("Ondas v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::White).bold(),
        )),
        Line::from(""),
        Line::from(format!("A terminal player for the {} stream.", NAME)),
        Line::from("Track info is a placeholder; the station"),
        Line::from("publishes no metadata."),
    ];
    f.render_widget(
        Paragraph::new(text).alignment(Alignment::Center).block(block),
        popup,
    );
}

/// Center a fixed-size rect inside `area`
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    }
}

fn truncate_str(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else if max > 3 {
        format!("{}...", &s[..max - 3])
    } else {
        s[..max.min(s.len())].to_string()
    }
}
