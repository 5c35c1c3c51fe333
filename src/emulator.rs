use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use log::info;
use ratatui::Terminal;
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Alignment, Constraint, Direction, Layout};
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders, Paragraph};

use chip8_core::{
    Chip8, DISPLAY_HEIGHT, DISPLAY_WIDTH, PixelState, Peripherals, RandomPeripherals, Redraw,
    RunState, Screen,
};

pub const DEFAULT_FRAME_RATE: u64 = 60;
pub const DEFAULT_INSTRUCTIONS_PER_SECOND: u64 = 700;

pub struct Settings {
    pub frame_rate: u64,
    pub ips: u64,
    pub rom: PathBuf,
    pub seed: Option<u64>,
}
impl Settings {
    pub fn new(frame_rate: u64, ips: u64, rom: PathBuf, seed: Option<u64>) -> Self {
        Settings {
            frame_rate,
            ips,
            rom,
            seed,
        }
    }

    pub fn instructions_per_frame(&self) -> u64 {
        (self.ips / self.frame_rate.max(1)).max(1)
    }
}

/// Host side of the machine: random bytes plus a repaint flag raised by the
/// interpreter's redraw hints.
struct TerminalPeripherals {
    random: RandomPeripherals,
    dirty: bool,
}
impl Peripherals for TerminalPeripherals {
    fn next_random_byte(&mut self) -> u8 {
        self.random.next_random_byte()
    }

    fn on_redraw(&mut self, _redraw: Redraw) {
        self.dirty = true;
    }
}

/// Maps the left-hand 4x4 block of a QWERTY keyboard onto the hex keypad.
fn keypad_index(code: KeyCode) -> Option<u8> {
    let KeyCode::Char(c) = code else {
        return None;
    };
    match c.to_ascii_lowercase() {
        '1' => Some(0x1),
        '2' => Some(0x2),
        '3' => Some(0x3),
        '4' => Some(0xC),
        'q' => Some(0x4),
        'w' => Some(0x5),
        'e' => Some(0x6),
        'r' => Some(0xD),
        'a' => Some(0x7),
        's' => Some(0x8),
        'd' => Some(0x9),
        'f' => Some(0xE),
        'z' => Some(0xA),
        'x' => Some(0x0),
        'c' => Some(0xB),
        'v' => Some(0xF),
        _ => None,
    }
}

fn render_screen(screen: &Screen) -> String {
    let mut row_string = String::with_capacity(DISPLAY_WIDTH * DISPLAY_HEIGHT + DISPLAY_HEIGHT);
    for row_idx in 0..DISPLAY_HEIGHT {
        for col_idx in 0..DISPLAY_WIDTH {
            row_string.push(match screen.pixel(col_idx, row_idx) {
                PixelState::On => '█',
                PixelState::Off => ' ',
            });
        }
        row_string.push('\n');
    }
    row_string
}

pub struct Emulator {
    settings: Settings,
    chip8: Chip8<TerminalPeripherals>,
    /// Set once the terminal has delivered a key release event.
    reports_releases: bool,
}

impl Emulator {
    pub fn new(settings: Settings) -> Self {
        let random = match settings.seed {
            Some(seed) => RandomPeripherals::seeded(seed),
            None => RandomPeripherals::new(),
        };
        Emulator {
            settings,
            chip8: Chip8::new(TerminalPeripherals {
                random,
                dirty: true,
            }),
            reports_releases: false,
        }
    }

    fn draw(&self, frame: &mut ratatui::Frame, rom_name: &str) {
        let game_width = (DISPLAY_WIDTH as u16) + 2;
        let game_height = (DISPLAY_HEIGHT as u16) + 2;

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(game_height),
                Constraint::Length(7),
                Constraint::Min(0),
            ])
            .split(frame.area());

        let game_area = if chunks[0].width > game_width {
            Layout::default()
                .direction(Direction::Horizontal)
                .constraints([
                    Constraint::Min(0),
                    Constraint::Length(game_width),
                    Constraint::Min(0),
                ])
                .split(chunks[0])[1]
        } else {
            chunks[0]
        };

        let title = match self.chip8.run_state() {
            RunState::Running => rom_name.to_string(),
            RunState::WaitingForInput => format!("{rom_name} (waiting for key)"),
            RunState::InvalidOpcode | RunState::Faulted => match self.chip8.fault() {
                Some(fault) => format!("{rom_name} (halted: {fault})"),
                None => format!("{rom_name} (halted)"),
            },
        };
        let game_paragraph = Paragraph::new(render_screen(self.chip8.screen()))
            .block(Block::default().borders(Borders::ALL).title(title))
            .style(Style::default().fg(Color::White));
        frame.render_widget(game_paragraph, game_area);

        let key_mapping = "Key Mapping:\n\
    1 2 3 4    →    1 2 3 C\n\
    Q W E R    →    4 5 6 D\n\
    A S D F    →    7 8 9 E\n\
    Z X C V    →    A 0 B F";
        let key_paragraph = Paragraph::new(key_mapping)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("Keypad (Esc quits)"))
            .style(Style::default().fg(Color::Yellow));
        frame.render_widget(key_paragraph, chunks[1]);
    }

    /// Feeds pending key events to the machine. Returns false once Esc is hit.
    fn handle_input(&mut self) -> anyhow::Result<bool> {
        while event::poll(Duration::ZERO)? {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if !self.handle_key(key.code, key.kind)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn handle_key(&mut self, code: KeyCode, kind: KeyEventKind) -> anyhow::Result<bool> {
        if code == KeyCode::Esc {
            return Ok(false);
        }
        if let Some(index) = keypad_index(code) {
            match kind {
                KeyEventKind::Release => {
                    self.reports_releases = true;
                    self.chip8.release_key(index)?;
                }
                _ => self.chip8.press_key(index)?,
            }
        }
        Ok(true)
    }

    /// Without release events a key counts as held for a single frame.
    fn end_frame(&mut self) {
        if !self.reports_releases {
            self.chip8.release_all_keys();
        }
    }

    fn main_loop<B: Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
        rom_name: &str,
    ) -> anyhow::Result<()> {
        let frame_duration = Duration::from_secs_f64(1.0 / self.settings.frame_rate as f64);
        let instructions_per_frame = self.settings.instructions_per_frame();
        let mut last_state = self.chip8.run_state();

        while self.handle_input()? {
            let frame_start = Instant::now();

            self.chip8.tick_timers();
            for _ in 0..instructions_per_frame {
                // A halted machine keeps its last frame on screen until Esc.
                if self.chip8.cycle().is_err() {
                    break;
                }
            }

            let run_state = self.chip8.run_state();
            if self.chip8.peripherals().dirty || run_state != last_state {
                terminal.draw(|frame| self.draw(frame, rom_name))?;
                self.chip8.peripherals_mut().dirty = false;
                last_state = run_state;
            }
            self.end_frame();

            let elapsed = frame_start.elapsed();
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            }
        }
        Ok(())
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        let rom_stem: String = self
            .settings
            .rom
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Unknown ROM".to_string());
        let rom_data = std::fs::read(&self.settings.rom)
            .with_context(|| format!("Failed to read ROM {}", self.settings.rom.display()))?;
        self.chip8.load_rom(Some(rom_data.as_slice()))?;
        info!(
            "Running {} at {} instructions/s, {} frames/s",
            rom_stem, self.settings.ips, self.settings.frame_rate
        );

        enable_raw_mode()?;
        let backend = CrosstermBackend::new(std::io::stdout());
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.main_loop(&mut terminal, &rom_stem);

        terminal.clear()?;
        disable_raw_mode()?;
        result
    }
}
