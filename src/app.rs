use crate::report::FrontierReport;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use std::io;

pub struct App {
    pub should_quit: bool,
    pub show_benchmark: bool,
    pub report: FrontierReport,
}

impl App {
    pub fn new(report: FrontierReport) -> Self {
        Self {
            should_quit: false,
            show_benchmark: true,
            report,
        }
    }

    pub fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('b') => self.show_benchmark = !self.show_benchmark,
            _ => {}
        }
    }

    pub fn run(&mut self, terminal: &mut crate::tui::Tui) -> io::Result<()> {
        while !self.should_quit {
            terminal.draw(|f| crate::ui::render(f, self))?;

            if event::poll(std::time::Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code);
                    }
                }
            }
        }
        Ok(())
    }
}
