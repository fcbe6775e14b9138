use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{Frame, Terminal, backend::Backend};
use std::time::Duration;

use crate::net::ChatNetworkService;

pub mod chat_state;

use chat_state::ChatState;

pub enum AppState {
    Chat(Box<ChatState>),
    Quit,
}

pub struct TuiApp {
    pub state: AppState,
    pub network: ChatNetworkService,
}

impl TuiApp {
    pub fn new(chat_state: ChatState, network: ChatNetworkService) -> Self {
        Self {
            state: AppState::Chat(Box::new(chat_state)),
            network,
        }
    }

    pub fn handle_key_event(&mut self, key: KeyCode, modifiers: KeyModifiers) -> Result<()> {
        let new_state = match &mut self.state {
            AppState::Chat(chat_state) => {
                chat_state.handle_key_event(key, modifiers, &self.network)?
            }
            AppState::Quit => None,
        };

        if let Some(new_state) = new_state {
            self.state = new_state;
        }

        Ok(())
    }

    pub fn render(&mut self, f: &mut Frame) {
        match &mut self.state {
            AppState::Chat(chat_state) => chat_state.render(f),
            AppState::Quit => {}
        }
    }

    pub fn update(&mut self) {
        match &mut self.state {
            AppState::Chat(chat_state) => chat_state.update(&mut self.network),
            AppState::Quit => {}
        }
    }

    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        loop {
            // Apply network events before drawing so the feed is current.
            self.update();

            terminal.draw(|f| self.render(f))?;

            if matches!(self.state, AppState::Quit) {
                break;
            }

            if event::poll(Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key_event(key.code, key.modifiers)?;
                    }
                }
            }
        }

        self.network.disconnect();
        Ok(())
    }
}
