use anyhow::Result;
use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect, Size},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use tui_scrollview::{ScrollView, ScrollViewState};

use crate::entities::{
    ComposeForm, MessageFeed, MessageSink, RenderedMessage, submit_local_message,
};
use crate::net::{ChatNetworkService, NetworkEvent};
use crate::tui::AppState;

/// Which form field receives typed characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    User,
    Text,
}

pub struct ChatState {
    pub feed: MessageFeed,
    pub form: ComposeForm,
    pub focus: Field,
    pub status: String,
    scroll: ScrollViewState,
}

impl ChatState {
    pub fn new(feed: MessageFeed, form: ComposeForm) -> Self {
        Self {
            feed,
            form,
            focus: Field::Text,
            status: "connecting".to_string(),
            scroll: ScrollViewState::default(),
        }
    }

    fn focused_field(&mut self) -> &mut String {
        match self.focus {
            Field::User => &mut self.form.user,
            Field::Text => &mut self.form.text,
        }
    }

    pub fn handle_key_event(
        &mut self,
        key: KeyCode,
        modifiers: KeyModifiers,
        sink: &impl MessageSink,
    ) -> Result<Option<AppState>> {
        match (key, modifiers) {
            (KeyCode::Char('q'), KeyModifiers::CONTROL) => return Ok(Some(AppState::Quit)),
            (KeyCode::Char(c), KeyModifiers::NONE | KeyModifiers::SHIFT) => {
                self.focused_field().push(c);
            }
            (KeyCode::Backspace, _) => {
                self.focused_field().pop();
            }
            (KeyCode::Tab | KeyCode::BackTab, _) => {
                self.focus = match self.focus {
                    Field::User => Field::Text,
                    Field::Text => Field::User,
                };
            }
            (KeyCode::Enter, _) => {
                let message = submit_local_message(&mut self.form, sink);
                tracing::debug!("Submitted message as {:?}", message.user);
            }
            (KeyCode::PageUp, _) => self.scroll.scroll_page_up(),
            (KeyCode::PageDown, _) => self.scroll.scroll_page_down(),
            _ => {}
        }
        Ok(None)
    }

    /// Drain everything the network task has delivered since the last tick.
    pub fn update(&mut self, network: &mut ChatNetworkService) {
        while let Some(event) = network.try_receive_event() {
            self.apply_event(event);
        }
    }

    pub fn apply_event(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::Connected => {
                tracing::info!("Connected to chat server");
                self.status = "connected".to_string();
            }
            NetworkEvent::ChatMessage(raw) => {
                if let Err(e) = self.feed.handle_live_message(&self.form.user, &raw) {
                    tracing::warn!("Dropping live message: {}", e);
                }
            }
            NetworkEvent::ChatHistory(raw) => {
                match self.feed.handle_history_replay(&self.form.user, raw.as_deref()) {
                    Ok(summary) => tracing::info!(
                        "Replayed history: {} rendered, {} skipped",
                        summary.rendered,
                        summary.skipped
                    ),
                    Err(e) => tracing::warn!("{}", e),
                }
            }
            NetworkEvent::Disconnected => {
                tracing::info!("Disconnected from chat server");
                self.status = "disconnected".to_string();
            }
            NetworkEvent::Error(e) => {
                tracing::error!("Network error: {}", e);
                self.status = e.to_string();
            }
        }
    }

    pub fn render(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(0),
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Length(1),
            ])
            .split(f.area());

        self.render_feed(f, chunks[0]);
        render_field(f, "User", &self.form.user, self.focus == Field::User, chunks[1]);
        render_field(f, "Message", &self.form.text, self.focus == Field::Text, chunks[2]);

        let help = Paragraph::new("Enter: Send, Tab: Switch field, PgUp/PgDn: Scroll, Ctrl+Q: Quit")
            .style(Style::default().fg(Color::Gray));
        f.render_widget(help, chunks[3]);
    }

    fn render_feed(&mut self, f: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("Messages ({}) [{}]", self.feed.len(), self.status));
        let inner = block.inner(area);
        f.render_widget(block, area);

        if self.feed.is_empty() {
            let placeholder =
                Paragraph::new("No messages yet").style(Style::default().fg(Color::DarkGray));
            f.render_widget(placeholder, inner);
            return;
        }

        let visible = feed_tail(self.feed.items(), usize::from(u16::MAX));
        let lines: Vec<Line> = visible.iter().map(feed_line).collect();
        let height = u16::try_from(lines.len()).unwrap_or(u16::MAX);
        // Leave a column for the vertical scrollbar so no horizontal one appears.
        let width = inner.width.saturating_sub(1);

        let mut scroll_view = ScrollView::new(Size::new(width, height));
        let content_area = scroll_view.area();
        scroll_view.render_widget(Paragraph::new(lines), content_area);

        if self.feed.take_scroll_request() {
            self.scroll.scroll_to_bottom();
        }
        f.render_stateful_widget(scroll_view, inner, &mut self.scroll);
    }
}

/// The newest `max` items; a scroll view cannot be taller than `u16::MAX` rows.
fn feed_tail<T>(items: &[T], max: usize) -> &[T] {
    &items[items.len().saturating_sub(max)..]
}

fn feed_line(item: &RenderedMessage) -> Line<'static> {
    let user_style = if item.is_mine {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Green)
    };

    Line::from(vec![
        Span::styled(
            format!("{} ", item.time_label),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(item.user.clone(), user_style),
        Span::raw(": "),
        Span::raw(item.text.clone()),
    ])
}

fn render_field(f: &mut Frame, title: &str, value: &str, focused: bool, area: Rect) {
    let style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::Gray)
    };

    let input = Paragraph::new(value)
        .style(style)
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(input, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::compose::tests::RecordingSink;
    use crate::entities::{ChatMessage, HistoryPolicy, TimeFormatter};
    use chrono::Locale;
    use ratatui::{Terminal, backend::TestBackend};

    fn chat_state(user: &str) -> ChatState {
        let formatter = TimeFormatter::new(Locale::POSIX)
            .with_offset_minutes(0)
            .unwrap();
        ChatState::new(
            MessageFeed::new(formatter, HistoryPolicy::AbortBatch),
            ComposeForm::with_user(user.to_string()),
        )
    }

    fn type_text(state: &mut ChatState, sink: &RecordingSink, text: &str) {
        for c in text.chars() {
            state
                .handle_key_event(KeyCode::Char(c), KeyModifiers::NONE, sink)
                .unwrap();
        }
    }

    #[test]
    fn test_enter_submits_and_clears_text() {
        let sink = RecordingSink::default();
        let mut state = chat_state("alice");

        type_text(&mut state, &sink, "hi");
        let next = state
            .handle_key_event(KeyCode::Enter, KeyModifiers::NONE, &sink)
            .unwrap();

        assert!(next.is_none());
        assert_eq!(state.form.text, "");
        let sent = sink.sent.borrow();
        assert_eq!(sent.len(), 1);
        let message = ChatMessage::decode(&sent[0]).unwrap();
        assert_eq!(message.user, "alice");
        assert_eq!(message.text, "hi");
        // Nothing is shown until the server echoes it back.
        assert!(state.feed.is_empty());
    }

    #[test]
    fn test_tab_switches_to_user_field() {
        let sink = RecordingSink::default();
        let mut state = chat_state("");

        state
            .handle_key_event(KeyCode::Tab, KeyModifiers::NONE, &sink)
            .unwrap();
        type_text(&mut state, &sink, "bob");
        state
            .handle_key_event(KeyCode::Backspace, KeyModifiers::NONE, &sink)
            .unwrap();

        assert_eq!(state.focus, Field::User);
        assert_eq!(state.form.user, "bo");
        assert_eq!(state.form.text, "");
    }

    #[test]
    fn test_ctrl_q_quits() {
        let sink = RecordingSink::default();
        let mut state = chat_state("alice");
        let next = state
            .handle_key_event(KeyCode::Char('q'), KeyModifiers::CONTROL, &sink)
            .unwrap();
        assert!(matches!(next, Some(AppState::Quit)));
    }

    #[test]
    fn test_echoed_message_is_marked_mine() {
        let sink = RecordingSink::default();
        let mut state = chat_state("alice");

        type_text(&mut state, &sink, "hi");
        state
            .handle_key_event(KeyCode::Enter, KeyModifiers::NONE, &sink)
            .unwrap();
        let echoed = sink.sent.borrow()[0].clone();
        state.apply_event(NetworkEvent::ChatMessage(echoed));

        assert_eq!(state.feed.len(), 1);
        assert!(state.feed.items()[0].is_mine);
        assert_eq!(state.feed.items()[0].text, "hi");
    }

    #[test]
    fn test_bad_events_do_not_reach_the_feed() {
        let mut state = chat_state("alice");

        state.apply_event(NetworkEvent::ChatMessage("garbage".to_string()));
        state.apply_event(NetworkEvent::ChatHistory(Some("also garbage".to_string())));
        state.apply_event(NetworkEvent::ChatHistory(None));

        assert!(state.feed.is_empty());
    }

    #[test]
    fn test_connection_events_update_status() {
        let mut state = chat_state("alice");
        assert_eq!(state.status, "connecting");

        state.apply_event(NetworkEvent::Connected);
        assert_eq!(state.status, "connected");

        state.apply_event(NetworkEvent::Disconnected);
        assert_eq!(state.status, "disconnected");
    }

    #[test]
    fn test_feed_tail_keeps_newest_items() {
        let items = [1, 2, 3, 4, 5];
        assert_eq!(feed_tail(&items, 3), &[3, 4, 5]);
        assert_eq!(feed_tail(&items, 5), &items);
        assert_eq!(feed_tail(&items, 10), &items);
        assert!(feed_tail(&items, 0).is_empty());

        let long: Vec<usize> = (0..usize::from(u16::MAX) + 10).collect();
        let tail = feed_tail(&long, usize::from(u16::MAX));
        assert_eq!(tail.len(), usize::from(u16::MAX));
        assert_eq!(tail.first(), Some(&10));
        assert_eq!(tail.last(), long.last());
    }

    #[test]
    fn test_render_shows_feed_lines() {
        let mut state = chat_state("alice");
        state.apply_event(NetworkEvent::ChatMessage(
            r#"{"user":"bob","text":"hello there","timestamp":"2024-03-05T14:07:09.000Z"}"#
                .to_string(),
        ));

        let mut terminal = Terminal::new(TestBackend::new(60, 20)).unwrap();
        terminal.draw(|f| state.render(f)).unwrap();

        let screen: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(screen.contains("14:07:09 bob: hello there"));
        assert!(!state.feed.take_scroll_request());
    }
}
