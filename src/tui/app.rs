//! TUI application state and key handling

use crate::chat::{ChatThread, PollConfig, PollHandle, Synchronizer, ThreadState};
use crate::store::MessageStore;
use crate::tui::screens::ChatViewScreen;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Application state
pub struct App<S: MessageStore> {
    /// Thread being shown
    pub chat: ChatThread<S>,
    /// Screen state
    pub screen: ChatViewScreen,
    /// Should quit
    pub should_quit: bool,
    runtime: Handle,
    poller: Option<PollHandle>,
}

impl<S: MessageStore> App<S> {
    /// Create the app; network work is spawned onto `runtime`
    pub fn new(chat: ChatThread<S>, runtime: Handle) -> Self {
        let screen = ChatViewScreen::new(chat.thread_id().to_string());
        Self {
            chat,
            screen,
            should_quit: false,
            runtime,
            poller: None,
        }
    }

    /// Start the synchronizer
    pub fn start_polling(&mut self, config: PollConfig) {
        let _guard = self.runtime.enter();
        self.poller = Some(Synchronizer::start(&self.chat, config));
    }

    /// Stop the synchronizer
    pub fn stop_polling(&mut self) {
        if let Some(mut poller) = self.poller.take() {
            poller.stop();
        }
    }

    /// True while the synchronizer runs
    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(PollHandle::is_running)
    }

    /// Send the composed draft in the background
    pub fn send_current(&mut self, state: &ThreadState) {
        if state.sending {
            self.screen.set_status("Still sending previous message".to_string());
            return;
        }
        let Some(draft) = self.screen.take_draft() else {
            return;
        };

        let chat = self.chat.clone();
        self.runtime.spawn(async move {
            if let Err(e) = chat.send(draft).await {
                debug!("Send finished with error: {}", e);
            }
        });
    }

    /// Retry the selected failed message in the background
    pub fn retry_selected(&mut self, state: &ThreadState) {
        let Some(message_id) = self.screen.selected_failed_id(state) else {
            self.screen.set_status("Select a failed message to retry".to_string());
            return;
        };

        let chat = self.chat.clone();
        self.runtime.spawn(async move {
            if let Err(e) = chat.retry(&message_id).await {
                warn!("Retry of {} failed: {}", message_id, e);
            }
        });
        self.screen.status_message = None;
    }

    /// Dismiss the error banner
    pub fn dismiss_error(&mut self) {
        let chat = self.chat.clone();
        self.runtime.spawn(async move { chat.dismiss_error().await });
    }

    /// Handle a key press against the last rendered state
    pub fn handle_key(&mut self, key: KeyEvent, state: &ThreadState) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('c') if ctrl => self.should_quit = true,
            KeyCode::Char('r') if ctrl => self.retry_selected(state),
            KeyCode::Char('d') if ctrl => self.dismiss_error(),
            KeyCode::Enter => self.send_current(state),
            KeyCode::Tab => self.screen.next_field(),
            KeyCode::Up => self.screen.select_previous(state.messages.len()),
            KeyCode::Down => self.screen.select_next(state.messages.len()),
            KeyCode::PageUp => self.screen.scroll_older(state.messages.len().saturating_sub(1)),
            KeyCode::PageDown => self.screen.scroll_newer(),
            KeyCode::Backspace => self.screen.backspace(),
            KeyCode::Char(c) => self.screen.add_char(c),
            _ => {}
        }
    }
}

impl<S: MessageStore> Drop for App<S> {
    fn drop(&mut self) {
        self.stop_polling();
    }
}
