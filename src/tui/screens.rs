//! Chat view screen state

use crate::chat::ThreadState;
use crate::model::{MessageDraft, MessageStatus, ProposalData};

/// Focusable input fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputField {
    /// Message text
    Message,
    /// Proposal amount
    Amount,
    /// Proposal equity percentage
    Equity,
}

impl InputField {
    /// Next field in tab order
    pub fn next(self) -> Self {
        match self {
            InputField::Message => InputField::Amount,
            InputField::Amount => InputField::Equity,
            InputField::Equity => InputField::Message,
        }
    }
}

/// Chat view screen state
#[derive(Debug)]
pub struct ChatViewScreen {
    /// Thread being shown
    pub thread_id: String,
    /// Message text buffer
    pub input: String,
    /// Proposal amount buffer
    pub amount: String,
    /// Proposal equity buffer
    pub equity: String,
    /// Focused field
    pub focus: InputField,
    /// Selected message index
    pub selected: Option<usize>,
    /// Messages hidden below the view, counted from the newest
    pub scroll_offset: usize,
    /// Status message
    pub status_message: Option<String>,
}

impl ChatViewScreen {
    /// Create new chat view screen
    pub fn new(thread_id: String) -> Self {
        Self {
            thread_id,
            input: String::new(),
            amount: String::new(),
            equity: String::new(),
            focus: InputField::Message,
            selected: None,
            scroll_offset: 0,
            status_message: None,
        }
    }

    /// Add character to the focused field
    ///
    /// Proposal fields only take digits and a decimal point.
    pub fn add_char(&mut self, c: char) {
        match self.focus {
            InputField::Message => self.input.push(c),
            InputField::Amount if c.is_ascii_digit() || c == '.' => self.amount.push(c),
            InputField::Equity if c.is_ascii_digit() || c == '.' => self.equity.push(c),
            _ => {}
        }
    }

    /// Remove last character from the focused field
    pub fn backspace(&mut self) {
        match self.focus {
            InputField::Message => self.input.pop(),
            InputField::Amount => self.amount.pop(),
            InputField::Equity => self.equity.pop(),
        };
    }

    /// Move focus to the next field
    pub fn next_field(&mut self) {
        self.focus = self.focus.next();
    }

    /// Clear all input buffers and return focus to the message
    pub fn clear_input(&mut self) {
        self.input.clear();
        self.amount.clear();
        self.equity.clear();
        self.focus = InputField::Message;
    }

    /// Select the previous message
    pub fn select_previous(&mut self, len: usize) {
        if len == 0 {
            self.selected = None;
            return;
        }
        self.selected = Some(match self.selected {
            Some(index) if index > 0 => index.min(len) - 1,
            Some(_) => 0,
            None => len - 1,
        });
    }

    /// Select the next message
    pub fn select_next(&mut self, len: usize) {
        if len == 0 {
            self.selected = None;
            return;
        }
        self.selected = Some(match self.selected {
            Some(index) => (index + 1).min(len - 1),
            None => len - 1,
        });
    }

    /// Scroll towards newer messages
    pub fn scroll_newer(&mut self) {
        if self.scroll_offset > 0 {
            self.scroll_offset -= 1;
        }
    }

    /// Scroll towards older messages
    pub fn scroll_older(&mut self, max_offset: usize) {
        if self.scroll_offset < max_offset {
            self.scroll_offset += 1;
        }
    }

    /// Set status message
    pub fn set_status(&mut self, message: String) {
        self.status_message = Some(message);
    }

    /// Id of the selected message if it can be retried
    pub fn selected_failed_id(&self, state: &ThreadState) -> Option<String> {
        let message = state.messages.get(self.selected?)?;
        (message.status == MessageStatus::Failed).then(|| message.id.clone())
    }

    /// Build a draft from the buffers and clear them
    ///
    /// Returns `None`, leaving the buffers untouched and a status message set,
    /// when a proposal field is not a number or everything is empty.
    pub fn take_draft(&mut self) -> Option<MessageDraft> {
        let amount = match parse_field(&self.amount) {
            Ok(value) => value,
            Err(()) => {
                self.set_status(format!("Invalid amount: {}", self.amount));
                return None;
            }
        };
        let equity = match parse_field(&self.equity) {
            Ok(value) => value,
            Err(()) => {
                self.set_status(format!("Invalid equity: {}", self.equity));
                return None;
            }
        };
        if let Some(equity) = equity {
            if !(0.0..=100.0).contains(&equity) {
                self.set_status("Equity must be between 0 and 100".to_string());
                return None;
            }
        }

        let proposal = ProposalData { amount, equity };
        let draft = MessageDraft {
            content: self.input.trim().to_string(),
            proposal_data: (!proposal.is_empty()).then_some(proposal),
        };

        if draft.is_empty() {
            self.set_status("Type a message or a proposal".to_string());
            return None;
        }

        self.clear_input();
        self.status_message = None;
        Some(draft)
    }
}

fn parse_field(value: &str) -> Result<Option<f64>, ()> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value.parse::<f64>().map(Some).map_err(|_| ())
}
