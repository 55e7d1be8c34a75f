//! Chat view rendering

use crate::chat::ThreadState;
use crate::model::{Message, MessageStatus};
use crate::tui::app::App;
use crate::tui::screens::{ChatViewScreen, InputField};
use crate::store::MessageStore;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Main UI rendering function
pub fn ui<S: MessageStore>(f: &mut Frame, app: &App<S>, state: &ThreadState) {
    render_chat_view(f, &app.screen, state, app.chat.user_id());
}

fn status_color(status: MessageStatus) -> Color {
    match status {
        MessageStatus::Pending => Color::Yellow,
        MessageStatus::Sent => Color::Gray,
        MessageStatus::Delivered => Color::Green,
        MessageStatus::Failed => Color::Red,
    }
}

/// One rendered line for a message
pub fn message_line<'a>(message: &'a Message, user_id: &str, selected: bool) -> Line<'a> {
    let timestamp = message.created_at.format("%H:%M:%S").to_string();
    let is_from_me = message.is_own(user_id);
    let sender_label = if is_from_me { "You" } else { "Them" };
    let sender_color = if is_from_me { Color::Green } else { Color::Blue };

    let mut spans = vec![
        Span::styled(
            if selected { "> " } else { "  " },
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(format!("[{}] ", timestamp), Style::default().fg(Color::DarkGray)),
        Span::styled(
            format!("{}: ", sender_label),
            Style::default().fg(sender_color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(message.content.as_str(), Style::default().fg(Color::White)),
    ];

    if let Some(proposal) = message.proposal_data.filter(|p| !p.is_empty()) {
        spans.push(Span::styled(
            format!(" [proposal: {}]", proposal.summary()),
            Style::default().fg(Color::Magenta),
        ));
    }

    if is_from_me {
        spans.push(Span::styled(
            format!(" {}", message.status.indicator()),
            Style::default().fg(status_color(message.status)),
        ));
    }

    if message.status == MessageStatus::Failed {
        let reason = message.error_message.as_deref().unwrap_or("send failed");
        spans.push(Span::styled(
            format!(" ({}, Ctrl-r to retry)", reason),
            Style::default().fg(Color::Red),
        ));
    }

    Line::from(spans)
}

fn field_block(title: &str, focused: bool) -> Block<'_> {
    let style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Block::default().borders(Borders::ALL).border_style(style).title(title)
}

/// Render the chat view
pub fn render_chat_view(f: &mut Frame, screen: &ChatViewScreen, state: &ThreadState, user_id: &str) {
    let size = f.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Length(1), // Banner
            Constraint::Min(5),    // Message history
            Constraint::Length(3), // Message input
            Constraint::Length(3), // Proposal inputs
            Constraint::Length(3), // Status/Help
        ])
        .split(size);

    let title = Paragraph::new(format!(
        "Negotiation {} | unread: {}",
        screen.thread_id, state.unread_count
    ))
    .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, chunks[0]);

    render_banner(f, chunks[1], state);
    render_messages(f, chunks[2], screen, state, user_id);

    let input = Paragraph::new(screen.input.as_str())
        .block(field_block("Message", screen.focus == InputField::Message));
    f.render_widget(input, chunks[3]);

    let proposal_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[4]);
    let amount = Paragraph::new(screen.amount.as_str())
        .block(field_block("Amount ($)", screen.focus == InputField::Amount));
    f.render_widget(amount, proposal_chunks[0]);
    let equity = Paragraph::new(screen.equity.as_str())
        .block(field_block("Equity (%)", screen.focus == InputField::Equity));
    f.render_widget(equity, proposal_chunks[1]);

    let help_text = if let Some(status) = &screen.status_message {
        status.clone()
    } else if state.sending {
        "Sending...".to_string()
    } else {
        "Enter: Send | Tab: Field | Up/Down: Select | Ctrl-r: Retry | Ctrl-d: Dismiss | Esc: Quit"
            .to_string()
    };
    let help = Paragraph::new(help_text)
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(help, chunks[5]);
}

fn render_banner(f: &mut Frame, area: Rect, state: &ThreadState) {
    let banner = if let Some(error) = &state.error {
        Paragraph::new(format!("{} (Ctrl-d to dismiss)", error)).style(Style::default().fg(Color::Red))
    } else if state.loading {
        Paragraph::new("Loading messages...").style(Style::default().fg(Color::Yellow))
    } else {
        Paragraph::new("")
    };
    f.render_widget(banner.alignment(Alignment::Center), area);
}

fn render_messages(
    f: &mut Frame,
    area: Rect,
    screen: &ChatViewScreen,
    state: &ThreadState,
    user_id: &str,
) {
    if state.messages.is_empty() {
        let empty = Paragraph::new("No messages yet. Type a message or a proposal and press Enter.")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("Messages"));
        f.render_widget(empty, area);
        return;
    }

    let total = state.messages.len();
    let visible_height = area.height.saturating_sub(2) as usize;
    // Follow the selection, otherwise stick to the newest messages
    let end_idx = match screen.selected {
        Some(selected) => (selected + 1).max(visible_height.min(total)).min(total),
        None => total.saturating_sub(screen.scroll_offset),
    };
    let start_idx = end_idx.saturating_sub(visible_height);

    let lines: Vec<Line> = state.messages[start_idx..end_idx]
        .iter()
        .enumerate()
        .map(|(offset, message)| {
            message_line(message, user_id, screen.selected == Some(start_idx + offset))
        })
        .collect();

    let widget = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Messages ({}/{})", end_idx, total)),
    );
    f.render_widget(widget, area);
}
