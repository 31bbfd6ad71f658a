use crate::game::BoardView;
use shared::Mark;
use std::io::{self, Write};

/// How a chat line is styled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    System,
    Own,
    Other,
}

/// Draws the chat log, connection indicator and board as plain text.
pub struct Renderer<W: Write> {
    out: W,
    connected: bool,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            connected: false,
        }
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn system_notice(&mut self, content: &str) -> io::Result<()> {
        writeln!(self.out, "{}", format_line(LineStyle::System, "", content))?;
        self.out.flush()
    }

    pub fn chat_message(&mut self, user: &str, content: &str, own: bool) -> io::Result<()> {
        let style = if own { LineStyle::Own } else { LineStyle::Other };
        writeln!(self.out, "{}", format_line(style, user, content))?;
        self.out.flush()
    }

    pub fn draw_board(&mut self, board: &BoardView, badge: &str) -> io::Result<()> {
        let status = if self.connected { "online" } else { "offline" };
        writeln!(self.out, "[{}] {}", status, badge)?;
        write!(self.out, "{}", format_board(board))?;
        self.out.flush()
    }
}

pub fn format_line(style: LineStyle, user: &str, content: &str) -> String {
    match style {
        LineStyle::System => format!("* {}", content),
        LineStyle::Own => format!("{:>12} (you) | {}", user, content),
        LineStyle::Other => format!("{:>18} | {}", user, content),
    }
}

/// Board grid followed by the turn line. Empty cells show their index.
pub fn format_board(board: &BoardView) -> String {
    let mut text = String::new();

    for (row, cells) in board.cells().chunks(3).enumerate() {
        if row > 0 {
            text.push_str("---+---+---\n");
        }
        let rendered: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(column, cell)| match cell.mark {
                Some(Mark::X) => " X ".to_string(),
                Some(Mark::O) => " O ".to_string(),
                None => format!(" {} ", row * 3 + column),
            })
            .collect();
        text.push_str(&rendered.join("|"));
        text.push('\n');
    }

    text.push_str(board.turn_text());
    text.push('\n');
    text
}
