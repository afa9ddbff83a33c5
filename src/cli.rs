//! Text front end helpers: `A1` coordinates, commands, board rendering.
//!
//! Columns are lettered `A`.. and rows numbered from 1, so `B7` is row 6,
//! column 1.

use std::fmt::Write as _;

use crate::ai::Heatmap;
use crate::board::Board;
use crate::config::{BOARD_SIZE, FLEET};
use crate::game::Phase;
use crate::ship::{Orientation, ShipId};
use crate::snapshot::{BoardView, GameStateUpdate};

pub fn coord_to_string(row: usize, col: usize) -> String {
    let letter = (b'A' + col as u8) as char;
    format!("{}{}", letter, row + 1)
}

/// Parse `B7` / `b7` into `(row, col)`; `None` if malformed or off the board.
pub fn parse_coord(input: &str) -> Option<(usize, usize)> {
    let input = input.trim();
    let mut chars = input.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    if !letter.is_ascii_uppercase() {
        return None;
    }
    let col = (letter as u8 - b'A') as usize;
    let row: usize = chars.as_str().parse().ok()?;
    if row == 0 || row > BOARD_SIZE || col >= BOARD_SIZE {
        return None;
    }
    Some((row - 1, col))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Place {
        ship: ShipId,
        row: usize,
        col: usize,
        orientation: Orientation,
    },
    Random,
    Ready,
    Fire { row: usize, col: usize },
    Say(String),
    Hint,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command `{0}`, try `help`")]
    Unknown(String),
    #[error("bad coordinate `{0}`")]
    BadCoord(String),
    #[error("usage: place <ship 1-{max}> <coord> <h|v>", max = FLEET.len())]
    PlaceUsage,
    #[error("usage: fire <coord>")]
    FireUsage,
}

pub const HELP: &str = "\
commands:
  place <n> <coord> <h|v>   put ship n (1-5) with its bow at coord
  random                    place the remaining fleet at random
  ready                     lock the fleet
  fire <coord>              shoot, e.g. `fire B7` (or just `B7`)
  say <text>                chat
  hint                      show the targeting heat map (solo only)
  quit";

/// Parse one input line. A bare coordinate means `fire`.
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    match word.to_ascii_lowercase().as_str() {
        "place" | "p" => parse_place(rest),
        "random" | "r" => Ok(Command::Random),
        "ready" => Ok(Command::Ready),
        "fire" | "f" => {
            if rest.is_empty() {
                return Err(CommandError::FireUsage);
            }
            let (row, col) = parse_coord(rest).ok_or_else(|| CommandError::BadCoord(rest.to_string()))?;
            Ok(Command::Fire { row, col })
        }
        "say" | "chat" => Ok(Command::Say(rest.to_string())),
        "hint" => Ok(Command::Hint),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        _ => match parse_coord(word) {
            Some((row, col)) if rest.is_empty() => Ok(Command::Fire { row, col }),
            _ => Err(CommandError::Unknown(word.to_string())),
        },
    }
}

fn parse_place(args: &str) -> Result<Command, CommandError> {
    let mut parts = args.split_whitespace();
    let ship: usize = parts
        .next()
        .and_then(|n| n.parse().ok())
        .filter(|n| (1..=FLEET.len()).contains(n))
        .ok_or(CommandError::PlaceUsage)?;
    let coord = parts.next().ok_or(CommandError::PlaceUsage)?;
    let (row, col) = parse_coord(coord).ok_or_else(|| CommandError::BadCoord(coord.to_string()))?;
    let orientation = match parts.next().map(|o| o.to_ascii_lowercase()) {
        Some(o) if o.starts_with('v') => Orientation::Vertical,
        Some(o) if o.starts_with('h') => Orientation::Horizontal,
        None => Orientation::Horizontal,
        Some(_) => return Err(CommandError::PlaceUsage),
    };
    Ok(Command::Place {
        ship: ship - 1,
        row,
        col,
        orientation,
    })
}

fn header(out: &mut String) {
    out.push_str("   ");
    for c in 0..BOARD_SIZE {
        let _ = write!(out, " {}", (b'A' + c as u8) as char);
    }
    out.push('\n');
}

/// Render a board view: `X` hit, `#` sunk, `o` miss, `S` own ship, `.` water.
pub fn render_view(view: &BoardView) -> String {
    let mut grid = [['.'; BOARD_SIZE]; BOARD_SIZE];
    let mut mark = |r: usize, c: usize, ch: char| {
        if let Some(cell) = grid.get_mut(r).and_then(|row| row.get_mut(c)) {
            *cell = ch;
        }
    };
    for ship in &view.ships {
        let (dr, dc) = ship.orientation.step();
        for i in 0..ship.size {
            mark(ship.row + dr * i, ship.col + dc * i, 'S');
        }
    }
    for shot in &view.shots {
        mark(shot.row, shot.col, if shot.hit { 'X' } else { 'o' });
    }
    for sunk in &view.sunk {
        for &(r, c) in &sunk.cells {
            mark(r, c, '#');
        }
    }
    let mut out = String::new();
    header(&mut out);
    for (r, row) in grid.iter().enumerate() {
        let _ = write!(out, "{:2} ", r + 1);
        for ch in row {
            let _ = write!(out, " {}", ch);
        }
        out.push('\n');
    }
    out
}

pub fn render_board(board: &Board, reveal: bool) -> String {
    let view = if reveal {
        BoardView::revealed(board)
    } else {
        BoardView::hidden(board)
    };
    render_view(&view)
}

/// Opponent waters above, own waters below, then status.
pub fn render_update(update: &GameStateUpdate) -> String {
    let mut out = String::new();
    out.push_str("Opponent waters:\n");
    out.push_str(&render_view(&update.opponent_board));
    out.push_str("\nYour waters:\n");
    out.push_str(&render_view(&update.own_board));
    if let Some(shot) = update.last_shot {
        let who = if shot.by == update.player_id { "You" } else { "Opponent" };
        let _ = writeln!(out, "\n{} fired at {}: {:?}", who, coord_to_string(shot.row, shot.col), shot.outcome);
    }
    for line in update.chat.iter().rev().take(3).rev() {
        let who = if line.from == update.player_id { "you" } else { "them" };
        let _ = writeln!(out, "[{}] {}", who, line.text);
    }
    if !update.opponent_connected {
        out.push_str("Waiting for an opponent to connect.\n");
    }
    let _ = writeln!(out, "{}", phase_banner(update.phase, update.winner == Some(update.player_id)));
    if let Some(notice) = &update.notice {
        let _ = writeln!(out, "! {}", notice);
    }
    out
}

pub fn phase_banner(phase: Phase, won: bool) -> &'static str {
    match phase {
        Phase::Placing => "Place your fleet (`place`, `random`), then `ready`.",
        Phase::Waiting => "Fleet locked. Waiting for the opponent.",
        Phase::YourTurn => "Your turn: `fire <coord>`.",
        Phase::OpponentTurn => "Opponent's turn.",
        Phase::GameOver if won => "GAME OVER: you sank the whole enemy fleet!",
        Phase::GameOver => "GAME OVER: your fleet was destroyed.",
    }
}

/// Ships still to place, numbered as `place` expects.
pub fn fleet_listing(unplaced: impl Iterator<Item = ShipId>) -> String {
    unplaced
        .filter_map(|id| FLEET.get(id).map(|class| format!("{}: {} ({})", id + 1, class.name(), class.size())))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn render_heatmap(heat: &Heatmap) -> String {
    let max = heat.iter().flatten().copied().max().unwrap_or(0).max(1) as f64;
    let mut out = String::from("\nTargeting heat:\n   ");
    for c in 0..BOARD_SIZE {
        let _ = write!(out, " {:>4}", (b'A' + c as u8) as char);
    }
    out.push('\n');
    for (r, row) in heat.iter().enumerate() {
        let _ = write!(out, "{:2} ", r + 1);
        for &v in row {
            let _ = write!(out, " {:4.2}", v as f64 / max);
        }
        out.push('\n');
    }
    out
}
