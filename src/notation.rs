//! Conversions between chess text notations and structured data.
//!
//! FEN handling is delegated to `shakmaty`; PGN movetext is tokenised here
//! so the loader can cope with what people actually paste: brace and `;`
//! comments, tag pairs, recursive variations, NAGs, move numbers glued to
//! moves (`1.e4`), annotation glyphs and result markers.

use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Position};

use crate::error::NotationError;
use crate::record::{MoveRecord, Side};

pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

const RESULT_TOKENS: [&str; 4] = ["1-0", "0-1", "1/2-1/2", "*"];

/// Parses FEN text into a playable standard-chess position.
pub fn parse_position(text: &str) -> Result<Chess, NotationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(NotationError::InvalidFen("empty input".to_string()));
    }
    let fen: Fen = text
        .parse()
        .map_err(|err: shakmaty::fen::ParseFenError| NotationError::InvalidFen(err.to_string()))?;
    fen.into_position::<Chess>(CastlingMode::Standard)
        .map_err(|err| NotationError::IllegalPosition(err.to_string()))
}

pub fn format_position(position: &Chess) -> String {
    Fen::from_position(position.clone(), EnPassantMode::Legal).to_string()
}

/// Round-trips FEN text through the parser so equal positions compare equal
/// as strings.
pub fn normalize_position(text: &str) -> Result<String, NotationError> {
    parse_position(text).map(|position| format_position(&position))
}

/// Side to move and full-move number of a FEN position.
pub fn position_turn(text: &str) -> Result<(Side, u32), NotationError> {
    let position = parse_position(text)?;
    let side = match position.turn() {
        Color::White => Side::White,
        Color::Black => Side::Black,
    };
    Ok((side, position.fullmoves().get()))
}

pub fn is_starting_position(text: &str) -> bool {
    normalize_position(text).map_or(false, |fen| fen == STARTING_FEN)
}

/// The parts of a PGN game the tree cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveText {
    pub tags: Vec<(String, String)>,
    /// Main-line SAN tokens, annotations stripped.
    pub moves: Vec<String>,
}

impl MoveText {
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Starting FEN declared by a `[FEN "..."]` tag, if any.
    pub fn start_position(&self) -> Option<&str> {
        self.tag("FEN")
    }
}

/// Parses PGN movetext (optionally preceded by tag pairs) into its main-line
/// SAN tokens. Only the syntax of each token is checked here; legality is the
/// rules engine's business.
pub fn parse_move_text(text: &str) -> Result<MoveText, NotationError> {
    let mut result = MoveText::default();
    let mut chars = text.chars();
    let mut token = String::new();

    while let Some(c) = chars.next() {
        match c {
            '{' | '(' | '[' | ';' | '}' | ')' | ']' => {
                if !token.is_empty() && push_token(&mut result.moves, &token)? {
                    return Ok(result);
                }
                token.clear();
                match c {
                    '{' => skip_comment(&mut chars)?,
                    '(' => skip_variation(&mut chars)?,
                    '[' => result.tags.push(read_tag(&mut chars)?),
                    ';' => {
                        for c in chars.by_ref() {
                            if c == '\n' {
                                break;
                            }
                        }
                    }
                    other => return Err(NotationError::Unbalanced(other)),
                }
            }
            c if c.is_whitespace() => {
                if !token.is_empty() && push_token(&mut result.moves, &token)? {
                    return Ok(result);
                }
                token.clear();
            }
            c => token.push(c),
        }
    }
    if !token.is_empty() {
        push_token(&mut result.moves, &token)?;
    }
    Ok(result)
}

fn skip_comment(chars: &mut impl Iterator<Item = char>) -> Result<(), NotationError> {
    for c in chars {
        if c == '}' {
            return Ok(());
        }
    }
    Err(NotationError::Unterminated("comment"))
}

fn skip_variation(chars: &mut impl Iterator<Item = char>) -> Result<(), NotationError> {
    let mut depth = 1usize;
    while let Some(c) = chars.next() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            '{' => skip_comment(chars)?,
            _ => {}
        }
    }
    Err(NotationError::Unterminated("variation"))
}

fn read_tag(chars: &mut impl Iterator<Item = char>) -> Result<(String, String), NotationError> {
    let mut raw = String::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut closed = false;
    for c in chars {
        if in_quotes {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_quotes = false;
            }
        } else if c == '"' {
            in_quotes = true;
        } else if c == ']' {
            closed = true;
            break;
        }
        raw.push(c);
    }
    if !closed {
        return Err(NotationError::Unterminated("tag pair"));
    }

    let raw = raw.trim();
    let (name, rest) = raw
        .split_once(char::is_whitespace)
        .ok_or_else(|| NotationError::BadTag(raw.to_string()))?;
    let value = rest
        .trim()
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .ok_or_else(|| NotationError::BadTag(raw.to_string()))?;
    Ok((name.to_string(), value.replace("\\\"", "\"").replace("\\\\", "\\")))
}

/// Classifies one whitespace-delimited token. Returns `Ok(true)` when the
/// token ends the game.
fn push_token(moves: &mut Vec<String>, raw: &str) -> Result<bool, NotationError> {
    if RESULT_TOKENS.contains(&raw) {
        return Ok(true);
    }
    if raw.starts_with('$') {
        return Ok(false);
    }

    // Move numbers, possibly glued to the move: "12.", "12...", "1.e4".
    let digits = raw.chars().take_while(|c| c.is_ascii_digit()).count();
    let mut rest = raw;
    if digits > 0 && raw[digits..].starts_with('.') {
        rest = raw[digits..].trim_start_matches('.');
    }

    let mv = rest.trim_end_matches(|c| c == '!' || c == '?');
    if mv.is_empty() {
        return Ok(false);
    }
    if RESULT_TOKENS.contains(&mv) {
        return Ok(true);
    }

    let mv = normalize_castling(mv);
    mv.parse::<SanPlus>()
        .map_err(|_| NotationError::BadToken(raw.to_string()))?;
    moves.push(mv);
    Ok(false)
}

/// Accepts the zero-for-O castling spelling.
fn normalize_castling(token: &str) -> String {
    let body = token.trim_end_matches(|c| c == '+' || c == '#');
    if body == "0-0" || body == "0-0-0" {
        token.replace('0', "O")
    } else {
        token.to_string()
    }
}

/// Formats a line as PGN movetext: a move number before every White move,
/// and a `N...` number when the line opens with a Black move.
pub fn format_move_text(line: &[&MoveRecord]) -> String {
    let mut out = String::new();
    for (i, record) in line.iter().enumerate() {
        match record.side {
            Side::White => out.push_str(&format!("{}. {} ", record.move_number, record.notation)),
            Side::Black if i == 0 => {
                out.push_str(&format!("{}... {} ", record.move_number, record.notation))
            }
            Side::Black => out.push_str(&format!("{} ", record.notation)),
        }
    }
    out.trim_end().to_string()
}

/// Full PGN export: movetext, preceded by `SetUp`/`FEN` tags when the line
/// does not start from the standard position.
pub fn format_pgn(initial_position: &str, line: &[&MoveRecord]) -> String {
    let moves = format_move_text(line);
    if is_starting_position(initial_position) {
        return moves;
    }
    let mut out = format!("[SetUp \"1\"]\n[FEN \"{}\"]\n", initial_position);
    if !moves.is_empty() {
        out.push('\n');
        out.push_str(&moves);
    }
    out
}
