//! The boundary to the rules engine.
//!
//! The move tree never decides legality itself: it hands a position and a
//! request to a [`MoveValidator`] and records whatever notation and
//! resulting position come back.

use std::fmt;
use std::str::FromStr;

use shakmaty::san::SanPlus;
use shakmaty::{Chess, File, Move, Position, Role, Square};

use crate::error::MoveRejected;
use crate::notation::{format_position, parse_position};

/// A raw board move: origin, destination and optional promotion piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveRequest {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Role>,
}

impl MoveRequest {
    pub fn new(from: &str, to: &str) -> Result<Self, MoveRejected> {
        Ok(Self {
            from: parse_square(from)?,
            to: parse_square(to)?,
            promotion: None,
        })
    }

    pub fn with_promotion(mut self, piece: char) -> Result<Self, MoveRejected> {
        self.promotion = Some(parse_promotion(piece)?);
        Ok(self)
    }

    /// Castling is accepted both as the king's two-square step (`e1g1`) and
    /// as king-takes-rook (`e1h1`).
    fn matches(&self, mv: &Move) -> bool {
        if mv.promotion() != self.promotion {
            return false;
        }
        match *mv {
            Move::Castle { king, rook } => {
                let file = if rook.file() > king.file() { File::G } else { File::C };
                self.from == king
                    && (self.to == rook || self.to == Square::from_coords(file, king.rank()))
            }
            _ => mv.from() == Some(self.from) && mv.to() == self.to,
        }
    }
}

fn parse_square(text: &str) -> Result<Square, MoveRejected> {
    text.parse::<Square>()
        .map_err(|_| MoveRejected::UnknownSquare(text.to_string()))
}

fn parse_promotion(piece: char) -> Result<Role, MoveRejected> {
    match Role::from_char(piece.to_ascii_lowercase()) {
        Some(role @ (Role::Queen | Role::Rook | Role::Bishop | Role::Knight)) => Ok(role),
        _ => Err(MoveRejected::UnknownPromotion(piece)),
    }
}

impl FromStr for MoveRequest {
    type Err = MoveRejected;

    /// Long algebraic coordinates: `e2e4`, `e7e8q`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.is_ascii() || (s.len() != 4 && s.len() != 5) {
            return Err(MoveRejected::BadRequest(s.to_string()));
        }
        let request = MoveRequest::new(&s[0..2], &s[2..4])?;
        match s[4..].chars().next() {
            Some(piece) => request.with_promotion(piece),
            None => Ok(request),
        }
    }
}

impl fmt::Display for MoveRequest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(role) = self.promotion {
            write!(f, "{}", role.char())?;
        }
        Ok(())
    }
}

/// What the rules engine returns for an accepted move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    pub notation: String,
    pub resulting_position: String,
}

/// The rules engine contract. Positions travel as FEN text so the tree stays
/// independent of any particular board representation.
pub trait MoveValidator {
    fn apply_move(&self, position: &str, request: &MoveRequest)
        -> Result<AppliedMove, MoveRejected>;

    /// Plays a move given in standard algebraic notation.
    fn apply_san(&self, position: &str, san: &str) -> Result<AppliedMove, MoveRejected>;
}

/// Standard chess rules backed by `shakmaty`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRules;

impl StandardRules {
    pub fn new() -> Self {
        StandardRules
    }

    fn load(position: &str) -> Result<Chess, MoveRejected> {
        parse_position(position).map_err(|err| MoveRejected::InvalidPosition(err.to_string()))
    }

    fn play(mut position: Chess, mv: &Move) -> AppliedMove {
        let notation = SanPlus::from_move_and_play_unchecked(&mut position, mv).to_string();
        AppliedMove {
            notation,
            resulting_position: format_position(&position),
        }
    }
}

impl MoveValidator for StandardRules {
    fn apply_move(
        &self,
        position: &str,
        request: &MoveRequest,
    ) -> Result<AppliedMove, MoveRejected> {
        let position = Self::load(position)?;
        let mv = position
            .legal_moves()
            .iter()
            .find(|mv| request.matches(mv))
            .cloned()
            .ok_or_else(|| MoveRejected::NoSuchMove(request.to_string()))?;
        Ok(Self::play(position, &mv))
    }

    fn apply_san(&self, position: &str, san: &str) -> Result<AppliedMove, MoveRejected> {
        let position = Self::load(position)?;
        let parsed: SanPlus = san
            .trim()
            .parse()
            .map_err(|_| MoveRejected::BadNotation(san.to_string()))?;
        let mv = parsed
            .san
            .to_move(&position)
            .map_err(|_| MoveRejected::NoSuchMove(san.to_string()))?;
        Ok(Self::play(position, &mv))
    }
}
