use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// FEN side-to-move letter.
    pub fn fen_char(&self) -> char {
        match self {
            Side::White => 'w',
            Side::Black => 'b',
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Side::White => write!(f, "white"),
            Side::Black => write!(f, "black"),
        }
    }
}

/// One played move, as recorded in the main line or in a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    /// SAN as produced by the rules engine, check suffix included.
    pub notation: String,
    /// FEN after the move.
    pub resulting_position: String,
    /// 1-based index within the record's own line.
    pub ply: usize,
    /// Full-move counter of the position the move was played from.
    pub move_number: u32,
    /// The side that made the move.
    pub side: Side,
}

impl MoveRecord {
    pub fn new(
        notation: impl Into<String>,
        resulting_position: impl Into<String>,
        ply: usize,
        move_number: u32,
        side: Side,
    ) -> Self {
        Self {
            notation: notation.into(),
            resulting_position: resulting_position.into(),
            ply,
            move_number,
            side,
        }
    }
}

impl fmt::Display for MoveRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.side {
            Side::White => write!(f, "{}. {}", self.move_number, self.notation),
            Side::Black => write!(f, "{}... {}", self.move_number, self.notation),
        }
    }
}

/// Opaque branch identifier. Ids are never reused within one tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchId(pub(crate) u32);

impl BranchId {
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BranchId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(BranchId)
    }
}

/// An alternate continuation diverging from the main line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
    /// Main-line index after which the branch diverges; `None` means it
    /// starts from the initial position.
    pub parent_ply: Option<usize>,
    pub moves: Vec<MoveRecord>,
}

impl Branch {
    /// Number of main-line records that precede the branch's own moves in
    /// its active line.
    pub fn prefix_len(&self) -> usize {
        self.parent_ply.map_or(0, |ply| ply + 1)
    }
}

/// One row of a move list: a move number with up to one move per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveRow<'a> {
    pub move_number: u32,
    pub white: Option<&'a MoveRecord>,
    pub black: Option<&'a MoveRecord>,
}

/// Groups a line into display rows. A line that opens with a Black move
/// gets a row with an empty White slot.
pub fn group_rows<'a>(line: &[&'a MoveRecord]) -> Vec<MoveRow<'a>> {
    let mut rows: Vec<MoveRow<'a>> = Vec::new();
    for &record in line {
        match record.side {
            Side::White => rows.push(MoveRow {
                move_number: record.move_number,
                white: Some(record),
                black: None,
            }),
            Side::Black => match rows.last_mut() {
                Some(row) if row.black.is_none() && row.move_number == record.move_number => {
                    row.black = Some(record);
                }
                _ => rows.push(MoveRow {
                    move_number: record.move_number,
                    white: None,
                    black: Some(record),
                }),
            },
        }
    }
    rows
}
