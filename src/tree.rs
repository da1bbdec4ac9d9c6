//! The move tree: a main line, flat variations hanging off it, and a cursor
//! over whichever of them is currently active.

use tracing::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::notation::{format_pgn, normalize_position, parse_move_text, position_turn, STARTING_FEN};
use crate::record::{group_rows, Branch, BranchId, MoveRecord, MoveRow};
use crate::validator::{AppliedMove, MoveRequest, MoveValidator, StandardRules};

/// Where a newly played move goes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Placement {
    MainLine,
    /// Append to the branch at this index of `branches`.
    ExtendBranch(usize),
    /// Start a branch off the main line, seeded with `carried`.
    NewBranch {
        parent_ply: Option<usize>,
        carried: Vec<MoveRecord>,
    },
}

/// Owns the analysis state and is the only thing that mutates it.
///
/// The cursor indexes the active line; `None` is the initial position. Every
/// public method leaves these invariants intact:
/// - the cursor is `None` or inside the active line,
/// - every branch diverges from an existing main-line ply (or the start),
/// - the active branch, if any, exists,
/// - when not navigating, the cursor sits on the tip of the active line.
#[derive(Debug, Clone)]
pub struct MoveTree<V: MoveValidator = StandardRules> {
    validator: V,
    config: AnalysisConfig,
    default_start: String,
    initial_position: String,
    main_line: Vec<MoveRecord>,
    branches: Vec<Branch>,
    active_branch: Option<BranchId>,
    cursor: Option<usize>,
    is_navigating: bool,
    next_branch_id: u32,
}

impl MoveTree<StandardRules> {
    pub fn new() -> Self {
        Self::with_validator(StandardRules)
    }
}

impl Default for MoveTree<StandardRules> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: MoveValidator> MoveTree<V> {
    /// An empty tree at the standard starting position.
    pub fn with_validator(validator: V) -> Self {
        Self::build(validator, AnalysisConfig::default(), STARTING_FEN.to_string())
    }

    pub fn with_config(config: AnalysisConfig, validator: V) -> Result<Self, AnalysisError> {
        let start = config.resolve_start()?;
        Ok(Self::build(validator, config, start))
    }

    fn build(validator: V, config: AnalysisConfig, start: String) -> Self {
        Self {
            validator,
            config,
            default_start: start.clone(),
            initial_position: start,
            main_line: Vec::new(),
            branches: Vec::new(),
            active_branch: None,
            cursor: None,
            is_navigating: false,
            next_branch_id: 1,
        }
    }

    pub fn validator(&self) -> &V {
        &self.validator
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// FEN of the position before the first move of every line.
    pub fn initial_position(&self) -> &str {
        &self.initial_position
    }

    pub fn main_line(&self) -> &[MoveRecord] {
        &self.main_line
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn branch(&self, id: BranchId) -> Option<&Branch> {
        self.branches.iter().find(|branch| branch.id == id)
    }

    pub fn active_branch(&self) -> Option<BranchId> {
        self.active_branch
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn is_navigating(&self) -> bool {
        self.is_navigating
    }

    fn active_branch_index(&self) -> Option<usize> {
        let id = self.active_branch?;
        self.branches.iter().position(|branch| branch.id == id)
    }

    fn active_branch_ref(&self) -> Option<&Branch> {
        self.active_branch_index().map(|index| &self.branches[index])
    }

    // ------------------------------------------------------------------
    // Active line
    // ------------------------------------------------------------------

    /// The line being shown: the main line, or the main line up to and
    /// including the active branch's parent ply followed by the branch.
    pub fn active_line(&self) -> Vec<&MoveRecord> {
        match self.active_branch_ref() {
            None => self.main_line.iter().collect(),
            Some(branch) => self.main_line[..branch.prefix_len()]
                .iter()
                .chain(branch.moves.iter())
                .collect(),
        }
    }

    pub fn active_line_len(&self) -> usize {
        match self.active_branch_ref() {
            None => self.main_line.len(),
            Some(branch) => branch.prefix_len() + branch.moves.len(),
        }
    }

    pub fn record_at(&self, index: usize) -> Option<&MoveRecord> {
        match self.active_branch_ref() {
            None => self.main_line.get(index),
            Some(branch) if index < branch.prefix_len() => self.main_line.get(index),
            Some(branch) => branch.moves.get(index - branch.prefix_len()),
        }
    }

    /// The active line grouped by move number for display.
    pub fn move_rows(&self) -> Vec<MoveRow<'_>> {
        group_rows(&self.active_line())
    }

    /// FEN after the record at `index` of the active line; `None` asks for
    /// the initial position.
    pub fn position_at(&self, index: Option<usize>) -> Option<&str> {
        match index {
            None => Some(&self.initial_position),
            Some(i) => self.record_at(i).map(|record| record.resulting_position.as_str()),
        }
    }

    /// FEN of the position at the cursor.
    pub fn current_position(&self) -> &str {
        match self.cursor.and_then(|i| self.record_at(i)) {
            Some(record) => &record.resulting_position,
            None => &self.initial_position,
        }
    }

    /// Rebuilds the position at `index` by replaying the active line's moves
    /// through the validator from the initial position. Agrees with
    /// [`Self::position_at`] for every valid index.
    pub fn replay_to(&self, index: Option<usize>) -> Result<String, AnalysisError> {
        let mut position = self.initial_position.clone();
        let count = index.map_or(0, |i| i + 1);
        for (i, record) in self.active_line().into_iter().take(count).enumerate() {
            let applied = self
                .validator
                .apply_san(&position, &record.notation)
                .map_err(|source| AnalysisError::IllegalImport {
                    ply: i + 1,
                    san: record.notation.clone(),
                    source,
                })?;
            position = applied.resulting_position;
        }
        Ok(position)
    }

    // ------------------------------------------------------------------
    // Playing moves
    // ------------------------------------------------------------------

    /// Plays a board move from the current position. Illegal moves leave the
    /// tree untouched.
    pub fn play_move(&mut self, request: &MoveRequest) -> Result<&MoveRecord, AnalysisError> {
        let before = self.current_position().to_string();
        let applied = self
            .validator
            .apply_move(&before, request)
            .map_err(|source| {
                debug!(%request, %source, "move rejected");
                AnalysisError::IllegalMove {
                    request: request.to_string(),
                    source,
                }
            })?;
        self.insert(applied, &before)
    }

    /// Plays a move given in algebraic notation from the current position.
    pub fn play_san(&mut self, san: &str) -> Result<&MoveRecord, AnalysisError> {
        let before = self.current_position().to_string();
        let applied = self.validator.apply_san(&before, san).map_err(|source| {
            debug!(san, %source, "move rejected");
            AnalysisError::IllegalMove {
                request: san.to_string(),
                source,
            }
        })?;
        self.insert(applied, &before)
    }

    fn placement(&self) -> Placement {
        if let Some(index) = self.active_branch_index() {
            let branch = &self.branches[index];
            let prefix = branch.prefix_len();
            let len = prefix + branch.moves.len();
            return match self.cursor {
                Some(c) if c + 1 == len => Placement::ExtendBranch(index),
                // Inside the branch but behind its tip: fork a sibling that
                // shares the branch's moves up to the cursor.
                Some(c) if c >= prefix => Placement::NewBranch {
                    parent_ply: branch.parent_ply,
                    carried: branch.moves[..=c - prefix].to_vec(),
                },
                // On the main-line part of the active line.
                cursor => Placement::NewBranch {
                    parent_ply: cursor,
                    carried: Vec::new(),
                },
            };
        }

        let behind_tip = match self.cursor {
            None => !self.main_line.is_empty(),
            Some(c) => c + 1 < self.main_line.len(),
        };
        if self.is_navigating && behind_tip {
            Placement::NewBranch {
                parent_ply: self.cursor,
                carried: Vec::new(),
            }
        } else {
            Placement::MainLine
        }
    }

    fn insert(&mut self, applied: AppliedMove, before: &str) -> Result<&MoveRecord, AnalysisError> {
        let (side, move_number) = position_turn(before)?;
        let record = |ply: usize| {
            MoveRecord::new(
                applied.notation.clone(),
                applied.resulting_position.clone(),
                ply,
                move_number,
                side,
            )
        };
        let placement = self.placement();
        self.is_navigating = false;

        match placement {
            Placement::MainLine => {
                let index = self.main_line.len();
                self.main_line.push(record(index + 1));
                self.cursor = Some(index);
                self.debug_check();
                Ok(&self.main_line[index])
            }
            Placement::ExtendBranch(index) => {
                let branch = &mut self.branches[index];
                let offset = branch.moves.len();
                branch.moves.push(record(offset + 1));
                self.cursor = Some(branch.prefix_len() + offset);
                self.debug_check();
                Ok(&self.branches[index].moves[offset])
            }
            Placement::NewBranch {
                parent_ply,
                mut carried,
            } => {
                let id = BranchId(self.next_branch_id);
                self.next_branch_id += 1;
                carried.push(record(carried.len() + 1));
                let branch = Branch {
                    id,
                    name: self.config.branch_name(id.get()),
                    parent_ply,
                    moves: carried,
                };
                info!(branch = %id, parent_ply = ?parent_ply, moves = branch.moves.len(), "branch created");
                self.cursor = Some(branch.prefix_len() + branch.moves.len() - 1);
                self.active_branch = Some(id);
                self.branches.push(branch);
                self.debug_check();
                let index = self.branches.len() - 1;
                let last = self.branches[index].moves.len() - 1;
                Ok(&self.branches[index].moves[last])
            }
        }
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Moves the cursor. Targets outside the active line are ignored.
    pub fn navigate_to(&mut self, index: Option<usize>) {
        if let Some(i) = index {
            let len = self.active_line_len();
            if i >= len {
                debug!(index = i, len, "navigation target out of range");
                return;
            }
        }
        self.cursor = index;
        self.is_navigating = true;
        debug!(cursor = ?index, "navigated");
    }

    pub fn go_to_first(&mut self) {
        self.navigate_to(None);
    }

    pub fn go_to_last(&mut self) {
        self.navigate_to(self.active_line_len().checked_sub(1));
    }

    pub fn go_to_previous(&mut self) {
        match self.cursor {
            None => debug!("already at the initial position"),
            Some(0) => self.navigate_to(None),
            Some(c) => self.navigate_to(Some(c - 1)),
        }
    }

    pub fn go_to_next(&mut self) {
        self.navigate_to(Some(self.cursor.map_or(0, |c| c + 1)));
    }

    pub fn can_go_back(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn can_go_forward(&self) -> bool {
        self.cursor.map_or(0, |c| c + 1) < self.active_line_len()
    }

    // ------------------------------------------------------------------
    // Branches
    // ------------------------------------------------------------------

    /// `None` returns to the main line at the initial position; a branch id
    /// activates that branch with the cursor on its divergence point.
    /// Unknown ids are ignored.
    pub fn switch_to_branch(&mut self, id: Option<BranchId>) {
        match id {
            None => {
                self.active_branch = None;
                self.cursor = None;
            }
            Some(id) => match self.branch(id) {
                Some(branch) => {
                    self.cursor = branch.parent_ply;
                    self.active_branch = Some(id);
                }
                None => {
                    debug!(branch = %id, "switch to unknown branch ignored");
                    return;
                }
            },
        }
        self.is_navigating = true;
        debug!(branch = ?self.active_branch.map(|id| id.get()), "active line switched");
        self.debug_check();
    }

    /// Removes a branch, falling back to the main line first if it was the
    /// active one. Unknown ids are ignored.
    pub fn delete_branch(&mut self, id: BranchId) {
        let Some(index) = self.branches.iter().position(|branch| branch.id == id) else {
            debug!(branch = %id, "delete of unknown branch ignored");
            return;
        };
        if self.active_branch == Some(id) {
            self.switch_to_branch(None);
        }
        self.branches.remove(index);
        info!(branch = %id, "branch deleted");
        self.debug_check();
    }

    /// Returns false if the branch does not exist.
    pub fn rename_branch(&mut self, id: BranchId, name: impl Into<String>) -> bool {
        match self.branches.iter_mut().find(|branch| branch.id == id) {
            Some(branch) => {
                branch.name = name.into();
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Import / export
    // ------------------------------------------------------------------

    pub fn export_pgn(&self) -> String {
        format_pgn(&self.initial_position, &self.active_line())
    }

    pub fn export_fen(&self) -> String {
        self.current_position().to_string()
    }

    /// Replaces the tree with an empty one starting from `text`.
    pub fn load_fen(&mut self, text: &str) -> Result<(), AnalysisError> {
        let start = normalize_position(text).map_err(|err| {
            warn!(%err, "FEN import rejected");
            err
        })?;
        self.replace(start, Vec::new());
        info!(fen = %self.initial_position, "position loaded");
        Ok(())
    }

    /// Replaces the tree with the main line of a PGN game. The game starts
    /// from its `[FEN]` tag if it has one, otherwise from the standard
    /// position.
    pub fn load_pgn(&mut self, text: &str) -> Result<(), AnalysisError> {
        let result = parse_move_text(text)
            .map_err(AnalysisError::from)
            .and_then(|parsed| {
                let start = match parsed.start_position() {
                    Some(fen) => normalize_position(fen)?,
                    None => STARTING_FEN.to_string(),
                };
                let line = self.build_line(&start, &parsed.moves)?;
                Ok((start, line))
            });
        match result {
            Ok((start, line)) => {
                info!(moves = line.len(), "game loaded");
                self.replace(start, line);
                Ok(())
            }
            Err(err) => {
                warn!(%err, "PGN import rejected");
                Err(err)
            }
        }
    }

    /// Replaces the tree with a main line built from algebraic moves, as
    /// supplied by an opening or puzzle catalog. `start` defaults to the
    /// configured starting position.
    pub fn seed_line<S: AsRef<str>>(
        &mut self,
        start: Option<&str>,
        moves: &[S],
    ) -> Result<(), AnalysisError> {
        let start = match start {
            Some(fen) => normalize_position(fen)?,
            None => self.default_start.clone(),
        };
        let line = self.build_line(&start, moves)?;
        info!(moves = line.len(), "line seeded");
        self.replace(start, line);
        Ok(())
    }

    /// Back to an empty tree at the configured start.
    pub fn reset(&mut self) {
        let start = self.default_start.clone();
        self.replace(start, Vec::new());
        info!("analysis reset");
    }

    fn build_line<S: AsRef<str>>(
        &self,
        start: &str,
        moves: &[S],
    ) -> Result<Vec<MoveRecord>, AnalysisError> {
        let mut line = Vec::with_capacity(moves.len());
        let mut position = start.to_string();
        for (i, san) in moves.iter().enumerate() {
            let san = san.as_ref();
            let applied = self.validator.apply_san(&position, san).map_err(|source| {
                AnalysisError::IllegalImport {
                    ply: i + 1,
                    san: san.to_string(),
                    source,
                }
            })?;
            let (side, move_number) = position_turn(&position)?;
            position = applied.resulting_position.clone();
            line.push(MoveRecord::new(
                applied.notation,
                applied.resulting_position,
                i + 1,
                move_number,
                side,
            ));
        }
        Ok(line)
    }

    fn replace(&mut self, start: String, main_line: Vec<MoveRecord>) {
        self.cursor = main_line.len().checked_sub(1);
        self.initial_position = start;
        self.main_line = main_line;
        self.branches.clear();
        self.active_branch = None;
        self.is_navigating = false;
        self.debug_check();
    }

    // ------------------------------------------------------------------
    // Invariants
    // ------------------------------------------------------------------

    /// Describes the first broken invariant, if any.
    pub fn check_invariants(&self) -> Result<(), String> {
        let len = self.active_line_len();
        if let Some(c) = self.cursor {
            if c >= len {
                return Err(format!("cursor {} outside active line of {}", c, len));
            }
        }
        for branch in &self.branches {
            if let Some(ply) = branch.parent_ply {
                if ply >= self.main_line.len() {
                    return Err(format!(
                        "branch {} diverges after ply {} of a {}-ply main line",
                        branch.id,
                        ply,
                        self.main_line.len()
                    ));
                }
            }
            if branch.moves.is_empty() {
                return Err(format!("branch {} has no moves", branch.id));
            }
            if self.branches.iter().filter(|b| b.id == branch.id).count() > 1 {
                return Err(format!("duplicate branch id {}", branch.id));
            }
        }
        if let Some(id) = self.active_branch {
            if self.branch(id).is_none() {
                return Err(format!("active branch {} does not exist", id));
            }
        }
        if !self.is_navigating && self.cursor != len.checked_sub(1) {
            return Err(format!(
                "cursor {:?} is off the tip ({}) without navigation",
                self.cursor, len
            ));
        }
        Ok(())
    }

    fn debug_check(&self) {
        debug_assert_eq!(self.check_invariants(), Ok(()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::error::MoveRejected;

    fn tree_with(moves: &[&str]) -> MoveTree {
        let mut tree = MoveTree::new();
        for san in moves {
            tree.play_san(san).unwrap();
        }
        tree
    }

    fn line(tree: &MoveTree) -> Vec<String> {
        tree.active_line().iter().map(|r| r.notation.clone()).collect()
    }

    fn play(tree: &mut MoveTree, uci: &str) -> Result<String, AnalysisError> {
        let request: MoveRequest = uci.parse().unwrap();
        tree.play_move(&request).map(|r| r.notation.clone())
    }

    #[test]
    fn test_empty_tree() {
        let tree = MoveTree::new();
        assert!(tree.active_line().is_empty());
        assert_eq!(tree.cursor(), None);
        assert_eq!(tree.current_position(), STARTING_FEN);
        assert_eq!(tree.export_pgn(), "");
        assert!(!tree.can_go_back());
        assert!(!tree.can_go_forward());
    }

    #[test]
    fn test_tip_append() {
        let mut tree = tree_with(&["e4", "e5"]);
        tree.go_to_last();
        assert_eq!(play(&mut tree, "g1f3").unwrap(), "Nf3");
        assert_eq!(tree.main_line().len(), 3);
        assert!(tree.branches().is_empty());
        assert_eq!(tree.cursor(), Some(2));
        assert!(!tree.is_navigating());
    }

    #[test]
    fn test_record_bookkeeping() {
        let tree = tree_with(&["e4", "e5", "Nf3"]);
        let main = tree.main_line();
        assert_eq!(main[0].ply, 1);
        assert_eq!(main[1].side, crate::record::Side::Black);
        assert_eq!(main[1].move_number, 1);
        assert_eq!(main[2].move_number, 2);
        assert_eq!(main[2].ply, 3);
    }

    #[test]
    fn test_illegal_move_leaves_state() {
        let mut tree = tree_with(&["e4"]);
        let before = line(&tree);
        let err = play(&mut tree, "e4e5").unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::IllegalMove {
                source: MoveRejected::NoSuchMove(_),
                ..
            }
        ));
        assert_eq!(line(&tree), before);
        assert_eq!(tree.cursor(), Some(0));
    }

    #[test]
    fn test_branch_from_mid_history() {
        let mut tree = tree_with(&["e4", "e5", "Nf3"]);
        let main_before = tree.main_line().to_vec();
        tree.navigate_to(Some(0));
        assert_eq!(play(&mut tree, "b8c6").unwrap(), "Nc6");

        assert_eq!(tree.main_line(), &main_before[..]);
        assert_eq!(tree.branches().len(), 1);
        let branch = &tree.branches()[0];
        assert_eq!(branch.parent_ply, Some(0));
        assert_eq!(branch.name, "Variation 1");
        assert_eq!(branch.moves.len(), 1);
        assert_eq!(tree.active_branch(), Some(branch.id));
        assert_eq!(line(&tree), vec!["e4", "Nc6"]);
        assert_eq!(tree.cursor(), Some(1));
    }

    #[test]
    fn test_branch_from_initial_position() {
        let mut tree = tree_with(&["e4", "e5"]);
        tree.go_to_first();
        assert_eq!(play(&mut tree, "d2d4").unwrap(), "d4");
        let branch = &tree.branches()[0];
        assert_eq!(branch.parent_ply, None);
        assert_eq!(line(&tree), vec!["d4"]);
        assert_eq!(tree.cursor(), Some(0));
    }

    #[test]
    fn test_extend_active_branch() {
        let mut tree = tree_with(&["e4", "e5", "Nf3"]);
        tree.navigate_to(Some(1));
        tree.play_san("Bc4").unwrap();
        tree.play_san("Nc6").unwrap();
        assert_eq!(tree.branches().len(), 1);
        assert_eq!(tree.branches()[0].moves.len(), 2);
        assert_eq!(tree.branches()[0].moves[1].ply, 2);
        assert_eq!(line(&tree), vec!["e4", "e5", "Bc4", "Nc6"]);
        assert_eq!(tree.cursor(), Some(3));
        assert_eq!(tree.main_line().len(), 3);
    }

    #[test]
    fn test_mid_branch_move_forks_sibling() {
        let mut tree = tree_with(&["e4", "e5", "Nf3"]);
        tree.navigate_to(Some(1));
        tree.play_san("Bc4").unwrap();
        tree.play_san("Nc6").unwrap();
        let first = tree.active_branch().unwrap();

        // Back onto Bc4, then try a different reply.
        tree.navigate_to(Some(2));
        tree.play_san("Nf6").unwrap();

        assert_eq!(tree.branches().len(), 2);
        let original = tree.branch(first).unwrap();
        assert_eq!(original.moves.len(), 2);
        let sibling = &tree.branches()[1];
        assert_eq!(sibling.parent_ply, Some(1));
        assert_eq!(tree.active_branch(), Some(sibling.id));
        assert_eq!(line(&tree), vec!["e4", "e5", "Bc4", "Nf6"]);
        assert_eq!(tree.cursor(), Some(3));
    }

    #[test]
    fn test_move_on_prefix_of_active_branch() {
        let mut tree = tree_with(&["e4", "e5", "Nf3"]);
        tree.navigate_to(Some(1));
        tree.play_san("Bc4").unwrap();
        tree.navigate_to(Some(0));
        tree.play_san("c5").unwrap();

        assert_eq!(tree.branches().len(), 2);
        assert_eq!(tree.branches()[1].parent_ply, Some(0));
        assert_eq!(line(&tree), vec!["e4", "c5"]);
    }

    #[test]
    fn test_navigation_bounds() {
        let mut tree = tree_with(&["e4", "e5"]);
        tree.navigate_to(Some(5));
        assert_eq!(tree.cursor(), Some(1));
        assert!(!tree.is_navigating());

        tree.go_to_previous();
        assert_eq!(tree.cursor(), Some(0));
        tree.go_to_previous();
        assert_eq!(tree.cursor(), None);
        tree.go_to_previous();
        assert_eq!(tree.cursor(), None);
        assert!(tree.can_go_forward());

        tree.go_to_next();
        tree.go_to_next();
        tree.go_to_next();
        assert_eq!(tree.cursor(), Some(1));
        assert!(!tree.can_go_forward());
        assert!(tree.can_go_back());
    }

    #[test]
    fn test_positions_follow_cursor() {
        let mut tree = tree_with(&["e4", "e5"]);
        let after_e4 = tree.main_line()[0].resulting_position.clone();
        tree.navigate_to(Some(0));
        assert_eq!(tree.current_position(), after_e4);
        assert_eq!(tree.export_fen(), after_e4);
        tree.go_to_first();
        assert_eq!(tree.export_fen(), STARTING_FEN);
        assert_eq!(tree.position_at(Some(9)), None);
    }

    #[test]
    fn test_replay_matches_cache() {
        let mut tree = tree_with(&["e4", "e5", "Nf3", "Nc6", "Bb5"]);
        tree.navigate_to(Some(2));
        tree.play_san("Bc5").unwrap();
        let len = tree.active_line_len();
        for i in 0..len {
            assert_eq!(
                tree.replay_to(Some(i)).unwrap(),
                tree.position_at(Some(i)).unwrap()
            );
        }
        assert_eq!(tree.replay_to(None).unwrap(), STARTING_FEN);
    }

    #[test]
    fn test_switch_branches() {
        let mut tree = tree_with(&["e4", "e5", "Nf3"]);
        tree.navigate_to(Some(0));
        tree.play_san("c5").unwrap();
        let id = tree.active_branch().unwrap();

        tree.switch_to_branch(None);
        assert_eq!(tree.active_branch(), None);
        assert_eq!(tree.cursor(), None);
        assert!(tree.is_navigating());
        assert_eq!(line(&tree), vec!["e4", "e5", "Nf3"]);

        tree.switch_to_branch(Some(id));
        assert_eq!(tree.active_branch(), Some(id));
        assert_eq!(tree.cursor(), Some(0));
        assert_eq!(line(&tree), vec!["e4", "c5"]);

        tree.switch_to_branch(Some(BranchId(99)));
        assert_eq!(tree.active_branch(), Some(id));
    }

    #[test]
    fn test_delete_branches() {
        let mut tree = tree_with(&["e4", "e5", "Nf3"]);
        tree.navigate_to(Some(0));
        tree.play_san("c5").unwrap();
        let first = tree.active_branch().unwrap();
        tree.switch_to_branch(None);
        tree.navigate_to(Some(1));
        tree.play_san("Bc4").unwrap();
        let second = tree.active_branch().unwrap();

        tree.delete_branch(first);
        assert_eq!(tree.branches().len(), 1);
        assert_eq!(tree.active_branch(), Some(second));

        tree.delete_branch(second);
        assert!(tree.branches().is_empty());
        assert_eq!(tree.active_branch(), None);
        assert_eq!(line(&tree), vec!["e4", "e5", "Nf3"]);

        tree.delete_branch(second);
        assert!(tree.check_invariants().is_ok());
    }

    #[test]
    fn test_branch_ids_are_not_reused() {
        let mut tree = tree_with(&["e4", "e5"]);
        tree.go_to_first();
        tree.play_san("d4").unwrap();
        let first = tree.active_branch().unwrap();
        tree.delete_branch(first);
        tree.go_to_first();
        tree.play_san("c4").unwrap();
        let second = tree.active_branch().unwrap();
        assert_ne!(first, second);
        assert_eq!(tree.branch(second).unwrap().name, "Variation 2");
    }

    #[test]
    fn test_rename_branch() {
        let mut tree = tree_with(&["e4", "e5"]);
        tree.go_to_first();
        tree.play_san("d4").unwrap();
        let id = tree.active_branch().unwrap();
        assert!(tree.rename_branch(id, "Queen's pawn"));
        assert_eq!(tree.branch(id).unwrap().name, "Queen's pawn");
        assert!(!tree.rename_branch(BranchId(42), "nothing"));
    }

    #[test]
    fn test_load_fen() {
        let mut tree = tree_with(&["e4"]);
        let fen = "8/8/8/8/8/8/8/K6k w - - 0 1";
        tree.load_fen(fen).unwrap();
        assert!(tree.active_line().is_empty());
        assert_eq!(tree.export_fen(), fen);
        assert_eq!(tree.initial_position(), fen);
        tree.play_san("Kb1").unwrap();
        assert_eq!(tree.main_line().len(), 1);
    }

    #[test]
    fn test_load_fen_failure_is_atomic() {
        let mut tree = tree_with(&["e4", "e5"]);
        tree.navigate_to(Some(0));
        assert!(tree.load_fen("<invalid text>").is_err());
        assert_eq!(line(&tree), vec!["e4", "e5"]);
        assert_eq!(tree.cursor(), Some(0));
        assert!(tree.is_navigating());
    }

    #[test]
    fn test_load_pgn() {
        let mut tree = MoveTree::new();
        tree.load_pgn("1. e4 {king pawn} e5\n2. Nf3   Nc6").unwrap();
        assert_eq!(line(&tree), vec!["e4", "e5", "Nf3", "Nc6"]);
        assert_eq!(tree.cursor(), Some(3));
        assert!(!tree.is_navigating());
        assert_eq!(tree.main_line()[3].move_number, 2);
    }

    #[test]
    fn test_load_pgn_clears_branches() {
        let mut tree = tree_with(&["e4", "e5"]);
        tree.go_to_first();
        tree.play_san("d4").unwrap();
        tree.load_pgn("1. c4").unwrap();
        assert!(tree.branches().is_empty());
        assert_eq!(tree.active_branch(), None);
        assert_eq!(line(&tree), vec!["c4"]);
    }

    #[test]
    fn test_load_pgn_illegal_move_is_atomic() {
        let mut tree = tree_with(&["d4"]);
        let err = tree.load_pgn("1. e4 e5 2. Ke3").unwrap_err();
        assert!(matches!(err, AnalysisError::IllegalImport { ply: 3, .. }));
        assert_eq!(line(&tree), vec!["d4"]);
    }

    #[test]
    fn test_load_pgn_with_fen_tag() {
        let mut tree = MoveTree::new();
        tree.load_pgn("[FEN \"8/8/8/8/8/8/8/K6k b - - 0 1\"]\n1... Kg1 2. Kb1").unwrap();
        assert_eq!(tree.initial_position(), "8/8/8/8/8/8/8/K6k b - - 0 1");
        assert_eq!(tree.export_pgn(), "[SetUp \"1\"]\n[FEN \"8/8/8/8/8/8/8/K6k b - - 0 1\"]\n\n1... Kg1 2. Kb1");
    }

    #[test]
    fn test_seed_line_and_reset() {
        let config = AnalysisConfig::new().with_variation_prefix("Idea");
        let mut tree = MoveTree::with_config(config, StandardRules).unwrap();
        tree.seed_line(None, &["e4", "c5", "Nf3"]).unwrap();
        assert_eq!(tree.export_pgn(), "1. e4 c5 2. Nf3");
        assert_eq!(tree.cursor(), Some(2));

        tree.go_to_first();
        tree.play_san("d4").unwrap();
        assert_eq!(tree.branches()[0].name, "Idea 1");

        tree.reset();
        assert!(tree.active_line().is_empty());
        assert!(tree.branches().is_empty());
        assert_eq!(tree.current_position(), STARTING_FEN);
    }

    #[test]
    fn test_config_start_position() {
        let fen = "8/8/8/8/8/8/8/K6k w - - 0 1";
        let config = AnalysisConfig::new().with_start_position(fen);
        let mut tree = MoveTree::with_config(config, StandardRules).unwrap();
        assert_eq!(tree.current_position(), fen);
        tree.load_fen(crate::notation::STARTING_FEN).unwrap();
        tree.reset();
        assert_eq!(tree.current_position(), fen);

        let bad = AnalysisConfig::new().with_start_position("junk");
        assert!(MoveTree::with_config(bad, StandardRules).is_err());
    }

    #[test]
    fn test_move_rows() {
        let tree = tree_with(&["e4", "e5", "Nf3"]);
        let rows = tree.move_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].black.map(|r| r.notation.as_str()), Some("e5"));
        assert_eq!(rows[1].white.map(|r| r.notation.as_str()), Some("Nf3"));
    }

    struct CountingRules {
        calls: Cell<usize>,
    }

    impl MoveValidator for CountingRules {
        fn apply_move(
            &self,
            position: &str,
            request: &MoveRequest,
        ) -> Result<AppliedMove, MoveRejected> {
            self.calls.set(self.calls.get() + 1);
            StandardRules.apply_move(position, request)
        }

        fn apply_san(&self, position: &str, san: &str) -> Result<AppliedMove, MoveRejected> {
            self.calls.set(self.calls.get() + 1);
            StandardRules.apply_san(position, san)
        }
    }

    #[test]
    fn test_navigation_never_consults_validator() {
        let mut tree = MoveTree::with_validator(CountingRules { calls: Cell::new(0) });
        tree.play_san("e4").unwrap();
        tree.play_san("e5").unwrap();
        assert_eq!(tree.validator().calls.get(), 2);

        tree.go_to_first();
        tree.go_to_next();
        tree.go_to_last();
        let _ = tree.export_fen();
        let _ = tree.export_pgn();
        assert_eq!(tree.validator().calls.get(), 2);
    }
}
