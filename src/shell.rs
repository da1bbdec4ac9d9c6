use crate::error::AnalysisError;
use crate::notation::format_move_text;
use crate::record::{BranchId, MoveRecord};
use crate::tree::MoveTree;
use crate::validator::{MoveRequest, MoveValidator, StandardRules};
use anyhow::Result;
use std::io::{BufRead, Write};
use tracing::debug;

const HELP: &str = "\
commands:
  <uci> | move <uci>     play a board move (e2e4, e7e8q)
  san <move>             play a move in algebraic notation
  first | prev | next | last
  goto <ply|start>       jump to a ply of the active line
  line | rows            show the active line
  branches               list variations
  branch <id|main>       switch the active line
  delete <id>            delete a variation
  rename <id> <name>     rename a variation
  fen | pgn              export
  loadfen <fen>          start from a position
  loadpgn <movetext>     import a game
  reset | help | quit
";

/// Line-oriented front end over a single move tree. Every command produces
/// a response string, so the shell can be driven without a terminal.
pub struct AnalysisShell<V: MoveValidator = StandardRules> {
    tree: MoveTree<V>,
}

impl AnalysisShell<StandardRules> {
    pub fn new() -> Self {
        Self::with_tree(MoveTree::new())
    }
}

impl Default for AnalysisShell<StandardRules> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: MoveValidator> AnalysisShell<V> {
    pub fn with_tree(tree: MoveTree<V>) -> Self {
        AnalysisShell { tree }
    }

    pub fn tree(&self) -> &MoveTree<V> {
        &self.tree
    }

    pub fn run<R: BufRead, W: Write>(&mut self, mut reader: R, mut writer: W) -> Result<()> {
        let mut line = String::new();

        while reader.read_line(&mut line)? > 0 {
            let command = line.trim();
            if command == "quit" || command == "exit" {
                break;
            }
            let response = self.handle_command(command);
            write!(writer, "{}", response)?;
            writer.flush()?;
            line.clear();
        }
        Ok(())
    }

    pub fn handle_command(&mut self, command: &str) -> String {
        let command = command.trim();
        let (name, rest) = match command.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (command, ""),
        };
        debug!(command = name, "shell command");

        match name {
            "" => String::new(),
            "help" => HELP.to_string(),
            "move" => self.handle_move(rest),
            "san" => self.handle_played(|tree| tree.play_san(rest).map(|r| r.to_string())),
            "first" => {
                self.tree.go_to_first();
                self.status()
            }
            "last" => {
                self.tree.go_to_last();
                self.status()
            }
            "prev" => {
                self.tree.go_to_previous();
                self.status()
            }
            "next" => {
                self.tree.go_to_next();
                self.status()
            }
            "goto" => self.handle_goto(rest),
            "line" => self.handle_line(),
            "rows" => self.handle_rows(),
            "branches" => self.handle_branches(),
            "branch" => self.handle_branch(rest),
            "delete" => self.handle_delete(rest),
            "rename" => self.handle_rename(rest),
            "fen" => format!("{}\n", self.tree.export_fen()),
            "pgn" => format!("{}\n", self.tree.export_pgn()),
            "loadfen" => self.handle_load(|tree| tree.load_fen(rest)),
            "loadpgn" => self.handle_load(|tree| tree.load_pgn(rest)),
            "reset" => {
                self.tree.reset();
                self.status()
            }
            _ if rest.is_empty() && command.parse::<MoveRequest>().is_ok() => {
                self.handle_move(command)
            }
            _ => format!("error: unknown command '{}' (try help)\n", name),
        }
    }

    fn handle_move(&mut self, text: &str) -> String {
        match text.parse::<MoveRequest>() {
            Ok(request) => self.handle_played(|tree| tree.play_move(&request).map(|r| r.to_string())),
            Err(err) => format!("error: {}\n", err),
        }
    }

    fn handle_played<F>(&mut self, play: F) -> String
    where
        F: FnOnce(&mut MoveTree<V>) -> Result<String, AnalysisError>,
    {
        match play(&mut self.tree) {
            Ok(played) => format!("{}\n{}", played, self.status()),
            Err(err) => format!("error: {}\n", err),
        }
    }

    fn handle_load<F>(&mut self, load: F) -> String
    where
        F: FnOnce(&mut MoveTree<V>) -> Result<(), AnalysisError>,
    {
        match load(&mut self.tree) {
            Ok(()) => self.status(),
            Err(err) => format!("error: {}\n", err),
        }
    }

    fn handle_goto(&mut self, arg: &str) -> String {
        let target = match arg {
            "start" => None,
            n => match n.parse::<usize>() {
                Ok(ply) => ply.checked_sub(1),
                Err(_) => return format!("error: '{}' is not a ply number\n", arg),
            },
        };
        self.tree.navigate_to(target);
        self.status()
    }

    fn handle_line(&self) -> String {
        let mut out = String::new();
        for (i, record) in self.tree.active_line().iter().enumerate() {
            let marker = if self.tree.cursor() == Some(i) { '*' } else { ' ' };
            out.push_str(&format!("{} {}\n", marker, record));
        }
        out
    }

    fn handle_rows(&self) -> String {
        let mut out = String::new();
        for row in self.tree.move_rows() {
            let white = row.white.map_or("...", |r| r.notation.as_str());
            match row.black {
                Some(black) => out.push_str(&format!("{}. {} {}\n", row.move_number, white, black.notation)),
                None => out.push_str(&format!("{}. {}\n", row.move_number, white)),
            }
        }
        out
    }

    fn handle_branches(&self) -> String {
        let branches = self.tree.branches();
        if branches.is_empty() {
            return "no variations\n".to_string();
        }
        let mut out = String::new();
        for branch in branches {
            let marker = if self.tree.active_branch() == Some(branch.id) { '*' } else { ' ' };
            let origin = match branch.parent_ply {
                Some(ply) => format!("after ply {}", ply + 1),
                None => "from start".to_string(),
            };
            let moves: Vec<&MoveRecord> = branch.moves.iter().collect();
            out.push_str(&format!(
                "{} {} {} ({}): {}\n",
                marker,
                branch.id,
                branch.name,
                origin,
                format_move_text(&moves)
            ));
        }
        out
    }

    fn handle_branch(&mut self, arg: &str) -> String {
        if arg == "main" {
            self.tree.switch_to_branch(None);
            return self.status();
        }
        match self.parse_branch(arg) {
            Ok(id) => {
                self.tree.switch_to_branch(Some(id));
                self.status()
            }
            Err(msg) => msg,
        }
    }

    fn handle_delete(&mut self, arg: &str) -> String {
        match self.parse_branch(arg) {
            Ok(id) => {
                self.tree.delete_branch(id);
                format!("deleted variation {}\n{}", id, self.status())
            }
            Err(msg) => msg,
        }
    }

    fn handle_rename(&mut self, args: &str) -> String {
        let (id, name) = match args.split_once(char::is_whitespace) {
            Some((id, name)) if !name.trim().is_empty() => (id, name.trim()),
            _ => return "error: usage: rename <id> <name>\n".to_string(),
        };
        match self.parse_branch(id) {
            Ok(id) => {
                self.tree.rename_branch(id, name);
                format!("variation {} is now '{}'\n", id, name)
            }
            Err(msg) => msg,
        }
    }

    /// Parses an id and checks that the branch exists.
    fn parse_branch(&self, arg: &str) -> Result<BranchId, String> {
        let id: BranchId = arg
            .parse()
            .map_err(|_| format!("error: '{}' is not a variation id\n", arg))?;
        match self.tree.branch(id) {
            Some(_) => Ok(id),
            None => Err(format!("error: no variation {}\n", id)),
        }
    }

    fn status(&self) -> String {
        let line = match self.tree.active_branch().and_then(|id| self.tree.branch(id)) {
            Some(branch) => branch.name.clone(),
            None => "main line".to_string(),
        };
        format!(
            "[{} {}/{}] {}\n",
            line,
            self.tree.cursor().map_or(0, |c| c + 1),
            self.tree.active_line_len(),
            self.tree.current_position()
        )
    }
}
