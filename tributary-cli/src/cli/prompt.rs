use std::io::{self, IsTerminal, Write};

use tributary_core::config;
use tributary_core::ingest::{DeletionChoice, DeletionPrompt};
use tributary_core::workflow::TaskPicker;

/// Deletion review for ingest. Without a TTY (or with `--yes`) nothing is
/// ever deleted; destructive choices require an explicit answer.
pub(crate) struct InteractiveDeletionPrompt;

impl DeletionPrompt for InteractiveDeletionPrompt {
    fn choose(&self, repo: &str, candidates: &[String]) -> DeletionChoice {
        if config::get_config().assume_yes || !io::stdin().is_terminal() {
            return DeletionChoice::Keep;
        }

        eprintln!(
            "{repo}: {} tracked file(s) no longer exist upstream:",
            candidates.len()
        );
        for (index, rel) in candidates.iter().enumerate() {
            eprintln!("  {}) {rel}", index + 1);
        }
        eprint!("Delete them locally?\n  1) Delete all\n  2) Pick which to delete\n  3) Keep all\n> ");
        let _ = io::stderr().flush();

        let mut answer = String::new();
        if io::stdin().read_line(&mut answer).is_err() {
            return DeletionChoice::Keep;
        }
        match answer.trim() {
            "1" => DeletionChoice::DeleteAll,
            "2" => {
                eprint!("Files to delete (e.g. 1,3-4): ");
                let _ = io::stderr().flush();
                let mut picks = String::new();
                if io::stdin().read_line(&mut picks).is_err() {
                    return DeletionChoice::Keep;
                }
                let indices = parse_selection(&picks, candidates.len());
                if indices.is_empty() {
                    DeletionChoice::Keep
                } else {
                    DeletionChoice::Subset(
                        indices
                            .into_iter()
                            .map(|index| candidates[index - 1].clone())
                            .collect(),
                    )
                }
            }
            _ => DeletionChoice::Keep,
        }
    }
}

/// Task selection for choose-workflow. Non-interactive runs execute every
/// task, same as plain ingest.
pub(crate) struct InteractiveTaskPicker;

impl TaskPicker for InteractiveTaskPicker {
    fn pick(&self, names: &[String]) -> Vec<usize> {
        if names.is_empty() {
            return Vec::new();
        }
        if config::get_config().assume_yes || !io::stdin().is_terminal() {
            return (0..names.len()).collect();
        }

        eprintln!("Tasks:");
        for (index, name) in names.iter().enumerate() {
            eprintln!("  {}) {name}", index + 1);
        }
        eprint!("Run which tasks? (e.g. 1,3-4, or 'all'): ");
        let _ = io::stderr().flush();

        let mut answer = String::new();
        if io::stdin().read_line(&mut answer).is_err() {
            return (0..names.len()).collect();
        }
        let trimmed = answer.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return (0..names.len()).collect();
        }
        parse_selection(trimmed, names.len())
            .into_iter()
            .map(|index| index - 1)
            .collect()
    }
}

/// Parse a `1,3-5` style selection into sorted, deduplicated 1-based indices.
/// Out-of-range and unparseable pieces are dropped.
pub(crate) fn parse_selection(input: &str, max: usize) -> Vec<usize> {
    let mut picked = Vec::new();
    for piece in input.split(',') {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        if let Some((start, end)) = piece.split_once('-') {
            if let (Ok(start), Ok(end)) = (start.trim().parse::<usize>(), end.trim().parse::<usize>())
            {
                for index in start..=end {
                    if index >= 1 && index <= max {
                        picked.push(index);
                    }
                }
            }
        } else if let Ok(index) = piece.parse::<usize>()
            && index >= 1
            && index <= max
        {
            picked.push(index);
        }
    }
    picked.sort_unstable();
    picked.dedup();
    picked
}
