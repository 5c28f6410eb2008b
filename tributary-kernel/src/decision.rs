use crate::tracker::SyncAction;

/// Per-file outcome of the sync automaton.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Write source bytes over the local file and record the new hash.
    Copy,
    /// No file I/O, no tracker update.
    None,
    /// Both sides moved; hand local+source to the merge oracle.
    Merge,
    /// Local already matches source but the tracker is stale; refresh the
    /// recorded hash without touching bytes.
    UpdateTracker,
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Copy => "copy",
            Decision::None => "none",
            Decision::Merge => "merge",
            Decision::UpdateTracker => "update-tracker",
        }
    }
}

/// Everything the automaton consumes for one file. Hashes are content
/// digests; the empty string on `local_hash` means the local file is absent.
#[derive(Clone, Copy, Debug)]
pub struct DecisionInput<'a> {
    pub source_hash: &'a str,
    pub local_hash: &'a str,
    pub tracker_hash: Option<&'a str>,
    pub tracker_action: Option<SyncAction>,
    pub last_commit: Option<&'a str>,
    pub current_commit: &'a str,
    pub force: bool,
}

/// The decision table, applied in order, first match wins. Pure: identical
/// inputs always yield identical outputs, and no branch performs I/O.
pub fn decide(input: &DecisionInput) -> Decision {
    if input.local_hash.is_empty() {
        return Decision::Copy;
    }

    if input.force {
        return Decision::Copy;
    }

    // A previously merged file is gated on commit movement, not hash drift:
    // the merged content is expected to differ from both sides.
    if input.tracker_action == Some(SyncAction::Merge) {
        return if input.last_commit == Some(input.current_commit) {
            Decision::None
        } else {
            Decision::Merge
        };
    }

    let tracker = match input.tracker_hash {
        None => return Decision::Copy,
        Some(hash) => hash,
    };

    let local = input.local_hash;
    let source = input.source_hash;

    if local == tracker && local != source {
        return Decision::Copy;
    }

    if local != tracker && tracker == source {
        return Decision::None;
    }

    if local != tracker && local == source {
        return Decision::UpdateTracker;
    }

    if local != tracker && local != source && source != tracker {
        return Decision::Merge;
    }

    Decision::None
}
