pub mod decision;
pub mod digest;
pub mod tracker;
pub mod workflow;

pub use decision::{Decision, DecisionInput, decide};
pub use digest::{hash_bytes, hash_file};
pub use tracker::{
    FileRecord, PathMapping, PrStatus, PullRequestRecord, RepoRecord, SyncAction, TrackerRoot,
};
pub use workflow::{ParsedTask, RepoGroup, Substitution, SyncSpec, Workflow, substitute};
