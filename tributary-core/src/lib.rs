pub mod config;
pub mod contribute;
pub mod display;
pub mod forge;
pub mod ingest;
pub mod oracle;
pub mod tracker;
pub mod vcs;
pub mod walker;
pub mod workflow;

/// Commit message used for every contribute commit. A fixed convention keeps
/// fork history recognizable across runs.
pub const CONTRIBUTE_COMMIT_MESSAGE: &str = "feat: contribute changes from local to source";

pub const MERGE_SYSTEM_PROMPT: &str = r#"
<mainInstruction>
You are a code-merge resolver. You receive two versions of the same file:

- <target> is the local copy. It may contain deliberate local edits that must
  survive the merge.
- <source> is the upstream copy. It may contain new upstream work the local
  copy has not seen yet.

Produce a single merged file that keeps the intent of both sides.

Rules:
- Preserve every deliberate local change unless the upstream version clearly
  supersedes it.
- Integrate upstream additions and fixes even when they touch the same region
  as a local edit; reconcile rather than pick a side.
- Never emit conflict markers (`<<<<<<<`, `=======`, `>>>>>>>`).
- Keep formatting, imports, and ordering consistent with the file itself, not
  with your own preferences.
- If the two versions are irreconcilable, prefer the local behavior and carry
  the upstream change as close as correctness allows.

Respond with the complete merged file content and nothing else: no
commentary, no surrounding code fences unless the file itself starts with
them.
</mainInstruction>
"#;
