#![allow(dead_code)]

pub(crate) use std::cell::{Cell, RefCell};
pub(crate) use std::collections::HashMap;
pub(crate) use std::path::{Path, PathBuf};

pub(crate) use tempfile::TempDir;

use git2::build::RepoBuilder;
use git2::{Commit, IndexAddOption, Repository, Signature};

use tributary_core::forge::{CreatedPr, Forge, PullRequestInfo};
use tributary_core::ingest::{DeletionChoice, DeletionPrompt};
use tributary_core::oracle::{MergeOracle, OracleError};
use tributary_kernel::tracker::{PathMapping, PrStatus};
use tributary_kernel::workflow::RepoGroup;

pub(crate) type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// A throwaway "remote" repository the engine dials by filesystem path.
pub(crate) struct RemoteRepo {
    tempdir: TempDir,
    repo: Repository,
    path_utf8: String,
}

impl RemoteRepo {
    pub(crate) fn new() -> Self {
        let tempdir = TempDir::new().expect("remote tempdir");
        let repo = Repository::init(tempdir.path()).expect("init remote repo");
        let _ = repo.config().and_then(|mut c| {
            c.set_str("user.name", "Tester")?;
            c.set_str("user.email", "tester@example.com")
        });
        let path_utf8 = tempdir.path().to_str().expect("repo path utf8").to_string();
        Self {
            tempdir,
            repo,
            path_utf8,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        self.tempdir.path()
    }

    pub(crate) fn path_str(&self) -> &str {
        self.path_utf8.as_str()
    }

    pub(crate) fn write(&self, rel: &str, contents: &str) {
        let path = self.tempdir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    pub(crate) fn remove(&self, rel: &str) {
        std::fs::remove_file(self.tempdir.path().join(rel)).unwrap();
    }

    pub(crate) fn commit_all(&self, message: &str) -> String {
        let mut index = self.repo.index().unwrap();
        index.add_all(["."], IndexAddOption::DEFAULT, None).unwrap();
        index.update_all(["."], None).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("Tester", "tester@example.com").unwrap();
        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&Commit> = parent.as_ref().map(|p| vec![p]).unwrap_or_default();
        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
            .to_string()
    }

    pub(crate) fn branch(&self) -> String {
        self.repo.head().unwrap().shorthand().unwrap().to_string()
    }

    pub(crate) fn head_id(&self) -> String {
        self.repo
            .head()
            .unwrap()
            .peel_to_commit()
            .unwrap()
            .id()
            .to_string()
    }

    /// Bare clone, standing in for the operator's fork of this repo.
    pub(crate) fn bare_fork(&self) -> BareFork {
        let tempdir = TempDir::new().expect("fork tempdir");
        let path = tempdir.path().join("fork.git");
        RepoBuilder::new()
            .bare(true)
            .clone(self.path_str(), &path)
            .expect("bare fork clone");
        let path_utf8 = path.to_str().expect("fork path utf8").to_string();
        BareFork {
            _tempdir: tempdir,
            path,
            path_utf8,
        }
    }
}

pub(crate) struct BareFork {
    _tempdir: TempDir,
    path: PathBuf,
    path_utf8: String,
}

impl BareFork {
    pub(crate) fn path_str(&self) -> &str {
        self.path_utf8.as_str()
    }

    pub(crate) fn branch_tip(&self, branch: &str) -> Option<String> {
        let repo = Repository::open(&self.path).ok()?;
        repo.find_reference(&format!("refs/heads/{branch}"))
            .ok()?
            .peel_to_commit()
            .ok()
            .map(|commit| commit.id().to_string())
    }

    /// File contents at the tip of `branch`, None when absent from the tree.
    pub(crate) fn file_at(&self, branch: &str, rel: &str) -> Option<String> {
        let repo = Repository::open(&self.path).ok()?;
        let tree = repo
            .find_reference(&format!("refs/heads/{branch}"))
            .ok()?
            .peel_to_tree()
            .ok()?;
        let entry = tree.get_path(Path::new(rel)).ok()?;
        let blob = repo.find_blob(entry.id()).ok()?;
        Some(String::from_utf8_lossy(blob.content()).into_owned())
    }
}

pub(crate) struct Workspace {
    tempdir: TempDir,
}

impl Workspace {
    pub(crate) fn new() -> Self {
        Self {
            tempdir: TempDir::new().expect("workspace tempdir"),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        self.tempdir.path()
    }

    pub(crate) fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.tempdir.path().join(rel)).unwrap()
    }

    pub(crate) fn write(&self, rel: &str, contents: &str) {
        let path = self.tempdir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    pub(crate) fn delete(&self, rel: &str) {
        std::fs::remove_file(self.tempdir.path().join(rel)).unwrap();
    }

    pub(crate) fn exists(&self, rel: &str) -> bool {
        self.tempdir.path().join(rel).exists()
    }
}

pub(crate) fn repo_group(remote: &RemoteRepo, mappings: &[(&str, &str)]) -> RepoGroup {
    RepoGroup {
        repo: remote.path_str().to_string(),
        branch: remote.branch(),
        sync: true,
        force: false,
        fork_repo: None,
        files: mappings
            .iter()
            .map(|(source, local)| PathMapping {
                source: source.to_string(),
                local: local.to_string(),
            })
            .collect(),
        model: None,
        api_key_env: None,
    }
}

/// Predictable merge oracle: tags and concatenates its inputs, recording
/// every call.
#[derive(Default)]
pub(crate) struct SyntheticOracle {
    pub(crate) calls: RefCell<Vec<(String, String)>>,
}

impl SyntheticOracle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn merged_output(local: &str, source: &str) -> String {
        format!("<<merged>>\n{local}\n---\n{source}\n")
    }
}

impl MergeOracle for SyntheticOracle {
    fn merge(&self, local: &str, source: &str) -> Result<String, OracleError> {
        self.calls
            .borrow_mut()
            .push((local.to_string(), source.to_string()));
        Ok(Self::merged_output(local, source))
    }
}

pub(crate) struct FailingOracle;

impl MergeOracle for FailingOracle {
    fn merge(&self, _local: &str, _source: &str) -> Result<String, OracleError> {
        Err(OracleError::Empty)
    }
}

/// Deletion prompt that always answers the same way and records what it was
/// asked about.
pub(crate) struct ScriptedPrompt {
    pub(crate) choice: DeletionChoice,
    pub(crate) asked: RefCell<Vec<Vec<String>>>,
}

impl ScriptedPrompt {
    pub(crate) fn new(choice: DeletionChoice) -> Self {
        Self {
            choice,
            asked: RefCell::new(Vec::new()),
        }
    }
}

impl DeletionPrompt for ScriptedPrompt {
    fn choose(&self, _repo: &str, candidates: &[String]) -> DeletionChoice {
        self.asked.borrow_mut().push(candidates.to_vec());
        self.choice.clone()
    }
}

/// In-memory forge: answers status queries from a scripted table and records
/// every PR it is asked to open.
#[derive(Default)]
pub(crate) struct RecordingForge {
    pub(crate) statuses: RefCell<HashMap<u64, PullRequestInfo>>,
    pub(crate) opened: RefCell<Vec<OpenedPr>>,
    next_number: Cell<u64>,
}

#[derive(Clone, Debug)]
pub(crate) struct OpenedPr {
    pub(crate) source_repo: String,
    pub(crate) head: String,
    pub(crate) title: String,
    pub(crate) body: String,
    pub(crate) number: u64,
}

impl RecordingForge {
    pub(crate) fn new() -> Self {
        Self {
            statuses: RefCell::new(HashMap::new()),
            opened: RefCell::new(Vec::new()),
            next_number: Cell::new(1),
        }
    }

    pub(crate) fn set_status(&self, number: u64, branch: &str, status: PrStatus) {
        self.statuses.borrow_mut().insert(
            number,
            PullRequestInfo {
                number,
                branch: branch.to_string(),
                status,
                updated_at: "2026-08-01T00:00:00Z".to_string(),
                url: format!("https://example.test/pull/{number}"),
            },
        );
    }
}

impl Forge for RecordingForge {
    fn preflight(&self) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }

    fn pr_status(
        &self,
        _source_repo: &str,
        number: u64,
    ) -> Result<Option<PullRequestInfo>, Box<dyn std::error::Error>> {
        Ok(self.statuses.borrow().get(&number).cloned())
    }

    fn find_open_pr(
        &self,
        _source_repo: &str,
        _head: &str,
    ) -> Result<Option<PullRequestInfo>, Box<dyn std::error::Error>> {
        Ok(None)
    }

    fn open_pr(
        &self,
        source_repo: &str,
        head: &str,
        title: &str,
        body: &str,
    ) -> Result<CreatedPr, Box<dyn std::error::Error>> {
        let number = self.next_number.get();
        self.next_number.set(number + 1);
        self.opened.borrow_mut().push(OpenedPr {
            source_repo: source_repo.to_string(),
            head: head.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            number,
        });
        Ok(CreatedPr {
            number,
            url: format!("https://example.test/pull/{number}"),
        })
    }
}
