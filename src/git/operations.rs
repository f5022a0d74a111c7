//! Git operations for the MCP tool handlers

use chrono::DateTime;
use git2::{
    Commit, Diff, DiffFormat, DiffOptions, IndexAddOption, ObjectType, Repository, ResetType,
    Status, StatusOptions,
};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors related to git operations
#[derive(Debug, Error)]
pub enum GitError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),
    #[error("{0} is not a valid Git repository")]
    InvalidRepository(PathBuf),
    #[error("No HEAD commit found")]
    NoHead,
}

/// Git operations helper
pub struct GitOperations;

impl GitOperations {
    /// Check that a path is the root of a valid git repository
    pub fn validate_repository(path: &Path) -> Result<(), GitError> {
        Repository::open(path)
            .map(|_| ())
            .map_err(|_| GitError::InvalidRepository(path.to_path_buf()))
    }

    /// Open the repository at a path
    pub fn open(path: &Path) -> Result<Repository, GitError> {
        Repository::open(path).map_err(|_| GitError::InvalidRepository(path.to_path_buf()))
    }

    /// Initialize a new repository at a path, returning its git directory
    pub fn init(path: &Path) -> Result<String, GitError> {
        let repo = Repository::init(path)?;
        Ok(repo.path().display().to_string())
    }

    /// Working tree status, one entry per changed file
    pub fn status(path: &Path) -> Result<String, GitError> {
        let repo = Self::open(path)?;

        let branch = match repo.head() {
            Ok(head) => head.shorthand().unwrap_or("HEAD").to_string(),
            Err(_) => "HEAD (no commits yet)".to_string(),
        };

        let mut opts = StatusOptions::new();
        opts.include_untracked(true).recurse_untracked_dirs(true);
        let statuses = repo.statuses(Some(&mut opts))?;

        let mut out = format!("On branch {}\n", branch);
        if statuses.is_empty() {
            out.push_str("nothing to commit, working tree clean");
        } else {
            for entry in statuses.iter() {
                out.push_str(&format!(
                    "{} {}\n",
                    status_code(entry.status()),
                    entry.path().unwrap_or("(non-utf8 path)")
                ));
            }
        }
        Ok(out)
    }

    /// Diff of the working tree against the index
    pub fn diff_unstaged(path: &Path, context_lines: u32) -> Result<String, GitError> {
        let repo = Self::open(path)?;
        let mut opts = DiffOptions::new();
        opts.context_lines(context_lines);
        let diff = repo.diff_index_to_workdir(None, Some(&mut opts))?;
        diff_to_string(&diff)
    }

    /// Diff of the index against HEAD
    pub fn diff_staged(path: &Path, context_lines: u32) -> Result<String, GitError> {
        let repo = Self::open(path)?;
        let mut opts = DiffOptions::new();
        opts.context_lines(context_lines);
        let tree = match repo.head() {
            Ok(head) => Some(head.peel_to_tree()?),
            Err(_) => None,
        };
        let diff = repo.diff_tree_to_index(tree.as_ref(), None, Some(&mut opts))?;
        diff_to_string(&diff)
    }

    /// Diff of the working tree (with index) against an arbitrary revision
    pub fn diff(path: &Path, target: &str, context_lines: u32) -> Result<String, GitError> {
        let repo = Self::open(path)?;
        let mut opts = DiffOptions::new();
        opts.context_lines(context_lines);
        let tree = repo
            .revparse_single(target)?
            .peel(ObjectType::Tree)?
            .into_tree()
            .map_err(|_| GitError::Git(git2::Error::from_str("target is not a tree-ish")))?;
        let diff = repo.diff_tree_to_workdir_with_index(Some(&tree), Some(&mut opts))?;
        diff_to_string(&diff)
    }

    /// Stage files by pathspec
    pub fn add(path: &Path, files: &[String]) -> Result<(), GitError> {
        let repo = Self::open(path)?;
        let mut index = repo.index()?;
        index.add_all(
            files.iter().map(|f| f.as_str()),
            IndexAddOption::DEFAULT,
            None,
        )?;
        index.write()?;
        Ok(())
    }

    /// Unstage all changes (mixed reset of the index to HEAD)
    pub fn reset(path: &Path) -> Result<(), GitError> {
        let repo = Self::open(path)?;
        let head = repo
            .head()
            .map_err(|_| GitError::NoHead)?
            .peel(ObjectType::Commit)?;
        repo.reset(&head, ResetType::Mixed, None)?;
        Ok(())
    }

    /// Commit the current index, returning the new commit hash
    pub fn commit(path: &Path, message: &str) -> Result<String, GitError> {
        let repo = Self::open(path)?;
        let mut index = repo.index()?;
        let tree_id = index.write_tree()?;
        let tree = repo.find_tree(tree_id)?;
        let signature = repo.signature()?;

        let parent = match repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(_) => None,
        };
        let parents: Vec<&Commit> = parent.iter().collect();

        let oid = repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;
        Ok(oid.to_string())
    }

    /// Formatted commit history from HEAD, newest first
    pub fn log(path: &Path, max_count: usize) -> Result<Vec<String>, GitError> {
        let repo = Self::open(path)?;
        let mut revwalk = repo.revwalk()?;
        revwalk.push_head().map_err(|_| GitError::NoHead)?;

        let mut entries = Vec::new();
        for oid in revwalk.take(max_count) {
            let commit = repo.find_commit(oid?)?;
            entries.push(format_commit(&commit));
        }
        Ok(entries)
    }

    /// Create a branch from a base revision (HEAD when absent), returning the base commit hash
    pub fn create_branch(path: &Path, name: &str, base: Option<&str>) -> Result<String, GitError> {
        let repo = Self::open(path)?;
        let commit = match base {
            Some(rev) => repo
                .revparse_single(rev)?
                .peel(ObjectType::Commit)?
                .into_commit()
                .map_err(|_| GitError::Git(git2::Error::from_str("base is not a commit-ish")))?,
            None => repo.head().map_err(|_| GitError::NoHead)?.peel_to_commit()?,
        };
        let base_id = commit.id().to_string();
        repo.branch(name, &commit, false)?;
        Ok(base_id)
    }

    /// Check out a branch or revision
    pub fn checkout(path: &Path, branch: &str) -> Result<(), GitError> {
        let repo = Self::open(path)?;
        let (object, reference) = repo.revparse_ext(branch)?;
        repo.checkout_tree(&object, None)?;
        match reference {
            Some(r) => {
                let name = r.name().ok_or_else(|| {
                    GitError::Git(git2::Error::from_str("invalid reference name"))
                })?;
                repo.set_head(name)?;
            }
            None => repo.set_head_detached(object.id())?,
        }
        Ok(())
    }

    /// Commit metadata and patch for a revision
    pub fn show(path: &Path, revision: &str) -> Result<String, GitError> {
        let repo = Self::open(path)?;
        let commit = repo
            .revparse_single(revision)?
            .peel(ObjectType::Commit)?
            .into_commit()
            .map_err(|_| GitError::Git(git2::Error::from_str("revision is not a commit-ish")))?;

        let mut out = format_commit(&commit);
        out.push('\n');

        let parent_tree = if commit.parent_count() > 0 {
            Some(commit.parent(0)?.tree()?)
        } else {
            None
        };
        let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&commit.tree()?), None)?;
        out.push_str(&diff_to_string(&diff)?);
        Ok(out)
    }
}

/// Two-column short status code, `??` for untracked
fn status_code(status: Status) -> String {
    if status.contains(Status::WT_NEW) {
        return "??".to_string();
    }
    let index = if status.contains(Status::INDEX_NEW) {
        'A'
    } else if status.contains(Status::INDEX_MODIFIED) {
        'M'
    } else if status.contains(Status::INDEX_DELETED) {
        'D'
    } else if status.contains(Status::INDEX_RENAMED) {
        'R'
    } else if status.contains(Status::INDEX_TYPECHANGE) {
        'T'
    } else {
        ' '
    };
    let worktree = if status.contains(Status::WT_MODIFIED) {
        'M'
    } else if status.contains(Status::WT_DELETED) {
        'D'
    } else if status.contains(Status::WT_RENAMED) {
        'R'
    } else if status.contains(Status::WT_TYPECHANGE) {
        'T'
    } else {
        ' '
    };
    format!("{}{}", index, worktree)
}

fn diff_to_string(diff: &Diff) -> Result<String, GitError> {
    let mut out = String::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        match line.origin() {
            '+' | '-' | ' ' => out.push(line.origin()),
            _ => {}
        }
        out.push_str(&String::from_utf8_lossy(line.content()));
        true
    })?;
    Ok(out)
}

fn format_commit(commit: &Commit) -> String {
    let author = commit.author();
    let date = DateTime::from_timestamp(commit.time().seconds(), 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();
    format!(
        "Commit: {}\nAuthor: {} <{}>\nDate: {}\nMessage: {}\n",
        commit.id(),
        author.name().unwrap_or(""),
        author.email().unwrap_or(""),
        date,
        commit.message().unwrap_or("").trim()
    )
}
