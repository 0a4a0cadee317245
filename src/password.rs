//! Layered password resolution
//!
//! Archives (and archives nested inside them) may each carry their own
//! password. Resolution tries, in order: the password already known for
//! this archive file, every password that worked on any archive this
//! session, and finally a single interactive prompt.
//!
//! Success is judged by the caller-supplied attempt closure, which runs the
//! actual backend operation. The backing tools only signal a wrong password
//! through an empty listing or a failed extraction, so a protected archive
//! and a genuinely empty one are indistinguishable here; that ambiguity is
//! part of the backend contract and is deliberately not papered over.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Session-scoped password state, owned by the application and passed down
/// explicitly. Created empty at session start, discarded at session end;
/// nothing here is ever persisted.
#[derive(Debug, Default)]
pub struct SessionPasswords {
    /// Archive file path → password that successfully opened it.
    /// Entries are only added after a success and never removed.
    cache: HashMap<PathBuf, String>,
    /// Distinct non-empty passwords that ever worked, insertion order.
    pool: Vec<String>,
}

impl SessionPasswords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Password known to open `archive`, if any
    pub fn cached(&self, archive: &Path) -> Option<&str> {
        self.cache.get(archive).map(|s| s.as_str())
    }

    /// Record a password that just worked against `archive`
    pub fn remember(&mut self, archive: &Path, password: &str) {
        self.cache.insert(archive.to_path_buf(), password.to_string());
        if !password.is_empty() && !self.pool.iter().any(|p| p == password) {
            self.pool.push(password.to_string());
        }
    }

    /// Seed the session pool (e.g. from a --password argument)
    pub fn seed(&mut self, password: &str) {
        if !password.is_empty() && !self.pool.iter().any(|p| p == password) {
            self.pool.push(password.to_string());
        }
    }

    fn pool_snapshot(&self) -> Vec<String> {
        self.pool.clone()
    }
}

/// Reply from an interactive password prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptReply {
    /// A password was entered; the empty string means "try without one"
    Password(String),
    /// The prompt was dismissed; the whole operation must be aborted
    Cancelled,
}

/// Source of interactively entered passwords
pub trait PasswordPrompt {
    /// Ask once for a password; `context` names what is being unlocked
    fn ask(&mut self, context: &str) -> PromptReply;
}

/// Terminal outcome of one resolution run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The operation succeeded under this password
    Resolved(String),
    /// The user dismissed the prompt; no cache or pool mutation happened
    Cancelled,
    /// Cache, pool and one prompted password all failed; do not auto-retry
    Exhausted,
}

/// Run the layered resolution protocol for one archive-open attempt.
///
/// `attempt` must bind the candidate password to the backend, run the
/// operation (listing or extraction) and report whether it succeeded.
/// Passwords that work are recorded in the session state; a cancelled
/// prompt leaves it untouched.
pub fn resolve<F>(
    passwords: &mut SessionPasswords,
    prompt: &mut dyn PasswordPrompt,
    archive: &Path,
    mut attempt: F,
) -> Resolution
where
    F: FnMut(&str) -> bool,
{
    if let Some(cached) = passwords.cached(archive).map(|s| s.to_string()) {
        log::debug!("trying cached password for {}", archive.display());
        if attempt(&cached) {
            return Resolution::Resolved(cached);
        }
    }

    for candidate in passwords.pool_snapshot() {
        if attempt(&candidate) {
            log::debug!("session pool password worked for {}", archive.display());
            passwords.remember(archive, &candidate);
            return Resolution::Resolved(candidate);
        }
    }

    let context = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| archive.display().to_string());
    match prompt.ask(&context) {
        PromptReply::Cancelled => Resolution::Cancelled,
        PromptReply::Password(entered) => {
            if attempt(&entered) {
                passwords.remember(archive, &entered);
                Resolution::Resolved(entered)
            } else {
                log::debug!("prompted password failed for {}", archive.display());
                Resolution::Exhausted
            }
        }
    }
}
