// SPDX-License-Identifier: AGPL-3.0

//! The query store: every rendered query saved as `<sha224>.smt2`.

use crate::adapter::SmtScript;
use cpex_exceptions::{SetupError, SetupResult};
use sha2::{Digest, Sha224};
use std::path::{Path, PathBuf};

/// Directory of serialised queries. The directory must already exist; a
/// missing store is a configuration error caught at startup.
#[derive(Debug, Clone)]
pub struct QueryStore {
    dir: PathBuf,
}

impl QueryStore {
    pub fn open(dir: &Path) -> SetupResult<Self> {
        if !dir.is_dir() {
            return Err(SetupError::QueryStoreMissing(dir.display().to_string()));
        }
        Ok(QueryStore {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a script: SHA-224 of its query formula.
    pub fn file_name(script: &SmtScript) -> String {
        let digest = Sha224::digest(script.query_text.as_bytes());
        format!("{:x}.smt2", digest)
    }

    /// Persist the script. Failures are logged, never fatal: the store is
    /// an audit trail, not part of the exploration loop.
    pub fn save(&self, script: &SmtScript) {
        let path = self.dir.join(Self::file_name(script));
        cpex_logs::debug(&format!("Writing query to {}", path.display()));
        if let Err(error) = std::fs::write(&path, &script.text) {
            cpex_logs::warn(
                &format!("Failed to write query {}: {}", path.display(), error),
                true,
            );
        }
    }
}
