//! Remote directory planning.
//!
//! Every directory an upload lands in is created once, in the order it is
//! first needed, before the upload queue starts.

use std::collections::HashSet;

use crate::resolve::remote_parent;
use crate::transfer::job::UploadJob;

/// Unique parent directories of `targets`, in first-seen order.
pub fn plan<S: AsRef<str>>(targets: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut directories = Vec::new();

    for target in targets {
        if let Some(parent) = remote_parent(target.as_ref()) {
            if seen.insert(parent.to_string()) {
                directories.push(parent.to_string());
            }
        }
    }

    directories
}

/// Directories needed by a batch of jobs.
pub fn plan_for_jobs(jobs: &[UploadJob]) -> Vec<String> {
    let targets: Vec<&str> = jobs.iter().map(|job| job.target()).collect();
    plan(&targets)
}
