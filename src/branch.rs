//! Stable branch naming

use thiserror::Error;

/// Name of the development branch
pub const MAIN_BRANCH: &str = "master";

/// Version designator that is neither the main branch nor a number
#[derive(Error, Debug, PartialEq, Eq)]
#[error("Invalid version '{0}': expected 'master' or a number such as 31")]
pub struct InvalidVersion(pub String);

/// Map a version designator to its stable branch.
///
/// `master` maps to itself; a number `N` maps to `MOODLE_N_STABLE`.
pub fn stable_branch(version: &str) -> Result<String, InvalidVersion> {
    let version = version.trim();
    if version == MAIN_BRANCH {
        return Ok(MAIN_BRANCH.to_string());
    }

    let number: u32 = version
        .parse()
        .map_err(|_| InvalidVersion(version.to_string()))?;
    Ok(format!("MOODLE_{}_STABLE", number))
}
