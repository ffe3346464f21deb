use std::error::Error;
use std::path::Path;

use cw_core::{SessionConfig, SessionContext};
use serde::Serialize;

pub mod analyse;
pub mod ledger;
pub mod simulate;

/// Pretty JSON on stdout; logs go to stderr.
pub fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Session rooted at the folder holding `document`.
pub fn session_for(config: &Path, document: &Path) -> Result<SessionContext, Box<dyn Error>> {
    let config = SessionConfig::load(config)?;
    let folder = document
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    Ok(SessionContext::new("cw-sim", folder, config))
}
