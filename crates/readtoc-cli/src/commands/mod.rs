pub mod send;
pub mod serve;
pub mod simulate;

use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};

use readtoc_core::MemoryDocument;

/// Read a page fixture from disk
pub fn load_page(path: &Path) -> Result<Rc<MemoryDocument>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read page fixture {}", path.display()))?;
    let doc = MemoryDocument::from_json(&json)
        .with_context(|| format!("Invalid page fixture {}", path.display()))?;
    Ok(Rc::new(doc))
}
