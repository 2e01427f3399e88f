use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

/// Schedule text from `file`, or from stdin when no file is given.
pub fn read_text(file: Option<&Path>) -> Result<String> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read schedule text from stdin")?;
            text
        }
    };

    if text.trim().is_empty() {
        anyhow::bail!("No schedule text given");
    }

    Ok(text)
}
