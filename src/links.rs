use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::LinkFileError;
use crate::models::LinkRecord;

/// Reads a link file: one `<url> <file_name>` pair per line, blank lines ignored.
///
/// Repeated records are dropped; the first occurrence keeps its position.
pub fn load_links(path: &Path) -> Result<Vec<LinkRecord>, LinkFileError> {
    let content = fs::read_to_string(path).map_err(|source| LinkFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_links(&content, path)
}

pub fn parse_links(content: &str, source: &Path) -> Result<Vec<LinkRecord>, LinkFileError> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let record = match fields.as_slice() {
            [] => continue,
            [url, file_name] => LinkRecord::new(*url, *file_name),
            _ => {
                return Err(LinkFileError::InvalidStructure {
                    path: source.to_path_buf(),
                    line: idx + 1,
                });
            }
        };

        if seen.insert(record.clone()) {
            links.push(record);
        } else {
            debug!(line = idx + 1, url = %record.url, "skipping duplicate link");
        }
    }

    Ok(links)
}
