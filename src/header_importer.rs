//! Contract for the C-header importer external collaborator. Invoked
//! only when a system `#include` misses every search path. A missing
//! importer degrades to "unresolved include", never fatal.

use std::path::PathBuf;

/// Given a system header name and the configured include search
/// paths, returns SafeC extern-declaration text to splice into the
/// preprocessed source at the `#include` site, or `None` if the
/// header cannot be imported.
pub trait HeaderImporter {
    fn import_header(&self, header_name: &str, search_paths: &[PathBuf]) -> Option<String>;
}

/// Default collaborator: always reports that the header cannot be
/// resolved, matching the "a missing importer is not fatal" policy.
pub struct NoHeaderImporter;

impl HeaderImporter for NoHeaderImporter {
    fn import_header(&self, _header_name: &str, _search_paths: &[PathBuf]) -> Option<String> {
        None
    }
}

/// A fixed-table importer useful for tests and for embedding tools
/// that want to splice a small set of known extern declarations
/// without shelling out to a real C front end.
pub struct TableHeaderImporter {
    table: Vec<(String, String)>,
}

impl TableHeaderImporter {
    pub fn new(table: Vec<(String, String)>) -> Self {
        TableHeaderImporter { table }
    }
}

impl HeaderImporter for TableHeaderImporter {
    fn import_header(&self, header_name: &str, _search_paths: &[PathBuf]) -> Option<String> {
        self.table
            .iter()
            .find(|(name, _)| name == header_name)
            .map(|(_, text)| text.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_header_importer_always_misses() {
        let importer = NoHeaderImporter;
        assert!(importer.import_header("stdio.h", &[]).is_none());
    }

    #[test]
    fn table_importer_returns_registered_entries() {
        let importer = TableHeaderImporter::new(vec![(
            "stdio.h".to_string(),
            "extern int printf(&static char fmt, ...);".to_string(),
        )]);
        assert!(importer.import_header("stdio.h", &[]).is_some());
        assert!(importer.import_header("unknown.h", &[]).is_none());
    }
}
