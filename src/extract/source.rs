use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use scraper::Html;
use thiserror::Error;

use super::CountryCode;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("no source page for country {code}")]
    NotFound { code: CountryCode },

    #[error("failed to read source page {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Yields the parsed page describing one origin country.
pub trait DocumentSource {
    fn fetch(&self, origin: &CountryCode) -> Result<Html, SourceError>;
}

/// Pages saved on disk as `<pages_dir>/<CODE>.html`, unless an inventory
/// supplied a different filename for the code.
#[derive(Debug, Clone)]
pub struct PageCache {
    pages_dir: PathBuf,
    filenames: HashMap<CountryCode, String>,
}

impl PageCache {
    pub fn new(pages_dir: impl Into<PathBuf>) -> Self {
        Self {
            pages_dir: pages_dir.into(),
            filenames: HashMap::new(),
        }
    }

    pub fn with_filenames<I>(mut self, filenames: I) -> Self
    where
        I: IntoIterator<Item = (CountryCode, String)>,
    {
        self.filenames.extend(filenames);
        self
    }

    pub fn page_path(&self, code: &CountryCode) -> PathBuf {
        match self.filenames.get(code) {
            Some(filename) => self.pages_dir.join(filename),
            None => self.pages_dir.join(format!("{code}.html")),
        }
    }
}

impl DocumentSource for PageCache {
    fn fetch(&self, origin: &CountryCode) -> Result<Html, SourceError> {
        let path = self.page_path(origin);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(SourceError::NotFound {
                    code: origin.clone(),
                });
            }
            Err(source) => return Err(SourceError::Read { path, source }),
        };

        Ok(Html::parse_document(&raw))
    }
}
