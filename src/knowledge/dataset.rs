//! Dataset sources for the knowledge base.
//!
//! A dataset is a JSON array of `{ "keywords": [...], "response": "..." }`
//! objects, read from a local file or fetched over HTTP(S).

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::KnowledgeEntry;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("failed to fetch {0}: {1}")]
    Fetch(String, String),
    #[error("{0} is not a valid JSON array of entries: {1}")]
    Parse(String, String),
}

/// Where a dataset is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    File(PathBuf),
    Url(String),
}

impl DatasetSource {
    /// `http://` and `https://` strings are URLs; anything else is a path.
    pub fn parse(source: &str) -> Self {
        if source.starts_with("http://") || source.starts_with("https://") {
            DatasetSource::Url(source.to_string())
        } else {
            DatasetSource::File(PathBuf::from(source))
        }
    }

    /// Read and decode the dataset.
    pub async fn fetch(&self) -> Result<Vec<KnowledgeEntry>, DatasetError> {
        let body = match self {
            DatasetSource::File(path) => match tokio::fs::read_to_string(path).await {
                Ok(body) => body,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(DatasetError::NotFound(self.to_string()));
                }
                Err(e) => return Err(DatasetError::Fetch(self.to_string(), e.to_string())),
            },
            DatasetSource::Url(url) => fetch_url(url).await?,
        };

        serde_json::from_str(&body).map_err(|e| DatasetError::Parse(self.to_string(), e.to_string()))
    }
}

impl fmt::Display for DatasetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetSource::File(path) => write!(f, "{}", path.display()),
            DatasetSource::Url(url) => f.write_str(url),
        }
    }
}

async fn fetch_url(url: &str) -> Result<String, DatasetError> {
    let fetch_err = |e: reqwest::Error| DatasetError::Fetch(url.to_string(), e.to_string());

    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(fetch_err)?;

    let response = client.get(url).send().await.map_err(fetch_err)?;
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(DatasetError::NotFound(url.to_string()));
    }
    if !status.is_success() {
        return Err(DatasetError::Fetch(url.to_string(), format!("HTTP {status}")));
    }
    response.text().await.map_err(fetch_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_distinguishes_urls_and_paths() {
        assert_eq!(
            DatasetSource::parse("https://cdn.example.com/db.json"),
            DatasetSource::Url("https://cdn.example.com/db.json".into())
        );
        assert_eq!(
            DatasetSource::parse("data/default-database.json"),
            DatasetSource::File(PathBuf::from("data/default-database.json"))
        );
    }

    #[tokio::test]
    async fn reads_entries_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"[{{"keywords":["fever"],"response":"R1"}}]"#).unwrap();
        let entries = DatasetSource::File(f.path().to_path_buf()).fetch().await.unwrap();
        assert_eq!(entries, vec![KnowledgeEntry { keywords: vec!["fever".into()], response: "R1".into() }]);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = DatasetSource::parse("/nonexistent/user-database.json").fetch().await.unwrap_err();
        assert!(matches!(err, DatasetError::NotFound(_)));
    }

    #[tokio::test]
    async fn wrong_shape_is_parse_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"keywords":["fever"]}}"#).unwrap();
        let err = DatasetSource::File(f.path().to_path_buf()).fetch().await.unwrap_err();
        assert!(matches!(err, DatasetError::Parse(..)));
    }

    #[tokio::test]
    async fn unreachable_url_is_fetch_error() {
        let err = DatasetSource::parse("http://127.0.0.1:9/db.json").fetch().await.unwrap_err();
        assert!(matches!(err, DatasetError::Fetch(..)));
    }
}
