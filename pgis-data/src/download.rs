//! Fetching raw data files into their import folders.

use std::io::{self, Cursor, Read};
use std::time::Duration;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use pgis_core::DataSource;
use reqwest::Client;
use reqwest::header::USER_AGENT;
use url::Url;
use zip::ZipArchive;

use crate::DownloadError;

/// User agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = "pgis/0.1";

/// Something that can turn a URL into bytes.
#[async_trait(?Send)]
pub trait DataFetcher {
    /// Fetch the full body behind `url`.
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, DownloadError>;
}

/// HTTP implementation of [`DataFetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    user_agent: String,
}

impl HttpFetcher {
    /// Build a client with a 30 second connect timeout.
    pub fn new() -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(DownloadError::Client)?;
        Ok(Self {
            client,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        })
    }

    /// Override the default user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[async_trait(?Send)]
impl DataFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, DownloadError> {
        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, self.user_agent.as_str())
            .send()
            .await
            .map_err(|err| convert_reqwest_error(err, url))?
            .error_for_status()
            .map_err(|err| convert_reqwest_error(err, url))?;
        let body = response
            .bytes()
            .await
            .map_err(|err| convert_reqwest_error(err, url))?;
        Ok(body.to_vec())
    }
}

fn convert_reqwest_error(error: reqwest::Error, url: &Url) -> DownloadError {
    if let Some(status) = error.status() {
        return DownloadError::Http {
            url: url.to_string(),
            status: status.as_u16(),
            message: error.to_string(),
        };
    }

    let kind = if error.is_timeout() {
        io::ErrorKind::TimedOut
    } else {
        io::ErrorKind::Other
    };
    DownloadError::Network {
        url: url.to_string(),
        source: io::Error::new(kind, error),
    }
}

/// Download `source` into `output_folder`, or its import folder by default.
///
/// Zip archives are extracted into the folder and the folder is returned;
/// anything else is written as `{table}.{data_type}` and that file is
/// returned. Sources without a URL are skipped with `Ok(None)`.
pub async fn download_data(
    source: &DataSource,
    fetcher: &dyn DataFetcher,
    output_folder: Option<&Utf8Path>,
) -> Result<Option<Utf8PathBuf>, DownloadError> {
    let Some(url) = source.url() else {
        log::warn!("{} does not have a URL", source.table_name());
        return Ok(None);
    };
    let folder = output_folder.unwrap_or_else(|| source.import_folder());
    pgis_fs::ensure_dir(folder).map_err(|err| write_error(folder, err))?;

    log::info!("Downloading {url} into {folder}");
    let body = fetcher.fetch(url).await?;

    if source.is_zipped() {
        extract_archive(url, body, folder)?;
        Ok(Some(folder.to_path_buf()))
    } else {
        let path = folder.join(format!("{}.{}", source.table_name(), source.data_type()));
        pgis_fs::write_file(&path, body).map_err(|err| write_error(&path, err))?;
        Ok(Some(path))
    }
}

fn write_error(path: &Utf8Path, source: io::Error) -> DownloadError {
    DownloadError::Write {
        path: path.to_path_buf(),
        source,
    }
}

/// Unpack every file of a zip archive below `folder`.
///
/// Entries with absolute paths or `..` components are refused.
fn extract_archive(url: &Url, body: Vec<u8>, folder: &Utf8Path) -> Result<(), DownloadError> {
    let archive_error = |source| DownloadError::Archive {
        url: url.to_string(),
        source,
    };
    let mut archive = ZipArchive::new(Cursor::new(body)).map_err(archive_error)?;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(archive_error)?;
        let relative = entry
            .enclosed_name()
            .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
            .ok_or_else(|| DownloadError::UnsafeEntry {
                url: url.to_string(),
                entry: entry.name().to_owned(),
            })?;
        let target = folder.join(relative);
        if entry.is_dir() {
            pgis_fs::ensure_dir(&target).map_err(|err| write_error(&target, err))?;
            continue;
        }
        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .map_err(|err| write_error(&target, err))?;
        pgis_fs::write_file(&target, contents).map_err(|err| write_error(&target, err))?;
    }
    Ok(())
}

/// Delete the import and export folders of `source` and their files.
///
/// Returns how many of the two folders existed.
pub fn flush_data(source: &DataSource) -> Result<usize, DownloadError> {
    let mut flushed = 0;
    for folder in [source.import_folder(), source.export_folder()] {
        if pgis_fs::flush_folder(folder).map_err(|err| write_error(folder, err))? {
            log::info!("Deleted {folder}");
            flushed += 1;
        }
    }
    Ok(flushed)
}

/// In-memory fetchers for tests.
pub mod test_support {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use async_trait::async_trait;
    use url::Url;

    use super::DataFetcher;
    use crate::DownloadError;

    /// Serves canned bodies and records every requested URL.
    #[derive(Debug, Default)]
    pub struct StubFetcher {
        bodies: HashMap<String, Vec<u8>>,
        requests: RefCell<Vec<String>>,
    }

    impl StubFetcher {
        /// Serve `body` for `url`.
        #[must_use]
        pub fn with_body(mut self, url: &Url, body: impl Into<Vec<u8>>) -> Self {
            self.bodies.insert(url.to_string(), body.into());
            self
        }

        /// URLs requested so far, in order.
        #[must_use]
        pub fn requests(&self) -> Vec<String> {
            self.requests.borrow().clone()
        }
    }

    #[async_trait(?Send)]
    impl DataFetcher for StubFetcher {
        async fn fetch(&self, url: &Url) -> Result<Vec<u8>, DownloadError> {
            self.requests.borrow_mut().push(url.to_string());
            self.bodies
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| DownloadError::Http {
                    url: url.to_string(),
                    status: 404,
                    message: String::from("not found"),
                })
        }
    }

    /// Build a zip archive holding `files` as `(name, contents)` pairs.
    ///
    /// # Errors
    ///
    /// Fails only if the zip writer rejects a name.
    pub fn zip_archive(files: &[(&str, &str)]) -> Result<Vec<u8>, zip::result::ZipError> {
        use std::io::{Cursor, Write};

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, contents) in files {
            writer.start_file(*name, zip::write::SimpleFileOptions::default())?;
            writer.write_all(contents.as_bytes())?;
        }
        Ok(writer.finish()?.into_inner())
    }
}
