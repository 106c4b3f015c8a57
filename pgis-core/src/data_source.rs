//! Descriptors for raw data files that travel into and out of the database.
//!
//! A [`DataSource`] names the table a file is loaded into and the folders it
//! is read from and written to. Downloading and deleting the files is the job
//! of the I/O crate; this module only decides where they live.

use camino::{Utf8Path, Utf8PathBuf};
use url::Url;

use crate::{Epsg, Identifier};

/// Folder names used below a project root.
pub const INBOX: &str = "inbox";
/// See [`INBOX`].
pub const OUTBOX: &str = "outbox";

/// The pair of folders data is staged in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFolders {
    /// Files waiting to be loaded into the database.
    pub inbox: Utf8PathBuf,
    /// Files exported from the database.
    pub outbox: Utf8PathBuf,
}

impl DataFolders {
    /// `{root}/inbox` and `{root}/outbox`.
    #[must_use]
    pub fn under(root: &Utf8Path) -> Self {
        Self {
            inbox: root.join(INBOX),
            outbox: root.join(OUTBOX),
        }
    }
}

/// A raw data file tied to a database table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSource {
    table_name: Identifier,
    data_type: String,
    url: Option<Url>,
    epsg: Option<Epsg>,
    zipped: bool,
    import_folder: Utf8PathBuf,
    export_folder: Utf8PathBuf,
}

impl DataSource {
    /// Describe a file of type `data_type` (its extension) for `table_name`.
    ///
    /// The import and export folders default to `{inbox}/{table}` and
    /// `{outbox}/{table}`.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use pgis_core::{DataFolders, DataSource, Identifier};
    ///
    /// # fn main() -> Result<(), pgis_core::IdentifierError> {
    /// let folders = DataFolders::under(Utf8Path::new("/data"));
    /// let source = DataSource::new(Identifier::new("covid_2020_06_10")?, "csv", &folders);
    /// assert_eq!(
    ///     source.filepath_import(),
    ///     "/data/inbox/covid_2020_06_10/covid_2020_06_10.csv"
    /// );
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn new(
        table_name: Identifier,
        data_type: impl Into<String>,
        folders: &DataFolders,
    ) -> Self {
        let import_folder = folders.inbox.join(table_name.as_str());
        let export_folder = folders.outbox.join(table_name.as_str());
        Self {
            table_name,
            data_type: data_type.into(),
            url: None,
            epsg: None,
            zipped: false,
            import_folder,
            export_folder,
        }
    }

    /// Download location.
    #[must_use]
    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    /// Coordinate reference system of the source file.
    #[must_use]
    pub const fn with_epsg(mut self, epsg: Epsg) -> Self {
        self.epsg = Some(epsg);
        self
    }

    /// Whether the download is a zip archive to be extracted.
    #[must_use]
    pub const fn with_zip_archive(mut self, zipped: bool) -> Self {
        self.zipped = zipped;
        self
    }

    /// Read from `{root}/inbox/{table}` instead of the default inbox.
    #[must_use]
    pub fn with_import_root(mut self, root: &Utf8Path) -> Self {
        self.import_folder = root.join(INBOX).join(self.table_name.as_str());
        self
    }

    /// Write to `{root}/outbox/{table}` instead of the default outbox.
    #[must_use]
    pub fn with_export_root(mut self, root: &Utf8Path) -> Self {
        self.export_folder = root.join(OUTBOX).join(self.table_name.as_str());
        self
    }

    /// Table the file is loaded into.
    #[must_use]
    pub const fn table_name(&self) -> &Identifier {
        &self.table_name
    }

    /// File extension.
    #[must_use]
    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    /// Download location, if any.
    #[must_use]
    pub const fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Source CRS, if known.
    #[must_use]
    pub const fn epsg(&self) -> Option<Epsg> {
        self.epsg
    }

    /// Whether downloads are zip archives.
    #[must_use]
    pub const fn is_zipped(&self) -> bool {
        self.zipped
    }

    /// Folder the file is loaded from.
    #[must_use]
    pub fn import_folder(&self) -> &Utf8Path {
        &self.import_folder
    }

    /// Folder exports are written to.
    #[must_use]
    pub fn export_folder(&self) -> &Utf8Path {
        &self.export_folder
    }

    /// `{import_folder}/{table}.{data_type}`
    #[must_use]
    pub fn filepath_import(&self) -> Utf8PathBuf {
        self.import_folder.join(self.file_name())
    }

    /// `{export_folder}/{table}.{data_type}`
    #[must_use]
    pub fn filepath_export(&self) -> Utf8PathBuf {
        self.export_folder.join(self.file_name())
    }

    fn file_name(&self) -> String {
        format!("{}.{}", self.table_name, self.data_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn folders() -> DataFolders {
        DataFolders::under(Utf8Path::new("/home/me/.pgis/data"))
    }

    #[fixture]
    fn shapefile(folders: DataFolders) -> DataSource {
        let table = Identifier::new("high_injury_network_2017").expect("valid table name");
        DataSource::new(table, "shp", &folders)
    }

    #[rstest]
    fn defaults_to_shared_inbox_and_outbox(shapefile: DataSource) {
        assert_eq!(
            shapefile.import_folder(),
            "/home/me/.pgis/data/inbox/high_injury_network_2017"
        );
        assert_eq!(
            shapefile.filepath_export(),
            "/home/me/.pgis/data/outbox/high_injury_network_2017/high_injury_network_2017.shp"
        );
    }

    #[rstest]
    fn project_roots_override_each_folder(shapefile: DataSource) {
        let source = shapefile
            .with_import_root(Utf8Path::new("/projects/vz"))
            .with_export_root(Utf8Path::new("/exports"));
        assert_eq!(
            source.filepath_import(),
            "/projects/vz/inbox/high_injury_network_2017/high_injury_network_2017.shp"
        );
        assert_eq!(
            source.export_folder(),
            "/exports/outbox/high_injury_network_2017"
        );
    }

    #[rstest]
    fn builder_records_download_details(shapefile: DataSource) {
        let url = Url::parse("https://phl.carto.com/api/v2/sql?format=shp").expect("valid url");
        let source = shapefile
            .with_url(url.clone())
            .with_epsg(Epsg(2272))
            .with_zip_archive(true);
        assert_eq!(source.url(), Some(&url));
        assert_eq!(source.epsg(), Some(Epsg(2272)));
        assert!(source.is_zipped());
    }
}
