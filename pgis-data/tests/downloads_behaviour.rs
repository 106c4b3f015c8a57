//! Behavioural tests for raw data downloads using rstest-bdd.

use std::cell::RefCell;

use camino::Utf8PathBuf;
use pgis_core::{DataFolders, DataSource, Epsg, Identifier};
use pgis_data::download::test_support::{StubFetcher, zip_archive};
use pgis_data::{download_data, flush_data};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;
use url::Url;

const HIN_URL: &str =
    "https://phl.carto.com/api/v2/sql?q=SELECT+*+FROM+high_injury_network_2017&format=shp";

struct DownloadWorld {
    _dir: TempDir,
    folders: DataFolders,
    source: RefCell<Option<DataSource>>,
    fetcher: RefCell<StubFetcher>,
    written: RefCell<Option<Utf8PathBuf>>,
}

impl DownloadWorld {
    fn source(&self) -> DataSource {
        self.source
            .borrow()
            .clone()
            .expect("a source should be configured")
    }
}

#[fixture]
fn world() -> DownloadWorld {
    let dir = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir");
    DownloadWorld {
        folders: DataFolders::under(&root),
        _dir: dir,
        source: RefCell::new(None),
        fetcher: RefCell::new(StubFetcher::default()),
        written: RefCell::new(None),
    }
}

#[given("a zipped shapefile source for high_injury_network_2017")]
fn given_zipped(world: &DownloadWorld) {
    let url = Url::parse(HIN_URL).expect("valid url");
    let archive = zip_archive(&[
        ("high_injury_network_2017.shp", "shape"),
        ("high_injury_network_2017.dbf", "attributes"),
        ("high_injury_network_2017.prj", "projection"),
    ])
    .expect("archive builds");
    world
        .fetcher
        .replace(StubFetcher::default().with_body(&url, archive));
    let table = Identifier::new("high_injury_network_2017").expect("valid name");
    let source = DataSource::new(table, "shp", &world.folders)
        .with_url(url)
        .with_epsg(Epsg(2272))
        .with_zip_archive(true);
    world.source.replace(Some(source));
}

#[given("a csv source without a URL")]
fn given_no_url(world: &DownloadWorld) {
    let table = Identifier::new("covid_2020_06_10").expect("valid name");
    world
        .source
        .replace(Some(DataSource::new(table, "csv", &world.folders)));
}

#[when("I download the source")]
fn download(world: &DownloadWorld) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime builds");
    let source = world.source();
    let fetcher = world.fetcher.borrow();
    let written = runtime
        .block_on(download_data(&source, &*fetcher, None))
        .expect("download succeeds");
    world.written.replace(written);
}

#[when("I flush the source")]
fn flush(world: &DownloadWorld) {
    flush_data(&world.source()).expect("flush succeeds");
}

#[then("the import folder holds the shapefile parts")]
fn then_parts(world: &DownloadWorld) {
    let folder = world.source().import_folder().to_path_buf();
    for extension in ["shp", "dbf", "prj"] {
        let part = folder.join(format!("high_injury_network_2017.{extension}"));
        assert!(pgis_fs::is_file(&part).expect("stat part"), "missing {part}");
    }
}

#[then("the download returned the import folder")]
fn then_returned_folder(world: &DownloadWorld) {
    let source = world.source();
    assert_eq!(
        world.written.borrow().as_deref(),
        Some(source.import_folder())
    );
}

#[then("nothing was fetched")]
fn then_nothing_fetched(world: &DownloadWorld) {
    assert!(world.fetcher.borrow().requests().is_empty());
    assert!(world.written.borrow().is_none());
}

#[then("the import folder does not exist")]
fn then_no_folder(world: &DownloadWorld) {
    assert!(!pgis_fs::is_dir(world.source().import_folder()).expect("stat folder"));
}

#[scenario(path = "tests/features/downloads.feature", index = 0)]
fn zipped_download_unpacks(world: DownloadWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/downloads.feature", index = 1)]
fn missing_url_is_skipped(world: DownloadWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/downloads.feature", index = 2)]
fn flush_removes_data(world: DownloadWorld) {
    let _ = world;
}
