use std::{
    collections::{BTreeSet, HashMap},
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use image::{Rgba, RgbaImage};
use tempfile::TempDir;

use super::{
    artifact::{CaptureKind, StagingArea},
    dependencies::{
        CaptureDependencies, ClipboardProvider, FileChooser, FlavorError, RegionSelector,
        ScreenGrabber,
    },
    source::CaptureSource,
    types::{CaptureError, Region},
};

#[derive(Clone)]
struct MockSelector {
    region: Option<Region>,
    calls: Arc<Mutex<usize>>,
}

impl RegionSelector for MockSelector {
    fn select(&self) -> Result<Option<Region>, CaptureError> {
        *self.calls.lock().unwrap() += 1;
        Ok(self.region)
    }
}

#[derive(Clone)]
struct MockGrabber {
    should_fail: bool,
    regions: Arc<Mutex<Vec<Option<Region>>>>,
}

impl ScreenGrabber for MockGrabber {
    fn grab(&self, region: Option<Region>) -> Result<RgbaImage, CaptureError> {
        self.regions.lock().unwrap().push(region);
        if self.should_fail {
            return Err(CaptureError::ScreenError("grab failed".to_string()));
        }
        let (w, h) = region.map(|r| (r.width, r.height)).unwrap_or((8, 6));
        Ok(RgbaImage::from_pixel(w, h, Rgba([0, 128, 255, 255])))
    }
}

#[derive(Clone)]
struct MockChooser {
    paths: Vec<PathBuf>,
    calls: Arc<Mutex<usize>>,
}

impl FileChooser for MockChooser {
    fn choose(&self) -> Result<Vec<PathBuf>, CaptureError> {
        *self.calls.lock().unwrap() += 1;
        Ok(self.paths.clone())
    }
}

/// Clipboard offering flavors in a fixed order; flavors without data fail to read.
#[derive(Clone, Default)]
struct MockClipboard {
    offered: Vec<String>,
    data: HashMap<String, Vec<u8>>,
    reads: Arc<Mutex<Vec<String>>>,
}

impl MockClipboard {
    fn offering(entries: &[(&str, Option<&[u8]>)]) -> Self {
        let mut clipboard = MockClipboard::default();
        for (flavor, data) in entries {
            clipboard.offered.push(flavor.to_string());
            if let Some(data) = data {
                clipboard.data.insert(flavor.to_string(), data.to_vec());
            }
        }
        clipboard
    }
}

impl ClipboardProvider for MockClipboard {
    fn flavors(&self) -> Result<Vec<String>, CaptureError> {
        Ok(self.offered.clone())
    }

    fn read(&self, flavor: &str) -> Result<Vec<u8>, FlavorError> {
        self.reads.lock().unwrap().push(flavor.to_string());
        self.data
            .get(flavor)
            .cloned()
            .ok_or_else(|| FlavorError::Unavailable(flavor.to_string()))
    }
}

struct Fixture {
    temp: TempDir,
    selector: MockSelector,
    grabber: MockGrabber,
    chooser: MockChooser,
    clipboard: MockClipboard,
}

impl Fixture {
    fn new() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
            selector: MockSelector {
                region: None,
                calls: Arc::new(Mutex::new(0)),
            },
            grabber: MockGrabber {
                should_fail: false,
                regions: Arc::new(Mutex::new(Vec::new())),
            },
            chooser: MockChooser {
                paths: Vec::new(),
                calls: Arc::new(Mutex::new(0)),
            },
            clipboard: MockClipboard::default(),
        }
    }

    fn staging_dir(&self) -> PathBuf {
        let dir = self.temp.path().join("staging");
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn source(&self) -> CaptureSource {
        let deps = CaptureDependencies {
            selector: Arc::new(self.selector.clone()),
            grabber: Arc::new(self.grabber.clone()),
            chooser: Arc::new(self.chooser.clone()),
            clipboard: Arc::new(self.clipboard.clone()),
        };
        CaptureSource::new(deps, StagingArea::new(self.staging_dir()))
    }

    fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.temp.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    fn staged_files(&self) -> Vec<PathBuf> {
        fs::read_dir(self.staging_dir())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }
}

fn png_dimensions(path: &Path) -> (u32, u32) {
    let bytes = fs::read(path).unwrap();
    image::load_from_memory_with_format(&bytes, image::ImageFormat::Png)
        .unwrap()
        .to_rgba8()
        .dimensions()
}

fn zip_entries(bundle: &Path) -> BTreeSet<String> {
    let archive = zip::ZipArchive::new(fs::File::open(bundle).unwrap()).unwrap();
    archive.file_names().map(str::to_string).collect()
}

#[test]
fn single_file_is_used_in_place() {
    let fixture = Fixture::new();
    let path = fixture.write("docs/report.txt", "report");

    let artifact = fixture.source().capture_files(vec![path.clone()]).unwrap();
    assert_eq!(artifact.path(), path);
    assert!(!artifact.is_temporary());
    assert!(fixture.staged_files().is_empty());

    artifact.discard();
    assert!(path.exists(), "direct references are never deleted");
}

#[test]
fn multiple_files_are_bundled() {
    let fixture = Fixture::new();
    let a = fixture.write("docs/a.txt", "a");
    let b = fixture.write("docs/sub/b.txt", "b");
    let c = fixture.write("docs/sub/deeper/c.txt", "c");
    let dir = fixture.temp.path().join("docs/sub");

    let artifact = fixture.source().capture_files(vec![a, dir]).unwrap();
    assert!(artifact.is_temporary());
    assert_eq!(artifact.kind(), Some(CaptureKind::Files));
    assert!(artifact.file_name().unwrap().ends_with(".zip.tmp"));

    let expected: BTreeSet<String> = ["a.txt", "sub/b.txt", "sub/deeper/c.txt"]
        .into_iter()
        .map(str::to_string)
        .collect();
    assert_eq!(zip_entries(artifact.path()), expected);
    assert!(b.exists() && c.exists());
}

#[test]
fn single_directory_is_bundled() {
    let fixture = Fixture::new();
    fixture.write("album/one.png", "1");
    fixture.write("album/two.png", "2");

    let artifact = fixture
        .source()
        .capture_files(vec![fixture.temp.path().join("album")])
        .unwrap();
    assert!(artifact.is_temporary());
    assert_eq!(
        zip_entries(artifact.path()),
        ["album/one.png", "album/two.png"]
            .into_iter()
            .map(str::to_string)
            .collect()
    );
}

#[test]
fn no_paths_is_a_cancellation() {
    let fixture = Fixture::new();
    let err = fixture.source().capture_files(Vec::new()).unwrap_err();
    assert!(err.is_cancelled(), "unexpected error: {err:?}");
}

#[test]
fn chooser_cancel_is_a_cancellation() {
    let fixture = Fixture::new();
    let calls = fixture.chooser.calls.clone();
    let err = fixture.source().choose_files().unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(*calls.lock().unwrap(), 1);
}

#[test]
fn missing_file_is_unreadable_not_cancelled() {
    let fixture = Fixture::new();
    let missing = fixture.temp.path().join("nope.txt");
    let err = fixture.source().capture_files(vec![missing.clone()]).unwrap_err();
    match err {
        CaptureError::Unreadable { path, .. } => assert_eq!(path, missing),
        other => panic!("expected Unreadable, got {other:?}"),
    }
}

#[test]
fn archive_failure_removes_partial_bundle() {
    let fixture = Fixture::new();
    let present = fixture.write("x/present.txt", "here");
    let missing = fixture.temp.path().join("x/missing.txt");

    let err = fixture
        .source()
        .capture_files(vec![present, missing])
        .unwrap_err();
    assert!(matches!(err, CaptureError::Archive(_)), "{err:?}");
    assert!(fixture.staged_files().is_empty());
}

#[test]
fn region_capture_encodes_png() {
    let mut fixture = Fixture::new();
    fixture.selector.region = Some(Region::new(10, 20, 5, 4));
    let regions = fixture.grabber.regions.clone();

    let artifact = fixture.source().capture_region().unwrap();
    assert!(artifact.is_temporary());
    assert_eq!(artifact.kind(), Some(CaptureKind::Image));
    assert!(artifact.file_name().unwrap().ends_with(".png.tmp"));

    assert_eq!(png_dimensions(artifact.path()), (5, 4));
    assert_eq!(
        regions.lock().unwrap().as_slice(),
        &[Some(Region::new(10, 20, 5, 4))]
    );
}

#[test]
fn dismissed_selector_is_a_cancellation() {
    let fixture = Fixture::new();
    let regions = fixture.grabber.regions.clone();
    let calls = fixture.selector.calls.clone();
    let err = fixture.source().capture_region().unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(*calls.lock().unwrap(), 1);
    assert!(regions.lock().unwrap().is_empty());
}

#[test]
fn degenerate_region_is_rejected_before_grabbing() {
    let fixture = Fixture::new();
    let regions = fixture.grabber.regions.clone();

    for region in [Region::new(0, 0, 0, 0), Region::new(5, 5, 2, 100)] {
        let err = fixture.source().capture_region_at(region).unwrap_err();
        assert!(matches!(err, CaptureError::InvalidRegion(r) if r == region));
    }
    assert!(regions.lock().unwrap().is_empty());
    assert!(fixture.staged_files().is_empty());
}

#[test]
fn entire_screen_grabs_without_region() {
    let fixture = Fixture::new();
    let regions = fixture.grabber.regions.clone();

    let artifact = fixture.source().capture_screen().unwrap();
    assert_eq!(png_dimensions(artifact.path()), (8, 6));
    assert_eq!(regions.lock().unwrap().as_slice(), &[None]);
}

#[test]
fn grabber_failure_leaves_nothing_staged() {
    let mut fixture = Fixture::new();
    fixture.grabber.should_fail = true;
    let err = fixture.source().capture_screen().unwrap_err();
    assert!(matches!(err, CaptureError::ScreenError(_)));
    assert!(fixture.staged_files().is_empty());
}

#[test]
fn clipboard_prefers_file_list_over_text() {
    let mut fixture = Fixture::new();
    let file = fixture.write("clip/picked.txt", "picked");
    let uri = format!("file://{}\n", file.display());
    fixture.clipboard = MockClipboard::offering(&[
        ("text/plain", Some(b"hello".as_slice())),
        ("text/uri-list", Some(uri.as_bytes())),
    ]);

    let artifact = fixture.source().capture_clipboard().unwrap();
    assert_eq!(artifact.kind(), Some(CaptureKind::Files));
    assert_eq!(
        zip_entries(artifact.path()),
        ["picked.txt".to_string()].into_iter().collect()
    );
}

#[test]
fn clipboard_text_is_written_with_newline() {
    let mut fixture = Fixture::new();
    fixture.clipboard = MockClipboard::offering(&[("text/plain", Some(b"hello".as_slice()))]);

    let artifact = fixture.source().capture_clipboard().unwrap();
    assert_eq!(artifact.kind(), Some(CaptureKind::Text));
    assert!(artifact.file_name().unwrap().ends_with(".txt.tmp"));
    assert_eq!(fs::read(artifact.path()).unwrap(), b"hello\n");
}

#[test]
fn unreadable_flavors_fall_through() {
    let mut fixture = Fixture::new();
    fixture.clipboard = MockClipboard::offering(&[
        ("TARGETS", Some(b"ignored".as_slice())),
        ("text/uri-list", None),
        ("text/plain", None),
        ("image/png", Some(&[137u8, 80, 78, 71][..])),
    ]);
    let reads = fixture.clipboard.reads.clone();

    let artifact = fixture.source().capture_clipboard().unwrap();
    assert_eq!(artifact.kind(), Some(CaptureKind::Blob));
    assert!(artifact.file_name().unwrap().ends_with(".tmp"));
    assert!(!artifact.file_name().unwrap().ends_with(".png.tmp"));
    assert_eq!(fs::read(artifact.path()).unwrap(), vec![137u8, 80, 78, 71]);
    assert_eq!(
        reads.lock().unwrap().as_slice(),
        &["text/uri-list", "text/plain", "image/png"]
    );
}

#[test]
fn exhausted_flavors_is_an_error() {
    let mut fixture = Fixture::new();
    fixture.clipboard = MockClipboard::offering(&[("text/plain", None), ("TARGETS", None)]);

    let err = fixture.source().capture_clipboard().unwrap_err();
    assert!(matches!(err, CaptureError::ClipboardError(_)), "{err:?}");
    assert!(fixture.staged_files().is_empty());
}

#[test]
fn empty_clipboard_is_an_error() {
    let fixture = Fixture::new();
    let err = fixture.source().capture_clipboard().unwrap_err();
    match err {
        CaptureError::ClipboardError(msg) => assert!(msg.contains("empty")),
        other => panic!("expected ClipboardError, got {other:?}"),
    }
}
