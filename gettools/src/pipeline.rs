use crate::config::{
    Config, ReleaseUrls, DARWIN_ISO, DARWIN_PRE15_ISO, DARWIN_PRE15_TAR, DARWIN_PRE15_ZIP,
    DARWIN_TAR, DARWIN_ZIP, FUSION_TAR, FUSION_ZIP, ISOIMAGES_DIR, PAYLOAD_DIR,
};
use crate::download::{Download, HttpDownloader};
use crate::error::{Error, FetchError, IoContext, Result};
use crate::listing::{LatestVersionResolver, ListingParser};
use crate::progress::{ConsoleReporter, ProgressHook};
use std::path::{Path, PathBuf};
use unpack::ArchiveEntry;

/// How a run ended when it did not fail outright.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// Both package archives were fetched, images and signatures are in place.
    Primary,
    /// The packages were missing and both images came out of the app bundle.
    Fallback,
    /// Neither the packages nor the app bundle could be downloaded.
    ToolsNotFound,
}

pub struct Pipeline<D, R> {
    config: Config,
    client: D,
    resolver: R,
    progress: Box<dyn ProgressHook>,
}

impl Pipeline<HttpDownloader, ListingParser> {
    pub fn new(config: Config) -> Self {
        Self::with_parts(config, HttpDownloader::default(), ListingParser::new())
    }
}

impl<D: Download, R: LatestVersionResolver> Pipeline<D, R> {
    pub fn with_parts(config: Config, client: D, resolver: R) -> Self {
        Self {
            config,
            client,
            resolver,
            progress: Box::new(ConsoleReporter::default()),
        }
    }

    pub fn with_progress(mut self, progress: impl ProgressHook + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run(&mut self) -> Result<Outcome> {
        self.init()?;
        let urls = self.resolve()?;

        println!("Retrieving Darwin tools from: {}", urls.darwin);
        let darwin = self.tools_path(DARWIN_TAR);
        if let Err(err) = self.fetch(&urls.darwin, &darwin) {
            log::warn!("{}", err);
            return self.fallback(&urls);
        }
        self.unpack_packages(DARWIN_TAR, DARWIN_ZIP, DARWIN_ISO)?;

        println!("Retrieving DarwinPre15 tools from: {}", urls.darwin_pre15);
        let pre15 = self.tools_path(DARWIN_PRE15_TAR);
        self.fetch(&urls.darwin_pre15, &pre15)?;
        self.unpack_packages(DARWIN_PRE15_TAR, DARWIN_PRE15_ZIP, DARWIN_PRE15_ISO)?;

        log::info!("tools written to {}", self.config.tools_dir().display());
        Ok(Outcome::Primary)
    }

    fn tools_path(&self, name: &str) -> PathBuf {
        self.config.tools_dir().join(name)
    }

    /// Recreates an empty tools directory.
    fn init(&self) -> Result<()> {
        let dir = self.config.tools_dir();
        log::info!("recreating {}", dir.display());
        match std::fs::remove_dir_all(dir) {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => {
                return Err(Error::Io {
                    context: format!("failed to remove {}", dir.display()),
                    source: err,
                });
            }
            _ => {}
        }
        std::fs::create_dir_all(dir).io_context(|| format!("failed to create {}", dir.display()))
    }

    fn resolve(&mut self) -> Result<ReleaseUrls> {
        let index_url = self.config.base_url().to_string();
        let index = self.client.fetch_text(&index_url)?;
        let release = self.resolver.resolve(&index_url, &index)?;

        let release_url = format!("{}{}/", index_url, release);
        let page = self.client.fetch_text(&release_url)?;
        let build = self.resolver.resolve(&release_url, &page)?;

        log::info!("latest release {} build {}", release, build);
        Ok(ReleaseUrls::new(&release_url, build.as_str()))
    }

    fn fetch(&mut self, url: &str, dest: &Path) -> Result<(), FetchError> {
        log::info!("downloading {}", url);
        self.client.download(url, dest, self.progress.as_mut())
    }

    fn fallback(&mut self, urls: &ReleaseUrls) -> Result<Outcome> {
        println!("Tools aren't found. Please wait while downloading from another source.");
        println!("Retrieving Fusion App from: {}", urls.fusion_app);
        let bundle = self.tools_path(FUSION_TAR);
        if let Err(err) = self.fetch(&urls.fusion_app, &bundle) {
            log::error!("{}", err);
            println!("Couldn't find tools");
            return Ok(Outcome::ToolsNotFound);
        }

        let dir = self.config.tools_dir();
        let zip = ArchiveEntry::new(&bundle, FUSION_ZIP, dir).extract()?;
        for iso in [DARWIN_ISO, DARWIN_PRE15_ISO] {
            let member = format!("{}/{}", ISOIMAGES_DIR, iso);
            let extracted = ArchiveEntry::new(&zip, member, dir).extract()?;
            relocate(&extracted, &dir.join(iso))?;
        }
        cleanup(dir, &[bundle, zip])?;
        Ok(Outcome::Fallback)
    }

    /// Pulls `iso` and its signature out of a packages archive.
    fn unpack_packages(&self, tar: &str, zip: &str, iso: &str) -> Result<()> {
        let dir = self.config.tools_dir();
        let tar = dir.join(tar);
        let zip = ArchiveEntry::new(&tar, zip, dir).extract()?;
        for name in [iso.to_string(), format!("{}.sig", iso)] {
            let member = format!("{}/{}", PAYLOAD_DIR, name);
            let extracted = ArchiveEntry::new(&zip, member, dir).extract()?;
            relocate(&extracted, &dir.join(&name))?;
        }
        cleanup(dir, &[tar, zip])
    }
}

fn relocate(from: &Path, to: &Path) -> Result<()> {
    log::debug!("moving {} to {}", from.display(), to.display());
    std::fs::rename(from, to)
        .io_context(|| format!("failed to move {} to {}", from.display(), to.display()))
}

/// Removes the extracted payload tree and the intermediate archives.
fn cleanup(dir: &Path, archives: &[PathBuf]) -> Result<()> {
    std::fs::remove_dir_all(dir.join(PAYLOAD_DIR)).ok();
    for archive in archives {
        log::debug!("removing {}", archive.display());
        std::fs::remove_file(archive)
            .io_context(|| format!("failed to remove {}", archive.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::copy_with_progress;
    use crate::error::ParseError;
    use crate::progress::NullReporter;
    use std::collections::HashMap;
    use std::io::Cursor;

    /// Serves canned bodies, everything else is a 404.
    #[derive(Default)]
    struct Canned {
        bodies: HashMap<String, Vec<u8>>,
    }

    impl Canned {
        fn with(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
            self.bodies.insert(url.to_string(), body.into());
            self
        }

        fn body(&self, url: &str) -> Result<&[u8], FetchError> {
            self.bodies
                .get(url)
                .map(Vec::as_slice)
                .ok_or_else(|| FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                })
        }
    }

    impl Download for Canned {
        fn download(
            &self,
            url: &str,
            dest: &Path,
            progress: &mut dyn ProgressHook,
        ) -> Result<(), FetchError> {
            let body = self.body(url)?;
            let mut file = std::fs::File::create(dest).unwrap();
            let total = Some(body.len() as u64);
            copy_with_progress(&mut Cursor::new(body), &mut file, total, progress, url, dest)?;
            Ok(())
        }

        fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
            Ok(String::from_utf8_lossy(self.body(url)?).into_owned())
        }
    }

    const BASE: &str = "http://cds/fusion/";

    fn pipeline(dir: &Path, client: Canned) -> Pipeline<Canned, ListingParser> {
        let config = Config::new()
            .unwrap()
            .with_base_url(BASE)
            .with_tools_dir(dir);
        Pipeline::with_parts(config, client, ListingParser::new()).with_progress(NullReporter)
    }

    #[test]
    fn test_empty_index_is_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("tools");
        let client = Canned::default().with(BASE, "<html><body></body></html>");
        let err = pipeline(&dir, client).run().unwrap_err();
        assert!(matches!(err, Error::Parse(ParseError::NoVersions { .. })));
        assert!(dir.is_dir());
    }

    #[test]
    fn test_missing_index_is_fetch_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = pipeline(tmp.path(), Canned::default()).run().unwrap_err();
        match err {
            Error::Fetch(err) => assert!(err.is_status()),
            other => panic!("expected fetch error, got {:?}", other),
        }
    }

    #[test]
    fn test_tools_not_found_leaves_clean_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("tools");
        std::fs::create_dir_all(dir.join("payload")).unwrap();
        std::fs::write(dir.join("darwin.iso"), b"stale").unwrap();

        let client = Canned::default()
            .with(BASE, "<a>8.5.0</a><a>12.0.0</a>")
            .with("http://cds/fusion/12.0.0/", "<a>100</a><a>99</a>");
        let outcome = pipeline(&dir, client).run().unwrap();
        assert_eq!(outcome, Outcome::ToolsNotFound);
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
    }
}
