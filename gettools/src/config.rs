use std::path::{Path, PathBuf};

/// Release index of the fusion update server.
pub const BASE_URL: &str = "http://softwareupdate.vmware.com/cds/vmw-desktop/fusion/";

pub const TOOLS_DIR: &str = "tools";

pub const DARWIN_TAR: &str = "com.vmware.fusion.tools.darwin.zip.tar";
pub const DARWIN_ZIP: &str = "com.vmware.fusion.tools.darwin.zip";
pub const DARWIN_PRE15_TAR: &str = "com.vmware.fusion.tools.darwinPre15.zip.tar";
pub const DARWIN_PRE15_ZIP: &str = "com.vmware.fusion.tools.darwinPre15.zip";
pub const FUSION_TAR: &str = "com.vmware.fusion.zip.tar";
pub const FUSION_ZIP: &str = "com.vmware.fusion.zip";

pub const DARWIN_ISO: &str = "darwin.iso";
pub const DARWIN_PRE15_ISO: &str = "darwinPre15.iso";

/// Top level directory of every packaged zip.
pub const PAYLOAD_DIR: &str = "payload";
pub const ISOIMAGES_DIR: &str = "payload/VMware Fusion.app/Contents/Library/isoimages";

#[derive(Clone, Debug)]
pub struct Config {
    base_url: String,
    tools_dir: PathBuf,
}

impl Config {
    /// Default configuration: the fusion update server and a `tools` folder
    /// next to the running executable.
    pub fn new() -> std::io::Result<Self> {
        let exe = std::env::current_exe()?;
        let dir = exe.parent().unwrap_or_else(|| Path::new("."));
        Ok(Self {
            base_url: BASE_URL.to_string(),
            tools_dir: dir.join(TOOLS_DIR),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
        self
    }

    pub fn with_tools_dir(mut self, tools_dir: impl Into<PathBuf>) -> Self {
        self.tools_dir = tools_dir.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tools_dir(&self) -> &Path {
        &self.tools_dir
    }
}

/// Download locations derived from a resolved release and build.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReleaseUrls {
    pub darwin: String,
    pub darwin_pre15: String,
    pub fusion_app: String,
}

impl ReleaseUrls {
    pub fn new(release_url: &str, build: &str) -> Self {
        let build_url = format!("{}{}", release_url, build);
        Self {
            darwin: format!("{}/packages/{}", build_url, DARWIN_TAR),
            darwin_pre15: format!("{}/packages/{}", build_url, DARWIN_PRE15_TAR),
            fusion_app: format!("{}/core/{}", build_url, FUSION_TAR),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_urls() {
        let urls = ReleaseUrls::new("http://host/fusion/12.0.0/", "2");
        assert_eq!(
            urls.darwin,
            "http://host/fusion/12.0.0/2/packages/com.vmware.fusion.tools.darwin.zip.tar"
        );
        assert_eq!(
            urls.darwin_pre15,
            "http://host/fusion/12.0.0/2/packages/com.vmware.fusion.tools.darwinPre15.zip.tar"
        );
        assert_eq!(
            urls.fusion_app,
            "http://host/fusion/12.0.0/2/core/com.vmware.fusion.zip.tar"
        );
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let config = Config::new().unwrap().with_base_url("http://127.0.0.1:80/fusion");
        assert_eq!(config.base_url(), "http://127.0.0.1:80/fusion/");
        assert!(config.tools_dir().ends_with(TOOLS_DIR));
    }
}
