use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Component, Path, PathBuf};
use zip::result::ZipError;
use zip::ZipArchive;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("container {} not found", .0.display())]
    ContainerNotFound(PathBuf),
    #[error("{member} not found in {}", .container.display())]
    MemberNotFound { container: PathBuf, member: String },
    #[error("unsupported container {}", .0.display())]
    UnknownKind(PathBuf),
    #[error("failed to extract from {}: {source}", .container.display())]
    Io {
        container: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed zip {}: {source}", .container.display())]
    Zip {
        container: PathBuf,
        #[source]
        source: ZipError,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContainerKind {
    Tar,
    Zip,
}

impl ContainerKind {
    pub fn from_path(path: &Path) -> Result<Self, ExtractError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("tar") => Ok(Self::Tar),
            Some("zip") => Ok(Self::Zip),
            _ => Err(ExtractError::UnknownKind(path.to_path_buf())),
        }
    }
}

impl std::fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Tar => write!(f, "tar"),
            Self::Zip => write!(f, "zip"),
        }
    }
}

/// An opened archive that members can be pulled out of by name.
pub trait Container {
    fn kind(&self) -> ContainerKind;

    /// Writes `member` to `dest_root/member`, keeping its relative path, and
    /// returns the written path.
    fn extract_member(&mut self, member: &str, dest_root: &Path) -> Result<PathBuf, ExtractError>;
}

/// Opens `path` as a tar or zip container depending on its extension.
pub fn open(path: &Path) -> Result<Box<dyn Container>, ExtractError> {
    Ok(match ContainerKind::from_path(path)? {
        ContainerKind::Tar => Box::new(TarContainer::open(path)?),
        ContainerKind::Zip => Box::new(ZipContainer::open(path)?),
    })
}

/// One named extraction from a container.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ArchiveEntry {
    pub container_path: PathBuf,
    pub member_name: String,
    pub extract_root: PathBuf,
}

impl ArchiveEntry {
    pub fn new(
        container_path: impl Into<PathBuf>,
        member_name: impl Into<String>,
        extract_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            container_path: container_path.into(),
            member_name: member_name.into(),
            extract_root: extract_root.into(),
        }
    }

    pub fn extract(&self) -> Result<PathBuf, ExtractError> {
        extract_member(&self.container_path, &self.member_name, &self.extract_root)
    }
}

pub fn extract_member(
    container: &Path,
    member: &str,
    dest_root: &Path,
) -> Result<PathBuf, ExtractError> {
    let mut archive = open(container)?;
    log::debug!(
        "extracting {} from {} {}",
        member,
        archive.kind(),
        container.display()
    );
    archive.extract_member(member, dest_root)
}

fn open_file(path: &Path) -> Result<File, ExtractError> {
    File::open(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            ExtractError::ContainerNotFound(path.to_path_buf())
        } else {
            io_error(path, err)
        }
    })
}

fn io_error(container: &Path, source: std::io::Error) -> ExtractError {
    ExtractError::Io {
        container: container.to_path_buf(),
        source,
    }
}

fn invalid_member(container: &Path, member: &str) -> ExtractError {
    io_error(
        container,
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("refusing to extract {} outside of the destination", member),
        ),
    )
}

/// Compares archive paths ignoring `./` components.
fn same_member(a: &Path, b: &Path) -> bool {
    fn normal(p: &Path) -> Vec<Component<'_>> {
        p.components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect()
    }
    normal(a) == normal(b)
}

pub struct TarContainer {
    path: PathBuf,
}

impl TarContainer {
    pub fn open(path: &Path) -> Result<Self, ExtractError> {
        open_file(path)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Container for TarContainer {
    fn kind(&self) -> ContainerKind {
        ContainerKind::Tar
    }

    fn extract_member(&mut self, member: &str, dest_root: &Path) -> Result<PathBuf, ExtractError> {
        // tar entries can only be walked once, so every lookup rereads the file
        let file = BufReader::new(open_file(&self.path)?);
        let mut archive = tar::Archive::new(file);
        let err = |e| io_error(&self.path, e);
        std::fs::create_dir_all(dest_root).map_err(err)?;
        for entry in archive.entries().map_err(err)? {
            let mut entry = entry.map_err(err)?;
            if !same_member(&entry.path().map_err(err)?, Path::new(member)) {
                continue;
            }
            if !entry.unpack_in(dest_root).map_err(err)? {
                return Err(invalid_member(&self.path, member));
            }
            return Ok(dest_root.join(member));
        }
        Err(ExtractError::MemberNotFound {
            container: self.path.clone(),
            member: member.to_string(),
        })
    }
}

pub struct ZipContainer {
    path: PathBuf,
    archive: ZipArchive<BufReader<File>>,
}

impl ZipContainer {
    pub fn open(path: &Path) -> Result<Self, ExtractError> {
        let file = BufReader::new(open_file(path)?);
        let archive = ZipArchive::new(file).map_err(|source| ExtractError::Zip {
            container: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            archive,
        })
    }
}

impl Container for ZipContainer {
    fn kind(&self) -> ContainerKind {
        ContainerKind::Zip
    }

    fn extract_member(&mut self, member: &str, dest_root: &Path) -> Result<PathBuf, ExtractError> {
        let path = &self.path;
        let err = |e| io_error(path, e);
        let mut file = match self.archive.by_name(member) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => {
                return Err(ExtractError::MemberNotFound {
                    container: path.clone(),
                    member: member.to_string(),
                })
            }
            Err(source) => {
                return Err(ExtractError::Zip {
                    container: path.clone(),
                    source,
                })
            }
        };
        let name = file
            .enclosed_name()
            .map(|name| name.to_path_buf())
            .ok_or_else(|| invalid_member(path, member))?;
        let out = dest_root.join(name);
        if file.is_dir() {
            std::fs::create_dir_all(&out).map_err(err)?;
            return Ok(out);
        }
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).map_err(err)?;
        }
        let mut writer = BufWriter::new(File::create(&out).map_err(err)?);
        std::io::copy(&mut file, &mut writer).map_err(err)?;
        Ok(out)
    }
}
