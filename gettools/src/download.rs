use crate::error::FetchError;
use crate::progress::{ProgressHook, ProgressState};
use reqwest::blocking::{Client, Response};
use std::fs::File;
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::Path;

pub trait Download {
    /// Streams `url` into `dest`. On error no file is left at `dest`.
    fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: &mut dyn ProgressHook,
    ) -> Result<(), FetchError>;

    fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

pub struct HttpDownloader {
    client: Client,
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

impl HttpDownloader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn get(&self, url: &str) -> Result<Response, FetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|err| network_error(url, err))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp)
    }
}

impl Download for HttpDownloader {
    fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: &mut dyn ProgressHook,
    ) -> Result<(), FetchError> {
        let mut resp = self.get(url)?;
        let total = resp.content_length();
        log::debug!("GET {} ({:?} bytes) -> {}", url, total, dest.display());
        let result = File::create(dest)
            .map_err(|err| io_error(dest, err))
            .and_then(|file| {
                let mut writer = BufWriter::new(file);
                copy_with_progress(&mut resp, &mut writer, total, progress, url, dest)?;
                writer.flush().map_err(|err| io_error(dest, err))
            });
        if result.is_err() {
            std::fs::remove_file(dest).ok();
        }
        result
    }

    fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        log::debug!("GET {}", url);
        self.get(url)?
            .text()
            .map_err(|err| network_error(url, err))
    }
}

/// Copies `reader` into `writer` in [`CHUNK_SIZE`](crate::progress::CHUNK_SIZE) chunks. The hook sees a
/// zero-index event before the first read and one event per chunk after it,
/// then `finish` whether or not the copy succeeded.
pub fn copy_with_progress<R: Read + ?Sized, W: Write + ?Sized>(
    reader: &mut R,
    writer: &mut W,
    total_bytes: Option<u64>,
    progress: &mut dyn ProgressHook,
    url: &str,
    dest: &Path,
) -> Result<u64, FetchError> {
    let mut state = ProgressState::new(total_bytes);
    progress.on_progress(&state);
    let mut buf = vec![0; state.chunk_size];
    let result: Result<u64, FetchError> = (|| loop {
        let len = read_chunk(reader, &mut buf).map_err(|err| network_error(url, err))?;
        if len == 0 {
            return Ok(state.bytes_read);
        }
        writer
            .write_all(&buf[..len])
            .map_err(|err| io_error(dest, err))?;
        state.advance(len);
        progress.on_progress(&state);
    })();
    progress.finish();
    result
}

/// Fills `buf` unless the reader runs dry first.
fn read_chunk<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

fn network_error(
    url: &str,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> FetchError {
    FetchError::Network {
        url: url.to_string(),
        source: err.into(),
    }
}

fn io_error(path: &Path, source: std::io::Error) -> FetchError {
    FetchError::Io {
        path: path.to_path_buf(),
        source,
    }
}
