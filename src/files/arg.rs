use anyhow::Context as _;
use bytes::Bytes;
use camino::Utf8Path;
use http::header::HeaderValue;
use serde::Serialize;
use std::fmt;

/// A path in the Dropbox namespace, always rooted at `/`
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(transparent)]
pub struct RemotePath(String);

impl RemotePath {
    /// Roots a path given relative to `/`. The path is otherwise used as is.
    pub fn new(relative: &str) -> Self {
        if relative.starts_with('/') {
            tracing::warn!("remote path '{relative}' already starts with '/', the root is implied");
        }

        Self(format!("/{relative}"))
    }

    /// `/<dir>/<name>`, or `/<name>` when `dir` is empty
    pub fn in_dir(dir: &str, name: &str) -> Self {
        if dir.is_empty() {
            Self::new(name)
        } else {
            Self::new(&format!("{dir}/{name}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The final component of `path`, `some/dir/foo.txt` -> `foo.txt`
pub fn basename(path: &str) -> anyhow::Result<&str> {
    Utf8Path::new(path)
        .file_name()
        .with_context(|| format!("unable to determine a file name from '{path}'"))
}

/// `download` and `delete_v2`
#[derive(Serialize)]
pub struct PathArg<'a> {
    pub path: &'a RemotePath,
}

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    Overwrite,
}

#[derive(Serialize)]
pub struct UploadArg<'a> {
    pub path: &'a RemotePath,
    pub mode: WriteMode,
    pub autorename: bool,
    pub mute: bool,
}

impl<'a> UploadArg<'a> {
    pub fn overwrite(path: &'a RemotePath) -> Self {
        Self {
            path,
            mode: WriteMode::Overwrite,
            autorename: false,
            mute: true,
        }
    }
}

#[derive(Serialize)]
pub struct MoveArg<'a> {
    pub from_path: &'a RemotePath,
    pub to_path: &'a RemotePath,
    pub allow_shared_folder: bool,
    pub autorename: bool,
    pub allow_ownership_transfer: bool,
}

impl<'a> MoveArg<'a> {
    pub fn new(from_path: &'a RemotePath, to_path: &'a RemotePath) -> Self {
        Self {
            from_path,
            to_path,
            allow_shared_folder: true,
            autorename: false,
            allow_ownership_transfer: false,
        }
    }
}

#[derive(Serialize)]
pub struct CreateFolderArg<'a> {
    pub path: &'a RemotePath,
    pub autorename: bool,
}

/// Serializes an argument as a compact JSON request body
pub fn json_body<A: Serialize>(arg: &A) -> anyhow::Result<Bytes> {
    Ok(serde_json::to_vec(arg)
        .context("failed to serialize request body")?
        .into())
}

/// Serializes an argument for the `Dropbox-API-Arg` header.
///
/// Header values must be ASCII, so every char from U+007F up is written as a
/// `\uXXXX` escape, which is still the same JSON.
pub fn header_json<A: Serialize>(arg: &A) -> anyhow::Result<HeaderValue> {
    use std::fmt::Write;

    let json = serde_json::to_string(arg).context("failed to serialize API argument")?;

    let mut escaped = String::with_capacity(json.len());
    for c in json.chars() {
        if (c as u32) < 0x7f {
            escaped.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                write!(&mut escaped, "\\u{unit:04x}").context("failed to escape API argument")?;
            }
        }
    }

    HeaderValue::from_str(&escaped).context("API argument is not a valid header value")
}
