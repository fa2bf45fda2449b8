pub mod arg;

use crate::{
    auth::EnvLookup,
    endpoints::{self, Endpoints, Route},
    transport::{Executor, StatusPolicy, Transport},
};
use anyhow::Context as _;
use arg::RemotePath;
use bytes::Bytes;
use camino::{Utf8Path, Utf8PathBuf};
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use std::io::Write;

/// Client for the `/2/files` family of endpoints. Every operation is a single
/// independent request, no state is kept between them.
pub struct Dropbox<T> {
    exec: Executor<T>,
    endpoints: Endpoints,
}

#[inline]
fn api_arg(value: HeaderValue) -> (HeaderName, HeaderValue) {
    (HeaderName::from_static(endpoints::DROPBOX_API_ARG), value)
}

#[inline]
fn content_type(mime: &'static str) -> (HeaderName, HeaderValue) {
    (CONTENT_TYPE, HeaderValue::from_static(mime))
}

impl<T: Transport> Dropbox<T> {
    pub fn new(transport: T, endpoints: Endpoints) -> Self {
        Self {
            exec: Executor::new(transport),
            endpoints,
        }
    }

    pub fn with_env(mut self, env: EnvLookup) -> Self {
        self.exec = self.exec.with_env(env);
        self
    }

    pub fn with_status_policy(mut self, status: StatusPolicy) -> Self {
        self.exec = self.exec.with_status_policy(status);
        self
    }

    pub fn transport(&self) -> &T {
        self.exec.transport()
    }

    /// Downloads the file at `/<path>` into `out_dir`, named by the final
    /// component of `path`. Returns the local path that was written.
    ///
    /// <https://www.dropbox.com/developers/documentation/http/documentation#files-download>
    pub fn download(&self, path: &str, out_dir: &Utf8Path) -> anyhow::Result<Utf8PathBuf> {
        let local = out_dir.join(arg::basename(path)?);
        let mut file =
            std::fs::File::create(&local).with_context(|| format!("could not open {local}"))?;

        let remote = RemotePath::new(path);
        let headers = vec![
            api_arg(arg::header_json(&arg::PathArg { path: &remote })?),
            content_type(endpoints::TEXT_PLAIN),
        ];

        tracing::info!("downloading {remote} to {local}");

        self.exec.perform(
            self.endpoints.url(Route::Download)?,
            headers,
            Bytes::new(),
            &mut file,
        )?;

        Ok(local)
    }

    /// Uploads `local` to `/<dir>/<basename>`, or `/<basename>` if `dir` is
    /// empty, replacing any existing file
    ///
    /// <https://www.dropbox.com/developers/documentation/http/documentation#files-upload>
    pub fn upload(&self, local: &Utf8Path, dir: &str, out: &mut dyn Write) -> anyhow::Result<()> {
        let data = std::fs::read(local).with_context(|| format!("could not open {local}"))?;

        let remote = RemotePath::in_dir(dir, arg::basename(local.as_str())?);
        let headers = vec![
            api_arg(arg::header_json(&arg::UploadArg::overwrite(&remote))?),
            content_type(endpoints::OCTET_STREAM),
        ];

        tracing::info!(
            "uploading {local} ({}) to {remote}",
            human_size(data.len() as u64)
        );

        self.exec
            .perform(self.endpoints.url(Route::Upload)?, headers, data.into(), out)
    }

    /// <https://www.dropbox.com/developers/documentation/http/documentation#files-delete>
    pub fn delete_v2(&self, path: &str, out: &mut dyn Write) -> anyhow::Result<()> {
        let remote = RemotePath::new(path);
        let body = arg::json_body(&arg::PathArg { path: &remote })?;

        tracing::info!("deleting {remote}");

        self.exec.perform(
            self.endpoints.url(Route::Delete)?,
            vec![content_type(endpoints::JSON)],
            body,
            out,
        )
    }

    /// <https://www.dropbox.com/developers/documentation/http/documentation#files-move>
    pub fn move_v2(&self, from: &str, to: &str, out: &mut dyn Write) -> anyhow::Result<()> {
        let (from, to) = (RemotePath::new(from), RemotePath::new(to));
        let body = arg::json_body(&arg::MoveArg::new(&from, &to))?;

        tracing::info!("moving {from} to {to}");

        self.exec.perform(
            self.endpoints.url(Route::Move)?,
            vec![content_type(endpoints::JSON)],
            body,
            out,
        )
    }

    /// <https://www.dropbox.com/developers/documentation/http/documentation#files-create_folder>
    pub fn create_folder_v2(&self, dir: &str, out: &mut dyn Write) -> anyhow::Result<()> {
        let remote = RemotePath::new(dir);
        let body = arg::json_body(&arg::CreateFolderArg {
            path: &remote,
            autorename: false,
        })?;

        tracing::info!("creating folder {remote}");

        self.exec.perform(
            self.endpoints.url(Route::CreateFolder)?,
            vec![content_type(endpoints::JSON)],
            body,
            out,
        )
    }
}

fn human_size(bytes: u64) -> String {
    use number_prefix::NumberPrefix;

    match NumberPrefix::binary(bytes as f64) {
        NumberPrefix::Standalone(b) => format!("{b} B"),
        NumberPrefix::Prefixed(prefix, n) => format!("{n:.1} {prefix}B"),
    }
}
