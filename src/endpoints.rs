use anyhow::Context as _;
use url::Url;

/// The host serving metadata (RPC style) endpoints
pub const RPC_URL: &str = "https://api.dropboxapi.com";
/// The host serving content upload and download endpoints
pub const CONTENT_URL: &str = "https://content.dropboxapi.com";

const API_PREFIX: &str = "/2";
const FILES_PREFIX: &str = "/files";

/// Carries the JSON arguments for content endpoints, whose body is the file itself
pub const DROPBOX_API_ARG: &str = "dropbox-api-arg";

pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub const OCTET_STREAM: &str = "application/octet-stream";
pub const JSON: &str = "application/json";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Host {
    Rpc,
    Content,
}

/// The API routes this client knows how to call
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Route {
    Download,
    Upload,
    Delete,
    Move,
    CreateFolder,
}

impl Route {
    pub fn host(self) -> Host {
        match self {
            Self::Download | Self::Upload => Host::Content,
            Self::Delete | Self::Move | Self::CreateFolder => Host::Rpc,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Upload => "upload",
            Self::Delete => "delete_v2",
            Self::Move => "move_v2",
            Self::CreateFolder => "create_folder_v2",
        }
    }

    /// The absolute path of the route, eg. `/2/files/move_v2`
    pub fn path(self) -> String {
        format!("{API_PREFIX}{FILES_PREFIX}/{}", self.name())
    }
}

/// Makes `base` a directory so routes are joined below its path, eg.
/// `https://proxy/dropbox` + `2/files/move_v2` keeps the `/dropbox` prefix
fn as_dir(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    base
}

/// The two hosts requests are routed to. Any path on a base is kept as a
/// prefix of the route path.
#[derive(Clone, Debug)]
pub struct Endpoints {
    rpc: Url,
    content: Url,
}

impl Endpoints {
    pub fn new(rpc: Url, content: Url) -> Self {
        Self {
            rpc: as_dir(rpc),
            content: as_dir(content),
        }
    }

    /// Points both hosts at the same base, which is what a local mock server wants
    pub fn single(base: Url) -> Self {
        Self::new(base.clone(), base)
    }

    pub fn url(&self, route: Route) -> anyhow::Result<Url> {
        let base = match route.host() {
            Host::Rpc => &self.rpc,
            Host::Content => &self.content,
        };

        base.join(route.path().trim_start_matches('/'))
            .with_context(|| format!("failed to build url for {base}"))
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        // These are constants, they had better parse
        Self::new(
            Url::parse(RPC_URL).unwrap(),
            Url::parse(CONTENT_URL).unwrap(),
        )
    }
}
