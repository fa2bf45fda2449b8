use crate::{
    endpoints::{self, Endpoints},
    files::Dropbox,
    transport::{HttpTransport, StatusPolicy, Transport},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{error::ErrorKind, CommandFactory as _, Parser};
use nu_ansi_term::Color;
use std::{ffi::OsString, io::Write};
use url::Url;

const NOTE: &str = "Note: <path> does *not* include the root \"/\". For example,
        dbx upload foo.pdf Bar
      tries to upload foo.pdf to /Bar.";

/// A small command line client for Dropbox
///
/// Requires an access token in the DROPBOX_ACCESS_TOKEN environment variable.
#[derive(Parser)]
#[command(
    name = "dbx",
    author,
    version,
    about,
    disable_help_flag = true,
    disable_help_subcommand = true,
    after_help = NOTE
)]
pub struct Cli {
    #[clap(flatten)]
    pub config: Config,
    #[clap(subcommand)]
    pub cmd: Command,
}

#[derive(clap::Args)]
pub struct Config {
    /// Base url of the metadata API host
    #[arg(long, env = "DROPBOX_RPC_URL", default_value = endpoints::RPC_URL)]
    pub rpc_url: Url,
    /// Base url of the content API host
    #[arg(long, env = "DROPBOX_CONTENT_URL", default_value = endpoints::CONTENT_URL)]
    pub content_url: Url,
    /// Fail if the API responds with an error status, rather than printing
    /// the response body and exiting successfully
    #[arg(
        long,
        env = "DROPBOX_CHECK_STATUS",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub check_status: bool,
}

impl Config {
    pub fn endpoints(&self) -> Endpoints {
        Endpoints::new(self.rpc_url.clone(), self.content_url.clone())
    }

    pub fn status_policy(&self) -> StatusPolicy {
        if self.check_status {
            StatusPolicy::Fail
        } else {
            StatusPolicy::PassThrough
        }
    }
}

#[derive(clap::Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Download a file <path> into the current directory
    #[command(visible_alias = "d", short_flag = 'd', long_flag = "download")]
    Download { path: String },
    /// Upload a file <local> to the folder <dir>, or to the root folder if
    /// <dir> is not given
    #[command(visible_alias = "u", short_flag = 'u', long_flag = "upload")]
    Upload {
        local: Utf8PathBuf,
        #[arg(default_value = "")]
        dir: String,
    },
    /// Remove a file or folder <path>
    #[command(visible_alias = "r", short_flag = 'r', long_flag = "remove")]
    Remove { path: String },
    /// Move a file or folder <from> to <to>
    #[command(visible_alias = "m", short_flag = 'm', long_flag = "move")]
    Move { from: String, to: String },
    /// Create a folder <dir>
    #[command(visible_alias = "f", short_flag = 'f', long_flag = "mkdir")]
    Mkdir { dir: String },
    /// Print this help
    #[command(visible_alias = "h", short_flag = 'h', long_flag = "help")]
    Help,
}

fn usage() -> String {
    Cli::command().render_help().to_string()
}

/// Executes a single command. Downloads are written to `cwd`, every other
/// response is written to `out`.
pub fn dispatch<T: Transport>(
    cmd: Command,
    dbx: &Dropbox<T>,
    cwd: &Utf8Path,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match cmd {
        Command::Download { path } => {
            let local = dbx.download(&path, cwd)?;
            tracing::info!("wrote {local}");
        }
        Command::Upload { local, dir } => dbx.upload(&local, &dir, out)?,
        Command::Remove { path } => dbx.delete_v2(&path, out)?,
        Command::Move { from, to } => dbx.move_v2(&from, &to, out)?,
        Command::Mkdir { dir } => dbx.create_folder_v2(&dir, out)?,
        Command::Help => out.write_all(usage().as_bytes())?,
    }

    Ok(())
}

fn report(err: &mut dyn Write, e: &anyhow::Error, color: bool) {
    let prefix = if color {
        Color::Red.bold().paint("error:").to_string()
    } else {
        "error:".to_owned()
    };

    let _ = writeln!(err, "{prefix} {e:#}");
}

/// Parses `argv` and runs the command, returning the process exit code.
///
/// Usage errors print the usage to `err` and return 1, `help` prints it to
/// `out` and returns 0. Any failure of the operation itself returns 1.
pub fn run<I, A>(argv: I, out: &mut dyn Write, err: &mut dyn Write, color: bool) -> u8
where
    I: IntoIterator<Item = A>,
    A: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(argv) {
        Ok(cli) => cli,
        Err(e) => {
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    let _ = write!(out, "{e}");
                    0
                }
                ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                    let _ = write!(err, "{}", usage());
                    1
                }
                _ => {
                    let _ = write!(err, "{e}\n{}", usage());
                    1
                }
            };
        }
    };

    if cli.cmd == Command::Help {
        let _ = write!(out, "{}", usage());
        return 0;
    }

    let transport = match HttpTransport::new() {
        Ok(t) => t,
        Err(e) => {
            report(err, &e, color);
            return 1;
        }
    };

    let dbx = Dropbox::new(transport, cli.config.endpoints())
        .with_status_policy(cli.config.status_policy());

    match dispatch(cli.cmd, &dbx, Utf8Path::new("."), out) {
        Ok(()) => 0,
        Err(e) => {
            report(err, &e, color);
            1
        }
    }
}
