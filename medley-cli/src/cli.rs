use clap::{Parser, Subcommand, ValueEnum};
use medley_engine::Destination;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "medley",
    about = "Medley - offline-first caching gateway for app-shell and media resources",
    version,
    author
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Cache directory (defaults to a per-user temp location)
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Keep cached entries in memory instead of on disk
    #[arg(long, global = true, conflicts_with = "cache_dir")]
    pub in_memory: bool,

    /// Origin the shell manifest paths resolve against (e.g. https://app.example.com)
    #[arg(long, global = true)]
    pub origin: Option<String>,

    /// App-shell path served cache-first (repeatable, overrides the default manifest)
    #[arg(long = "shell-path", global = true)]
    pub shell_path: Vec<String>,

    /// Entry ceiling for the media store
    #[arg(long, global = true, default_value = "5")]
    pub max_entries: usize,

    /// Byte ceiling for the media store (e.g. "500MB")
    #[arg(long, global = true, default_value = "500MB")]
    pub max_bytes: String,

    /// Request timeout in seconds
    #[arg(long, global = true, default_value = "30")]
    pub timeout: u64,

    /// Connection timeout in seconds
    #[arg(long, global = true, default_value = "10")]
    pub connect_timeout: u64,

    /// Additional request header in "Name: Value" form (repeatable)
    #[arg(short = 'H', long = "header", global = true)]
    pub headers: Vec<String>,

    /// Proxy URL (supports http, https, socks5)
    #[arg(long, global = true)]
    pub proxy: Option<String>,

    /// Proxy username (if proxy requires authentication)
    #[arg(long, global = true)]
    pub proxy_username: Option<String>,

    /// Proxy password (if proxy requires authentication)
    #[arg(long, global = true)]
    pub proxy_password: Option<String>,

    /// Use system proxy settings when no explicit proxy is given
    #[arg(long, global = true)]
    pub use_system_proxy: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a resource through the gateway cache
    Fetch {
        /// The URL of the resource
        #[arg(short, long)]
        url: String,

        /// Request destination hint (video and audio force media handling)
        #[arg(short, long, default_value = "unknown")]
        destination: DestinationArg,

        /// Save the response body to a file
        #[arg(short = 'O', long)]
        output_file: Option<PathBuf>,
    },

    /// Pin a media payload into the cache under a stable id
    Pin {
        /// Stable media id the payload is pinned under
        #[arg(short, long)]
        id: String,

        /// Current source URL of the payload
        #[arg(short, long)]
        url: String,
    },

    /// Check whether a pinned media id is cached and unexpired
    Check {
        /// Media id to look up
        #[arg(short, long)]
        id: String,
    },

    /// Resolve a playable location for a pinned media id
    Play {
        /// Media id to play
        #[arg(short, long)]
        id: String,

        /// Source URL used when the id is not cached yet
        #[arg(short, long)]
        url: Option<String>,
    },

    /// Pre-populate the app store from the shell manifest
    Warm,

    /// Print cache occupancy and storage availability
    Status,
}

/// Request destination hint, mirroring the fetch destinations a browser sends.
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum DestinationArg {
    Document,
    Image,
    Script,
    Style,
    Font,
    Video,
    Audio,
    #[default]
    Unknown,
}

impl From<DestinationArg> for Destination {
    fn from(arg: DestinationArg) -> Self {
        match arg {
            DestinationArg::Document => Destination::Document,
            DestinationArg::Image => Destination::Image,
            DestinationArg::Script => Destination::Script,
            DestinationArg::Style => Destination::Style,
            DestinationArg::Font => Destination::Font,
            DestinationArg::Video => Destination::Video,
            DestinationArg::Audio => Destination::Audio,
            DestinationArg::Unknown => Destination::Unknown,
        }
    }
}
