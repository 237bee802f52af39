use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "spherecast",
    about = "DLNA gateway for a spherical camera — serves its library and corrects dual-fisheye videos on demand",
    long_about = None,
    version = env!("GIT_VERSION"),
)]
pub struct Args {
    /// HTTP port to listen on [default: 8888]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Friendly server name shown on DLNA client device lists [default: spherecast]
    #[arg(short, long)]
    pub name: Option<String>,

    /// Base URL of the camera's web API [default: http://127.0.0.1:8080]
    #[arg(short = 'e', long, value_name = "URL")]
    pub camera: Option<String>,

    /// Path to TOML config file (overrides default search: ./spherecast.toml, ~/.config/spherecast/config.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Disable the correction feature: no correction folders, no conversion jobs
    #[arg(long)]
    pub no_correction: bool,

    /// Bind to localhost only (127.0.0.1) instead of all interfaces (0.0.0.0 + :::)
    #[arg(long)]
    pub localhost: bool,
}
