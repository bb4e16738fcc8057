//! trainer - Terminal karaoke pitch trainer
//!
//! Run with:
//!   cargo run --bin trainer -- --melody song.json --track instrumental.mp3 \
//!       [--guide guide.mp3] [--lyrics lyrics.json] [--device desktop] \
//!       [--config trainer.json] [--data-dir .trainer]

mod app;
mod ui;

use std::path::PathBuf;

use color_eyre::eyre::{bail, eyre, Result as EyreResult, WrapErr};
use pitch_trainer::config::DeviceClass;

use app::{Options, Trainer};

const USAGE: &str = "usage: trainer --melody <json> --track <audio> [--guide <audio>] \
[--lyrics <json>] [--device <class|user-agent>] [--config <json>] [--data-dir <dir>]";

fn main() -> EyreResult<()> {
    color_eyre::install()?;

    let options = parse_args(std::env::args().skip(1))?;
    init_logging(&options.log_file)?;

    Trainer::new(options).run()
}

fn parse_args(mut args: impl Iterator<Item = String>) -> EyreResult<Options> {
    let mut melody = None;
    let mut instrumental = None;
    let mut guide = None;
    let mut lyrics = None;
    let mut device = DeviceClass::Desktop;
    let mut config = None;
    let mut data_dir = PathBuf::from(".trainer");

    while let Some(flag) = args.next() {
        let mut value = || {
            args.next()
                .ok_or_else(|| eyre!("`{flag}` needs a value\n{USAGE}"))
        };
        match flag.as_str() {
            "--melody" => melody = Some(PathBuf::from(value()?)),
            "--track" => instrumental = Some(PathBuf::from(value()?)),
            "--guide" => guide = Some(PathBuf::from(value()?)),
            "--lyrics" => lyrics = Some(PathBuf::from(value()?)),
            "--config" => config = Some(PathBuf::from(value()?)),
            "--data-dir" => data_dir = PathBuf::from(value()?),
            "--device" => {
                let raw = value()?;
                // A class name, or a platform string to classify
                device = raw
                    .parse()
                    .unwrap_or_else(|_| DeviceClass::from_user_agent(&raw));
            }
            "-h" | "--help" => bail!("{USAGE}"),
            other => bail!("unknown argument `{other}`\n{USAGE}"),
        }
    }

    Ok(Options {
        melody: melody.ok_or_else(|| eyre!("--melody is required\n{USAGE}"))?,
        instrumental: instrumental.ok_or_else(|| eyre!("--track is required\n{USAGE}"))?,
        guide,
        lyrics,
        device,
        config,
        log_file: data_dir.join("trainer.log"),
        data_dir,
    })
}

/// Log to a file; stderr would tear the terminal UI.
fn init_logging(path: &std::path::Path) -> EyreResult<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .wrap_err_with(|| format!("creating {}", dir.display()))?;
    }
    let file = std::fs::File::create(path)
        .wrap_err_with(|| format!("creating log file {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}
