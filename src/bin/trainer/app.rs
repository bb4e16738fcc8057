//! Trainer - opens files and devices, then hands over to the UI

use std::{fs, path::PathBuf};

use color_eyre::eyre::{Result as EyreResult, WrapErr};
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};

use pitch_trainer::{
    calibration,
    capture::{CapturePipeline, CpalInput, PermissionStatus},
    config::{DeviceClass, TrainerConfig},
    lyrics::{self, Lyrics},
    melody::{JsonMelodyDecoder, MelodyDecoder},
    session::TakeSession,
    store::{FileCalibrationStore, JsonTakeStore, MicDelay},
    transport::{AudioClock, BufferSource, CpalOutput, MixerHandle, PlaybackTransport},
};

use super::ui::UiApp;

pub type LiveSession = TakeSession<AudioClock, MixerHandle, CpalInput>;

/// Command line options
pub struct Options {
    pub melody: PathBuf,
    pub instrumental: PathBuf,
    pub guide: Option<PathBuf>,
    pub lyrics: Option<PathBuf>,
    pub device: DeviceClass,
    pub config: Option<PathBuf>,
    pub data_dir: PathBuf,
    pub log_file: PathBuf,
}

/// Backing tracks, kept so review mode can be left again
#[derive(Clone)]
pub struct Backing {
    pub instrumental: BufferSource,
    pub guide: Option<BufferSource>,
}

pub struct Trainer {
    options: Options,
}

impl Trainer {
    pub fn new(options: Options) -> Self {
        Self { options }
    }

    /// Run the application (takes over the terminal until quit)
    pub fn run(self) -> EyreResult<()> {
        let Options {
            melody,
            instrumental,
            guide,
            lyrics: lyrics_path,
            device,
            config,
            data_dir,
            ..
        } = self.options;

        let config = match config {
            Some(path) => TrainerConfig::from_json_file(&path)
                .wrap_err_with(|| format!("loading config {}", path.display()))?,
            None => TrainerConfig::default(),
        };
        log::info!("device class {device:?}");

        let bytes =
            fs::read(&melody).wrap_err_with(|| format!("reading melody {}", melody.display()))?;
        let melody = JsonMelodyDecoder
            .decode(&bytes)?
            .with_offset(config.melody_offset_ms);

        let lyrics = match lyrics_path {
            Some(path) => {
                let bytes = fs::read(&path)
                    .wrap_err_with(|| format!("reading lyrics {}", path.display()))?;
                lyrics::decode_json(&bytes)?.with_offset(config.melody_offset_ms)
            }
            None => Lyrics::default(),
        };

        fs::create_dir_all(&data_dir)
            .wrap_err_with(|| format!("creating {}", data_dir.display()))?;
        let delay = MicDelay::new(0);
        let calibration_store = FileCalibrationStore::new(data_dir.join("mic_delay"));
        calibration::restore(&delay, &calibration_store).wrap_err("reading mic delay")?;
        let takes = JsonTakeStore::new(data_dir.join("take"));

        let (output, sink, clock) = CpalOutput::open_default().wrap_err("opening output")?;
        let transport = PlaybackTransport::new(clock, sink, config.decode_timeout());

        let input = CpalInput::default_device().wrap_err("opening microphone")?;
        let mut capture = CapturePipeline::new(input, config.clone(), device, delay.clone());
        let (error_tx, error_rx) = crossbeam_channel::unbounded();
        capture.on_error(move |err| {
            let _ = error_tx.send(err.to_string());
        });
        if capture.request_permission() == PermissionStatus::Denied {
            log::warn!("microphone permission denied; takes will not record");
        }

        let backing = Backing {
            instrumental: BufferSource::File(instrumental),
            guide: guide.map(BufferSource::File),
        };
        let mut session =
            TakeSession::new(transport, capture, melody, lyrics, config.emit_interval());
        session.load(backing.instrumental.clone(), backing.guide.clone());

        let mut app = UiApp::new(
            session,
            backing,
            delay,
            takes,
            calibration_store,
            output.sample_rate(),
            error_rx,
        );

        let mut terminal = ratatui::init();
        crossterm::execute!(std::io::stdout(), EnableMouseCapture)?;
        let result = app.run(&mut terminal);
        let _ = crossterm::execute!(std::io::stdout(), DisableMouseCapture);
        ratatui::restore();

        // Output stream lives until the UI is gone
        drop(app);
        drop(output);
        result
    }
}
