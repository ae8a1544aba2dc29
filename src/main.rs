//! Main application for the video downloader GUI.

// Session lifecycle state machine
mod session;
// Off-thread task execution and message marshalling
mod task;
// UI-thread facade over the downloader core
mod controller;
// Boundary to the external yt-dlp tool
mod fetch;
// Progress parsing and normalization
mod progress;
// Data models for requests, progress and metadata
mod model;
// Thumbnail fetching
mod thumbnail;
// Error types
mod error;

use std::sync::{Arc, Mutex};

use eframe::{App, Frame, egui};
use egui::{ColorImage, TextureOptions, Visuals};
use once_cell::sync::OnceCell;
use rfd::FileDialog;
use tokio::runtime::Runtime;

use controller::{Controller, CoreEvent};
use fetch::YtDlpFetcher;
use model::{DownloadRequest, MediaFormat, Phase, QualityCeiling, VideoInfo};
use session::{SessionError, SessionState};

// Global Tokio runtime stored in a OnceCell for lazy init
static RUNTIME: OnceCell<Arc<Runtime>> = OnceCell::new();

/// Program entry point: initializes logging and the runtime, launches the GUI.
fn main() -> Result<(), eframe::Error> {
    env_logger::init();

    let rt = Arc::new(Runtime::new().unwrap());
    RUNTIME.set(rt).unwrap();

    let options = eframe::NativeOptions::default();
    eframe::run_native(
        "Video Downloader",
        options,
        Box::new(|cc| {
            cc.egui_ctx.set_visuals(Visuals::dark());
            Box::new(DownloaderApp::new())
        }),
    )
}

/// One dismissable message under the progress area. Dismissing a message
/// tied to a terminal outcome acknowledges that outcome.
struct Notice {
    text: String,
    error: bool,
    acknowledges: bool,
}

/// Application state for the GUI.
struct DownloaderApp {
    controller: Controller,
    /// Input field for the video URL
    url_input: String,
    /// Destination folder for downloads
    destination: String,
    /// Selected container format
    format: MediaFormat,
    /// Selected quality ceiling
    quality: QualityCeiling,
    /// Audio-only flag; forces the format to mp3 while set
    audio_only: bool,
    /// Metadata of the last fetched video
    info: Option<VideoInfo>,
    /// Texture for the current video's thumbnail
    thumbnail: Option<egui::TextureHandle>,
    /// Incoming thumbnail fetch results, drained each frame
    thumbnail_results: Arc<Mutex<Vec<ColorImage>>>,
    notice: Option<Notice>,
}

impl DownloaderApp {
    fn new() -> Self {
        let handle = RUNTIME.get().unwrap().handle().clone();
        let destination = dirs::download_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "./downloads".to_string());
        Self {
            controller: Controller::new(handle, Arc::new(YtDlpFetcher::new())),
            url_input: String::new(),
            destination,
            format: MediaFormat::Mp4,
            quality: QualityCeiling::Best,
            audio_only: false,
            info: None,
            thumbnail: None,
            thumbnail_results: Arc::new(Mutex::new(Vec::new())),
            notice: None,
        }
    }

    fn start_info_fetch(&mut self) {
        match self.controller.request_info_fetch(&self.url_input) {
            Ok(()) => self.notice = None,
            Err(SessionError::EmptyUrl) => self.show_validation_error(),
            Err(SessionError::Busy) => {}
        }
    }

    fn start_download(&mut self) {
        let request = DownloadRequest {
            url: self.url_input.trim().to_string(),
            destination: std::path::PathBuf::from(self.destination.trim()),
            format: self.format,
            quality: self.quality,
            audio_only: self.audio_only,
        };
        match self.controller.request_download(request) {
            Ok(()) => self.notice = None,
            Err(SessionError::EmptyUrl) => self.show_validation_error(),
            Err(SessionError::Busy) => {}
        }
    }

    fn show_validation_error(&mut self) {
        self.notice = Some(Notice {
            text: "Please enter a video URL".to_string(),
            error: true,
            acknowledges: false,
        });
    }

    /// Spawn a blocking thumbnail fetch; the result lands in
    /// `thumbnail_results` and is picked up on a later frame.
    fn spawn_thumbnail(&self, ctx: &egui::Context, info: &VideoInfo) {
        let info = info.clone();
        let results = Arc::clone(&self.thumbnail_results);
        let ctx = ctx.clone();
        RUNTIME.get().unwrap().spawn_blocking(move || {
            if let Some(img) = thumbnail::fetch_thumbnail(&info) {
                results.lock().unwrap().push(img);
                ctx.request_repaint();
            }
        });
    }

    fn handle_core_events(&mut self, ctx: &egui::Context) {
        for event in self.controller.poll() {
            match event {
                CoreEvent::InfoReceived(info) => {
                    self.thumbnail = None;
                    self.spawn_thumbnail(ctx, &info);
                    self.info = Some(info);
                }
                CoreEvent::OperationFailed(message) => {
                    self.notice = Some(Notice {
                        text: message,
                        error: true,
                        acknowledges: true,
                    });
                }
                CoreEvent::StateChanged(state) => {
                    log::debug!("session state: {state:?}");
                    if state == SessionState::Completed {
                        self.notice = Some(Notice {
                            text: "Download completed successfully!".to_string(),
                            error: false,
                            acknowledges: true,
                        });
                    }
                }
                CoreEvent::ProgressUpdated(_) => {}
            }
        }
    }

    fn status_line(&self) -> String {
        match self.controller.state() {
            SessionState::Idle | SessionState::Ready => "Ready".to_string(),
            SessionState::FetchingInfo => "Fetching video info…".to_string(),
            SessionState::Downloading => {
                let progress = self.controller.progress();
                match progress.phase {
                    Phase::PostProcessing => "Processing downloaded file…".to_string(),
                    Phase::Downloading => match &progress.rate {
                        Some(rate) => {
                            format!("Downloading… {:.1}% at {rate}", progress.percent)
                        }
                        None => format!("Downloading… {:.1}%", progress.percent),
                    },
                }
            }
            SessionState::Completed => "Download completed!".to_string(),
            SessionState::Cancelled => "Download cancelled".to_string(),
            SessionState::Failed => "Error occurred".to_string(),
        }
    }
}

/// GUI update loop: called each frame to redraw and handle interactions.
impl App for DownloaderApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        // Apply pending core and thumbnail messages before drawing
        self.handle_core_events(ctx);
        {
            let mut pending = self.thumbnail_results.lock().unwrap();
            if let Some(img) = pending.drain(..).last() {
                self.thumbnail = Some(ctx.load_texture("thumbnail", img, TextureOptions::default()));
            }
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Video Downloader");

            ui.horizontal(|ui| {
                ui.label("Video URL:");
                ui.text_edit_singleline(&mut self.url_input);
                let fetch = ui.add_enabled(
                    self.controller.can_fetch_info(),
                    egui::Button::new("Fetch Info"),
                );
                if fetch.clicked() {
                    self.start_info_fetch();
                }
            });

            ui.group(|ui| {
                ui.label("Download Options");
                ui.horizontal(|ui| {
                    ui.label("Format:");
                    ui.add_enabled_ui(!self.audio_only, |ui| {
                        egui::ComboBox::from_id_source("format")
                            .selected_text(self.format.label())
                            .show_ui(ui, |ui| {
                                for format in MediaFormat::ALL {
                                    ui.selectable_value(&mut self.format, format, format.label());
                                }
                            });
                    });
                    ui.label("Quality:");
                    ui.add_enabled_ui(!self.audio_only, |ui| {
                        egui::ComboBox::from_id_source("quality")
                            .selected_text(self.quality.label())
                            .show_ui(ui, |ui| {
                                for quality in QualityCeiling::ALL {
                                    ui.selectable_value(&mut self.quality, quality, quality.label());
                                }
                            });
                    });
                });
                let was_audio_only = self.audio_only;
                ui.checkbox(&mut self.audio_only, "Audio Only");
                if self.audio_only != was_audio_only {
                    // Checking locks the format to mp3, unchecking restores the default
                    self.format = if self.audio_only {
                        MediaFormat::Mp3
                    } else {
                        MediaFormat::Mp4
                    };
                }
            });

            ui.horizontal(|ui| {
                ui.label("Save to:");
                ui.text_edit_singleline(&mut self.destination);
                if ui.button("Browse…").clicked() {
                    if let Some(folder) = FileDialog::new()
                        .set_directory(&self.destination)
                        .pick_folder()
                    {
                        self.destination = folder.display().to_string();
                    }
                }
            });

            ui.group(|ui| {
                ui.label("Download Progress");
                let percent = self.controller.progress().percent;
                ui.add(egui::ProgressBar::new(percent / 100.0).show_percentage());
                ui.label(self.status_line());
            });

            if let Some(info) = &self.info {
                ui.group(|ui| {
                    ui.label("Video Information");
                    ui.horizontal(|ui| {
                        if let Some(tex) = &self.thumbnail {
                            ui.add(egui::Image::new(tex).max_width(240.0));
                        }
                        ui.vertical(|ui| {
                            ui.label(format!("Title: {}", info.title));
                            ui.label(format!("Channel: {}", info.uploader));
                            ui.label(format!("Duration: {}", info.duration_display));
                            ui.label(format!("Views: {}", info.view_display()));
                        });
                    });
                });
            }

            ui.horizontal(|ui| {
                let download =
                    ui.add_enabled(self.controller.can_start(), egui::Button::new("Download"));
                if download.clicked() {
                    self.start_download();
                }
                let cancel =
                    ui.add_enabled(self.controller.can_cancel(), egui::Button::new("Cancel"));
                if cancel.clicked() {
                    self.controller.request_cancel();
                }
            });

            let mut dismissed = false;
            if let Some(notice) = &self.notice {
                let color = if notice.error {
                    egui::Color32::LIGHT_RED
                } else {
                    egui::Color32::LIGHT_GREEN
                };
                ui.horizontal(|ui| {
                    ui.colored_label(color, &notice.text);
                    if ui.button("Dismiss").clicked() {
                        dismissed = true;
                    }
                });
            }
            if dismissed {
                if self.notice.as_ref().is_some_and(|n| n.acknowledges) {
                    self.controller.acknowledge();
                }
                self.notice = None;
            }
        });

        // Request periodic repaint so progress keeps flowing in
        ctx.request_repaint_after(std::time::Duration::from_millis(100));
    }
}
