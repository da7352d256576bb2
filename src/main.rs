// Image Re-encoder: drop images, pick a format and quality, download the result
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::path::PathBuf;
use std::time::Duration;

use iced::font::{Family, Weight};
use iced::futures::SinkExt;
use iced::widget::image::{self as image_widget, Handle};
use iced::widget::{
    button, column, container, pick_list, progress_bar, row, scrollable, slider, text, Space,
};
use iced::{
    executor, subscription, window, Application, Color, Command, Element, Event, Font, Length,
    Settings, Subscription, Theme,
};
use image_reencoder::{
    download, intake, BatchEvent, BatchOutcome, BatchRequest, EncodedResult, Orchestrator,
    OutputFormat, PipelineConfig, SelectedFile, Session, Tone,
};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const HEADING_FONT: Font = Font {
    family: Family::SansSerif,
    weight: Weight::Bold,
    stretch: iced::font::Stretch::Normal,
    monospaced: false,
};

const BODY_FONT: Font = Font {
    family: Family::SansSerif,
    weight: Weight::Normal,
    stretch: iced::font::Stretch::Normal,
    monospaced: false,
};

static FORMATS: [OutputFormat; 4] = OutputFormat::ALL;

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "avif", "tif", "tiff", "ico",
];

// A drop of several files arrives as one event per file.
const DROP_SETTLE: Duration = Duration::from_millis(80);

pub fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = PipelineConfig::from_env();
    info!(
        jobs = config.max_concurrency.get(),
        timeout = ?config.job_timeout,
        "starting image re-encoder"
    );

    ImageReencoder::run(Settings {
        window: iced::window::Settings {
            size: (520, 680),
            min_size: Some((480, 600)),
            resizable: true,
            decorations: true,
            ..Default::default()
        },
        default_font: BODY_FONT,
        default_text_size: 14.0,
        flags: config,
        ..Default::default()
    })
}

#[derive(Default)]
struct ImageReencoder {
    session: Session,
    config: PipelineConfig,
    running: Option<BatchRequest>,
    hovering: bool,
    dropped: Vec<PathBuf>,
    drop_generation: u64,
    preview: Option<Handle>,
    last_saved: Option<PathBuf>,
}

#[derive(Debug, Clone)]
enum Message {
    SelectFiles,
    SelectFolder,
    PathsChosen(Vec<PathBuf>),
    CandidatesReady(Vec<SelectedFile>),
    FileHovered,
    HoverLeft,
    FileDropped(PathBuf),
    DropSettled(u64),
    AlertClosed,
    FormatSelected(OutputFormat),
    QualityChanged(f32),
    Process,
    Batch(BatchEvent),
    BatchFinished(BatchOutcome),
    Download,
    Saved(Option<Result<PathBuf, String>>),
    OpenOutputFolder,
}

impl Application for ImageReencoder {
    type Message = Message;
    type Theme = Theme;
    type Executor = executor::Default;
    type Flags = PipelineConfig;

    fn new(config: PipelineConfig) -> (Self, Command<Message>) {
        let app = Self {
            config,
            ..Self::default()
        };
        (app, Command::none())
    }

    fn title(&self) -> String {
        String::from("Image Re-encoder")
    }

    fn update(&mut self, message: Message) -> Command<Message> {
        match message {
            Message::SelectFiles => {
                return Command::perform(select_files(), Message::PathsChosen);
            }
            Message::SelectFolder => {
                return Command::perform(select_folder(), Message::PathsChosen);
            }
            Message::PathsChosen(paths) => {
                if !paths.is_empty() {
                    return Command::perform(gather_candidates(paths), Message::CandidatesReady);
                }
            }
            Message::CandidatesReady(candidates) => {
                if let Err(e) = self.session.select(candidates) {
                    warn!("selection rejected: {e}");
                    return Command::perform(
                        alert("Please choose valid image files only."),
                        |_| Message::AlertClosed,
                    );
                }
            }
            Message::FileHovered => {
                if !self.hovering {
                    self.hovering = true;
                    self.dropped.clear();
                }
            }
            Message::HoverLeft => {
                self.hovering = false;
            }
            Message::FileDropped(path) => {
                self.hovering = false;
                self.dropped.push(path);
                self.drop_generation += 1;
                let generation = self.drop_generation;
                return Command::perform(
                    async move {
                        tokio::time::sleep(DROP_SETTLE).await;
                        generation
                    },
                    Message::DropSettled,
                );
            }
            Message::DropSettled(generation) => {
                if generation == self.drop_generation && !self.dropped.is_empty() {
                    let paths = std::mem::take(&mut self.dropped);
                    return Command::perform(gather_candidates(paths), Message::CandidatesReady);
                }
            }
            Message::AlertClosed => {}
            Message::FormatSelected(format) => {
                self.session.set_format(format);
            }
            Message::QualityChanged(quality) => {
                self.session.set_quality(quality);
            }
            Message::Process => {
                if let Some(request) = self.session.begin_batch() {
                    self.preview = None;
                    self.last_saved = None;
                    self.running = Some(request);
                }
            }
            Message::Batch(event) => {
                self.session.apply_event(event);
            }
            Message::BatchFinished(outcome) => {
                self.running = None;
                self.preview = match &outcome.result {
                    Some(result) if !outcome.is_archive() => {
                        Some(Handle::from_memory(result.data.clone()))
                    }
                    _ => None,
                };
                self.session.finish_batch(outcome);
            }
            Message::Download => {
                if let Some(result) = self.session.output().cloned() {
                    return Command::perform(save_result(result), Message::Saved);
                }
            }
            Message::Saved(saved) => match saved {
                Some(Ok(path)) => {
                    self.session.set_status(format!("Saved to {}", path.display()));
                    self.last_saved = Some(path);
                }
                Some(Err(e)) => {
                    warn!("save failed: {e}");
                    self.session.set_status(format!("Save failed: {e}"));
                }
                None => {}
            },
            Message::OpenOutputFolder => {
                if let Some(dir) = self.last_saved.as_ref().and_then(|path| path.parent()) {
                    if let Err(e) = open::that(dir) {
                        warn!("could not open {}: {e}", dir.display());
                    }
                }
            }
        }
        Command::none()
    }

    fn subscription(&self) -> Subscription<Message> {
        let drops = subscription::events_with(|event, _status| match event {
            Event::Window(window::Event::FileHovered(_)) => Some(Message::FileHovered),
            Event::Window(window::Event::FilesHoveredLeft) => Some(Message::HoverLeft),
            Event::Window(window::Event::FileDropped(path)) => Some(Message::FileDropped(path)),
            _ => None,
        });

        match &self.running {
            Some(request) => {
                Subscription::batch(vec![drops, run_batch(request.clone(), self.config.clone())])
            }
            None => drops,
        }
    }

    fn view(&self) -> Element<Message> {
        let session = &self.session;
        let busy = session.is_busy();

        // Title
        let title = text("Image Re-encoder").size(22).font(HEADING_FONT);

        // Drop zone
        let drop_hint = if self.hovering {
            "Release to add these images"
        } else {
            "Drop images anywhere on this window, or"
        };
        let drop_zone = container(
            column![
                text(drop_hint).size(13).font(BODY_FONT),
                row![
                    button("Select Files")
                        .on_press(Message::SelectFiles)
                        .padding([6, 12]),
                    button("Select Folder")
                        .on_press(Message::SelectFolder)
                        .padding([6, 12]),
                ]
                .spacing(8),
                match session.selection_label() {
                    Some(label) => text(label).size(12).font(BODY_FONT),
                    None => text("No images selected").size(12).font(BODY_FONT),
                },
            ]
            .spacing(8),
        )
        .width(Length::Fill)
        .padding(12)
        .style(iced::theme::Container::Box);

        // Format and quality
        let controls = if session.controls_visible() {
            let info = session.format_info();
            let quality_color = if info.quality_applies {
                Color::BLACK
            } else {
                Color::from_rgb8(160, 160, 160)
            };

            column![
                text("Output").size(16).font(HEADING_FONT),
                row![
                    text("Format:").size(13).font(BODY_FONT).width(80),
                    pick_list(
                        &FORMATS[..],
                        Some(session.format()),
                        Message::FormatSelected
                    ),
                ]
                .spacing(8),
                container(
                    row![
                        text(info.icon).size(16),
                        text(info.text)
                            .size(12)
                            .font(BODY_FONT)
                            .style(tone_color(info.tone)),
                    ]
                    .spacing(8),
                )
                .padding(8)
                .style(iced::theme::Container::Box),
                row![
                    text("Quality:").size(13).font(BODY_FONT).width(80),
                    slider(0.0..=1.0, session.quality(), Message::QualityChanged)
                        .step(0.01)
                        .width(Length::Fill),
                    text(session.quality_label())
                        .size(13)
                        .font(BODY_FONT)
                        .style(quality_color)
                        .width(70),
                ]
                .spacing(8),
                if busy {
                    button(text(session.process_label())).padding([8, 16])
                } else {
                    button(text(session.process_label()))
                        .on_press(Message::Process)
                        .padding([8, 16])
                },
            ]
            .spacing(8)
        } else {
            column![]
        };

        // Results
        let results = if session.results_visible() {
            let mut results = column![text("Results").size(16).font(HEADING_FONT)].spacing(8);

            if let Some(progress) = session.progress() {
                results = results.push(progress_bar(0.0..=1.0, progress).height(Length::Fixed(6.0)));
            }

            if let Some(summary) = session.summary() {
                let savings = summary.savings;
                let tag_color = match savings.kind() {
                    image_reencoder::report::SavingsKind::Saved => Color::from_rgb8(16, 185, 129),
                    image_reencoder::report::SavingsKind::Grew => Color::from_rgb8(244, 63, 94),
                };
                results = results.push(
                    row![
                        text(summary.label).size(13).font(BODY_FONT),
                        text(&summary.final_size).size(13).font(HEADING_FONT),
                        Space::with_width(Length::Fill),
                        text(savings.tag()).size(13).font(HEADING_FONT).style(tag_color),
                    ]
                    .spacing(8),
                );
            }

            if let Some(preview) = &self.preview {
                results = results.push(
                    image_widget::Image::new(preview.clone()).height(Length::Fixed(120.0)),
                );
            }

            if !session.failures().is_empty() {
                let failures: Vec<Element<Message>> = session
                    .failures()
                    .iter()
                    .map(|failure| {
                        row![
                            text("[FAIL]").size(12).font(HEADING_FONT).width(40),
                            text(&failure.name).size(12).font(BODY_FONT).width(120),
                            text(&failure.reason).size(12).font(BODY_FONT),
                        ]
                        .spacing(8)
                        .into()
                    })
                    .collect();

                results = results.push(
                    container(scrollable(column(failures).spacing(3)).height(Length::Fixed(80.0)))
                        .style(iced::theme::Container::Box)
                        .padding(8),
                );
            }

            let download = if session.output().is_some() && !busy {
                button(text(session.download_label()))
                    .on_press(Message::Download)
                    .style(iced::theme::Button::Positive)
                    .padding([8, 16])
            } else {
                button(text(session.download_label()))
                    .style(iced::theme::Button::Secondary)
                    .padding([8, 16])
            };

            let mut actions = row![download].spacing(8);
            if self.last_saved.is_some() {
                actions = actions.push(
                    button("Open Folder")
                        .on_press(Message::OpenOutputFolder)
                        .padding([8, 16]),
                );
            }

            results
                .push(actions)
                .push(text(session.status()).size(12).font(BODY_FONT))
        } else {
            column![]
        };

        // Main layout
        let content = column![
            title,
            Space::with_height(12),
            drop_zone,
            Space::with_height(12),
            controls,
            Space::with_height(12),
            results,
        ]
        .padding(16);

        container(scrollable(content))
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn theme(&self) -> Theme {
        Theme::Light
    }
}

fn tone_color(tone: Tone) -> Color {
    match tone {
        Tone::Accent => Color::from_rgb8(107, 33, 168),
        Tone::Success => Color::from_rgb8(22, 101, 52),
        Tone::Info => Color::from_rgb8(30, 64, 175),
        Tone::Warning => Color::from_rgb8(154, 52, 18),
    }
}

/// Drives one batch and forwards its events; identified by the batch id so
/// a new run starts a fresh subscription.
fn run_batch(request: BatchRequest, config: PipelineConfig) -> Subscription<Message> {
    subscription::channel(request.id, 100, move |mut output| async move {
        let orchestrator = Orchestrator::new(config);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let BatchRequest {
            files,
            format,
            quality,
            ..
        } = request;

        let run = orchestrator.run(files, format, quality, Some(tx));
        tokio::pin!(run);

        let outcome = loop {
            tokio::select! {
                outcome = &mut run => break outcome,
                Some(event) = rx.recv() => {
                    let _ = output.send(Message::Batch(event)).await;
                }
            }
        };

        while let Ok(event) = rx.try_recv() {
            let _ = output.send(Message::Batch(event)).await;
        }
        let _ = output.send(Message::BatchFinished(outcome)).await;

        loop {
            iced::futures::future::pending::<()>().await;
        }
    })
}

async fn select_files() -> Vec<PathBuf> {
    rfd::AsyncFileDialog::new()
        .add_filter("Images", IMAGE_EXTENSIONS)
        .add_filter("All files", &["*"])
        .pick_files()
        .await
        .map(|handles| {
            handles
                .iter()
                .map(|handle| handle.path().to_path_buf())
                .collect()
        })
        .unwrap_or_default()
}

async fn select_folder() -> Vec<PathBuf> {
    rfd::AsyncFileDialog::new()
        .pick_folder()
        .await
        .map(|handle| vec![handle.path().to_path_buf()])
        .unwrap_or_default()
}

async fn gather_candidates(paths: Vec<PathBuf>) -> Vec<SelectedFile> {
    tokio::task::spawn_blocking(move || intake::collect_candidates(&paths))
        .await
        .unwrap_or_default()
}

async fn alert(description: &'static str) {
    rfd::AsyncMessageDialog::new()
        .set_level(rfd::MessageLevel::Warning)
        .set_title("Image Re-encoder")
        .set_description(description)
        .set_buttons(rfd::MessageButtons::Ok)
        .show()
        .await;
}

/// Asks where to save, then writes. `None` when the dialog was cancelled.
async fn save_result(result: EncodedResult) -> Option<Result<PathBuf, String>> {
    let destination = rfd::AsyncFileDialog::new()
        .set_file_name(&result.filename)
        .save_file()
        .await?
        .path()
        .to_path_buf();

    let saved = tokio::task::spawn_blocking(move || download::save(&result, &destination))
        .await
        .map_err(|e| e.to_string())
        .and_then(|saved| saved.map_err(|e| e.to_string()));
    Some(saved)
}
