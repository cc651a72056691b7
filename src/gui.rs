//! Desktop window that paints the dashboard page.

use std::collections::HashMap;
use std::sync::Arc;

use eframe::egui::{self, Color32, RichText};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use program_dashboard::alerts::{AlertId, Severity};
use program_dashboard::api::HttpBackend;
use program_dashboard::document::{Binding, Document, PaneContent, ALERT_CONTAINER_ID};
use program_dashboard::status::{ProgramStatus, StatusCard};
use program_dashboard::{DashboardClient, DashboardConfig, ProgramId};

// Palette
const BG_PRIMARY: Color32 = Color32::from_rgb(0x0f, 0x0f, 0x14);
const BG_SECONDARY: Color32 = Color32::from_rgb(0x16, 0x16, 0x1e);
const BG_TERTIARY: Color32 = Color32::from_rgb(0x1e, 0x1e, 0x28);
const ACCENT_SECONDARY: Color32 = Color32::from_rgb(0xa7, 0x8b, 0xfa);
const TEXT_PRIMARY: Color32 = Color32::from_rgb(0xe4, 0xe4, 0xe7);
const TEXT_SECONDARY: Color32 = Color32::from_rgb(0xa1, 0xa1, 0xaa);
const TEXT_MUTED: Color32 = Color32::from_rgb(0x71, 0x71, 0x7a);
const SUCCESS: Color32 = Color32::from_rgb(0x22, 0xc5, 0x5e);
const WARNING: Color32 = Color32::from_rgb(0xf5, 0x9e, 0x0b);
const DANGER: Color32 = Color32::from_rgb(0xef, 0x44, 0x44);

const LOG_PANE_HEIGHT: f32 = 220.0;

/// Things the user asked for during one frame, run after painting.
enum UiAction {
    Start(ProgramId),
    Stop(ProgramId),
    Clear(ProgramId),
    Copy(ProgramId),
    RefreshAll,
    Dismiss(AlertId),
}

pub struct DashboardApp {
    client: DashboardClient<HttpBackend>,
    runtime: Handle,
    title: String,
    base_url: String,
    snapshot: Document,
    seen_version: u64,
    seen_scrolls: HashMap<ProgramId, u64>,
    repaint_task: JoinHandle<()>,
}

impl DashboardApp {
    fn new(
        cc: &eframe::CreationContext<'_>,
        config: &DashboardConfig,
        client: DashboardClient<HttpBackend>,
        runtime: Handle,
    ) -> Self {
        apply_theme(&cc.egui_ctx);

        // Repaint whenever the page changes
        let ctx = cc.egui_ctx.clone();
        let mut rx = client.page().subscribe();
        let repaint_task = runtime.spawn(async move {
            loop {
                if rx.changed().await.is_err() {
                    break;
                }
                ctx.request_repaint();
            }
        });

        let seen_version = client.page().version();
        let snapshot = client.page().read(Document::clone);
        client.initialize();

        Self {
            client,
            runtime,
            title: config.title.clone(),
            base_url: config.base_url.clone(),
            snapshot,
            seen_version,
            seen_scrolls: HashMap::new(),
            repaint_task,
        }
    }

    fn refresh_snapshot(&mut self) {
        let version = self.client.page().version();
        if version != self.seen_version {
            self.snapshot = self.client.page().read(Document::clone);
            self.seen_version = version;
        }
    }

    fn run(&mut self, action: UiAction) {
        match action {
            UiAction::Start(program) => {
                let client = self.client.clone();
                self.runtime.spawn(async move {
                    client.start_program(program).await;
                });
            }
            UiAction::Stop(program) => {
                let client = self.client.clone();
                self.runtime.spawn(async move {
                    client.stop_program(program).await;
                });
            }
            UiAction::Clear(program) => {
                let request = self.client.request_clear_logs(program);
                if confirm_dialog(&self.title, request.prompt()) {
                    self.runtime.spawn(async move {
                        request.confirm().await;
                    });
                }
            }
            UiAction::Copy(program) => {
                let text = self
                    .snapshot
                    .pane(program)
                    .map(|pane| pane.lines().collect::<Vec<_>>().join("\n"))
                    .unwrap_or_default();
                match arboard::Clipboard::new().and_then(|mut cb| cb.set_text(text)) {
                    Ok(()) => info!(%program, "copied log pane to clipboard"),
                    Err(e) => warn!(%program, error = %e, "clipboard unavailable"),
                }
            }
            UiAction::RefreshAll => {
                let client = self.client.clone();
                self.runtime.spawn(async move {
                    client.refresh_all().await;
                });
            }
            UiAction::Dismiss(id) => {
                self.client.dismiss_alert(&id);
            }
        }
    }

    fn header(&self, ui: &mut egui::Ui, actions: &mut Vec<UiAction>) {
        ui.horizontal(|ui| {
            ui.label(RichText::new("⚡").size(20.0));
            ui.label(RichText::new(&self.title).size(18.0).strong().color(TEXT_PRIMARY));
            ui.label(RichText::new(" · ").color(TEXT_MUTED));
            ui.label(RichText::new(&self.base_url).color(ACCENT_SECONDARY));
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("↻ Refresh all").clicked() {
                    actions.push(UiAction::RefreshAll);
                }
                ui.label(
                    RichText::new(format!("delivery: {}", self.client.settings().delivery))
                        .color(TEXT_MUTED),
                );
            });
        });
    }

    fn program_card(&mut self, ui: &mut egui::Ui, program: ProgramId, actions: &mut Vec<UiAction>) {
        let scroll = match self.snapshot.pane(program) {
            Some(pane) => {
                let requests = pane.scroll_requests();
                self.seen_scrolls.insert(program, requests) != Some(requests)
            }
            None => false,
        };

        let doc = &self.snapshot;
        let locale = doc.locale();
        let fallback = StatusCard::new(locale);
        let card = doc.card(program).unwrap_or(&fallback);
        let name = card
            .name
            .clone()
            .unwrap_or_else(|| locale.program_label(program));

        egui::Frame::default()
            .fill(BG_SECONDARY)
            .corner_radius(8.0)
            .inner_margin(10.0)
            .show(ui, |ui| {
                ui.push_id(Binding::StatusIndicator.element_id(program), |ui| {
                    ui.horizontal(|ui| {
                        status_dot(ui, card);
                        ui.label(RichText::new(&name).size(15.0).strong());
                        ui.label(RichText::new(&card.label).color(status_color(card)));
                        ui.label(RichText::new(format!("PID {}", card.pid_text)).color(TEXT_MUTED));
                        if let Some(updated) = &card.last_update {
                            ui.label(RichText::new(updated).color(TEXT_MUTED));
                        }
                    });
                });

                ui.horizontal(|ui| {
                    let start = ui.push_id(Binding::StartButton.element_id(program), |ui| {
                        ui.add_enabled(card.start_enabled, egui::Button::new("▶ Start"))
                    });
                    if start.inner.clicked() {
                        actions.push(UiAction::Start(program));
                    }
                    let stop = ui.push_id(Binding::StopButton.element_id(program), |ui| {
                        ui.add_enabled(card.stop_enabled, egui::Button::new("◼ Stop"))
                    });
                    if stop.inner.clicked() {
                        actions.push(UiAction::Stop(program));
                    }
                    if ui.button("🗑 Clear").clicked() {
                        actions.push(UiAction::Clear(program));
                    }
                    if ui.button("📋 Copy").clicked() {
                        actions.push(UiAction::Copy(program));
                    }
                    if let Some(pane) = doc.pane(program) {
                        ui.label(RichText::new(pane.feed_state().as_str()).color(TEXT_MUTED));
                    }
                });

                log_pane(ui, doc, program, scroll);
            });
    }

    fn alerts(&self, ctx: &egui::Context, actions: &mut Vec<UiAction>) {
        if self.snapshot.alerts().is_empty() {
            return;
        }
        egui::Area::new(egui::Id::new(ALERT_CONTAINER_ID))
            .anchor(egui::Align2::RIGHT_TOP, [-12.0, 48.0])
            .show(ctx, |ui| {
                ui.set_max_width(360.0);
                for alert in self.snapshot.alerts() {
                    egui::Frame::default()
                        .fill(BG_TERTIARY)
                        .stroke(egui::Stroke::new(1.0, severity_color(alert.severity)))
                        .corner_radius(8.0)
                        .inner_margin(8.0)
                        .show(ui, |ui| {
                            ui.horizontal_wrapped(|ui| {
                                ui.label(
                                    RichText::new(alert.severity.glyph())
                                        .color(severity_color(alert.severity)),
                                );
                                // Plain text label: the message is never interpreted.
                                ui.label(RichText::new(alert.message.as_str()).color(TEXT_PRIMARY));
                                if ui.small_button("×").clicked() {
                                    actions.push(UiAction::Dismiss(alert.id.clone()));
                                }
                            });
                        });
                    ui.add_space(4.0);
                }
            });
    }
}

impl eframe::App for DashboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.refresh_snapshot();
        let mut actions = Vec::new();

        egui::TopBottomPanel::top("header")
            .frame(egui::Frame::default().fill(BG_SECONDARY).inner_margin(10.0))
            .show(ctx, |ui| self.header(ui, &mut actions));

        egui::CentralPanel::default()
            .frame(egui::Frame::default().fill(BG_PRIMARY).inner_margin(12.0))
            .show(ctx, |ui| {
                egui::ScrollArea::vertical()
                    .id_salt("programs")
                    .auto_shrink([false, false])
                    .show(ui, |ui| {
                        let programs: Vec<ProgramId> = self.snapshot.programs().collect();
                        for pair in programs.chunks(2) {
                            ui.columns(2, |columns| {
                                for (column, program) in columns.iter_mut().zip(pair) {
                                    self.program_card(column, *program, &mut actions);
                                }
                            });
                            ui.add_space(10.0);
                        }
                    });
            });

        self.alerts(ctx, &mut actions);

        for action in actions {
            self.run(action);
        }
    }
}

impl Drop for DashboardApp {
    fn drop(&mut self) {
        self.repaint_task.abort();
        self.client.teardown();
    }
}

fn log_pane(ui: &mut egui::Ui, doc: &Document, program: ProgramId, scroll: bool) {
    let locale = doc.locale();
    let Some(pane) = doc.pane(program) else {
        return;
    };

    egui::Frame::default()
        .fill(BG_PRIMARY)
        .corner_radius(6.0)
        .inner_margin(6.0)
        .show(ui, |ui| {
            egui::ScrollArea::vertical()
                .id_salt(Binding::Logs.element_id(program))
                .max_height(LOG_PANE_HEIGHT)
                .auto_shrink([false, false])
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    match pane.content() {
                        PaneContent::Placeholder(p) => {
                            let color = if p.is_error() { DANGER } else { TEXT_MUTED };
                            ui.label(RichText::new(p.text(locale)).italics().color(color));
                        }
                        PaneContent::Lines(lines) => {
                            for line in lines {
                                ui.label(
                                    RichText::new(line.as_str())
                                        .monospace()
                                        .color(line_color(line)),
                                );
                            }
                        }
                    }
                    if scroll {
                        ui.scroll_to_cursor(Some(egui::Align::BOTTOM));
                    }
                });
        });
}

fn apply_theme(ctx: &egui::Context) {
    let mut visuals = egui::Visuals::dark();
    visuals.panel_fill = BG_PRIMARY;
    visuals.window_fill = BG_SECONDARY;
    visuals.override_text_color = Some(TEXT_PRIMARY);
    ctx.set_visuals(visuals);
}

fn status_color(card: &StatusCard) -> Color32 {
    match &card.status {
        Some(ProgramStatus::Running) => SUCCESS,
        Some(ProgramStatus::Stopped) | None => TEXT_MUTED,
        Some(ProgramStatus::Error) => DANGER,
        Some(ProgramStatus::Other(_)) => WARNING,
    }
}

fn status_dot(ui: &mut egui::Ui, card: &StatusCard) {
    let (rect, response) = ui.allocate_exact_size(egui::vec2(10.0, 10.0), egui::Sense::hover());
    ui.painter().circle_filled(rect.center(), 5.0, status_color(card));
    response.on_hover_text(card.indicator_class());
}

fn severity_color(severity: Severity) -> Color32 {
    match severity {
        Severity::Success => SUCCESS,
        Severity::Danger => DANGER,
        Severity::Warning => WARNING,
        Severity::Info => ACCENT_SECONDARY,
    }
}

fn line_color(line: &str) -> Color32 {
    let lower = line.to_lowercase();
    let is_error = ["error", "critical", "fatal", "panic", "traceback", "exception", "ошибка"]
        .iter()
        .any(|needle| lower.contains(needle));
    if is_error {
        DANGER
    } else if lower.contains("warn") {
        WARNING
    } else {
        TEXT_SECONDARY
    }
}

fn confirm_dialog(title: &str, prompt: &str) -> bool {
    rfd::MessageDialog::new()
        .set_level(rfd::MessageLevel::Warning)
        .set_title(title)
        .set_description(prompt)
        .set_buttons(rfd::MessageButtons::YesNo)
        .show()
        == rfd::MessageDialogResult::Yes
}

/// Load the application icon from `assets/icon.png` next to the executable,
/// or in the working directory.
fn load_icon() -> Option<egui::IconData> {
    let exe_path = std::env::current_exe().ok()?;
    let exe_dir = exe_path.parent()?;
    let icon_path = exe_dir.join("assets").join("icon.png");

    let icon_path = if icon_path.exists() {
        icon_path
    } else {
        std::path::PathBuf::from("assets/icon.png")
    };

    let icon_bytes = std::fs::read(&icon_path).ok()?;
    let image = image::load_from_memory(&icon_bytes).ok()?.to_rgba8();
    let (width, height) = image.dimensions();
    Some(egui::IconData {
        rgba: image.into_raw(),
        width,
        height,
    })
}

/// Open the window and block until it is closed.
pub fn run(
    config: &DashboardConfig,
    client: DashboardClient<HttpBackend>,
    runtime: Handle,
) -> Result<(), eframe::Error> {
    let mut viewport = egui::ViewportBuilder::default()
        .with_title(&config.title)
        .with_inner_size([1100.0, 700.0])
        .with_min_inner_size([800.0, 500.0]);
    if let Some(icon) = load_icon() {
        viewport = viewport.with_icon(Arc::new(icon));
    }

    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    let config = config.clone();
    let app_name = config.title.clone();
    eframe::run_native(
        &app_name,
        options,
        Box::new(move |cc| Ok(Box::new(DashboardApp::new(cc, &config, client, runtime)))),
    )
}
