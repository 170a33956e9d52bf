//! PhishStop Desktop — egui app state and UI.

use chrono::{DateTime, Local};
use eframe::egui;
use lib::channels::{LocalEvent, LocalReceiver, EXTRA_MESSAGE, EXTRA_SENDER};
use lib::config::Config;
use lib::lifecycle::{ReceiverHost, ReceiverLifecycleState};
use lib::permissions::{GrantedPermissions, Permission, PermissionOutcome, REQUIRED_PERMISSIONS};
use lib::pipeline::Pipeline;
use lib::platform::RawEvent;
use lib::routing::MessageListener;
use lib::sms::FORMAT_3GPP;
use lib::ui::{ui_context, UiLoop};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock};

const LOG_BUFFER_MAX_LINES: usize = 2000;

/// Ring buffer of log lines for the Logs screen. Written by DesktopLogger.
static LOG_LINES: OnceLock<Mutex<VecDeque<String>>> = OnceLock::new();

fn log_buffer() -> &'static Mutex<VecDeque<String>> {
    LOG_LINES.get_or_init(|| Mutex::new(VecDeque::new()))
}

fn push_log_line(line: String) {
    if let Ok(mut buf) = log_buffer().lock() {
        buf.push_back(line);
        while buf.len() > LOG_BUFFER_MAX_LINES {
            buf.pop_front();
        }
    }
}

/// Logger that appends to LOG_LINES for display in the Logs screen.
struct DesktopLogger;

impl log::Log for DesktopLogger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let line = format!(
            "{} [{}] {}: {}",
            Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        );
        push_log_line(line);
    }

    fn flush(&self) {}
}

static LOGGER: DesktopLogger = DesktopLogger;

#[derive(Clone, Copy, PartialEq, Eq, Default)]
enum Screen {
    #[default]
    Message,
    Permissions,
    Logs,
}

/// What the Message screen shows. Written from UI tasks, read every frame.
#[derive(Default)]
struct LastMessage {
    sender: Option<String>,
    body: String,
    received_at: Option<DateTime<Local>>,
    /// Deliveries seen through the local channel (only while resumed).
    channel_deliveries: usize,
}

type SharedMessage = Arc<Mutex<LastMessage>>;

/// Direct listener: updates the labels.
struct DisplayListener(SharedMessage);

impl MessageListener for DisplayListener {
    fn on_message_received(&self, sender: Option<&str>, body: &str) {
        if let Ok(mut last) = self.0.lock() {
            last.sender = sender.map(str::to_string);
            last.body = body.to_string();
            last.received_at = Some(Local::now());
        }
    }
}

/// Channel subscriber: same labels, plus a counter.
struct DisplayChannelReceiver(SharedMessage);

impl LocalReceiver for DisplayChannelReceiver {
    fn on_receive(&self, event: &LocalEvent) {
        let (Some(sender), Some(message)) =
            (event.field(EXTRA_SENDER), event.field(EXTRA_MESSAGE))
        else {
            log::error!("received null sender or message in local receiver");
            return;
        };
        if let Ok(mut last) = self.0.lock() {
            last.sender = Some(sender.to_string());
            last.body = message.to_string();
            last.received_at = Some(Local::now());
            last.channel_deliveries += 1;
        }
    }
}

pub struct PhishStopApp {
    /// Owns the platform and channel registrations for this window.
    host: ReceiverHost,
    /// Simulated grants; the pipeline's permission checker.
    permissions: Arc<GrantedPermissions>,
    /// UI tasks posted by the delivery router; drained every frame.
    ui_loop: UiLoop,
    last: SharedMessage,
    /// strftime pattern for "Received at".
    time_format: String,
    current_screen: Screen,
    /// Answers the simulated permission dialog will give, per required permission.
    dialog_answers: Vec<(Permission, bool)>,
    /// Result of the last permission request round.
    permission_notice: Option<String>,
    /// Hex PDUs for the simulator, one per line.
    simulator_input: String,
    /// Format tag sent with simulated broadcasts; empty means none.
    simulator_format: String,
    simulator_error: Option<String>,
    /// Whether the window is in the resumed state (channel may be active).
    resumed: bool,
}

impl PhishStopApp {
    /// Space between the main screen title and the content below.
    const SCREEN_TITLE_BOTTOM_SPACING: f32 = 18.0;
    /// Space between the bottom of the content and the window edge.
    const SCREEN_FOOTER_SPACING: f32 = 48.0;

    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let _ = LOG_LINES.get_or_init(|| Mutex::new(VecDeque::new()));
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(log::LevelFilter::Debug);
        log::info!("desktop started");

        let config = match lib::config::load_config(None) {
            Ok((config, path)) => {
                log::info!("loaded config from {}", path.display());
                config
            }
            Err(e) => {
                log::error!("failed to load config, using defaults: {:#}", e);
                Config::default()
            }
        };

        let permissions = Arc::new(GrantedPermissions::with_granted(
            config.permissions.granted.iter().copied(),
        ));
        let (ui, ui_loop) = ui_context();
        let repaint = cc.egui_ctx.clone();
        let ui = ui.with_wake(move || repaint.request_repaint());
        let pipeline = Pipeline::from_config(&config, permissions.clone(), ui);

        let last = SharedMessage::default();
        let mut host = ReceiverHost::new(
            pipeline,
            Arc::new(DisplayListener(last.clone())),
            Arc::new(DisplayChannelReceiver(last.clone())),
        );
        host.on_create();

        let dialog_answers = REQUIRED_PERMISSIONS.iter().map(|p| (*p, true)).collect();
        let mut app = Self {
            host,
            permissions,
            ui_loop,
            last,
            time_format: config.display.time_format.clone(),
            current_screen: Screen::default(),
            dialog_answers,
            permission_notice: None,
            simulator_input: String::new(),
            simulator_format: FORMAT_3GPP.to_string(),
            simulator_error: None,
            resumed: false,
        };
        app.resume();
        app
    }

    fn resume(&mut self) {
        self.resumed = true;
        if !self.host.on_resume() {
            self.request_permissions();
        }
    }

    fn pause(&mut self) {
        self.resumed = false;
        self.host.on_pause();
    }

    /// One round of the permission dialog: the checkboxes are the user's answers.
    fn request_permissions(&mut self) {
        let missing = self.host.missing_permissions();
        if missing.is_empty() {
            self.permission_notice = None;
            if self.resumed {
                self.host.on_permissions_granted();
            }
            return;
        }
        let results: Vec<(Permission, bool)> = missing
            .iter()
            .map(|p| {
                let answer = self
                    .dialog_answers
                    .iter()
                    .find(|(q, _)| q == p)
                    .map(|(_, a)| *a)
                    .unwrap_or(false);
                (*p, answer)
            })
            .collect();
        for (p, granted) in &results {
            if *granted {
                self.permissions.grant(*p);
            }
        }
        match PermissionOutcome::from_results(results) {
            PermissionOutcome::AllGranted => {
                self.permission_notice = None;
                if self.resumed {
                    self.host.on_permissions_granted();
                }
            }
            outcome => {
                let msg = outcome.denied_message().unwrap_or_default();
                log::warn!("{}", msg.replace('\n', " "));
                self.permission_notice = Some(msg);
            }
        }
    }

    fn simulate(&mut self) {
        self.simulator_error = None;
        let pdus: Result<Vec<Vec<u8>>, String> = self
            .simulator_input
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .enumerate()
            .map(|(i, l)| hex::decode(l).map_err(|e| format!("line {}: {}", i + 1, e)))
            .collect();
        let pdus = match pdus {
            Ok(p) => p,
            Err(e) => {
                self.simulator_error = Some(e);
                return;
            }
        };
        let format = self.simulator_format.trim();
        let format = (!format.is_empty()).then_some(format);
        let event = RawEvent::sms_received(pdus, format);
        let n = self.host.pipeline().platform.dispatch(&event);
        log::debug!("simulated broadcast reached {} receiver(s)", n);
    }

    fn state_label(&self) -> &'static str {
        match self.host.state() {
            ReceiverLifecycleState::Inactive => "Inactive",
            ReceiverLifecycleState::PlatformRegistered => "SMS receiver only",
            ReceiverLifecycleState::PlatformAndChannelRegistered => "SMS receiver + local channel",
        }
    }

    fn ui_message_screen(&mut self, ui: &mut egui::Ui) {
        ui.add_space(24.0);
        ui.heading("Message");
        ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);

        if let Ok(last) = self.last.lock() {
            if let Some(at) = last.received_at {
                ui.label(format!("From: {}", last.sender.as_deref().unwrap_or("")));
                ui.add_space(8.0);
                ui.label(last.body.as_str());
                ui.add_space(8.0);
                ui.label(format!("Received at: {}", at.format(&self.time_format)));
                ui.add_space(4.0);
                ui.label(
                    egui::RichText::new(format!(
                        "Local channel deliveries: {}",
                        last.channel_deliveries
                    ))
                    .weak(),
                );
            } else {
                ui.label("No message received yet.");
            }
        }

        ui.add_space(24.0);
        ui.separator();
        ui.add_space(12.0);
        ui.label(egui::RichText::new("Simulator").strong());
        ui.label("Hex PDUs, one per line, delivered as a single SMS broadcast.");
        ui.add_space(8.0);
        ui.horizontal(|ui| {
            ui.label("Format:");
            ui.add(egui::TextEdit::singleline(&mut self.simulator_format).desired_width(80.0));
        });
        ui.add(
            egui::TextEdit::multiline(&mut self.simulator_input)
                .font(egui::TextStyle::Monospace)
                .desired_rows(4)
                .desired_width(f32::INFINITY),
        );
        ui.add_space(8.0);
        if ui.button("Deliver").clicked() {
            self.simulate();
        }
        if let Some(err) = &self.simulator_error {
            ui.add_space(8.0);
            ui.colored_label(egui::Color32::RED, err.as_str());
        }
        ui.add_space(Self::SCREEN_FOOTER_SPACING);
    }

    fn ui_permissions_screen(&mut self, ui: &mut egui::Ui) {
        ui.add_space(24.0);
        ui.heading("Permissions");
        ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);

        egui::Grid::new("permissions_grid")
            .num_columns(3)
            .spacing([24.0, 8.0])
            .show(ui, |ui| {
                ui.label(egui::RichText::new("Permission").strong());
                ui.label(egui::RichText::new("Granted").strong());
                ui.label(egui::RichText::new("Answer on request").strong());
                ui.end_row();
                for (p, answer) in self.dialog_answers.iter_mut() {
                    ui.label(p.display_name());
                    let granted = self.permissions.granted().contains(p);
                    if granted {
                        if ui.button("Revoke").clicked() {
                            self.permissions.revoke(*p);
                            log::info!("revoked {}", p.platform_name());
                        }
                    } else {
                        ui.label("No");
                    }
                    ui.checkbox(answer, "Allow");
                    ui.end_row();
                }
            });

        ui.add_space(12.0);
        if ui.button("Request permissions").clicked() {
            self.request_permissions();
        }
        if let Some(notice) = &self.permission_notice {
            ui.add_space(12.0);
            ui.colored_label(egui::Color32::YELLOW, notice.as_str());
        }
        ui.add_space(Self::SCREEN_FOOTER_SPACING);
    }

    fn ui_logs_screen(&self, ui: &mut egui::Ui) {
        ui.add_space(24.0);
        ui.heading("Logs");
        ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);

        let lines: Vec<String> = log_buffer()
            .lock()
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default();

        let available = ui.available_height();
        let scroll_height = (available - Self::SCREEN_FOOTER_SPACING).max(0.0);
        egui::ScrollArea::vertical()
            .max_height(scroll_height)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in &lines {
                    ui.label(
                        egui::RichText::new(line.as_str()).family(egui::FontFamily::Monospace),
                    );
                }
                if lines.is_empty() {
                    ui.label("No log output yet.");
                }
            });
        ui.add_space(Self::SCREEN_FOOTER_SPACING);
    }
}

impl Drop for PhishStopApp {
    fn drop(&mut self) {
        self.host.on_destroy();
    }
}

impl eframe::App for PhishStopApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ui_loop.drain();

        // Header with title and lifecycle controls
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            egui::Frame::none()
                .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                .show(ui, |ui| {
                    ui.add_space(16.0);
                    ui.horizontal(|ui| {
                        ui.heading("PhishStop");
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            if self.resumed {
                                if ui.button("Pause").clicked() {
                                    self.pause();
                                }
                            } else if ui.button("Resume").clicked() {
                                self.resume();
                            }
                            ui.add_space(12.0);
                            ui.label(egui::RichText::new(self.state_label()).weak());
                        });
                    });
                    ui.add_space(16.0);
                });
        });

        let current_screen = &mut self.current_screen;
        egui::SidePanel::left("sidebar")
            .resizable(false)
            .exact_width(160.0)
            .show(ctx, |ui| {
                egui::Frame::none()
                    .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                    .show(ui, |ui| {
                        ui.add_space(24.0);
                        if ui.selectable_label(*current_screen == Screen::Message, "Message").clicked() {
                            *current_screen = Screen::Message;
                        }
                        ui.add_space(12.0);
                        if ui
                            .selectable_label(*current_screen == Screen::Permissions, "Permissions")
                            .clicked()
                        {
                            *current_screen = Screen::Permissions;
                        }
                        ui.add_space(12.0);
                        if ui.selectable_label(*current_screen == Screen::Logs, "Logs").clicked() {
                            *current_screen = Screen::Logs;
                        }
                    });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::Frame::none()
                .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                .show(ui, |ui| match self.current_screen {
                    Screen::Message => {
                        egui::ScrollArea::vertical().show(ui, |ui| self.ui_message_screen(ui));
                    }
                    Screen::Permissions => self.ui_permissions_screen(ui),
                    // Logs screen has its own scroll area; avoid double scrollbars
                    Screen::Logs => self.ui_logs_screen(ui),
                });
        });
    }
}
