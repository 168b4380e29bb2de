use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use egui_plot::{Line, Plot};
use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use iqtrim::control::{self, ChangeHandler, ControlSpec, ControlSurface};
use iqtrim::device::SinkAdapter;
use iqtrim::monitor::MonitorFeed;
use iqtrim::params::{Observer, Parameter};
use iqtrim::{AppConfig, ParameterStore, Pipeline};

#[derive(Parser, Debug)]
#[command(name = "iqtrim_gui")]
#[command(about = "I/Q impairment pre-correction - GUI", long_about = None)]
struct Args {
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    #[arg(short = 'd', long)]
    device_args: Option<String>,

    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

const FFT_SIZE: usize = 1024;
const SPECTRUM_INTERVAL: Duration = Duration::from_millis(66);
const SPECTRUM_AVERAGING: f32 = 0.3;
const MAX_LOG_LINES: usize = 1000;

enum GuiUpdate {
    Value(Parameter, f64),
    Log(String),
}

struct GuiLogger {
    tx: Sender<GuiUpdate>,
    max_level: log::LevelFilter,
}

impl log::Log for GuiLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            let msg = format!("[{}] {}", record.level(), record.args());
            let _ = self.tx.send(GuiUpdate::Log(msg));
        }
    }

    fn flush(&self) {}
}

struct Widget {
    spec: ControlSpec,
    value: f64,
    text: String,
    on_change: ChangeHandler,
}

/// Slider plus text box per control
struct GuiSurface {
    tx: Sender<GuiUpdate>,
    widgets: Vec<Widget>,
}

impl ControlSurface for GuiSurface {
    fn register(&mut self, spec: &ControlSpec, value: f64, on_change: ChangeHandler) {
        self.widgets.push(Widget {
            spec: *spec,
            value,
            text: spec.parameter.format_value(value),
            on_change,
        });
    }

    fn display(&self) -> Observer {
        let tx = self.tx.clone();
        Box::new(move |parameter, value| {
            let _ = tx.send(GuiUpdate::Value(parameter, value));
        })
    }
}

/// Averaged power spectrum of the monitor feed, DC in the middle
struct Spectrum {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex32>,
    power_db: Vec<f32>,
    last_update: Instant,
}

impl Spectrum {
    fn new() -> Self {
        let fft = FftPlanner::<f32>::new().plan_fft_forward(FFT_SIZE);
        let window = (0..FFT_SIZE)
            .map(|n| {
                let x = std::f32::consts::TAU * n as f32 / FFT_SIZE as f32;
                0.5 - 0.5 * x.cos()
            })
            .collect();
        Self {
            fft,
            window,
            buffer: vec![Complex32::default(); FFT_SIZE],
            power_db: vec![-150.0; FFT_SIZE],
            last_update: Instant::now(),
        }
    }

    fn update(&mut self, feed: &MonitorFeed) {
        // Drain every frame so the tap keeps room, analyze at a lower rate
        let latest = feed.try_iter().filter(|b| b.len() >= FFT_SIZE).last();
        if self.last_update.elapsed() < SPECTRUM_INTERVAL {
            return;
        }
        let Some(block) = latest else {
            return;
        };
        self.last_update = Instant::now();

        for ((out, s), w) in self.buffer.iter_mut().zip(&block[..FFT_SIZE]).zip(&self.window) {
            *out = *s * *w;
        }
        self.fft.process(&mut self.buffer);

        let norm = 1.0 / (FFT_SIZE as f32 * FFT_SIZE as f32);
        for (k, bin) in self.buffer.iter().enumerate() {
            // fftshift: bin k lands at (k + N/2) mod N
            let idx = (k + FFT_SIZE / 2) % FFT_SIZE;
            let db = 10.0 * (bin.norm_sqr() * norm).max(1e-20).log10();
            self.power_db[idx] += SPECTRUM_AVERAGING * (db - self.power_db[idx]);
        }
    }

    fn points(&self, sample_rate: f64) -> Vec<[f64; 2]> {
        let bin_hz = sample_rate / FFT_SIZE as f64;
        self.power_db
            .iter()
            .enumerate()
            .map(|(i, &db)| {
                let f = (i as f64 - (FFT_SIZE / 2) as f64) * bin_hz;
                [f / 1e3, db as f64]
            })
            .collect()
    }
}

struct IqTrimApp {
    rx: Receiver<GuiUpdate>,
    surface: GuiSurface,
    params: Arc<ParameterStore>,
    pipeline: Option<Pipeline>,
    monitor: Option<MonitorFeed>,
    spectrum: Spectrum,
    log_lines: VecDeque<String>,
    stop_status: Option<String>,
}

impl IqTrimApp {
    fn new(
        _cc: &eframe::CreationContext<'_>,
        rx: Receiver<GuiUpdate>,
        surface: GuiSurface,
        params: Arc<ParameterStore>,
        mut pipeline: Pipeline,
    ) -> Self {
        let monitor = pipeline.take_monitor();
        Self {
            rx,
            surface,
            params,
            pipeline: Some(pipeline),
            monitor,
            spectrum: Spectrum::new(),
            log_lines: VecDeque::new(),
            stop_status: None,
        }
    }

    fn drain_updates(&mut self) {
        while let Ok(update) = self.rx.try_recv() {
            match update {
                GuiUpdate::Value(parameter, value) => {
                    if let Some(w) = self
                        .surface
                        .widgets
                        .iter_mut()
                        .find(|w| w.spec.parameter == parameter)
                    {
                        w.value = value;
                        w.text = parameter.format_value(value);
                    }
                }
                GuiUpdate::Log(msg) => {
                    self.log_lines.push_back(msg);
                    while self.log_lines.len() > MAX_LOG_LINES {
                        self.log_lines.pop_front();
                    }
                }
            }
        }
    }

    fn check_pipeline(&mut self) {
        let finished = self.pipeline.as_ref().is_some_and(|p| p.is_finished());
        if finished {
            if let Some(pipeline) = self.pipeline.take() {
                self.stop_status = Some(match pipeline.wait() {
                    Ok(()) => "stopped".into(),
                    Err(e) => e.to_string(),
                });
            }
        }
    }

    fn draw_controls(&mut self, ui: &mut egui::Ui) {
        egui::Grid::new("controls")
            .num_columns(3)
            .spacing([12.0, 8.0])
            .show(ui, |ui| {
                for w in &mut self.surface.widgets {
                    ui.label(egui::RichText::new(w.spec.label).color(egui::Color32::LIGHT_GRAY));

                    let mut value = w.value;
                    let slider = egui::Slider::new(&mut value, w.spec.min..=w.spec.max)
                        .step_by(w.spec.step())
                        .show_value(false)
                        .clamping(egui::SliderClamping::Never);
                    if ui.add(slider).changed() {
                        (w.on_change)(value);
                    }

                    let response = ui.add(egui::TextEdit::singleline(&mut w.text).desired_width(110.0));
                    if response.lost_focus() {
                        match w.spec.parameter.parse_value(&w.text) {
                            Ok(v) => (w.on_change)(v),
                            Err(e) => {
                                log::warn!("{}", e);
                                w.text = w.spec.parameter.format_value(w.value);
                            }
                        }
                    }
                    ui.end_row();
                }
            });
    }

    fn draw_spectrum(&mut self, ui: &mut egui::Ui) {
        let sample_rate = self.params.sample_rate();
        let tone = self.params.tone_offset_hz();
        if let Some(feed) = &self.monitor {
            self.spectrum.update(feed);
        }

        ui.horizontal(|ui| {
            ui.label(egui::RichText::new("Monitor").color(egui::Color32::LIGHT_GRAY));
            ui.separator();
            ui.label(format!("{:.3} Msps", sample_rate / 1e6));
            ui.separator();
            ui.label(format!("tone {:+.1} kHz", tone / 1e3));
            if let Some(feed) = &self.monitor {
                ui.separator();
                ui.label(format!("dropped {}", feed.dropped_blocks()));
            }
        });

        Plot::new("spectrum_plot")
            .x_axis_label("kHz")
            .y_axis_label("dB")
            .include_y(-140.0)
            .include_y(0.0)
            .allow_drag(false)
            .allow_scroll(false)
            .show(ui, |plot_ui| {
                plot_ui.line(
                    Line::new("Spectrum", self.spectrum.points(sample_rate))
                        .color(egui::Color32::from_rgb(100, 200, 255)),
                );
            });
    }
}

impl eframe::App for IqTrimApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_updates();
        self.check_pipeline();
        ctx.request_repaint_after(Duration::from_millis(16));

        egui::TopBottomPanel::top("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let status = match (&self.pipeline, &self.stop_status) {
                    (Some(p), _) => format!("Transmitting, {} samples sent", p.samples_sent()),
                    (None, Some(msg)) => format!("Pipeline {}", msg),
                    (None, None) => "Idle".into(),
                };
                ui.label(egui::RichText::new(status).color(egui::Color32::WHITE).strong());
                ui.separator();
                let snapshot = self.params.snapshot();
                ui.label(format!(
                    "k = {:+.3}{:+.3}i   c = {:+.4}{:+.4}i",
                    snapshot.gain_phase_coefficient[0],
                    snapshot.gain_phase_coefficient[1],
                    snapshot.dc_offset_coefficient[0],
                    snapshot.dc_offset_coefficient[1]
                ));
            });
        });

        egui::TopBottomPanel::bottom("debug_log")
            .resizable(true)
            .default_height(120.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(
                        egui::RichText::new("Debug Log")
                            .color(egui::Color32::LIGHT_GRAY)
                            .strong(),
                    );
                    if ui.small_button("Clear").clicked() {
                        self.log_lines.clear();
                    }
                });
                egui::ScrollArea::vertical()
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        for line in &self.log_lines {
                            ui.label(
                                egui::RichText::new(line)
                                    .font(egui::FontId::monospace(11.0))
                                    .color(egui::Color32::from_rgb(180, 180, 180)),
                            );
                        }
                    });
            });

        egui::SidePanel::left("controls_panel")
            .default_width(420.0)
            .show(ctx, |ui| {
                ui.add_space(8.0);
                self.draw_controls(ui);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_spectrum(ui);
        });
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    let (tx, rx) = crossbeam_channel::unbounded::<GuiUpdate>();

    let logger = GuiLogger {
        tx: tx.clone(),
        max_level: log_level,
    };
    log::set_boxed_logger(Box::new(logger)).ok();
    log::set_max_level(log_level);

    let mut config = match args.config {
        Some(ref path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(device_args) = args.device_args {
        config.hardware.device_args = device_args;
    }

    let params = Arc::new(ParameterStore::new(&config.parameters));
    let sink = SinkAdapter::open(&config.hardware, Arc::clone(&params))?;
    let pipeline = Pipeline::start(Arc::clone(&params), sink, &config.pipeline)?;

    let mut surface = GuiSurface {
        tx,
        widgets: Vec::new(),
    };
    control::attach(&params, &mut surface);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 650.0])
            .with_min_inner_size([800.0, 450.0])
            .with_title("iqtrim - I/Q Impairment Pre-Correction"),
        ..Default::default()
    };

    eframe::run_native(
        "iqtrim",
        native_options,
        Box::new(move |cc| Ok(Box::new(IqTrimApp::new(cc, rx, surface, params, pipeline)))),
    )
    .map_err(|e| anyhow::anyhow!("eframe error: {}", e))?;

    Ok(())
}

