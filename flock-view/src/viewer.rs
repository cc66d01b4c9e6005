//! Interactive boids viewer built with eframe/egui.
//!
//! This module defines [`Viewer`], which owns an in-memory agent store and
//! a [`FlockStepper`], and implements [`eframe::App`] to drive ticks and
//! draw the flock as a top-down (XY) projection.

use eframe::App;
use flock_core::{
    config::{FlockConfig, HomeLaw, NeighborSearch},
    error::FlockError,
    home::HomePoint,
    phases::{FlockStepper, TickReport},
    store::{FixedClock, MemoryStore},
};
use glam::{Vec2, Vec3};
use tracing::{info, warn};

const DEFAULT_DESIRED: i64 = 300;

/// Main application state for the viewer.
///
/// [`Viewer`] glues together:
/// - The simulation: a [`MemoryStore`] holding agents and the home point,
///   and a [`FlockStepper`] advancing it.
/// - UI configuration (pan/zoom, timing).
/// - eframe/egui callbacks for drawing and user interaction.
///
/// ### Fields
/// - `store` - All live agents plus the home point.
/// - `stepper` - Tick driver; owns the active [`FlockConfig`].
/// - `cfg` - Editable copy of the configuration, pushed into `stepper`
///   before each tick.
/// - `running` - Whether ticks advance automatically.
/// - `dt` - Simulated seconds per tick.
/// - `zoom`, `pan` - World-to-screen mapping.
/// - `last_report` - Result of the most recent tick.
/// - `last_error` - Error from the most recent failed tick, if any.
pub struct Viewer {
    store: MemoryStore,
    stepper: FlockStepper,
    cfg: FlockConfig,

    running: bool,
    dt: f32,
    zoom: f32,
    pan: egui::Vec2,

    last_report: Option<TickReport>,
    last_error: Option<String>,
}

impl Viewer {
    /// Creates a viewer with an empty flock and a home point at the origin.
    ///
    /// The first tick spawns [`DEFAULT_DESIRED`] agents around home.
    pub fn new() -> Result<Self, FlockError> {
        let cfg = FlockConfig::default();
        let stepper = FlockStepper::new(cfg)?;
        info!(seed = stepper.seed(), "viewer started");

        Ok(Self {
            store: MemoryStore::new(HomePoint::new(Vec3::ZERO, DEFAULT_DESIRED)),
            stepper,
            cfg,
            running: false,
            dt: 1.0 / 60.0,
            zoom: 60.0,
            pan: egui::vec2(0.0, 0.0),
            last_report: None,
            last_error: None,
        })
    }

    /// Removes all agents and moves home back to the origin.
    ///
    /// The configuration, agent template and camera are kept.
    fn reset(&mut self) {
        let template = self.store.home().template;
        self.store = MemoryStore::new(
            HomePoint::new(Vec3::ZERO, DEFAULT_DESIRED).with_template(template),
        );
        self.last_report = None;
        self.last_error = None;
        self.running = false;
    }

    /// Despawns every agent on the next tick by dropping the desired count to zero.
    fn clear(&mut self) {
        self.store.home_mut().desired_count = 0;
    }

    /// Advances the simulation by a single tick.
    ///
    /// Configuration edits are applied first. A failed tick stops
    /// auto-running and keeps the error for the status bar.
    fn step_once(&mut self) {
        let result = self
            .stepper
            .set_config(self.cfg)
            .and_then(|()| self.stepper.step(&mut self.store, &FixedClock(self.dt)));

        match result {
            Ok(report) => {
                self.last_report = Some(report);
                self.last_error = None;
            }
            Err(err) => {
                warn!(%err, "tick failed");
                self.last_error = Some(err.to_string());
                self.running = false;
            }
        }
    }

    /// Converts a world-space XY position to screen-space.
    ///
    /// World coordinates are scaled by `zoom`, offset by `pan`, and then
    /// centered inside `rect`. The y-axis is flipped so that positive y
    /// goes up.
    fn world_to_screen(&self, p: Vec2, rect: egui::Rect) -> egui::Pos2 {
        let center = rect.center();
        egui::pos2(
            center.x + p.x * self.zoom + self.pan.x,
            center.y - p.y * self.zoom + self.pan.y,
        )
    }

    /// Inverse of [`Viewer::world_to_screen`].
    fn screen_to_world(&self, p: egui::Pos2, rect: egui::Rect) -> Vec2 {
        let center = rect.center();
        let x = (p.x - center.x - self.pan.x) / self.zoom;
        let y = (center.y - p.y + self.pan.y) / self.zoom;
        Vec2::new(x, y)
    }

    fn labeled_drag_f32(
        ui: &mut egui::Ui,
        label: &str,
        value: &mut f32,
        range: std::ops::RangeInclusive<f32>,
        speed: f64,
    ) {
        ui.horizontal(|ui| {
            ui.label(label);
            ui.add(egui::DragValue::new(value).range(range).speed(speed));
        });
    }

    /// Builds the top panel UI (run controls, stepping, zoom).
    fn ui_top_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui
                    .button(if self.running { "⏸ Pause" } else { "▶ Run" })
                    .clicked()
                {
                    self.running = !self.running;
                }

                ui.add(
                    egui::DragValue::new(&mut self.dt)
                        .prefix("dt = ")
                        .range(0.001..=0.5)
                        .speed(0.001),
                );

                if ui.button("Step").clicked() {
                    self.step_once();
                }

                if ui.button("Reset").clicked() {
                    self.reset();
                }

                if ui.button("Clear").clicked() {
                    self.clear();
                }

                ui.separator();
                ui.add(egui::Slider::new(&mut self.zoom, 5.0..=400.0).text("Zoom"));
            });
        });
    }

    /// Builds the bottom status bar (tick, population, neighbor pairs).
    fn ui_status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(format!("tick = {}", self.stepper.tick()));
                ui.separator();
                ui.label(format!(
                    "agents = {} / {}",
                    self.store.len(),
                    self.store.home().desired_count
                ));
                if let Some(report) = &self.last_report {
                    ui.label(format!("neighbor pairs = {}", report.neighbor_pairs));
                    ui.label(format!("+{} -{}", report.spawned, report.despawned));
                    if report.partial_recall {
                        ui.colored_label(egui::Color32::YELLOW, "cell < radius");
                    }
                    if let Some(err) = &report.spawn_error {
                        ui.colored_label(egui::Color32::RED, err.to_string());
                    }
                }
                if let Some(err) = &self.last_error {
                    ui.colored_label(egui::Color32::RED, err);
                }
            });
        });
    }

    /// Builds the right-hand panel for simulation and template parameters.
    fn ui_config_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("config_panel")
            .resizable(true)
            .default_width(240.0)
            .show(ctx, |ui| {
                ui.heading("Home");
                let home = self.store.home_mut();
                ui.horizontal(|ui| {
                    ui.label("desired_count:");
                    ui.add(
                        egui::DragValue::new(&mut home.desired_count)
                            .range(0..=20_000)
                            .speed(1.0),
                    );
                });
                Self::labeled_drag_f32(ui, "home.x:", &mut home.position.x, -50.0..=50.0, 0.1);
                Self::labeled_drag_f32(ui, "home.y:", &mut home.position.y, -50.0..=50.0, 0.1);
                Self::labeled_drag_f32(ui, "home.z:", &mut home.position.z, -50.0..=50.0, 0.1);

                ui.separator();
                ui.heading("Template");
                let template = &mut home.template;
                let weights = &mut template.weights;
                Self::labeled_drag_f32(ui, "separation:", &mut weights.separation, 0.0..=10.0, 0.05);
                Self::labeled_drag_f32(ui, "alignment:", &mut weights.alignment, 0.0..=10.0, 0.05);
                Self::labeled_drag_f32(ui, "cohesion:", &mut weights.cohesion, 0.0..=10.0, 0.05);
                Self::labeled_drag_f32(ui, "home:", &mut weights.home, 0.0..=10.0, 0.05);
                Self::labeled_drag_f32(ui, "wander:", &mut weights.wander, 0.0..=10.0, 0.05);
                Self::labeled_drag_f32(
                    ui,
                    "neighbor_radius:",
                    &mut template.neighbor_radius,
                    0.01..=5.0,
                    0.01,
                );
                Self::labeled_drag_f32(
                    ui,
                    "max_speed_min:",
                    &mut template.max_speed_min,
                    0.01..=20.0,
                    0.01,
                );
                Self::labeled_drag_f32(
                    ui,
                    "max_speed_max:",
                    &mut template.max_speed_max,
                    0.01..=20.0,
                    0.01,
                );
                ui.label("Template changes apply to newly spawned agents.");

                ui.separator();
                ui.heading("Simulation");
                Self::labeled_drag_f32(ui, "cell_size:", &mut self.cfg.cell_size, 0.01..=5.0, 0.01);
                Self::labeled_drag_f32(ui, "turn_rate:", &mut self.cfg.turn_rate, 0.0..=50.0, 0.1);

                ui.horizontal(|ui| {
                    ui.label("home law:");
                    ui.selectable_value(&mut self.cfg.home_law, HomeLaw::Linear, "Linear");
                    ui.selectable_value(&mut self.cfg.home_law, HomeLaw::Quadratic, "Quadratic");
                });
                ui.horizontal(|ui| {
                    ui.label("search:");
                    ui.selectable_value(
                        &mut self.cfg.neighbor_search,
                        NeighborSearch::Grid,
                        "Grid",
                    );
                    ui.selectable_value(
                        &mut self.cfg.neighbor_search,
                        NeighborSearch::BruteForce,
                        "Brute force",
                    );
                });

                ui.separator();
                if ui.button("Reset cfg to default").clicked() {
                    self.cfg = FlockConfig::default();
                }
            });
    }

    /// Builds the central panel where the flock is drawn.
    ///
    /// Dragging pans, scrolling zooms around the cursor and clicking moves
    /// the home point in the XY plane.
    fn ui_central_panel(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let response = ui.allocate_response(ui.available_size(), egui::Sense::click_and_drag());
            let rect = response.rect;
            let painter = ui.painter_at(rect);

            if response.dragged() {
                self.pan += response.drag_delta();
            }

            if response.clicked() {
                if let Some(p) = response.hover_pos() {
                    let world = self.screen_to_world(p, rect);
                    let home = self.store.home_mut();
                    home.position.x = world.x;
                    home.position.y = world.y;
                }
            }

            if ui.ctx().input(|i| i.raw_scroll_delta.y != 0.0) {
                let scroll = ui.ctx().input(|i| i.raw_scroll_delta.y);
                let pointer_screen = response.hover_pos().unwrap_or(rect.center());
                let world_before = self.screen_to_world(pointer_screen, rect);

                let factor = (1.0 + scroll * 0.001).clamp(0.5, 2.0);
                self.zoom = (self.zoom * factor).clamp(5.0, 400.0);

                let screen_after = self.world_to_screen(world_before, rect);
                self.pan += pointer_screen - screen_after;
            }

            // Home point.
            let home = self.store.home();
            let home_screen = self.world_to_screen(home.position.truncate(), rect);
            painter.circle_stroke(
                home_screen,
                6.0,
                egui::Stroke::new(1.5, egui::Color32::LIGHT_GREEN),
            );

            // Agents, with a short heading tick along their forward axis.
            let heading_len = 0.15;
            for (_, agent) in self.store.iter() {
                let p = agent.position.truncate();
                let forward = (agent.orientation * Vec3::Z).truncate();
                let a = self.world_to_screen(p, rect);
                let b = self.world_to_screen(p + forward * heading_len, rect);
                painter.line_segment([a, b], egui::Stroke::new(1.0, egui::Color32::LIGHT_BLUE));
                painter.circle_filled(a, 2.0, egui::Color32::WHITE);
            }

            if self.running {
                self.step_once();
                ctx.request_repaint();
            }
        });
    }
}

impl App for Viewer {
    /// eframe callback that builds all UI panels for each frame.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ui_top_panel(ctx);
        self.ui_status_bar(ctx);
        self.ui_config_panel(ctx);
        self.ui_central_panel(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_rect() -> egui::Rect {
        egui::Rect::from_min_size(egui::Pos2::new(0.0, 0.0), egui::vec2(800.0, 600.0))
    }

    #[test]
    fn world_to_screen_and_back_is_roundtrip() {
        let mut viewer = Viewer::new().unwrap();
        viewer.zoom = 2.0;
        viewer.pan = egui::vec2(15.0, -7.0);
        let rect = test_rect();

        let world_points = [
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, -5.0),
            Vec2::new(-3.5, 8.25),
        ];

        let eps = 1e-4;

        for p in world_points {
            let screen = viewer.world_to_screen(p, rect);
            let back = viewer.screen_to_world(screen, rect);

            assert!(
                (back.x - p.x).abs() < eps && (back.y - p.y).abs() < eps,
                "roundtrip mismatch: p={:?}, back={:?}",
                p,
                back
            );
        }
    }

    #[test]
    fn step_once_spawns_the_default_flock() {
        let mut viewer = Viewer::new().unwrap();

        viewer.step_once();

        assert_eq!(viewer.store.len(), DEFAULT_DESIRED as usize);
        assert_eq!(viewer.stepper.tick(), 1);
        assert!(viewer.last_error.is_none());
    }

    #[test]
    fn reset_restores_basic_state() {
        let mut viewer = Viewer::new().unwrap();
        viewer.step_once();
        viewer.store.home_mut().position = Vec3::new(3.0, 4.0, 5.0);
        viewer.running = true;

        viewer.reset();

        assert!(viewer.store.is_empty());
        assert_eq!(viewer.store.home().position, Vec3::ZERO);
        assert_eq!(viewer.store.home().desired_count, DEFAULT_DESIRED);
        assert!(viewer.last_report.is_none());
        assert!(!viewer.running);
    }

    #[test]
    fn clear_empties_flock_on_next_tick() {
        let mut viewer = Viewer::new().unwrap();
        viewer.step_once();
        assert!(!viewer.store.is_empty());

        viewer.clear();
        viewer.step_once();

        assert!(viewer.store.is_empty());
    }

    #[test]
    fn invalid_config_stops_running_and_reports() {
        let mut viewer = Viewer::new().unwrap();
        viewer.running = true;
        viewer.cfg.cell_size = 0.0;

        viewer.step_once();

        assert!(!viewer.running);
        assert!(viewer.last_error.is_some());
        assert_eq!(viewer.stepper.tick(), 0);
    }

    #[test]
    fn bad_template_keeps_running() {
        let mut viewer = Viewer::new().unwrap();
        viewer.running = true;
        viewer.store.home_mut().template.max_speed_max = 0.5;

        viewer.step_once();

        assert!(viewer.running);
        assert!(viewer.last_error.is_none());
        assert!(viewer.store.is_empty());
        let report = viewer.last_report.as_ref().unwrap();
        assert!(report.spawn_error.is_some());
        assert_eq!(viewer.stepper.tick(), 1);
    }
}
