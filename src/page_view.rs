// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Read-only egui rendering of the page surface.

use crate::status::{Indicator, Region, SharedSurface, StatusClass};
use std::sync::PoisonError;
use std::time::Duration;

const PANEL_FILL: egui::Color32 = egui::Color32::from_rgb(25, 30, 35);
const LABEL_COLOR: egui::Color32 = egui::Color32::from_rgb(150, 150, 150);

/// Window that mirrors the shared page surface every frame
pub struct PageView {
    surface: SharedSurface,
}

impl PageView {
    pub fn new(surface: SharedSurface) -> Self {
        Self { surface }
    }

    fn class_color(class: StatusClass) -> egui::Color32 {
        match class {
            StatusClass::Neutral => egui::Color32::from_rgb(200, 200, 200),
            StatusClass::Online => egui::Color32::from_rgb(100, 220, 100),
            StatusClass::Offline => egui::Color32::from_rgb(220, 100, 100),
            StatusClass::Loading => egui::Color32::from_rgb(220, 200, 80),
        }
    }

    fn render_indicator(ui: &mut egui::Ui, label: &str, indicator: &Indicator) {
        ui.horizontal(|ui| {
            ui.label(egui::RichText::new(label).color(LABEL_COLOR).size(11.0).strong());
            ui.label(
                egui::RichText::new(&indicator.text)
                    .color(Self::class_color(indicator.class))
                    .size(12.0),
            )
            .on_hover_text(indicator.class.css_name());
        });
    }
}

impl eframe::App for PageView {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Backend updates arrive from another thread
        ctx.request_repaint_after(Duration::from_millis(250));

        let surface = self
            .surface
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        egui::CentralPanel::default()
            .frame(egui::Frame::central_panel(&ctx.style()).fill(PANEL_FILL))
            .show(ctx, |ui| {
                ui.heading("Connectivity and Module Demo");
                ui.separator();

                Self::render_indicator(ui, "CONNECTION", surface.indicator(Region::ConnectionStatus));
                Self::render_indicator(ui, "MODULE", surface.indicator(Region::ModuleStatus));

                ui.add_space(6.0);
                let result = &surface.indicator(Region::Result).text;
                if !result.is_empty() {
                    ui.label(egui::RichText::new(result).monospace().size(13.0));
                }

                ui.add_space(6.0);
                ui.label(egui::RichText::new("LOG").color(LABEL_COLOR).size(9.0).strong());
                ui.separator();

                egui::ScrollArea::vertical()
                    .auto_shrink([false, false])
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        for entry in surface.log_entries() {
                            ui.label(egui::RichText::new(entry.to_string()).monospace().size(11.0));
                        }
                    });
            });
    }
}
