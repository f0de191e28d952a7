use crate::screen::prelude::*;

#[derive(Default)]
pub struct Screen {}

impl AppScreen for Screen {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame, state: &mut State) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("settings");
            ui.separator();

            ui.horizontal(|ui| {
                ui.label("scale factor");
                ui.add(egui::Slider::new(
                    &mut state.local_config.scale_factor,
                    0.5..=3.0,
                ));
            });

            ui.horizontal(|ui| {
                ui.label("homeserver");
                ui.label(RichText::new(state.client().homeserver()).monospace());
            });

            ui.separator();
            if ui.button("back").clicked() {
                state.local_config.store(&state.content_store);
                state.pop_screen();
            }
        });
    }
}
