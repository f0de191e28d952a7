use egui::Color32;

pub const ACCENT: Color32 = Color32::from_rgb(96, 173, 255);
pub const DIM: Color32 = Color32::from_rgb(140, 140, 135);
