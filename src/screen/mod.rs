pub mod main;
pub mod settings;

use crate::app::State;

pub trait AppScreen: 'static {
    fn update(&mut self, ctx: &eframe::egui::Context, frame: &mut eframe::Frame, state: &mut State);
}

pub type BoxedScreen = Box<dyn AppScreen>;

pub struct ScreenStack {
    stack: Vec<BoxedScreen>,
}

impl ScreenStack {
    pub fn new<S: AppScreen>(initial: S) -> Self {
        Self {
            stack: vec![Box::new(initial)],
        }
    }

    pub fn current_mut(&mut self) -> &mut dyn AppScreen {
        self.stack.last_mut().expect("stack can't be empty").as_mut()
    }

    pub fn push_boxed(&mut self, screen: BoxedScreen) {
        self.stack.push(screen);
    }

    pub fn pop(&mut self) {
        // The root screen stays put.
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }
}

pub mod prelude {
    pub use super::AppScreen;
    pub use crate::{app::State, image_cache::LoadedAvatar, utils::*};
    pub use client::error::{ClientError, ClientResult};
    pub use eframe::egui::{self, Color32, RichText};
}
