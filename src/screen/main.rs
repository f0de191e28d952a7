use client::channel::ChannelKind;
use itertools::Itertools;

use crate::{
    image_cache::AVATAR_SIZE,
    screen::prelude::*,
    style::{ACCENT, DIM},
};

#[derive(Default)]
pub struct Screen {
    selected_guild: Option<u64>,
}

impl Screen {
    fn handle_avatars(state: &mut State, ctx: &egui::Context) {
        handle_future!(state, |res: ClientResult<LoadedAvatar>| {
            state.run(res, |state, loaded| {
                let ticket = loaded.ticket;
                let tex = state.image_cache.add_avatar(ctx, loaded);
                state.member_list.apply_avatar(ticket, tex);
            });
        });
    }

    /// Kicks off an avatar fetch for a row that just became visible. Rows
    /// whose image is already decoded are fed back immediately without
    /// touching the network.
    fn request_avatar(state: &mut State, user_id: u64) {
        let Some(req) = state.member_list.request_avatar(&state.cache, user_id) else {
            return;
        };

        if let Some(tex) = state.image_cache.get_avatar(req.avatar.as_str()) {
            state.member_list.apply_avatar(req.ticket, tex);
            return;
        }

        let url = state
            .client()
            .avatar_url(req.user_id, req.avatar.as_str(), AVATAR_SIZE);
        let avatar = req.avatar;
        let ticket = req.ticket;
        state.futures.spawn(async move {
            let resp = reqwest::get(&url)
                .await
                .map_err(|err| ClientError::Custom(format!("failed to fetch avatar: {}", err)))?;
            let data = resp
                .bytes()
                .await
                .map_err(|err| ClientError::Custom(format!("failed to read avatar: {}", err)))?;
            LoadedAvatar::load(data.to_vec(), avatar, ticket).await
        });
    }

    fn view_channels(&mut self, state: &mut State, ui: &mut egui::Ui) {
        let sorted_guilds = state
            .cache
            .get_guilds()
            .map(|(id, guild)| (id, guild.name.clone()))
            .sorted_by(|(_, a), (_, b)| a.cmp(b))
            .collect::<Vec<_>>();

        ui.label(RichText::new("guilds").color(DIM).small());
        for (guild_id, name) in sorted_guilds {
            let is_selected = self.selected_guild == Some(guild_id);
            if ui
                .selectable_label(is_selected, truncate_string(name.as_str(), 20).into_owned())
                .clicked()
            {
                self.selected_guild = Some(guild_id);
            }
        }

        if let Some(guild_id) = self.selected_guild {
            ui.separator();
            ui.label(RichText::new("channels").color(DIM).small());

            let channels = state
                .cache
                .get_channels(guild_id)
                .into_iter()
                .map(|(id, chan)| (id, chan.name.clone(), matches!(chan.kind, ChannelKind::Category)))
                .collect::<Vec<_>>();

            for (channel_id, name, is_category) in channels {
                if is_category {
                    ui.label(RichText::new(name.as_str()).color(DIM));
                    continue;
                }
                let is_active = state.member_list.active_channel() == Some(channel_id);
                if ui
                    .selectable_label(is_active, truncate_string(name.as_str(), 20).into_owned())
                    .clicked()
                {
                    state.member_list.set_active_channel(&state.cache, Some(channel_id));
                    state.member_list.update(&state.cache);
                }
            }
        }

        let dms = state
            .cache
            .get_dm_channels()
            .map(|(id, chan)| (id, chan.name.clone()))
            .sorted_by(|(_, a), (_, b)| a.cmp(b))
            .collect::<Vec<_>>();
        if !dms.is_empty() {
            ui.separator();
            ui.label(RichText::new("direct messages").color(DIM).small());
            for (channel_id, name) in dms {
                let is_active = state.member_list.active_channel() == Some(channel_id);
                if ui
                    .selectable_label(is_active, truncate_string(name.as_str(), 20).into_owned())
                    .clicked()
                {
                    state.member_list.set_active_channel(&state.cache, Some(channel_id));
                    state.member_list.update(&state.cache);
                }
            }
        }
    }

    fn view_members(state: &mut State, ui: &mut egui::Ui) {
        // Rendering borrows the tree; requests are issued afterwards since
        // they mutate it.
        let mut newly_visible = Vec::new();

        for group in state.member_list.groups() {
            let header = RichText::new(group.label.as_str()).strong();
            egui::CollapsingHeader::new(header)
                .id_source(group.key)
                .default_open(true)
                .show(ui, |ui| {
                    for row in &group.members {
                        ui.horizontal(|ui| {
                            match &row.avatar {
                                Some(tex) => {
                                    ui.add(egui::Image::new(egui::load::SizedTexture::new(
                                        tex.id(),
                                        egui::vec2(AVATAR_SIZE as f32, AVATAR_SIZE as f32),
                                    )));
                                }
                                None => {
                                    let initial = row
                                        .name
                                        .chars()
                                        .next()
                                        .map_or_else(String::new, |c| c.to_uppercase().to_string());
                                    ui.label(RichText::new(initial).color(DIM));
                                    newly_visible.push(row.user_id);
                                }
                            }
                            let name = match row.color {
                                Some(color) => {
                                    RichText::new(row.name.as_str()).color(rgb_color(color))
                                }
                                None => RichText::new(row.name.as_str()),
                            };
                            ui.label(name);
                        });
                    }
                });
        }

        for user_id in newly_visible {
            Self::request_avatar(state, user_id);
        }
    }
}

impl AppScreen for Screen {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame, state: &mut State) {
        Self::handle_avatars(state, ctx);

        egui::SidePanel::left("channel_panel")
            .min_width(175.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.view_channels(state, ui);
                });
                ui.separator();
                if ui.button("settings").clicked() {
                    state.push_screen(super::settings::Screen::default());
                }
            });

        if !state.member_list.is_empty() {
            egui::SidePanel::right("member_panel")
                .min_width(175.0)
                .show(ctx, |ui| {
                    egui::ScrollArea::vertical().show(ui, |ui| {
                        Self::view_members(state, ui);
                    });
                });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            let active_name = state
                .member_list
                .active_channel()
                .and_then(|id| state.cache.get_channel(id))
                .map(|chan| chan.name.clone());
            match active_name {
                Some(name) => {
                    ui.heading(RichText::new(name.as_str()).color(ACCENT));
                }
                None => {
                    let text = if state.cache.is_initial_sync_complete() {
                        "select a channel"
                    } else {
                        "syncing…"
                    };
                    ui.centered_and_justified(|ui| {
                        ui.label(RichText::new(text).color(DIM));
                    });
                }
            }
        });
    }
}
