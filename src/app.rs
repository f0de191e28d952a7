use std::sync::Arc;

use client::{content::ContentStore, member_list::MemberList, Cache, Client, EventSender};
use eframe::egui::{self, RichText, TextureHandle};

use crate::{
    config::LocalConfig,
    futures::Futures,
    image_cache::ImageCache,
    screen::{main, AppScreen, BoxedScreen, ScreenStack},
    utils::*,
};

/// Big, monolithic struct that holds all state for everything.
pub struct State {
    pub client: Option<Client>,
    /// The cache holding everything the server told us about.
    pub cache: Cache,
    /// Channel to send events to the cache for processing. The protocol
    /// collaborator's socket/sync tasks get clones of this.
    pub event_sender: EventSender,
    /// Futures task manager and output handler.
    pub futures: Futures,
    /// Decoded avatar textures in memory.
    pub image_cache: ImageCache,
    /// The role-grouped member list shown in the member sidebar.
    pub member_list: MemberList<TextureHandle>,
    pub content_store: Arc<ContentStore>,
    pub local_config: LocalConfig,
    /// Latest error received.
    pub latest_error: Option<Error>,
    /// Screen to push to the screen stack on next frame.
    pub next_screen: Option<BoxedScreen>,
    /// Whether to pop the current screen on next frame.
    pub prev_screen: bool,
}

impl State {
    /// Get the current client. Will panic if there is none.
    pub fn client(&self) -> &Client {
        self.client.as_ref().expect("client not initialized yet")
    }

    pub fn run<F, E, O>(&mut self, res: Result<O, E>, f: F)
    where
        F: FnOnce(&mut Self, O),
        E: std::error::Error + Send + Sync + 'static,
    {
        match res {
            Ok(val) => f(self, val),
            Err(err) => self.latest_error = Some(anyhow::Error::new(err)),
        }
    }

    /// Set a screen to be pushed onto the stack in the next frame.
    pub fn push_screen<S: AppScreen>(&mut self, screen: S) {
        self.next_screen = Some(Box::new(screen));
    }

    /// Sets the state to pop the current screen in the next frame.
    pub fn pop_screen(&mut self) {
        self.prev_screen = true;
    }

    /// Per-frame upkeep: drains future outputs and queued cache events, and
    /// rebuilds the member list when an event touched what it displays.
    pub fn maintain(&mut self) {
        self.futures.poll();

        let active_guild = self.member_list.active_guild();
        let active_channel = self.member_list.active_channel();
        let mut member_list_stale = false;
        self.cache.maintain(|ev| {
            if ev.touches_member_list(active_guild, active_channel) {
                member_list_stale = true;
            }
            Some(ev)
        });

        if member_list_stale {
            self.member_list.update(&self.cache);
        }
    }
}

pub struct App {
    state: State,
    screens: ScreenStack,
}

impl App {
    #[must_use]
    pub fn new(cc: &eframe::CreationContext<'_>, content_store: ContentStore) -> Self {
        let local_config = LocalConfig::load(&content_store);

        let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel();
        let cache = Cache::new(event_rx);

        let mut futures = Futures::new();
        futures.init(&cc.egui_ctx);

        let client = Client::new(local_config.homeserver.as_str());

        Self {
            state: State {
                client: Some(client),
                cache,
                event_sender: event_tx,
                futures,
                image_cache: ImageCache::default(),
                member_list: MemberList::new(),
                content_store: Arc::new(content_store),
                local_config,
                latest_error: None,
                next_screen: None,
                prev_screen: false,
            },
            screens: ScreenStack::new(main::Screen::default()),
        }
    }
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        ctx.set_pixels_per_point(self.state.local_config.scale_factor);

        self.state.maintain();

        egui::TopBottomPanel::bottom("bottom_panel")
            .exact_height(25.0)
            .show(ctx, |ui| {
                let maybe_err_msg = self
                    .state
                    .latest_error
                    .as_ref()
                    .map(|err| format!("last error: {}", err));
                ui.horizontal(|ui| match maybe_err_msg {
                    Some(text) => {
                        if ui.button("clear").clicked() {
                            self.state.latest_error = None;
                        }
                        ui.label(RichText::new(text).color(egui::Color32::RED))
                    }
                    None => ui.label("no errors"),
                });
            });

        self.screens.current_mut().update(ctx, frame, &mut self.state);

        if let Some(screen) = self.state.next_screen.take() {
            self.screens.push_boxed(screen);
        }
        if std::mem::take(&mut self.state.prev_screen) {
            self.screens.pop();
        }
    }

    fn save(&mut self, _storage: &mut dyn eframe::Storage) {
        self.state.local_config.store(&self.state.content_store);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client::{channel::ChannelKind, FetchEvent};

    fn test_state() -> State {
        let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel();
        State {
            client: Some(Client::new("https://chat.example.org")),
            cache: Cache::new(event_rx),
            event_sender: event_tx,
            futures: Futures::new(),
            image_cache: ImageCache::default(),
            member_list: MemberList::new(),
            content_store: Arc::new(ContentStore::default()),
            local_config: LocalConfig::default(),
            latest_error: None,
            next_screen: None,
            prev_screen: false,
        }
    }

    #[test]
    fn maintain_rebuilds_member_list_on_relevant_events() {
        let mut state = test_state();

        state
            .event_sender
            .send(FetchEvent::GuildAddedToList {
                guild_id: 1,
                name: "g".to_string(),
            })
            .unwrap();
        state
            .event_sender
            .send(FetchEvent::ChannelCreated {
                guild_id: Some(1),
                channel_id: 10,
                name: "general".to_string(),
                kind: ChannelKind::Text,
            })
            .unwrap();
        state
            .event_sender
            .send(FetchEvent::JoinedMember {
                guild_id: 1,
                member_id: 7,
            })
            .unwrap();
        state
            .event_sender
            .send(FetchEvent::ProfileUpdated {
                user_id: 7,
                new_username: Some("eve".to_string()),
                new_avatar: None,
                new_deleted: None,
            })
            .unwrap();
        state.maintain();

        state.member_list.set_active_channel(&state.cache, Some(10));
        state.member_list.update(&state.cache);
        assert_eq!(state.member_list.groups().len(), 1);
        assert_eq!(state.member_list.groups()[0].members.len(), 1);

        // a member joining the active guild triggers a rebuild
        state
            .event_sender
            .send(FetchEvent::JoinedMember {
                guild_id: 1,
                member_id: 8,
            })
            .unwrap();
        state
            .event_sender
            .send(FetchEvent::ProfileUpdated {
                user_id: 8,
                new_username: Some("mallory".to_string()),
                new_avatar: None,
                new_deleted: None,
            })
            .unwrap();
        state.maintain();
        assert_eq!(state.member_list.groups()[0].members.len(), 2);

        // events for other guilds leave the tree alone
        state
            .event_sender
            .send(FetchEvent::JoinedMember {
                guild_id: 2,
                member_id: 9,
            })
            .unwrap();
        state.maintain();
        assert_eq!(state.member_list.groups()[0].members.len(), 2);
    }

    #[test]
    fn run_captures_errors_for_the_error_panel() {
        let mut state = test_state();
        let res: ClientResult<()> = Err(ClientError::Custom("boom".to_string()));
        state.run(res, |_, _| panic!("handler must not run on error"));
        assert!(state.latest_error.is_some());
    }
}
