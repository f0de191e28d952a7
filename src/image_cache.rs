use client::{member_list::AvatarTicket, smol_str::SmolStr, AHashMap};
use egui::{ColorImage, Context, TextureHandle, TextureOptions};
use image::DynamicImage;

use crate::utils::{ClientError, ClientResult};

/// Avatars are fetched server-scaled to this and rendered at this size.
pub const AVATAR_SIZE: u32 = 16;

/// Decoded avatar textures, keyed by media id. Textures survive member list
/// rebuilds here, so switching back to a channel reuses them without a
/// refetch.
#[derive(Default)]
pub struct ImageCache {
    avatars: AHashMap<SmolStr, TextureHandle>,
}

impl ImageCache {
    pub fn add_avatar(&mut self, ctx: &Context, image: LoadedAvatar) -> TextureHandle {
        let LoadedAvatar { id, image, .. } = image;
        let tex = ctx.load_texture(format!("avatar-{}", id), image, TextureOptions::LINEAR);
        self.avatars.insert(id, tex.clone());
        tex
    }

    pub fn get_avatar(&self, id: &str) -> Option<TextureHandle> {
        self.avatars.get(id).cloned()
    }
}

/// A downloaded avatar decoded off the UI thread, together with the ticket
/// that says which member row asked for it.
pub struct LoadedAvatar {
    pub id: SmolStr,
    pub ticket: AvatarTicket,
    image: ColorImage,
}

impl LoadedAvatar {
    pub async fn load(data: Vec<u8>, id: SmolStr, ticket: AvatarTicket) -> ClientResult<Self> {
        tokio::task::spawn_blocking(move || Self::load_inner(data, id, ticket))
            .await
            .map_err(|err| ClientError::Custom(format!("avatar decode task panicked: {}", err)))?
    }

    fn load_inner(data: Vec<u8>, id: SmolStr, ticket: AvatarTicket) -> ClientResult<Self> {
        let image = image::load_from_memory(&data)
            .map_err(|err| ClientError::Custom(format!("failed to decode avatar: {}", err)))?;
        let image = image.resize(AVATAR_SIZE, AVATAR_SIZE, image::imageops::FilterType::Lanczos3);

        Ok(Self {
            id,
            ticket,
            image: to_egui_image(image),
        })
    }
}

fn to_egui_image(image: DynamicImage) -> ColorImage {
    let buf = image.to_rgba8();
    let size = [buf.width() as usize, buf.height() as usize];
    ColorImage::from_rgba_unmultiplied(size, &buf.into_raw())
}
