use std::{io::Cursor, time::Duration};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use image::{ImageFormat, RgbaImage};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{EffectArg, EffectError, EffectOption};

const DATA_URL_PREFIX: &str = "data:image/png;base64,";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MagickRequest {
    /// PNG data URL of the snapshot.
    pub b64_image: String,
    pub cmd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cfg: Option<EffectArg>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct MagickResponse {
    pub img: String,
}

/// Client for the ImageMagick conversion service.
#[derive(Clone, Debug)]
pub struct MagickClient {
    base_url: String,
    client: Client,
}

impl MagickClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, EffectError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn health(&self) -> Result<(), EffectError> {
        self.client
            .get(format!("{}/health", self.base_url))
            .send()?
            .error_for_status()?;
        Ok(())
    }

    /// Uploads `image` with the option's command and returns the converted image.
    pub fn convert(&self, image: &RgbaImage, option: &EffectOption) -> Result<RgbaImage, EffectError> {
        let request = build_request(image, option)?;
        log::debug!("requesting effect {} ({})", option.display_name, option.cmd);
        let response: MagickResponse = self
            .client
            .post(format!("{}/", self.base_url))
            .json(&request)
            .send()?
            .error_for_status()?
            .json()?;
        decode_response(&response)
    }
}

pub fn build_request(image: &RgbaImage, option: &EffectOption) -> Result<MagickRequest, EffectError> {
    let mut png = Cursor::new(Vec::new());
    image.write_to(&mut png, ImageFormat::Png)?;
    Ok(MagickRequest {
        b64_image: format!("{DATA_URL_PREFIX}{}", BASE64.encode(png.into_inner())),
        cmd: option.cmd.to_string(),
        channel: option.channel.map(str::to_string),
        cfg: option.cfg.clone(),
    })
}

pub fn decode_response(response: &MagickResponse) -> Result<RgbaImage, EffectError> {
    let bytes = BASE64.decode(response.img.trim())?;
    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}
