//! Shared fixtures for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use image::{ExtendedColorType, ImageEncoder, codecs::png::PngEncoder};

use crate::error::Error;
use crate::level::TileKey;
use crate::source::{FetchFuture, FetchOutcome, TileSource};
use crate::tile::Tile;

/// A small solid-color PNG.
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let pixels = vec![200u8; (width * height * 4) as usize];
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(&pixels, width, height, ExtendedColorType::Rgba8)
        .unwrap();
    buf
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Respond {
    Found,
    NotFound,
    Fail,
}

/// A source answering from a script and counting requests per tile.
pub(crate) struct MockSource {
    payload: Vec<u8>,
    default: Respond,
    overrides: Mutex<HashMap<TileKey, Respond>>,
    requests: Mutex<HashMap<TileKey, usize>>,
    delay: Duration,
}

impl MockSource {
    pub(crate) fn new(default: Respond) -> Self {
        Self {
            payload: png_bytes(4, 4),
            default,
            overrides: Mutex::new(HashMap::new()),
            requests: Mutex::new(HashMap::new()),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub(crate) fn respond(&self, key: &TileKey, respond: Respond) {
        self.overrides.lock().unwrap().insert(key.clone(), respond);
    }

    pub(crate) fn total_requests(&self) -> usize {
        self.requests.lock().unwrap().values().sum()
    }

    pub(crate) fn requests_for(&self, key: &TileKey) -> usize {
        self.requests.lock().unwrap().get(key).copied().unwrap_or(0)
    }
}

impl TileSource for MockSource {
    fn fetch(&self, tile: &Tile) -> FetchFuture<'_> {
        let key = tile.key().clone();
        *self.requests.lock().unwrap().entry(key.clone()).or_default() += 1;
        let respond = self
            .overrides
            .lock()
            .unwrap()
            .get(&key)
            .copied()
            .unwrap_or(self.default);
        let url = tile.url();

        Box::pin(async move {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match respond {
                Respond::Found => FetchOutcome::Found(self.payload.clone()),
                Respond::NotFound => FetchOutcome::NotFound,
                Respond::Fail => FetchOutcome::Failed(Error::Http {
                    url,
                    message: "connection reset".to_string(),
                }),
            }
        })
    }
}
