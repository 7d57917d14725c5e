//! Artwork requests served through `pms_image_proxy`

use serde::{Deserialize, Serialize};

/// Local route that serves proxied artwork
pub const IMAGE_PROXY_PATH: &str = "/api/tautulli/image";

fn default_width() -> u32 {
    300
}

fn default_height() -> u32 {
    450
}

fn default_fallback() -> String {
    "poster".to_string()
}

fn default_refresh() -> bool {
    true
}

/// Parameters forwarded to `pms_image_proxy`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub img: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fallback")]
    pub fallback: String,
    #[serde(default = "default_refresh")]
    pub refresh: bool,
}

impl ImageRequest {
    pub fn new(img: impl Into<String>) -> Self {
        Self {
            img: img.into(),
            width: default_width(),
            height: default_height(),
            fallback: default_fallback(),
            refresh: default_refresh(),
        }
    }

    /// Relative URL of this image on the local proxy route
    pub fn proxy_path(&self, entry_id: &str) -> String {
        let width = self.width.to_string();
        let height = self.height.to_string();
        let refresh = self.refresh.to_string();
        // String pairs always serialize
        let query = serde_urlencoded::to_string([
            ("entry_id", entry_id),
            ("img", self.img.as_str()),
            ("width", width.as_str()),
            ("height", height.as_str()),
            ("fallback", self.fallback.as_str()),
            ("refresh", refresh.as_str()),
        ])
        .unwrap_or_default();
        format!("{}?{}", IMAGE_PROXY_PATH, query)
    }
}

/// Raw artwork bytes returned by Tautulli
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_path_encodes_values() {
        let path = ImageRequest::new("/library/metadata/12/thumb/1700000000").proxy_path("home plex");
        assert_eq!(
            path,
            "/api/tautulli/image?entry_id=home+plex&img=%2Flibrary%2Fmetadata%2F12%2Fthumb%2F1700000000&width=300&height=450&fallback=poster&refresh=true"
        );
    }

    #[test]
    fn test_query_defaults() {
        let request: ImageRequest = serde_urlencoded::from_str("img=%2Fa%2Fb").unwrap();
        assert_eq!(request, ImageRequest::new("/a/b"));

        let request: ImageRequest =
            serde_urlencoded::from_str("img=x&width=100&height=150&fallback=art&refresh=false")
                .unwrap();
        assert_eq!(request.width, 100);
        assert_eq!(request.height, 150);
        assert_eq!(request.fallback, "art");
        assert!(!request.refresh);
    }
}
