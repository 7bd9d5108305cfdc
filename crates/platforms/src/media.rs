//! Fetching alert imagery before it is uploaded to a platform.

use reqwest::Client;

use crate::{Error, Result};

/// Platforms reject larger images; refuse them before uploading.
pub const MAX_MEDIA_BYTES: usize = 5 * 1024 * 1024;

/// A downloaded image ready for upload.
#[derive(Debug, Clone)]
pub struct MediaPayload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub file_name: String,
}

pub async fn fetch_media(client: &Client, url: &str) -> Result<MediaPayload> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::media(url, format!("HTTP {status}")));
    }

    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("image/png")
        .to_string();
    if !content_type.starts_with("image/") {
        return Err(Error::media(url, format!("not an image: {content_type}")));
    }

    let bytes = resp.bytes().await?;
    if bytes.is_empty() {
        return Err(Error::media(url, "empty body"));
    }
    if bytes.len() > MAX_MEDIA_BYTES {
        return Err(Error::media(url, format!("{} bytes exceeds limit", bytes.len())));
    }

    let file_name = url
        .rsplit('/')
        .next()
        .and_then(|segment| segment.split('?').next())
        .filter(|name| !name.is_empty())
        .unwrap_or("media.png")
        .to_string();

    Ok(MediaPayload {
        bytes: bytes.to_vec(),
        content_type,
        file_name,
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetches_image() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/plots/radar.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body(vec![0x89, b'P', b'N', b'G'])
            .create_async()
            .await;

        let client = Client::new();
        let media = fetch_media(&client, &format!("{}/plots/radar.png", server.url()))
            .await
            .unwrap();
        assert_eq!(media.file_name, "radar.png");
        assert_eq!(media.content_type, "image/png");
        assert_eq!(media.bytes.len(), 4);
    }

    #[tokio::test]
    async fn rejects_non_image_and_errors() {
        let mut server = mockito::Server::new_async().await;
        let _html = server
            .mock("GET", "/page")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html></html>")
            .create_async()
            .await;
        let _missing = server
            .mock("GET", "/gone.png")
            .with_status(404)
            .create_async()
            .await;

        let client = Client::new();
        assert!(matches!(
            fetch_media(&client, &format!("{}/page", server.url())).await,
            Err(Error::Media { .. })
        ));
        assert!(matches!(
            fetch_media(&client, &format!("{}/gone.png", server.url())).await,
            Err(Error::Media { .. })
        ));
    }
}
