//! HTTP client for the image/transcription service.

use async_trait::async_trait;
use uuid::Uuid;

use super::http::{HttpClientConfig, RestClient};
use super::{ClientResult, SourceClient};
use crate::models::{Image, ImageSet, TranscriptionVersion};

/// reqwest-backed [`SourceClient`].
#[derive(Debug, Clone)]
pub struct HttpSourceClient {
    rest: RestClient,
}

impl HttpSourceClient {
    pub fn new(config: &HttpClientConfig) -> ClientResult<Self> {
        Ok(Self {
            rest: RestClient::new(config)?,
        })
    }
}

#[async_trait]
impl SourceClient for HttpSourceClient {
    async fn list_image_sets(&self) -> ClientResult<Vec<ImageSet>> {
        let url = self.rest.url(&["imagesets"])?;
        self.rest.get_json(url).await
    }

    async fn list_images(&self, set_uuid: &Uuid) -> ClientResult<Vec<Image>> {
        let set = set_uuid.to_string();
        let url = self.rest.url(&["imagesets", &set, "images"])?;
        self.rest.get_json(url).await
    }

    async fn list_transcription_versions(
        &self,
        image_uuid: &Uuid,
    ) -> ClientResult<Vec<TranscriptionVersion>> {
        let image = image_uuid.to_string();
        let url = self.rest.url(&["images", &image, "transcriptions"])?;
        self.rest.get_json(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientError;
    use std::time::Duration;

    fn config(base_url: String) -> HttpClientConfig {
        HttpClientConfig {
            base_url,
            timeout: Duration::from_secs(5),
            user_agent: "scansync-test".to_string(),
            token: Some("secret".to_string()),
        }
    }

    #[tokio::test]
    async fn test_list_transcription_versions() {
        let mut server = mockito::Server::new_async().await;
        let image = Uuid::new_v4();
        let version = Uuid::new_v4();
        let _mock = server
            .mock("GET", format!("/api/images/{image}/transcriptions").as_str())
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_body(format!(
                r#"[{{"uuid":"{version}","transcriber":"Transkribus","version":"1.9",
                     "status":"Final","analyzed":"2021-03-04T10:00:00Z","result":null}}]"#
            ))
            .create_async()
            .await;

        let client = HttpSourceClient::new(&config(format!("{}/api/", server.url()))).unwrap();
        let versions = client.list_transcription_versions(&image).await.unwrap();

        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].uuid, version);
        assert_eq!(versions[0].status.as_deref(), Some("Final"));
        assert_eq!(versions[0].transcriber_version.as_deref(), Some("1.9"));
        assert_eq!(versions[0].result, None);
    }

    #[tokio::test]
    async fn test_non_success_carries_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/imagesets")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let client = HttpSourceClient::new(&config(server.url())).unwrap();
        let err = client.list_image_sets().await.unwrap_err();

        match err {
            ClientError::Remote { status, body, .. } => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
