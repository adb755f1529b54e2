//! HTTP client for the versioned text repository.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::http::{decode, HttpClientConfig, RestClient};
use super::{ClientError, ClientResult, TargetStore};
use crate::models::{ImportedVersion, OutputType, TargetDocument, TargetFile};

/// Paged listing returned by the repository.
#[derive(Debug, Deserialize)]
struct Page<T> {
    items: Vec<T>,
}

#[derive(Debug, Serialize)]
struct NewType<'a> {
    name: &'a str,
    mimetype: &'a str,
}

/// reqwest-backed [`TargetStore`].
#[derive(Debug, Clone)]
pub struct HttpTargetStore {
    rest: RestClient,
}

impl HttpTargetStore {
    pub fn new(config: &HttpClientConfig) -> ClientResult<Self> {
        Ok(Self {
            rest: RestClient::new(config)?,
        })
    }

    async fn put_metadata(&self, segments: &[&str], value: &str) -> ClientResult<()> {
        let url = self.rest.url(segments)?;
        let request = self
            .rest
            .request(Method::PUT, url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(value.to_string());
        self.rest.send(request).await?;
        Ok(())
    }

    /// DELETE a resource; a 404 means there was nothing to delete.
    async fn delete(&self, segments: &[&str]) -> ClientResult<bool> {
        let url = self.rest.url(segments)?;
        match self.rest.send(self.rest.request(Method::DELETE, url)).await {
            Ok(_) => Ok(true),
            Err(ClientError::Remote { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl TargetStore for HttpTargetStore {
    async fn list_types(&self) -> ClientResult<Vec<OutputType>> {
        let url = self.rest.url(&["rest", "types"])?;
        self.rest.get_json(url).await
    }

    async fn create_type(&self, name: &str, mimetype: &str) -> ClientResult<OutputType> {
        let url = self.rest.url(&["rest", "types"])?;
        let request = self
            .rest
            .request(Method::POST, url)
            .json(&NewType { name, mimetype });

        match self.rest.send(request).await {
            Ok(response) => {
                info!("Created type {} ({})", name, mimetype);
                decode(response).await
            }
            Err(ClientError::Remote { status, .. }) if status == StatusCode::CONFLICT.as_u16() => {
                debug!("Type {} already exists", name);
                let url = self.rest.url(&["rest", "types"])?;
                let types: Vec<OutputType> = self.rest.get_json(url.clone()).await?;
                types
                    .into_iter()
                    .find(|t| t.name == name)
                    .ok_or_else(|| ClientError::Remote {
                        status,
                        body: format!("type {name} conflicts but is not listed"),
                        url: url.to_string(),
                    })
            }
            Err(e) => Err(e),
        }
    }

    async fn import_version(
        &self,
        type_name: &str,
        external_id: &str,
        contents: &str,
        as_latest: bool,
    ) -> ClientResult<ImportedVersion> {
        let mut url = self
            .rest
            .url(&["task", "import", "documents", external_id, type_name])?;
        url.query_pairs_mut()
            .append_pair("allowNewDocument", "true")
            .append_pair("asLatestVersion", if as_latest { "true" } else { "false" });

        let part = Part::text(contents.to_string()).file_name(format!("{external_id}.{type_name}"));
        let form = Form::new().part("contents", part);

        let response = self
            .rest
            .send(self.rest.request(Method::POST, url).multipart(form))
            .await?;
        decode(response).await
    }

    async fn create_document_metadata(
        &self,
        document_id: &Uuid,
        key: &str,
        value: &str,
    ) -> ClientResult<()> {
        let id = document_id.to_string();
        self.put_metadata(&["rest", "documents", &id, "metadata", key], value)
            .await
    }

    async fn create_version_metadata(
        &self,
        version_id: &Uuid,
        key: &str,
        value: &str,
    ) -> ClientResult<()> {
        let id = version_id.to_string();
        self.put_metadata(&["rest", "versions", &id, "metadata", key], value)
            .await
    }

    async fn find_document_by_external_id(
        &self,
        external_id: &str,
    ) -> ClientResult<Option<TargetDocument>> {
        let mut url = self.rest.url(&["rest", "documents"])?;
        url.query_pairs_mut().append_pair("externalId", external_id);

        let page: Page<TargetDocument> = self.rest.get_json(url).await?;
        Ok(page
            .items
            .into_iter()
            .find(|doc| doc.external_id == external_id))
    }

    async fn list_files(&self, document_id: &Uuid) -> ClientResult<Vec<TargetFile>> {
        let id = document_id.to_string();
        let url = self.rest.url(&["rest", "documents", &id, "files"])?;
        let page: Page<TargetFile> = self.rest.get_json(url).await?;
        Ok(page.items)
    }

    async fn delete_file(&self, file_id: &Uuid) -> ClientResult<bool> {
        let id = file_id.to_string();
        self.delete(&["rest", "files", &id]).await
    }

    async fn delete_document(&self, document_id: &Uuid) -> ClientResult<bool> {
        let id = document_id.to_string();
        self.delete(&["rest", "documents", &id]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::time::Duration;

    fn store(server: &mockito::ServerGuard) -> HttpTargetStore {
        HttpTargetStore::new(&HttpClientConfig {
            base_url: server.url(),
            timeout: Duration::from_secs(5),
            user_agent: "scansync-test".to_string(),
            token: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_type_conflict_returns_existing() {
        let mut server = mockito::Server::new_async().await;
        let _create = server
            .mock("POST", "/rest/types")
            .with_status(409)
            .with_body(r#"{"message":"duplicate name"}"#)
            .create_async()
            .await;
        let _list = server
            .mock("GET", "/rest/types")
            .with_status(200)
            .with_body(
                r#"[{"id":1,"name":"hocr","mimetype":"text/html"},
                    {"id":2,"name":"pagexml","mimetype":"application/vnd.prima.page+xml"}]"#,
            )
            .create_async()
            .await;

        let output_type = store(&server)
            .create_type("pagexml", "application/vnd.prima.page+xml")
            .await
            .unwrap();

        assert_eq!(output_type.id, 2);
        assert_eq!(output_type.name, "pagexml");
    }

    #[tokio::test]
    async fn test_import_version_sends_flags() {
        let mut server = mockito::Server::new_async().await;
        let document = Uuid::new_v4();
        let file = Uuid::new_v4();
        let version = Uuid::new_v4();
        let _import = server
            .mock("POST", "/task/import/documents/NL-HaNA_1.10.94_0455_0012/hocr")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("allowNewDocument".into(), "true".into()),
                Matcher::UrlEncoded("asLatestVersion".into(), "true".into()),
            ]))
            .with_status(201)
            .with_body(format!(
                r#"{{"documentId":"{document}","fileId":"{file}","versionId":"{version}","newVersion":true}}"#
            ))
            .create_async()
            .await;

        let imported = store(&server)
            .import_version("hocr", "NL-HaNA_1.10.94_0455_0012", "<html/>", true)
            .await
            .unwrap();

        assert_eq!(imported.document_id, document);
        assert_eq!(imported.version_id, version);
        assert!(imported.new_version);
    }

    #[tokio::test]
    async fn test_find_document_missing() {
        let mut server = mockito::Server::new_async().await;
        let _find = server
            .mock("GET", "/rest/documents")
            .match_query(Matcher::UrlEncoded(
                "externalId".into(),
                "NL-HaNA_1.10.94_0455_0001".into(),
            ))
            .with_status(200)
            .with_body(r#"{"items":[]}"#)
            .create_async()
            .await;

        let found = store(&server)
            .find_document_by_external_id("NL-HaNA_1.10.94_0455_0001")
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_delete_not_found_is_false() {
        let mut server = mockito::Server::new_async().await;
        let file = Uuid::new_v4();
        let _delete = server
            .mock("DELETE", format!("/rest/files/{file}").as_str())
            .with_status(404)
            .create_async()
            .await;

        assert!(!store(&server).delete_file(&file).await.unwrap());
    }
}
