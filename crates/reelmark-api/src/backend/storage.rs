use url::Url;

use super::client::BackendClient;
use super::error::BackendError;
use crate::traits::AvatarStorage;

impl BackendClient {
    fn object_url(&self, visibility: Option<&str>, object: &str) -> Result<Url, BackendError> {
        let path = match visibility {
            Some(v) => format!("storage/v1/object/{v}/{}/{object}", self.avatar_bucket),
            None => format!("storage/v1/object/{}/{object}", self.avatar_bucket),
        };
        self.base
            .join(&path)
            .map_err(|e| BackendError::Parse(e.to_string()))
    }

    /// Public URL of an object in the avatar bucket.
    pub fn avatar_public_url(&self, user_id: &str, file_name: &str) -> Result<String, BackendError> {
        Ok(self
            .object_url(Some("public"), &format!("{user_id}/{file_name}"))?
            .to_string())
    }
}

impl AvatarStorage for BackendClient {
    type Error = BackendError;

    async fn upload_avatar(
        &self,
        user_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BackendError> {
        let object = format!("{user_id}/{file_name}");
        let size = bytes.len();
        let resp = self
            .authorized(self.http.post(self.object_url(None, &object)?))
            .header("x-upsert", "true")
            .header("content-type", content_type)
            .body(bytes)
            .send()
            .await?;
        Self::check_response(resp).await?;
        tracing::info!(%object, size, "Uploaded avatar");
        self.avatar_public_url(user_id, file_name)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use reelmark_core::config::BackendConfig;

    use super::*;

    #[tokio::test]
    async fn test_upload_returns_public_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/avatars/u-1/avatar.png"))
            .and(header("x-upsert", "true"))
            .and(header("content-type", "image/png"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Key": "avatars/u-1/avatar.png"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = BackendConfig {
            url: server.uri(),
            anon_key: "anon".into(),
            ..Default::default()
        };
        let client = BackendClient::new(&config, "jwt-1").unwrap();
        let url = client
            .upload_avatar("u-1", "avatar.png", vec![0x89, b'P', b'N', b'G'], "image/png")
            .await
            .unwrap();
        assert_eq!(
            url,
            format!("{}/storage/v1/object/public/avatars/u-1/avatar.png", server.uri())
        );
    }
}
