#![doc = "ContentClient over the Brightspace Valence REST API."]
//
//! # Valence client
//!
//! [`ValenceClient`] implements [`ContentClient`] with `reqwest`. Each call
//! builds its endpoint under the instance URL, signs it with
//! [`ValenceSigner`], and maps any non-success status to [`SyncError::Http`].
//! Nothing is retried.
//!
//! Errors carry the unsigned URL: signed ones hold the request signatures.

use async_trait::async_trait;
use lms_sync_core::contract::{
    ContentClient, ContentObject, ModulePayload, ObjectListPage, OrgUnit, Quiz, SourceFile,
    TopicPayload, WhoAmI,
};
use lms_sync_core::error::SyncError;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error};
use url::Url;
use uuid::Uuid;

use crate::auth::ValenceSigner;
use crate::multipart::MultipartBody;

pub const LE_VERSION: &str = "1.44";
pub const LP_VERSION: &str = "1.26";

/// Listing under the course root, or under module `parent`. Also where new
/// children of that parent are POSTed.
pub fn structure_path(org_unit: &str, parent: Option<i64>) -> String {
    match parent {
        Some(id) => format!("/d2l/api/le/{LE_VERSION}/{org_unit}/content/modules/{id}/structure/"),
        None => format!("/d2l/api/le/{LE_VERSION}/{org_unit}/content/root/"),
    }
}

pub fn module_path(org_unit: &str, module_id: i64) -> String {
    format!("/d2l/api/le/{LE_VERSION}/{org_unit}/content/modules/{module_id}")
}

pub fn topic_path(org_unit: &str, topic_id: i64) -> String {
    format!("/d2l/api/le/{LE_VERSION}/{org_unit}/content/topics/{topic_id}")
}

pub fn topic_file_path(org_unit: &str, topic_id: i64) -> String {
    format!("{}/file", topic_path(org_unit, topic_id))
}

pub fn quizzes_path(org_unit: &str) -> String {
    format!("/d2l/api/le/{LE_VERSION}/{org_unit}/quizzes/")
}

pub fn course_path(org_unit_id: i64) -> String {
    format!("/d2l/api/lp/{LP_VERSION}/courses/{org_unit_id}")
}

pub fn whoami_path() -> String {
    format!("/d2l/api/lp/{LP_VERSION}/users/whoami")
}

/// The error a non-success `status` from `url` is reported as.
pub fn http_error(status: StatusCode, url: &Url) -> SyncError {
    SyncError::Http {
        status: status.as_u16(),
        status_text: status
            .canonical_reason()
            .unwrap_or("Unknown status")
            .to_string(),
        url: url.to_string(),
    }
}

enum Body {
    Empty,
    Json(Vec<u8>),
    Multipart { content_type: String, bytes: Vec<u8> },
}

pub struct ValenceClient {
    http: reqwest::Client,
    instance: Url,
    signer: ValenceSigner,
}

impl ValenceClient {
    pub fn new(instance: Url, signer: ValenceSigner) -> Self {
        Self {
            http: reqwest::Client::new(),
            instance,
            signer,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, SyncError> {
        self.instance.join(path).map_err(|e| SyncError::Transport {
            url: path.to_string(),
            message: e.to_string(),
        })
    }

    async fn send(&self, method: Method, url: &Url, body: Body) -> Result<Response, SyncError> {
        let signed = self.signer.sign_url(url, method.as_str());
        debug!(method = %method, url = %url, "Sending request");

        let request = self.http.request(method.clone(), signed);
        let request = match body {
            Body::Empty => request,
            Body::Json(bytes) => request.header(CONTENT_TYPE, "application/json").body(bytes),
            Body::Multipart {
                content_type,
                bytes,
            } => request.header(CONTENT_TYPE, content_type).body(bytes),
        };

        let response = request.send().await.map_err(|e| {
            error!(method = %method, url = %url, error = %e, "Request failed");
            SyncError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            error!(method = %method, url = %url, status = status.as_u16(), "Request rejected");
            return Err(http_error(status, url));
        }
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(url: &Url, response: Response) -> Result<T, SyncError> {
        response.json::<T>().await.map_err(|e| {
            error!(url = %url, error = %e, "Could not decode response");
            SyncError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            }
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, SyncError> {
        let url = self.endpoint(path)?;
        let response = self.send(Method::GET, &url, Body::Empty).await?;
        Self::decode(&url, response).await
    }

    async fn send_json<P: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &P,
    ) -> Result<(Url, Response), SyncError> {
        let url = self.endpoint(path)?;
        let bytes = encode_json(&url, payload)?;
        let response = self.send(method, &url, Body::Json(bytes)).await?;
        Ok((url, response))
    }
}

fn encode_json<P: Serialize + ?Sized>(url: &Url, payload: &P) -> Result<Vec<u8>, SyncError> {
    serde_json::to_vec(payload).map_err(|e| SyncError::Decode {
        url: url.to_string(),
        message: format!("could not encode request body: {e}"),
    })
}

#[async_trait]
impl ContentClient for ValenceClient {
    async fn list_content(
        &self,
        org_unit: &str,
        parent: Option<i64>,
    ) -> Result<Vec<ContentObject>, SyncError> {
        self.get(&structure_path(org_unit, parent)).await
    }

    async fn create_module(
        &self,
        org_unit: &str,
        parent: Option<i64>,
        payload: &ModulePayload,
    ) -> Result<ContentObject, SyncError> {
        let (url, response) = self
            .send_json(Method::POST, &structure_path(org_unit, parent), payload)
            .await?;
        Self::decode(&url, response).await
    }

    async fn update_module(
        &self,
        org_unit: &str,
        module_id: i64,
        payload: &ModulePayload,
    ) -> Result<(), SyncError> {
        self.send_json(Method::PUT, &module_path(org_unit, module_id), payload)
            .await?;
        Ok(())
    }

    async fn create_topic(
        &self,
        org_unit: &str,
        parent: i64,
        payload: &TopicPayload,
        file: &SourceFile,
    ) -> Result<ContentObject, SyncError> {
        let url = self.endpoint(&structure_path(org_unit, Some(parent)))?;
        let body = MultipartBody::new(Uuid::new_v4().simple().to_string())
            .json_part(encode_json(&url, payload)?)
            .file_part("", file);
        let body = Body::Multipart {
            content_type: body.content_type("mixed"),
            bytes: body.into_bytes(),
        };
        let response = self.send(Method::POST, &url, body).await?;
        Self::decode(&url, response).await
    }

    async fn update_topic_metadata(
        &self,
        org_unit: &str,
        topic_id: i64,
        payload: &TopicPayload,
    ) -> Result<(), SyncError> {
        self.send_json(Method::PUT, &topic_path(org_unit, topic_id), payload)
            .await?;
        Ok(())
    }

    async fn update_topic_file(
        &self,
        org_unit: &str,
        topic_id: i64,
        file: &SourceFile,
    ) -> Result<(), SyncError> {
        let url = self.endpoint(&topic_file_path(org_unit, topic_id))?;
        let body = MultipartBody::new(Uuid::new_v4().simple().to_string()).file_part("file", file);
        let body = Body::Multipart {
            content_type: body.content_type("form-data"),
            bytes: body.into_bytes(),
        };
        self.send(Method::PUT, &url, body).await?;
        Ok(())
    }

    async fn list_quizzes(&self, org_unit: &str) -> Result<Vec<Quiz>, SyncError> {
        let mut quizzes = Vec::new();
        let mut url = self.endpoint(&quizzes_path(org_unit))?;
        loop {
            let response = self.send(Method::GET, &url, Body::Empty).await?;
            let page: ObjectListPage<Quiz> = Self::decode(&url, response).await?;
            quizzes.extend(page.objects);
            match page.next.filter(|next| !next.is_empty()) {
                Some(next) => url = self.endpoint(&next)?,
                None => break,
            }
        }
        debug!(org_unit, quizzes = quizzes.len(), "Listed quizzes");
        Ok(quizzes)
    }

    async fn create_quiz_link(
        &self,
        org_unit: &str,
        parent: i64,
        payload: &TopicPayload,
    ) -> Result<ContentObject, SyncError> {
        let (url, response) = self
            .send_json(Method::POST, &structure_path(org_unit, Some(parent)), payload)
            .await?;
        Self::decode(&url, response).await
    }

    async fn get_org_unit(&self, org_unit_id: i64) -> Result<OrgUnit, SyncError> {
        self.get(&course_path(org_unit_id)).await
    }

    async fn who_am_i(&self) -> Result<WhoAmI, SyncError> {
        self.get(&whoami_path()).await
    }
}
