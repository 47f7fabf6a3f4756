//! HTTP implementation of the school API traits.

use crate::api::{AttendanceApi, DirectoryApi, MarksApi};
use crate::config::ApiConfig;
use crate::errors::ApiError;
use crate::protocol::{
    CreateAttendanceRequest, FinalizeAttendanceRequest, FinalizeMarksRequest, ListResponse,
    RecordMarkRequest, UpdateAttendanceRequest,
};
use crate::types::{AttendanceRecord, MarkRecord, SectionId, Student, SubjectId};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::http::{endpoint_url, parse_error_body};
use std::time::Duration;
use url::Url;

/// Opaque bearer credential handed in by whoever owns the session.
#[derive(Clone)]
pub struct Credentials {
    token: String,
}

impl Credentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Credentials {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credentials(<redacted>)")
    }
}

#[derive(Clone, Debug)]
pub struct SchoolClient {
    client: reqwest::Client,
    base_url: Url,
    credentials: Option<Credentials>,
}

impl SchoolClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|source| ApiError::Transport {
                endpoint: "client",
                source,
            })?;

        Ok(SchoolClient {
            client,
            base_url: config.base_url.clone(),
            credentials: config.token.clone().map(Credentials::bearer),
        })
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    fn request(
        &self,
        endpoint: &'static str,
        method: Method,
        path: &str,
    ) -> Result<RequestBuilder, ApiError> {
        let url = endpoint_url(&self.base_url, path)
            .map_err(|e| ApiError::InvalidRequest(format!("{endpoint}: bad path {path}: {e}")))?;

        let builder = self.client.request(method, url);
        Ok(match &self.credentials {
            Some(credentials) => builder.bearer_auth(&credentials.token),
            None => builder,
        })
    }

    /// Sends a request and maps any non-2xx answer to [`ApiError::Status`].
    async fn send(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|source| ApiError::Transport { endpoint, source })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // An unreadable error body still leaves the status to classify on.
        let body = response.bytes().await.unwrap_or_default();
        let error = ApiError::from_envelope(endpoint, status, parse_error_body(&body));
        tracing::debug!(endpoint, status = status.as_u16(), code = ?error.server_code(), "API call rejected");
        Err(error)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        self.send(endpoint, request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode {
                endpoint,
                reason: e.to_string(),
            })
    }

    async fn list<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> Result<Vec<T>, ApiError> {
        Ok(self
            .send_json::<ListResponse<T>>(endpoint, request)
            .await?
            .into_items())
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let request = self.request(endpoint, method, path)?.json(body);
        self.send_json(endpoint, request).await
    }

    /// For close-out calls whose body is only an acknowledgement.
    async fn post_ack<B: Serialize + Sync>(
        &self,
        endpoint: &'static str,
        path: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        let request = self.request(endpoint, Method::POST, path)?.json(body);
        self.send(endpoint, request).await?;
        Ok(())
    }
}

#[async_trait]
impl DirectoryApi for SchoolClient {
    async fn section_students(&self, section_id: SectionId) -> Result<Vec<Student>, ApiError> {
        let endpoint = "list-section-students";
        let request = self.request(
            endpoint,
            Method::GET,
            &format!("sections/{section_id}/students/"),
        )?;
        self.list(endpoint, request).await
    }
}

#[async_trait]
impl AttendanceApi for SchoolClient {
    async fn list_attendance(
        &self,
        section_id: SectionId,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, ApiError> {
        let endpoint = "list-attendance";
        let request = self
            .request(endpoint, Method::GET, "attendance/")?
            .query(&[
                ("section_id", section_id.to_string()),
                ("date", date.to_string()),
            ]);
        self.list(endpoint, request).await
    }

    async fn create_attendance(
        &self,
        request: CreateAttendanceRequest,
    ) -> Result<AttendanceRecord, ApiError> {
        self.post_json("create-attendance-record", Method::POST, "attendance/", &request)
            .await
    }

    async fn update_attendance(
        &self,
        request: UpdateAttendanceRequest,
    ) -> Result<AttendanceRecord, ApiError> {
        let path = format!("attendance/{}/", request.attendance_id);
        self.post_json("update-attendance-record", Method::PATCH, &path, &request)
            .await
    }

    async fn finalize_attendance(&self, request: FinalizeAttendanceRequest) -> Result<(), ApiError> {
        self.post_ack("finalize-attendance", "attendance/submit/", &request)
            .await
    }
}

#[async_trait]
impl MarksApi for SchoolClient {
    async fn list_marks(
        &self,
        section_id: SectionId,
        subject_id: SubjectId,
        exam_type: &str,
    ) -> Result<Vec<MarkRecord>, ApiError> {
        let endpoint = "list-marks";
        let request = self.request(endpoint, Method::GET, "marks/")?.query(&[
            ("section_id", section_id.to_string()),
            ("subject_id", subject_id.to_string()),
            ("exam_type", exam_type.to_string()),
        ]);
        self.list(endpoint, request).await
    }

    async fn record_mark(&self, request: RecordMarkRequest) -> Result<MarkRecord, ApiError> {
        self.post_json("record-mark", Method::POST, "marks/", &request)
            .await
    }

    async fn finalize_marks(&self, request: FinalizeMarksRequest) -> Result<(), ApiError> {
        self.post_ack("finalize-marks", "marks/submit/", &request)
            .await
    }
}
