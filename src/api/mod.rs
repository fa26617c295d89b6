//! Typed wrappers for the RFP, upload and document-version endpoints.
//!
//! Every call goes through the [`Gateway`], so resource calls get the same
//! token attachment and refresh-then-retry handling as everything else.

mod types;

use reqwest::header::CONTENT_TYPE;
use serde::Serialize;

pub use types::{
    CompletedUpload, DocumentId, DocumentVersion, NewRfp, Paginated, PresignedUpload,
    PublishedPage, PublishedRfp, Rfp, RfpId, RfpOwner, RfpStatus, RfpUpdate, SupplierResponse,
    VersionPreview, VersionRef,
};
use types::{PreviewLink, SupplierResponses, VersionList};

use crate::error::Error;
use crate::gateway::{ApiRequest, Gateway, ensure_success};

#[derive(Serialize)]
struct ResponseBody<'a> {
    content: &'a str,
}

#[derive(Serialize)]
struct PresignBody<'a> {
    filename: &'a str,
    content_type: &'a str,
}

#[derive(Serialize)]
struct CompleteBody<'a> {
    filename: &'a str,
    rfp_id: RfpId,
    document_type: &'a str,
}

#[derive(Serialize)]
struct VersionBody<'a> {
    filename: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
}

/// Resource endpoints of the RFP backend.
#[derive(Debug, Clone, Copy)]
pub struct RfpApi<'a> {
    gateway: &'a Gateway,
}

impl Gateway {
    #[must_use]
    pub fn api(&self) -> RfpApi<'_> {
        RfpApi { gateway: self }
    }
}

impl RfpApi<'_> {
    // ── RFPs ───────────────────────────────────────────────────────────

    /// # Errors
    ///
    /// Returns the gateway error.
    pub async fn list_rfps(&self, page: u32, limit: u32) -> Result<Paginated<Rfp>, Error> {
        let req = ApiRequest::get("/rfps").query("page", page).query("limit", limit);
        self.gateway.send(req).await
    }

    /// # Errors
    ///
    /// Returns the gateway error; a missing RFP is `Error::Api` with status 404.
    pub async fn get_rfp(&self, id: RfpId) -> Result<Rfp, Error> {
        self.gateway.send(ApiRequest::get(format!("/rfps/{id}"))).await
    }

    /// Create an RFP (buyers only).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty title, else the gateway error.
    pub async fn create_rfp(&self, rfp: &NewRfp) -> Result<Rfp, Error> {
        if rfp.title.trim().is_empty() {
            return Err(Error::Validation("Title is required".into()));
        }
        self.gateway
            .send(ApiRequest::post("/rfps").json(rfp)?)
            .await
    }

    /// # Errors
    ///
    /// Returns the gateway error.
    pub async fn update_rfp(&self, id: RfpId, update: &RfpUpdate) -> Result<Rfp, Error> {
        self.gateway
            .send(ApiRequest::put(format!("/rfps/{id}")).json(update)?)
            .await
    }

    /// Submit a supplier response to a published RFP.
    ///
    /// # Errors
    ///
    /// Returns the gateway error.
    pub async fn respond_to_rfp(&self, id: RfpId, content: &str) -> Result<(), Error> {
        self.gateway
            .send_empty(ApiRequest::post(format!("/rfps/{id}/respond")).json(&ResponseBody { content })?)
            .await
    }

    /// # Errors
    ///
    /// Returns the gateway error; the backend rejects invalid transitions
    /// with status 400.
    pub async fn change_status(&self, id: RfpId, status: RfpStatus) -> Result<Rfp, Error> {
        let req = ApiRequest::patch(format!("/rfps/{id}/status")).query("new_status", status);
        self.gateway.send(req).await
    }

    /// Full-text search over RFPs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a blank query, else the gateway error.
    pub async fn search_rfps(
        &self,
        query: &str,
        page: u32,
        limit: u32,
    ) -> Result<Paginated<Rfp>, Error> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::Validation("Search query is required".into()));
        }
        let req = ApiRequest::get("/rfps/search")
            .query("q", query)
            .query("page", page)
            .query("limit", limit);
        self.gateway.send(req).await
    }

    // ── Supplier views ────────────────────────────────────────────────

    /// # Errors
    ///
    /// Returns the gateway error.
    pub async fn supplier_responses(&self) -> Result<Vec<SupplierResponse>, Error> {
        let list: SupplierResponses = self
            .gateway
            .send(ApiRequest::get("/rfps/supplier/responses"))
            .await?;
        Ok(list.responses)
    }

    /// # Errors
    ///
    /// Returns the gateway error.
    pub async fn published_rfps(&self, limit: u32, offset: u32) -> Result<PublishedPage, Error> {
        let req = ApiRequest::get("/rfps/supplier/published")
            .query("limit", limit)
            .query("offset", offset);
        self.gateway.send(req).await
    }

    // ── Uploads ───────────────────────────────────────────────────────

    /// # Errors
    ///
    /// Returns the gateway error.
    pub async fn presign_upload(
        &self,
        filename: &str,
        content_type: &str,
    ) -> Result<PresignedUpload, Error> {
        let body = PresignBody {
            filename,
            content_type,
        };
        self.gateway
            .send(ApiRequest::post("/uploads/presign").json(&body)?)
            .await
    }

    /// Send the file bytes to the URL returned by
    /// [`presign_upload`](Self::presign_upload).
    ///
    /// The URL is signed by the storage provider, so no bearer token is
    /// attached and a rejection never triggers a refresh.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the target has no URL (the
    /// backend's local store), [`Error::Api`] when storage rejects the
    /// upload, or [`Error::Http`] on transport failure.
    pub async fn upload_to_presigned(
        &self,
        upload: &PresignedUpload,
        bytes: impl Into<reqwest::Body>,
        content_type: &str,
    ) -> Result<(), Error> {
        let Some(url) = upload.url.as_deref() else {
            return Err(Error::Validation(
                "Upload target has no presigned URL".into(),
            ));
        };
        tracing::debug!(provider = ?upload.provider, "Uploading to presigned URL");
        let response = self
            .gateway
            .http_client()
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        ensure_success(response, "presigned upload").await.map(drop)
    }

    /// # Errors
    ///
    /// Returns the gateway error.
    pub async fn complete_upload(
        &self,
        filename: &str,
        rfp_id: RfpId,
        document_type: &str,
    ) -> Result<CompletedUpload, Error> {
        let body = CompleteBody {
            filename,
            rfp_id,
            document_type,
        };
        self.gateway
            .send(ApiRequest::post("/uploads/complete").json(&body)?)
            .await
    }

    // ── Document versions ─────────────────────────────────────────────

    /// Versions of a document, newest first.
    ///
    /// # Errors
    ///
    /// Returns the gateway error.
    pub async fn document_versions(&self, id: DocumentId) -> Result<Vec<DocumentVersion>, Error> {
        let list: VersionList = self
            .gateway
            .send(ApiRequest::get(format!("/documents/{id}/versions")))
            .await?;
        Ok(list.items)
    }

    /// # Errors
    ///
    /// Returns the gateway error.
    pub async fn upload_version(
        &self,
        id: DocumentId,
        filename: &str,
        notes: Option<&str>,
    ) -> Result<VersionRef, Error> {
        self.gateway
            .send(ApiRequest::post(format!("/documents/{id}/versions")).json(&VersionBody { filename, notes })?)
            .await
    }

    /// Create a new version with the contents of `version_number`.
    ///
    /// # Errors
    ///
    /// Returns the gateway error.
    pub async fn revert_version(&self, id: DocumentId, version_number: u32) -> Result<VersionRef, Error> {
        self.gateway
            .send(ApiRequest::post(format!(
                "/documents/{id}/versions/{version_number}/revert"
            )))
            .await
    }

    /// A signed link to the version, or its contents when the backend
    /// serves files from local storage.
    ///
    /// # Errors
    ///
    /// Returns the gateway error.
    pub async fn version_preview(
        &self,
        id: DocumentId,
        version_number: u32,
    ) -> Result<VersionPreview, Error> {
        let request = ApiRequest::get(format!(
            "/documents/{id}/versions/{version_number}/preview"
        ));
        let response = self.gateway.execute(&request).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        if content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("application/json"))
        {
            let link: PreviewLink = response.json().await?;
            return Ok(link.into());
        }
        let bytes = response.bytes().await?;
        Ok(VersionPreview::Inline {
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}
