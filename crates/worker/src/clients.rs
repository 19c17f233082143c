//! HTTP implementations of the consumed capabilities.
//!
//! The gateway speaks plain JSON:
//!
//! | Call                    | Request                                     |
//! |-------------------------|---------------------------------------------|
//! | user info               | `GET {base}/users/{id}`                     |
//! | friends                 | `GET {base}/users/{id}/friends`             |
//! | groups                  | `GET {base}/users/{id}/groups`              |
//! | games                   | `GET {base}/users/{id}/games`               |
//! | outfits                 | `GET {base}/users/{id}/outfits`             |
//! | follow counts           | `GET {base}/users/{id}/follow-counts`       |
//! | group info              | `GET {base}/groups/{id}`                    |
//! | group members           | `GET {base}/groups/{id}/members?cursor=`    |
//! | removed entities        | `POST {base}/{users,groups}/removed`        |
//! | thumbnails              | `POST {base}/{users,groups}/thumbnails`     |
//! | classification          | `POST {classifier_url}` with the profile    |

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use warden_core::capabilities::{
    Classification, Classifier, MemberPage, MembershipLister, ProfileFetcher, ThumbnailFetcher,
};
use warden_core::entity::EntityKind;
use warden_core::error::CoreError;
use warden_core::profile::{
    FollowCounts, FriendRef, GameRef, GroupInfo, GroupMembership, OutfitRef, ProfileInfo,
    UserInfo,
};
use warden_core::types::EntityId;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Gateway returned {status}: {message}")]
    Api { status: u16, message: String },
}

impl ClientError {
    /// Map onto the domain error seen by the pipeline. A 404 becomes
    /// `NotFound`; anything else is a transient fetch failure.
    fn into_core(self, entity: &'static str, id: EntityId) -> CoreError {
        match self {
            ClientError::Api { status, .. } if status == StatusCode::NOT_FOUND.as_u16() => {
                CoreError::NotFound { entity, id }
            }
            other => CoreError::TransientFetch(other.to_string()),
        }
    }
}

fn build_http(timeout: Duration) -> Result<reqwest::Client, CoreError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| CoreError::Configuration(format!("Failed to build HTTP client: {e}")))
}

#[derive(Serialize)]
struct IdsRequest<'a> {
    ids: &'a [EntityId],
}

#[derive(Deserialize)]
struct RemovedResponse {
    removed: Vec<EntityId>,
}

#[derive(Deserialize)]
struct ThumbnailsResponse {
    thumbnails: HashMap<EntityId, String>,
}

/// Client for the platform gateway. Implements profile, membership and
/// thumbnail lookups.
#[derive(Clone)]
pub struct GatewayClient {
    client: reqwest::Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CoreError> {
        Ok(Self {
            client: build_http(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.get(&url).query(query).send().await?;
        decode(resp).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.post(&url).json(body).send().await?;
        decode(resp).await
    }

    async fn user_resource<T: DeserializeOwned>(
        &self,
        user_id: EntityId,
        resource: &str,
    ) -> Result<T, CoreError> {
        self.get(&format!("/users/{user_id}/{resource}"), &[])
            .await
            .map_err(|e| e.into_core("User", user_id))
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(resp.json().await?)
}

#[async_trait]
impl ProfileFetcher for GatewayClient {
    async fn fetch_user_info(&self, user_id: EntityId) -> Result<UserInfo, CoreError> {
        self.get(&format!("/users/{user_id}"), &[])
            .await
            .map_err(|e| e.into_core("User", user_id))
    }

    async fn fetch_friends(&self, user_id: EntityId) -> Result<Vec<FriendRef>, CoreError> {
        self.user_resource(user_id, "friends").await
    }

    async fn fetch_groups(&self, user_id: EntityId) -> Result<Vec<GroupMembership>, CoreError> {
        self.user_resource(user_id, "groups").await
    }

    async fn fetch_games(&self, user_id: EntityId) -> Result<Vec<GameRef>, CoreError> {
        self.user_resource(user_id, "games").await
    }

    async fn fetch_outfits(&self, user_id: EntityId) -> Result<Vec<OutfitRef>, CoreError> {
        self.user_resource(user_id, "outfits").await
    }

    async fn fetch_follow_counts(&self, user_id: EntityId) -> Result<FollowCounts, CoreError> {
        self.user_resource(user_id, "follow-counts").await
    }

    async fn fetch_group_info(&self, group_id: EntityId) -> Result<GroupInfo, CoreError> {
        self.get(&format!("/groups/{group_id}"), &[])
            .await
            .map_err(|e| e.into_core("Group", group_id))
    }

    async fn fetch_removed(
        &self,
        kind: EntityKind,
        ids: &[EntityId],
    ) -> Result<Vec<EntityId>, CoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let resp: RemovedResponse = self
            .post(&format!("/{}/removed", kind.table()), &IdsRequest { ids })
            .await
            .map_err(|e| CoreError::TransientFetch(e.to_string()))?;
        Ok(resp.removed)
    }
}

#[async_trait]
impl MembershipLister for GatewayClient {
    async fn list_group_members(
        &self,
        group_id: EntityId,
        cursor: Option<&str>,
    ) -> Result<MemberPage, CoreError> {
        let query: Vec<(&str, &str)> = cursor.map(|c| ("cursor", c)).into_iter().collect();
        self.get(&format!("/groups/{group_id}/members"), &query)
            .await
            .map_err(|e| e.into_core("Group", group_id))
    }
}

#[async_trait]
impl ThumbnailFetcher for GatewayClient {
    async fn thumbnail_urls(
        &self,
        kind: EntityKind,
        ids: &[EntityId],
    ) -> Result<HashMap<EntityId, String>, CoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let resp: ThumbnailsResponse = self
            .post(&format!("/{}/thumbnails", kind.table()), &IdsRequest { ids })
            .await
            .map_err(|e| CoreError::TransientFetch(e.to_string()))?;
        Ok(resp.thumbnails)
    }
}

/// Client for a classification endpoint that accepts a profile document and
/// answers with a [`Classification`].
#[derive(Clone)]
pub struct HttpClassifier {
    client: reqwest::Client,
    url: String,
}

impl HttpClassifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, CoreError> {
        Ok(Self {
            client: build_http(timeout)?,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, profile: &ProfileInfo) -> Result<Classification, CoreError> {
        let resp = self
            .client
            .post(&self.url)
            .json(profile)
            .send()
            .await
            .map_err(|e| CoreError::TransientFetch(e.to_string()))?;
        let mut decision: Classification = decode(resp)
            .await
            .map_err(|e| CoreError::TransientFetch(e.to_string()))?;
        decision.confidence = decision.confidence.clamp(0.0, 1.0);
        Ok(decision)
    }
}
