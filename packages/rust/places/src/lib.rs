//! Client for the remote business-search index (Google Places API v1).
//!
//! Two kinds of calls are made:
//! - paginated text search that produces [`SearchResult`] rows for a new table
//! - candidate lookup plus details-by-id, used to fill review data into an
//!   existing table
//!
//! The [`PlacesApi`] trait is the seam the enrichment stages depend on, so
//! tests can swap in a fake.

mod wire;

use async_trait::async_trait;
use leadenrich_shared::{GeoBias, LeadEnrichError, PlacesConfig, Result, SearchResult};
use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, info, instrument, warn};

use wire::{ApiErrorBody, SearchTextRequest, SearchTextResponse};

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("LeadEnrich/", env!("CARGO_PKG_VERSION"));

const API_KEY_HEADER: &str = "X-Goog-Api-Key";
const FIELD_MASK_HEADER: &str = "X-Goog-FieldMask";

/// Fields requested by a listing search.
const SEARCH_FIELD_MASK: &str = "places.displayName,places.formattedAddress,\
places.nationalPhoneNumber,places.websiteUri,places.rating,places.userRatingCount,\
places.googleMapsUri,nextPageToken";

/// Fields requested when resolving a name/address pair to a place id.
const CANDIDATE_FIELD_MASK: &str = "places.id,places.displayName";

// ---------------------------------------------------------------------------
// Lookup types
// ---------------------------------------------------------------------------

/// Which fields a details lookup should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailMask {
    /// Only the public detail URL.
    DetailUrl,
    /// Rating, review count and detail URL.
    Reviews,
}

impl DetailMask {
    fn header_value(self) -> &'static str {
        match self {
            Self::DetailUrl => "googleMapsUri",
            Self::Reviews => "rating,userRatingCount,googleMapsUri",
        }
    }
}

/// Result of a details lookup. Fields outside the mask stay `None`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceDetails {
    pub rating: Option<f64>,
    #[serde(rename = "userRatingCount")]
    pub review_count: Option<i64>,
    #[serde(rename = "googleMapsUri")]
    pub detail_url: Option<String>,
}

/// Operations against the business-search index.
#[async_trait]
pub trait PlacesApi: Send + Sync {
    /// Paginated text search. Never fails as a whole: a failing page ends
    /// pagination and whatever was collected so far is returned.
    async fn search(&self, query: &str, limit: usize, bias: Option<&GeoBias>) -> Vec<SearchResult>;

    /// Resolve a business to its place id using `"name, address"` as the query.
    async fn find_candidate_id(&self, name: &str, address: &str) -> Result<String>;

    /// Fetch details for a place id.
    async fn lookup_by_id(&self, place_id: &str, mask: DetailMask) -> Result<PlaceDetails>;
}

// ---------------------------------------------------------------------------
// PlacesClient
// ---------------------------------------------------------------------------

/// HTTP implementation of [`PlacesApi`].
pub struct PlacesClient {
    config: PlacesConfig,
    client: Client,
}

impl PlacesClient {
    /// Create a client from resolved configuration.
    pub fn new(config: PlacesConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| LeadEnrichError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    fn search_url(&self) -> String {
        format!("{}/places:searchText", self.config.base_url)
    }

    fn with_auth(&self, request: RequestBuilder, field_mask: &str) -> RequestBuilder {
        request
            .header(API_KEY_HEADER, &self.config.api_key)
            .header(FIELD_MASK_HEADER, field_mask)
    }
}

#[async_trait]
impl PlacesApi for PlacesClient {
    #[instrument(skip_all, fields(query = %query, limit))]
    async fn search(&self, query: &str, limit: usize, bias: Option<&GeoBias>) -> Vec<SearchResult> {
        let mut results: Vec<SearchResult> = Vec::new();
        if limit == 0 {
            return results;
        }

        let mut body = SearchTextRequest {
            text_query: query.to_string(),
            page_size: Some(self.config.page_size),
            page_token: None,
            location_bias: bias.map(Into::into),
        };
        let mut pages = 0usize;

        loop {
            tokio::time::sleep(self.config.request_delay).await;

            let request = self.with_auth(self.client.post(self.search_url()), SEARCH_FIELD_MASK);
            let response = match request.json(&body).send().await {
                Ok(r) => r,
                Err(e) => {
                    warn!(page = pages + 1, error = %e, "search request failed");
                    break;
                }
            };

            let page: SearchTextResponse = match read_json(response).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(page = pages + 1, error = %e, "search page rejected");
                    break;
                }
            };
            pages += 1;

            if page.places.is_empty() {
                debug!(pages, "search page has no places");
                break;
            }

            let remaining = limit - results.len();
            results.extend(page.places.into_iter().take(remaining).map(SearchResult::from));
            debug!(pages, collected = results.len(), "search page received");

            match page.next_page_token {
                Some(token) if results.len() < limit => body.page_token = Some(token),
                _ => break,
            }
        }

        info!(pages, results = results.len(), "search finished");
        results
    }

    async fn find_candidate_id(&self, name: &str, address: &str) -> Result<String> {
        let query = format!("{name}, {address}");
        let body = SearchTextRequest {
            text_query: query.clone(),
            page_size: None,
            page_token: None,
            location_bias: None,
        };

        let response = self
            .with_auth(self.client.post(self.search_url()), CANDIDATE_FIELD_MASK)
            .json(&body)
            .send()
            .await
            .map_err(|e| LeadEnrichError::Network(e.to_string()))?;

        let page: SearchTextResponse = read_json(response).await?;
        page.places
            .into_iter()
            .find_map(|p| p.id)
            .ok_or_else(|| LeadEnrichError::not_found(format!("no business matches '{query}'")))
    }

    async fn lookup_by_id(&self, place_id: &str, mask: DetailMask) -> Result<PlaceDetails> {
        let url = format!("{}/places/{place_id}", self.config.base_url);
        let response = self
            .with_auth(self.client.get(url), mask.header_value())
            .send()
            .await
            .map_err(|e| LeadEnrichError::Network(e.to_string()))?;

        read_json(response).await
    }
}

/// Decode a successful JSON body, or turn an error status into
/// [`LeadEnrichError::Network`] carrying the API's message when it sent one.
async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .map(|body| body.error.message)
            .unwrap_or_else(|_| format!("HTTP {status}"));
        return Err(LeadEnrichError::Network(message));
    }

    response
        .json()
        .await
        .map_err(|e| LeadEnrichError::Network(format!("malformed response: {e}")))
}
