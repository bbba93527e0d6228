//! Request/response shapes of the Places text-search and details endpoints.

use serde::{Deserialize, Serialize};

use leadenrich_shared::{GeoBias, SearchResult};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchTextRequest {
    pub text_query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_bias: Option<LocationBias>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct LocationBias {
    pub circle: Circle,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Circle {
    pub center: LatLng,
    pub radius: f64,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<&GeoBias> for LocationBias {
    fn from(bias: &GeoBias) -> Self {
        Self {
            circle: Circle {
                center: LatLng {
                    latitude: bias.latitude,
                    longitude: bias.longitude,
                },
                radius: bias.radius_meters,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchTextResponse {
    #[serde(default)]
    pub places: Vec<Place>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Place {
    pub id: Option<String>,
    pub display_name: Option<LocalizedText>,
    pub formatted_address: Option<String>,
    pub national_phone_number: Option<String>,
    pub website_uri: Option<String>,
    pub rating: Option<f64>,
    pub user_rating_count: Option<i64>,
    pub google_maps_uri: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LocalizedText {
    #[serde(default)]
    pub text: String,
}

impl From<Place> for SearchResult {
    fn from(place: Place) -> Self {
        Self {
            name: place.display_name.map(|d| d.text).unwrap_or_default(),
            address: place.formatted_address.unwrap_or_default(),
            phone: place.national_phone_number.unwrap_or_default(),
            website: place.website_uri.unwrap_or_default(),
            rating: place.rating,
            review_count: place.user_rating_count,
            detail_url: place.google_maps_uri.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorDetail {
    pub message: String,
}
